use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use gramterp::config::Config;
use gramterp::diagnostics::{format_error, format_warning};
use gramterp::error::Error;
use gramterp::grammar::Grammar;
use gramterp::interpreter::RecordingHost;
use gramterp::parse_tree::ParseNode;
use gramterp::parser::parse;
use gramterp::session::Session;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a program, printing every call and assignment it hands to the host
    Run(RunArgs),
    /// Parse a program and write its parse tree as JSON
    Parse(ParseArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Grammar document (.json)
    grammar: PathBuf,
    /// Program source, or a persisted parse tree with --tree
    source: PathBuf,
    /// Read SOURCE as a parse tree written by `parse`
    #[arg(long)]
    tree: bool,
    /// Rule or procedure to run first; defaults to the grammar's start rule
    #[arg(long)]
    entry: Option<String>,
    /// Procedure to call after the entry point, once per tick
    #[arg(long)]
    tick: Option<String>,
    #[arg(long, default_value_t = 1)]
    ticks: usize,
    /// Capacity limits (.json)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ParseArgs {
    grammar: PathBuf,
    source: PathBuf,
    /// Where to write the tree; stdout when omitted
    #[arg(long, short)]
    output: Option<PathBuf>,
    #[arg(long)]
    config: Option<PathBuf>,
}

fn report_error(error: &Error, filename: &str, source: &str) {
    eprint!("{}", format_error(error, filename, source));
}

fn read_file(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(error) => {
            eprintln!("Error reading file {}: {}", path.display(), error);
            None
        }
    }
}

fn load_config(path: Option<&Path>) -> Option<Config> {
    let Some(path) = path else {
        return Some(Config::default());
    };
    Config::from_file(path)
        .map_err(|error| report_error(&error, &path.display().to_string(), ""))
        .ok()
}

fn load_grammar(path: &Path) -> Option<Rc<Grammar>> {
    Grammar::from_file(path)
        .map(Rc::new)
        .map_err(|error| report_error(&error, &path.display().to_string(), ""))
        .ok()
}

fn run(args: RunArgs) -> bool {
    let (Some(config), Some(grammar), Some(text)) = (
        load_config(args.config.as_deref()),
        load_grammar(&args.grammar),
        read_file(&args.source),
    ) else {
        return false;
    };

    let filename = args.source.display().to_string();
    // a persisted tree has no program text to point into
    let source = if args.tree { "" } else { text.as_str() };

    let host = RecordingHost::echoing();
    let loaded = if args.tree {
        ParseNode::from_json(&text, &grammar, &config)
            .and_then(|tree| Session::from_tree(Rc::clone(&grammar), tree, host, &config))
    } else {
        Session::load(Rc::clone(&grammar), &text, host, &config)
    };
    let mut session = match loaded {
        Ok(session) => session,
        Err(error) => {
            report_error(&error, &filename, source);
            return false;
        }
    };

    let entry = args
        .entry
        .unwrap_or_else(|| grammar.start().name.as_str().to_string());
    let ticks = args
        .tick
        .iter()
        .flat_map(|tick| std::iter::repeat(tick.as_str()).take(args.ticks));

    let result = std::iter::once(entry.as_str())
        .chain(ticks)
        .try_for_each(|entry| session.run_once(entry));

    for warning in session.warnings() {
        eprint!("{}", format_warning(warning, &filename, source));
    }

    match result {
        Ok(()) => true,
        Err(error) => {
            report_error(&error, &filename, source);
            false
        }
    }
}

fn parse_only(args: ParseArgs) -> bool {
    let (Some(config), Some(grammar), Some(source)) = (
        load_config(args.config.as_deref()),
        load_grammar(&args.grammar),
        read_file(&args.source),
    ) else {
        return false;
    };

    let filename = args.source.display().to_string();
    let json = match parse(&grammar, &source, &config).and_then(|tree| tree.to_json()) {
        Ok(json) => json,
        Err(error) => {
            report_error(&error, &filename, &source);
            return false;
        }
    };

    match args.output {
        Some(path) => match std::fs::write(&path, json) {
            Ok(()) => true,
            Err(error) => {
                eprintln!("Error writing file {}: {}", path.display(), error);
                false
            }
        },
        None => {
            println!("{json}");
            true
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let succeeded = match cli.command {
        Command::Run(args) => run(args),
        Command::Parse(args) => parse_only(args),
    };

    std::process::exit(if succeeded { 0 } else { 1 });
}
