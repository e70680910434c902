use crate::config::Config;
use crate::error::{Error, Warning};
use crate::grammar::Grammar;
use crate::interpreter::{CallStack, Host, Interpreter, OperandStack};
use crate::parse_tree::ParseNode;
use crate::parser::parse;
use crate::semantic_analyzer::SemanticAnalyzer;
use crate::symbol_table::ScopeTree;
use std::rc::Rc;

/// One loaded program and everything needed to run it, tick after tick.
///
/// The first fatal error is kept. Every later `run_once` returns it again without doing any work.
pub struct Session<H: Host> {
    tree: Rc<ParseNode>,
    interpreter: Interpreter<H>,
    warnings: Vec<Warning>,
    failure: Option<Error>,
}

impl<H: Host> Session<H> {
    /// Parses and analyzes `source`.
    pub fn load(
        grammar: Rc<Grammar>,
        source: &str,
        host: H,
        config: &Config,
    ) -> Result<Self, Error> {
        let tree = parse(&grammar, source, config)?;
        Self::from_tree(grammar, tree, host, config)
    }

    /// Starts from an already built tree, such as one reloaded from disk.
    pub fn from_tree(
        grammar: Rc<Grammar>,
        tree: ParseNode,
        host: H,
        config: &Config,
    ) -> Result<Self, Error> {
        tree.validate(&grammar)?;
        let (scopes, mut warnings) = SemanticAnalyzer::new(&grammar, config).analyze(&tree)?;

        let mut interpreter = Interpreter::new(grammar, scopes, host, config);
        interpreter.declare_procedures(&tree)?;
        warnings.extend(interpreter.take_warnings());

        Ok(Self {
            tree: Rc::new(tree),
            interpreter,
            warnings,
            failure: None,
        })
    }

    /// Runs one unit of work. An `entry` naming the start rule runs the whole program;
    /// any other names a procedure to call with no arguments.
    pub fn run_once(&mut self, entry: &str) -> Result<(), Error> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }

        let result = if entry == self.interpreter.grammar().start().name.as_str() {
            let tree = Rc::clone(&self.tree);
            self.interpreter.run(&tree)
        } else {
            self.interpreter.run_procedure(entry)
        };
        self.warnings.extend(self.interpreter.take_warnings());

        if let Err(e) = &result {
            self.failure = Some(e.clone());
        }
        result
    }

    /// Runs the whole program once.
    pub fn run(&mut self) -> Result<(), Error> {
        let start = self.interpreter.grammar().start().name;
        self.run_once(start.as_str())
    }

    pub fn shutdown(self) -> H {
        self.interpreter.into_host()
    }

    pub fn tree(&self) -> &ParseNode {
        &self.tree
    }

    pub fn scopes(&self) -> &ScopeTree {
        self.interpreter.scopes()
    }

    pub fn call_stack(&self) -> &CallStack {
        self.interpreter.call_stack()
    }

    pub fn operands(&self) -> &OperandStack {
        self.interpreter.operands()
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn failure(&self) -> Option<&Error> {
        self.failure.as_ref()
    }

    pub fn host(&self) -> &H {
        self.interpreter.host()
    }

    pub fn host_mut(&mut self) -> &mut H {
        self.interpreter.host_mut()
    }
}
