use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term::termcolor::Buffer;
use codespan_reporting::term::{emit, Config};
use miette::Diagnostic as MietteDiagnostic;
use std::ops::Range;

use crate::error::{Error, Warning};

// a span at or past the end of the source points just after its last visible character
fn clamp_to_source(range: Range<usize>, source: &str) -> Range<usize> {
    let end_of_text = source.trim_end_matches('\n').len();
    if range.start >= end_of_text {
        end_of_text..end_of_text
    } else {
        range.start..range.end.min(source.len())
    }
}

fn to_codespan_diagnostic(error: &Error, source: &str) -> Diagnostic<()> {
    let mut diagnostic = Diagnostic::error().with_message(error.to_string());

    if let Some(code) = error.code() {
        diagnostic = diagnostic.with_code(code.to_string());
    }

    if let Some(labels) = error.labels() {
        for label in labels {
            let start = label.offset();
            let range = clamp_to_source(start..start + label.len(), source);
            let message = if range.is_empty() {
                "unexpected end of input"
            } else {
                label.label().unwrap_or("")
            };
            diagnostic
                .labels
                .push(Label::primary((), range).with_message(message));
        }
    }

    if let Some(help) = error.help() {
        diagnostic.notes.push(help.to_string());
    }

    diagnostic
}

fn warning_to_codespan_diagnostic(warning: &Warning, source: &str) -> Diagnostic<()> {
    let mut diagnostic = Diagnostic::warning().with_message(&warning.message);

    if let Some(location) = warning.location {
        let range = clamp_to_source(location.as_range(), source);
        diagnostic
            .labels
            .push(Label::primary((), range).with_message(warning.kind.to_string()));
    } else {
        diagnostic.notes.push(warning.kind.to_string());
    }

    diagnostic
}

fn render(diagnostic: &Diagnostic<()>, filename: &str, source: &str) -> String {
    let file = SimpleFile::new(filename, source);

    let mut writer = Buffer::ansi();
    if let Err(e) = emit(&mut writer, &Config::default(), &file, diagnostic) {
        return format!("{}\n(could not render diagnostic: {e})", diagnostic.message);
    }

    String::from_utf8_lossy(&writer.into_inner()).into_owned()
}

/// Renders a fatal error against the source it came from.
pub fn format_error(error: &Error, filename: &str, source: &str) -> String {
    render(&to_codespan_diagnostic(error, source), filename, source)
}

pub fn format_warning(warning: &Warning, filename: &str, source: &str) -> String {
    render(
        &warning_to_codespan_diagnostic(warning, source),
        filename,
        source,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Resource;
    use crate::source_location::{SourceLocation, SourceSpan};
    use pretty_assertions::assert_eq;

    fn span(start: usize, end: usize) -> SourceSpan {
        let at = |offset| SourceLocation {
            line: 1,
            column: offset + 1,
            offset,
        };
        SourceSpan::new(at(start), at(end))
    }

    #[test]
    fn test_error_labels_become_primary_labels() {
        let source = "x := 1 $ 2\n";
        let error = Error::Lexical {
            message: "unexpected character '$'".to_string(),
            location: span(7, 8),
        };

        let diagnostic = to_codespan_diagnostic(&error, source);
        assert_eq!(diagnostic.code.as_deref(), Some("gramterp::lexical"));
        assert_eq!(diagnostic.labels.len(), 1);
        assert_eq!(diagnostic.labels[0].range, 7..8);
        assert_eq!(diagnostic.labels[0].message, "here");
    }

    #[test]
    fn test_end_of_input_is_clamped() {
        let source = "BEGIN\n\n";
        let error = Error::Syntax {
            message: "expected END, found end of input".to_string(),
            location: span(7, 7),
        };

        let diagnostic = to_codespan_diagnostic(&error, source);
        assert_eq!(diagnostic.labels[0].range, 5..5);
        assert_eq!(diagnostic.labels[0].message, "unexpected end of input");
    }

    #[test]
    fn test_help_becomes_note() {
        let diagnostic = to_codespan_diagnostic(&Error::capacity(Resource::CallStack, 64), "");
        assert!(diagnostic.labels.is_empty());
        assert_eq!(
            diagnostic.notes,
            vec!["raise the limit in the engine configuration".to_string()]
        );
    }

    #[test]
    fn test_rendered_output_names_the_file() {
        let source = "a := b\n";
        let warning = Warning::semantic("'b' is not declared", Some(span(5, 6)));

        let output = format_warning(&warning, "demo.pas", source);
        assert!(output.contains("'b' is not declared"));
        assert!(output.contains("demo.pas"));

        let output = format_error(&Error::runtime("division by zero"), "demo.pas", source);
        assert!(output.contains("division by zero"));
    }
}
