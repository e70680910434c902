use crate::source_location::SourceSpan;
use miette::Diagnostic;
use thiserror::Error;

/// A fixed-capacity resource whose configured limit can be exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Resource {
    #[display(fmt = "parse depth")]
    ParseDepth,
    #[display(fmt = "backtrack position stack")]
    Backtrack,
    #[display(fmt = "symbol table")]
    Symbols,
    #[display(fmt = "scope table")]
    Scopes,
    #[display(fmt = "call stack")]
    CallStack,
    #[display(fmt = "operand stack")]
    Operands,
    #[display(fmt = "token text buffer")]
    TokenText,
}

/// Every fatal condition the engine can report.
///
/// The first one raised by any stage halts the session; later operations return it again
/// instead of doing work.
#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum Error {
    #[error("Invalid grammar: {0}")]
    #[diagnostic(code(gramterp::grammar))]
    Grammar(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(gramterp::config))]
    Config(String),

    #[error("Lexical error: {message}")]
    #[diagnostic(code(gramterp::lexical))]
    Lexical {
        message: String,
        #[label("here")]
        location: SourceSpan,
    },

    #[error("Syntax error: {message}")]
    #[diagnostic(code(gramterp::syntax))]
    Syntax {
        message: String,
        #[label("unexpected token")]
        location: SourceSpan,
    },

    #[error("Capacity exceeded: {resource} is limited to {limit}")]
    #[diagnostic(
        code(gramterp::capacity),
        help("raise the limit in the engine configuration")
    )]
    Capacity { resource: Resource, limit: usize },

    #[error("External '{name}' failed: {reason}")]
    #[diagnostic(code(gramterp::dispatch))]
    RuntimeDispatch { name: String, reason: String },

    #[error("Runtime error: {0}")]
    #[diagnostic(code(gramterp::runtime))]
    Runtime(String),

    #[error("Persisted parse tree: {0}")]
    #[diagnostic(code(gramterp::persist))]
    Persist(String),
}

impl Error {
    pub fn grammar(msg: impl Into<String>) -> Self {
        Error::Grammar(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Error::Runtime(msg.into())
    }

    pub fn capacity(resource: Resource, limit: usize) -> Self {
        Error::Capacity { resource, limit }
    }

    pub fn location(&self) -> Option<SourceSpan> {
        match self {
            Error::Lexical { location, .. } | Error::Syntax { location, .. } => Some(*location),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Persist(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum WarningKind {
    #[display(fmt = "semantic warning")]
    Semantic,
    #[display(fmt = "malformed tree")]
    MalformedTree,
}

/// A non-fatal diagnostic. Warnings are collected in order on the session.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
    pub location: Option<SourceSpan>,
}

impl Warning {
    pub fn semantic(message: impl Into<String>, location: Option<SourceSpan>) -> Self {
        Self {
            kind: WarningKind::Semantic,
            message: message.into(),
            location,
        }
    }

    pub fn malformed(message: impl Into<String>, location: Option<SourceSpan>) -> Self {
        Self {
            kind: WarningKind::MalformedTree,
            message: message.into(),
            location,
        }
    }
}
