//! The grammar document: rules, tokens and the two action tables.
//!
//! A `Grammar` is immutable once loaded and may be shared by any number of sessions.
mod actions;
mod document;
mod tokens;

pub use actions::{InterpreterAction, SemanticAction};
pub use tokens::TokenTable;

use crate::error::Error;
use crate::token::TokenKind;
use internment::Intern;
use std::collections::HashMap;
use std::path::Path;

pub type Name = Intern<String>;

/// Suffix on a rule's name marking it as a list rule.
pub const LIST_MARKER: &str = "[]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatKind {
    ZeroOrMore,
    Optional,
    OneOrMore,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GrammarExpression {
    Sequence(Vec<GrammarExpression>),
    Alternation(Vec<GrammarExpression>),
    Repeat(RepeatKind, Box<GrammarExpression>),
    Terminal(TokenKind),
    NonTerminal(Name),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: Name,
    /// List rules build a `ParseNode::List`; every other rule builds a `ParseNode::Record`.
    pub is_list: bool,
    pub expression: GrammarExpression,
}

#[derive(Debug, Clone)]
pub struct Grammar {
    start: Name,
    rules: HashMap<Name, Rule>,
    tokens: TokenTable,
    semantics: HashMap<String, SemanticAction>,
    interpreter: HashMap<String, InterpreterAction>,
}

impl Grammar {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        document::load(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::grammar(format!("reading {}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn start(&self) -> &Rule {
        // the loader refuses documents whose start rule is missing
        &self.rules[&self.start]
    }

    pub fn rule(&self, name: Name) -> Option<&Rule> {
        self.rules.get(&name)
    }

    pub fn rule_named(&self, name: &str) -> Option<&Rule> {
        self.rules.get(&Intern::new(name.to_string()))
    }

    pub fn tokens(&self) -> &TokenTable {
        &self.tokens
    }

    pub fn semantic_action(&self, rule: &str) -> Option<&SemanticAction> {
        self.semantics.get(rule)
    }

    pub fn interpreter_action(&self, rule: &str) -> Option<&InterpreterAction> {
        self.interpreter.get(rule)
    }

    /// Whether any rule carries an interpreter `Procedure` action.
    pub fn has_procedures(&self) -> bool {
        self.interpreter
            .values()
            .any(|a| matches!(a, InterpreterAction::Procedure { .. }))
    }
}
