// Decoding of the JSON grammar document.
//
// The document is one object. Every key that is not reserved defines a rule:
//
//     "rule":    expression
//     "items[]": expression          (a list rule, referenced as "items")
//
// Expressions:
//
//     "NAME"                a terminal when NAME is a token type, otherwise a rule reference
//     [e1, e2, ...]         sequence
//     { "or": [e1, ...] }   alternation
//     { "*": e }            zero or more
//     { "?": e }            optional
//     { "+": e }            one or more

use super::{
    Grammar, GrammarExpression, InterpreterAction, Name, RepeatKind, Rule, SemanticAction,
    TokenTable, LIST_MARKER,
};
use crate::error::Error;
use crate::token::TokenKind;
use internment::Intern;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;

const START: &str = "START";
const TOKENS: &str = "TOKENS";
const COMMENTS: &str = "COMMENTS";
const SEMANTICS: &str = "SEMANTICS";
const INTERPRETER: &str = "INTERPRETER";
const RESERVED: [&str; 5] = [START, TOKENS, COMMENTS, SEMANTICS, INTERPRETER];

const DEFAULT_START: &str = "program";

pub(super) fn load(json: &str) -> Result<Grammar, Error> {
    let root: Value = serde_json::from_str(json)
        .map_err(|e| Error::grammar(format!("document is not valid JSON: {e}")))?;
    let document = root
        .as_object()
        .ok_or_else(|| Error::grammar("document must be a JSON object"))?;

    let tokens = load_tokens(document)?;

    // collect every rule name before decoding, so that references can be checked eagerly
    let mut list_rules = HashMap::<String, bool>::new();
    for key in document.keys().filter(|k| !RESERVED.contains(&k.as_str())) {
        let (base, is_list) = split_list_marker(key);
        if base.is_empty() {
            return Err(Error::grammar(format!("'{key}' is not a valid rule name")));
        }
        if tokens.contains(base) {
            return Err(Error::grammar(format!("rule '{base}' shadows a token type")));
        }
        if list_rules.insert(base.to_string(), is_list).is_some() {
            return Err(Error::grammar(format!("rule '{base}' is defined twice")));
        }
    }

    let mut rules = HashMap::<Name, Rule>::new();
    for (key, value) in document.iter().filter(|(k, _)| !RESERVED.contains(&k.as_str())) {
        let (base, is_list) = split_list_marker(key);
        let decoder = Decoder {
            rule: base,
            tokens: &tokens,
            rules: &list_rules,
        };
        let name = Intern::new(base.to_string());
        rules.insert(
            name,
            Rule {
                name,
                is_list,
                expression: decoder.expression(value)?,
            },
        );
    }

    let start = match document.get(START) {
        Some(value) => value
            .as_str()
            .ok_or_else(|| Error::grammar("START must name a rule"))?,
        None => DEFAULT_START,
    };
    if !list_rules.contains_key(start) {
        return Err(Error::grammar(format!("start rule '{start}' is not defined")));
    }

    let is_field = |hint: &str| tokens.contains(hint) || list_rules.contains_key(hint);
    let semantics = load_actions(
        document,
        SEMANTICS,
        &list_rules,
        &is_field,
        SemanticAction::hints,
    )?;
    let interpreter = load_actions(
        document,
        INTERPRETER,
        &list_rules,
        &is_field,
        InterpreterAction::hints,
    )?;

    Ok(Grammar {
        start: Intern::new(start.to_string()),
        rules,
        tokens,
        semantics,
        interpreter,
    })
}

fn split_list_marker(key: &str) -> (&str, bool) {
    match key.strip_suffix(LIST_MARKER) {
        Some(base) => (base, true),
        None => (key, false),
    }
}

fn load_tokens(document: &Map<String, Value>) -> Result<TokenTable, Error> {
    let mut tokens = TokenTable::new();

    if let Some(table) = document.get(TOKENS) {
        let table = table
            .as_object()
            .ok_or_else(|| Error::grammar("TOKENS must be an object"))?;

        for (name, text) in table {
            let text = text
                .as_str()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| {
                    Error::grammar(format!("token '{name}' must map to non-empty text"))
                })?;
            if TokenKind::is_builtin(name) {
                return Err(Error::grammar(format!("token '{name}' redefines a built-in class")));
            }
            if !tokens.insert(name, text) {
                return Err(Error::grammar(format!(
                    "text '{text}' of token '{name}' is already used by another token"
                )));
            }
        }
    }

    if let Some(comments) = document.get(COMMENTS) {
        let pairs = comments
            .as_array()
            .ok_or_else(|| Error::grammar("COMMENTS must be an array of [opener, closer] pairs"))?;

        for pair in pairs {
            match pair.as_array().map(|p| p.as_slice()) {
                Some([Value::String(opener), Value::String(closer)])
                    if !opener.is_empty() && !closer.is_empty() =>
                {
                    tokens.insert_comment(opener, closer)
                }
                _ => {
                    return Err(Error::grammar(format!(
                        "comment delimiter {pair} must be a pair of non-empty strings"
                    )))
                }
            }
        }
    }

    Ok(tokens)
}

fn load_actions<A: DeserializeOwned>(
    document: &Map<String, Value>,
    table_name: &str,
    rules: &HashMap<String, bool>,
    is_field: &impl Fn(&str) -> bool,
    hints: impl Fn(&A) -> Vec<&str>,
) -> Result<HashMap<String, A>, Error> {
    let mut actions = HashMap::new();

    let Some(table) = document.get(table_name) else {
        return Ok(actions);
    };
    let table = table
        .as_object()
        .ok_or_else(|| Error::grammar(format!("{table_name} must be an object")))?;

    for (rule, descriptor) in table {
        if !rules.contains_key(rule) {
            return Err(Error::grammar(format!(
                "{table_name} action attached to unknown rule '{rule}'"
            )));
        }

        let action: A = serde_json::from_value(descriptor.clone()).map_err(|e| {
            Error::grammar(format!("{table_name} action on '{rule}' is invalid: {e}"))
        })?;

        if let Some(hint) = hints(&action).into_iter().find(|h| !is_field(h)) {
            return Err(Error::grammar(format!(
                "{table_name} action on '{rule}' names unknown field '{hint}'"
            )));
        }

        actions.insert(rule.clone(), action);
    }

    Ok(actions)
}

struct Decoder<'a> {
    rule: &'a str,
    tokens: &'a TokenTable,
    rules: &'a HashMap<String, bool>,
}

impl<'a> Decoder<'a> {
    fn error(&self, msg: impl std::fmt::Display) -> Error {
        Error::grammar(format!("rule '{}' {msg}", self.rule))
    }

    fn expression(&self, value: &Value) -> Result<GrammarExpression, Error> {
        match value {
            Value::String(name) => self.reference(name),
            Value::Array(items) => {
                if items.is_empty() {
                    return Err(self.error("contains an empty sequence"));
                }
                Ok(GrammarExpression::Sequence(self.expressions(items)?))
            }
            Value::Object(map) if map.len() == 1 => {
                let (op, inner) = map.iter().next().ok_or_else(|| self.error("is empty"))?;
                match op.as_str() {
                    "or" => match inner {
                        Value::Array(alternatives) if !alternatives.is_empty() => {
                            Ok(GrammarExpression::Alternation(self.expressions(alternatives)?))
                        }
                        _ => Err(self.error("has an 'or' that is not a non-empty array")),
                    },
                    "*" => self.repeat(RepeatKind::ZeroOrMore, inner),
                    "?" => self.repeat(RepeatKind::Optional, inner),
                    "+" => self.repeat(RepeatKind::OneOrMore, inner),
                    other => Err(self.error(format!("uses unknown operator '{other}'"))),
                }
            }
            other => Err(self.error(format!("contains an invalid expression {other}"))),
        }
    }

    fn expressions(&self, values: &[Value]) -> Result<Vec<GrammarExpression>, Error> {
        values.iter().map(|v| self.expression(v)).collect()
    }

    fn repeat(&self, kind: RepeatKind, inner: &Value) -> Result<GrammarExpression, Error> {
        Ok(GrammarExpression::Repeat(kind, Box::new(self.expression(inner)?)))
    }

    fn reference(&self, name: &str) -> Result<GrammarExpression, Error> {
        if let Some(kind) = self.tokens.kind(name) {
            Ok(GrammarExpression::Terminal(kind))
        } else if self.rules.contains_key(name) {
            Ok(GrammarExpression::NonTerminal(Intern::new(name.to_string())))
        } else {
            Err(self.error(format!("refers to unknown rule or token '{name}'")))
        }
    }
}
