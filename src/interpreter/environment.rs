use crate::error::{Error, Resource};
use crate::symbol_table::ScopeId;
use crate::token::TokenKind;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Real(f64),
    Text(String),
}

impl Value {
    fn as_string(&self) -> String {
        match self {
            Value::Int(i) => i.to_string(),
            Value::Real(r) => {
                let s = r.to_string();
                if s.ends_with(".0") {
                    s[..s.len() - 2].to_string()
                } else {
                    s
                }
            }
            Value::Text(s) => s.clone(),
        }
    }

    /// The value as an integer operand. Reals are truncated; text must spell an integer.
    pub fn as_int(&self) -> Result<i64, Error> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::Real(r) => Ok(r.trunc() as i64),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::runtime(format!("'{s}' is not an integer"))),
        }
    }

    /// The value of a literal leaf, or `None` for tokens that carry no value.
    pub fn from_literal(token: &str, text: &str) -> Option<Result<Value, Error>> {
        let value = match token {
            TokenKind::INTEGER_CONST => text
                .parse()
                .map(Value::Int)
                .map_err(|_| Error::runtime(format!("integer literal {text} is out of range"))),
            TokenKind::REAL_CONST => text
                .parse()
                .map(Value::Real)
                .map_err(|_| Error::runtime(format!("invalid real literal {text}"))),
            TokenKind::STRING_CONST => Ok(Value::Text(text.to_string())),
            _ => return None,
        };
        Some(value)
    }

    pub fn evaluate_binary_operation(&self, op: &str, rhs: &Self) -> Result<Self, Error> {
        let (lhs, rhs) = (self.as_int()?, rhs.as_int()?);
        let overflow = || Error::runtime(format!("integer overflow in {lhs} {op} {rhs}"));

        let result = match op.to_ascii_uppercase().as_str() {
            "+" => lhs.checked_add(rhs).ok_or_else(overflow)?,
            "-" => lhs.checked_sub(rhs).ok_or_else(overflow)?,
            "*" => lhs.checked_mul(rhs).ok_or_else(overflow)?,
            "/" | "DIV" | "MOD" | "%" if rhs == 0 => {
                return Err(Error::runtime("division by zero"));
            }
            "/" | "DIV" => lhs.checked_div(rhs).ok_or_else(overflow)?,
            "MOD" | "%" => lhs.checked_rem(rhs).ok_or_else(overflow)?,
            _ => return Err(Error::runtime(format!("unknown operator '{op}'"))),
        };
        Ok(Value::Int(result))
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_more::Display)]
pub enum FrameKind {
    Program,
    Procedure,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ActivationRecord {
    pub name: String,
    pub kind: FrameKind,
    pub nesting_level: usize,
    pub scope: Option<ScopeId>,
    bindings: HashMap<String, Value>,
}

impl ActivationRecord {
    pub fn new(name: &str, kind: FrameKind, nesting_level: usize, scope: Option<ScopeId>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            nesting_level,
            scope,
            bindings: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.bindings.insert(name.to_string(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }
}

impl std::fmt::Display for ActivationRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} {} (level {})", self.kind, self.name, self.nesting_level)?;

        let mut names: Vec<&String> = self.bindings.keys().collect();
        names.sort();
        for name in names {
            write!(f, "\n  {name} = {}", self.bindings[name])?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CallStack {
    records: Vec<ActivationRecord>,
    last_popped: Option<ActivationRecord>,
    max_depth: usize,
}

impl CallStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            records: Vec::new(),
            last_popped: None,
            max_depth,
        }
    }

    pub fn push(&mut self, record: ActivationRecord) -> Result<(), Error> {
        if self.records.len() >= self.max_depth {
            return Err(Error::capacity(Resource::CallStack, self.max_depth));
        }
        self.records.push(record);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<&ActivationRecord> {
        self.last_popped = Some(self.records.pop()?);
        self.last_popped.as_ref()
    }

    pub fn peek(&self) -> Option<&ActivationRecord> {
        self.records.last()
    }

    pub fn peek_mut(&mut self) -> Option<&mut ActivationRecord> {
        self.records.last_mut()
    }

    /// The record most recently popped, kept for inspection after a call returns.
    pub fn last_popped(&self) -> Option<&ActivationRecord> {
        self.last_popped.as_ref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[derive(Debug, Clone)]
pub struct OperandStack {
    values: Vec<Value>,
    max_len: usize,
}

impl OperandStack {
    pub fn new(max_len: usize) -> Self {
        Self {
            values: Vec::new(),
            max_len,
        }
    }

    pub fn push(&mut self, value: Value) -> Result<(), Error> {
        if self.values.len() >= self.max_len {
            return Err(Error::capacity(Resource::Operands, self.max_len));
        }
        self.values.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Value, Error> {
        self.values
            .pop()
            .ok_or_else(|| Error::runtime("operand stack underflow"))
    }

    /// Removes every value above `len`, oldest first.
    pub fn split_off(&mut self, len: usize) -> Vec<Value> {
        self.values.split_off(len.min(self.values.len()))
    }

    pub fn peek(&self) -> Option<&Value> {
        self.values.last()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}
