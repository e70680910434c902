use serde::Deserialize;

// Action descriptors are decoded once, when the grammar document is loaded.
// An unknown `action` id or an unexpected field is rejected by serde at that point.
//
// Every `String` field below is a *field hint*: the name of a child field (a rule or a
// token type) of the node the action is attached to.

/// Annotations consumed by the semantic analyzer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", deny_unknown_fields)]
pub enum SemanticAction {
    Program {
        block: String,
        #[serde(default)]
        name: Option<String>,
    },
    Procedure {
        name: String,
        #[serde(default)]
        params: Option<String>,
        block: String,
    },
    VarSymbol {
        name: String,
        #[serde(default, rename = "type")]
        type_: Option<String>,
    },
    Assign {
        value: String,
    },
    Variable {
        name: String,
    },
}

impl SemanticAction {
    pub fn hints(&self) -> Vec<&str> {
        match self {
            SemanticAction::Program { block, name } => {
                let mut hints = vec![block.as_str()];
                hints.extend(name.as_deref());
                hints
            }
            SemanticAction::Procedure {
                name,
                params,
                block,
            } => {
                let mut hints = vec![name.as_str(), block.as_str()];
                hints.extend(params.as_deref());
                hints
            }
            SemanticAction::VarSymbol { name, type_ } => {
                let mut hints = vec![name.as_str()];
                hints.extend(type_.as_deref());
                hints
            }
            SemanticAction::Assign { value } => vec![value.as_str()],
            SemanticAction::Variable { name } => vec![name.as_str()],
        }
    }
}

/// Annotations consumed by the interpreter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", deny_unknown_fields)]
pub enum InterpreterAction {
    Program {
        block: String,
        #[serde(default)]
        name: Option<String>,
    },
    Procedure {
        name: String,
        block: String,
    },
    ProcedureCall {
        name: String,
        #[serde(default)]
        args: Option<String>,
        /// The call sits inside an expression and must leave its result on the operand stack.
        #[serde(default)]
        yields: bool,
    },
    Assign {
        target: String,
        value: String,
        /// Index expressions that make the target an external indexed variable.
        #[serde(default)]
        index: Option<String>,
    },
    Exprs,
    Terms,
    Variable {
        name: String,
        #[serde(default)]
        index: Option<String>,
    },
    ForLoop {
        var: String,
        from: String,
        to: String,
        body: String,
    },
}

impl InterpreterAction {
    pub fn hints(&self) -> Vec<&str> {
        match self {
            InterpreterAction::Program { block, name } => {
                let mut hints = vec![block.as_str()];
                hints.extend(name.as_deref());
                hints
            }
            InterpreterAction::Procedure { name, block } => vec![name.as_str(), block.as_str()],
            InterpreterAction::ProcedureCall { name, args, .. } => {
                let mut hints = vec![name.as_str()];
                hints.extend(args.as_deref());
                hints
            }
            InterpreterAction::Assign {
                target,
                value,
                index,
            } => {
                let mut hints = vec![target.as_str(), value.as_str()];
                hints.extend(index.as_deref());
                hints
            }
            InterpreterAction::Exprs | InterpreterAction::Terms => vec![],
            InterpreterAction::Variable { name, index } => {
                let mut hints = vec![name.as_str()];
                hints.extend(index.as_deref());
                hints
            }
            InterpreterAction::ForLoop {
                var,
                from,
                to,
                body,
            } => vec![var.as_str(), from.as_str(), to.as_str(), body.as_str()],
        }
    }
}
