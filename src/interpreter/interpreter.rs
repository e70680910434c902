use super::environment::{ActivationRecord, CallStack, FrameKind, OperandStack, Value};
use super::host::{DispatchError, Host, MAX_ACCESS_ARGS, MAX_CALL_ARGS};
use crate::config::Config;
use crate::error::{Error, Warning};
use crate::grammar::{Grammar, InterpreterAction};
use crate::parse_tree::ParseNode;
use crate::symbol_table::{ScopeId, ScopeTree, SymbolId, SymbolKind};
use std::rc::Rc;

fn dispatch_error(name: &str, error: DispatchError) -> Error {
    Error::RuntimeDispatch {
        name: name.to_string(),
        reason: error.to_string(),
    }
}

/// Walks a parse tree and executes it, guided by the grammar's `INTERPRETER` table.
///
/// Every action communicates through the operand stack: evaluating an expression node leaves
/// exactly one value on it, and statements leave it as they found it.
pub struct Interpreter<H: Host> {
    grammar: Rc<Grammar>,
    scopes: ScopeTree,
    call_stack: CallStack,
    operands: OperandStack,
    host: H,
    warnings: Vec<Warning>,
}

impl<H: Host> Interpreter<H> {
    pub fn new(grammar: Rc<Grammar>, scopes: ScopeTree, host: H, config: &Config) -> Self {
        Self {
            grammar,
            scopes,
            call_stack: CallStack::new(config.max_call_depth),
            operands: OperandStack::new(config.max_operands),
            host,
            warnings: Vec::new(),
        }
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn scopes(&self) -> &ScopeTree {
        &self.scopes
    }

    pub fn call_stack(&self) -> &CallStack {
        &self.call_stack
    }

    pub fn operands(&self) -> &OperandStack {
        &self.operands
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    /// Warnings raised since the last call.
    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    pub fn reset(&mut self) {
        self.call_stack.clear();
        self.operands.clear();
    }

    /// Caches the body of every procedure in the tree, so any of them can be called before
    /// the program itself has run.
    pub fn declare_procedures(&mut self, node: &ParseNode) -> Result<(), Error> {
        if !node.is_leaf() {
            let grammar = Rc::clone(&self.grammar);
            if let Some(InterpreterAction::Procedure { name, block }) =
                grammar.interpreter_action(node.tag())
            {
                self.cache_block(node, name, block)?;
            }
        }

        for child in node.children() {
            self.declare_procedures(child)?;
        }
        Ok(())
    }

    /// Executes the whole program rooted at `root`.
    ///
    /// A root without a `Program` action runs inside a root frame that stays on the call
    /// stack afterwards, holding whatever the top level bound.
    pub fn run(&mut self, root: &ParseNode) -> Result<(), Error> {
        self.reset();

        let is_program = matches!(
            self.grammar.interpreter_action(root.tag()),
            Some(InterpreterAction::Program { .. })
        );
        if is_program {
            return self.visit(root);
        }

        self.push_root_frame()?;
        self.visit(root)
    }

    /// Calls the procedure `name` with no arguments, inside a fresh root frame.
    ///
    /// The root frame is left on the call stack; the procedure's own record is `last_popped`.
    pub fn run_procedure(&mut self, name: &str) -> Result<(), Error> {
        self.reset();

        let procedure = self
            .resolve_procedure(name)
            .ok_or_else(|| Error::runtime(format!("no procedure named '{name}'")))?;

        self.push_root_frame()?;
        self.call_user(procedure, Vec::new())
    }

    fn push_root_frame(&mut self) -> Result<(), Error> {
        let root = self.scopes.root();
        let name = root.map_or("main", |r| self.scopes.scope(r).name.as_str());
        let record = ActivationRecord::new(name, FrameKind::Program, 1, root);
        self.call_stack.push(record)
    }

    fn current_scope(&self) -> Option<ScopeId> {
        self.call_stack
            .peek()
            .and_then(|record| record.scope)
            .or(self.scopes.root())
    }

    fn is_declared(&self, name: &str) -> bool {
        self.current_scope()
            .and_then(|scope| self.scopes.resolve(scope, name))
            .is_some()
    }

    fn resolve_procedure(&self, name: &str) -> Option<SymbolId> {
        self.current_scope()
            .and_then(|scope| self.scopes.resolve(scope, name))
            .filter(|id| self.scopes.symbol(*id).kind == SymbolKind::Procedure)
    }

    // looks up a field the action names, warning when the tree lacks it
    fn field<'n>(&mut self, node: &'n ParseNode, hint: &str) -> Option<&'n Rc<ParseNode>> {
        let field = node.field(hint);
        if field.is_none() {
            self.warnings.push(Warning::malformed(
                format!("'{}' node has no '{hint}' field", node.tag()),
                node.location(),
            ));
        }
        field
    }

    fn name<'n>(&mut self, node: &'n ParseNode, hint: &str) -> Option<&'n str> {
        self.field(node, hint)?.text()
    }

    fn bind(&mut self, name: &str, value: Value) -> Result<(), Error> {
        let record = self
            .call_stack
            .peek_mut()
            .ok_or_else(|| Error::runtime(format!("no active frame to bind '{name}'")))?;
        record.set(name, value);
        Ok(())
    }

    // visits `node`, which must leave exactly one value behind
    fn evaluate(&mut self, node: &ParseNode) -> Result<Value, Error> {
        let base = self.operands.len();
        self.visit(node)?;

        match self.operands.len().checked_sub(base) {
            Some(1) => self.operands.pop(),
            produced => Err(Error::runtime(format!(
                "'{}' produced {} values where one was expected",
                node.tag(),
                produced.unwrap_or(0)
            ))),
        }
    }

    // visits `args`, collecting every value it pushes in push order
    fn evaluate_arguments(&mut self, args: Option<&ParseNode>) -> Result<Vec<Value>, Error> {
        let base = self.operands.len();
        if let Some(args) = args {
            self.visit(args)?;
        }

        if self.operands.len() < base {
            return Err(Error::runtime("operand stack underflow"));
        }
        Ok(self.operands.split_off(base))
    }

    fn visit(&mut self, node: &ParseNode) -> Result<(), Error> {
        if let ParseNode::Leaf { token, text, .. } = node {
            if let Some(value) = Value::from_literal(token, text) {
                self.operands.push(value?)?;
            }
            return Ok(());
        }

        let grammar = Rc::clone(&self.grammar);
        match grammar.interpreter_action(node.tag()) {
            Some(InterpreterAction::Program { block, .. }) => self.visit_program(node, block),
            Some(InterpreterAction::Procedure { name, block }) => {
                self.cache_block(node, name, block)
            }
            Some(InterpreterAction::ProcedureCall { name, args, yields }) => {
                self.visit_procedure_call(node, name, args.as_deref(), *yields)
            }
            Some(InterpreterAction::Assign {
                target,
                value,
                index,
            }) => self.visit_assign(node, target, value, index.as_deref()),
            Some(InterpreterAction::Exprs) | Some(InterpreterAction::Terms) => {
                self.visit_operation(node)
            }
            Some(InterpreterAction::Variable { name, index }) => {
                self.visit_variable(node, name, index.as_deref())
            }
            Some(InterpreterAction::ForLoop {
                var,
                from,
                to,
                body,
            }) => self.visit_for_loop(node, var, from, to, body),
            None => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: &ParseNode) -> Result<(), Error> {
        for child in node.children() {
            self.visit(child)?;
        }
        Ok(())
    }

    fn visit_program(&mut self, node: &ParseNode, block: &str) -> Result<(), Error> {
        self.push_root_frame()?;
        if let Some(block) = self.field(node, block) {
            self.visit(block)?;
        }
        self.call_stack.pop();
        Ok(())
    }

    fn cache_block(&mut self, node: &ParseNode, name: &str, block: &str) -> Result<(), Error> {
        let (Some(name), Some(block)) = (self.name(node, name), self.field(node, block)) else {
            return Ok(());
        };

        if let Some(procedure) = self.resolve_procedure(name) {
            let symbol = self.scopes.symbol_mut(procedure);
            // a duplicate definition never replaces the first one
            if symbol.block.is_none() {
                symbol.block = Some(Rc::clone(block));
            }
        }
        Ok(())
    }

    fn visit_procedure_call(
        &mut self,
        node: &ParseNode,
        name: &str,
        args: Option<&str>,
        yields: bool,
    ) -> Result<(), Error> {
        let Some(name) = self.name(node, name) else {
            return Ok(());
        };
        // a call without arguments may have no args field at all
        let args = args.and_then(|hint| node.field(hint)).map(|a| &**a);

        if let Some(procedure) = self.resolve_procedure(name) {
            if yields {
                return Err(Error::runtime(format!(
                    "procedure '{name}' does not produce a value"
                )));
            }
            let values = self.evaluate_arguments(args)?;
            return self.call_user(procedure, values);
        }

        let values = self.evaluate_arguments(args)?;
        if values.len() > MAX_CALL_ARGS {
            return Err(Error::runtime(format!(
                "external '{name}' called with {} arguments, at most {MAX_CALL_ARGS} are supported",
                values.len()
            )));
        }

        let result = self
            .host
            .external_call(name, &values)
            .map_err(|e| dispatch_error(name, e))?;
        if yields {
            self.operands.push(result)?;
        }
        Ok(())
    }

    fn call_user(&mut self, procedure: SymbolId, mut values: Vec<Value>) -> Result<(), Error> {
        let symbol = self.scopes.symbol(procedure);
        if values.len() != symbol.params.len() {
            return Err(Error::runtime(format!(
                "procedure '{}' expects {} argument(s), got {}",
                symbol.name,
                symbol.params.len(),
                values.len()
            )));
        }
        let Some(block) = symbol.block.clone() else {
            return Err(Error::runtime(format!(
                "procedure '{}' has no body",
                symbol.name
            )));
        };

        let level = symbol
            .scope
            .map_or(symbol.nesting_level + 1, |s| self.scopes.scope(s).nesting_level);
        let mut record =
            ActivationRecord::new(&symbol.name, FrameKind::Procedure, level, symbol.scope);

        // arguments were pushed left to right, so they come back off in reverse
        for param in symbol.params.iter().rev() {
            if let Some(value) = values.pop() {
                record.set(&self.scopes.symbol(*param).name, value);
            }
        }

        self.call_stack.push(record)?;
        self.visit(&block)?;
        self.call_stack.pop();
        Ok(())
    }

    // evaluates the index of an indexed access; `None` when the node carries no index
    fn evaluate_index(
        &mut self,
        node: &ParseNode,
        index: Option<&str>,
        name: &str,
    ) -> Result<Option<Vec<Value>>, Error> {
        let Some(index) = index.and_then(|hint| node.field(hint)) else {
            return Ok(None);
        };

        let values = self.evaluate_arguments(Some(&**index))?;
        if values.len() > MAX_ACCESS_ARGS {
            return Err(Error::runtime(format!(
                "'{name}' accessed with {} indices, at most {MAX_ACCESS_ARGS} are supported",
                values.len()
            )));
        }
        Ok(Some(values))
    }

    fn visit_assign(
        &mut self,
        node: &ParseNode,
        target: &str,
        value: &str,
        index: Option<&str>,
    ) -> Result<(), Error> {
        let (Some(name), Some(value)) = (self.name(node, target), self.field(node, value)) else {
            return Ok(());
        };
        let indices = self.evaluate_index(node, index, name)?;

        let base = self.operands.len();
        self.visit(value)?;
        let produced = self.operands.len().saturating_sub(base);
        if produced != 1 {
            return Err(Error::runtime(format!(
                "assignment to '{name}' produced {produced} values where one was expected"
            )));
        }
        let value = self.operands.pop()?;

        // an indexed target always belongs to the host
        if let Some(indices) = indices {
            return self
                .host
                .external_set(value, name, &indices)
                .map_err(|e| dispatch_error(name, e));
        }

        let bound = self
            .call_stack
            .peek()
            .is_some_and(|record| record.contains(name));
        if bound || self.is_declared(name) {
            return self.bind(name, value);
        }

        match self.host.external_set(value.clone(), name, &[]) {
            Ok(()) => Ok(()),
            // nobody claims the name, so it becomes a local of the current frame
            Err(DispatchError::Unknown(_)) => self.bind(name, value),
            Err(e) => Err(dispatch_error(name, e)),
        }
    }

    fn visit_operation(&mut self, node: &ParseNode) -> Result<(), Error> {
        let items: Vec<&Rc<ParseNode>> = node.children().collect();
        match items.as_slice() {
            [operand] => self.visit(operand),
            [lhs, op, rhs] => {
                let lhs = self.evaluate(lhs)?;
                let rhs = self.evaluate(rhs)?;
                let op = op.text().unwrap_or_default();
                let result = lhs.evaluate_binary_operation(op, &rhs)?;
                self.operands.push(result)
            }
            other => {
                self.warnings.push(Warning::malformed(
                    format!(
                        "'{}' expects 1 or 3 elements, found {}",
                        node.tag(),
                        other.len()
                    ),
                    node.location(),
                ));
                Ok(())
            }
        }
    }

    fn visit_variable(
        &mut self,
        node: &ParseNode,
        name: &str,
        index: Option<&str>,
    ) -> Result<(), Error> {
        let Some(name) = self.name(node, name) else {
            return Ok(());
        };

        if let Some(indices) = self.evaluate_index(node, index, name)? {
            let value = self
                .host
                .external_get(name, &indices)
                .map_err(|e| dispatch_error(name, e))?;
            return self.operands.push(value);
        }

        let bound = self
            .call_stack
            .peek()
            .and_then(|record| record.get(name))
            .cloned();
        if let Some(value) = bound {
            return self.operands.push(value);
        }

        if self.is_declared(name) {
            return Err(Error::runtime(format!("variable '{name}' has no value")));
        }

        let value = self
            .host
            .external_get(name, &[])
            .map_err(|e| dispatch_error(name, e))?;
        self.operands.push(value)
    }

    fn visit_for_loop(
        &mut self,
        node: &ParseNode,
        var: &str,
        from: &str,
        to: &str,
        body: &str,
    ) -> Result<(), Error> {
        let name = self.name(node, var);
        let from = self.field(node, from);
        let to = self.field(node, to);
        let body = self.field(node, body);
        let (Some(name), Some(from), Some(to), Some(body)) = (name, from, to, body) else {
            return Ok(());
        };

        // bounds are evaluated once, before the first iteration
        let first = self.evaluate(from)?.as_int()?;
        let last = self.evaluate(to)?.as_int()?;

        for i in first..=last {
            self.bind(name, Value::Int(i))?;
            self.visit(body)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Resource, WarningKind};
    use crate::interpreter::{HostEvent, RecordingHost};
    use crate::parser::parse;
    use crate::semantic_analyzer::SemanticAnalyzer;
    use pretty_assertions::assert_eq;

    const PASCAL: &str = include_str!("../../grammars/pascal.json");
    const LED: &str = include_str!("../../grammars/led.json");

    fn load<H: Host>(
        grammar: &str,
        source: &str,
        host: H,
        config: &Config,
    ) -> (Interpreter<H>, ParseNode) {
        let grammar = Rc::new(Grammar::from_json(grammar).unwrap());
        let tree = parse(&grammar, source, config).unwrap();
        let (scopes, _) = SemanticAnalyzer::new(&grammar, config)
            .analyze(&tree)
            .unwrap();
        let mut interpreter = Interpreter::new(grammar, scopes, host, config);
        interpreter.declare_procedures(&tree).unwrap();
        (interpreter, tree)
    }

    fn run(grammar: &str, source: &str) -> Result<Vec<String>, Error> {
        let (mut interpreter, tree) =
            load(grammar, source, RecordingHost::new(), &Config::default());
        interpreter.run(&tree)?;
        Ok(interpreter
            .host()
            .events()
            .iter()
            .map(|e| e.to_string())
            .collect())
    }

    // a host that knows no variables at all
    #[derive(Default)]
    struct CallsOnly {
        calls: Vec<HostEvent>,
    }

    impl Host for CallsOnly {
        fn external_call(&mut self, name: &str, args: &[Value]) -> Result<Value, DispatchError> {
            self.calls.push(HostEvent::Call {
                name: name.to_string(),
                args: args.to_vec(),
            });
            Ok(Value::Int(0))
        }

        fn external_get(&mut self, name: &str, _: &[Value]) -> Result<Value, DispatchError> {
            Err(DispatchError::Unknown(name.to_string()))
        }

        fn external_set(&mut self, _: Value, name: &str, _: &[Value]) -> Result<(), DispatchError> {
            Err(DispatchError::Unknown(name.to_string()))
        }
    }

    #[test]
    fn test_single_operand_expression() {
        let (mut interpreter, tree) = load(
            r#"{
                "START": "expr",
                "TOKENS": { "PLUS": "+" },
                "expr[]": ["INTEGER_CONST", { "?": ["PLUS", "expr"] }],
                "INTERPRETER": { "expr": { "action": "Exprs" } }
            }"#,
            "42",
            RecordingHost::new(),
            &Config::default(),
        );

        interpreter.run(&tree).unwrap();
        assert_eq!(interpreter.operands().as_slice(), &[Value::Int(42)]);
    }

    #[test]
    fn test_operator_precedence_follows_grammar() {
        let events = run(
            PASCAL,
            "PROGRAM p; BEGIN print(2 + 3 * 4); print((2 + 3) * 4); print(7 MOD 4 - 1) END.",
        )
        .unwrap();
        assert_eq!(events, vec!["call print(14)", "call print(20)", "call print(2)"]);
    }

    #[test]
    fn test_subtraction_groups_to_the_right() {
        // the shipped grammars are right-recursive: 10 - (3 - 2)
        let events = run(PASCAL, "PROGRAM p; BEGIN print(10 - 3 - 2) END.").unwrap();
        assert_eq!(events, vec!["call print(9)"]);
    }

    #[test]
    fn test_malformed_operation_warns() {
        let (mut interpreter, tree) = load(
            r#"{
                "START": "expr",
                "expr[]": ["INTEGER_CONST", "INTEGER_CONST"],
                "INTERPRETER": { "expr": { "action": "Exprs" } }
            }"#,
            "1 2",
            RecordingHost::new(),
            &Config::default(),
        );

        interpreter.run(&tree).unwrap();
        let warnings = interpreter.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::MalformedTree);
        assert!(interpreter.operands().is_empty());
    }

    #[test]
    fn test_for_loop_is_inclusive() {
        let events = run(
            PASCAL,
            "PROGRAM p; VAR i : INTEGER; BEGIN \
             FOR i := 1 TO 3 DO print(i); \
             FOR i := 3 TO 1 DO print(0 - i) \
             END.",
        )
        .unwrap();
        assert_eq!(events, vec!["call print(1)", "call print(2)", "call print(3)"]);
    }

    #[test]
    fn test_arity_mismatch() {
        let err = run(
            PASCAL,
            "PROGRAM p; PROCEDURE P(x : INTEGER); BEGIN END; BEGIN P(1, 2) END.",
        )
        .unwrap_err();
        assert_eq!(
            err,
            Error::runtime("procedure 'P' expects 1 argument(s), got 2")
        );
    }

    #[test]
    fn test_declared_but_unbound_variable() {
        let err = run(PASCAL, "PROGRAM p; VAR a, b : INTEGER; BEGIN a := b END.").unwrap_err();
        assert_eq!(err, Error::runtime("variable 'b' has no value"));
    }

    #[test]
    fn test_division_by_zero() {
        let err = run(PASCAL, "PROGRAM p; BEGIN print(1 DIV 0) END.").unwrap_err();
        assert_eq!(err, Error::runtime("division by zero"));
    }

    #[test]
    fn test_unclaimed_assignment_becomes_local() {
        let (mut interpreter, tree) = load(
            PASCAL,
            "PROGRAM p; BEGIN c := 5; print(c + 1) END.",
            CallsOnly::default(),
            &Config::default(),
        );

        interpreter.run(&tree).unwrap();
        assert_eq!(
            interpreter.host().calls,
            vec![HostEvent::Call {
                name: "print".to_string(),
                args: vec![Value::Int(6)]
            }]
        );
        assert_eq!(interpreter.call_stack().last_popped().unwrap().get("c"), Some(&Value::Int(5)));
    }

    #[test]
    fn test_unknown_external_variable_is_fatal() {
        let (mut interpreter, tree) = load(
            PASCAL,
            "PROGRAM p; BEGIN print(missing) END.",
            CallsOnly::default(),
            &Config::default(),
        );

        assert_eq!(
            interpreter.run(&tree).unwrap_err(),
            Error::RuntimeDispatch {
                name: "missing".to_string(),
                reason: "no external named 'missing'".to_string()
            }
        );
    }

    #[test]
    fn test_external_result_feeds_expression() {
        let (mut interpreter, tree) = load(
            LED,
            "effect e; x = random(8) + 1;",
            RecordingHost::new().returning("random", Value::Int(6)),
            &Config::default(),
        );

        interpreter.run(&tree).unwrap();
        let events: Vec<String> = interpreter
            .host()
            .events()
            .iter()
            .map(|e| e.to_string())
            .collect();
        assert_eq!(events, vec!["call random(8)", "set x := 7"]);
    }

    #[test]
    fn test_external_variable_feeds_expression() {
        let (mut interpreter, tree) = load(
            LED,
            "effect e; x = brightness + 1;",
            RecordingHost::new().with_variable("brightness", Value::Int(4)),
            &Config::default(),
        );

        interpreter.run(&tree).unwrap();
        assert_eq!(interpreter.host().events()[0].to_string(), "set x := 5");
    }

    #[test]
    fn test_indexed_access_goes_to_host() {
        let events = run(
            LED,
            "effect e; var i; i = 1; leds[i + 1] = 7; grid[i, 2] = leds[2] * 2;",
        )
        .unwrap();
        assert_eq!(events, vec!["set leds[2] := 7", "set grid[1, 2] := 14"]);
    }

    #[test]
    fn test_indexed_access_limits() {
        let err = run(LED, "effect e; cube[1, 2, 3, 4] = 0;").unwrap_err();
        assert_eq!(
            err,
            Error::runtime("'cube' accessed with 4 indices, at most 3 are supported")
        );
        assert!(run(LED, "effect e; cube[1, 2, 3] = 0;").is_ok());
    }

    #[test]
    fn test_unknown_indexed_variable_is_fatal() {
        let (mut interpreter, tree) = load(
            LED,
            "effect e; x = leds[0]; leds[0] = 1;",
            CallsOnly::default(),
            &Config::default(),
        );

        assert_eq!(
            interpreter.run(&tree).unwrap_err(),
            Error::RuntimeDispatch {
                name: "leds".to_string(),
                reason: "no external named 'leds'".to_string()
            }
        );
    }

    #[test]
    fn test_top_level_procedure_call() {
        let grammar = r#"{
            "START": "body",
            "TOKENS": {
                "VAR": "var", "PROCEDURE": "procedure", "BEGIN": "begin", "END": "end",
                "INTEGER": "integer", "SEMI": ";", "COLON": ":", "ASSIGN": ":=",
                "LPAREN": "(", "RPAREN": ")"
            },
            "body[]": { "*": { "or": ["var_decl", "procedure", "statement"] } },
            "var_decl": ["VAR", "ID", "SEMI"],
            "procedure": ["PROCEDURE", "ID", "LPAREN", "params", "RPAREN", "block"],
            "params[]": ["param"],
            "param": ["ID", "COLON", "INTEGER"],
            "block": ["BEGIN", "statements", "END"],
            "statements[]": { "*": "statement" },
            "statement": { "or": ["assignment", "call"] },
            "assignment": ["target", "ASSIGN", "value", "SEMI"],
            "target": "ID",
            "value": { "or": ["INTEGER_CONST", "reference"] },
            "reference": "ID",
            "call": ["ID", "LPAREN", "INTEGER_CONST", "RPAREN", "SEMI"],
            "SEMANTICS": {
                "var_decl": { "action": "VarSymbol", "name": "ID" },
                "procedure": {
                    "action": "Procedure", "name": "ID", "params": "params", "block": "block"
                },
                "params": { "action": "VarSymbol", "name": "ID" }
            },
            "INTERPRETER": {
                "procedure": { "action": "Procedure", "name": "ID", "block": "block" },
                "call": { "action": "ProcedureCall", "name": "ID", "args": "INTEGER_CONST" },
                "assignment": { "action": "Assign", "target": "target", "value": "value" },
                "reference": { "action": "Variable", "name": "ID" }
            }
        }"#;
        let (mut interpreter, tree) = load(
            grammar,
            "var y; procedure P(x : integer) begin y := x; end P(7);",
            RecordingHost::new(),
            &Config::default(),
        );

        interpreter.run(&tree).unwrap();
        let record = interpreter.call_stack().last_popped().unwrap();
        assert_eq!(record.name, "P");
        assert_eq!(record.get("x"), Some(&Value::Int(7)));
        assert_eq!(record.get("y"), Some(&Value::Int(7)));

        // the root frame outlives the run
        assert_eq!(interpreter.call_stack().len(), 1);
        assert_eq!(interpreter.call_stack().peek().unwrap().name, "global");
        assert!(interpreter.host().events().is_empty());
    }

    #[test]
    fn test_user_procedure_cannot_yield() {
        let err = run(LED, "effect e; on frame { } x = frame();").unwrap_err();
        assert_eq!(err, Error::runtime("procedure 'frame' does not produce a value"));
    }

    #[test]
    fn test_external_argument_limit() {
        let err = run(LED, "effect e; f(1, 2, 3, 4, 5, 6);").unwrap_err();
        assert!(matches!(err, Error::Runtime(_)));
        assert!(run(LED, "effect e; f(1, 2, 3, 4, 5);").is_ok());
    }

    #[test]
    fn test_recursion_is_bounded() {
        let config = Config {
            max_call_depth: 4,
            ..Config::default()
        };
        let (mut interpreter, tree) = load(
            LED,
            "effect e; on spin { spin(); } spin();",
            RecordingHost::new(),
            &config,
        );

        assert_eq!(
            interpreter.run(&tree).unwrap_err(),
            Error::capacity(Resource::CallStack, 4)
        );
    }

    #[test]
    fn test_run_procedure_entry_point() {
        let (mut interpreter, _) = load(
            LED,
            "effect e; on tick { blink(1); }",
            RecordingHost::new(),
            &Config::default(),
        );

        // the program body never ran, but the handler body is already known
        interpreter.run_procedure("tick").unwrap();
        assert_eq!(interpreter.host().events().len(), 1);
        assert_eq!(interpreter.call_stack().last_popped().unwrap().name, "tick");
        assert_eq!(interpreter.call_stack().peek().unwrap().name, "e");
        assert_eq!(
            interpreter.run_procedure("tock").unwrap_err(),
            Error::runtime("no procedure named 'tock'")
        );
    }
}
