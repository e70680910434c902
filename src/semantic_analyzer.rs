use crate::config::Config;
use crate::error::{Error, Warning};
use crate::grammar::{Grammar, SemanticAction};
use crate::parse_tree::ParseNode;
use crate::source_location::SourceSpan;
use crate::symbol_table::{ScopeId, ScopeTree, Symbol, SymbolId, SymbolKind};

// name of the scope opened for declarations that appear outside any program
const IMPLICIT_ROOT: &str = "global";

/// Builds the scope tree of a parsed program, guided by the grammar's `SEMANTICS` table.
///
/// Problems that do not stop the program from running (duplicate declarations, references to
/// names nothing declares) are collected as warnings.
pub struct SemanticAnalyzer<'a> {
    grammar: &'a Grammar,
    scopes: ScopeTree,
    current: Option<ScopeId>,
    // the procedure whose parameter list is being visited
    declaring_params: Option<SymbolId>,
    warnings: Vec<Warning>,
}

impl<'a> SemanticAnalyzer<'a> {
    pub fn new(grammar: &'a Grammar, config: &Config) -> Self {
        Self {
            grammar,
            scopes: ScopeTree::new(config),
            current: None,
            declaring_params: None,
            warnings: Vec::new(),
        }
    }

    pub fn analyze(mut self, root: &ParseNode) -> Result<(ScopeTree, Vec<Warning>), Error> {
        self.visit(root)?;
        Ok((self.scopes, self.warnings))
    }

    fn warn(&mut self, message: String, location: Option<SourceSpan>) {
        self.warnings.push(Warning::semantic(message, location));
    }

    fn malformed(&mut self, node: &ParseNode, hint: &str) {
        self.warnings.push(Warning::malformed(
            format!("'{}' node has no '{hint}' field", node.tag()),
            node.location(),
        ));
    }

    fn current_scope(&mut self) -> Result<ScopeId, Error> {
        match self.current {
            Some(scope) => Ok(scope),
            None => {
                let scope = self.scopes.open_scope(IMPLICIT_ROOT, None)?;
                self.current = Some(scope);
                Ok(scope)
            }
        }
    }

    fn visit(&mut self, node: &ParseNode) -> Result<(), Error> {
        if node.is_leaf() {
            return Ok(());
        }

        let grammar = self.grammar;
        match grammar.semantic_action(node.tag()) {
            Some(SemanticAction::Program { block, name }) => {
                self.visit_program(node, block, name.as_deref())
            }
            Some(SemanticAction::Procedure {
                name,
                params,
                block,
            }) => self.visit_procedure(node, name, params.as_deref(), block),
            Some(SemanticAction::VarSymbol { name, type_ }) => {
                self.visit_var_symbol(node, name, type_.as_deref())
            }
            Some(SemanticAction::Assign { value }) => match node.field(value) {
                Some(value) => self.visit(value),
                None => {
                    self.malformed(node, value);
                    Ok(())
                }
            },
            Some(SemanticAction::Variable { name }) => self.visit_variable(node, name),
            None => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: &ParseNode) -> Result<(), Error> {
        for child in node.children() {
            self.visit(child)?;
        }
        Ok(())
    }

    fn visit_program(
        &mut self,
        node: &ParseNode,
        block: &str,
        name: Option<&str>,
    ) -> Result<(), Error> {
        let program_name = name
            .and_then(|hint| node.field(hint))
            .and_then(|n| n.text())
            .unwrap_or(node.tag())
            .to_string();

        let scope = self.scopes.open_scope(&program_name, self.current)?;
        let level = self.scopes.scope(scope).nesting_level;
        let mut symbol = Symbol::new(SymbolKind::Program, &program_name, level);
        symbol.scope = Some(scope);
        self.scopes.insert(scope, symbol)?;

        let enclosing = self.current.replace(scope);
        let result = match node.field(block) {
            Some(block) => self.visit(block),
            None => {
                self.malformed(node, block);
                Ok(())
            }
        };
        self.current = enclosing;
        result
    }

    fn visit_procedure(
        &mut self,
        node: &ParseNode,
        name: &str,
        params: Option<&str>,
        block: &str,
    ) -> Result<(), Error> {
        let Some(procedure_name) = node.field(name).and_then(|n| n.text()) else {
            self.malformed(node, name);
            return Ok(());
        };

        let scope = self.current_scope()?;
        let level = self.scopes.scope(scope).nesting_level;
        let Some(procedure) = self
            .scopes
            .insert(scope, Symbol::new(SymbolKind::Procedure, procedure_name, level))?
        else {
            let scope_name = &self.scopes.scope(scope).name;
            let message =
                format!("duplicate declaration of '{procedure_name}' in scope '{scope_name}'");
            self.warn(message, node.location());
            return Ok(());
        };

        let inner = self.scopes.open_scope(procedure_name, Some(scope))?;
        self.scopes.symbol_mut(procedure).scope = Some(inner);

        let enclosing = self.current.replace(inner);
        let result = self.visit_procedure_body(node, procedure, params, block);
        self.declaring_params = None;
        self.current = enclosing;
        result
    }

    fn visit_procedure_body(
        &mut self,
        node: &ParseNode,
        procedure: SymbolId,
        params: Option<&str>,
        block: &str,
    ) -> Result<(), Error> {
        // a procedure without parameters simply has no params field
        if let Some(params) = params.and_then(|hint| node.field(hint)) {
            self.declaring_params = Some(procedure);
            self.visit(params)?;
            self.declaring_params = None;
        }

        match node.field(block) {
            Some(block) => self.visit(block),
            None => {
                self.malformed(node, block);
                Ok(())
            }
        }
    }

    fn visit_var_symbol(
        &mut self,
        node: &ParseNode,
        name: &str,
        type_: Option<&str>,
    ) -> Result<(), Error> {
        match node {
            ParseNode::List { items, .. } => {
                for item in items {
                    match &**item {
                        ParseNode::Leaf { .. } => {
                            // a bare name in a list of declarations has no type
                            for id in item.identifiers() {
                                self.declare(id, None, item.location())?;
                            }
                        }
                        declaration => self.declare_all(declaration, name, type_)?,
                    }
                }
                Ok(())
            }
            _ => self.declare_all(node, name, type_),
        }
    }

    fn declare_all(
        &mut self,
        declaration: &ParseNode,
        name: &str,
        type_: Option<&str>,
    ) -> Result<(), Error> {
        let Some(names) = declaration.field(name) else {
            self.malformed(declaration, name);
            return Ok(());
        };

        let declared_type = type_
            .and_then(|hint| declaration.field(hint))
            .and_then(|t| t.text())
            .map(str::to_string);

        for id in names.identifiers() {
            self.declare(id, declared_type.clone(), names.location())?;
        }
        Ok(())
    }

    fn declare(
        &mut self,
        name: &str,
        declared_type: Option<String>,
        location: Option<SourceSpan>,
    ) -> Result<(), Error> {
        let scope = self.current_scope()?;
        let level = self.scopes.scope(scope).nesting_level;
        let kind = match self.declaring_params {
            Some(_) => SymbolKind::Parameter,
            None => SymbolKind::Variable,
        };

        let symbol = Symbol::new(kind, name, level).with_type(declared_type);
        match self.scopes.insert(scope, symbol)? {
            Some(id) => {
                if let Some(procedure) = self.declaring_params {
                    self.scopes.symbol_mut(procedure).params.push(id);
                }
            }
            None => {
                let scope_name = &self.scopes.scope(scope).name;
                let message = format!("duplicate declaration of '{name}' in scope '{scope_name}'");
                self.warn(message, location);
            }
        }
        Ok(())
    }

    fn visit_variable(&mut self, node: &ParseNode, name: &str) -> Result<(), Error> {
        let Some(variable) = node.field(name).and_then(|n| n.text()) else {
            self.malformed(node, name);
            return Ok(());
        };

        let resolved = self
            .current
            .and_then(|scope| self.scopes.lookup(scope, variable, false));
        if resolved.is_none() {
            self.warn(format!("'{variable}' is not declared"), node.location());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WarningKind;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn analyze(grammar: &str, source: &str) -> (ScopeTree, Vec<Warning>) {
        let grammar = Grammar::from_json(grammar).unwrap();
        let tree = parse(&grammar, source, &Config::default()).unwrap();
        SemanticAnalyzer::new(&grammar, &Config::default())
            .analyze(&tree)
            .unwrap()
    }

    fn pascal(source: &str) -> (ScopeTree, Vec<Warning>) {
        analyze(include_str!("../grammars/pascal.json"), source)
    }

    fn names(tree: &ScopeTree, scope: ScopeId) -> Vec<(SymbolKind, String)> {
        tree.scope(scope)
            .symbols
            .iter()
            .map(|id| (tree.symbol(*id).kind, tree.symbol(*id).name.clone()))
            .collect()
    }

    #[test]
    fn test_program_and_procedure_scopes() {
        let (tree, warnings) = pascal(
            "PROGRAM Main; VAR a, b : INTEGER; \
             PROCEDURE Show(x : INTEGER; scale : REAL); VAR total : INTEGER; \
             BEGIN total := x * scale END; \
             BEGIN a := 1 END.",
        );
        assert_eq!(warnings, vec![]);

        let root = tree.root().unwrap();
        assert_eq!(tree.scope(root).name, "Main");
        assert_eq!(
            names(&tree, root),
            vec![
                (SymbolKind::Program, "Main".to_string()),
                (SymbolKind::Variable, "a".to_string()),
                (SymbolKind::Variable, "b".to_string()),
                (SymbolKind::Procedure, "Show".to_string()),
            ]
        );

        let show = tree.lookup_local(root, "Show").unwrap();
        let inner = tree.symbol(show).scope.unwrap();
        assert_eq!(tree.scope(inner).nesting_level, 2);
        assert_eq!(
            names(&tree, inner),
            vec![
                (SymbolKind::Parameter, "x".to_string()),
                (SymbolKind::Parameter, "scale".to_string()),
                (SymbolKind::Variable, "total".to_string()),
            ]
        );

        let params: Vec<&str> = tree
            .symbol(show)
            .params
            .iter()
            .map(|id| tree.symbol(*id).name.as_str())
            .collect();
        assert_eq!(params, vec!["x", "scale"]);

        let scale = tree.lookup_local(inner, "scale").unwrap();
        assert_eq!(tree.symbol(scale).declared_type.as_deref(), Some("REAL"));
        assert_eq!(tree.symbol(scale).nesting_level, 2);
    }

    #[test]
    fn test_duplicate_declaration_warns() {
        let (tree, warnings) = pascal("PROGRAM p; VAR a : INTEGER; a : REAL; BEGIN END.");

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::Semantic);
        assert_eq!(
            warnings[0].message,
            "duplicate declaration of 'a' in scope 'p'"
        );

        let root = tree.root().unwrap();
        let a = tree.lookup_local(root, "a").unwrap();
        assert_eq!(tree.symbol(a).declared_type.as_deref(), Some("INTEGER"));
    }

    #[test]
    fn test_undeclared_variable_warns() {
        let (_, warnings) = pascal("PROGRAM p; VAR a : INTEGER; BEGIN a := b + 1 END.");

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, "'b' is not declared");
        assert_eq!(warnings[0].location.unwrap().start.column, 40);
    }

    #[test]
    fn test_assignment_target_is_not_a_reference() {
        let (_, warnings) = pascal("PROGRAM p; BEGIN a := 1 END.");
        assert_eq!(warnings, vec![]);
    }

    #[test]
    fn test_declarations_without_program_open_global_scope() {
        let (tree, warnings) = analyze(
            r#"{
                "TOKENS": { "VAR": "var", "SEMI": ";", "COMMA": "," },
                "program[]": { "*": "decl" },
                "decl": ["VAR", "names", "SEMI"],
                "names[]": ["ID", { "*": ["COMMA", "ID"] }],
                "SEMANTICS": { "decl": { "action": "VarSymbol", "name": "names" } }
            }"#,
            "var a, b; var c;",
        );
        assert_eq!(warnings, vec![]);

        let root = tree.root().unwrap();
        assert_eq!(tree.scope(root).name, "global");
        assert_eq!(tree.scope(root).nesting_level, 1);
        assert_eq!(tree.scope(root).symbols.len(), 3);
    }

    #[test]
    fn test_var_symbol_on_list_of_names() {
        let (tree, _) = analyze(
            r#"{
                "TOKENS": { "COMMA": "," },
                "program[]": ["ID", { "*": ["COMMA", "ID"] }],
                "SEMANTICS": { "program": { "action": "VarSymbol", "name": "ID" } }
            }"#,
            "a, b, c",
        );

        let root = tree.root().unwrap();
        let declared: Vec<String> = names(&tree, root).into_iter().map(|(_, n)| n).collect();
        assert_eq!(declared, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_symbol_capacity() {
        let grammar = Grammar::from_json(include_str!("../grammars/pascal.json")).unwrap();
        let tree = parse(
            &grammar,
            "PROGRAM p; VAR a, b, c : INTEGER; BEGIN END.",
            &Config::default(),
        )
        .unwrap();
        let config = Config {
            max_symbols: 2,
            ..Config::default()
        };

        let err = SemanticAnalyzer::new(&grammar, &config)
            .analyze(&tree)
            .unwrap_err();
        assert!(matches!(err, Error::Capacity { .. }));
    }
}
