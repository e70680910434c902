use crate::config::Config;
use crate::error::{Error, Resource};
use crate::parse_tree::ParseNode;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum SymbolKind {
    Program,
    Procedure,
    Variable,
    Parameter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: String,
    pub declared_type: Option<String>,
    pub nesting_level: usize,
    /// The scope opened by a procedure.
    pub scope: Option<ScopeId>,
    /// Formal parameters of a procedure, in declaration order.
    pub params: Vec<SymbolId>,
    /// Body of a procedure, cached by the interpreter when it visits the definition.
    pub block: Option<Rc<ParseNode>>,
}

impl Symbol {
    pub fn new(kind: SymbolKind, name: &str, nesting_level: usize) -> Self {
        Symbol {
            kind,
            name: name.to_string(),
            declared_type: None,
            nesting_level,
            scope: None,
            params: Vec::new(),
            block: None,
        }
    }

    pub fn with_type(mut self, declared_type: Option<String>) -> Self {
        self.declared_type = declared_type;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    pub name: String,
    pub nesting_level: usize,
    pub enclosing: Option<ScopeId>,
    pub symbols: Vec<SymbolId>,
    pub children: Vec<ScopeId>,
}

/// Every scope and symbol of one program, stored in two arenas and addressed by handle.
///
/// Scopes and symbols are only ever appended, so a handle stays valid for the life of the tree.
#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
    max_scopes: usize,
    max_symbols: usize,
}

impl ScopeTree {
    pub fn new(config: &Config) -> Self {
        Self {
            scopes: Vec::new(),
            symbols: Vec::new(),
            max_scopes: config.max_scopes,
            max_symbols: config.max_symbols,
        }
    }

    /// The first scope opened, which encloses every other.
    pub fn root(&self) -> Option<ScopeId> {
        (!self.scopes.is_empty()).then_some(ScopeId(0))
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0]
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Opens a scope one level deeper than `enclosing`, or at level 1 without one.
    pub fn open_scope(&mut self, name: &str, enclosing: Option<ScopeId>) -> Result<ScopeId, Error> {
        if self.scopes.len() >= self.max_scopes {
            return Err(Error::capacity(Resource::Scopes, self.max_scopes));
        }

        let nesting_level = enclosing.map_or(1, |e| self.scope(e).nesting_level + 1);
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            name: name.to_string(),
            nesting_level,
            enclosing,
            symbols: Vec::new(),
            children: Vec::new(),
        });

        if let Some(enclosing) = enclosing {
            self.scopes[enclosing.0].children.push(id);
        }
        Ok(id)
    }

    /// Declares `symbol` in `scope`. Returns `None`, leaving the first declaration in place,
    /// when the scope already holds a symbol of that name.
    pub fn insert(&mut self, scope: ScopeId, symbol: Symbol) -> Result<Option<SymbolId>, Error> {
        if self.lookup_local(scope, &symbol.name).is_some() {
            return Ok(None);
        }
        if self.symbols.len() >= self.max_symbols {
            return Err(Error::capacity(Resource::Symbols, self.max_symbols));
        }

        let id = SymbolId(self.symbols.len());
        self.symbols.push(symbol);
        self.scopes[scope.0].symbols.push(id);
        Ok(Some(id))
    }

    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.scope(scope)
            .symbols
            .iter()
            .copied()
            .find(|id| self.symbol(*id).name == name)
    }

    fn lookup_descendants(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.scope(scope).children.iter().find_map(|child| {
            self.lookup_local(*child, name)
                .or_else(|| self.lookup_descendants(*child, name))
        })
    }

    /// Searches `scope`, then (with `search_children`) every scope nested inside it, then each
    /// enclosing scope in turn.
    pub fn lookup(&self, scope: ScopeId, name: &str, search_children: bool) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let found = self.lookup_local(id, name).or_else(|| {
                search_children
                    .then(|| self.lookup_descendants(id, name))
                    .flatten()
            });
            if found.is_some() {
                return found;
            }
            current = self.scope(id).enclosing;
        }
        None
    }

    /// Whole-tree lookup used to resolve call targets.
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.lookup(scope, name, true)
    }
}
