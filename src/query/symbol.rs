//! Planner-assigned identities for named and anonymous bindings.

use std::collections::HashMap;

use crate::error::{GraphError, Result};
use crate::query::ast::ExprId;

/// Type hint attached to a symbol at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SymbolType {
    #[default]
    Any,
    Vertex,
    Edge,
    Path,
    Number,
}

/// Dense binding identity; immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub position: usize,
    pub name: String,
    pub user_declared: bool,
    pub symbol_type: SymbolType,
}

/// Creates symbols and maps AST node identities onto them.
///
/// Several AST nodes may bind to the same symbol; that is how an
/// expansion's right-hand identifier aliases an already-bound vertex.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    bindings: HashMap<ExprId, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_symbol(
        &mut self,
        name: &str,
        user_declared: bool,
        symbol_type: SymbolType,
    ) -> Symbol {
        let symbol = Symbol {
            position: self.symbols.len(),
            name: name.to_owned(),
            user_declared,
            symbol_type,
        };
        self.symbols.push(symbol.clone());
        symbol
    }

    /// Shorthand for a user-declared symbol with no type hint.
    pub fn create_named(&mut self, name: &str) -> Symbol {
        self.create_symbol(name, true, SymbolType::Any)
    }

    pub fn bind(&mut self, node: ExprId, symbol: &Symbol) {
        self.bindings.insert(node, symbol.position);
    }

    /// Symbol bound to an AST node; an unbound node is a planner bug.
    pub fn at(&self, node: ExprId) -> Result<&Symbol> {
        self.bindings
            .get(&node)
            .map(|position| &self.symbols[*position])
            .ok_or_else(|| {
                GraphError::Internal("expression node has no bound symbol".into())
            })
    }

    /// Number of symbols; the frame size of an execution.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
