//! Expression trees evaluated against a frame.
//!
//! Nodes live in an [`AstStorage`] arena and are addressed by [`ExprId`],
//! which doubles as the node identity the symbol table binds against.
//! Two identifiers may deliberately share one symbol (an expansion reusing
//! an already-bound vertex), so identity must outlive tree rewrites;
//! arena ids give that without pointer tricks.

use crate::query::value::TypedValue;
use crate::storage::PropertyId;

/// Identity of an expression node within one [`AstStorage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(u32);

/// Aggregation kinds understood by the Aggregate operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationOp {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Collect,
}

#[derive(Debug, Clone)]
pub enum Expr {
    /// Named binding; reads the frame slot of its symbol.
    Identifier { name: String },
    Literal(TypedValue),
    /// `expression.property`; on a map value the property name is the key.
    PropertyLookup {
        expression: ExprId,
        property: PropertyId,
    },
    ListLiteral(Vec<ExprId>),
    MapLiteral(Vec<(String, ExprId)>),
    And(ExprId, ExprId),
    Or(ExprId, ExprId),
    Xor(ExprId, ExprId),
    Not(ExprId),
    Add(ExprId, ExprId),
    Sub(ExprId, ExprId),
    Mul(ExprId, ExprId),
    Div(ExprId, ExprId),
    Mod(ExprId, ExprId),
    Eq(ExprId, ExprId),
    Ne(ExprId, ExprId),
    Lt(ExprId, ExprId),
    Gt(ExprId, ExprId),
    Le(ExprId, ExprId),
    Ge(ExprId, ExprId),
    UnaryPlus(ExprId),
    UnaryMinus(ExprId),
    IsNull(ExprId),
    /// Reads the frame slot the Aggregate operator filled for this node.
    /// `expression` is what the operator folds; `None` means `count(*)`.
    Aggregation {
        op: AggregationOp,
        expression: Option<ExprId>,
    },
}

/// Projection column: a name paired with the expression producing it.
#[derive(Debug, Clone)]
pub struct NamedExpr {
    pub name: String,
    pub expression: ExprId,
    /// Identity used to bind the output symbol of this projection.
    pub id: ExprId,
}

/// Arena owning every expression node of one plan.
#[derive(Debug, Default)]
pub struct AstStorage {
    exprs: Vec<Expr>,
}

impl AstStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(expr);
        id
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    // Convenience builders used by planners and tests.

    pub fn ident(&mut self, name: &str) -> ExprId {
        self.add(Expr::Identifier {
            name: name.to_owned(),
        })
    }

    pub fn literal(&mut self, value: impl Into<TypedValue>) -> ExprId {
        self.add(Expr::Literal(value.into()))
    }

    pub fn property_lookup(&mut self, expression: ExprId, property: PropertyId) -> ExprId {
        self.add(Expr::PropertyLookup {
            expression,
            property,
        })
    }

    pub fn list(&mut self, items: Vec<ExprId>) -> ExprId {
        self.add(Expr::ListLiteral(items))
    }

    pub fn and(&mut self, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.add(Expr::And(lhs, rhs))
    }

    pub fn or(&mut self, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.add(Expr::Or(lhs, rhs))
    }

    pub fn not(&mut self, operand: ExprId) -> ExprId {
        self.add(Expr::Not(operand))
    }

    pub fn add_op(&mut self, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.add(Expr::Add(lhs, rhs))
    }

    pub fn eq(&mut self, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.add(Expr::Eq(lhs, rhs))
    }

    pub fn lt(&mut self, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.add(Expr::Lt(lhs, rhs))
    }

    pub fn is_null(&mut self, operand: ExprId) -> ExprId {
        self.add(Expr::IsNull(operand))
    }

    pub fn aggregation(&mut self, op: AggregationOp, expression: Option<ExprId>) -> ExprId {
        self.add(Expr::Aggregation { op, expression })
    }

    /// Builds a projection column; the returned `id` is a fresh node the
    /// planner binds the output symbol to.
    pub fn named_expr(&mut self, name: &str, expression: ExprId) -> NamedExpr {
        let id = self.add(Expr::Identifier {
            name: name.to_owned(),
        });
        NamedExpr {
            name: name.to_owned(),
            expression,
            id,
        }
    }
}
