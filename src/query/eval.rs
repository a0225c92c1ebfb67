//! Post-order expression evaluation over a frame.

use crate::error::{GraphError, Result};
use crate::query::ast::{AstStorage, Expr, ExprId};
use crate::query::frame::Frame;
use crate::query::symbol::SymbolTable;
use crate::query::value::TypedValue;
use crate::storage::{GraphAccessor, PropertyId, View};

/// Evaluates expressions against a frame, a symbol table and the graph.
///
/// Walks the tree iteratively in post order with an explicit value stack:
/// each visited node pushes its result, parents consume from the top.
/// The `use_new` mode bit decides which record state every surfaced
/// vertex/edge handle exposes; handles inside lists and maps are
/// rewritten too.
pub struct ExpressionEvaluator<'a> {
    frame: &'a Frame,
    symbol_table: &'a SymbolTable,
    ast: &'a AstStorage,
    dba: &'a GraphAccessor,
    use_new: bool,
}

enum Task {
    Visit(ExprId),
    Apply(ExprId),
}

impl<'a> ExpressionEvaluator<'a> {
    pub fn new(
        frame: &'a Frame,
        symbol_table: &'a SymbolTable,
        ast: &'a AstStorage,
        dba: &'a GraphAccessor,
    ) -> Self {
        Self {
            frame,
            symbol_table,
            ast,
            dba,
            use_new: false,
        }
    }

    /// Surface record state as modified by the current command.
    pub fn switch_new(&mut self) -> &mut Self {
        self.use_new = true;
        self
    }

    /// Surface record state from before the current command.
    pub fn switch_old(&mut self) -> &mut Self {
        self.use_new = false;
        self
    }

    fn view(&self) -> View {
        if self.use_new {
            View::New
        } else {
            View::Old
        }
    }

    pub fn eval(&self, root: ExprId) -> Result<TypedValue> {
        let mut tasks = vec![Task::Visit(root)];
        let mut values: Vec<TypedValue> = Vec::new();

        while let Some(task) = tasks.pop() {
            match task {
                Task::Visit(id) => match self.ast.expr(id) {
                    Expr::Identifier { .. } | Expr::Aggregation { .. } => {
                        let symbol = self.symbol_table.at(id)?;
                        let mut value = self.frame[symbol].clone();
                        value.switch(self.view());
                        values.push(value);
                    }
                    Expr::Literal(value) => values.push(value.clone()),
                    other => {
                        tasks.push(Task::Apply(id));
                        // children visit left-to-right, so push in reverse
                        for child in children(other).into_iter().rev() {
                            tasks.push(Task::Visit(child));
                        }
                    }
                },
                Task::Apply(id) => {
                    let result = self.apply(self.ast.expr(id), &mut values)?;
                    values.push(result);
                }
            }
        }

        match (values.pop(), values.is_empty()) {
            (Some(result), true) => Ok(result),
            _ => Err(GraphError::Internal(
                "evaluation left an unbalanced result stack".into(),
            )),
        }
    }

    fn apply(&self, expr: &Expr, values: &mut Vec<TypedValue>) -> Result<TypedValue> {
        let mut pop = || {
            values
                .pop()
                .ok_or_else(|| GraphError::Internal("evaluation result stack empty".into()))
        };
        match expr {
            Expr::And(..) => {
                let rhs = pop()?;
                let lhs = pop()?;
                lhs.and(&rhs)
            }
            Expr::Or(..) => {
                let rhs = pop()?;
                let lhs = pop()?;
                lhs.or(&rhs)
            }
            Expr::Xor(..) => {
                let rhs = pop()?;
                let lhs = pop()?;
                lhs.xor(&rhs)
            }
            Expr::Not(..) => pop()?.not(),
            Expr::Add(..) => {
                let rhs = pop()?;
                let lhs = pop()?;
                lhs.add(&rhs)
            }
            Expr::Sub(..) => {
                let rhs = pop()?;
                let lhs = pop()?;
                lhs.sub(&rhs)
            }
            Expr::Mul(..) => {
                let rhs = pop()?;
                let lhs = pop()?;
                lhs.mul(&rhs)
            }
            Expr::Div(..) => {
                let rhs = pop()?;
                let lhs = pop()?;
                lhs.div(&rhs)
            }
            Expr::Mod(..) => {
                let rhs = pop()?;
                let lhs = pop()?;
                lhs.modulo(&rhs)
            }
            Expr::Eq(..) => {
                let rhs = pop()?;
                let lhs = pop()?;
                Ok(lhs.eq_value(&rhs))
            }
            Expr::Ne(..) => {
                let rhs = pop()?;
                let lhs = pop()?;
                Ok(lhs.ne_value(&rhs))
            }
            Expr::Lt(..) => {
                let rhs = pop()?;
                let lhs = pop()?;
                lhs.lt(&rhs)
            }
            Expr::Gt(..) => {
                let rhs = pop()?;
                let lhs = pop()?;
                lhs.gt(&rhs)
            }
            Expr::Le(..) => {
                let rhs = pop()?;
                let lhs = pop()?;
                lhs.le(&rhs)
            }
            Expr::Ge(..) => {
                let rhs = pop()?;
                let lhs = pop()?;
                lhs.ge(&rhs)
            }
            Expr::UnaryPlus(..) => pop()?.unary_plus(),
            Expr::UnaryMinus(..) => pop()?.negate(),
            Expr::IsNull(..) => {
                let operand = pop()?;
                Ok(TypedValue::Bool(operand.is_null()))
            }
            Expr::PropertyLookup { property, .. } => {
                let operand = pop()?;
                self.lookup_property(operand, *property)
            }
            Expr::ListLiteral(items) => {
                let mut list = Vec::with_capacity(items.len());
                for _ in items {
                    list.push(pop()?);
                }
                list.reverse();
                Ok(TypedValue::List(list))
            }
            Expr::MapLiteral(entries) => {
                let mut entry_values = Vec::with_capacity(entries.len());
                for _ in entries {
                    entry_values.push(pop()?);
                }
                entry_values.reverse();
                Ok(TypedValue::Map(
                    entries
                        .iter()
                        .map(|(key, _)| key.clone())
                        .zip(entry_values)
                        .collect(),
                ))
            }
            Expr::Identifier { .. } | Expr::Literal(_) | Expr::Aggregation { .. } => Err(
                GraphError::Internal("leaf expression reached apply phase".into()),
            ),
        }
    }

    fn lookup_property(&self, operand: TypedValue, property: PropertyId) -> Result<TypedValue> {
        match operand {
            TypedValue::Null => Ok(TypedValue::Null),
            TypedValue::Vertex(handle) => self
                .dba
                .vertex_property(&handle, property)
                .map(TypedValue::from),
            TypedValue::Edge(handle) => self
                .dba
                .edge_property(&handle, property)
                .map(TypedValue::from),
            TypedValue::Map(map) => {
                let key = self.dba.property_name(property).ok_or_else(|| {
                    GraphError::Internal("property lookup with uninterned key".into())
                })?;
                Ok(map.get(&key).cloned().unwrap_or(TypedValue::Null))
            }
            other => Err(GraphError::TypeMismatch(format!(
                "expected a vertex, edge or map for property lookup, got {}",
                other.type_name()
            ))),
        }
    }
}

fn children(expr: &Expr) -> Vec<ExprId> {
    match expr {
        Expr::Identifier { .. } | Expr::Literal(_) | Expr::Aggregation { .. } => Vec::new(),
        Expr::PropertyLookup { expression, .. }
        | Expr::Not(expression)
        | Expr::UnaryPlus(expression)
        | Expr::UnaryMinus(expression)
        | Expr::IsNull(expression) => vec![*expression],
        Expr::And(a, b)
        | Expr::Or(a, b)
        | Expr::Xor(a, b)
        | Expr::Add(a, b)
        | Expr::Sub(a, b)
        | Expr::Mul(a, b)
        | Expr::Div(a, b)
        | Expr::Mod(a, b)
        | Expr::Eq(a, b)
        | Expr::Ne(a, b)
        | Expr::Lt(a, b)
        | Expr::Gt(a, b)
        | Expr::Le(a, b)
        | Expr::Ge(a, b) => vec![*a, *b],
        Expr::ListLiteral(items) => items.clone(),
        Expr::MapLiteral(entries) => entries.iter().map(|(_, id)| *id).collect(),
    }
}
