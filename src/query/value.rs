//! Runtime value domain of the query engine.
//!
//! `TypedValue` extends the storable property domain with graph handles
//! and paths, and carries the comparison, arithmetic, and three-valued
//! logic semantics every operator relies on.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{GraphError, Result};
use crate::storage::{EdgeHandle, PropertyValue, VertexHandle, View};

/// Alternating vertex/edge sequence; starts and ends with a vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct PathValue {
    vertices: Vec<VertexHandle>,
    edges: Vec<EdgeHandle>,
}

impl PathValue {
    pub fn new(start: VertexHandle) -> Self {
        Self {
            vertices: vec![start],
            edges: Vec::new(),
        }
    }

    /// Appends one hop; the new edge must connect to the current end.
    pub fn expand(&mut self, edge: EdgeHandle, vertex: VertexHandle) {
        self.edges.push(edge);
        self.vertices.push(vertex);
    }

    /// Path length is the number of edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn vertices(&self) -> &[VertexHandle] {
        &self.vertices
    }

    pub fn edges(&self) -> &[EdgeHandle] {
        &self.edges
    }

    pub fn switch(&mut self, view: View) {
        for vertex in &mut self.vertices {
            vertex.switch(view);
        }
        for edge in &mut self.edges {
            edge.switch(view);
        }
    }
}

/// Tagged union over the runtime value domain.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TypedValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    List(Vec<TypedValue>),
    Map(BTreeMap<String, TypedValue>),
    Vertex(VertexHandle),
    Edge(EdgeHandle),
    Path(PathValue),
}

/// Hashable identity of a value, used for grouping and dedup. Numeric
/// values canonicalize so `1` and `1.0` share a key; Null is its own key
/// equal to itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Null,
    Bool(bool),
    Int(i64),
    Double(u64),
    String(String),
    List(Vec<ValueKey>),
    Map(Vec<(String, ValueKey)>),
    Vertex(u64),
    Edge(u64),
    Path(Vec<u64>),
}

impl TypedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }

    /// True only for `Bool(true)`; filters drop everything else.
    pub fn is_true(&self) -> bool {
        matches!(self, TypedValue::Bool(true))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            TypedValue::Null => "Null",
            TypedValue::Bool(_) => "Bool",
            TypedValue::Int(_) => "Int",
            TypedValue::Double(_) => "Double",
            TypedValue::String(_) => "String",
            TypedValue::List(_) => "List",
            TypedValue::Map(_) => "Map",
            TypedValue::Vertex(_) => "Vertex",
            TypedValue::Edge(_) => "Edge",
            TypedValue::Path(_) => "Path",
        }
    }

    fn as_bool(&self, context: &'static str) -> Result<Option<bool>> {
        match self {
            TypedValue::Null => Ok(None),
            TypedValue::Bool(b) => Ok(Some(*b)),
            other => Err(GraphError::TypeMismatch(format!(
                "{context} requires Bool, got {}",
                other.type_name()
            ))),
        }
    }

    // ---- three-valued logic ---------------------------------------------

    /// `Null AND False == False`; `Null AND True == Null`.
    pub fn and(&self, other: &TypedValue) -> Result<TypedValue> {
        let a = self.as_bool("logical and")?;
        let b = other.as_bool("logical and")?;
        Ok(match (a, b) {
            (Some(false), _) | (_, Some(false)) => TypedValue::Bool(false),
            (Some(true), Some(true)) => TypedValue::Bool(true),
            _ => TypedValue::Null,
        })
    }

    /// `Null OR True == True`; `Null OR False == Null`.
    pub fn or(&self, other: &TypedValue) -> Result<TypedValue> {
        let a = self.as_bool("logical or")?;
        let b = other.as_bool("logical or")?;
        Ok(match (a, b) {
            (Some(true), _) | (_, Some(true)) => TypedValue::Bool(true),
            (Some(false), Some(false)) => TypedValue::Bool(false),
            _ => TypedValue::Null,
        })
    }

    pub fn xor(&self, other: &TypedValue) -> Result<TypedValue> {
        let a = self.as_bool("logical xor")?;
        let b = other.as_bool("logical xor")?;
        Ok(match (a, b) {
            (Some(a), Some(b)) => TypedValue::Bool(a != b),
            _ => TypedValue::Null,
        })
    }

    pub fn not(&self) -> Result<TypedValue> {
        Ok(match self.as_bool("logical not")? {
            Some(b) => TypedValue::Bool(!b),
            None => TypedValue::Null,
        })
    }

    // ---- arithmetic ------------------------------------------------------

    /// Addition: numeric with Int/Double promotion, string concatenation,
    /// list append. Null propagates.
    pub fn add(&self, other: &TypedValue) -> Result<TypedValue> {
        use TypedValue::*;
        Ok(match (self, other) {
            (Null, _) | (_, Null) => Null,
            (Int(a), Int(b)) => Int(a.checked_add(*b).ok_or_else(|| {
                GraphError::Evaluation(format!("integer overflow in {a} + {b}"))
            })?),
            (Int(a), Double(b)) => Double(*a as f64 + b),
            (Double(a), Int(b)) => Double(a + *b as f64),
            (Double(a), Double(b)) => Double(a + b),
            (String(a), String(b)) => String(format!("{a}{b}")),
            (List(a), List(b)) => {
                let mut list = a.clone();
                list.extend(b.iter().cloned());
                List(list)
            }
            (List(a), b) => {
                let mut list = a.clone();
                list.push(b.clone());
                List(list)
            }
            (a, List(b)) => {
                let mut list = vec![a.clone()];
                list.extend(b.iter().cloned());
                List(list)
            }
            (a, b) => {
                return Err(GraphError::TypeMismatch(format!(
                    "cannot add {} and {}",
                    a.type_name(),
                    b.type_name()
                )))
            }
        })
    }

    pub fn sub(&self, other: &TypedValue) -> Result<TypedValue> {
        self.numeric_op(other, "subtract", |a, b| a.checked_sub(b), |a, b| a - b)
    }

    pub fn mul(&self, other: &TypedValue) -> Result<TypedValue> {
        self.numeric_op(other, "multiply", |a, b| a.checked_mul(b), |a, b| a * b)
    }

    /// Division fails on a zero integer divisor; doubles follow IEEE-754.
    pub fn div(&self, other: &TypedValue) -> Result<TypedValue> {
        use TypedValue::*;
        match (self, other) {
            (Null, _) | (_, Null) => Ok(Null),
            (Int(_), Int(0)) => Err(GraphError::Evaluation("integer division by zero".into())),
            (Int(a), Int(b)) => Ok(Int(a / b)),
            (Int(a), Double(b)) => Ok(Double(*a as f64 / b)),
            (Double(a), Int(b)) => Ok(Double(a / *b as f64)),
            (Double(a), Double(b)) => Ok(Double(a / b)),
            (a, b) => Err(GraphError::TypeMismatch(format!(
                "cannot divide {} by {}",
                a.type_name(),
                b.type_name()
            ))),
        }
    }

    pub fn modulo(&self, other: &TypedValue) -> Result<TypedValue> {
        use TypedValue::*;
        match (self, other) {
            (Null, _) | (_, Null) => Ok(Null),
            (Int(_), Int(0)) => Err(GraphError::Evaluation("integer modulo by zero".into())),
            (Int(a), Int(b)) => Ok(Int(a % b)),
            (Int(a), Double(b)) => Ok(Double(*a as f64 % b)),
            (Double(a), Int(b)) => Ok(Double(a % *b as f64)),
            (Double(a), Double(b)) => Ok(Double(a % b)),
            (a, b) => Err(GraphError::TypeMismatch(format!(
                "cannot take {} modulo {}",
                a.type_name(),
                b.type_name()
            ))),
        }
    }

    fn numeric_op(
        &self,
        other: &TypedValue,
        verb: &str,
        int_op: impl Fn(i64, i64) -> Option<i64>,
        double_op: impl Fn(f64, f64) -> f64,
    ) -> Result<TypedValue> {
        use TypedValue::*;
        match (self, other) {
            (Null, _) | (_, Null) => Ok(Null),
            (Int(a), Int(b)) => int_op(*a, *b).map(Int).ok_or_else(|| {
                GraphError::Evaluation(format!("integer overflow in {verb} of {a} and {b}"))
            }),
            (Int(a), Double(b)) => Ok(Double(double_op(*a as f64, *b))),
            (Double(a), Int(b)) => Ok(Double(double_op(*a, *b as f64))),
            (Double(a), Double(b)) => Ok(Double(double_op(*a, *b))),
            (a, b) => Err(GraphError::TypeMismatch(format!(
                "cannot {verb} {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        }
    }

    pub fn negate(&self) -> Result<TypedValue> {
        use TypedValue::*;
        match self {
            Null => Ok(Null),
            Int(a) => a
                .checked_neg()
                .map(Int)
                .ok_or_else(|| GraphError::Evaluation("integer overflow in negation".into())),
            Double(a) => Ok(Double(-a)),
            other => Err(GraphError::TypeMismatch(format!(
                "cannot negate {}",
                other.type_name()
            ))),
        }
    }

    pub fn unary_plus(&self) -> Result<TypedValue> {
        use TypedValue::*;
        match self {
            Null | Int(_) | Double(_) => Ok(self.clone()),
            other => Err(GraphError::TypeMismatch(format!(
                "cannot apply unary plus to {}",
                other.type_name()
            ))),
        }
    }

    // ---- equality and ordering ------------------------------------------

    /// Three-valued equality: Null operands yield Null, disjoint value
    /// categories yield False, numerics compare by value.
    pub fn eq_value(&self, other: &TypedValue) -> TypedValue {
        match self.eq_tri(other) {
            None => TypedValue::Null,
            Some(b) => TypedValue::Bool(b),
        }
    }

    pub fn ne_value(&self, other: &TypedValue) -> TypedValue {
        match self.eq_tri(other) {
            None => TypedValue::Null,
            Some(b) => TypedValue::Bool(!b),
        }
    }

    fn eq_tri(&self, other: &TypedValue) -> Option<bool> {
        use TypedValue::*;
        match (self, other) {
            (Null, _) | (_, Null) => None,
            (Bool(a), Bool(b)) => Some(a == b),
            (Int(a), Int(b)) => Some(a == b),
            (Int(a), Double(b)) | (Double(b), Int(a)) => Some((*a as f64) == *b),
            (Double(a), Double(b)) => Some(a == b),
            (String(a), String(b)) => Some(a == b),
            (List(a), List(b)) => {
                if a.len() != b.len() {
                    return Some(false);
                }
                let mut saw_null = false;
                for (x, y) in a.iter().zip(b) {
                    match x.eq_tri(y) {
                        Some(false) => return Some(false),
                        Some(true) => {}
                        None => saw_null = true,
                    }
                }
                if saw_null {
                    None
                } else {
                    Some(true)
                }
            }
            (Map(a), Map(b)) => {
                if a.len() != b.len() || a.keys().ne(b.keys()) {
                    return Some(false);
                }
                let mut saw_null = false;
                for (x, y) in a.values().zip(b.values()) {
                    match x.eq_tri(y) {
                        Some(false) => return Some(false),
                        Some(true) => {}
                        None => saw_null = true,
                    }
                }
                if saw_null {
                    None
                } else {
                    Some(true)
                }
            }
            (Vertex(a), Vertex(b)) => Some(a == b),
            (Edge(a), Edge(b)) => Some(a == b),
            (Path(a), Path(b)) => Some(a == b),
            _ => Some(false),
        }
    }

    /// Order within comparable categories (both numeric, both string, both
    /// bool); `None` when either side is Null; error otherwise.
    pub fn partial_order(&self, other: &TypedValue) -> Result<Option<Ordering>> {
        use TypedValue::*;
        let ordering = match (self, other) {
            (Null, _) | (_, Null) => return Ok(None),
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Int(a), Double(b)) => compare_doubles(*a as f64, *b)?,
            (Double(a), Int(b)) => compare_doubles(*a, *b as f64)?,
            (Double(a), Double(b)) => compare_doubles(*a, *b)?,
            (String(a), String(b)) => a.cmp(b),
            (a, b) => {
                return Err(GraphError::TypeMismatch(format!(
                    "cannot order {} against {}",
                    a.type_name(),
                    b.type_name()
                )))
            }
        };
        Ok(Some(ordering))
    }

    fn order_op(
        &self,
        other: &TypedValue,
        pick: impl Fn(Ordering) -> bool,
    ) -> Result<TypedValue> {
        Ok(match self.partial_order(other)? {
            None => TypedValue::Null,
            Some(ordering) => TypedValue::Bool(pick(ordering)),
        })
    }

    pub fn lt(&self, other: &TypedValue) -> Result<TypedValue> {
        self.order_op(other, Ordering::is_lt)
    }

    pub fn le(&self, other: &TypedValue) -> Result<TypedValue> {
        self.order_op(other, Ordering::is_le)
    }

    pub fn gt(&self, other: &TypedValue) -> Result<TypedValue> {
        self.order_op(other, Ordering::is_gt)
    }

    pub fn ge(&self, other: &TypedValue) -> Result<TypedValue> {
        self.order_op(other, Ordering::is_ge)
    }

    // ---- identity key ----------------------------------------------------

    /// Hashable grouping/dedup key. Unlike [`TypedValue::eq_value`], Null
    /// here equals Null, so all-Null keys form a single group.
    pub fn key(&self) -> ValueKey {
        match self {
            TypedValue::Null => ValueKey::Null,
            TypedValue::Bool(b) => ValueKey::Bool(*b),
            TypedValue::Int(i) => ValueKey::Int(*i),
            TypedValue::Double(d) => canonical_double_key(*d),
            TypedValue::String(s) => ValueKey::String(s.clone()),
            TypedValue::List(items) => ValueKey::List(items.iter().map(TypedValue::key).collect()),
            TypedValue::Map(map) => {
                ValueKey::Map(map.iter().map(|(k, v)| (k.clone(), v.key())).collect())
            }
            TypedValue::Vertex(v) => ValueKey::Vertex(v.id),
            TypedValue::Edge(e) => ValueKey::Edge(e.id),
            TypedValue::Path(p) => {
                let mut ids = Vec::with_capacity(p.vertices().len() + p.edges().len());
                for (i, vertex) in p.vertices().iter().enumerate() {
                    ids.push(vertex.id);
                    if let Some(edge) = p.edges().get(i) {
                        ids.push(edge.id);
                    }
                }
                ValueKey::Path(ids)
            }
        }
    }

    // ---- view switching --------------------------------------------------

    /// Rewrites every graph handle reachable from this value (including
    /// through lists and maps) to the given view.
    pub fn switch(&mut self, view: View) {
        match self {
            TypedValue::Vertex(v) => v.switch(view),
            TypedValue::Edge(e) => e.switch(view),
            TypedValue::Path(p) => p.switch(view),
            TypedValue::List(items) => {
                for item in items {
                    item.switch(view);
                }
            }
            TypedValue::Map(map) => {
                for value in map.values_mut() {
                    value.switch(view);
                }
            }
            _ => {}
        }
    }
}

fn compare_doubles(a: f64, b: f64) -> Result<Ordering> {
    a.partial_cmp(&b)
        .ok_or_else(|| GraphError::Evaluation("cannot order NaN".into()))
}

fn canonical_double_key(d: f64) -> ValueKey {
    if d.fract() == 0.0 && d >= i64::MIN as f64 && d <= i64::MAX as f64 {
        ValueKey::Int(d as i64)
    } else {
        ValueKey::Double(d.to_bits())
    }
}

impl From<PropertyValue> for TypedValue {
    fn from(value: PropertyValue) -> Self {
        match value {
            PropertyValue::Null => TypedValue::Null,
            PropertyValue::Bool(b) => TypedValue::Bool(b),
            PropertyValue::Int(i) => TypedValue::Int(i),
            PropertyValue::Double(d) => TypedValue::Double(d),
            PropertyValue::String(s) => TypedValue::String(s),
            PropertyValue::List(items) => {
                TypedValue::List(items.into_iter().map(TypedValue::from).collect())
            }
            PropertyValue::Map(map) => TypedValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, TypedValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl TryFrom<TypedValue> for PropertyValue {
    type Error = GraphError;

    fn try_from(value: TypedValue) -> Result<PropertyValue> {
        match value {
            TypedValue::Null => Ok(PropertyValue::Null),
            TypedValue::Bool(b) => Ok(PropertyValue::Bool(b)),
            TypedValue::Int(i) => Ok(PropertyValue::Int(i)),
            TypedValue::Double(d) => Ok(PropertyValue::Double(d)),
            TypedValue::String(s) => Ok(PropertyValue::String(s)),
            TypedValue::List(items) => Ok(PropertyValue::List(
                items
                    .into_iter()
                    .map(PropertyValue::try_from)
                    .collect::<Result<_>>()?,
            )),
            TypedValue::Map(map) => Ok(PropertyValue::Map(
                map.into_iter()
                    .map(|(k, v)| PropertyValue::try_from(v).map(|v| (k, v)))
                    .collect::<Result<_>>()?,
            )),
            other => Err(GraphError::TypeMismatch(format!(
                "{} cannot be stored as a property",
                other.type_name()
            ))),
        }
    }
}

impl From<bool> for TypedValue {
    fn from(value: bool) -> Self {
        TypedValue::Bool(value)
    }
}

impl From<i64> for TypedValue {
    fn from(value: i64) -> Self {
        TypedValue::Int(value)
    }
}

impl From<f64> for TypedValue {
    fn from(value: f64) -> Self {
        TypedValue::Double(value)
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        TypedValue::String(value.to_owned())
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> Self {
        TypedValue::String(value)
    }
}

impl From<VertexHandle> for TypedValue {
    fn from(value: VertexHandle) -> Self {
        TypedValue::Vertex(value)
    }
}

impl From<EdgeHandle> for TypedValue {
    fn from(value: EdgeHandle) -> Self {
        TypedValue::Edge(value)
    }
}

impl From<Vec<TypedValue>> for TypedValue {
    fn from(value: Vec<TypedValue>) -> Self {
        TypedValue::List(value)
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Null => write!(f, "null"),
            TypedValue::Bool(b) => write!(f, "{b}"),
            TypedValue::Int(i) => write!(f, "{i}"),
            TypedValue::Double(d) => write!(f, "{d}"),
            TypedValue::String(s) => write!(f, "{s:?}"),
            TypedValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            TypedValue::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            TypedValue::Vertex(v) => write!(f, "(vertex {})", v.id),
            TypedValue::Edge(e) => write!(f, "[edge {}]", e.id),
            TypedValue::Path(p) => write!(f, "(path of length {})", p.len()),
        }
    }
}
