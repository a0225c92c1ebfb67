//! Dense-id interning of label, edge-type, and property names.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::trace;

/// Interned label identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelId(pub u32);

/// Interned edge-type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeTypeId(pub u32);

/// Interned property-key identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyId(pub u32);

#[derive(Default)]
struct Interner {
    by_name: HashMap<String, u32>,
    names: Vec<String>,
}

impl Interner {
    fn intern(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = self.names.len() as u32;
        self.names.push(name.to_owned());
        self.by_name.insert(name.to_owned(), id);
        id
    }

    fn resolve(&self, id: u32) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }
}

/// Two-way name dictionary shared by every transaction of a store.
///
/// The same name always resolves to the same id; ids are dense and never
/// reused.
#[derive(Default)]
pub struct Catalog {
    labels: RwLock<Interner>,
    edge_types: RwLock<Interner>,
    properties: RwLock<Interner>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(&self, name: &str) -> LabelId {
        let id = self.labels.write().intern(name);
        trace!(name, id, "interned label");
        LabelId(id)
    }

    pub fn edge_type(&self, name: &str) -> EdgeTypeId {
        let id = self.edge_types.write().intern(name);
        trace!(name, id, "interned edge type");
        EdgeTypeId(id)
    }

    pub fn property(&self, name: &str) -> PropertyId {
        let id = self.properties.write().intern(name);
        trace!(name, id, "interned property");
        PropertyId(id)
    }

    pub fn label_name(&self, id: LabelId) -> Option<String> {
        self.labels.read().resolve(id.0).map(str::to_owned)
    }

    pub fn edge_type_name(&self, id: EdgeTypeId) -> Option<String> {
        self.edge_types.read().resolve(id.0).map(str::to_owned)
    }

    pub fn property_name(&self, id: PropertyId) -> Option<String> {
        self.properties.read().resolve(id.0).map(str::to_owned)
    }
}
