//! Transaction-scoped graph access with dual old/new visibility.
//!
//! A [`GraphAccessor`] pins a committed snapshot and overlays a
//! transaction-local delta keyed by command number. Writes land in the
//! delta under the current command: visible under the NEW view
//! immediately, under OLD only once `advance_command` promotes them.
//! `commit` folds the delta into the shared store; `abort` discards it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::storage::catalog::{Catalog, EdgeTypeId, LabelId, PropertyId};
use crate::storage::store::{
    CommandId, CommitDelta, CommitId, EdgeData, GraphStore, PropertyMap, TransactionId,
    VertexData,
};
use crate::storage::{EdgeId, PropertyValue, VertexId, View};

/// Reference to a vertex plus the view its reads go through.
///
/// Identity excludes the view: two handles to the same vertex compare equal
/// regardless of their view tags.
#[derive(Debug, Clone, Copy)]
pub struct VertexHandle {
    pub id: VertexId,
    pub view: View,
}

impl VertexHandle {
    pub fn switch_old(&mut self) {
        self.view = View::Old;
    }

    pub fn switch_new(&mut self) {
        self.view = View::New;
    }

    pub fn switch(&mut self, view: View) {
        self.view = view;
    }
}

impl PartialEq for VertexHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for VertexHandle {}

impl std::hash::Hash for VertexHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Reference to an edge plus the view its property reads go through.
///
/// Endpoints and edge type are immutable, so they are carried inline.
/// Identity excludes the view.
#[derive(Debug, Clone, Copy)]
pub struct EdgeHandle {
    pub id: EdgeId,
    pub from: VertexId,
    pub to: VertexId,
    pub edge_type: EdgeTypeId,
    pub view: View,
}

impl EdgeHandle {
    pub fn switch_old(&mut self) {
        self.view = View::Old;
    }

    pub fn switch_new(&mut self) {
        self.view = View::New;
    }

    pub fn switch(&mut self, view: View) {
        self.view = view;
    }

    /// Handle of the source vertex, inheriting this handle's view.
    pub fn from_vertex(&self) -> VertexHandle {
        VertexHandle {
            id: self.from,
            view: self.view,
        }
    }

    /// Handle of the destination vertex, inheriting this handle's view.
    pub fn to_vertex(&self) -> VertexHandle {
        VertexHandle {
            id: self.to,
            view: self.view,
        }
    }
}

impl PartialEq for EdgeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EdgeHandle {}

impl std::hash::Hash for EdgeHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Debug)]
struct DeltaEntry<T> {
    command: CommandId,
    data: Option<T>,
}

#[derive(Default)]
struct TxDelta {
    command: CommandId,
    vertices: BTreeMap<VertexId, Vec<DeltaEntry<VertexData>>>,
    edges: BTreeMap<EdgeId, Vec<DeltaEntry<EdgeData>>>,
    /// Adjacency for edges created in this transaction, in issue order.
    out_adjacency: HashMap<VertexId, Vec<EdgeId>>,
    in_adjacency: HashMap<VertexId, Vec<EdgeId>>,
}

impl TxDelta {
    /// The delta's verdict on a record under `view`: `None` when the delta
    /// holds no qualifying entry, `Some(None)` when it deleted the record,
    /// `Some(Some(_))` when it rewrote it.
    fn vertex_opinion(&self, id: VertexId, view: View) -> Option<Option<VertexData>> {
        let entries = self.vertices.get(&id)?;
        let entry = match view {
            View::New => entries.last(),
            View::Old => entries.iter().rev().find(|e| e.command < self.command),
        }?;
        Some(entry.data.clone())
    }

    fn edge_opinion(&self, id: EdgeId, view: View) -> Option<Option<EdgeData>> {
        let entries = self.edges.get(&id)?;
        let entry = match view {
            View::New => entries.last(),
            View::Old => entries.iter().rev().find(|e| e.command < self.command),
        }?;
        Some(entry.data.clone())
    }

    fn record_vertex(&mut self, id: VertexId, data: Option<VertexData>) {
        let command = self.command;
        let entries = self.vertices.entry(id).or_default();
        match entries.last_mut() {
            Some(last) if last.command == command => last.data = data,
            _ => entries.push(DeltaEntry { command, data }),
        }
    }

    fn record_edge(&mut self, id: EdgeId, data: Option<EdgeData>) {
        let command = self.command;
        let entries = self.edges.entry(id).or_default();
        match entries.last_mut() {
            Some(last) if last.command == command => last.data = data,
            _ => entries.push(DeltaEntry { command, data }),
        }
    }
}

/// Versioned view of the graph owned by one transaction.
///
/// All reads resolve through the handle's view; all writes go to the NEW
/// side of the current command. The accessor is single-owner per query
/// execution but uses interior mutability so cursors can write through a
/// shared reference.
pub struct GraphAccessor {
    store: Arc<GraphStore>,
    transaction_id: TransactionId,
    snapshot: CommitId,
    delta: Mutex<TxDelta>,
}

impl GraphAccessor {
    pub(crate) fn new(
        store: Arc<GraphStore>,
        transaction_id: TransactionId,
        snapshot: CommitId,
    ) -> Self {
        Self {
            store,
            transaction_id,
            snapshot,
            delta: Mutex::new(TxDelta::default()),
        }
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    // ---- name interning -------------------------------------------------

    pub fn label(&self, name: &str) -> LabelId {
        self.store.catalog().label(name)
    }

    pub fn edge_type(&self, name: &str) -> EdgeTypeId {
        self.store.catalog().edge_type(name)
    }

    pub fn property(&self, name: &str) -> PropertyId {
        self.store.catalog().property(name)
    }

    pub fn label_name(&self, id: LabelId) -> Option<String> {
        self.store.catalog().label_name(id)
    }

    pub fn edge_type_name(&self, id: EdgeTypeId) -> Option<String> {
        self.store.catalog().edge_type_name(id)
    }

    pub fn property_name(&self, id: PropertyId) -> Option<String> {
        self.store.catalog().property_name(id)
    }

    pub fn catalog(&self) -> &Catalog {
        self.store.catalog()
    }

    // ---- record resolution ----------------------------------------------

    fn committed_vertex(&self, id: VertexId) -> Option<VertexData> {
        self.store
            .with_inner(|inner| inner.vertex_at(id, self.snapshot).cloned())
    }

    fn committed_edge(&self, id: EdgeId) -> Option<EdgeData> {
        self.store
            .with_inner(|inner| inner.edge_at(id, self.snapshot).cloned())
    }

    /// State of a vertex under `view`, as scans and probes see it: strict
    /// visibility, no cross-view fallback.
    fn vertex_state(&self, id: VertexId, view: View) -> Option<VertexData> {
        match self.delta.lock().vertex_opinion(id, view) {
            Some(state) => state,
            None => self.committed_vertex(id),
        }
    }

    fn edge_state(&self, id: EdgeId, view: View) -> Option<EdgeData> {
        match self.delta.lock().edge_opinion(id, view) {
            Some(state) => state,
            None => self.committed_edge(id),
        }
    }

    fn other_view(view: View) -> View {
        match view {
            View::Old => View::New,
            View::New => View::Old,
        }
    }

    /// Record state for reads through a bound handle. A record born in the
    /// current command has no OLD state yet, so reads fall through to the
    /// other view (the old-else-new switch of record accessors); only a
    /// record gone from both views fails.
    fn require_vertex(&self, handle: &VertexHandle) -> Result<VertexData> {
        self.vertex_state(handle.id, handle.view)
            .or_else(|| self.vertex_state(handle.id, Self::other_view(handle.view)))
            .ok_or_else(|| GraphError::Evaluation(format!("vertex {} was deleted", handle.id)))
    }

    fn require_edge(&self, handle: &EdgeHandle) -> Result<EdgeData> {
        self.edge_state(handle.id, handle.view)
            .or_else(|| self.edge_state(handle.id, Self::other_view(handle.view)))
            .ok_or_else(|| GraphError::Evaluation(format!("edge {} was deleted", handle.id)))
    }

    /// Refreshes a possibly stale vertex handle: true iff the vertex still
    /// exists in at least one view.
    pub fn reconstruct_vertex(&self, handle: &VertexHandle) -> bool {
        self.vertex_state(handle.id, View::Old).is_some()
            || self.vertex_state(handle.id, View::New).is_some()
    }

    pub fn reconstruct_edge(&self, handle: &EdgeHandle) -> bool {
        self.edge_state(handle.id, View::Old).is_some()
            || self.edge_state(handle.id, View::New).is_some()
    }

    // ---- vertex reads ---------------------------------------------------

    pub fn labels(&self, handle: &VertexHandle) -> Result<Vec<LabelId>> {
        Ok(self.require_vertex(handle)?.labels.to_vec())
    }

    pub fn has_label(&self, handle: &VertexHandle, label: LabelId) -> Result<bool> {
        Ok(self.require_vertex(handle)?.labels.contains(&label))
    }

    /// Property under the handle's view; absent keys read as Null.
    pub fn vertex_property(
        &self,
        handle: &VertexHandle,
        property: PropertyId,
    ) -> Result<PropertyValue> {
        Ok(self
            .require_vertex(handle)?
            .properties
            .get(&property)
            .cloned()
            .unwrap_or(PropertyValue::Null))
    }

    pub fn vertex_properties(
        &self,
        handle: &VertexHandle,
    ) -> Result<BTreeMap<PropertyId, PropertyValue>> {
        Ok(self.require_vertex(handle)?.properties)
    }

    // ---- edge reads -----------------------------------------------------

    pub fn edge_property(
        &self,
        handle: &EdgeHandle,
        property: PropertyId,
    ) -> Result<PropertyValue> {
        Ok(self
            .require_edge(handle)?
            .properties
            .get(&property)
            .cloned()
            .unwrap_or(PropertyValue::Null))
    }

    pub fn edge_properties(
        &self,
        handle: &EdgeHandle,
    ) -> Result<BTreeMap<PropertyId, PropertyValue>> {
        Ok(self.require_edge(handle)?.properties)
    }

    // ---- writes ---------------------------------------------------------

    pub fn insert_vertex(&self) -> VertexHandle {
        let id = self.store.allocate_vertex_id();
        self.delta.lock().record_vertex(id, Some(VertexData::default()));
        VertexHandle {
            id,
            view: View::New,
        }
    }

    pub fn insert_edge(
        &self,
        from: &VertexHandle,
        to: &VertexHandle,
        edge_type: EdgeTypeId,
    ) -> Result<EdgeHandle> {
        if self.vertex_state(from.id, View::New).is_none() {
            return Err(GraphError::Constraint(format!(
                "edge source vertex {} was deleted",
                from.id
            )));
        }
        if self.vertex_state(to.id, View::New).is_none() {
            return Err(GraphError::Constraint(format!(
                "edge destination vertex {} was deleted",
                to.id
            )));
        }
        let id = self.store.allocate_edge_id();
        let mut delta = self.delta.lock();
        delta.record_edge(
            id,
            Some(EdgeData {
                from: from.id,
                to: to.id,
                edge_type,
                properties: PropertyMap::new(),
            }),
        );
        delta.out_adjacency.entry(from.id).or_default().push(id);
        delta.in_adjacency.entry(to.id).or_default().push(id);
        Ok(EdgeHandle {
            id,
            from: from.id,
            to: to.id,
            edge_type,
            view: View::New,
        })
    }

    fn update_vertex<R>(
        &self,
        id: VertexId,
        f: impl FnOnce(&mut VertexData) -> R,
    ) -> Result<R> {
        let mut data = self
            .vertex_state(id, View::New)
            .ok_or_else(|| GraphError::Evaluation(format!("vertex {id} was deleted")))?;
        let result = f(&mut data);
        self.delta.lock().record_vertex(id, Some(data));
        Ok(result)
    }

    fn update_edge<R>(&self, id: EdgeId, f: impl FnOnce(&mut EdgeData) -> R) -> Result<R> {
        let mut data = self
            .edge_state(id, View::New)
            .ok_or_else(|| GraphError::Evaluation(format!("edge {id} was deleted")))?;
        let result = f(&mut data);
        self.delta.lock().record_edge(id, Some(data));
        Ok(result)
    }

    pub fn add_label(&self, handle: &VertexHandle, label: LabelId) -> Result<()> {
        self.update_vertex(handle.id, |data| {
            if !data.labels.contains(&label) {
                data.labels.push(label);
            }
        })
    }

    pub fn remove_label(&self, handle: &VertexHandle, label: LabelId) -> Result<()> {
        self.update_vertex(handle.id, |data| {
            data.labels.retain(|l| *l != label);
        })
    }

    /// Sets a property under NEW; a Null value erases the key.
    pub fn set_vertex_property(
        &self,
        handle: &VertexHandle,
        property: PropertyId,
        value: PropertyValue,
    ) -> Result<()> {
        self.update_vertex(handle.id, |data| {
            if value.is_null() {
                data.properties.remove(&property);
            } else {
                data.properties.insert(property, value);
            }
        })
    }

    pub fn set_edge_property(
        &self,
        handle: &EdgeHandle,
        property: PropertyId,
        value: PropertyValue,
    ) -> Result<()> {
        self.update_edge(handle.id, |data| {
            if value.is_null() {
                data.properties.remove(&property);
            } else {
                data.properties.insert(property, value);
            }
        })
    }

    pub fn clear_vertex_properties(&self, handle: &VertexHandle) -> Result<()> {
        self.update_vertex(handle.id, |data| data.properties.clear())
    }

    /// Deletes a vertex; fails while incident edges are visible under NEW.
    pub fn remove_vertex(&self, handle: &VertexHandle) -> Result<()> {
        if self.vertex_state(handle.id, View::New).is_none() {
            // already deleted in this transaction
            return Ok(());
        }
        let incident = self.incident_edge_count(handle.id);
        if incident > 0 {
            return Err(GraphError::Constraint(format!(
                "cannot delete vertex {} with {} attached edges",
                handle.id, incident
            )));
        }
        self.delta.lock().record_vertex(handle.id, None);
        Ok(())
    }

    /// Deletes incident edges first, then the vertex.
    pub fn detach_remove_vertex(&self, handle: &VertexHandle) -> Result<()> {
        if self.vertex_state(handle.id, View::New).is_none() {
            return Ok(());
        }
        for edge in self.incident_edges(handle.id) {
            self.remove_edge(&edge)?;
        }
        self.delta.lock().record_vertex(handle.id, None);
        Ok(())
    }

    pub fn remove_edge(&self, handle: &EdgeHandle) -> Result<()> {
        if self.edge_state(handle.id, View::New).is_none() {
            return Ok(());
        }
        self.delta.lock().record_edge(handle.id, None);
        Ok(())
    }

    fn incident_edge_count(&self, id: VertexId) -> usize {
        self.incident_edges(id).len()
    }

    fn incident_edges(&self, id: VertexId) -> Vec<EdgeHandle> {
        let mut seen = BTreeSet::new();
        let mut edges = Vec::new();
        let handle = VertexHandle {
            id,
            view: View::New,
        };
        for edge in self
            .out_edges(&handle, View::New, &[])
            .into_iter()
            .chain(self.in_edges(&handle, View::New, &[]))
        {
            if seen.insert(edge.id) {
                edges.push(edge);
            }
        }
        edges
    }

    // ---- iteration ------------------------------------------------------

    fn candidate_vertex_ids(&self) -> Vec<VertexId> {
        let mut ids: BTreeSet<VertexId> =
            self.store.with_inner(|inner| inner.vertex_ids().collect());
        ids.extend(self.delta.lock().vertices.keys().copied());
        ids.into_iter().collect()
    }

    /// All vertices visible under `view`, in ascending id order.
    pub fn vertices(&self, view: View) -> Vec<VertexHandle> {
        self.candidate_vertex_ids()
            .into_iter()
            .filter(|id| self.vertex_state(*id, view).is_some())
            .map(|id| VertexHandle { id, view })
            .collect()
    }

    /// All edges visible under `view`, in ascending id order.
    pub fn edges(&self, view: View) -> Vec<EdgeHandle> {
        let mut ids: BTreeSet<EdgeId> = self.store.with_inner(|inner| inner.edge_ids().collect());
        ids.extend(self.delta.lock().edges.keys().copied());
        ids.into_iter()
            .filter_map(|id| self.edge_handle(id, view))
            .collect()
    }

    fn edge_handle(&self, id: EdgeId, view: View) -> Option<EdgeHandle> {
        self.edge_state(id, view).map(|data| EdgeHandle {
            id,
            from: data.from,
            to: data.to,
            edge_type: data.edge_type,
            view,
        })
    }

    /// Vertices carrying `label` under `view`, via the label index merged
    /// with this transaction's uncommitted writes.
    pub fn vertices_by_label(&self, label: LabelId, view: View) -> Vec<VertexHandle> {
        let mut ids: BTreeSet<VertexId> =
            self.store.indexes().label_candidates(label).into_iter().collect();
        ids.extend(self.delta.lock().vertices.keys().copied());
        ids.into_iter()
            .filter(|id| {
                self.vertex_state(*id, view)
                    .map(|data| data.labels.contains(&label))
                    .unwrap_or(false)
            })
            .map(|id| VertexHandle { id, view })
            .collect()
    }

    /// Equality probe against a label-property index. Fails when the index
    /// was never built; a Null probe value matches nothing.
    pub fn vertices_by_label_property(
        &self,
        label: LabelId,
        property: PropertyId,
        value: &PropertyValue,
        view: View,
    ) -> Result<Vec<VertexHandle>> {
        let mut ids: BTreeSet<VertexId> = self
            .store
            .indexes()
            .label_property_candidates(label, property)?
            .into_iter()
            .collect();
        if value.is_null() {
            return Ok(Vec::new());
        }
        ids.extend(self.delta.lock().vertices.keys().copied());
        Ok(ids
            .into_iter()
            .filter(|id| {
                self.vertex_state(*id, view)
                    .map(|data| {
                        data.labels.contains(&label)
                            && data
                                .properties
                                .get(&property)
                                .map(|stored| stored.matches(value))
                                .unwrap_or(false)
                    })
                    .unwrap_or(false)
            })
            .map(|id| VertexHandle { id, view })
            .collect())
    }

    pub fn build_index(&self, label: LabelId, property: PropertyId) -> Result<()> {
        self.store.build_label_property_index(label, property)
    }

    pub fn label_property_index_exists(&self, label: LabelId, property: PropertyId) -> bool {
        self.store.indexes().label_property_exists(label, property)
    }

    /// Outgoing edges of `vertex` under `view`, committed adjacency first,
    /// then this transaction's inserts, each in insertion order. An empty
    /// `edge_types` slice admits every type.
    pub fn out_edges(
        &self,
        vertex: &VertexHandle,
        view: View,
        edge_types: &[EdgeTypeId],
    ) -> Vec<EdgeHandle> {
        self.adjacent_edges(vertex.id, view, edge_types, true)
    }

    /// Incoming edges of `vertex`; see [`GraphAccessor::out_edges`].
    pub fn in_edges(
        &self,
        vertex: &VertexHandle,
        view: View,
        edge_types: &[EdgeTypeId],
    ) -> Vec<EdgeHandle> {
        self.adjacent_edges(vertex.id, view, edge_types, false)
    }

    fn adjacent_edges(
        &self,
        id: VertexId,
        view: View,
        edge_types: &[EdgeTypeId],
        outgoing: bool,
    ) -> Vec<EdgeHandle> {
        let mut ids: Vec<EdgeId> = self.store.with_inner(|inner| {
            if outgoing {
                inner.out_adjacency(id).to_vec()
            } else {
                inner.in_adjacency(id).to_vec()
            }
        });
        {
            let delta = self.delta.lock();
            let local = if outgoing {
                delta.out_adjacency.get(&id)
            } else {
                delta.in_adjacency.get(&id)
            };
            if let Some(local) = local {
                ids.extend(local.iter().copied());
            }
        }
        ids.into_iter()
            .filter_map(|edge_id| self.edge_handle(edge_id, view))
            .filter(|edge| edge_types.is_empty() || edge_types.contains(&edge.edge_type))
            .collect()
    }

    // ---- transaction lifecycle ------------------------------------------

    /// Promotes the writes of the current command into OLD visibility.
    pub fn advance_command(&self) {
        let mut delta = self.delta.lock();
        delta.command += 1;
        debug!(
            tx_id = self.transaction_id,
            command = delta.command,
            "advanced command"
        );
    }

    /// Makes the transaction's writes durable and visible atomically.
    pub fn commit(self) -> Result<()> {
        let delta = self.delta.into_inner();
        let mut commit = CommitDelta::default();
        for (id, entries) in &delta.vertices {
            let final_state = entries.last().and_then(|e| e.data.clone());
            commit.vertices.insert(*id, final_state);
        }
        let mut surviving_edges = BTreeSet::new();
        for (id, entries) in &delta.edges {
            let final_state = entries.last().and_then(|e| e.data.clone());
            if final_state.is_some() {
                surviving_edges.insert(*id);
            }
            commit.edges.insert(*id, final_state);
        }
        // adjacency appends only for edges that survive the transaction
        for (vertex, edges) in &delta.out_adjacency {
            for edge in edges {
                if surviving_edges.contains(edge) {
                    commit.out_adjacency.push((*vertex, *edge));
                }
            }
        }
        for (vertex, edges) in &delta.in_adjacency {
            for edge in edges {
                if surviving_edges.contains(edge) {
                    commit.in_adjacency.push((*vertex, *edge));
                }
            }
        }
        if commit.is_empty() {
            debug!(tx_id = self.transaction_id, "read-only transaction finished");
            return Ok(());
        }
        self.store.apply(self.transaction_id, commit)?;
        Ok(())
    }

    /// Discards every write of the transaction.
    pub fn abort(self) {
        debug!(tx_id = self.transaction_id, "transaction aborted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::GraphStore;

    #[test]
    fn writes_are_new_until_advance() {
        let store = GraphStore::new();
        let dba = store.access();
        let v = dba.insert_vertex();

        assert_eq!(dba.vertices(View::Old).len(), 0);
        assert_eq!(dba.vertices(View::New).len(), 1);

        dba.advance_command();
        assert_eq!(dba.vertices(View::Old).len(), 1);
        assert!(dba.reconstruct_vertex(&v));
    }

    #[test]
    fn old_view_ignores_current_command_updates() {
        let store = GraphStore::new();
        let dba = store.access();
        let v = dba.insert_vertex();
        let prop = dba.property("p");
        dba.advance_command();

        dba.set_vertex_property(&v, prop, PropertyValue::Int(1)).unwrap();
        let old = VertexHandle {
            id: v.id,
            view: View::Old,
        };
        let new = VertexHandle {
            id: v.id,
            view: View::New,
        };
        assert_eq!(dba.vertex_property(&old, prop).unwrap(), PropertyValue::Null);
        assert_eq!(
            dba.vertex_property(&new, prop).unwrap(),
            PropertyValue::Int(1)
        );

        dba.advance_command();
        assert_eq!(
            dba.vertex_property(&old, prop).unwrap(),
            PropertyValue::Int(1)
        );
    }

    #[test]
    fn setting_null_erases_the_property() {
        let store = GraphStore::new();
        let dba = store.access();
        let v = dba.insert_vertex();
        let prop = dba.property("p");
        dba.set_vertex_property(&v, prop, PropertyValue::Int(5)).unwrap();
        dba.set_vertex_property(&v, prop, PropertyValue::Null).unwrap();
        assert_eq!(dba.vertex_property(&v, prop).unwrap(), PropertyValue::Null);
        assert!(dba.vertex_properties(&v).unwrap().is_empty());
    }

    #[test]
    fn commit_publishes_abort_discards() {
        let store = GraphStore::new();

        let dba = store.access();
        dba.insert_vertex();
        dba.commit().unwrap();

        let dba = store.access();
        dba.insert_vertex();
        dba.abort();

        let dba = store.access();
        assert_eq!(dba.vertices(View::Old).len(), 1);
    }

    #[test]
    fn snapshot_isolation_across_transactions() {
        let store = GraphStore::new();
        let reader = store.access();

        let writer = store.access();
        writer.insert_vertex();
        writer.commit().unwrap();

        // the reader's snapshot predates the commit
        assert_eq!(reader.vertices(View::Old).len(), 0);
        assert_eq!(reader.vertices(View::New).len(), 0);

        let late_reader = store.access();
        assert_eq!(late_reader.vertices(View::Old).len(), 1);
    }

    #[test]
    fn delete_with_edges_requires_detach() {
        let store = GraphStore::new();
        let dba = store.access();
        let a = dba.insert_vertex();
        let b = dba.insert_vertex();
        let t = dba.edge_type("t");
        dba.insert_edge(&a, &b, t).unwrap();

        let err = dba.remove_vertex(&a).unwrap_err();
        assert!(matches!(err, GraphError::Constraint(_)));

        dba.detach_remove_vertex(&a).unwrap();
        assert_eq!(dba.vertices(View::New).len(), 1);
        assert_eq!(dba.edges(View::New).len(), 0);
    }

    #[test]
    fn self_loop_detach_deletes_once() {
        let store = GraphStore::new();
        let dba = store.access();
        let v = dba.insert_vertex();
        let t = dba.edge_type("loop");
        dba.insert_edge(&v, &v, t).unwrap();

        dba.detach_remove_vertex(&v).unwrap();
        assert!(dba.vertices(View::New).is_empty());
        assert!(dba.edges(View::New).is_empty());
    }

    #[test]
    fn adjacency_preserves_insertion_order() {
        let store = GraphStore::new();
        let dba = store.access();
        let hub = dba.insert_vertex();
        let t = dba.edge_type("t");
        let mut expected = Vec::new();
        for _ in 0..4 {
            let other = dba.insert_vertex();
            expected.push(dba.insert_edge(&hub, &other, t).unwrap().id);
        }
        let ids: Vec<_> = dba
            .out_edges(&hub, View::New, &[])
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, expected);
    }
}
