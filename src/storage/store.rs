//! Committed graph state kept as commit-id tagged version chains.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::{debug, info};

use crate::error::{GraphError, Result};
use crate::storage::accessor::GraphAccessor;
use crate::storage::catalog::{Catalog, EdgeTypeId, LabelId, PropertyId};
use crate::storage::index::Indexes;
use crate::storage::{EdgeId, PropertyValue, VertexId};

/// Opaque identifier assigned to every transaction.
pub type TransactionId = u64;

/// Global monotonic counter stamped on every committed version.
pub type CommitId = u64;

/// Write-grouping counter within a single transaction.
pub type CommandId = u64;

/// Sentinel meaning "still visible"; an open version end.
pub const COMMIT_MAX: CommitId = u64::MAX;

pub(crate) type LabelSet = SmallVec<[LabelId; 4]>;
pub(crate) type PropertyMap = BTreeMap<PropertyId, PropertyValue>;

/// Payload of one vertex version.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct VertexData {
    pub labels: LabelSet,
    pub properties: PropertyMap,
}

/// Payload of one edge version. Endpoints and type never change after
/// insertion; only properties are versioned.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EdgeData {
    pub from: VertexId,
    pub to: VertexId,
    pub edge_type: EdgeTypeId,
    pub properties: PropertyMap,
}

#[derive(Debug, Clone)]
struct Version<T> {
    begin: CommitId,
    end: CommitId,
    data: T,
}

/// Append-only list of record versions, oldest first.
#[derive(Debug, Clone)]
pub(crate) struct VersionChain<T> {
    versions: Vec<Version<T>>,
}

impl<T> VersionChain<T> {
    fn new() -> Self {
        Self {
            versions: Vec::new(),
        }
    }

    /// Returns the version visible at `snapshot`, if any. A version is
    /// visible when `begin <= snapshot < end`.
    pub(crate) fn visible_at(&self, snapshot: CommitId) -> Option<&T> {
        self.versions
            .iter()
            .rev()
            .find(|v| v.begin <= snapshot && snapshot < v.end)
            .map(|v| &v.data)
    }

    fn close_open(&mut self, at: CommitId) {
        if let Some(last) = self.versions.last_mut() {
            if last.end == COMMIT_MAX {
                last.end = at;
            }
        }
    }

    fn push(&mut self, begin: CommitId, data: T) {
        self.versions.push(Version {
            begin,
            end: COMMIT_MAX,
            data,
        });
    }
}

/// Final per-record outcome of a transaction, handed to the store at commit.
/// `None` records a delete.
#[derive(Debug, Default)]
pub(crate) struct CommitDelta {
    pub vertices: BTreeMap<VertexId, Option<VertexData>>,
    pub edges: BTreeMap<EdgeId, Option<EdgeData>>,
    /// Adjacency appends for edges inserted by the transaction, in issue
    /// order.
    pub out_adjacency: Vec<(VertexId, EdgeId)>,
    pub in_adjacency: Vec<(VertexId, EdgeId)>,
}

impl CommitDelta {
    pub(crate) fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.edges.is_empty()
    }
}

pub(crate) struct StoreInner {
    commit_clock: CommitId,
    vertices: BTreeMap<VertexId, VersionChain<VertexData>>,
    edges: BTreeMap<EdgeId, VersionChain<EdgeData>>,
    out_adjacency: HashMap<VertexId, Vec<EdgeId>>,
    in_adjacency: HashMap<VertexId, Vec<EdgeId>>,
}

impl StoreInner {
    pub(crate) fn vertex_at(&self, id: VertexId, snapshot: CommitId) -> Option<&VertexData> {
        self.vertices.get(&id).and_then(|c| c.visible_at(snapshot))
    }

    pub(crate) fn edge_at(&self, id: EdgeId, snapshot: CommitId) -> Option<&EdgeData> {
        self.edges.get(&id).and_then(|c| c.visible_at(snapshot))
    }

    /// Vertex ids in ascending order; visibility is checked by the caller.
    pub(crate) fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices.keys().copied()
    }

    pub(crate) fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.keys().copied()
    }

    pub(crate) fn out_adjacency(&self, v: VertexId) -> &[EdgeId] {
        self.out_adjacency.get(&v).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn in_adjacency(&self, v: VertexId) -> &[EdgeId] {
        self.in_adjacency.get(&v).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn committed_vertices_at(
        &self,
        snapshot: CommitId,
    ) -> impl Iterator<Item = (VertexId, &VertexData)> + '_ {
        self.vertices
            .iter()
            .filter_map(move |(id, chain)| chain.visible_at(snapshot).map(|data| (*id, data)))
    }
}

/// Shared, in-memory versioned graph store.
///
/// Owns the commit clock (the per-database monotonic version counter), the
/// name catalog and the index set. Transactions are opened with
/// [`GraphStore::access`] and never block each other's reads.
pub struct GraphStore {
    catalog: Catalog,
    indexes: Indexes,
    inner: RwLock<StoreInner>,
    next_vertex_id: AtomicU64,
    next_edge_id: AtomicU64,
    next_transaction_id: AtomicU64,
}

impl GraphStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            catalog: Catalog::new(),
            indexes: Indexes::new(),
            inner: RwLock::new(StoreInner {
                commit_clock: 0,
                vertices: BTreeMap::new(),
                edges: BTreeMap::new(),
                out_adjacency: HashMap::new(),
                in_adjacency: HashMap::new(),
            }),
            next_vertex_id: AtomicU64::new(0),
            next_edge_id: AtomicU64::new(0),
            next_transaction_id: AtomicU64::new(1),
        })
    }

    /// Opens a transaction pinned to the latest committed snapshot.
    pub fn access(self: &Arc<Self>) -> GraphAccessor {
        let snapshot = self.inner.read().commit_clock;
        let tx_id = self.next_transaction_id.fetch_add(1, Ordering::SeqCst);
        debug!(tx_id, snapshot, "transaction started");
        GraphAccessor::new(Arc::clone(self), tx_id, snapshot)
    }

    pub(crate) fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub(crate) fn indexes(&self) -> &Indexes {
        &self.indexes
    }

    pub(crate) fn allocate_vertex_id(&self) -> VertexId {
        self.next_vertex_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn allocate_edge_id(&self) -> EdgeId {
        self.next_edge_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn with_inner<R>(&self, f: impl FnOnce(&StoreInner) -> R) -> R {
        f(&self.inner.read())
    }

    /// Builds a label-property index, seeding it from the latest committed
    /// state. Fails if the index already exists.
    pub(crate) fn build_label_property_index(
        &self,
        label: LabelId,
        property: PropertyId,
    ) -> Result<()> {
        let inner = self.inner.read();
        let snapshot = inner.commit_clock;
        self.indexes.create_label_property(
            label,
            property,
            inner.committed_vertices_at(snapshot),
        )?;
        info!(label = label.0, property = property.0, "built label-property index");
        Ok(())
    }

    /// Folds a transaction's delta into the committed state under the next
    /// commit id and publishes index postings.
    pub(crate) fn apply(&self, tx_id: TransactionId, delta: CommitDelta) -> Result<CommitId> {
        let mut inner = self.inner.write();
        let commit_id = inner
            .commit_clock
            .checked_add(1)
            .ok_or_else(|| GraphError::Internal("commit clock overflow".into()))?;

        for (id, outcome) in delta.vertices {
            let chain = inner.vertices.entry(id).or_insert_with(VersionChain::new);
            chain.close_open(commit_id);
            if let Some(data) = outcome {
                self.indexes.publish_vertex(id, &data);
                chain.push(commit_id, data);
            }
        }
        for (id, outcome) in delta.edges {
            let chain = inner.edges.entry(id).or_insert_with(VersionChain::new);
            chain.close_open(commit_id);
            if let Some(data) = outcome {
                chain.push(commit_id, data);
            }
        }
        for (v, e) in delta.out_adjacency {
            inner.out_adjacency.entry(v).or_default().push(e);
        }
        for (v, e) in delta.in_adjacency {
            inner.in_adjacency.entry(v).or_default().push(e);
        }

        inner.commit_clock = commit_id;
        info!(tx_id, commit_id, "transaction committed");
        Ok(commit_id)
    }
}
