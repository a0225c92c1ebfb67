//! Label and label-property indexes over committed vertices.
//!
//! Postings are append-only candidate sets: a vertex that ever carried a
//! label stays listed, and every probe re-verifies labels and property
//! values against the snapshot it runs under. This keeps older snapshots
//! complete without version-aware postings; pruning is a vacuum concern.

use std::collections::{BTreeSet, HashMap};

use parking_lot::RwLock;

use crate::error::{GraphError, Result};
use crate::storage::catalog::{LabelId, PropertyId};
use crate::storage::store::VertexData;
use crate::storage::VertexId;

pub(crate) struct Indexes {
    label: RwLock<HashMap<LabelId, BTreeSet<VertexId>>>,
    label_property: RwLock<HashMap<(LabelId, PropertyId), BTreeSet<VertexId>>>,
}

impl Indexes {
    pub(crate) fn new() -> Self {
        Self {
            label: RwLock::new(HashMap::new()),
            label_property: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a label-property index and seeds it from the supplied
    /// committed vertices. Fails if the index already exists.
    pub(crate) fn create_label_property<'a>(
        &self,
        label: LabelId,
        property: PropertyId,
        committed: impl Iterator<Item = (VertexId, &'a VertexData)>,
    ) -> Result<()> {
        let mut indexes = self.label_property.write();
        if indexes.contains_key(&(label, property)) {
            return Err(GraphError::Schema(format!(
                "label-property index ({}, {}) already exists",
                label.0, property.0
            )));
        }
        let postings = committed
            .filter(|(_, data)| {
                data.labels.contains(&label) && data.properties.contains_key(&property)
            })
            .map(|(id, _)| id)
            .collect();
        indexes.insert((label, property), postings);
        Ok(())
    }

    pub(crate) fn label_property_exists(&self, label: LabelId, property: PropertyId) -> bool {
        self.label_property.read().contains_key(&(label, property))
    }

    /// Adds postings for a vertex version being committed.
    pub(crate) fn publish_vertex(&self, id: VertexId, data: &VertexData) {
        let mut label_index = self.label.write();
        for label in &data.labels {
            label_index.entry(*label).or_default().insert(id);
        }
        drop(label_index);

        let mut property_index = self.label_property.write();
        for ((label, property), postings) in property_index.iter_mut() {
            if data.labels.contains(label) && data.properties.contains_key(property) {
                postings.insert(id);
            }
        }
    }

    /// Candidate vertices for a label; callers re-verify under their view.
    pub(crate) fn label_candidates(&self, label: LabelId) -> Vec<VertexId> {
        self.label
            .read()
            .get(&label)
            .map(|postings| postings.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Candidate vertices for a label-property pair; fails when the index
    /// was never built.
    pub(crate) fn label_property_candidates(
        &self,
        label: LabelId,
        property: PropertyId,
    ) -> Result<Vec<VertexId>> {
        self.label_property
            .read()
            .get(&(label, property))
            .map(|postings| postings.iter().copied().collect())
            .ok_or_else(|| {
                GraphError::Schema(format!(
                    "no label-property index for ({}, {})",
                    label.0, property.0
                ))
            })
    }
}
