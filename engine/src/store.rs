//! Keyed result slots with a separate display order.

use std::collections::HashMap;
use std::mem::discriminant;

use alon_types::{AnalysisRecord, RequestId};

/// New snapshot of one request's record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate {
    pub id: RequestId,
    pub record: AnalysisRecord,
}

/// `RequestId → AnalysisRecord`, plus the order requests were started in.
#[derive(Debug, Default)]
pub struct ResultStore {
    records: HashMap<RequestId, AnalysisRecord>,
    order: Vec<RequestId>,
}

impl ResultStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh record. Returns `false` if `id` is already taken.
    pub fn insert_pending(&mut self, id: RequestId, record: AnalysisRecord) -> bool {
        if self.records.contains_key(&id) {
            return false;
        }
        self.records.insert(id, record);
        self.order.push(id);
        true
    }

    /// Replace the record for `update.id`.
    ///
    /// Ignored (returns `false`) when the id is unknown, the stored record is
    /// already terminal, or the update is for a different kind of analysis.
    pub fn apply(&mut self, update: RecordUpdate) -> bool {
        let Some(current) = self.records.get_mut(&update.id) else {
            tracing::debug!(id = %update.id, "Update for unknown request ignored");
            return false;
        };
        if current.is_terminal() {
            tracing::debug!(id = %update.id, "Update for finished request ignored");
            return false;
        }
        if discriminant(current) != discriminant(&update.record) {
            tracing::warn!(id = %update.id, "Update changes analysis kind; ignored");
            return false;
        }
        *current = update.record;
        true
    }

    #[must_use]
    pub fn get(&self, id: RequestId) -> Option<&AnalysisRecord> {
        self.records.get(&id)
    }

    /// Records in the order their requests were started.
    pub fn iter(&self) -> impl Iterator<Item = (RequestId, &AnalysisRecord)> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id).map(|record| (*id, record)))
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.records.values().filter(|r| !r.is_terminal()).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
