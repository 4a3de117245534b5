//! Settlement snapshot repository
//!
//! Finalized snapshots are write-once: the store refuses to overwrite or
//! delete them. At most one Draft exists per `(group, period)`, and each
//! revision number appears once per `(group, period)`.

use parking_lot::RwLock;
use shared::models::{SettlementPeriod, SettlementRecord};
use shared::types::{GroupId, SettlementId};
use std::collections::BTreeMap;

use super::{RepoError, RepoResult};

pub trait SettlementRepository: Send + Sync {
    fn find_by_id(&self, id: SettlementId) -> RepoResult<SettlementRecord>;

    /// Latest revision for the group and period, if any
    fn find_by_group_period(
        &self,
        group_id: GroupId,
        period: SettlementPeriod,
    ) -> RepoResult<Option<SettlementRecord>>;

    /// All snapshots, optionally restricted to one group, ordered by period
    /// then revision
    fn list(&self, group_id: Option<GroupId>) -> RepoResult<Vec<SettlementRecord>>;

    fn insert(&self, record: SettlementRecord) -> RepoResult<()>;

    /// Replace a stored Draft
    fn save(&self, record: SettlementRecord) -> RepoResult<()>;

    fn delete(&self, id: SettlementId) -> RepoResult<()>;
}

fn not_found(id: SettlementId) -> RepoError {
    RepoError::NotFound(format!("Settlement {} not found", id))
}

fn immutable(id: SettlementId) -> RepoError {
    RepoError::Immutable(format!("Settlement {} is finalized", id))
}

// =============================================================================
// InMemorySettlementRepository
// =============================================================================

#[derive(Debug, Default)]
pub struct InMemorySettlementRepository {
    records: RwLock<BTreeMap<SettlementId, SettlementRecord>>,
}

impl InMemorySettlementRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl SettlementRepository for InMemorySettlementRepository {
    fn find_by_id(&self, id: SettlementId) -> RepoResult<SettlementRecord> {
        self.records.read().get(&id).cloned().ok_or_else(|| not_found(id))
    }

    fn find_by_group_period(
        &self,
        group_id: GroupId,
        period: SettlementPeriod,
    ) -> RepoResult<Option<SettlementRecord>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.group_id == group_id && r.period == period)
            .max_by_key(|r| r.revision)
            .cloned())
    }

    fn list(&self, group_id: Option<GroupId>) -> RepoResult<Vec<SettlementRecord>> {
        let mut records: Vec<SettlementRecord> = self
            .records
            .read()
            .values()
            .filter(|r| group_id.is_none_or(|id| r.group_id == id))
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.group_id, r.period, r.revision));
        Ok(records)
    }

    fn insert(&self, record: SettlementRecord) -> RepoResult<()> {
        let mut records = self.records.write();
        if records.contains_key(&record.id) {
            return Err(RepoError::Duplicate(format!(
                "Settlement {} already exists",
                record.id
            )));
        }
        if let Some(existing) = records.values().find(|r| {
            r.group_id == record.group_id
                && r.period == record.period
                && r.revision == record.revision
        }) {
            return Err(RepoError::Duplicate(format!(
                "Revision {} of group {} in {} already stored as settlement {}",
                record.revision, record.group_id, record.period, existing.id
            )));
        }
        if let Some(existing) = records.values().find(|r| {
            !r.is_finalized() && r.group_id == record.group_id && r.period == record.period
        }) {
            return Err(RepoError::Duplicate(format!(
                "Draft {} already open for group {} in {}",
                existing.id, record.group_id, record.period
            )));
        }
        tracing::debug!(settlement_id = record.id, "Settlement stored");
        records.insert(record.id, record);
        Ok(())
    }

    fn save(&self, record: SettlementRecord) -> RepoResult<()> {
        let mut records = self.records.write();
        let stored = records.get_mut(&record.id).ok_or_else(|| not_found(record.id))?;
        if stored.is_finalized() {
            return Err(immutable(record.id));
        }
        if stored.group_id != record.group_id || stored.period != record.period {
            return Err(RepoError::Validation(format!(
                "Settlement {} cannot move to another group or period",
                record.id
            )));
        }
        *stored = record;
        Ok(())
    }

    fn delete(&self, id: SettlementId) -> RepoResult<()> {
        let mut records = self.records.write();
        match records.get(&id) {
            None => Err(not_found(id)),
            Some(r) if r.is_finalized() => Err(immutable(id)),
            Some(_) => {
                records.remove(&id);
                Ok(())
            }
        }
    }
}
