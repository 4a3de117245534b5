//! Catalog repository: income groups and income records
//!
//! The settlement engine only reads the catalog. Repairing an empty catalog
//! from defaults is done here, never inside a calculation.

use parking_lot::RwLock;
use shared::models::{IncomeGroup, IncomeRecord};
use shared::types::{GroupId, RecordId};
use std::collections::BTreeMap;

use super::{RepoError, RepoResult};

pub trait CatalogRepository: Send + Sync {
    /// Typed `NotFound` when the group does not exist
    fn find_group(&self, id: GroupId) -> RepoResult<IncomeGroup>;

    fn list_groups(&self) -> RepoResult<Vec<IncomeGroup>>;

    /// Records for the given ids, in the given order; unknown ids are skipped
    fn find_records(&self, ids: &[RecordId]) -> RepoResult<Vec<IncomeRecord>>;

    fn upsert_group(&self, group: IncomeGroup) -> RepoResult<()>;

    fn upsert_record(&self, record: IncomeRecord) -> RepoResult<()>;

    fn delete_group(&self, id: GroupId) -> RepoResult<()>;

    /// Group together with its member records
    fn load_group(&self, id: GroupId) -> RepoResult<(IncomeGroup, Vec<IncomeRecord>)> {
        let group = self.find_group(id)?;
        let records = self.find_records(&group.record_ids)?;
        Ok((group, records))
    }
}

// =============================================================================
// InMemoryCatalog
// =============================================================================

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    groups: RwLock<BTreeMap<GroupId, IncomeGroup>>,
    records: RwLock<BTreeMap<RecordId, IncomeRecord>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(
        groups: impl IntoIterator<Item = IncomeGroup>,
        records: impl IntoIterator<Item = IncomeRecord>,
    ) -> Self {
        let catalog = Self::new();
        catalog.load(groups, records);
        catalog
    }

    fn load(
        &self,
        groups: impl IntoIterator<Item = IncomeGroup>,
        records: impl IntoIterator<Item = IncomeRecord>,
    ) {
        let mut group_map = self.groups.write();
        for group in groups {
            group_map.insert(group.id, group);
        }
        let mut record_map = self.records.write();
        for record in records {
            record_map.entry(record.id).or_insert(record);
        }
    }

    /// Load defaults only when no group is stored; returns whether it seeded
    pub fn seed_if_empty(
        &self,
        groups: impl IntoIterator<Item = IncomeGroup>,
        records: impl IntoIterator<Item = IncomeRecord>,
    ) -> bool {
        let mut group_map = self.groups.write();
        if !group_map.is_empty() {
            return false;
        }
        group_map.extend(groups.into_iter().map(|group| (group.id, group)));

        let mut record_map = self.records.write();
        for record in records {
            record_map.entry(record.id).or_insert(record);
        }
        tracing::warn!(
            groups = group_map.len(),
            records = record_map.len(),
            "Catalog was empty, seeded from defaults"
        );
        true
    }
}

impl CatalogRepository for InMemoryCatalog {
    fn find_group(&self, id: GroupId) -> RepoResult<IncomeGroup> {
        self.groups
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| RepoError::NotFound(format!("Income group {} not found", id)))
    }

    fn list_groups(&self) -> RepoResult<Vec<IncomeGroup>> {
        Ok(self.groups.read().values().cloned().collect())
    }

    fn find_records(&self, ids: &[RecordId]) -> RepoResult<Vec<IncomeRecord>> {
        let records = self.records.read();
        Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
    }

    fn upsert_group(&self, group: IncomeGroup) -> RepoResult<()> {
        if group.name.trim().is_empty() {
            return Err(RepoError::Validation(format!(
                "Income group {} has an empty name",
                group.id
            )));
        }
        self.groups.write().insert(group.id, group);
        Ok(())
    }

    fn upsert_record(&self, record: IncomeRecord) -> RepoResult<()> {
        self.records.write().insert(record.id, record);
        Ok(())
    }

    fn delete_group(&self, id: GroupId) -> RepoResult<()> {
        self.groups
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepoError::NotFound(format!("Income group {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::RevenueModel;

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::with_data(
            vec![IncomeGroup::new(1, "Retail", vec![20, 10, 99])],
            vec![
                IncomeRecord::new(10, "Bank A", RevenueModel::SharedMargin),
                IncomeRecord::new(20, "Bank B", RevenueModel::FixedFee),
            ],
        )
    }

    #[test]
    fn test_find_group_not_found_is_typed() {
        let catalog = catalog();
        assert!(catalog.find_group(1).is_ok());
        assert!(matches!(catalog.find_group(2), Err(RepoError::NotFound(_))));
    }

    #[test]
    fn test_find_records_keeps_order_and_skips_unknown() {
        let catalog = catalog();
        let records = catalog.find_records(&[20, 10, 99]).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![20, 10]);

        assert!(catalog.find_records(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_load_group() {
        let (group, records) = catalog().load_group(1).unwrap();
        assert_eq!(group.name, "Retail");
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_seed_only_when_empty() {
        let empty = InMemoryCatalog::new();
        assert!(empty.list_groups().unwrap().is_empty());
        assert!(empty.seed_if_empty(
            vec![IncomeGroup::new(5, "Default", vec![])],
            Vec::<IncomeRecord>::new()
        ));
        assert_eq!(empty.list_groups().unwrap().len(), 1);

        let populated = catalog();
        assert!(!populated.seed_if_empty(
            vec![IncomeGroup::new(5, "Default", vec![])],
            Vec::<IncomeRecord>::new()
        ));
        assert!(populated.find_group(5).is_err());
    }

    #[test]
    fn test_upsert_and_delete_group() {
        let catalog = catalog();
        assert!(matches!(
            catalog.upsert_group(IncomeGroup::new(2, "  ", vec![])),
            Err(RepoError::Validation(_))
        ));
        catalog.upsert_group(IncomeGroup::new(2, "Online", vec![])).unwrap();
        assert_eq!(catalog.list_groups().unwrap().len(), 2);

        catalog.delete_group(2).unwrap();
        assert!(matches!(catalog.delete_group(2), Err(RepoError::NotFound(_))));
    }
}
