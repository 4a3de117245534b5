//! Settlement service
//!
//! Application façade: loads the catalog, runs the engine, drives the
//! lifecycle and persists snapshots. Every read recomputes from scratch:
//! Drafts against the live catalog, Finalized snapshots against the catalog
//! copy captured when they were finalized.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{
    FrozenCatalog, IncomeGroup, IncomeRecord, ManualOverrides, OverrideField, SettlementCreate,
    SettlementPeriod, SettlementRecord, SettlementUpdate, VolumeMap,
};
use shared::types::{GroupId, SettlementId};
use shared::util::{now_millis, snowflake_id};
use shared::{AppError, AppResult, ErrorCode};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::core::EngineConfig;
use crate::engine::{CalculationInput, SettlementCalculation, calculate};
use crate::lifecycle::{self, Confirmation, FinalizeOutcome};
use crate::report::SettlementReport;
use crate::repository::{
    CatalogRepository, InMemoryCatalog, InMemorySettlementRepository, RepoError,
    SettlementRepository,
};

/// Self-contained settlement input, as read by the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementDocument {
    pub group: IncomeGroup,
    pub records: Vec<IncomeRecord>,
    pub period: SettlementPeriod,
    #[serde(default)]
    pub volumes: VolumeMap,
    #[serde(default)]
    pub overrides: ManualOverrides,
    #[serde(default)]
    pub notes: String,
    /// Falls back to the configured default when absent
    #[serde(default)]
    pub include_negative_values: Option<bool>,
}

#[derive(Clone)]
pub struct SettlementService {
    catalog: Arc<dyn CatalogRepository>,
    store: Arc<dyn SettlementRepository>,
    config: EngineConfig,
}

impl std::fmt::Debug for SettlementService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn group_error(group_id: GroupId) -> impl FnOnce(RepoError) -> AppError {
    move |err| match err {
        RepoError::NotFound(msg) => AppError::with_message(ErrorCode::IncomeGroupNotFound, msg)
            .with_detail("group_id", group_id),
        other => other.into(),
    }
}

fn settlement_error(id: SettlementId) -> impl FnOnce(RepoError) -> AppError {
    move |err| match err {
        RepoError::NotFound(msg) => AppError::with_message(ErrorCode::SettlementNotFound, msg)
            .with_detail("settlement_id", id),
        RepoError::Duplicate(msg) => AppError::with_message(ErrorCode::SettlementPeriodExists, msg)
            .with_detail("settlement_id", id),
        other => other.into(),
    }
}

impl SettlementService {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        store: Arc<dyn SettlementRepository>,
        config: EngineConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            config,
        }
    }

    /// In-memory service holding one document, with its Draft already stored
    pub fn from_document(
        document: SettlementDocument,
        config: EngineConfig,
    ) -> AppResult<(Self, SettlementRecord)> {
        let group_id = document.group.id;
        let catalog = InMemoryCatalog::with_data([document.group], document.records);
        let service = Self::new(
            Arc::new(catalog),
            Arc::new(InMemorySettlementRepository::new()),
            config,
        );
        let include_negative_values = document
            .include_negative_values
            .unwrap_or(service.config.include_negative_values);

        let record = service.create_draft(SettlementCreate {
            group_id,
            period: document.period,
            volume_map: document.volumes,
            manual_overrides: document.overrides,
            include_negative_values,
            notes: document.notes,
        })?;
        Ok((service, record))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ad-hoc calculation for a catalog group; nothing is stored
    pub fn calculate(
        &self,
        group_id: GroupId,
        period: Option<SettlementPeriod>,
        volumes: &VolumeMap,
        overrides: &ManualOverrides,
        include_negative_values: bool,
    ) -> AppResult<SettlementCalculation> {
        let (group, records) = self
            .catalog
            .load_group(group_id)
            .map_err(group_error(group_id))?;
        let input = CalculationInput {
            group: &group,
            records: &records,
            volumes,
            period,
            overrides,
        };
        Ok(calculate(
            &input,
            &self.config.calculation_options(include_negative_values),
        ))
    }

    pub fn find(&self, id: SettlementId) -> AppResult<SettlementRecord> {
        self.store.find_by_id(id).map_err(settlement_error(id))
    }

    pub fn list(&self, group_id: Option<GroupId>) -> AppResult<Vec<SettlementRecord>> {
        Ok(self.store.list(group_id)?)
    }

    pub fn create_draft(&self, payload: SettlementCreate) -> AppResult<SettlementRecord> {
        let group = self
            .catalog
            .find_group(payload.group_id)
            .map_err(group_error(payload.group_id))?;
        let record = lifecycle::new_draft(snowflake_id(), &group, payload, now_millis())?;
        self.store
            .insert(record.clone())
            .map_err(settlement_error(record.id))?;
        Ok(record)
    }

    pub fn update_draft(
        &self,
        id: SettlementId,
        update: SettlementUpdate,
    ) -> AppResult<SettlementRecord> {
        self.modify(id, |record| lifecycle::apply_update(record, update, now_millis()))
    }

    pub fn set_override(
        &self,
        id: SettlementId,
        field: OverrideField,
        value: Decimal,
    ) -> AppResult<SettlementRecord> {
        self.modify(id, |record| {
            lifecycle::set_override(record, field, value, now_millis()).map(|_| ())
        })
    }

    pub fn clear_override(
        &self,
        id: SettlementId,
        field: OverrideField,
    ) -> AppResult<SettlementRecord> {
        self.modify(id, |record| {
            lifecycle::clear_override(record, field, now_millis()).map(|_| ())
        })
    }

    fn modify(
        &self,
        id: SettlementId,
        change: impl FnOnce(&mut SettlementRecord) -> lifecycle::LifecycleResult<()>,
    ) -> AppResult<SettlementRecord> {
        let mut record = self.find(id)?;
        change(&mut record)?;
        self.store
            .save(record.clone())
            .map_err(settlement_error(id))?;
        Ok(record)
    }

    /// Run the finalize gate and persist only when it passes
    pub fn finalize(
        &self,
        id: SettlementId,
        confirmation: Confirmation,
    ) -> AppResult<FinalizeOutcome> {
        let mut record = self.find(id)?;
        let current = self.current_group(record.group_id)?;
        let catalog = self.snapshot_catalog(&record, current.as_ref())?;
        let outcome = lifecycle::finalize(&mut record, confirmation, catalog, now_millis())?;
        if outcome.is_finalized() {
            self.store.save(record).map_err(settlement_error(id))?;
        }
        Ok(outcome)
    }

    /// Open and store a new Draft revision of the latest Finalized snapshot
    pub fn revise(&self, id: SettlementId) -> AppResult<SettlementRecord> {
        let source = self.find(id)?;
        let latest = self
            .store
            .find_by_group_period(source.group_id, source.period)?
            .unwrap_or_else(|| source.clone());
        let revision = lifecycle::revise(&source, &latest, snowflake_id(), now_millis())?;
        self.store
            .insert(revision.clone())
            .map_err(settlement_error(revision.id))?;
        Ok(revision)
    }

    /// Recompute a stored snapshot
    pub fn recalculate(&self, id: SettlementId) -> AppResult<SettlementCalculation> {
        let record = self.find(id)?;
        let (_, calc) = self.recalculate_record(&record)?;
        Ok(calc)
    }

    fn current_group(&self, group_id: GroupId) -> AppResult<Option<IncomeGroup>> {
        match self.catalog.find_group(group_id) {
            Ok(group) => Ok(Some(group)),
            Err(RepoError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Group and member records a snapshot is computed from
    ///
    /// A Finalized snapshot uses its frozen copy. A Draft reads the live
    /// catalog, falling back to the volume map's members once the group is
    /// deleted.
    fn snapshot_catalog(
        &self,
        record: &SettlementRecord,
        current: Option<&IncomeGroup>,
    ) -> AppResult<FrozenCatalog> {
        if let Some(frozen) = &record.frozen_catalog {
            return Ok(frozen.clone());
        }

        let group = match current {
            Some(group) => group.clone(),
            None => {
                tracing::warn!(
                    settlement_id = record.id,
                    group_id = record.group_id,
                    "Income group no longer exists, using members from the volume map"
                );
                let members: BTreeSet<_> =
                    record.volume_map.keys().map(|key| key.record_id()).collect();
                IncomeGroup::new(
                    record.group_id,
                    record.group_name_snapshot.clone(),
                    members.into_iter().collect(),
                )
            }
        };
        let records = self.catalog.find_records(&group.record_ids)?;
        Ok(FrozenCatalog { group, records })
    }

    fn recalculate_record(
        &self,
        record: &SettlementRecord,
    ) -> AppResult<(Option<IncomeGroup>, SettlementCalculation)> {
        let current = self.current_group(record.group_id)?;
        let catalog = self.snapshot_catalog(record, current.as_ref())?;
        let input = CalculationInput {
            group: &catalog.group,
            records: &catalog.records,
            volumes: &record.volume_map,
            period: Some(record.period),
            overrides: &record.manual_overrides,
        };
        let calc = calculate(
            &input,
            &self.config.calculation_options(record.include_negative_values),
        );
        Ok((current, calc))
    }

    /// Tabular export of a stored snapshot
    pub fn export(&self, id: SettlementId) -> AppResult<SettlementReport> {
        let record = self.find(id)?;
        let (current, calc) = self.recalculate_record(&record)?;
        Ok(self
            .config
            .report_formatter()
            .build(&record, &calc, current.as_ref()))
    }

    /// CSV export with the configured delimiter
    pub fn export_csv(&self, id: SettlementId) -> AppResult<String> {
        let report = self.export(id)?;
        Ok(report.to_csv(self.config.report_delimiter)?)
    }
}
