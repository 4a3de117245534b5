//! Settlement snapshot lifecycle
//!
//! `Draft → Finalized`. A finalized snapshot is immutable; edits after
//! finalization go through [`revise`], which opens a new Draft revision that
//! points back at the snapshot it supersedes.
//!
//! Finalizing while manual overrides are set is gated: the operator must
//! acknowledge the exact set of overridden fields, or the transition is
//! deferred without touching the record. A successful finalize stores the
//! catalog state the totals were computed from.

use rust_decimal::Decimal;
use serde::Serialize;
use shared::models::{
    FrozenCatalog, IncomeGroup, ManualOverrides, OverrideField, SettlementCreate,
    SettlementRecord, SettlementStatus, SettlementUpdate,
};
use shared::types::{GroupId, SettlementId, Timestamp};
use shared::{AppError, ErrorCode};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::money::within_amount_range;

/// Lifecycle error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("Settlement {0} is finalized and cannot be modified")]
    AlreadyFinalized(SettlementId),

    #[error("Settlement {0} is not finalized")]
    NotFinalized(SettlementId),

    #[error("Payload targets group {requested}, but the income group is {actual}")]
    GroupMismatch { requested: GroupId, actual: GroupId },

    #[error("Settlement {id} was superseded by revision {latest_revision} (settlement {latest})")]
    Superseded {
        id: SettlementId,
        latest: SettlementId,
        latest_revision: u32,
    },

    #[error("Override {field} = {value} is out of range")]
    AmountOutOfRange { field: OverrideField, value: Decimal },
}

/// Result type for lifecycle operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match &err {
            LifecycleError::AlreadyFinalized(id) => {
                AppError::with_message(ErrorCode::SettlementAlreadyFinalized, err.to_string())
                    .with_detail("settlement_id", *id)
            }
            LifecycleError::NotFinalized(id) => {
                AppError::with_message(ErrorCode::SettlementNotFinalized, err.to_string())
                    .with_detail("settlement_id", *id)
            }
            LifecycleError::Superseded { id, latest, .. } => {
                AppError::with_message(ErrorCode::SettlementSuperseded, err.to_string())
                    .with_detail("settlement_id", *id)
                    .with_detail("latest_id", *latest)
            }
            LifecycleError::GroupMismatch { .. } | LifecycleError::AmountOutOfRange { .. } => {
                AppError::validation(err.to_string())
            }
        }
    }
}

/// Operator answer to the finalize confirmation prompt
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Confirmation {
    /// Not asked yet
    #[default]
    Unconfirmed,
    /// Operator acknowledged these overridden fields
    Confirmed(Vec<OverrideField>),
    /// Operator declined
    Declined,
}

/// Result of a finalize attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "fields", rename_all = "snake_case")]
pub enum FinalizeOutcome {
    /// Record is now Finalized
    Finalized,
    /// Overrides are set and need acknowledgement; record unchanged
    ConfirmationRequired(Vec<OverrideField>),
    /// Operator declined; record unchanged
    Aborted,
}

impl FinalizeOutcome {
    pub fn is_finalized(&self) -> bool {
        matches!(self, Self::Finalized)
    }
}

fn ensure_draft(record: &SettlementRecord) -> LifecycleResult<()> {
    if record.is_finalized() {
        return Err(LifecycleError::AlreadyFinalized(record.id));
    }
    Ok(())
}

fn ensure_override_in_range(field: OverrideField, value: Decimal) -> LifecycleResult<()> {
    if !within_amount_range(value) {
        return Err(LifecycleError::AmountOutOfRange { field, value });
    }
    Ok(())
}

fn ensure_overrides_in_range(overrides: &ManualOverrides) -> LifecycleResult<()> {
    for field in overrides.active_fields() {
        if let Some(value) = overrides.get(field) {
            ensure_override_in_range(field, value)?;
        }
    }
    Ok(())
}

/// Open a new Draft snapshot for `group`
pub fn new_draft(
    id: SettlementId,
    group: &IncomeGroup,
    payload: SettlementCreate,
    now: Timestamp,
) -> LifecycleResult<SettlementRecord> {
    if payload.group_id != group.id {
        return Err(LifecycleError::GroupMismatch {
            requested: payload.group_id,
            actual: group.id,
        });
    }
    ensure_overrides_in_range(&payload.manual_overrides)?;

    tracing::info!(
        settlement_id = id,
        group_id = group.id,
        period = %payload.period,
        "Settlement draft created"
    );

    Ok(SettlementRecord {
        id,
        group_id: group.id,
        group_name_snapshot: group.name.clone(),
        period: payload.period,
        volume_map: payload.volume_map,
        status: SettlementStatus::Draft,
        manual_overrides: payload.manual_overrides,
        include_negative_values: payload.include_negative_values,
        notes: payload.notes,
        revision: 1,
        supersedes: None,
        created_at: now,
        updated_at: now,
        finalized_at: None,
        frozen_catalog: None,
    })
}

/// Apply a partial update to a Draft
pub fn apply_update(
    record: &mut SettlementRecord,
    update: SettlementUpdate,
    now: Timestamp,
) -> LifecycleResult<()> {
    ensure_draft(record)?;
    if let Some(overrides) = &update.manual_overrides {
        ensure_overrides_in_range(overrides)?;
    }

    if let Some(volume_map) = update.volume_map {
        record.volume_map = volume_map;
    }
    if let Some(overrides) = update.manual_overrides {
        record.manual_overrides = overrides;
    }
    if let Some(include) = update.include_negative_values {
        record.include_negative_values = include;
    }
    if let Some(notes) = update.notes {
        record.notes = notes;
    }
    record.updated_at = now;
    Ok(())
}

/// Set one manual override on a Draft, returning the previous value
pub fn set_override(
    record: &mut SettlementRecord,
    field: OverrideField,
    value: Decimal,
    now: Timestamp,
) -> LifecycleResult<Option<Decimal>> {
    ensure_draft(record)?;
    ensure_override_in_range(field, value)?;
    let previous = record.manual_overrides.set(field, value);
    record.updated_at = now;
    tracing::debug!(settlement_id = record.id, field = field.as_str(), value = %value, "Manual override set");
    Ok(previous)
}

/// Clear one manual override on a Draft, returning the removed value
pub fn clear_override(
    record: &mut SettlementRecord,
    field: OverrideField,
    now: Timestamp,
) -> LifecycleResult<Option<Decimal>> {
    ensure_draft(record)?;
    let previous = record.manual_overrides.clear(field);
    if previous.is_some() {
        record.updated_at = now;
    }
    Ok(previous)
}

/// Try to move a Draft to Finalized
///
/// With no overrides set the confirmation is not consulted. Otherwise the
/// record only changes when `confirmation` acknowledges exactly the fields
/// currently overridden. `catalog` is the group and member records the
/// totals were computed from; it is kept on the record once finalized.
pub fn finalize(
    record: &mut SettlementRecord,
    confirmation: Confirmation,
    catalog: FrozenCatalog,
    now: Timestamp,
) -> LifecycleResult<FinalizeOutcome> {
    ensure_draft(record)?;

    let overridden = record.manual_overrides.active_fields();
    if !overridden.is_empty() {
        match confirmation {
            Confirmation::Declined => {
                tracing::info!(settlement_id = record.id, "Finalize declined by operator");
                return Ok(FinalizeOutcome::Aborted);
            }
            Confirmation::Unconfirmed => {
                return Ok(FinalizeOutcome::ConfirmationRequired(overridden));
            }
            Confirmation::Confirmed(acknowledged) => {
                let acknowledged: BTreeSet<_> = acknowledged.into_iter().collect();
                let current: BTreeSet<_> = overridden.iter().copied().collect();
                if acknowledged != current {
                    tracing::warn!(
                        settlement_id = record.id,
                        "Acknowledged fields differ from current overrides, asking again"
                    );
                    return Ok(FinalizeOutcome::ConfirmationRequired(overridden));
                }
            }
        }
    }

    record.status = SettlementStatus::Finalized;
    record.finalized_at = Some(now);
    record.updated_at = now;
    record.frozen_catalog = Some(catalog);

    tracing::info!(
        settlement_id = record.id,
        group_id = record.group_id,
        period = %record.period,
        revision = record.revision,
        overrides = overridden.len(),
        "Settlement finalized"
    );
    Ok(FinalizeOutcome::Finalized)
}

/// Open a new Draft revision of a Finalized snapshot
///
/// `latest` is the newest stored revision for the record's group and period;
/// only that revision may be revised, so the chain never forks. The source is
/// left untouched. Volumes, overrides, policy and notes carry over to the new
/// revision, which reads the live catalog again until it is finalized.
pub fn revise(
    record: &SettlementRecord,
    latest: &SettlementRecord,
    new_id: SettlementId,
    now: Timestamp,
) -> LifecycleResult<SettlementRecord> {
    if !record.is_finalized() {
        return Err(LifecycleError::NotFinalized(record.id));
    }
    if latest.id != record.id {
        return Err(LifecycleError::Superseded {
            id: record.id,
            latest: latest.id,
            latest_revision: latest.revision,
        });
    }

    tracing::info!(
        settlement_id = new_id,
        supersedes = record.id,
        revision = record.revision + 1,
        "Settlement revision opened"
    );

    Ok(SettlementRecord {
        id: new_id,
        status: SettlementStatus::Draft,
        revision: record.revision + 1,
        supersedes: Some(record.id),
        created_at: now,
        updated_at: now,
        finalized_at: None,
        frozen_catalog: None,
        ..record.clone()
    })
}

/// Snapshot name next to the catalog's current name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupNameView {
    pub snapshot: String,
    /// `None` when the group no longer exists
    pub current: Option<String>,
}

impl GroupNameView {
    /// Group was renamed since the snapshot
    pub fn diverged(&self) -> bool {
        self.current
            .as_deref()
            .is_some_and(|current| current != self.snapshot)
    }

    pub fn deleted(&self) -> bool {
        self.current.is_none()
    }
}

pub fn group_name_view(record: &SettlementRecord, current: Option<&IncomeGroup>) -> GroupNameView {
    GroupNameView {
        snapshot: record.group_name_snapshot.clone(),
        current: current
            .filter(|group| group.id == record.group_id)
            .map(|group| group.name.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use shared::models::{IncomeRecord, RevenueModel, SettlementPeriod, VolumeMap};

    fn group() -> IncomeGroup {
        IncomeGroup::new(10, "Retail POS", vec![1, 2])
    }

    fn frozen() -> FrozenCatalog {
        FrozenCatalog {
            group: group(),
            records: vec![IncomeRecord::new(1, "Bank A", RevenueModel::SharedMargin)],
        }
    }

    fn draft() -> SettlementRecord {
        let payload = SettlementCreate {
            group_id: 10,
            period: SettlementPeriod::new(2024, 3).unwrap(),
            volume_map: VolumeMap::new().with_primary(1, "D+7", dec!(1000000)),
            manual_overrides: ManualOverrides::default(),
            include_negative_values: false,
            notes: String::new(),
        };
        new_draft(100, &group(), payload, 1_000).unwrap()
    }

    #[test]
    fn test_new_draft_snapshots_group_name() {
        let record = draft();
        assert_eq!(record.status, SettlementStatus::Draft);
        assert_eq!(record.group_name_snapshot, "Retail POS");
        assert_eq!(record.revision, 1);
        assert_eq!(record.supersedes, None);
        assert_eq!(record.created_at, 1_000);
    }

    #[test]
    fn test_new_draft_rejects_foreign_group() {
        let payload = SettlementCreate {
            group_id: 11,
            period: SettlementPeriod::new(2024, 3).unwrap(),
            volume_map: VolumeMap::new(),
            manual_overrides: ManualOverrides::default(),
            include_negative_values: false,
            notes: String::new(),
        };
        let err = new_draft(100, &group(), payload, 0).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::GroupMismatch {
                requested: 11,
                actual: 10
            }
        );
    }

    #[test]
    fn test_update_only_touches_present_fields() {
        let mut record = draft();
        apply_update(
            &mut record,
            SettlementUpdate {
                notes: Some("checked".into()),
                ..Default::default()
            },
            2_000,
        )
        .unwrap();
        assert_eq!(record.notes, "checked");
        assert_eq!(record.volume_map.len(), 1);
        assert_eq!(record.updated_at, 2_000);
    }

    #[test]
    fn test_finalize_without_overrides() {
        let mut record = draft();
        let outcome = finalize(&mut record, Confirmation::Unconfirmed, frozen(), 5_000).unwrap();
        assert_eq!(outcome, FinalizeOutcome::Finalized);
        assert!(record.is_finalized());
        assert_eq!(record.finalized_at, Some(5_000));
    }

    #[test]
    fn test_finalize_gate_requires_confirmation() {
        let mut record = draft();
        set_override(&mut record, OverrideField::PrimaryPlatformShareTotal, dec!(3000), 2_000)
            .unwrap();
        let before = record.clone();

        let outcome = finalize(&mut record, Confirmation::Unconfirmed, frozen(), 5_000).unwrap();
        assert_eq!(
            outcome,
            FinalizeOutcome::ConfirmationRequired(vec![OverrideField::PrimaryPlatformShareTotal])
        );
        assert_eq!(record, before);

        let outcome = finalize(&mut record, Confirmation::Declined, frozen(), 5_000).unwrap();
        assert_eq!(outcome, FinalizeOutcome::Aborted);
        assert_eq!(record, before);

        let outcome = finalize(
            &mut record,
            Confirmation::Confirmed(vec![OverrideField::PrimaryPlatformShareTotal]),
            frozen(),
            5_000,
        )
        .unwrap();
        assert!(outcome.is_finalized());
        assert_eq!(record.status, SettlementStatus::Finalized);
    }

    #[test]
    fn test_stale_confirmation_asks_again() {
        let mut record = draft();
        set_override(&mut record, OverrideField::PrimaryVolumeTotal, dec!(1), 0).unwrap();
        set_override(&mut record, OverrideField::AdditionalPlatformShareTotal, dec!(2), 0).unwrap();

        let outcome = finalize(
            &mut record,
            Confirmation::Confirmed(vec![OverrideField::PrimaryVolumeTotal]),
            frozen(),
            0,
        )
        .unwrap();
        assert_eq!(
            outcome,
            FinalizeOutcome::ConfirmationRequired(vec![
                OverrideField::PrimaryVolumeTotal,
                OverrideField::AdditionalPlatformShareTotal
            ])
        );
        assert!(!record.is_finalized());
    }

    #[test]
    fn test_finalized_is_immutable() {
        let mut record = draft();
        finalize(&mut record, Confirmation::Unconfirmed, frozen(), 0).unwrap();

        assert_eq!(
            apply_update(&mut record, SettlementUpdate::default(), 1),
            Err(LifecycleError::AlreadyFinalized(100))
        );
        assert!(set_override(&mut record, OverrideField::PrimaryVolumeTotal, dec!(1), 1).is_err());
        assert!(clear_override(&mut record, OverrideField::PrimaryVolumeTotal, 1).is_err());
        assert!(finalize(&mut record, Confirmation::Unconfirmed, frozen(), 1).is_err());

        let err: AppError = LifecycleError::AlreadyFinalized(100).into();
        assert_eq!(err.code, ErrorCode::SettlementAlreadyFinalized);
    }

    #[test]
    fn test_revise_opens_new_draft() {
        let mut record = draft();
        assert_eq!(
            revise(&record, &record, 101, 0).unwrap_err(),
            LifecycleError::NotFinalized(100)
        );

        set_override(&mut record, OverrideField::PrimaryVolumeTotal, dec!(5), 0).unwrap();
        finalize(
            &mut record,
            Confirmation::Confirmed(vec![OverrideField::PrimaryVolumeTotal]),
            frozen(),
            10,
        )
        .unwrap();

        let revision = revise(&record, &record, 101, 20).unwrap();
        assert_eq!(revision.id, 101);
        assert_eq!(revision.status, SettlementStatus::Draft);
        assert_eq!(revision.revision, 2);
        assert_eq!(revision.supersedes, Some(100));
        assert_eq!(revision.finalized_at, None);
        assert_eq!(revision.volume_map, record.volume_map);
        assert_eq!(revision.manual_overrides, record.manual_overrides);
        assert!(record.is_finalized());
    }

    #[test]
    fn test_finalize_keeps_catalog_copy() {
        let mut record = draft();
        set_override(&mut record, OverrideField::PrimaryVolumeTotal, dec!(5), 0).unwrap();
        finalize(&mut record, Confirmation::Unconfirmed, frozen(), 10).unwrap();
        assert!(record.frozen_catalog.is_none());

        finalize(
            &mut record,
            Confirmation::Confirmed(vec![OverrideField::PrimaryVolumeTotal]),
            frozen(),
            10,
        )
        .unwrap();
        assert_eq!(record.frozen_catalog, Some(frozen()));

        let revision = revise(&record, &record, 101, 20).unwrap();
        assert!(revision.frozen_catalog.is_none());
    }

    #[test]
    fn test_only_latest_revision_can_be_revised() {
        let mut first = draft();
        finalize(&mut first, Confirmation::Unconfirmed, frozen(), 10).unwrap();
        let mut second = revise(&first, &first, 101, 20).unwrap();
        finalize(&mut second, Confirmation::Unconfirmed, frozen(), 30).unwrap();

        assert_eq!(
            revise(&first, &second, 102, 40).unwrap_err(),
            LifecycleError::Superseded {
                id: 100,
                latest: 101,
                latest_revision: 2
            }
        );
        let third = revise(&second, &second, 102, 40).unwrap();
        assert_eq!(third.revision, 3);
        assert_eq!(third.supersedes, Some(101));

        let err: AppError = revise(&first, &second, 103, 50).unwrap_err().into();
        assert_eq!(err.code, ErrorCode::SettlementSuperseded);
    }

    #[test]
    fn test_override_out_of_range_is_rejected() {
        let mut record = draft();
        let err = set_override(&mut record, OverrideField::PrimaryVolumeTotal, Decimal::MAX, 1)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::AmountOutOfRange { .. }));
        assert!(record.manual_overrides.is_empty());

        let update = SettlementUpdate {
            manual_overrides: Some(
                ManualOverrides::default()
                    .with(OverrideField::AdditionalPlatformShareTotal, Decimal::MIN),
            ),
            ..Default::default()
        };
        assert!(apply_update(&mut record, update, 2).is_err());
        assert_eq!(record.updated_at, 1_000);

        let payload = SettlementCreate {
            group_id: 10,
            period: SettlementPeriod::new(2024, 3).unwrap(),
            volume_map: VolumeMap::new(),
            manual_overrides: ManualOverrides::default()
                .with(OverrideField::PrimaryPlatformShareTotal, Decimal::MAX),
            include_negative_values: false,
            notes: String::new(),
        };
        let err: AppError = new_draft(100, &group(), payload, 0).unwrap_err().into();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[test]
    fn test_group_name_view() {
        let record = draft();

        let view = group_name_view(&record, Some(&group()));
        assert!(!view.diverged());
        assert!(!view.deleted());

        let mut renamed = group();
        renamed.name = "Retail POS (new)".into();
        let view = group_name_view(&record, Some(&renamed));
        assert!(view.diverged());
        assert_eq!(view.current.as_deref(), Some("Retail POS (new)"));

        let view = group_name_view(&record, None);
        assert!(view.deleted());
        assert_eq!(view.snapshot, "Retail POS");
    }
}
