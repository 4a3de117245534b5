//! Settlement Snapshot Model (hakediş kaydı)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::income_group::IncomeGroup;
use super::income_record::IncomeRecord;
use super::period::SettlementPeriod;
use super::volume::VolumeMap;
use crate::types::{GroupId, SettlementId, Timestamp};

/// Settlement status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementStatus {
    #[default]
    Draft,
    Finalized,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Finalized => "FINALIZED",
        }
    }
}

impl std::fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate an operator may supersede with a manual value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideField {
    PrimaryVolumeTotal,
    PrimaryPlatformShareTotal,
    AdditionalPlatformShareTotal,
}

impl OverrideField {
    /// All fields, in display order
    pub const ALL: [OverrideField; 3] = [
        OverrideField::PrimaryVolumeTotal,
        OverrideField::PrimaryPlatformShareTotal,
        OverrideField::AdditionalPlatformShareTotal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryVolumeTotal => "primary_volume_total",
            Self::PrimaryPlatformShareTotal => "primary_platform_share_total",
            Self::AdditionalPlatformShareTotal => "additional_platform_share_total",
        }
    }

    /// Operator-facing label
    pub fn label(&self) -> &'static str {
        match self {
            Self::PrimaryVolumeTotal => "Primary volume total",
            Self::PrimaryPlatformShareTotal => "Primary platform share total",
            Self::AdditionalPlatformShareTotal => "Additional income platform share total",
        }
    }
}

impl std::fmt::Display for OverrideField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Manual values superseding computed aggregates
///
/// `None` means "no override"; `Some(0)` is an override of zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_volume_total: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_platform_share_total: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_platform_share_total: Option<Decimal>,
}

impl ManualOverrides {
    pub fn get(&self, field: OverrideField) -> Option<Decimal> {
        match field {
            OverrideField::PrimaryVolumeTotal => self.primary_volume_total,
            OverrideField::PrimaryPlatformShareTotal => self.primary_platform_share_total,
            OverrideField::AdditionalPlatformShareTotal => self.additional_platform_share_total,
        }
    }

    fn slot(&mut self, field: OverrideField) -> &mut Option<Decimal> {
        match field {
            OverrideField::PrimaryVolumeTotal => &mut self.primary_volume_total,
            OverrideField::PrimaryPlatformShareTotal => &mut self.primary_platform_share_total,
            OverrideField::AdditionalPlatformShareTotal => {
                &mut self.additional_platform_share_total
            }
        }
    }

    /// Set an override, returning the previous value
    pub fn set(&mut self, field: OverrideField, value: Decimal) -> Option<Decimal> {
        self.slot(field).replace(value)
    }

    /// Clear an override, returning the removed value
    pub fn clear(&mut self, field: OverrideField) -> Option<Decimal> {
        self.slot(field).take()
    }

    pub fn with(mut self, field: OverrideField, value: Decimal) -> Self {
        self.set(field, value);
        self
    }

    /// Fields currently overridden, in [`OverrideField::ALL`] order
    pub fn active_fields(&self) -> Vec<OverrideField> {
        OverrideField::ALL
            .into_iter()
            .filter(|field| self.get(*field).is_some())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        OverrideField::ALL
            .into_iter()
            .all(|field| self.get(field).is_none())
    }
}

/// Catalog state captured when a snapshot is finalized
///
/// A Finalized snapshot is recomputed from this copy, so later catalog edits
/// (rates, membership, active flag, validity window) leave its totals alone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrozenCatalog {
    pub group: IncomeGroup,
    #[serde(default)]
    pub records: Vec<IncomeRecord>,
}

/// Persisted settlement snapshot for one `(group, period)` pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettlementRecord {
    pub id: SettlementId,
    pub group_id: GroupId,
    /// Group name captured at save time
    pub group_name_snapshot: String,
    pub period: SettlementPeriod,
    #[serde(default)]
    pub volume_map: VolumeMap,
    #[serde(default)]
    pub status: SettlementStatus,
    #[serde(default)]
    pub manual_overrides: ManualOverrides,
    /// Exclusion policy the snapshot was computed with
    #[serde(default)]
    pub include_negative_values: bool,
    #[serde(default)]
    pub notes: String,
    /// 1 for the first snapshot, incremented by each revision
    #[serde(default = "default_revision")]
    pub revision: u32,
    /// Finalized snapshot this revision replaces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<SettlementId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<Timestamp>,
    /// Set on finalize; `None` while Draft
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frozen_catalog: Option<FrozenCatalog>,
}

impl SettlementRecord {
    pub fn is_finalized(&self) -> bool {
        self.status == SettlementStatus::Finalized
    }
}

/// Create settlement payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementCreate {
    pub group_id: GroupId,
    pub period: SettlementPeriod,
    #[serde(default)]
    pub volume_map: VolumeMap,
    #[serde(default)]
    pub manual_overrides: ManualOverrides,
    #[serde(default)]
    pub include_negative_values: bool,
    #[serde(default)]
    pub notes: String,
}

/// Update settlement payload (absent fields are left unchanged)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettlementUpdate {
    pub volume_map: Option<VolumeMap>,
    pub manual_overrides: Option<ManualOverrides>,
    pub include_negative_values: Option<bool>,
    pub notes: Option<String>,
}

fn default_revision() -> u32 {
    1
}
