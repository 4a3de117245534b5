//! Data anomalies surfaced during a calculation
//!
//! Anomalies never abort a settlement; they are logged and carried on the
//! result so the catalog owner can fix the underlying data.

use rust_decimal::Decimal;
use serde::Serialize;
use shared::types::RecordId;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalculationAnomaly {
    /// Group is inactive or outside its validity window
    GroupNotEligible { reason: String },
    /// Group lists a record that was not supplied
    UnknownGroupMember { record_id: RecordId },
    /// Split policy does not sum to 100
    SplitPolicyNotHundred {
        record_id: RecordId,
        institution_pct: Decimal,
        platform_pct: Decimal,
    },
    /// Additional-income split does not sum to 100
    AdditionalSplitNotHundred {
        record_id: RecordId,
        institution_pct: Decimal,
        platform_pct: Decimal,
    },
    /// Active tenor lacks a percentage its revenue model reads
    MissingRate {
        record_id: RecordId,
        tenor: String,
        fields: Vec<&'static str>,
    },
    /// Same tenor label appears more than once among active entries
    DuplicateTenor { record_id: RecordId, tenor: String },
    /// Volume entered for a key that matches no eligible row
    OrphanVolume {
        record_id: RecordId,
        tenor: Option<String>,
        volume: Decimal,
    },
    /// Volume or a derived amount exceeds the supported range; the row
    /// counts as zero
    AmountOutOfRange {
        record_id: RecordId,
        tenor: Option<String>,
        volume: Decimal,
    },
}

impl CalculationAnomaly {
    /// Emit a structured warning for this anomaly
    pub(crate) fn log(&self) {
        match self {
            Self::GroupNotEligible { reason } => {
                tracing::info!(reason = %reason, "Income group not eligible for settlement");
            }
            Self::SplitPolicyNotHundred {
                record_id,
                institution_pct,
                platform_pct,
            }
            | Self::AdditionalSplitNotHundred {
                record_id,
                institution_pct,
                platform_pct,
            } => {
                tracing::warn!(
                    record_id = *record_id,
                    institution_pct = %institution_pct,
                    platform_pct = %platform_pct,
                    "{}",
                    self
                );
            }
            Self::OrphanVolume {
                record_id,
                tenor,
                volume,
            } => {
                tracing::warn!(
                    record_id = *record_id,
                    tenor = tenor.as_deref().unwrap_or("-"),
                    volume = %volume,
                    "Volume entry matches no eligible row"
                );
            }
            _ => tracing::warn!("{}", self),
        }
    }
}

impl fmt::Display for CalculationAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GroupNotEligible { reason } => write!(f, "group not eligible: {reason}"),
            Self::UnknownGroupMember { record_id } => {
                write!(f, "group member {record_id} was not supplied")
            }
            Self::SplitPolicyNotHundred {
                record_id,
                institution_pct,
                platform_pct,
            } => write!(
                f,
                "record {record_id}: split policy {institution_pct}% + {platform_pct}% does not sum to 100"
            ),
            Self::AdditionalSplitNotHundred {
                record_id,
                institution_pct,
                platform_pct,
            } => write!(
                f,
                "record {record_id}: additional-income split {institution_pct}% + {platform_pct}% does not sum to 100"
            ),
            Self::MissingRate {
                record_id,
                tenor,
                fields,
            } => write!(
                f,
                "record {record_id} tenor {tenor}: missing {}",
                fields.join(", ")
            ),
            Self::DuplicateTenor { record_id, tenor } => {
                write!(f, "record {record_id}: tenor {tenor} listed more than once")
            }
            Self::OrphanVolume {
                record_id,
                tenor,
                volume,
            } => match tenor {
                Some(tenor) => write!(
                    f,
                    "volume {volume} for record {record_id} tenor {tenor} matches no row"
                ),
                None => write!(f, "volume {volume} for record {record_id} matches no row"),
            },
            Self::AmountOutOfRange {
                record_id,
                tenor,
                volume,
            } => match tenor {
                Some(tenor) => write!(
                    f,
                    "record {record_id} tenor {tenor}: volume {volume} is out of range, row counted as zero"
                ),
                None => write!(
                    f,
                    "record {record_id}: volume {volume} is out of range, row counted as zero"
                ),
            },
        }
    }
}
