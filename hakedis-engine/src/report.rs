//! Flat tabular settlement export
//!
//! One row per primary row, one per additional-income row, then the primary,
//! additional and grand totals. Every amount is a fixed 2-decimal string;
//! totals taken from a manual override carry the manual marker so the
//! distinction survives serialization. Primary rows left out of a share total
//! by the exclusion policy name the side(s) in the `excluded` column.

use serde::Serialize;
use shared::models::{
    IncomeGroup, OverrideField, RevenueModel, SettlementPeriod, SettlementRecord,
    SettlementStatus, UsageRegion,
};
use shared::types::RecordId;
use shared::{AppError, ErrorCode};
use std::io;
use thiserror::Error;

use crate::engine::{OverridableAmount, SettlementCalculation};
use crate::lifecycle::group_name_view;
use crate::money::format_money;

/// Default annotation for overridden totals
pub const DEFAULT_MANUAL_MARKER: &str = "(MANUAL)";

/// Report error types
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Report is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Result type for report operations
pub type ReportResult<T> = Result<T, ReportError>;

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        AppError::with_message(ErrorCode::ReportSerializationFailed, err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportRowKind {
    Primary,
    Additional,
    PrimaryTotal,
    AdditionalTotal,
    GrandTotal,
}

impl ReportRowKind {
    pub fn is_total(&self) -> bool {
        matches!(
            self,
            Self::PrimaryTotal | Self::AdditionalTotal | Self::GrandTotal
        )
    }
}

/// One exported row. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub kind: ReportRowKind,
    pub record_id: Option<RecordId>,
    pub tenor: String,
    pub region: String,
    pub model: String,
    pub volume: String,
    pub cost: String,
    pub revenue: String,
    pub margin: String,
    pub institution_share: String,
    pub platform_share: String,
    /// `institution`, `platform`, `institution+platform` or empty
    pub excluded: String,
}

impl ReportRow {
    fn total(kind: ReportRowKind) -> Self {
        Self {
            kind,
            record_id: None,
            tenor: String::new(),
            region: String::new(),
            model: String::new(),
            volume: String::new(),
            cost: String::new(),
            revenue: String::new(),
            margin: String::new(),
            institution_share: String::new(),
            platform_share: String::new(),
            excluded: String::new(),
        }
    }
}

/// Snapshot metadata printed above the table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportHeader {
    pub group_name: String,
    /// Catalog name today; `None` if the group was deleted
    pub current_group_name: Option<String>,
    pub group_renamed: bool,
    pub period: SettlementPeriod,
    pub status: SettlementStatus,
    pub revision: u32,
    pub include_negative_values: bool,
    pub excluded_count: usize,
    pub overridden_fields: Vec<OverrideField>,
    pub anomaly_count: usize,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementReport {
    pub header: ReportHeader,
    pub rows: Vec<ReportRow>,
}

impl SettlementReport {
    /// Serialize the table with the given single-byte delimiter
    pub fn to_csv(&self, delimiter: u8) -> ReportResult<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf, delimiter)?;
        Ok(String::from_utf8(buf)?)
    }

    pub fn write_csv<W: io::Write>(&self, writer: W, delimiter: u8) -> ReportResult<()> {
        let mut wrt = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(writer);
        for row in &self.rows {
            wrt.serialize(row)?;
        }
        wrt.flush()?;
        Ok(())
    }

    /// Rows of one kind
    pub fn rows_of(&self, kind: ReportRowKind) -> impl Iterator<Item = &ReportRow> {
        self.rows.iter().filter(move |row| row.kind == kind)
    }
}

/// CSV column names, in order
pub const COLUMNS: [&str; 12] = [
    "kind",
    "record_id",
    "tenor",
    "region",
    "model",
    "volume",
    "cost",
    "revenue",
    "margin",
    "institution_share",
    "platform_share",
    "excluded",
];

#[derive(Debug, Clone)]
pub struct ReportFormatter {
    manual_marker: String,
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_MANUAL_MARKER)
    }
}

impl ReportFormatter {
    pub fn new(manual_marker: impl Into<String>) -> Self {
        Self {
            manual_marker: manual_marker.into(),
        }
    }

    pub fn manual_marker(&self) -> &str {
        &self.manual_marker
    }

    /// Build the full report for a stored snapshot
    pub fn build(
        &self,
        record: &SettlementRecord,
        calc: &SettlementCalculation,
        current_group: Option<&IncomeGroup>,
    ) -> SettlementReport {
        let names = group_name_view(record, current_group);
        let header = ReportHeader {
            group_renamed: names.diverged(),
            group_name: names.snapshot,
            current_group_name: names.current,
            period: record.period,
            status: record.status,
            revision: record.revision,
            include_negative_values: calc.include_negative_values,
            excluded_count: calc.totals.primary.excluded_count,
            overridden_fields: calc.totals.manual_fields(),
            anomaly_count: calc.anomalies.len(),
            notes: record.notes.clone(),
        };
        SettlementReport {
            header,
            rows: self.rows(calc),
        }
    }

    /// Table rows in stable order
    pub fn rows(&self, calc: &SettlementCalculation) -> Vec<ReportRow> {
        let mut rows = Vec::with_capacity(calc.primary_rows.len() + calc.additional_rows.len() + 3);

        for row in &calc.primary_rows {
            rows.push(ReportRow {
                kind: ReportRowKind::Primary,
                record_id: Some(row.record_id),
                tenor: row.tenor.clone(),
                region: region_label(row.usage_region),
                model: model_label(row.revenue_model),
                volume: format_money(row.volume),
                cost: format_money(row.cost),
                revenue: format_money(row.revenue),
                margin: format_money(row.margin),
                institution_share: format_money(row.institution_share),
                platform_share: format_money(row.platform_share),
                excluded: excluded_label(row.excluded_from_institution, row.excluded_from_platform)
                    .to_string(),
            });
        }

        for row in &calc.additional_rows {
            rows.push(ReportRow {
                kind: ReportRowKind::Additional,
                record_id: Some(row.record_id),
                tenor: String::new(),
                region: region_label(row.usage_region),
                model: String::new(),
                volume: format_money(row.volume),
                cost: String::new(),
                revenue: String::new(),
                margin: String::new(),
                institution_share: format_money(row.institution_amount),
                platform_share: format_money(row.platform_amount),
                excluded: String::new(),
            });
        }

        let totals = &calc.totals;

        let primary = &totals.primary;
        rows.push(ReportRow {
            volume: self.amount(&primary.volume),
            cost: format_money(primary.cost),
            revenue: format_money(primary.revenue),
            margin: format_money(primary.margin),
            institution_share: format_money(primary.institution_share),
            platform_share: self.amount(&primary.platform_share),
            ..ReportRow::total(ReportRowKind::PrimaryTotal)
        });

        let additional = &totals.additional;
        rows.push(ReportRow {
            volume: format_money(additional.volume),
            institution_share: format_money(additional.institution_amount),
            platform_share: self.amount(&additional.platform_amount),
            ..ReportRow::total(ReportRowKind::AdditionalTotal)
        });

        let grand = &totals.grand;
        rows.push(ReportRow {
            volume: self.amount(&grand.volume),
            margin: format_money(grand.margin),
            institution_share: format_money(grand.institution_share),
            platform_share: self.amount(&grand.platform_share),
            ..ReportRow::total(ReportRowKind::GrandTotal)
        });

        rows
    }

    fn amount(&self, amount: &OverridableAmount) -> String {
        let formatted = format_money(amount.effective());
        if amount.is_manual() {
            format!("{formatted} {}", self.manual_marker)
        } else {
            formatted
        }
    }
}

fn excluded_label(institution: bool, platform: bool) -> &'static str {
    match (institution, platform) {
        (true, true) => "institution+platform",
        (true, false) => "institution",
        (false, true) => "platform",
        (false, false) => "",
    }
}

fn region_label(region: UsageRegion) -> String {
    region.as_str().to_string()
}

fn model_label(model: RevenueModel) -> String {
    model.as_str().to_string()
}
