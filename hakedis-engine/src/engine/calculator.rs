//! Settlement calculator
//!
//! Walks the eligible records of one income group, computes every primary
//! row and additional-income row, then aggregates them into totals.

use rust_decimal::Decimal;
use serde::Serialize;
use shared::models::{
    IncomeGroup, IncomeRecord, ManualOverrides, RevenueModel, SettlementPeriod, TenorRate,
    UsageRegion, VolumeKey, VolumeMap,
};
use shared::types::RecordId;
use std::collections::{HashMap, HashSet};

use super::anomaly::CalculationAnomaly;
use super::totals::{
    AdditionalTotals, Breakdown, OverridableAmount, PrimaryTotals, SettlementTotals,
};
use crate::money::within_amount_range;
use crate::revenue::{
    AdditionalIncomeAmounts, RowMargin, Shares, compute_additional_income, compute_row_margin,
    compute_shares, missing_rate_fields,
};

/// Default tolerance for the split-sums-to-100 check
pub const DEFAULT_SPLIT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Policy flags for one calculation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalculationOptions {
    /// Count negative shares toward the share totals
    pub include_negative_values: bool,
    /// Allowed deviation from 100 before a split is reported
    pub split_tolerance: Decimal,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self {
            include_negative_values: false,
            split_tolerance: DEFAULT_SPLIT_TOLERANCE,
        }
    }
}

impl CalculationOptions {
    pub fn with_negative_values(mut self, include: bool) -> Self {
        self.include_negative_values = include;
        self
    }
}

/// Everything one calculation reads
#[derive(Debug, Clone, Copy)]
pub struct CalculationInput<'a> {
    pub group: &'a IncomeGroup,
    pub records: &'a [IncomeRecord],
    pub volumes: &'a VolumeMap,
    /// When set, the group's validity window must cover it
    pub period: Option<SettlementPeriod>,
    pub overrides: &'a ManualOverrides,
}

/// Result of one `(record, active tenor)` pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrimaryRowResult {
    pub record_id: RecordId,
    pub record_name: String,
    pub tenor: String,
    pub revenue_model: RevenueModel,
    pub usage_region: UsageRegion,
    pub volume: Decimal,
    pub cost: Decimal,
    pub revenue: Decimal,
    pub margin: Decimal,
    pub institution_share: Decimal,
    pub platform_share: Decimal,
    pub excluded_from_institution: bool,
    pub excluded_from_platform: bool,
}

impl PrimaryRowResult {
    pub fn is_excluded(&self) -> bool {
        self.excluded_from_institution || self.excluded_from_platform
    }
}

/// Result of one additional-income record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdditionalRowResult {
    pub record_id: RecordId,
    pub record_name: String,
    pub usage_region: UsageRegion,
    pub volume: Decimal,
    pub institution_amount: Decimal,
    pub platform_amount: Decimal,
}

/// Full output of a calculation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementCalculation {
    pub primary_rows: Vec<PrimaryRowResult>,
    pub additional_rows: Vec<AdditionalRowResult>,
    pub totals: SettlementTotals,
    pub breakdown: Breakdown,
    pub anomalies: Vec<CalculationAnomaly>,
    pub include_negative_values: bool,
}

impl SettlementCalculation {
    /// Re-merge manual overrides without recomputing rows
    pub fn with_overrides(mut self, overrides: &ManualOverrides) -> Self {
        self.totals.merge_overrides(overrides);
        self
    }
}

/// Run a settlement calculation
///
/// Pure and total: identical inputs always yield identical output, and
/// missing volumes, missing tenors or an empty group resolve to zero.
pub fn calculate(
    input: &CalculationInput<'_>,
    options: &CalculationOptions,
) -> SettlementCalculation {
    let mut anomalies = Vec::new();
    let eligible = eligible_records(input, &mut anomalies);

    let (primary, additional): (Vec<&IncomeRecord>, Vec<&IncomeRecord>) = eligible
        .into_iter()
        .partition(|record| !record.is_additional_income());

    let mut breakdown = Breakdown::default();
    let mut expected_keys: HashSet<VolumeKey> = HashSet::new();

    // ========== Primary rows ==========
    let mut primary_rows = Vec::new();
    for record in &primary {
        check_split(record, options, &mut anomalies);

        let mut seen_tenors: HashSet<&str> = HashSet::new();
        for rate in record.active_rates() {
            if !seen_tenors.insert(rate.tenor.as_str()) {
                anomalies.push(CalculationAnomaly::DuplicateTenor {
                    record_id: record.id,
                    tenor: rate.tenor.clone(),
                });
                continue;
            }

            let missing = missing_rate_fields(record.revenue_model, rate);
            if !missing.is_empty() {
                anomalies.push(CalculationAnomaly::MissingRate {
                    record_id: record.id,
                    tenor: rate.tenor.clone(),
                    fields: missing,
                });
            }

            let entered = input.volumes.primary(record.id, &rate.tenor);
            expected_keys.insert(VolumeKey::primary(record.id, rate.tenor.clone()));

            let (volume, margin, shares) = match primary_amounts(record, rate, entered) {
                Some((margin, shares)) => (entered, margin, shares),
                None => {
                    anomalies.push(CalculationAnomaly::AmountOutOfRange {
                        record_id: record.id,
                        tenor: Some(rate.tenor.clone()),
                        volume: entered,
                    });
                    (Decimal::ZERO, RowMargin::ZERO, Shares::default())
                }
            };

            let excluded_from_institution =
                !options.include_negative_values && shares.institution_share < Decimal::ZERO;
            let excluded_from_platform =
                !options.include_negative_values && shares.platform_share < Decimal::ZERO;

            tracing::debug!(
                record_id = record.id,
                tenor = %rate.tenor,
                volume = %volume,
                margin = %margin.margin,
                institution_share = %shares.institution_share,
                platform_share = %shares.platform_share,
                "Computed primary row"
            );

            breakdown
                .by_region
                .entry(record.usage_region)
                .or_default()
                .add(volume, margin.margin, shares.institution_share, shares.platform_share);
            breakdown
                .by_model
                .entry(record.revenue_model)
                .or_default()
                .add(volume, margin.margin, shares.institution_share, shares.platform_share);

            primary_rows.push(PrimaryRowResult {
                record_id: record.id,
                record_name: record.name.clone(),
                tenor: rate.tenor.clone(),
                revenue_model: record.revenue_model,
                usage_region: record.usage_region,
                volume,
                cost: margin.cost,
                revenue: margin.revenue,
                margin: margin.margin,
                institution_share: shares.institution_share,
                platform_share: shares.platform_share,
                excluded_from_institution,
                excluded_from_platform,
            });
        }
    }

    // ========== Additional-income rows ==========
    let mut additional_rows = Vec::new();
    for record in &additional {
        if let Some(detail) = &record.additional_income_detail
            && !within_tolerance(detail.total_pct(), options.split_tolerance)
        {
            anomalies.push(CalculationAnomaly::AdditionalSplitNotHundred {
                record_id: record.id,
                institution_pct: detail.institution_pct,
                platform_pct: detail.platform_pct,
            });
        }

        let entered = input.volumes.additional(record.id);
        expected_keys.insert(VolumeKey::additional(record.id));
        let (volume, amounts) = match additional_amounts(record, entered) {
            Some(amounts) => (entered, amounts),
            None => {
                anomalies.push(CalculationAnomaly::AmountOutOfRange {
                    record_id: record.id,
                    tenor: None,
                    volume: entered,
                });
                (Decimal::ZERO, AdditionalIncomeAmounts::default())
            }
        };

        breakdown.by_region.entry(record.usage_region).or_default().add(
            volume,
            Decimal::ZERO,
            amounts.institution_amount,
            amounts.platform_amount,
        );

        additional_rows.push(AdditionalRowResult {
            record_id: record.id,
            record_name: record.name.clone(),
            usage_region: record.usage_region,
            volume,
            institution_amount: amounts.institution_amount,
            platform_amount: amounts.platform_amount,
        });
    }

    // ========== Orphan volumes ==========
    for (key, volume) in input.volumes.iter() {
        if !expected_keys.contains(key) && !volume.is_zero() {
            anomalies.push(CalculationAnomaly::OrphanVolume {
                record_id: key.record_id(),
                tenor: key.tenor().map(str::to_string),
                volume: *volume,
            });
        }
    }

    let mut totals = SettlementTotals {
        primary: primary_totals(&primary_rows),
        additional: additional_totals(&additional_rows),
        grand: Default::default(),
    };
    totals.merge_overrides(input.overrides);

    for anomaly in &anomalies {
        anomaly.log();
    }

    tracing::info!(
        group_id = input.group.id,
        primary_rows = primary_rows.len(),
        additional_rows = additional_rows.len(),
        excluded = totals.primary.excluded_count,
        anomalies = anomalies.len(),
        grand_volume = %totals.grand.volume.effective(),
        grand_platform_share = %totals.grand.platform_share.effective(),
        "Settlement calculated"
    );

    SettlementCalculation {
        primary_rows,
        additional_rows,
        totals,
        breakdown,
        anomalies,
        include_negative_values: options.include_negative_values,
    }
}

/// Active member records of an eligible group, in group order
fn eligible_records<'a>(
    input: &CalculationInput<'a>,
    anomalies: &mut Vec<CalculationAnomaly>,
) -> Vec<&'a IncomeRecord> {
    let group = input.group;
    if !group.is_active {
        anomalies.push(CalculationAnomaly::GroupNotEligible {
            reason: format!("group {} is inactive", group.id),
        });
        return Vec::new();
    }
    if let Some(period) = input.period
        && !group.covers(period)
    {
        anomalies.push(CalculationAnomaly::GroupNotEligible {
            reason: format!("group {} is not valid in {}", group.id, period),
        });
        return Vec::new();
    }

    // First occurrence wins when the catalog supplies duplicate ids
    let mut by_id: HashMap<RecordId, &'a IncomeRecord> = HashMap::new();
    for record in input.records {
        by_id.entry(record.id).or_insert(record);
    }

    let mut seen = HashSet::new();
    let mut eligible = Vec::new();
    for &record_id in &group.record_ids {
        if !seen.insert(record_id) {
            continue;
        }
        match by_id.get(&record_id) {
            Some(record) if record.is_active => eligible.push(*record),
            Some(_) => {
                tracing::debug!(record_id, "Skipping inactive income record");
            }
            None => anomalies.push(CalculationAnomaly::UnknownGroupMember { record_id }),
        }
    }
    eligible
}

fn check_split(
    record: &IncomeRecord,
    options: &CalculationOptions,
    anomalies: &mut Vec<CalculationAnomaly>,
) {
    let policy = &record.split_policy;
    if !within_tolerance(policy.total_pct(), options.split_tolerance) {
        anomalies.push(CalculationAnomaly::SplitPolicyNotHundred {
            record_id: record.id,
            institution_pct: policy.institution_pct,
            platform_pct: policy.platform_pct,
        });
    }
}

/// Margin and shares of one primary row, `None` when the volume or any
/// derived amount falls outside [`MAX_AMOUNT`](crate::money::MAX_AMOUNT)
fn primary_amounts(
    record: &IncomeRecord,
    rate: &TenorRate,
    volume: Decimal,
) -> Option<(RowMargin, Shares)> {
    if !within_amount_range(volume) {
        return None;
    }
    let margin = compute_row_margin(record.revenue_model, Some(rate), volume)?;
    let shares = compute_shares(margin.margin, &record.split_policy)?;
    [
        margin.cost,
        margin.revenue,
        margin.margin,
        shares.institution_share,
        shares.platform_share,
    ]
    .into_iter()
    .all(within_amount_range)
    .then_some((margin, shares))
}

fn additional_amounts(record: &IncomeRecord, volume: Decimal) -> Option<AdditionalIncomeAmounts> {
    if !within_amount_range(volume) {
        return None;
    }
    let amounts = compute_additional_income(record, volume)?;
    (within_amount_range(amounts.institution_amount)
        && within_amount_range(amounts.platform_amount))
    .then_some(amounts)
}

fn within_tolerance(total_pct: Decimal, tolerance: Decimal) -> bool {
    total_pct.saturating_sub(Decimal::ONE_HUNDRED).abs() <= tolerance
}

fn primary_totals(rows: &[PrimaryRowResult]) -> PrimaryTotals {
    let mut volume = Decimal::ZERO;
    let mut platform_share = Decimal::ZERO;
    let mut totals = PrimaryTotals {
        row_count: rows.len(),
        ..Default::default()
    };

    for row in rows {
        volume += row.volume;
        totals.cost += row.cost;
        totals.revenue += row.revenue;
        totals.margin += row.margin;
        totals.institution_share_all_rows += row.institution_share;
        totals.platform_share_all_rows += row.platform_share;

        if row.excluded_from_institution {
            totals.excluded_institution_count += 1;
        } else {
            totals.institution_share += row.institution_share;
        }
        if row.excluded_from_platform {
            totals.excluded_platform_count += 1;
        } else {
            platform_share += row.platform_share;
        }
        if row.is_excluded() {
            totals.excluded_count += 1;
        }
    }

    totals.volume = OverridableAmount::computed(volume);
    totals.platform_share = OverridableAmount::computed(platform_share);
    totals
}

fn additional_totals(rows: &[AdditionalRowResult]) -> AdditionalTotals {
    let mut platform_amount = Decimal::ZERO;
    let mut totals = AdditionalTotals {
        row_count: rows.len(),
        ..Default::default()
    };
    for row in rows {
        totals.volume += row.volume;
        totals.institution_amount += row.institution_amount;
        platform_amount += row.platform_amount;
    }
    totals.platform_amount = OverridableAmount::computed(platform_amount);
    totals
}
