//! Revenue model strategy

use rust_decimal::Decimal;
use serde::Serialize;
use shared::models::{RevenueModel, TenorRate};

use crate::money::percent_of;

/// Cost, revenue and margin of one primary row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowMargin {
    pub cost: Decimal,
    pub revenue: Decimal,
    pub margin: Decimal,
}

impl RowMargin {
    pub const ZERO: RowMargin = RowMargin {
        cost: Decimal::ZERO,
        revenue: Decimal::ZERO,
        margin: Decimal::ZERO,
    };
}

/// Compute a row's margin under `model`
///
/// Zero volume, a missing rate or an inactive rate all yield
/// [`RowMargin::ZERO`]. Absent percentages count as zero. `None` only when a
/// product overflows.
pub fn compute_row_margin(
    model: RevenueModel,
    rate: Option<&TenorRate>,
    volume: Decimal,
) -> Option<RowMargin> {
    let Some(rate) = rate.filter(|r| r.is_active) else {
        return Some(RowMargin::ZERO);
    };
    if volume.is_zero() {
        return Some(RowMargin::ZERO);
    }

    let row = match model {
        RevenueModel::SharedMargin => {
            let cost = percent_of(volume, rate.buy_pct.unwrap_or_default())?;
            let revenue = percent_of(volume, rate.sell_pct.unwrap_or_default())?;
            RowMargin {
                cost,
                revenue,
                margin: revenue.checked_sub(cost)?,
            }
        }
        RevenueModel::FixedFee => {
            let margin = percent_of(volume, rate.fixed_pct.unwrap_or_default())?;
            RowMargin {
                cost: Decimal::ZERO,
                revenue: margin,
                margin,
            }
        }
        RevenueModel::TreasuryYield => {
            let total_amount = volume.checked_mul(rate.unit_amount.unwrap_or_default())?;
            RowMargin {
                cost: total_amount,
                revenue: total_amount,
                margin: percent_of(total_amount, rate.platform_yield_pct.unwrap_or_default())?,
            }
        }
    };
    Some(row)
}

/// Rate fields `model` reads that are absent on `rate`
pub fn missing_rate_fields(model: RevenueModel, rate: &TenorRate) -> Vec<&'static str> {
    let required = match model {
        RevenueModel::SharedMargin => vec![("buy_pct", rate.buy_pct), ("sell_pct", rate.sell_pct)],
        RevenueModel::FixedFee => vec![("fixed_pct", rate.fixed_pct)],
        RevenueModel::TreasuryYield => vec![
            ("unit_amount", rate.unit_amount),
            ("platform_yield_pct", rate.platform_yield_pct),
        ],
    };
    required
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| name)
        .collect()
}
