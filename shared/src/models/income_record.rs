//! Income-Sharing Record Model (gelir paylaşım kaydı)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::RecordId;

/// Pricing model a record is settled under
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevenueModel {
    /// margin = sell - buy
    SharedMargin,
    /// margin = volume * fixed%
    FixedFee,
    /// margin = volume * unit amount * platform yield%
    TreasuryYield,
}

impl RevenueModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SharedMargin => "SHARED_MARGIN",
            Self::FixedFee => "FIXED_FEE",
            Self::TreasuryYield => "TREASURY_YIELD",
        }
    }
}

impl std::fmt::Display for RevenueModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Usage region (grouping attribute only, never affects arithmetic)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsageRegion {
    #[default]
    DomesticUse,
    ForeignUse,
}

impl UsageRegion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DomesticUse => "DOMESTIC_USE",
            Self::ForeignUse => "FOREIGN_USE",
        }
    }
}

impl std::fmt::Display for UsageRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tenor bucket of a record's rate table
///
/// Which percentages are meaningful depends on the record's [`RevenueModel`];
/// absent values are treated as zero by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TenorRate {
    /// Settlement-timing bucket label, e.g. "D+7"
    pub tenor: String,
    /// Cost rate (SharedMargin)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_pct: Option<Decimal>,
    /// Revenue rate (SharedMargin)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_pct: Option<Decimal>,
    /// Fee rate (FixedFee)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_pct: Option<Decimal>,
    /// Amount per unit of volume (TreasuryYield)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_amount: Option<Decimal>,
    /// Platform yield on the total amount (TreasuryYield)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_yield_pct: Option<Decimal>,
    #[serde(default = "default_true", alias = "active")]
    pub is_active: bool,
}

impl TenorRate {
    /// Create an empty, active tenor entry
    pub fn new(tenor: impl Into<String>) -> Self {
        Self {
            tenor: tenor.into(),
            buy_pct: None,
            sell_pct: None,
            fixed_pct: None,
            unit_amount: None,
            platform_yield_pct: None,
            is_active: true,
        }
    }

    /// SharedMargin entry
    pub fn shared_margin(tenor: impl Into<String>, buy_pct: Decimal, sell_pct: Decimal) -> Self {
        Self {
            buy_pct: Some(buy_pct),
            sell_pct: Some(sell_pct),
            ..Self::new(tenor)
        }
    }

    /// FixedFee entry
    pub fn fixed_fee(tenor: impl Into<String>, fixed_pct: Decimal) -> Self {
        Self {
            fixed_pct: Some(fixed_pct),
            ..Self::new(tenor)
        }
    }

    /// TreasuryYield entry
    pub fn treasury_yield(
        tenor: impl Into<String>,
        unit_amount: Decimal,
        platform_yield_pct: Decimal,
    ) -> Self {
        Self {
            unit_amount: Some(unit_amount),
            platform_yield_pct: Some(platform_yield_pct),
            ..Self::new(tenor)
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Institution / platform split of a record's margin
///
/// Percentages are expected to sum to 100 but this is not enforced here;
/// the engine reports a deviating policy as an anomaly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SplitPolicy {
    pub institution_pct: Decimal,
    pub platform_pct: Decimal,
}

impl SplitPolicy {
    pub fn new(institution_pct: Decimal, platform_pct: Decimal) -> Self {
        Self {
            institution_pct,
            platform_pct,
        }
    }

    /// Sum of both sides (100 for a well-formed policy)
    pub fn total_pct(&self) -> Decimal {
        self.institution_pct.saturating_add(self.platform_pct)
    }
}

impl Default for SplitPolicy {
    /// Even split, used when the catalog supplies no policy
    fn default() -> Self {
        Self {
            institution_pct: Decimal::from(50),
            platform_pct: Decimal::from(50),
        }
    }
}

/// Additional-income split, applied directly to volume
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AdditionalIncomeDetail {
    pub institution_pct: Decimal,
    pub platform_pct: Decimal,
}

impl AdditionalIncomeDetail {
    pub fn new(institution_pct: Decimal, platform_pct: Decimal) -> Self {
        Self {
            institution_pct,
            platform_pct,
        }
    }

    pub fn total_pct(&self) -> Decimal {
        self.institution_pct.saturating_add(self.platform_pct)
    }
}

/// Income-sharing record - one tariff line of a counterparty agreement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncomeRecord {
    pub id: RecordId,
    /// Display name (counterparty / tariff label)
    #[serde(default)]
    pub name: String,
    pub revenue_model: RevenueModel,
    #[serde(default)]
    pub tenor_rates: Vec<TenorRate>,
    #[serde(default)]
    pub split_policy: SplitPolicy,
    /// Presence marks the record as an additional-income row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_income_detail: Option<AdditionalIncomeDetail>,
    #[serde(default)]
    pub usage_region: UsageRegion,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl IncomeRecord {
    /// Primary tariff record with no rates yet
    pub fn new(id: RecordId, name: impl Into<String>, revenue_model: RevenueModel) -> Self {
        Self {
            id,
            name: name.into(),
            revenue_model,
            tenor_rates: Vec::new(),
            split_policy: SplitPolicy::default(),
            additional_income_detail: None,
            usage_region: UsageRegion::default(),
            is_active: true,
        }
    }

    pub fn with_rate(mut self, rate: TenorRate) -> Self {
        self.tenor_rates.push(rate);
        self
    }

    pub fn with_split(mut self, split_policy: SplitPolicy) -> Self {
        self.split_policy = split_policy;
        self
    }

    pub fn with_additional_income(mut self, detail: AdditionalIncomeDetail) -> Self {
        self.additional_income_detail = Some(detail);
        self
    }

    pub fn with_region(mut self, usage_region: UsageRegion) -> Self {
        self.usage_region = usage_region;
        self
    }

    /// Whether this record is settled by the additional-income rule
    pub fn is_additional_income(&self) -> bool {
        self.additional_income_detail.is_some()
    }

    /// Active tenor entries, in table order
    pub fn active_rates(&self) -> impl Iterator<Item = &TenorRate> {
        self.tenor_rates.iter().filter(|r| r.is_active)
    }

    /// First active entry for `tenor`
    pub fn active_rate(&self, tenor: &str) -> Option<&TenorRate> {
        self.active_rates().find(|r| r.tenor == tenor)
    }
}

fn default_true() -> bool {
    true
}
