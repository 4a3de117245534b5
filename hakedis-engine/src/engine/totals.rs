//! Aggregated settlement totals and manual-override merging

use rust_decimal::Decimal;
use serde::Serialize;
use shared::models::{ManualOverrides, OverrideField, RevenueModel, UsageRegion};
use std::collections::BTreeMap;

/// Computed aggregate with an optional operator-entered replacement
///
/// The computed value is always retained so "automatic vs manual" can be
/// shown side by side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OverridableAmount {
    pub computed: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual: Option<Decimal>,
}

impl OverridableAmount {
    pub fn computed(value: Decimal) -> Self {
        Self {
            computed: value,
            manual: None,
        }
    }

    /// Manual value if present, computed otherwise
    pub fn effective(&self) -> Decimal {
        self.manual.unwrap_or(self.computed)
    }

    pub fn is_manual(&self) -> bool {
        self.manual.is_some()
    }
}

/// Totals over primary (tariff) rows
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrimaryTotals {
    pub row_count: usize,
    pub volume: OverridableAmount,
    pub cost: Decimal,
    pub revenue: Decimal,
    pub margin: Decimal,
    /// Sum after the exclusion policy
    pub institution_share: Decimal,
    /// Sum after the exclusion policy
    pub platform_share: OverridableAmount,
    /// Sums of every row regardless of the exclusion policy
    pub institution_share_all_rows: Decimal,
    pub platform_share_all_rows: Decimal,
    /// Rows left out of the institution-share total
    pub excluded_institution_count: usize,
    /// Rows left out of the platform-share total
    pub excluded_platform_count: usize,
    /// Rows left out of at least one share total
    pub excluded_count: usize,
}

/// Totals over additional-income rows (no exclusion policy)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdditionalTotals {
    pub row_count: usize,
    pub volume: Decimal,
    pub institution_amount: Decimal,
    pub platform_amount: OverridableAmount,
}

/// Primary + additional
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GrandTotals {
    pub volume: OverridableAmount,
    /// Primary margin only; additional income has no margin
    pub margin: Decimal,
    pub institution_share: Decimal,
    pub platform_share: OverridableAmount,
}

/// Informational subtotal for one region or revenue model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Subtotal {
    pub row_count: usize,
    pub volume: Decimal,
    pub margin: Decimal,
    pub institution_share: Decimal,
    pub platform_share: Decimal,
}

impl Subtotal {
    pub(crate) fn add(
        &mut self,
        volume: Decimal,
        margin: Decimal,
        institution_share: Decimal,
        platform_share: Decimal,
    ) {
        self.row_count += 1;
        self.volume += volume;
        self.margin += margin;
        self.institution_share += institution_share;
        self.platform_share += platform_share;
    }
}

/// Unconditional subtotals grouped by region and by revenue model
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Breakdown {
    /// Primary and additional rows
    pub by_region: BTreeMap<UsageRegion, Subtotal>,
    /// Primary rows only
    pub by_model: BTreeMap<RevenueModel, Subtotal>,
}

/// All totals of one calculation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SettlementTotals {
    pub primary: PrimaryTotals,
    pub additional: AdditionalTotals,
    pub grand: GrandTotals,
}

impl SettlementTotals {
    /// Replace the manual side of every overridable total with `overrides`
    /// and re-derive the grand totals.
    ///
    /// Computed values are untouched, so merging an empty override set
    /// restores the computed totals exactly.
    pub fn merge_overrides(&mut self, overrides: &ManualOverrides) {
        self.primary.volume.manual = overrides.get(OverrideField::PrimaryVolumeTotal);
        self.primary.platform_share.manual =
            overrides.get(OverrideField::PrimaryPlatformShareTotal);
        self.additional.platform_amount.manual =
            overrides.get(OverrideField::AdditionalPlatformShareTotal);
        self.derive_grand();
    }

    /// Computed sides are bounded by the per-row range check; manual values
    /// are operator-entered and saturate instead of overflowing.
    pub(crate) fn derive_grand(&mut self) {
        let primary = &self.primary;
        let additional = &self.additional;

        let volume = OverridableAmount {
            computed: primary.volume.computed + additional.volume,
            manual: primary.volume.manual.map(|m| m.saturating_add(additional.volume)),
        };

        let platform_manual =
            primary.platform_share.is_manual() || additional.platform_amount.is_manual();
        let platform_share = OverridableAmount {
            computed: primary.platform_share.computed + additional.platform_amount.computed,
            manual: platform_manual.then(|| {
                primary
                    .platform_share
                    .effective()
                    .saturating_add(additional.platform_amount.effective())
            }),
        };

        self.grand = GrandTotals {
            volume,
            margin: primary.margin,
            institution_share: primary.institution_share + additional.institution_amount,
            platform_share,
        };
    }

    /// Overridden fields currently in effect
    pub fn manual_fields(&self) -> Vec<OverrideField> {
        let mut fields = Vec::new();
        if self.primary.volume.is_manual() {
            fields.push(OverrideField::PrimaryVolumeTotal);
        }
        if self.primary.platform_share.is_manual() {
            fields.push(OverrideField::PrimaryPlatformShareTotal);
        }
        if self.additional.platform_amount.is_manual() {
            fields.push(OverrideField::AdditionalPlatformShareTotal);
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> SettlementTotals {
        let mut totals = SettlementTotals {
            primary: PrimaryTotals {
                row_count: 1,
                volume: OverridableAmount::computed(dec!(1000000)),
                margin: dec!(8000),
                institution_share: dec!(4800),
                platform_share: OverridableAmount::computed(dec!(3200)),
                ..Default::default()
            },
            additional: AdditionalTotals {
                row_count: 1,
                volume: dec!(50000),
                institution_amount: dec!(35000),
                platform_amount: OverridableAmount::computed(dec!(15000)),
            },
            grand: GrandTotals::default(),
        };
        totals.derive_grand();
        totals
    }

    #[test]
    fn test_grand_totals_without_overrides() {
        let totals = sample();
        assert_eq!(totals.grand.volume.effective(), dec!(1050000));
        assert_eq!(totals.grand.platform_share.effective(), dec!(18200));
        assert_eq!(totals.grand.institution_share, dec!(39800));
        assert_eq!(totals.grand.margin, dec!(8000));
        assert!(!totals.grand.volume.is_manual());
        assert!(totals.manual_fields().is_empty());
    }

    #[test]
    fn test_override_propagates_to_grand_total() {
        let mut totals = sample();
        let overrides = ManualOverrides::default()
            .with(OverrideField::PrimaryVolumeTotal, dec!(900000))
            .with(OverrideField::AdditionalPlatformShareTotal, dec!(14000));
        totals.merge_overrides(&overrides);

        assert_eq!(totals.grand.volume.computed, dec!(1050000));
        assert_eq!(totals.grand.volume.effective(), dec!(950000));
        assert_eq!(totals.grand.platform_share.computed, dec!(18200));
        assert_eq!(totals.grand.platform_share.effective(), dec!(17200));
        assert_eq!(
            totals.manual_fields(),
            vec![
                OverrideField::PrimaryVolumeTotal,
                OverrideField::AdditionalPlatformShareTotal
            ]
        );
    }

    #[test]
    fn test_override_of_zero_is_applied() {
        let mut totals = sample();
        totals.merge_overrides(
            &ManualOverrides::default().with(OverrideField::PrimaryPlatformShareTotal, dec!(0)),
        );
        assert_eq!(totals.primary.platform_share.effective(), Decimal::ZERO);
        assert_eq!(totals.grand.platform_share.effective(), dec!(15000));
    }

    #[test]
    fn test_clearing_overrides_restores_computed() {
        let original = sample();
        let mut totals = original.clone();
        totals.merge_overrides(
            &ManualOverrides::default()
                .with(OverrideField::PrimaryVolumeTotal, dec!(1))
                .with(OverrideField::PrimaryPlatformShareTotal, dec!(2))
                .with(OverrideField::AdditionalPlatformShareTotal, dec!(3)),
        );
        assert_ne!(totals, original);

        totals.merge_overrides(&ManualOverrides::default());
        assert_eq!(totals, original);
    }

    #[test]
    fn test_extreme_override_saturates() {
        let mut totals = sample();
        totals.merge_overrides(
            &ManualOverrides::default()
                .with(OverrideField::PrimaryVolumeTotal, Decimal::MAX)
                .with(OverrideField::PrimaryPlatformShareTotal, Decimal::MAX),
        );
        assert_eq!(totals.grand.volume.effective(), Decimal::MAX);
        assert_eq!(totals.grand.platform_share.effective(), Decimal::MAX);
        assert_eq!(totals.grand.volume.computed, dec!(1050000));
    }
}
