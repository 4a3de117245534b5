//! Additional-income rule

use rust_decimal::Decimal;
use serde::Serialize;
use shared::models::IncomeRecord;

use crate::money::percent_of;

/// Institution and platform portions of an additional-income volume
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdditionalIncomeAmounts {
    pub institution_amount: Decimal,
    pub platform_amount: Decimal,
}

/// Split `volume` by the record's additional-income percentages
///
/// A record without additional-income detail contributes nothing.
pub fn compute_additional_income(
    record: &IncomeRecord,
    volume: Decimal,
) -> Option<AdditionalIncomeAmounts> {
    match &record.additional_income_detail {
        Some(detail) => Some(AdditionalIncomeAmounts {
            institution_amount: percent_of(volume, detail.institution_pct)?,
            platform_amount: percent_of(volume, detail.platform_pct)?,
        }),
        None => Some(AdditionalIncomeAmounts::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use shared::models::{AdditionalIncomeDetail, RevenueModel};

    #[test]
    fn test_additional_income_split() {
        let record = IncomeRecord::new(2, "POS rental", RevenueModel::FixedFee)
            .with_additional_income(AdditionalIncomeDetail::new(dec!(70), dec!(30)));
        let amounts = compute_additional_income(&record, dec!(50000)).unwrap();
        assert_eq!(amounts.institution_amount, dec!(35000));
        assert_eq!(amounts.platform_amount, dec!(15000));
    }

    #[test]
    fn test_primary_record_contributes_nothing() {
        let record = IncomeRecord::new(1, "Tariff", RevenueModel::SharedMargin);
        assert_eq!(
            compute_additional_income(&record, dec!(50000)),
            Some(AdditionalIncomeAmounts::default())
        );
    }
}
