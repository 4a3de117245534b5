//! Money calculation utilities using rust_decimal for precision
//!
//! Calculations keep full `Decimal` precision; rounding to 2 decimal places
//! only happens when a value is formatted for export.

use rust_decimal::prelude::*;

/// Rounding strategy for monetary values (2 decimal places, half away from zero)
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Largest magnitude accepted for a volume or a computed row amount (10^20)
///
/// Every row stays within this bound, so summing rows cannot overflow `Decimal`.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_661_992_960, 1_808_227_885, 5, false, 0);

#[inline]
pub fn within_amount_range(value: Decimal) -> bool {
    value.abs() <= MAX_AMOUNT
}

/// `value * pct / 100`, `None` when the product leaves the `Decimal` range
///
/// The only division is by the constant 100, so there is no divide-by-zero path.
#[inline]
pub fn percent_of(value: Decimal, pct: Decimal) -> Option<Decimal> {
    value
        .checked_mul(pct)
        .and_then(|product| product.checked_div(Decimal::ONE_HUNDRED))
}

/// Round to 2 decimal places, half away from zero
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Fixed 2-decimal representation, e.g. `1234.5` -> `"1234.50"`
///
/// Negative zero is normalised so `-0.001` renders as `"0.00"`.
pub fn format_money(value: Decimal) -> String {
    let mut rounded = round_money(value);
    if rounded.is_zero() {
        rounded = Decimal::ZERO;
    }
    rounded.rescale(DECIMAL_PLACES);
    rounded.to_string()
}

/// Compare two monetary values after rounding to cents
#[inline]
pub fn money_eq(a: Decimal, b: Decimal) -> bool {
    (round_money(a) - round_money(b)).abs() < MONEY_TOLERANCE
}
