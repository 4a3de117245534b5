//! Split policy application

use rust_decimal::Decimal;
use serde::Serialize;
use shared::models::SplitPolicy;

use crate::money::percent_of;

/// Institution and platform portions of a margin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Shares {
    pub institution_share: Decimal,
    pub platform_share: Decimal,
}

/// Split `margin` per `policy`
///
/// Linear in `margin` and never clamped: a negative margin yields negative
/// shares, which the engine's exclusion policy deals with.
pub fn compute_shares(margin: Decimal, policy: &SplitPolicy) -> Option<Shares> {
    Some(Shares {
        institution_share: percent_of(margin, policy.institution_pct)?,
        platform_share: percent_of(margin, policy.platform_pct)?,
    })
}
