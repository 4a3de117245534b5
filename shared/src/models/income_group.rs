//! Income Group Model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::period::SettlementPeriod;
use crate::types::{GroupId, RecordId};

/// Named, time-bounded set of income records
///
/// Only records of an active group whose validity window overlaps the
/// settlement period are eligible for settlement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncomeGroup {
    pub id: GroupId,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Member record IDs, in display order
    #[serde(default)]
    pub record_ids: Vec<RecordId>,
    /// First day the group is valid (inclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<NaiveDate>,
    /// Last day the group is valid (inclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<NaiveDate>,
}

impl IncomeGroup {
    pub fn new(id: GroupId, name: impl Into<String>, record_ids: Vec<RecordId>) -> Self {
        Self {
            id,
            name: name.into(),
            is_active: true,
            record_ids,
            valid_from: None,
            valid_until: None,
        }
    }

    pub fn with_validity(mut self, from: Option<NaiveDate>, until: Option<NaiveDate>) -> Self {
        self.valid_from = from;
        self.valid_until = until;
        self
    }

    pub fn contains(&self, record_id: RecordId) -> bool {
        self.record_ids.contains(&record_id)
    }

    /// Whether the validity window intersects `period`
    pub fn covers(&self, period: SettlementPeriod) -> bool {
        let starts_before_end = self.valid_from.is_none_or(|from| from <= period.last_day());
        let ends_after_start = self
            .valid_until
            .is_none_or(|until| until >= period.first_day());
        starts_before_end && ends_after_start
    }

    /// Active and valid for `period`
    pub fn is_eligible(&self, period: SettlementPeriod) -> bool {
        self.is_active && self.covers(period)
    }
}

fn default_true() -> bool {
    true
}
