//! Operator-entered transaction volumes

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::RecordId;

/// Structured volume key
///
/// Primary rows are keyed by `(record, tenor)`, additional-income rows by
/// record alone. Never flattened into a concatenated string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VolumeKey {
    Primary { record_id: RecordId, tenor: String },
    Additional { record_id: RecordId },
}

impl VolumeKey {
    pub fn primary(record_id: RecordId, tenor: impl Into<String>) -> Self {
        Self::Primary {
            record_id,
            tenor: tenor.into(),
        }
    }

    pub fn additional(record_id: RecordId) -> Self {
        Self::Additional { record_id }
    }

    pub fn record_id(&self) -> RecordId {
        match self {
            Self::Primary { record_id, .. } | Self::Additional { record_id } => *record_id,
        }
    }

    pub fn tenor(&self) -> Option<&str> {
        match self {
            Self::Primary { tenor, .. } => Some(tenor),
            Self::Additional { .. } => None,
        }
    }
}

/// Wire form of one volume entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolumeEntry {
    pub record_id: RecordId,
    /// Absent for additional-income rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenor: Option<String>,
    pub volume: Decimal,
}

impl VolumeEntry {
    pub fn key(&self) -> VolumeKey {
        match &self.tenor {
            Some(tenor) => VolumeKey::primary(self.record_id, tenor.clone()),
            None => VolumeKey::additional(self.record_id),
        }
    }
}

/// Volume map used to produce a settlement snapshot
///
/// Absent keys read as zero. Serialized as a list of [`VolumeEntry`] in key
/// order; when the list repeats a key the last entry wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<VolumeEntry>", into = "Vec<VolumeEntry>")]
pub struct VolumeMap {
    entries: BTreeMap<VolumeKey, Decimal>,
}

impl VolumeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: VolumeKey, volume: Decimal) {
        self.entries.insert(key, volume);
    }

    pub fn set_primary(&mut self, record_id: RecordId, tenor: impl Into<String>, volume: Decimal) {
        self.set(VolumeKey::primary(record_id, tenor), volume);
    }

    pub fn set_additional(&mut self, record_id: RecordId, volume: Decimal) {
        self.set(VolumeKey::additional(record_id), volume);
    }

    /// Builder form of [`set_primary`](Self::set_primary)
    pub fn with_primary(mut self, record_id: RecordId, tenor: impl Into<String>, volume: Decimal) -> Self {
        self.set_primary(record_id, tenor, volume);
        self
    }

    /// Builder form of [`set_additional`](Self::set_additional)
    pub fn with_additional(mut self, record_id: RecordId, volume: Decimal) -> Self {
        self.set_additional(record_id, volume);
        self
    }

    pub fn remove(&mut self, key: &VolumeKey) -> Option<Decimal> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &VolumeKey) -> Option<Decimal> {
        self.entries.get(key).copied()
    }

    /// Volume for a primary row, zero when not entered
    pub fn primary(&self, record_id: RecordId, tenor: &str) -> Decimal {
        self.get(&VolumeKey::primary(record_id, tenor))
            .unwrap_or(Decimal::ZERO)
    }

    /// Volume for an additional-income row, zero when not entered
    pub fn additional(&self, record_id: RecordId) -> Decimal {
        self.get(&VolumeKey::additional(record_id))
            .unwrap_or(Decimal::ZERO)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VolumeKey, &Decimal)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &VolumeKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<VolumeEntry>> for VolumeMap {
    fn from(list: Vec<VolumeEntry>) -> Self {
        let mut map = Self::new();
        for entry in list {
            map.set(entry.key(), entry.volume);
        }
        map
    }
}

impl From<VolumeMap> for Vec<VolumeEntry> {
    fn from(map: VolumeMap) -> Self {
        map.entries
            .into_iter()
            .map(|(key, volume)| match key {
                VolumeKey::Primary { record_id, tenor } => VolumeEntry {
                    record_id,
                    tenor: Some(tenor),
                    volume,
                },
                VolumeKey::Additional { record_id } => VolumeEntry {
                    record_id,
                    tenor: None,
                    volume,
                },
            })
            .collect()
    }
}

impl FromIterator<(VolumeKey, Decimal)> for VolumeMap {
    fn from_iter<I: IntoIterator<Item = (VolumeKey, Decimal)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
