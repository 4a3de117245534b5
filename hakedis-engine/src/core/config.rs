use rust_decimal::Decimal;
use std::str::FromStr;

use crate::engine::{CalculationOptions, DEFAULT_SPLIT_TOLERANCE};
use crate::report::{DEFAULT_MANUAL_MARKER, ReportFormatter};

/// Engine configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | ENVIRONMENT | development | runtime environment |
/// | LOG_LEVEL | info | tracing filter |
/// | LOG_JSON | false | JSON log lines |
/// | LOG_DIR | (unset) | daily rolling log directory |
/// | INCLUDE_NEGATIVE_VALUES | false | count negative shares toward share totals |
/// | REPORT_DELIMITER | , | CSV delimiter, a single ASCII character |
/// | MANUAL_MARKER | (MANUAL) | annotation for overridden totals |
/// | SPLIT_TOLERANCE | 0.01 | allowed deviation of a split from 100 |
///
/// # Example
///
/// ```ignore
/// INCLUDE_NEGATIVE_VALUES=true REPORT_DELIMITER=';' hakedis calculate --input march.json
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// development | staging | production
    pub environment: String,
    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<String>,
    /// Default exclusion policy for new drafts
    pub include_negative_values: bool,
    pub report_delimiter: u8,
    pub manual_marker: String,
    pub split_tolerance: Decimal,
}

impl EngineConfig {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".into()),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_json: lookup("LOG_JSON")
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            log_dir: lookup("LOG_DIR").filter(|v| !v.is_empty()),
            include_negative_values: lookup("INCLUDE_NEGATIVE_VALUES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            report_delimiter: lookup("REPORT_DELIMITER")
                .and_then(|v| parse_delimiter(&v))
                .unwrap_or(b','),
            manual_marker: lookup("MANUAL_MARKER")
                .unwrap_or_else(|| DEFAULT_MANUAL_MARKER.into()),
            split_tolerance: lookup("SPLIT_TOLERANCE")
                .and_then(|v| Decimal::from_str(v.trim()).ok())
                .filter(|t| !t.is_sign_negative())
                .unwrap_or(DEFAULT_SPLIT_TOLERANCE),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Calculation options for a snapshot with the given policy
    pub fn calculation_options(&self, include_negative_values: bool) -> CalculationOptions {
        CalculationOptions {
            include_negative_values,
            split_tolerance: self.split_tolerance,
        }
    }

    pub fn report_formatter(&self) -> ReportFormatter {
        ReportFormatter::new(self.manual_marker.clone())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

/// Single ASCII character; `\t` is accepted for tab
pub fn parse_delimiter(value: &str) -> Option<u8> {
    match value {
        "\\t" | "tab" => Some(b'\t'),
        _ => match value.as_bytes() {
            [byte] if byte.is_ascii() => Some(*byte),
            _ => None,
        },
    }
}
