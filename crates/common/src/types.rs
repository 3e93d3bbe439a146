//! Core types for loancheck

use serde::{Deserialize, Serialize};

use crate::format;

/// Expected shape of a field's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    Numeric,
    Currency,
}

impl Default for ValueFormat {
    fn default() -> Self {
        Self::Numeric
    }
}

impl std::fmt::Display for ValueFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueFormat::Numeric => write!(f, "numeric"),
            ValueFormat::Currency => write!(f, "currency"),
        }
    }
}

impl ValueFormat {
    /// Whether a literal input is plausible for this format.
    ///
    /// Inputs are typed verbatim into the page, so this never rewrites
    /// anything; callers only use it to flag suspicious literals.
    pub fn is_plausible_input(&self, value: &str) -> bool {
        match self {
            ValueFormat::Numeric | ValueFormat::Currency => {
                value.is_empty() || value.trim().parse::<f64>().is_ok()
            }
        }
    }
}

/// A symbolic field on the target page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Symbolic name used by steps (e.g. `loanAmount`)
    pub name: String,

    /// CSS selector resolving to the input element
    pub selector: String,

    /// Expected value format
    #[serde(default)]
    pub format: ValueFormat,

    /// Human label used in validation messages (e.g. "loan amount")
    pub label: String,
}

impl FieldSpec {
    pub fn new(name: &str, selector: &str, format: ValueFormat, label: &str) -> Self {
        Self {
            name: name.to_string(),
            selector: selector.to_string(),
            format,
            label: label.to_string(),
        }
    }

    /// Pattern of the page's validation message for this field
    pub fn error_pattern(&self) -> String {
        format!("valid {}", regex::escape(&self.label))
    }
}

/// Final status of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Passed,
    Failed,
    Skipped,
}

impl std::fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScenarioStatus::Passed => write!(f, "passed"),
            ScenarioStatus::Failed => write!(f, "failed"),
            ScenarioStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Outcome handed to session teardown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub status: ScenarioStatus,
}

impl ScenarioOutcome {
    pub fn new(name: impl Into<String>, status: ScenarioStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }

    pub fn passed(name: impl Into<String>) -> Self {
        Self::new(name, ScenarioStatus::Passed)
    }

    pub fn failed(name: impl Into<String>) -> Self {
        Self::new(name, ScenarioStatus::Failed)
    }

    /// Screenshot partition for this outcome. Only a pass lands in `passed`.
    pub fn classification(&self) -> &'static str {
        match self.status {
            ScenarioStatus::Passed => "passed",
            ScenarioStatus::Failed | ScenarioStatus::Skipped => "failed",
        }
    }

    /// Display name with spaces replaced, safe as a file name component
    pub fn file_stem(&self) -> String {
        self.name
            .chars()
            .map(|c| match c {
                ' ' | '/' | '\\' => '_',
                other => other,
            })
            .collect()
    }
}

/// Text read from the result region at assertion time
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSnapshot {
    /// Raw text as rendered
    pub raw: String,

    /// Value after stripping everything but digits and `.`
    pub amount: Option<f64>,
}

impl ResultSnapshot {
    pub fn capture(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let amount = format::parse_stripped_number(&raw);
        Self { raw, amount }
    }

    pub fn is_numeric(&self) -> bool {
        self.amount.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stem_replaces_spaces() {
        let outcome = ScenarioOutcome::passed("Calculate monthly payment with valid inputs");
        assert_eq!(
            outcome.file_stem(),
            "Calculate_monthly_payment_with_valid_inputs"
        );
    }

    #[test]
    fn test_classification() {
        assert_eq!(ScenarioOutcome::passed("a").classification(), "passed");
        assert_eq!(ScenarioOutcome::failed("a").classification(), "failed");
    }

    #[test]
    fn test_result_snapshot_numeric() {
        let snap = ResultSnapshot::capture("$1,234.56");
        assert_eq!(snap.amount, Some(1234.56));

        let snap = ResultSnapshot::capture("--");
        assert!(!snap.is_numeric());
    }

    #[test]
    fn test_error_pattern() {
        let field = FieldSpec::new("term", "#term", ValueFormat::Numeric, "loan term");
        assert_eq!(field.error_pattern(), "valid loan term");
    }

    #[test]
    fn test_plausible_input() {
        assert!(ValueFormat::Numeric.is_plausible_input("-12"));
        assert!(ValueFormat::Currency.is_plausible_input("10000"));
        assert!(!ValueFormat::Numeric.is_plausible_input("ten"));
    }
}
