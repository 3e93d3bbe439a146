//! Error types for scenario execution

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Element not found: {target} (waited {} ms)", .waited.as_millis())]
    ElementNotFound { target: String, waited: Duration },

    #[error("Value mismatch for {target}: expected {expected:?}, got {actual:?}")]
    ValueMismatch {
        target: String,
        expected: String,
        actual: String,
    },

    #[error("Format mismatch: {actual:?} does not match {pattern}")]
    FormatMismatch { pattern: String, actual: String },

    #[error("Result not computed: {0}")]
    ResultNotComputed(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotFailure(String),

    #[error("Browser failed to launch: {0}")]
    BrowserLaunch(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Navigation to {url} did not complete within {} ms", .timeout.as_millis())]
    NavigationTimeout { url: String, timeout: Duration },

    #[error("Session is {0}, expected active")]
    SessionNotActive(String),

    #[error("Feature parse error at line {line}: {reason}")]
    FeatureParse { line: usize, reason: String },

    #[error("Undefined step: {0}")]
    UndefinedStep(String),

    #[error("Ambiguous step '{step}' matches: {}", .candidates.join(", "))]
    AmbiguousStep {
        step: String,
        candidates: Vec<String>,
    },

    #[error("Invalid step definition '{phrase}': {reason}")]
    InvalidStepDefinition { phrase: String, reason: String },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error(transparent)]
    Common(#[from] loancheck_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<chromiumoxide::error::CdpError> for E2eError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        E2eError::Browser(e.to_string())
    }
}

impl E2eError {
    /// Whether this error aborts the scenario. Screenshot failures never do.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, E2eError::ScreenshotFailure(_))
    }

    /// Short kind name used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            E2eError::ElementNotFound { .. } => "element_not_found",
            E2eError::ValueMismatch { .. } => "value_mismatch",
            E2eError::FormatMismatch { .. } => "format_mismatch",
            E2eError::ResultNotComputed(_) => "result_not_computed",
            E2eError::ScreenshotFailure(_) => "screenshot_failure",
            E2eError::BrowserLaunch(_) | E2eError::Browser(_) => "browser",
            E2eError::NavigationTimeout { .. } => "navigation_timeout",
            E2eError::SessionNotActive(_) => "session_state",
            E2eError::FeatureParse { .. } => "feature_parse",
            E2eError::UndefinedStep(_) => "undefined_step",
            E2eError::AmbiguousStep { .. } => "ambiguous_step",
            E2eError::InvalidStepDefinition { .. } => "invalid_step_definition",
            E2eError::InvalidPattern { .. } => "invalid_pattern",
            E2eError::Common(_) => "config",
            E2eError::Io(_) => "io",
            E2eError::Json(_) => "json",
        }
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
