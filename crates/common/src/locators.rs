//! Symbolic name → selector registry for the target page
//!
//! Selectors are not checked against the live page; a stale selector shows up
//! later as an `ElementNotFound` or a failed assertion.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{FieldSpec, ValueFormat};

/// Field name of the loan amount input
pub const LOAN_AMOUNT: &str = "loanAmount";
/// Field name of the interest rate input
pub const INTEREST_RATE: &str = "interestRate";
/// Field name of the loan term input
pub const TERM: &str = "term";

/// Default selector of the monthly payment display
pub const DEFAULT_RESULT_SELECTOR: &str = "#calc-tab-tabpane-calcTab1 div.bg-light span.h2";

/// Selector overrides, usually from the `[locators]` config table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorOverrides {
    /// Field name → selector
    pub fields: BTreeMap<String, String>,

    /// Result region selector
    pub result: Option<String>,
}

/// Immutable registry built once at startup
#[derive(Debug, Clone)]
pub struct LocatorRegistry {
    fields: HashMap<String, FieldSpec>,
    order: Vec<String>,
    result: FieldSpec,
}

impl LocatorRegistry {
    /// Empty registry with only a result region
    pub fn new(result_selector: &str) -> Self {
        Self {
            fields: HashMap::new(),
            order: Vec::new(),
            result: FieldSpec::new("result", result_selector, ValueFormat::Currency, "result"),
        }
    }

    /// Registry for the personal loan calculator
    pub fn loan_calculator() -> Self {
        Self::new(DEFAULT_RESULT_SELECTOR)
            .with_field(FieldSpec::new(
                LOAN_AMOUNT,
                "#loanAmount",
                ValueFormat::Currency,
                "loan amount",
            ))
            .with_field(FieldSpec::new(
                INTEREST_RATE,
                "#interestRate",
                ValueFormat::Numeric,
                "interest rate",
            ))
            .with_field(FieldSpec::new(
                TERM,
                "#term",
                ValueFormat::Numeric,
                "loan term",
            ))
    }

    /// Add or replace a field. Registration order is kept for iteration.
    pub fn with_field(mut self, field: FieldSpec) -> Self {
        if !self.fields.contains_key(&field.name) {
            self.order.push(field.name.clone());
        }
        self.fields.insert(field.name.clone(), field);
        self
    }

    /// Apply selector overrides. Overriding an unregistered field is an error.
    pub fn with_overrides(mut self, overrides: &LocatorOverrides) -> Result<Self> {
        for (name, selector) in &overrides.fields {
            let field = self
                .fields
                .get_mut(name)
                .ok_or_else(|| Error::UnknownField(name.clone()))?;
            debug!("Overriding selector for '{}': {}", name, selector);
            field.selector = selector.clone();
        }
        if let Some(result) = &overrides.result {
            self.result.selector = result.clone();
        }
        Ok(self)
    }

    /// Look up a field by symbolic name
    pub fn field(&self, name: &str) -> Result<&FieldSpec> {
        self.fields
            .get(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }

    /// Selector for a symbolic name
    pub fn selector(&self, name: &str) -> Result<&str> {
        self.field(name).map(|f| f.selector.as_str())
    }

    /// The result display region
    pub fn result(&self) -> &FieldSpec {
        &self.result
    }

    /// Fields in registration order
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.order.iter().filter_map(|name| self.fields.get(name))
    }

    /// Names in registration order
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }
}

impl Default for LocatorRegistry {
    fn default() -> Self {
        Self::loan_calculator()
    }
}
