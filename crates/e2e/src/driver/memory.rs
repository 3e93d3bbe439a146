//! In-memory simulation of the personal loan calculator
//!
//! Reproduces the widget's observable behaviour closely enough to exercise
//! the whole harness without a browser: three inputs validated on blur,
//! a "Calculate" button rendering the amortized monthly payment after a
//! configurable delay, and a "Reset" button clearing everything.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use loancheck_common::locators::{INTEREST_RATE, LOAN_AMOUNT, TERM};
use loancheck_common::{CurrencyFormat, HarnessConfig, LocatorRegistry};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use super::{BrowserLauncher, ElementState, PageDriver};
use crate::error::{E2eError, E2eResult};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Accepted input range per field, inclusive
#[derive(Debug, Clone, Copy)]
struct Bounds {
    min: f64,
    max: f64,
}

#[derive(Debug, Clone)]
struct SimField {
    name: String,
    selector: String,
    label: String,
    bounds: Bounds,
    value: String,
}

#[derive(Debug, Serialize)]
struct Snapshot<'a> {
    url: &'a str,
    fields: HashMap<&'a str, &'a str>,
    errors: &'a [String],
    result: Option<&'a str>,
}

#[derive(Debug)]
struct PageState {
    url: String,
    fields: Vec<SimField>,
    focused: Option<usize>,
    errors: Vec<String>,
    result: Option<String>,
    result_visible_at: Option<Instant>,
}

/// Knobs for the simulated page
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    /// Delay between "Calculate" and the result becoming visible
    pub result_delay: Duration,

    /// Make every screenshot fail
    pub fail_screenshots: bool,

    /// Make every navigation fail
    pub fail_navigation: bool,

    /// How long each navigation takes before the page is ready
    pub navigation_delay: Duration,

    /// Render results in this format instead of the harness's own
    pub render_currency: Option<CurrencyFormat>,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            result_delay: Duration::from_millis(20),
            fail_screenshots: false,
            fail_navigation: false,
            navigation_delay: Duration::ZERO,
            render_currency: None,
        }
    }
}

/// Simulated calculator page
pub struct MemoryCalculatorPage {
    state: Mutex<PageState>,
    result_selector: String,
    currency: CurrencyFormat,
    options: SimulationOptions,
    closed: Arc<AtomicBool>,
}

impl MemoryCalculatorPage {
    pub fn new(
        registry: &LocatorRegistry,
        currency: CurrencyFormat,
        options: SimulationOptions,
    ) -> Self {
        let bounds = |name: &str| match name {
            LOAN_AMOUNT => Bounds { min: 1_000.0, max: 100_000.0 },
            INTEREST_RATE => Bounds { min: 1.0, max: 20.0 },
            TERM => Bounds { min: 6.0, max: 84.0 },
            _ => Bounds { min: f64::MIN, max: f64::MAX },
        };

        let fields = registry
            .fields()
            .map(|spec| SimField {
                name: spec.name.clone(),
                selector: spec.selector.clone(),
                label: spec.label.clone(),
                bounds: bounds(&spec.name),
                value: String::new(),
            })
            .collect();

        Self {
            state: Mutex::new(PageState {
                url: "about:blank".to_string(),
                fields,
                focused: None,
                errors: Vec::new(),
                result: None,
                result_visible_at: None,
            }),
            result_selector: registry.result().selector.clone(),
            currency,
            options,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag flipped by `close()`, shared so tests can observe teardown
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }

    fn ensure_open(&self) -> E2eResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(E2eError::Browser("page has been closed".to_string()));
        }
        Ok(())
    }

    fn error_message(field: &SimField) -> String {
        format!("Please enter a valid {}", field.label)
    }

    fn is_valid(field: &SimField) -> bool {
        match field.value.trim().parse::<f64>() {
            Ok(v) => v >= field.bounds.min && v <= field.bounds.max,
            Err(_) => false,
        }
    }

    fn validate(state: &mut PageState, index: usize) {
        let message = Self::error_message(&state.fields[index]);
        let valid = Self::is_valid(&state.fields[index]);
        state.errors.retain(|e| *e != message);
        if !valid {
            state.errors.push(message);
        }
    }

    fn calculate(&self, state: &mut PageState) {
        for index in 0..state.fields.len() {
            Self::validate(state, index);
        }
        if !state.errors.is_empty() {
            state.result = None;
            state.result_visible_at = None;
            return;
        }

        let value = |name: &str| -> f64 {
            state
                .fields
                .iter()
                .find(|f| f.name == name)
                .and_then(|f| f.value.trim().parse::<f64>().ok())
                .unwrap_or_default()
        };
        let payment = monthly_payment(value(LOAN_AMOUNT), value(INTEREST_RATE), value(TERM));
        state.result = Some(self.currency.render(payment));
        state.result_visible_at = Some(Instant::now() + self.options.result_delay);
    }

    fn reset(state: &mut PageState) {
        for field in &mut state.fields {
            field.value.clear();
        }
        state.errors.clear();
        state.result = None;
        state.result_visible_at = None;
        state.focused = None;
    }
}

/// Amortized monthly payment
pub fn monthly_payment(principal: f64, annual_rate_percent: f64, months: f64) -> f64 {
    if months <= 0.0 {
        return 0.0;
    }
    let r = annual_rate_percent / 100.0 / 12.0;
    if r == 0.0 {
        return principal / months;
    }
    principal * r / (1.0 - (1.0 + r).powf(-months))
}

#[async_trait]
impl PageDriver for MemoryCalculatorPage {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.ensure_open()?;
        if self.options.fail_navigation {
            return Err(E2eError::Browser(format!("net::ERR_NAME_NOT_RESOLVED at {}", url)));
        }
        if !self.options.navigation_delay.is_zero() {
            tokio::time::sleep(self.options.navigation_delay).await;
        }
        let mut state = self.state.lock();
        Self::reset(&mut state);
        state.url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> E2eResult<Option<String>> {
        self.ensure_open()?;
        Ok(Some(self.state.lock().url.clone()))
    }

    async fn fill(&self, selector: &str, value: &str) -> E2eResult<bool> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        let Some(index) = state.fields.iter().position(|f| f.selector == selector) else {
            return Ok(false);
        };
        state.fields[index].value = value.to_string();
        state.focused = Some(index);
        Ok(true)
    }

    async fn press_key(&self, key: &str) -> E2eResult<()> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        if key == "Tab" {
            if let Some(index) = state.focused.take() {
                debug!("Simulated blur on {}", state.fields[index].selector);
                Self::validate(&mut state, index);
                if index + 1 < state.fields.len() {
                    state.focused = Some(index + 1);
                }
            }
        }
        Ok(())
    }

    async fn click_by_text(&self, label: &str) -> E2eResult<bool> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        match label {
            "Calculate" => {
                self.calculate(&mut state);
                Ok(true)
            }
            "Reset" | "Clear" => {
                Self::reset(&mut state);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn input_value(&self, selector: &str) -> E2eResult<Option<String>> {
        self.ensure_open()?;
        let state = self.state.lock();
        Ok(state
            .fields
            .iter()
            .find(|f| f.selector == selector)
            .map(|f| f.value.clone()))
    }

    async fn element_state(&self, selector: &str) -> E2eResult<ElementState> {
        self.ensure_open()?;
        let state = self.state.lock();
        if selector == self.result_selector {
            return Ok(match (&state.result, state.result_visible_at) {
                (Some(text), Some(at)) if Instant::now() >= at => {
                    ElementState::Visible(text.clone())
                }
                _ => ElementState::Hidden(String::new()),
            });
        }
        Ok(match state.fields.iter().find(|f| f.selector == selector) {
            Some(_) => ElementState::Visible(String::new()),
            None => ElementState::Missing,
        })
    }

    async fn visible_texts(&self) -> E2eResult<Vec<String>> {
        self.ensure_open()?;
        let state = self.state.lock();
        let mut texts = vec!["Personal Loan Calculator".to_string()];
        texts.extend(state.errors.iter().cloned());
        if let (Some(text), Some(at)) = (&state.result, state.result_visible_at) {
            if Instant::now() >= at {
                texts.push(text.clone());
            }
        }
        Ok(texts)
    }

    async fn screenshot(&self, path: &Path, _full_page: bool) -> E2eResult<()> {
        self.ensure_open()?;
        if self.options.fail_screenshots {
            return Err(E2eError::ScreenshotFailure(
                "simulated capture failure".to_string(),
            ));
        }
        let body = {
            let state = self.state.lock();
            let snapshot = Snapshot {
                url: &state.url,
                fields: state
                    .fields
                    .iter()
                    .map(|f| (f.selector.as_str(), f.value.as_str()))
                    .collect(),
                errors: &state.errors,
                result: state.result.as_deref(),
            };
            serde_json::to_vec(&snapshot)?
        };
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend(body);
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    async fn close(&self) -> E2eResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out fresh simulated pages and tracks how many are still open
#[derive(Clone, Default)]
pub struct MemoryLauncher {
    options: SimulationOptions,
    launched: Arc<AtomicUsize>,
    pages: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
}

impl MemoryLauncher {
    pub fn new(options: SimulationOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    /// Pages launched so far
    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    /// Pages launched but not yet closed
    pub fn open_pages(&self) -> usize {
        self.pages
            .lock()
            .iter()
            .filter(|closed| !closed.load(Ordering::SeqCst))
            .count()
    }
}

#[async_trait]
impl BrowserLauncher for MemoryLauncher {
    async fn launch(&self, config: &HarnessConfig) -> E2eResult<Box<dyn PageDriver>> {
        let registry = config.locator_registry()?;
        let currency = self
            .options
            .render_currency
            .clone()
            .unwrap_or_else(|| config.currency.clone());
        let page = MemoryCalculatorPage::new(&registry, currency, self.options.clone());
        self.pages.lock().push(page.closed_flag());
        self.launched.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> MemoryCalculatorPage {
        MemoryCalculatorPage::new(
            &LocatorRegistry::loan_calculator(),
            CurrencyFormat::default(),
            SimulationOptions {
                result_delay: Duration::ZERO,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_monthly_payment() {
        let payment = monthly_payment(10_000.0, 5.0, 36.0);
        assert!((payment - 299.71).abs() < 0.01, "payment was {}", payment);
        assert_eq!(monthly_payment(1_200.0, 0.0, 12.0), 100.0);
    }

    #[tokio::test]
    async fn test_blur_validation() {
        let page = page();
        assert!(page.fill("#loanAmount", "100").await.unwrap());
        page.press_key("Tab").await.unwrap();
        let texts = page.visible_texts().await.unwrap();
        assert!(texts.iter().any(|t| t == "Please enter a valid loan amount"));

        page.fill("#loanAmount", "5000").await.unwrap();
        page.press_key("Tab").await.unwrap();
        let texts = page.visible_texts().await.unwrap();
        assert!(!texts.iter().any(|t| t.contains("valid loan amount")));
    }

    #[tokio::test]
    async fn test_calculate_and_reset() {
        let page = page();
        page.fill("#loanAmount", "10000").await.unwrap();
        page.fill("#interestRate", "5").await.unwrap();
        page.fill("#term", "36").await.unwrap();
        assert!(page.click_by_text("Calculate").await.unwrap());

        let state = page
            .element_state(loancheck_common::locators::DEFAULT_RESULT_SELECTOR)
            .await
            .unwrap();
        assert_eq!(state, ElementState::Visible("$299.71".to_string()));

        assert!(page.click_by_text("Reset").await.unwrap());
        assert_eq!(page.input_value("#term").await.unwrap(), Some(String::new()));
    }

    #[tokio::test]
    async fn test_unknown_targets() {
        let page = page();
        assert!(!page.fill("#downPayment", "1").await.unwrap());
        assert!(!page.click_by_text("Submit").await.unwrap());
        assert_eq!(page.input_value("#downPayment").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_closed_page_rejects_calls() {
        let page = page();
        page.close().await.unwrap();
        assert!(page.closed_flag().load(Ordering::SeqCst));
        assert!(page.goto("http://localhost/").await.is_err());
    }
}
