//! loancheck acceptance harness
//!
//! Drives the personal loan calculator widget through Gherkin scenarios and
//! asserts on what it renders.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ScenarioRunner                          │
//! │    ├── Feature::load_all(dir) -> [Feature]                  │
//! │    ├── run_scenario(feature, scenario) -> ScenarioReport    │
//! │    └── write_results(report) -> test-results.json           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  StepCatalog: "clicks the {string} button" -> Click         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Session  (Uninitialized -> Active -> Closed)               │
//! │    ├── actions:    set_field, trigger_validation, click     │
//! │    ├── assertions: field value, visible text, result        │
//! │    └── close(outcome) -> screenshots/<passed|failed>/...    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  PageDriver: ChromiumPage (CDP) | MemoryCalculatorPage      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod actions;
pub mod artifacts;
pub mod assertions;
pub mod catalog;
pub mod driver;
pub mod error;
pub mod feature;
pub mod runner;
pub mod session;
pub mod wait;

pub use catalog::{StepAction, StepCatalog};
pub use driver::{BrowserLauncher, ChromiumLauncher, MemoryLauncher, PageDriver};
pub use error::{E2eError, E2eResult};
pub use feature::{Feature, Scenario, ScenarioFilter};
pub use runner::{ScenarioReport, ScenarioRunner, SuiteReport};
pub use session::{Session, SessionState};

/// Scenarios for the personal loan calculator, bundled with the binary
pub const BUNDLED_FEATURE: &str = include_str!("../features/loan_calculator.feature");
