//! Browser driver seam
//!
//! [`PageDriver`] is the single-shot surface the harness needs from a page:
//! each call observes or mutates the page once and returns immediately.
//! Waiting is layered on top by [`crate::wait`].

use std::path::Path;

use async_trait::async_trait;
use loancheck_common::HarnessConfig;

use crate::error::E2eResult;

pub mod chromium;
pub mod memory;

pub use chromium::{ChromiumLauncher, ChromiumPage};
pub use memory::{MemoryCalculatorPage, MemoryLauncher};

/// What a selector currently resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementState {
    Missing,
    Hidden(String),
    Visible(String),
}

impl ElementState {
    pub fn visible_text(&self) -> Option<&str> {
        match self {
            ElementState::Visible(text) => Some(text),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ElementState::Missing => "element missing".to_string(),
            ElementState::Hidden(text) => format!("element hidden (text {:?})", text),
            ElementState::Visible(text) => format!("element visible (text {:?})", text),
        }
    }
}

/// One open page in one isolated browser context
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for the load to finish
    async fn goto(&self, url: &str) -> E2eResult<()>;

    /// Current document URL
    async fn current_url(&self) -> E2eResult<Option<String>>;

    /// Clear the input matched by `selector` and write `value`.
    /// Returns `false` when the selector matches nothing.
    async fn fill(&self, selector: &str, value: &str) -> E2eResult<bool>;

    /// Press a key on whatever element has focus
    async fn press_key(&self, key: &str) -> E2eResult<()>;

    /// Click the first visible clickable element whose trimmed text equals
    /// `label`. Returns `false` when there is none.
    async fn click_by_text(&self, label: &str) -> E2eResult<bool>;

    /// `value` of the input matched by `selector`, `None` when missing
    async fn input_value(&self, selector: &str) -> E2eResult<Option<String>>;

    /// Text content and visibility of the element matched by `selector`
    async fn element_state(&self, selector: &str) -> E2eResult<ElementState>;

    /// Own text of every visible element carrying text
    async fn visible_texts(&self) -> E2eResult<Vec<String>>;

    /// Write a PNG screenshot to `path`
    async fn screenshot(&self, path: &Path, full_page: bool) -> E2eResult<()>;

    /// Release the page, its context and the browser process
    async fn close(&self) -> E2eResult<()>;
}

/// Opens a fresh, isolated page for one scenario
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, config: &HarnessConfig) -> E2eResult<Box<dyn PageDriver>>;
}
