//! loancheck Common Library
//!
//! Configuration, locator registry, domain types and value-format predicates
//! shared by the loancheck harness.

pub mod config;
pub mod error;
pub mod format;
pub mod locators;
pub mod types;

// Re-export commonly used types
pub use config::HarnessConfig;
pub use error::{Error, Result};
pub use format::CurrencyFormat;
pub use locators::LocatorRegistry;
pub use types::*;

/// loancheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
