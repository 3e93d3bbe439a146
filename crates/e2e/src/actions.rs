//! Scenario actions: mutate the live page

use tracing::{debug, warn};

use crate::error::{E2eError, E2eResult};
use crate::session::Session;
use crate::wait::{poll, Polled, Probe};

/// Key that moves focus off the current field
pub const BLUR_KEY: &str = "Tab";

impl Session {
    /// Clear the named field and type `value` verbatim
    pub async fn set_field(&self, name: &str, value: &str) -> E2eResult<()> {
        let field = self.locators().field(name)?;
        if !field.format.is_plausible_input(value) {
            warn!(
                "Value {:?} for '{}' does not look {}; typing it anyway",
                value, name, field.format
            );
        }

        let driver = self.driver()?;
        let selector = field.selector.as_str();
        debug!("fill {} ({}) = {:?}", name, selector, value);

        let polled = poll(self.budget(None), || async move {
            if driver.fill(selector, value).await? {
                Ok(Probe::Ready(()))
            } else {
                Ok(Probe::Pending(format!("no element matches {}", selector)))
            }
        })
        .await?;

        match polled {
            Polled::Ready(()) => Ok(()),
            Polled::TimedOut { waited, .. } => Err(E2eError::ElementNotFound {
                target: format!("field '{}' ({})", name, selector),
                waited,
            }),
        }
    }

    /// Move focus off the current field so blur-time validation runs
    pub async fn trigger_validation(&self) -> E2eResult<()> {
        debug!("press {}", BLUR_KEY);
        self.driver()?.press_key(BLUR_KEY).await
    }

    /// Activate the clickable element whose visible text is exactly `label`
    pub async fn click_action(&self, label: &str) -> E2eResult<()> {
        let driver = self.driver()?;
        debug!("click {:?}", label);

        let polled = poll(self.budget(None), || async move {
            if driver.click_by_text(label).await? {
                Ok(Probe::Ready(()))
            } else {
                Ok(Probe::Pending(format!("nothing clickable labelled {:?}", label)))
            }
        })
        .await?;

        match polled {
            Polled::Ready(()) => Ok(()),
            Polled::TimedOut { waited, .. } => Err(E2eError::ElementNotFound {
                target: format!("clickable element labelled {:?}", label),
                waited,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MemoryLauncher;
    use loancheck_common::locators::LocatorOverrides;
    use loancheck_common::{HarnessConfig, LocatorRegistry};
    use std::sync::Arc;

    async fn active_session(dir: &std::path::Path) -> Session {
        let mut config = HarnessConfig::default();
        config.timeouts.default_ms = 50;
        config.timeouts.poll_interval_ms = 5;
        config.artifacts.screenshot_dir = dir.to_path_buf();
        let config = Arc::new(config);
        let locators = Arc::new(config.locator_registry().unwrap());
        let mut session = Session::new(config, locators).unwrap();
        session.start(&MemoryLauncher::default()).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_set_field_writes_literal() {
        let dir = tempfile::tempdir().unwrap();
        let session = active_session(dir.path()).await;
        session.set_field("interestRate", "6.5").await.unwrap();
        let value = session
            .driver()
            .unwrap()
            .input_value("#interestRate")
            .await
            .unwrap();
        assert_eq!(value.as_deref(), Some("6.5"));
    }

    #[tokio::test]
    async fn test_set_field_unknown_name() {
        let dir = tempfile::tempdir().unwrap();
        let session = active_session(dir.path()).await;
        assert!(matches!(
            session.set_field("downPayment", "1").await,
            Err(E2eError::Common(_))
        ));
    }

    #[tokio::test]
    async fn test_set_field_stale_selector_is_element_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = HarnessConfig::default();
        config.timeouts.default_ms = 50;
        config.timeouts.poll_interval_ms = 5;
        config.artifacts.screenshot_dir = dir.path().to_path_buf();
        let config = Arc::new(config);

        // The page still renders the stock selectors
        let mut overrides = LocatorOverrides::default();
        overrides
            .fields
            .insert("term".to_string(), "#loanTermMonths".to_string());
        let locators = Arc::new(
            LocatorRegistry::loan_calculator()
                .with_overrides(&overrides)
                .unwrap(),
        );
        let mut session = Session::new(config, locators).unwrap();
        session.start(&MemoryLauncher::default()).await.unwrap();

        match session.set_field("term", "36").await.unwrap_err() {
            E2eError::ElementNotFound { target, waited } => {
                assert!(target.contains("#loanTermMonths"));
                assert!(waited.as_millis() >= 50);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_click_missing_label_is_element_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let session = active_session(dir.path()).await;
        let err = session.click_action("Apply now").await.unwrap_err();
        match err {
            E2eError::ElementNotFound { target, waited } => {
                assert!(target.contains("Apply now"));
                assert!(waited.as_millis() >= 50);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_actions_require_active_session() {
        let config = Arc::new(HarnessConfig::default());
        let locators = Arc::new(config.locator_registry().unwrap());
        let session = Session::new(config, locators).unwrap();
        assert!(matches!(
            session.trigger_validation().await,
            Err(E2eError::SessionNotActive(_))
        ));
    }
}
