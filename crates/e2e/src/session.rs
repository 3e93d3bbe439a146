//! Scenario-scoped browser session
//!
//! `Uninitialized → Active → Closed`. A session is opened at scenario start,
//! owned by that scenario alone, and closed exactly once at scenario end
//! whatever the outcome. Closing captures a classified screenshot and then
//! releases the browser; a failed capture is logged and never stops the
//! release.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use loancheck_common::{HarnessConfig, LocatorRegistry, ScenarioOutcome};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::artifacts::{self, ScreenshotStore};
use crate::driver::{BrowserLauncher, PageDriver};
use crate::error::{E2eError, E2eResult};
use crate::wait::WaitBudget;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Active,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::Active => write!(f, "active"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// What teardown produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teardown {
    pub screenshot: Option<PathBuf>,
    pub screenshot_sha256: Option<String>,
    pub screenshot_error: Option<String>,
}

/// One browser context + page bound to one scenario
pub struct Session {
    state: SessionState,
    driver: Option<Box<dyn PageDriver>>,
    config: Arc<HarnessConfig>,
    locators: Arc<LocatorRegistry>,
    currency: Regex,
    budget: WaitBudget,
    screenshots: ScreenshotStore,
}

impl Session {
    pub fn new(config: Arc<HarnessConfig>, locators: Arc<LocatorRegistry>) -> E2eResult<Self> {
        let currency = config.currency.compile()?;
        let budget = WaitBudget::from_config(&config.timeouts);
        let screenshots = ScreenshotStore::new(&config.artifacts.screenshot_dir);
        Ok(Self {
            state: SessionState::Uninitialized,
            driver: None,
            config,
            locators,
            currency,
            budget,
            screenshots,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn locators(&self) -> &LocatorRegistry {
        &self.locators
    }

    /// Compiled currency pattern for the result region
    pub fn currency_pattern(&self) -> &Regex {
        &self.currency
    }

    /// Default wait budget, optionally overridden for one call
    pub fn budget(&self, timeout: Option<Duration>) -> WaitBudget {
        self.budget.with_timeout(timeout)
    }

    /// Launch the browser and navigate to the target page
    pub async fn start(&mut self, launcher: &dyn BrowserLauncher) -> E2eResult<()> {
        if self.state != SessionState::Uninitialized {
            return Err(E2eError::SessionNotActive(self.state.to_string()));
        }

        let driver = match launcher.launch(&self.config).await {
            Ok(driver) => driver,
            Err(e) => {
                self.state = SessionState::Closed;
                return Err(e);
            }
        };

        let url = self.config.target_url.clone();
        let timeout = self.config.timeouts.navigation_timeout();
        let navigated = match tokio::time::timeout(timeout, driver.goto(&url)).await {
            Ok(result) => result,
            Err(_) => Err(E2eError::NavigationTimeout {
                url: url.clone(),
                timeout,
            }),
        };

        if let Err(e) = navigated {
            warn!("Navigation to {} failed: {}", url, e);
            if let Err(close_err) = driver.close().await {
                warn!("Error releasing browser after failed navigation: {}", close_err);
            }
            self.state = SessionState::Closed;
            return Err(e);
        }

        debug!("Session active at {}", url);
        self.driver = Some(driver);
        self.state = SessionState::Active;
        Ok(())
    }

    /// The live page. Fails unless the session is active.
    pub fn driver(&self) -> E2eResult<&dyn PageDriver> {
        match (&self.driver, self.state) {
            (Some(driver), SessionState::Active) => Ok(driver.as_ref()),
            _ => Err(E2eError::SessionNotActive(self.state.to_string())),
        }
    }

    /// Capture the classified screenshot and release the browser.
    ///
    /// Never fails: an inactive session just transitions to `Closed`.
    pub async fn close(&mut self, outcome: &ScenarioOutcome) -> Teardown {
        let previous = std::mem::replace(&mut self.state, SessionState::Closed);
        let Some(driver) = self.driver.take() else {
            debug!("Closing {} session without a page", previous);
            return Teardown::default();
        };

        let mut teardown = Teardown::default();
        match self.capture(driver.as_ref(), outcome).await {
            Ok(path) => {
                info!("Screenshot saved: {}", path.display());
                teardown.screenshot_sha256 = artifacts::hash_file(&path).ok();
                teardown.screenshot = Some(path);
            }
            Err(e) => {
                warn!("Screenshot for '{}' failed: {}", outcome.name, e);
                teardown.screenshot_error = Some(e.to_string());
            }
        }

        if let Err(e) = driver.close().await {
            warn!("Error releasing session for '{}': {}", outcome.name, e);
        }

        teardown
    }

    async fn capture(&self, driver: &dyn PageDriver, outcome: &ScenarioOutcome) -> E2eResult<PathBuf> {
        let path = self
            .screenshots
            .prepare(outcome)
            .map_err(|e| E2eError::ScreenshotFailure(e.to_string()))?;
        driver
            .screenshot(&path, self.config.artifacts.full_page)
            .await
            .map_err(|e| match e {
                E2eError::ScreenshotFailure(_) => e,
                other => E2eError::ScreenshotFailure(other.to_string()),
            })?;
        Ok(path)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state == SessionState::Active {
            warn!("Session dropped while active; browser released without a screenshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::memory::{MemoryLauncher, SimulationOptions};

    fn config(dir: &std::path::Path) -> Arc<HarnessConfig> {
        let mut config = HarnessConfig::default();
        config.target_url = "http://calculator.test/".to_string();
        config.artifacts.screenshot_dir = dir.join("screenshots");
        Arc::new(config)
    }

    fn session(config: Arc<HarnessConfig>) -> Session {
        let locators = Arc::new(config.locator_registry().unwrap());
        Session::new(config, locators).unwrap()
    }

    #[tokio::test]
    async fn test_lifecycle_passed() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = MemoryLauncher::default();
        let mut session = session(config(dir.path()));
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(session.driver().is_err());

        session.start(&launcher).await.unwrap();
        assert_eq!(session.state(), SessionState::Active);
        let url = session.driver().unwrap().current_url().await.unwrap();
        assert_eq!(url.as_deref(), Some("http://calculator.test/"));

        let teardown = session.close(&ScenarioOutcome::passed("Happy path")).await;
        assert_eq!(session.state(), SessionState::Closed);
        let shot = teardown.screenshot.unwrap();
        assert!(shot.starts_with(dir.path().join("screenshots/passed")));
        assert!(shot.exists());
        assert!(teardown.screenshot_sha256.is_some());
        assert_eq!(launcher.open_pages(), 0);
    }

    #[tokio::test]
    async fn test_failed_outcome_lands_in_failed() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = MemoryLauncher::default();
        let mut session = session(config(dir.path()));
        session.start(&launcher).await.unwrap();

        let teardown = session.close(&ScenarioOutcome::failed("Sad path")).await;
        let shot = teardown.screenshot.unwrap();
        assert!(shot.starts_with(dir.path().join("screenshots/failed")));
        assert!(shot.to_string_lossy().ends_with("-Sad_path.png"));
    }

    #[tokio::test]
    async fn test_screenshot_failure_still_releases() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = MemoryLauncher::new(SimulationOptions {
            fail_screenshots: true,
            ..Default::default()
        });
        let mut session = session(config(dir.path()));
        session.start(&launcher).await.unwrap();

        let teardown = session.close(&ScenarioOutcome::passed("Capture fails")).await;
        assert!(teardown.screenshot.is_none());
        assert!(teardown.screenshot_error.is_some());
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(launcher.open_pages(), 0);
    }

    #[tokio::test]
    async fn test_failed_navigation_releases_browser() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = MemoryLauncher::new(SimulationOptions {
            fail_navigation: true,
            ..Default::default()
        });
        let mut session = session(config(dir.path()));

        assert!(session.start(&launcher).await.is_err());
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(launcher.launched(), 1);
        assert_eq!(launcher.open_pages(), 0);

        let teardown = session.close(&ScenarioOutcome::failed("Unreachable")).await;
        assert_eq!(teardown, Teardown::default());
    }

    #[tokio::test]
    async fn test_slow_navigation_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = HarnessConfig::default();
        config.target_url = "http://calculator.test/".to_string();
        config.artifacts.screenshot_dir = dir.path().join("screenshots");
        config.timeouts.navigation_ms = 50;
        let launcher = MemoryLauncher::new(SimulationOptions {
            navigation_delay: Duration::from_secs(5),
            ..Default::default()
        });
        let mut session = session(Arc::new(config));

        let started = std::time::Instant::now();
        match session.start(&launcher).await {
            Err(E2eError::NavigationTimeout { url, timeout }) => {
                assert_eq!(url, "http://calculator.test/");
                assert_eq!(timeout, Duration::from_millis(50));
            }
            other => panic!("expected navigation timeout, got {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(launcher.open_pages(), 0);
    }

    #[tokio::test]
    async fn test_session_cannot_restart() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = MemoryLauncher::default();
        let mut session = session(config(dir.path()));
        session.start(&launcher).await.unwrap();
        session.close(&ScenarioOutcome::passed("once")).await;

        assert!(matches!(
            session.start(&launcher).await,
            Err(E2eError::SessionNotActive(_))
        ));
        assert_eq!(launcher.launched(), 1);
    }
}
