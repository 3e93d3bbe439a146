//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::format::CurrencyFormat;
use crate::locators::{LocatorOverrides, LocatorRegistry};

/// Default page under test
pub const DEFAULT_TARGET_URL: &str =
    "https://www.experian.com/blogs/ask-experian/personal-loan-calculator/";

/// Harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Page every session navigates to
    pub target_url: String,

    /// Bounded-wait configuration
    pub timeouts: TimeoutConfig,

    /// Browser launch configuration
    pub browser: BrowserConfig,

    /// Screenshot and report locations
    pub artifacts: ArtifactConfig,

    /// Currency rendering rules for the result region
    pub currency: CurrencyFormat,

    /// Selector overrides
    pub locators: LocatorOverrides,

    /// Scenario scheduling
    pub runner: RunnerConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_string(),
            timeouts: TimeoutConfig::default(),
            browser: BrowserConfig::default(),
            artifacts: ArtifactConfig::default(),
            currency: CurrencyFormat::default(),
            locators: LocatorOverrides::default(),
            runner: RunnerConfig::default(),
        }
    }
}

/// Timeouts applied to every bounded wait
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Default wait for actions and assertions
    pub default_ms: u64,

    /// Wait for the initial navigation
    pub navigation_ms: u64,

    /// Delay between polls
    pub poll_interval_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_ms: 60_000,
            navigation_ms: 60_000,
            poll_interval_ms: 100,
        }
    }
}

impl TimeoutConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Browser launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run without a visible window
    pub headless: bool,

    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Chrome/Chromium binary (None = auto-detect)
    pub executable: Option<PathBuf>,

    /// Keep the Chrome sandbox enabled
    pub sandbox: bool,

    /// Wait for the browser process to come up
    pub launch_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            executable: None,
            sandbox: false,
            launch_timeout_ms: 30_000,
        }
    }
}

/// Artifact locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Root of the `passed` / `failed` screenshot partitions
    pub screenshot_dir: PathBuf,

    /// Capture the full scrollable page
    pub full_page: bool,

    /// Where the JSON run report is written
    pub report_dir: PathBuf,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            screenshot_dir: PathBuf::from("screenshots"),
            full_page: true,
            report_dir: PathBuf::from("test-results"),
        }
    }
}

/// Scenario scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Scenarios in flight at once; each owns its own session
    pub max_parallel: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { max_parallel: 1 }
    }
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values that would make every run fail in confusing ways
    pub fn validate(&self) -> crate::Result<()> {
        if self.target_url.trim().is_empty() {
            return Err(crate::Error::InvalidConfig("target_url is empty".into()));
        }
        if self.runner.max_parallel == 0 {
            return Err(crate::Error::InvalidConfig(
                "runner.max_parallel must be at least 1".into(),
            ));
        }
        self.currency.compile()?;
        Ok(())
    }

    /// Build the locator registry with any configured overrides applied
    pub fn locator_registry(&self) -> crate::Result<LocatorRegistry> {
        LocatorRegistry::loan_calculator().with_overrides(&self.locators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.timeouts.default_timeout(), Duration::from_secs(60));
        assert!(config.browser.headless);
        assert_eq!(config.runner.max_parallel, 1);
        assert_eq!(config.artifacts.screenshot_dir, PathBuf::from("screenshots"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.target_url, DEFAULT_TARGET_URL);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loancheck.toml");
        std::fs::write(
            &path,
            r#"
target_url = "http://127.0.0.1:8080/calculator"

[timeouts]
default_ms = 5000

[locators.fields]
term = "input[name=term]"
"#,
        )
        .unwrap();

        let config = HarnessConfig::load(&path).unwrap();
        assert_eq!(config.target_url, "http://127.0.0.1:8080/calculator");
        assert_eq!(config.timeouts.default_ms, 5000);
        assert_eq!(config.timeouts.poll_interval_ms, 100);
        let registry = config.locator_registry().unwrap();
        assert_eq!(registry.selector("term").unwrap(), "input[name=term]");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("loancheck.toml");
        let mut config = HarnessConfig::default();
        config.runner.max_parallel = 4;
        config.save(&path).unwrap();

        let loaded = HarnessConfig::load(&path).unwrap();
        assert_eq!(loaded.runner.max_parallel, 4);
    }

    #[test]
    fn test_validate_rejects_zero_parallel() {
        let mut config = HarnessConfig::default();
        config.runner.max_parallel = 0;
        assert!(config.validate().is_err());
    }
}
