//! Scenario runner: one session per scenario, steps in order, classified teardown

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use loancheck_common::{HarnessConfig, LocatorRegistry, ScenarioOutcome, ScenarioStatus};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::catalog::StepCatalog;
use crate::driver::BrowserLauncher;
use crate::error::E2eResult;
use crate::feature::{Feature, Scenario, ScenarioFilter, Step};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

/// Result of a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub keyword: String,
    pub text: String,
    pub line: usize,
    pub status: StepStatus,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub error_kind: Option<String>,
}

impl StepReport {
    fn skipped(step: &Step) -> Self {
        Self {
            keyword: step.keyword.clone(),
            text: step.text.clone(),
            line: step.line,
            status: StepStatus::Skipped,
            duration_ms: 0,
            error: None,
            error_kind: None,
        }
    }
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub feature: String,
    pub name: String,
    pub tags: Vec<String>,
    pub status: ScenarioStatus,
    pub duration_ms: u64,
    pub steps: Vec<StepReport>,
    pub error: Option<String>,
    pub screenshot: Option<PathBuf>,
    pub screenshot_sha256: Option<String>,
    pub screenshot_error: Option<String>,
}

/// Result of running all selected scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub harness_version: String,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub scenarios: Vec<ScenarioReport>,
}

impl SuiteReport {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Runs feature scenarios against fresh browser sessions
pub struct ScenarioRunner {
    config: Arc<HarnessConfig>,
    locators: Arc<LocatorRegistry>,
    catalog: Arc<StepCatalog>,
    launcher: Arc<dyn BrowserLauncher>,
}

impl ScenarioRunner {
    /// Runner with the loan calculator step catalog
    pub fn new(config: HarnessConfig, launcher: Arc<dyn BrowserLauncher>) -> E2eResult<Self> {
        config.validate()?;
        let locators = Arc::new(config.locator_registry()?);
        Ok(Self {
            config: Arc::new(config),
            locators,
            catalog: Arc::new(StepCatalog::loan_calculator()?),
            launcher,
        })
    }

    pub fn with_catalog(mut self, catalog: StepCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    /// Run every scenario selected by `filter`, reporting in feature order
    pub async fn run_features(&self, features: &[Feature], filter: &ScenarioFilter) -> SuiteReport {
        let started_at = Utc::now();
        let start = Instant::now();

        let selected: Vec<(&Feature, &Scenario)> = features
            .iter()
            .flat_map(|f| f.scenarios.iter().map(move |s| (f, s)))
            .filter(|(_, s)| filter.matches(s))
            .collect();

        let parallel = self.config.runner.max_parallel.max(1);
        info!(
            "Running {} scenario(s), {} at a time...",
            selected.len(),
            parallel
        );

        let scenarios: Vec<ScenarioReport> = stream::iter(selected)
            .map(|(feature, scenario)| self.run_scenario(feature, scenario))
            .buffered(parallel)
            .collect()
            .await;

        let count = |status| scenarios.iter().filter(|r| r.status == status).count();
        let report = SuiteReport {
            harness_version: loancheck_common::VERSION.to_string(),
            started_at,
            total: scenarios.len(),
            passed: count(ScenarioStatus::Passed),
            failed: count(ScenarioStatus::Failed),
            skipped: count(ScenarioStatus::Skipped),
            duration_ms: start.elapsed().as_millis() as u64,
            scenarios,
        };

        info!(
            "Scenario results: {} passed, {} failed, {} skipped ({} ms)",
            report.passed, report.failed, report.skipped, report.duration_ms
        );
        report
    }

    /// Run one scenario, background steps first
    pub async fn run_scenario(&self, feature: &Feature, scenario: &Scenario) -> ScenarioReport {
        let start = Instant::now();
        let steps: Vec<&Step> = feature.background.iter().chain(&scenario.steps).collect();

        let mut report = ScenarioReport {
            feature: feature.name.clone(),
            name: scenario.name.clone(),
            tags: scenario.tags.clone(),
            status: ScenarioStatus::Skipped,
            duration_ms: 0,
            steps: Vec::with_capacity(steps.len()),
            error: None,
            screenshot: None,
            screenshot_sha256: None,
            screenshot_error: None,
        };

        if scenario.is_skipped() {
            info!("- {} (skipped)", scenario.name);
            report.steps = steps.into_iter().map(StepReport::skipped).collect();
            return report;
        }

        debug!("Running scenario: {}", scenario.name);
        let mut session = match Session::new(self.config.clone(), self.locators.clone()) {
            Ok(session) => session,
            Err(e) => {
                error!("✗ {} - {}", scenario.name, e);
                report.status = ScenarioStatus::Failed;
                report.error = Some(e.to_string());
                report.steps = steps.into_iter().map(StepReport::skipped).collect();
                return report;
            }
        };

        let mut failure: Option<String> = None;
        if let Err(e) = session.start(self.launcher.as_ref()).await {
            failure = Some(format!("session start: {}", e));
        }

        for step in steps {
            if failure.is_some() {
                report.steps.push(StepReport::skipped(step));
                continue;
            }

            let step_start = Instant::now();
            let result = self.catalog.execute(&session, &step.text).await;
            let duration_ms = step_start.elapsed().as_millis() as u64;

            let (status, error, error_kind) = match result {
                Ok(()) => (StepStatus::Passed, None, None),
                Err(e) => {
                    warn!("Step failed at line {}: {}: {}", step.line, step, e);
                    failure = Some(format!("{} (line {}): {}", step, step.line, e));
                    (StepStatus::Failed, Some(e.to_string()), Some(e.kind().to_string()))
                }
            };
            report.steps.push(StepReport {
                keyword: step.keyword.clone(),
                text: step.text.clone(),
                line: step.line,
                status,
                duration_ms,
                error,
                error_kind,
            });
        }

        let outcome = match failure {
            None => ScenarioOutcome::passed(&scenario.name),
            Some(_) => ScenarioOutcome::failed(&scenario.name),
        };
        let teardown = session.close(&outcome).await;

        report.status = outcome.status;
        report.error = failure;
        report.screenshot = teardown.screenshot;
        report.screenshot_sha256 = teardown.screenshot_sha256;
        report.screenshot_error = teardown.screenshot_error;
        report.duration_ms = start.elapsed().as_millis() as u64;

        match &report.error {
            None => info!("✓ {} ({} ms)", report.name, report.duration_ms),
            Some(e) => error!("✗ {} - {}", report.name, e),
        }
        report
    }

    /// Write the suite report as `<report_dir>/test-results.json`
    pub fn write_results(&self, report: &SuiteReport) -> E2eResult<PathBuf> {
        write_results(&self.config.artifacts.report_dir, report)
    }
}

/// Write a suite report as pretty JSON into `dir`
pub fn write_results(dir: &Path, report: &SuiteReport) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let path = dir.join("test-results.json");
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}
