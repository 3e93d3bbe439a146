use std::path::Path;
use std::sync::Arc;

use loancheck_common::{HarnessConfig, ScenarioStatus};
use loancheck_e2e::driver::memory::{MemoryLauncher, SimulationOptions};
use loancheck_e2e::{Feature, ScenarioFilter, ScenarioRunner, BUNDLED_FEATURE};

fn config(dir: &Path) -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.timeouts.default_ms = 500;
    config.timeouts.poll_interval_ms = 10;
    config.artifacts.screenshot_dir = dir.join("screenshots");
    config.artifacts.report_dir = dir.join("test-results");
    config
}

fn png_count(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().map(|x| x == "png").unwrap_or(false))
                .count()
        })
        .unwrap_or(0)
}

/// Bundled Scenarios Test
///
/// Runs every bundled scenario against the simulated calculator and checks
/// that each one passes, leaves exactly one screenshot in `passed` and
/// releases its page.
#[tokio::test]
async fn bundled_scenarios_pass_against_simulated_page() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = MemoryLauncher::default();
    let runner = ScenarioRunner::new(config(dir.path()), Arc::new(launcher.clone())).unwrap();
    let feature = Feature::parse(BUNDLED_FEATURE).unwrap();

    let report = runner
        .run_features(&[feature.clone()], &ScenarioFilter::default())
        .await;

    for scenario in &report.scenarios {
        assert_eq!(
            scenario.status,
            ScenarioStatus::Passed,
            "{} failed: {:?}",
            scenario.name,
            scenario.error
        );
    }
    assert_eq!(report.total, feature.scenarios.len());
    assert!(report.success());

    assert_eq!(png_count(&dir.path().join("screenshots/passed")), report.total);
    assert_eq!(png_count(&dir.path().join("screenshots/failed")), 0);
    assert_eq!(launcher.launched(), report.total);
    assert_eq!(launcher.open_pages(), 0);

    let path = runner.write_results(&report).unwrap();
    assert!(path.exists());
}

/// A scenario whose assertion cannot hold lands in `failed`
#[tokio::test]
async fn failing_scenario_screenshot_lands_in_failed() {
    let dir = tempfile::tempdir().unwrap();
    let runner =
        ScenarioRunner::new(config(dir.path()), Arc::new(MemoryLauncher::default())).unwrap();
    let feature = Feature::parse(
        r#"
Feature: Failing
  Scenario: Valid amount is rejected
    Given the user is on the Personal Loan Calculator page
    When the user enters a valid loan amount
    Then an error message should be displayed for the invalid loan amount
"#,
    )
    .unwrap();

    let report = runner
        .run_features(&[feature], &ScenarioFilter::default())
        .await;

    let scenario = &report.scenarios[0];
    assert_eq!(scenario.status, ScenarioStatus::Failed);
    assert_eq!(scenario.steps[2].error_kind.as_deref(), Some("value_mismatch"));

    let shot = scenario.screenshot.as_ref().unwrap();
    assert!(shot.starts_with(dir.path().join("screenshots/failed")));
    assert!(shot
        .file_name()
        .unwrap()
        .to_string_lossy()
        .ends_with("-Valid_amount_is_rejected.png"));
}

/// Screenshot failures are reported but never fail the scenario
#[tokio::test]
async fn screenshot_failure_does_not_fail_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = MemoryLauncher::new(SimulationOptions {
        fail_screenshots: true,
        ..Default::default()
    });
    let runner = ScenarioRunner::new(config(dir.path()), Arc::new(launcher.clone())).unwrap();
    let feature = Feature::parse(BUNDLED_FEATURE).unwrap();
    let filter = ScenarioFilter {
        tags: vec!["smoke".to_string()],
        name: None,
    };

    let report = runner.run_features(&[feature], &filter).await;
    assert!(report.total > 0);
    assert!(report.success());
    for scenario in &report.scenarios {
        assert!(scenario.screenshot.is_none());
        assert!(scenario.screenshot_error.is_some());
    }
    assert_eq!(launcher.open_pages(), 0);
}

/// Slow results are waited for, up to the configured budget
#[tokio::test]
async fn slow_result_within_budget_passes() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = MemoryLauncher::new(SimulationOptions {
        result_delay: std::time::Duration::from_millis(150),
        ..Default::default()
    });
    let runner = ScenarioRunner::new(config(dir.path()), Arc::new(launcher)).unwrap();
    let feature = Feature::parse(BUNDLED_FEATURE).unwrap();
    let filter = ScenarioFilter {
        tags: vec![],
        name: Some("Calculate monthly payment".to_string()),
    };

    let report = runner.run_features(&[feature], &filter).await;
    assert_eq!(report.total, 1);
    assert!(report.success(), "{:?}", report.scenarios[0].error);
}
