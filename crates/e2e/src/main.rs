//! loancheck - run the loan calculator acceptance scenarios
//!
//! Exit code 0 when every selected scenario passes, 1 when any fails and
//! 2 when the harness itself cannot run.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use loancheck_common::HarnessConfig;
use loancheck_e2e::driver::memory::SimulationOptions;
use loancheck_e2e::{
    BrowserLauncher, ChromiumLauncher, Feature, MemoryLauncher, ScenarioFilter, ScenarioRunner,
    StepCatalog, BUNDLED_FEATURE,
};

#[derive(Parser, Debug)]
#[command(name = "loancheck")]
#[command(author, version, about = "Acceptance scenarios for the personal loan calculator")]
struct Args {
    /// Feature file or directory of `.feature` files (bundled scenarios if omitted)
    #[arg(short, long, env = "LOANCHECK_FEATURES")]
    features: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, default_value = "loancheck.toml", env = "LOANCHECK_CONFIG")]
    config: PathBuf,

    /// Run only scenarios carrying this tag (repeatable)
    #[arg(short, long)]
    tag: Vec<String>,

    /// Run only scenarios whose name contains this text
    #[arg(short, long)]
    name: Option<String>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Default wait for every action and assertion, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Root of the passed/failed screenshot directories
    #[arg(long)]
    screenshots: Option<PathBuf>,

    /// Output directory for the JSON report
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Scenarios to run at once
    #[arg(long)]
    parallel: Option<usize>,

    /// Run against the built-in simulated calculator instead of a browser
    #[arg(long)]
    simulate: bool,

    /// Print the step phrases and exit
    #[arg(long)]
    list: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    if args.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    let result = tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")
        .and_then(|rt| rt.block_on(async_main(args)));

    match result {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

fn build_config(args: &Args) -> anyhow::Result<HarnessConfig> {
    let mut config = HarnessConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.headed {
        config.browser.headless = false;
    }
    if let Some(ms) = args.timeout_ms {
        config.timeouts.default_ms = ms;
    }
    if let Some(dir) = &args.screenshots {
        config.artifacts.screenshot_dir = dir.clone();
    }
    if let Some(dir) = &args.output {
        config.artifacts.report_dir = dir.clone();
    }
    if let Some(n) = args.parallel {
        config.runner.max_parallel = n;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn load_features(args: &Args) -> anyhow::Result<Vec<Feature>> {
    match &args.features {
        Some(path) => Feature::load_all(path)
            .with_context(|| format!("Failed to load features from {}", path.display())),
        None => Ok(vec![Feature::parse(BUNDLED_FEATURE).context("Bundled feature is invalid")?]),
    }
}

async fn async_main(args: Args) -> anyhow::Result<bool> {
    if args.list {
        for definition in StepCatalog::loan_calculator()?.definitions() {
            println!("{}", definition.phrase);
        }
        return Ok(true);
    }

    let config = build_config(&args)?;
    let features = load_features(&args)?;

    let launcher: Arc<dyn BrowserLauncher> = if args.simulate {
        tracing::info!("Running against the simulated calculator");
        Arc::new(MemoryLauncher::new(SimulationOptions::default()))
    } else {
        Arc::new(ChromiumLauncher)
    };

    let runner = ScenarioRunner::new(config, launcher)?;
    let filter = ScenarioFilter {
        tags: args.tag.clone(),
        name: args.name.clone(),
    };

    let report = runner.run_features(&features, &filter).await;
    if report.total == 0 {
        tracing::warn!("No scenarios matched the selection");
    }
    runner.write_results(&report)?;

    Ok(report.success())
}
