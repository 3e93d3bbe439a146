//! Screenshot artifact naming
//!
//! Artifacts are written once under `<root>/<passed|failed>/` and named
//! `<millis>-<scenario_name>.png`. Timestamps handed out by one process are
//! strictly increasing, so two scenarios finishing in the same millisecond
//! still get distinct names.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use loancheck_common::ScenarioOutcome;
use sha2::{Digest, Sha256};

use crate::error::E2eResult;

static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

/// Millisecond timestamp, strictly greater than any previously returned
pub fn next_timestamp() -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    let mut last = LAST_STAMP.load(Ordering::SeqCst);
    loop {
        let next = now.max(last + 1);
        match LAST_STAMP.compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// Root directory of the pass/fail screenshot partitions
#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    root: PathBuf,
}

impl ScreenshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Partition directory for an outcome
    pub fn partition(&self, outcome: &ScenarioOutcome) -> PathBuf {
        self.root.join(outcome.classification())
    }

    /// Create the partition if needed and return the path for a new artifact
    pub fn prepare(&self, outcome: &ScenarioOutcome) -> E2eResult<PathBuf> {
        let dir = self.partition(outcome);
        std::fs::create_dir_all(&dir)?;
        Ok(dir.join(format!("{}-{}.png", next_timestamp(), outcome.file_stem())))
    }
}

/// SHA-256 of a written artifact
pub fn hash_file(path: &Path) -> E2eResult<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}
