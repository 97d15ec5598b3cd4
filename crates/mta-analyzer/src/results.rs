//! Loading the results artifact after a completed run
//!
//! The analyzer may still be flushing its report when it signals
//! completion, so the artifact is polled for with a fixed budget.

use crate::error::RunFailure;
use mta_config::AnalysisResults;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Wait for `path` to exist, checking `attempts` times `interval` apart
///
/// # Errors
/// - `RunFailure::ResultsNotFound` once the budget is spent
pub async fn wait_for_artifact(
    path: &Path,
    attempts: u32,
    interval: Duration,
) -> Result<(), RunFailure> {
    for attempt in 1..=attempts.max(1) {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            tracing::debug!(path = %path.display(), attempt, "results artifact found");
            return Ok(());
        }
        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }
    tracing::warn!(path = %path.display(), attempts, "results artifact never appeared");
    Err(RunFailure::ResultsNotFound(path.to_path_buf()))
}

/// Parse the results artifact, recording where the report lives
///
/// # Errors
/// - `RunFailure::ResultsNotFound` if the file vanished
/// - `RunFailure::Parse` if it is not a results document
pub async fn read_results(path: &Path, report_path: &Path) -> Result<AnalysisResults, RunFailure> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|_| RunFailure::ResultsNotFound(path.to_path_buf()))?;
    let mut results: AnalysisResults =
        serde_json::from_str(&text).map_err(|err| RunFailure::Parse {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
    results.report_path = Some(report_path.display().to_string());
    Ok(results)
}

/// Poll for and parse the results artifact
///
/// # Errors
/// - see [`wait_for_artifact`] and [`read_results`]
pub async fn load_results(
    path: &Path,
    report_path: &Path,
    attempts: u32,
    interval: Duration,
) -> Result<(AnalysisResults, PathBuf), RunFailure> {
    wait_for_artifact(path, attempts, interval).await?;
    let results = read_results(path, report_path).await?;
    Ok((results, report_path.to_path_buf()))
}
