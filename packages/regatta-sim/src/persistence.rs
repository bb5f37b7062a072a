use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use regatta_types::RaceResult;

/// Load every result from a JSON-lines file. Missing file → empty; bad lines are skipped.
pub async fn load_results(path: &Path) -> Vec<RaceResult> {
    if !path.exists() {
        info!("No results file at {}, starting an empty leaderboard", path.display());
        return Vec::new();
    }

    let data = match fs::read_to_string(path).await {
        Ok(data) => data,
        Err(e) => {
            warn!("Failed to read {}: {e}, starting an empty leaderboard", path.display());
            return Vec::new();
        }
    };

    let mut results = Vec::new();
    for (n, line) in data.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()) {
        match serde_json::from_str::<RaceResult>(line) {
            Ok(r) => results.push(r),
            Err(e) => warn!("Skipping {}:{}: {e}", path.display(), n + 1),
        }
    }
    info!("Loaded {} results from {}", results.len(), path.display());
    results
}

/// Append one result as a single JSON line.
pub async fn append_result(path: &Path, result: &RaceResult) -> Result<()> {
    let mut line = serde_json::to_string(result)?;
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
