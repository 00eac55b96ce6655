//! Save a facts record as `<savedir>/<hostname>-facts.json`.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use tracing::info;

use super::FactsRecord;

/// Path the facts for `hostname` are saved under.
pub fn facts_path(savedir: &Path, hostname: &str) -> PathBuf {
    savedir.join(format!("{}-facts.json", hostname))
}

/// Write the full record as JSON. The file name uses the hostname the device
/// reported, which may differ from the host that was connected to.
pub async fn save_facts(savedir: &Path, facts: &FactsRecord) -> Result<PathBuf> {
    let hostname = facts
        .get("hostname")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| anyhow!("facts carry no hostname to name the file after"))?;

    if hostname.contains(['/', '\\']) || hostname == "." || hostname == ".." {
        return Err(anyhow!("hostname {:?} is not usable as a file name", hostname));
    }

    let path = facts_path(savedir, hostname);
    let content = serde_json::to_string_pretty(facts)?;
    tokio::fs::write(&path, content)
        .await
        .map_err(|e| anyhow!("cannot write {:?}: {}", path, e))?;
    info!("Facts saved to: {:?}", path);
    Ok(path)
}
