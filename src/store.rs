use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::scrape::AreaScrape;

/// Raw page text for a whole run, kept so parsing can be redone offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeDump {
    pub scraped_at: DateTime<Utc>,
    pub source_url: String,
    pub areas: Vec<AreaScrape>,
}

impl ScrapeDump {
    pub fn new(source_url: &str, areas: Vec<AreaScrape>) -> Self {
        ScrapeDump {
            scraped_at: Utc::now(),
            source_url: source_url.to_string(),
            areas,
        }
    }

    pub fn meeting_count(&self) -> usize {
        self.areas.iter().map(|a| a.names.len()).sum()
    }
}

pub fn save(path: &Path, dump: &ScrapeDump) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(dump)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Saved raw scrape of {} areas to {}", dump.areas.len(), path.display());
    Ok(())
}

pub fn load(path: &Path) -> Result<ScrapeDump> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} (run 'scrape' first?)", path.display()))?;
    let dump = serde_json::from_str(&json)
        .with_context(|| format!("{} is not a scrape dump", path.display()))?;
    Ok(dump)
}

// ── Tests ──
