use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

pub const DIRECTORY_URL: &str = "https://www.alcoholics-anonymous.org.uk/aa-meetings/Find-a-Meeting";
const CONFIG_FILE: &str = "aa_meetings";
const ENV_PREFIX: &str = "AA";

/// Runtime settings. Every field has a default; `aa_meetings.toml` and
/// `AA_*` environment variables override them, CLI flags override both.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub directory_url: String,
    /// `id` of the area drop-down.
    pub select_id: String,
    /// Class of the search button.
    pub submit_class: String,
    /// Areas scraped when `--all-areas` is not given.
    pub areas: Vec<String>,
    /// Leading `<p>` nodes on the results page that are cookie banners and
    /// site chrome rather than meetings.
    pub skip_paragraphs: usize,
    pub page_wait_secs: u64,
    /// Pause between areas so the site is not hammered.
    pub request_delay_secs: u64,

    pub driver_path: Option<PathBuf>,
    pub driver_port: u16,
    pub webdriver_url: Option<String>,
    pub browser_binary: Option<String>,
    pub headless: bool,

    /// NSPL-style postcode lookup (`pcds`, `laua`, `lat`, `long`).
    pub lookup_path: Option<PathBuf>,
    pub output_path: PathBuf,
    pub dump_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            directory_url: DIRECTORY_URL.to_string(),
            select_id: "map-igroup".to_string(),
            submit_class: "cSubmit".to_string(),
            areas: vec!["31".into(), "23".into(), "29".into()],
            skip_paragraphs: 5,
            page_wait_secs: 10,
            request_delay_secs: 10,
            driver_path: None,
            driver_port: 9515,
            webdriver_url: None,
            browser_binary: None,
            headless: true,
            lookup_path: None,
            output_path: PathBuf::from("data/aa_meetings_formatted.csv"),
            dump_path: PathBuf::from("data/aa_meetings_raw.json"),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("areas"),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }
}

// ── Tests ──
