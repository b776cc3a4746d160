use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use thirtyfour::prelude::*;
use thirtyfour::ChromiumLikeCapabilities;
use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::settings::Settings;

const DRIVER_NAMES: &[&str] = &["chromedriver", "chromedriver.exe"];
const DRIVER_READY_TIMEOUT: Duration = Duration::from_secs(15);
const DRIVER_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromedriver not found (searched: {searched}); set AA_DRIVER_PATH or --driver")]
    DriverNotFound { searched: String },

    #[error("failed to launch {path}: {source}")]
    DriverLaunch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("chromedriver at {url} not ready after {waited:?}")]
    DriverNotReady { url: String, waited: Duration },

    #[error("webdriver: {0}")]
    WebDriver(#[from] WebDriverError),
}

/// Where the WebDriver endpoint comes from, decided once at startup.
#[derive(Debug, Clone)]
pub enum DriverTarget {
    /// Spawn this binary for every session.
    Spawn { path: PathBuf, port: u16 },
    /// Talk to a driver somebody else runs.
    Remote { url: String },
}

impl DriverTarget {
    pub fn resolve(settings: &Settings) -> Result<Self, BrowserError> {
        if let Some(url) = &settings.webdriver_url {
            return Ok(DriverTarget::Remote { url: url.clone() });
        }
        let path = resolve_driver(settings.driver_path.as_deref(), std::env::var_os("PATH"))?;
        info!("Using chromedriver at {}", path.display());
        Ok(DriverTarget::Spawn {
            path,
            port: settings.driver_port,
        })
    }
}

/// An explicit path wins; otherwise the first chromedriver on `PATH`.
pub fn resolve_driver(
    explicit: Option<&Path>,
    path_var: Option<std::ffi::OsString>,
) -> Result<PathBuf, BrowserError> {
    if let Some(p) = explicit {
        if p.is_file() {
            return Ok(p.to_path_buf());
        }
        return Err(BrowserError::DriverNotFound {
            searched: p.display().to_string(),
        });
    }

    let dirs: Vec<PathBuf> = path_var
        .as_deref()
        .map(|v| std::env::split_paths(v).collect())
        .unwrap_or_default();

    dirs.iter()
        .flat_map(|d| DRIVER_NAMES.iter().map(move |n| d.join(n)))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| BrowserError::DriverNotFound {
            searched: if dirs.is_empty() {
                "$PATH (unset)".to_string()
            } else {
                format!("$PATH ({} dirs)", dirs.len())
            },
        })
}

/// A live WebDriver session plus the driver process backing it, if we
/// spawned one. Call [`BrowserSession::close`] on every path; the process
/// is killed on drop regardless.
pub struct BrowserSession {
    driver: Option<WebDriver>,
    _process: Option<Child>,
}

impl BrowserSession {
    pub async fn open(target: &DriverTarget, settings: &Settings) -> Result<Self, BrowserError> {
        let (url, process) = match target {
            DriverTarget::Remote { url } => (url.clone(), None),
            DriverTarget::Spawn { path, port } => {
                let mut child = Command::new(path)
                    .arg(format!("--port={}", port))
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .kill_on_drop(true)
                    .spawn()
                    .map_err(|source| BrowserError::DriverLaunch {
                        path: path.clone(),
                        source,
                    })?;
                let url = format!("http://localhost:{}", port);
                wait_until_ready(&url, &mut child, path).await?;
                (url, Some(child))
            }
        };

        let mut caps = DesiredCapabilities::chrome();
        if settings.headless {
            caps.set_headless()?;
        }
        if let Some(bin) = &settings.browser_binary {
            caps.set_binary(bin)?;
        }

        debug!("Opening webdriver session at {}", url);
        let driver = WebDriver::new(&url, caps).await?;
        let session = BrowserSession {
            driver: Some(driver),
            _process: process,
        };

        // From here on the remote session exists and has to be quit on failure.
        let wait = Duration::from_secs(settings.page_wait_secs);
        let configured = session.driver().set_implicit_wait_timeout(wait).await;
        if let Err(e) = configured {
            session.close().await;
            return Err(e.into());
        }
        Ok(session)
    }

    pub fn driver(&self) -> &WebDriver {
        self.driver
            .as_ref()
            .expect("driver is only taken by close(), which consumes the session")
    }

    /// End the WebDriver session. Errors are logged, not returned, so that
    /// the caller's own result is what propagates.
    pub async fn close(mut self) {
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.quit().await {
                warn!("Failed to quit webdriver session: {}", e);
            }
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if self.driver.is_some() {
            warn!("Browser session dropped without close(); killing driver process");
        }
    }
}

/// Poll `/status` until the driver answers. The port is fixed, so a driver
/// left over from another run can answer for ours; our child exiting first
/// is a launch failure.
async fn wait_until_ready(base_url: &str, child: &mut Child, path: &Path) -> Result<(), BrowserError> {
    let client = reqwest::Client::new();
    let status_url = format!("{}/status", base_url);
    let start = Instant::now();

    while start.elapsed() < DRIVER_READY_TIMEOUT {
        if let Some(status) = child.try_wait().map_err(|source| BrowserError::DriverLaunch {
            path: path.to_path_buf(),
            source,
        })? {
            return Err(BrowserError::DriverLaunch {
                path: path.to_path_buf(),
                source: std::io::Error::other(format!("exited with {} before answering", status)),
            });
        }
        match client.get(&status_url).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            _ => tokio::time::sleep(DRIVER_POLL_INTERVAL).await,
        }
    }

    Err(BrowserError::DriverNotReady {
        url: base_url.to_string(),
        waited: DRIVER_READY_TIMEOUT,
    })
}

// ── Tests ──
