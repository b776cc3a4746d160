use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use thirtyfour::components::SelectElement;
use thirtyfour::prelude::*;
use thiserror::Error;
use tracing::{info, warn};

use crate::areas::AreaCode;
use crate::browser::{BrowserError, BrowserSession, DriverTarget};
use crate::settings::Settings;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("area {area}: {source}")]
    Browser {
        area: AreaCode,
        #[source]
        source: BrowserError,
    },

    #[error("area {area}: {names} meeting names but {blocks} info blocks")]
    Misaligned {
        area: AreaCode,
        names: usize,
        blocks: usize,
    },
}

/// Headings and paragraphs read from one area's results page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaScrape {
    pub area: AreaCode,
    pub names: Vec<String>,
    pub blocks: Vec<String>,
}

impl AreaScrape {
    /// Drop the first `skip` paragraphs and check that what is left pairs up
    /// one-to-one with the headings.
    pub fn from_page(
        area: AreaCode,
        names: Vec<String>,
        paragraphs: Vec<String>,
        skip: usize,
    ) -> Result<Self, ScrapeError> {
        let blocks: Vec<String> = paragraphs.into_iter().skip(skip).collect();
        if names.len() != blocks.len() {
            return Err(ScrapeError::Misaligned {
                area,
                names: names.len(),
                blocks: blocks.len(),
            });
        }
        Ok(AreaScrape {
            area,
            names,
            blocks,
        })
    }
}

#[allow(async_fn_in_trait)]
pub trait AreaScraper {
    async fn scrape_area(&self, area: &AreaCode) -> Result<AreaScrape, ScrapeError>;
}

/// Drives a real browser: one fresh session per area.
pub struct BrowserScraper<'a> {
    target: DriverTarget,
    settings: &'a Settings,
}

impl<'a> BrowserScraper<'a> {
    pub fn new(target: DriverTarget, settings: &'a Settings) -> Self {
        BrowserScraper { target, settings }
    }

    async fn read_page(
        &self,
        driver: &WebDriver,
        area: &AreaCode,
    ) -> Result<(Vec<String>, Vec<String>), WebDriverError> {
        driver.goto(self.settings.directory_url.as_str()).await?;

        let select = driver.find(By::Id(self.settings.select_id.as_str())).await?;
        SelectElement::new(&select)
            .await?
            .select_by_value(area.as_str())
            .await?;
        driver
            .find(By::ClassName(self.settings.submit_class.as_str()))
            .await?
            .click()
            .await?;

        let names = texts(driver.find_all(By::Tag("h3")).await?).await?;
        let paragraphs = texts(driver.find_all(By::Tag("p")).await?).await?;
        Ok((names, paragraphs))
    }
}

impl AreaScraper for BrowserScraper<'_> {
    async fn scrape_area(&self, area: &AreaCode) -> Result<AreaScrape, ScrapeError> {
        let browser_err = |source| ScrapeError::Browser {
            area: area.clone(),
            source,
        };

        let session = BrowserSession::open(&self.target, self.settings)
            .await
            .map_err(browser_err)?;
        let page = self.read_page(session.driver(), area).await;
        session.close().await;

        let (names, paragraphs) = page.map_err(|e| browser_err(BrowserError::from(e)))?;
        AreaScrape::from_page(area.clone(), names, paragraphs, self.settings.skip_paragraphs)
    }
}

async fn texts(elements: Vec<WebElement>) -> Result<Vec<String>, WebDriverError> {
    let mut out = Vec::with_capacity(elements.len());
    for el in elements {
        out.push(el.text().await?);
    }
    Ok(out)
}

/// Scrape `areas` one after another, pausing `delay` between them.
/// The first failing area aborts the run.
pub async fn scrape_areas<S: AreaScraper>(
    scraper: &S,
    areas: &[AreaCode],
    delay: Duration,
) -> Result<Vec<AreaScrape>, ScrapeError> {
    let pb = ProgressBar::new(areas.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} areas {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut results = Vec::with_capacity(areas.len());
    for (i, area) in areas.iter().enumerate() {
        pb.set_message(format!("(area {})", area));
        let scrape = match scraper.scrape_area(area).await {
            Ok(s) => s,
            Err(e) => {
                pb.abandon();
                return Err(e);
            }
        };
        info!("Area {}: {} meetings", area, scrape.names.len());
        results.push(scrape);
        pb.inc(1);

        if i + 1 < areas.len() && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    pb.finish_and_clear();
    Ok(results)
}

/// Concatenate per-area names and blocks, area by area.
pub fn flatten(scrapes: &[AreaScrape]) -> (Vec<String>, Vec<String>) {
    let names = scrapes.iter().flat_map(|s| s.names.iter().cloned()).collect();
    let blocks = scrapes.iter().flat_map(|s| s.blocks.iter().cloned()).collect();
    (names, blocks)
}

/// Pick the areas to scrape: everything discovered, or the configured list.
/// Configured codes missing from the page are kept but reported.
pub fn select_areas(configured: &[String], discovered: &[AreaCode], all: bool) -> Vec<AreaCode> {
    if all {
        return discovered.to_vec();
    }
    configured
        .iter()
        .filter_map(|c| AreaCode::new(c.as_str()))
        .inspect(|c| {
            if !discovered.contains(c) {
                warn!("Area {} is not in the directory's area list", c);
            }
        })
        .collect()
}

// ── Tests ──
