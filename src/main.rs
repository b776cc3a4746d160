mod areas;
mod browser;
mod export;
mod geo;
mod parser;
mod pipeline;
mod scrape;
mod settings;
mod store;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use browser::DriverTarget;
use scrape::BrowserScraper;
use settings::Settings;
use store::ScrapeDump;

#[derive(Parser)]
#[command(name = "aa_meetings", about = "AA Great Britain meeting finder scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the area codes offered by the directory page
    Areas,
    /// Scrape areas and save the raw page text
    Scrape {
        #[command(flatten)]
        scrape: ScrapeArgs,
        /// Raw dump output (default: settings dump_path)
        #[arg(long)]
        dump: Option<PathBuf>,
    },
    /// Format, join and export a saved raw dump
    Process {
        /// Raw dump to read (default: settings dump_path)
        #[arg(long)]
        dump: Option<PathBuf>,
        #[command(flatten)]
        process: ProcessArgs,
    },
    /// Scrape + process in one pass
    Run {
        #[command(flatten)]
        scrape: ScrapeArgs,
        /// Raw dump output (default: settings dump_path)
        #[arg(long)]
        dump: Option<PathBuf>,
        #[command(flatten)]
        process: ProcessArgs,
    },
}

#[derive(Args)]
struct ScrapeArgs {
    /// Area code to scrape; repeat for several (default: settings areas)
    #[arg(short, long = "area", conflicts_with = "all_areas")]
    areas: Vec<String>,
    /// Scrape every area the directory lists
    #[arg(long)]
    all_areas: bool,
    /// Leading <p> nodes to drop from each results page
    #[arg(long)]
    skip_paragraphs: Option<usize>,
    /// Seconds to wait between areas
    #[arg(long)]
    delay: Option<u64>,
    /// chromedriver binary
    #[arg(long)]
    driver: Option<PathBuf>,
    /// Use an already running WebDriver server instead of spawning chromedriver
    #[arg(long)]
    webdriver_url: Option<String>,
    /// Show the browser window
    #[arg(long)]
    headed: bool,
}

#[derive(Args)]
struct ProcessArgs {
    /// Postcode lookup CSV with pcds, laua, lat, long columns
    #[arg(long)]
    lookup: Option<PathBuf>,
    /// Output CSV (default: settings output_path)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Write the joined table instead of the meetings table
    #[arg(long)]
    export_joined: bool,
}

impl ScrapeArgs {
    fn apply(&self, s: &mut Settings) {
        if !self.areas.is_empty() {
            s.areas = self.areas.clone();
        }
        if let Some(n) = self.skip_paragraphs {
            s.skip_paragraphs = n;
        }
        if let Some(d) = self.delay {
            s.request_delay_secs = d;
        }
        if let Some(p) = &self.driver {
            s.driver_path = Some(p.clone());
        }
        if let Some(u) = &self.webdriver_url {
            s.webdriver_url = Some(u.clone());
        }
        if self.headed {
            s.headless = false;
        }
    }
}

impl ProcessArgs {
    fn apply(&self, s: &mut Settings) {
        if let Some(p) = &self.lookup {
            s.lookup_path = Some(p.clone());
        }
        if let Some(p) = &self.output {
            s.output_path = p.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load()?;

    let result = match cli.command {
        Commands::Areas => {
            let client = reqwest::Client::new();
            let codes =
                areas::fetch_area_codes(&client, &settings.directory_url, &settings.select_id).await?;
            for code in &codes {
                println!("{}", code);
            }
            println!("\n{} area codes", codes.len());
            Ok(())
        }
        Commands::Scrape { scrape, dump } => {
            scrape.apply(&mut settings);
            let dump_path = dump.unwrap_or_else(|| settings.dump_path.clone());
            let dump = scrape_run(&settings, scrape.all_areas).await?;
            store::save(&dump_path, &dump)?;
            println!(
                "Scraped {} meetings from {} areas -> {}",
                dump.meeting_count(),
                dump.areas.len(),
                dump_path.display()
            );
            Ok(())
        }
        Commands::Process { dump, process } => {
            process.apply(&mut settings);
            let dump_path = dump.unwrap_or_else(|| settings.dump_path.clone());
            let dump = store::load(&dump_path)?;
            process_run(&settings, &dump, process.export_joined)
        }
        Commands::Run {
            scrape,
            dump,
            process,
        } => {
            scrape.apply(&mut settings);
            process.apply(&mut settings);
            let dump_path = dump.unwrap_or_else(|| settings.dump_path.clone());

            let t_scrape = Instant::now();
            let dump = scrape_run(&settings, scrape.all_areas).await?;
            store::save(&dump_path, &dump)?;
            println!(
                "Scraped {} meetings from {} areas in {:.1}s",
                dump.meeting_count(),
                dump.areas.len(),
                t_scrape.elapsed().as_secs_f64()
            );

            process_run(&settings, &dump, process.export_joined)
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn scrape_run(settings: &Settings, all_areas: bool) -> Result<ScrapeDump> {
    // Fail on a missing driver before touching the site.
    let target = DriverTarget::resolve(settings)?;

    let client = reqwest::Client::new();
    let discovered =
        areas::fetch_area_codes(&client, &settings.directory_url, &settings.select_id).await?;
    let selected = scrape::select_areas(&settings.areas, &discovered, all_areas);
    if selected.is_empty() {
        bail!("No areas to scrape; pass --area CODE or --all-areas");
    }

    info!(
        "Scraping {} of {} areas, skipping {} leading paragraphs per page",
        selected.len(),
        discovered.len(),
        settings.skip_paragraphs
    );
    let browser = BrowserScraper::new(target, settings);
    let scrapes = scrape::scrape_areas(
        &browser,
        &selected,
        Duration::from_secs(settings.request_delay_secs),
    )
    .await
    .context("Scrape aborted")?;

    Ok(ScrapeDump::new(&settings.directory_url, scrapes))
}

fn process_run(settings: &Settings, dump: &ScrapeDump, export_joined: bool) -> Result<()> {
    let opts = pipeline::ProcessOptions {
        lookup_path: settings.lookup_path.as_deref(),
        output_path: &settings.output_path,
        export_joined,
    };
    let counts = pipeline::process(dump, &opts)?;
    counts.print();
    Ok(())
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
