use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::export;
use crate::geo::{self, MeetingRecord};
use crate::parser;
use crate::scrape;
use crate::store::ScrapeDump;

pub struct ProcessOptions<'a> {
    pub lookup_path: Option<&'a Path>,
    pub output_path: &'a Path,
    pub export_joined: bool,
}

#[derive(Debug)]
pub struct ProcessCounts {
    pub meetings: usize,
    pub joined: Option<usize>,
    pub matched: Option<usize>,
    pub written: usize,
}

impl ProcessCounts {
    pub fn print(&self) {
        print!("Formatted {} meetings", self.meetings);
        if let (Some(joined), Some(matched)) = (self.joined, self.matched) {
            print!(", {} joined rows ({} with a local authority)", joined, matched);
        }
        println!(", wrote {} rows.", self.written);
    }
}

/// Parse the raw dump into meeting records, in area order.
pub fn records_from_dump(dump: &ScrapeDump) -> Result<Vec<MeetingRecord>> {
    let (names, blocks) = scrape::flatten(&dump.areas);
    let infos = parser::format_blocks(&blocks).context("Meeting text is not in the expected shape")?;
    let records = geo::build_records(&names, &infos)?;
    Ok(records)
}

/// Format, join and export. Nothing is written unless every step succeeds.
pub fn process(dump: &ScrapeDump, opts: &ProcessOptions) -> Result<ProcessCounts> {
    let records = records_from_dump(dump)?;
    info!("Formatted {} meetings", records.len());

    let joined = match opts.lookup_path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open lookup table {}", path.display()))?;
            let lookup = geo::read_lookup(file)?;
            Some(geo::left_join(&records, &lookup))
        }
        None => {
            info!("No lookup table configured; skipping postcode join");
            None
        }
    };

    let matched = joined
        .as_ref()
        .map(|rows| rows.iter().filter(|r| r.geo.is_some()).count());
    if let (Some(rows), Some(matched)) = (&joined, matched) {
        info!("Joined {} meetings into {} rows ({} matched)", records.len(), rows.len(), matched);
    }

    let written = match (&joined, opts.export_joined) {
        (Some(rows), true) => export::to_file(opts.output_path, |f| export::write_joined(f, rows))?,
        (None, true) => {
            warn!("--export-joined without a lookup table; writing meetings only");
            export::to_file(opts.output_path, |f| export::write_meetings(f, &records))?
        }
        (Some(_), false) => {
            warn!("Join result is not exported; pass --export-joined to write it");
            export::to_file(opts.output_path, |f| export::write_meetings(f, &records))?
        }
        (None, false) => export::to_file(opts.output_path, |f| export::write_meetings(f, &records))?,
    };

    Ok(ProcessCounts {
        meetings: records.len(),
        joined: joined.as_ref().map(Vec::len),
        matched,
        written,
    })
}

// ── Tests ──
