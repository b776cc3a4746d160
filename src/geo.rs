use std::collections::HashMap;
use std::io::Read;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::parser::MeetingInfo;

#[derive(Debug, Error)]
pub enum JoinError {
    #[error("{names} meeting names but {infos} meeting info rows")]
    Misaligned { names: usize, infos: usize },

    #[error("lookup table has no {0:?} column")]
    MissingColumn(&'static str),

    #[error("lookup table: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingRecord {
    pub name: String,
    pub address: String,
    pub time: String,
    pub postcode: String,
}

/// Row of the postcode lookup. Only these four columns are read; the NSPL
/// file has dozens more.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeoLookupRow {
    pub pcds: String,
    pub laua: Option<String>,
    pub lat: Option<f64>,
    pub long: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinedMeetingRecord {
    pub meeting: MeetingRecord,
    pub geo: Option<GeoLookupRow>,
}

/// Pair names with formatted info rows by position.
pub fn build_records(names: &[String], infos: &[MeetingInfo]) -> Result<Vec<MeetingRecord>, JoinError> {
    if names.len() != infos.len() {
        return Err(JoinError::Misaligned {
            names: names.len(),
            infos: infos.len(),
        });
    }
    Ok(names
        .iter()
        .zip(infos)
        .map(|(name, info)| MeetingRecord {
            name: name.clone(),
            address: info.address.clone(),
            time: info.time.clone(),
            postcode: info.postcode.clone(),
        })
        .collect())
}

const LOOKUP_COLUMNS: &[&str] = &["pcds", "laua", "lat", "long"];

pub fn read_lookup<R: Read>(rdr: R) -> Result<Vec<GeoLookupRow>, JoinError> {
    let mut reader = csv::Reader::from_reader(rdr);
    let headers = reader.headers()?.clone();
    if let Some(missing) = LOOKUP_COLUMNS.iter().copied().find(|c| !headers.iter().any(|h| h == *c)) {
        return Err(JoinError::MissingColumn(missing));
    }
    let rows = reader
        .deserialize()
        .collect::<Result<Vec<GeoLookupRow>, _>>()?;
    info!("Loaded {} postcode lookup rows", rows.len());
    Ok(rows)
}

/// Left join on `postcode == pcds`. Every lookup row sharing a postcode
/// produces its own output row; meetings with no match keep `geo: None`.
pub fn left_join(records: &[MeetingRecord], lookup: &[GeoLookupRow]) -> Vec<JoinedMeetingRecord> {
    let mut by_postcode: HashMap<&str, Vec<&GeoLookupRow>> = HashMap::new();
    for row in lookup {
        by_postcode.entry(row.pcds.as_str()).or_default().push(row);
    }

    let mut joined = Vec::with_capacity(records.len());
    for rec in records {
        match by_postcode.get(rec.postcode.as_str()) {
            Some(rows) => joined.extend(rows.iter().map(|g| JoinedMeetingRecord {
                meeting: rec.clone(),
                geo: Some((*g).clone()),
            })),
            None => joined.push(JoinedMeetingRecord {
                meeting: rec.clone(),
                geo: None,
            }),
        }
    }
    joined
}

// ── Tests ──
