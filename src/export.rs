use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::geo::{JoinedMeetingRecord, MeetingRecord};

// First column is the unnamed 0-based row index.
const MEETING_HEADER: &[&str] = &["", "meeting_names", "addresses", "postcodes", "times"];
const JOINED_HEADER: &[&str] = &[
    "",
    "meeting_names",
    "addresses",
    "postcodes",
    "times",
    "pcds",
    "laua",
    "lat",
    "long",
];

pub fn write_meetings<W: Write>(out: W, records: &[MeetingRecord]) -> csv::Result<usize> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(MEETING_HEADER)?;
    for (i, r) in records.iter().enumerate() {
        wtr.write_record([
            i.to_string().as_str(),
            r.name.as_str(),
            r.address.as_str(),
            r.postcode.as_str(),
            r.time.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(records.len())
}

pub fn write_joined<W: Write>(out: W, rows: &[JoinedMeetingRecord]) -> csv::Result<usize> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(JOINED_HEADER)?;
    for (i, row) in rows.iter().enumerate() {
        let m = &row.meeting;
        let (pcds, laua, lat, long) = match &row.geo {
            Some(g) => (
                g.pcds.clone(),
                g.laua.clone().unwrap_or_default(),
                g.lat.map(|v| v.to_string()).unwrap_or_default(),
                g.long.map(|v| v.to_string()).unwrap_or_default(),
            ),
            None => Default::default(),
        };
        wtr.write_record([
            i.to_string(),
            m.name.clone(),
            m.address.clone(),
            m.postcode.clone(),
            m.time.clone(),
            pcds,
            laua,
            lat,
            long,
        ])?;
    }
    wtr.flush()?;
    Ok(rows.len())
}

/// Create `path` (and its directory) and hand the file to `write`.
pub fn to_file<F>(path: &Path, write: F) -> Result<usize>
where
    F: FnOnce(File) -> csv::Result<usize>,
{
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let n = write(file).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {} rows to {}", n, path.display());
    Ok(n)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{left_join, GeoLookupRow};

    fn record(name: &str, postcode: &str) -> MeetingRecord {
        MeetingRecord {
            name: name.into(),
            address: "1 Church Rd, Hall".into(),
            time: "18:00 - duration 1hr".into(),
            postcode: postcode.into(),
        }
    }

    fn render(f: impl FnOnce(&mut Vec<u8>) -> csv::Result<usize>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn meetings_layout() {
        let out = render(|b| write_meetings(b, &[record("Monday Group", "AB1 2CD")]));
        assert_eq!(
            out,
            ",meeting_names,addresses,postcodes,times\n\
             0,Monday Group,\"1 Church Rd, Hall\",AB1 2CD,18:00 - duration 1hr\n"
        );
    }

    #[test]
    fn row_index_counts_from_zero() {
        let recs = vec![record("A", "X"), record("B", "Y"), record("C", "Z")];
        let out = render(|b| write_meetings(b, &recs));
        let idx: Vec<&str> = out.lines().skip(1).map(|l| l.split(',').next().unwrap()).collect();
        assert_eq!(idx, vec!["0", "1", "2"]);
    }

    #[test]
    fn joined_layout_with_blank_geo() {
        let lookup = vec![GeoLookupRow {
            pcds: "AB1 2CD".into(),
            laua: Some("E06000058".into()),
            lat: Some(50.5),
            long: Some(-1.25),
        }];
        let joined = left_join(&[record("A", "AB1 2CD"), record("B", "ZZ9 9ZZ")], &lookup);
        let out = render(|b| write_joined(b, &joined));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], ",meeting_names,addresses,postcodes,times,pcds,laua,lat,long");
        assert!(lines[1].ends_with("AB1 2CD,E06000058,50.5,-1.25"));
        assert!(lines[2].ends_with("ZZ9 9ZZ,18:00 - duration 1hr,,,,"));
    }

    #[test]
    fn default_export_ignores_fan_out() {
        let recs = vec![record("Monday", "AB1 2CD")];
        let dup = GeoLookupRow {
            pcds: "AB1 2CD".into(),
            laua: Some("E06000058".into()),
            lat: None,
            long: None,
        };
        let joined = left_join(&recs, &[dup.clone(), dup]);
        assert_eq!(joined.len(), 2);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/aa_meetings_formatted.csv");
        let n = to_file(&path, |f| write_meetings(f, &recs)).unwrap();
        assert_eq!(n, 1);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn utf8_passes_through() {
        let out = render(|b| write_meetings(b, &[record("Café Group – Llanelli", "SA15 1AA")]));
        assert!(out.contains("Café Group – Llanelli"));
    }
}
