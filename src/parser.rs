use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const TIME_PREFIX: &str = "Time: ";
pub const POSTCODE_PREFIX: &str = "Postcode: ";

static POSTCODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{1,2}[0-9][A-Z0-9]? ?[0-9][A-Z]{2}$").unwrap());

/// One meeting paragraph split into its three fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingInfo {
    pub address: String,
    pub time: String,
    pub postcode: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Address,
    Time,
    Postcode,
}

impl Field {
    fn line(self) -> usize {
        match self {
            Field::Address => 0,
            Field::Time => 1,
            Field::Postcode => 2,
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Field::Address => "address",
            Field::Time => "time",
            Field::Postcode => "postcode",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("block {block}: no line for {field} (block has {lines} lines)")]
    MissingLine {
        block: usize,
        field: Field,
        lines: usize,
    },

    #[error("block {block}: {field} line {line:?} does not start with {expected:?}")]
    UnexpectedPrefix {
        block: usize,
        field: Field,
        expected: &'static str,
        line: String,
    },

    #[error("block {block}: expected 3 lines, found {lines}")]
    ExtraLines { block: usize, lines: usize },
}

/// Split every block, in order. Stops at the first malformed block.
pub fn format_blocks<S: AsRef<str>>(blocks: &[S]) -> Result<Vec<MeetingInfo>, FormatError> {
    blocks
        .iter()
        .enumerate()
        .map(|(i, b)| parse_block(i, b.as_ref()))
        .collect()
}

/// Parse one block of the form:
///
/// ```text
/// 123 Main St
/// Time: 18:00 - duration 1hr
/// Postcode: AB1 2CD
/// ```
pub fn parse_block(index: usize, block: &str) -> Result<MeetingInfo, FormatError> {
    let lines: Vec<&str> = block.lines().collect();

    let line = |field: Field| {
        lines
            .get(field.line())
            .copied()
            .ok_or(FormatError::MissingLine {
                block: index,
                field,
                lines: lines.len(),
            })
    };

    let address = line(Field::Address)?;
    let time = strip(index, Field::Time, line(Field::Time)?, TIME_PREFIX)?;
    let postcode = strip(index, Field::Postcode, line(Field::Postcode)?, POSTCODE_PREFIX)?;

    // Trailing blank lines are layout noise, anything else is a shape change.
    if lines[3..].iter().any(|l| !l.trim().is_empty()) {
        return Err(FormatError::ExtraLines {
            block: index,
            lines: lines.len(),
        });
    }

    if !looks_like_postcode(postcode) {
        warn!("block {}: postcode {:?} does not look like a UK postcode", index, postcode);
    }

    Ok(MeetingInfo {
        address: address.to_string(),
        time: time.to_string(),
        postcode: postcode.to_string(),
    })
}

fn strip<'a>(
    block: usize,
    field: Field,
    line: &'a str,
    prefix: &'static str,
) -> Result<&'a str, FormatError> {
    line.strip_prefix(prefix)
        .ok_or_else(|| FormatError::UnexpectedPrefix {
            block,
            field,
            expected: prefix,
            line: line.to_string(),
        })
}

pub fn looks_like_postcode(val: &str) -> bool {
    POSTCODE_RE.is_match(val.trim())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_block() {
        let info = parse_block(0, "123 Main St\nTime: 18:00 - duration 1hr\nPostcode: AB1 2CD").unwrap();
        assert_eq!(
            info,
            MeetingInfo {
                address: "123 Main St".into(),
                time: "18:00 - duration 1hr".into(),
                postcode: "AB1 2CD".into(),
            }
        );
    }

    #[test]
    fn remaining_text_verbatim() {
        let info = parse_block(
            0,
            "St Peter's Hall,  Hinton Road\nTime: 19.30 - duration 1hr 15 mins\nPostcode: BH1 2EE",
        )
        .unwrap();
        assert_eq!(info.address, "St Peter's Hall,  Hinton Road");
        assert_eq!(info.time, "19.30 - duration 1hr 15 mins");
        assert_eq!(info.postcode, "BH1 2EE");
    }

    #[test]
    fn crlf_and_trailing_newline() {
        let info = parse_block(0, "Hall\r\nTime: 10:00\r\nPostcode: BS1 4DJ\r\n").unwrap();
        assert_eq!(info.time, "10:00");
        assert_eq!(info.postcode, "BS1 4DJ");
    }

    #[test]
    fn only_leading_prefix_stripped() {
        let info = parse_block(0, "Hall\nTime: Time: 10:00\nPostcode: EX1 1HS").unwrap();
        assert_eq!(info.time, "Time: 10:00");
    }

    #[test]
    fn too_few_lines() {
        let err = parse_block(4, "Hall\nTime: 10:00").unwrap_err();
        assert_eq!(
            err,
            FormatError::MissingLine {
                block: 4,
                field: Field::Postcode,
                lines: 2,
            }
        );

        let err = parse_block(0, "").unwrap_err();
        assert!(matches!(err, FormatError::MissingLine { field: Field::Address, lines: 0, .. }));
    }

    #[test]
    fn wrong_prefix_is_an_error() {
        let err = parse_block(1, "Hall\nStarts: 10:00\nPostcode: EX1 1HS").unwrap_err();
        assert!(matches!(
            err,
            FormatError::UnexpectedPrefix { block: 1, field: Field::Time, expected: TIME_PREFIX, .. }
        ));

        let err = parse_block(2, "Hall\nTime: 10:00\nPost code: EX1 1HS").unwrap_err();
        assert!(matches!(
            err,
            FormatError::UnexpectedPrefix { field: Field::Postcode, ref line, .. } if line == "Post code: EX1 1HS"
        ));
    }

    #[test]
    fn extra_lines() {
        let err = parse_block(0, "Hall\nTime: 10:00\nPostcode: EX1 1HS\nWheelchair access").unwrap_err();
        assert_eq!(err, FormatError::ExtraLines { block: 0, lines: 4 });

        assert!(parse_block(0, "Hall\nTime: 10:00\nPostcode: EX1 1HS\n\n").is_ok());
    }

    #[test]
    fn batch_keeps_order_and_stops_on_error() {
        let blocks = vec![
            "A\nTime: 1\nPostcode: BH1 1AA".to_string(),
            "B\nTime: 2\nPostcode: BH2 5AA".to_string(),
        ];
        let infos = format_blocks(&blocks).unwrap();
        let addresses: Vec<&str> = infos.iter().map(|i| i.address.as_str()).collect();
        assert_eq!(addresses, vec!["A", "B"]);

        let bad = ["A\nTime: 1\nPostcode: BH1 1AA", "B only"];
        let err = format_blocks(&bad).unwrap_err();
        assert!(matches!(err, FormatError::MissingLine { block: 1, .. }));
    }

    #[test]
    fn postcode_shape() {
        assert!(looks_like_postcode("AB1 2CD"));
        assert!(looks_like_postcode("SW1A 1AA"));
        assert!(looks_like_postcode("M1 1AE"));
        assert!(!looks_like_postcode("TBC"));
        assert!(!looks_like_postcode(""));
    }
}
