//! Trace source (C7): a pull-based reader over `<timestamp> <object_id>
//! <size>` trace lines. Timestamps are assumed non-decreasing and are not
//! re-validated.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::error::SimError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceRequest {
    pub timestamp: f64,
    pub object_id: u64,
    pub size: u64,
}

pub struct TraceReader {
    lines: std::io::Lines<BufReader<File>>,
    line_no: usize,
}

impl TraceReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let file = File::open(path.as_ref())?;
        Ok(TraceReader {
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }
}

impl Iterator for TraceReader {
    type Item = Result<TraceRequest, SimError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let raw = self.lines.next()?;
            self.line_no += 1;
            let text = match raw {
                Ok(t) => t,
                Err(e) => return Some(Err(SimError::from(e))),
            };
            if text.trim().is_empty() {
                continue;
            }
            return Some(parse_line(self.line_no, &text));
        }
    }
}

fn parse_line(line_no: usize, text: &str) -> Result<TraceRequest, SimError> {
    let mut fields = text.split_whitespace();
    let timestamp = fields
        .next()
        .ok_or_else(|| SimError::parse(line_no, text))?
        .parse::<f64>()
        .map_err(|_| SimError::parse(line_no, text))?;
    let object_id = fields
        .next()
        .ok_or_else(|| SimError::parse(line_no, text))?
        .parse::<u64>()
        .map_err(|_| SimError::parse(line_no, text))?;
    let size = fields
        .next()
        .ok_or_else(|| SimError::parse(line_no, text))?
        .parse::<u64>()
        .map_err(|_| SimError::parse(line_no, text))?;
    if fields.next().is_some() {
        return Err(SimError::parse(line_no, text));
    }
    Ok(TraceRequest {
        timestamp,
        object_id,
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_well_formed_lines() {
        let r = parse_line(1, "1.5 42 1024").unwrap();
        assert_eq!(
            r,
            TraceRequest {
                timestamp: 1.5,
                object_id: 42,
                size: 1024
            }
        );
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(parse_line(1, "1.5 42").is_err());
        assert!(parse_line(1, "1.5 42 10 99").is_err());
    }

    #[test]
    fn rejects_non_numeric_fields() {
        assert!(parse_line(1, "a b c").is_err());
    }

    #[test]
    fn reader_skips_blank_lines_and_tracks_line_numbers() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0 1 10").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "1 2 20").unwrap();
        writeln!(file, "not a line").unwrap();

        let reader = TraceReader::open(file.path()).unwrap();
        let results: Vec<_> = reader.collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(results[2].is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(TraceReader::open("/nonexistent/path/trace.txt").is_err());
    }
}
