//! Parser for delimited `Angle`/`DE` scan tables.
//!
//! ```text
//! # optional comment lines
//! Angle,DE
//! -2.0,97.1
//! -1.9,96.4
//! ...
//! ```
//!
//! The header row is required. Column names are matched
//! case-insensitively, a trailing unit such as `Angle (deg)` or `DE [%]`
//! is ignored, and extra columns are skipped.

use std::fs;
use std::path::Path;

use holofit_core::ScanPoint;

use crate::delimiter::Delimiter;
use crate::ParseError;

const ANGLE_COLUMN: &str = "angle";
const SIGNAL_COLUMN: &str = "de";

/// Parse a scan table from a string.
pub fn parse_scan_table(content: &str) -> Result<Vec<ScanPoint>, ParseError> {
    let mut lines = content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

    let (header_line, header) = lines.next().ok_or(ParseError::Format {
        line: 1,
        message: "Table contains no header row".into(),
    })?;

    let delimiter = Delimiter::sniff(header);
    let columns = delimiter.split(header);
    let angle_idx = find_column(&columns, ANGLE_COLUMN)
        .ok_or_else(|| ParseError::MissingColumn("Angle".into()))?;
    let signal_idx = find_column(&columns, SIGNAL_COLUMN)
        .ok_or_else(|| ParseError::MissingColumn("DE".into()))?;

    log::debug!(
        "Scan table header at line {header_line}: {:?} delimiter, Angle=col {angle_idx}, DE=col {signal_idx}",
        delimiter
    );

    let mut points = Vec::new();
    for (line_no, line) in lines {
        let fields = delimiter.split(line);
        let needed = angle_idx.max(signal_idx) + 1;
        if fields.len() < needed {
            return Err(ParseError::Format {
                line: line_no,
                message: format!("Expected at least {} fields, got '{}'", needed, line),
            });
        }
        let angle_deg = parse_field(fields[angle_idx], "angle", line_no)?;
        let raw_signal = parse_field(fields[signal_idx], "DE value", line_no)?;
        points.push(ScanPoint::new(angle_deg, raw_signal));
    }

    if points.is_empty() {
        return Err(ParseError::Format {
            line: header_line,
            message: "Table has a header but no data rows".into(),
        });
    }

    Ok(points)
}

/// Read and parse a scan table from disk.
pub fn read_scan_file(path: impl AsRef<Path>) -> Result<Vec<ScanPoint>, ParseError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let points = parse_scan_table(&content)?;
    log::info!("Read {} scan points from {}", points.len(), path.display());
    Ok(points)
}

/// Index of the header cell naming `wanted`, ignoring case and units.
fn find_column(columns: &[&str], wanted: &str) -> Option<usize> {
    columns.iter().position(|cell| {
        let name = cell.split(['(', '[']).next().unwrap_or(cell);
        name.trim().eq_ignore_ascii_case(wanted)
    })
}

fn parse_field(field: &str, what: &str, line: usize) -> Result<f64, ParseError> {
    let value: f64 = field.parse().map_err(|_| ParseError::Format {
        line,
        message: format!("Invalid {}: '{}'", what, field),
    })?;
    if !value.is_finite() {
        return Err(ParseError::Format {
            line,
            message: format!("Non-finite {}: '{}'", what, field),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_csv() {
        let content = "Angle,DE\n-1.0,95.0\n0.0,12.5\n1.0,94.0\n";
        let points = parse_scan_table(content).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[1], ScanPoint::new(0.0, 12.5));
    }

    #[test]
    fn test_header_is_case_insensitive_with_units() {
        let content = "angle (deg)\tde [%]\n0.5\t40\n";
        let points = parse_scan_table(content).unwrap();
        assert_eq!(points[0], ScanPoint::new(0.5, 40.0));
    }

    #[test]
    fn test_columns_found_in_any_order() {
        let content = "DE;Temp;Angle\n80;21.5;-0.2\n";
        let points = parse_scan_table(content).unwrap();
        assert_eq!(points[0], ScanPoint::new(-0.2, 80.0));
    }

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let content = "# stage scan 2024-05-02\n\nAngle DE\n\n1 2\n# pause\n3 4\n";
        let points = parse_scan_table(content).unwrap();
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn test_missing_column() {
        let err = parse_scan_table("Angle,Power\n0,1\n").unwrap_err();
        assert!(matches!(err, ParseError::MissingColumn(ref c) if c == "DE"));
    }

    #[test]
    fn test_bad_number_reports_line() {
        let err = parse_scan_table("Angle,DE\n0,1\n0.1,abc\n").unwrap_err();
        match err {
            ParseError::Format { line, message } => {
                assert_eq!(line, 3);
                assert!(message.contains("abc"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_short_row_is_rejected() {
        let err = parse_scan_table("Angle,DE\n0.5\n").unwrap_err();
        assert!(matches!(err, ParseError::Format { line: 2, .. }));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(matches!(parse_scan_table(""), Err(ParseError::Format { line: 1, .. })));
        assert!(matches!(
            parse_scan_table("# only a comment\nAngle,DE\n"),
            Err(ParseError::Format { line: 2, .. })
        ));
    }
}
