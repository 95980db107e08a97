//! # Holofit Data
//!
//! Ingestion of measured angular scans. A scan is a delimited text table
//! with a header row naming an `Angle` column (degrees) and a `DE` column
//! (detector reading, percent). Rows are kept in acquisition order and
//! become [`ScanPoint`]s for the normaliser in `holofit-core`.
//!
//! - [`delimiter`]: Column separator detection.
//! - [`table`]: Header matching and row parsing.

pub mod delimiter;
pub mod table;

use thiserror::Error;

pub use delimiter::Delimiter;
pub use holofit_core::ScanPoint;
pub use table::{parse_scan_table, read_scan_file};

/// Errors during scan table parsing.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Format { line: usize, message: String },

    #[error("Missing required column '{0}'")]
    MissingColumn(String),
}
