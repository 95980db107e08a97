//! Reading scan tables from disk and feeding them to the normaliser.

use std::fs;
use std::path::PathBuf;

use approx::assert_relative_eq;

use holofit_core::{normalize, NormalizationMode};
use holofit_data::{read_scan_file, ParseError};

fn write_temp(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("holofit-data-{}-{}", std::process::id(), name));
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_read_tab_separated_export() {
    let content = "# rotation stage export\nAngle\tDE\tPower_mW\n\
                   28.0\t96.0\t1.02\n\
                   29.0\t40.0\t1.01\n\
                   30.0\t5.0\t1.00\n\
                   31.0\t41.0\t1.01\n\
                   32.0\t95.0\t1.02\n";
    let path = write_temp("tab.txt", content);
    let points = read_scan_file(&path).unwrap();
    fs::remove_file(&path).ok();

    assert_eq!(points.len(), 5);
    let (scan, max) = normalize(&points, NormalizationMode::DirectInvert).unwrap();
    assert_relative_eq!(max, 0.95, max_relative = 1e-12);
    assert_eq!(scan.peak_angle_deg(), 30.0);
    assert_eq!(scan.angles_deg(), &[-2.0, -1.0, 0.0, 1.0, 2.0]);
}

#[test]
fn test_missing_file_is_io_error() {
    let path = std::env::temp_dir().join("holofit-data-does-not-exist.csv");
    let err = read_scan_file(&path).unwrap_err();
    assert!(matches!(err, ParseError::Io(_)));
    assert!(err.to_string().starts_with("Failed to read file"));
}

#[test]
fn test_format_error_mentions_line() {
    let path = write_temp("bad.csv", "Angle,DE\n0,50\n1,fifty\n");
    let err = read_scan_file(&path).unwrap_err();
    fs::remove_file(&path).ok();
    assert_eq!(err.to_string(), "Parse error at line 3: Invalid DE value: 'fifty'");
}
