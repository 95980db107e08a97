//! Conversion of raw detector readings into a centred efficiency curve.
//!
//! Two steps: invert the percent readings into a 0–1 diffraction
//! efficiency according to the acquisition channel, then shift the angle
//! axis so the measured peak sits at zero detuning.

use serde::{Deserialize, Serialize};

use crate::error::{HolofitError, Result};
use crate::types::{NormalizedScan, ScanPoint};

/// How raw percent readings map to first-order diffraction efficiency.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum NormalizationMode {
    /// Reading is 0th-order transmission in percent:
    /// $\eta = (100 - s)/100$.
    #[default]
    DirectInvert,
    /// Reading is 0th-order transmission with a detector offset:
    /// $t_0 = (s - s_0)/(100 - s_0)$, $\eta = 1 - t_0$.
    ///
    /// With `offset: None` the scan's own floor (minimum reading) is used.
    ZeroOrderCorrect { offset: Option<f64> },
    /// Reading is already the first-order efficiency in percent.
    FirstOrder,
}

impl NormalizationMode {
    /// Stable identifier, matching the serde and configuration spelling.
    pub fn label(&self) -> &'static str {
        match self {
            Self::DirectInvert => "direct-invert",
            Self::ZeroOrderCorrect { .. } => "zero-order-correct",
            Self::FirstOrder => "first-order",
        }
    }

    /// Map every reading of `scan` to an efficiency.
    fn invert(&self, scan: &[ScanPoint]) -> Result<Vec<f64>> {
        match *self {
            Self::DirectInvert => Ok(scan.iter().map(|p| (100.0 - p.raw_signal) * 0.01).collect()),
            Self::FirstOrder => Ok(scan.iter().map(|p| p.raw_signal * 0.01).collect()),
            Self::ZeroOrderCorrect { offset } => {
                let floor = match offset {
                    Some(value) => value,
                    None => scan
                        .iter()
                        .map(|p| p.raw_signal)
                        .fold(f64::INFINITY, f64::min),
                };
                if !floor.is_finite() || floor >= 100.0 {
                    return Err(HolofitError::InvalidScanData(format!(
                        "detector offset {floor} leaves no usable range below 100%"
                    )));
                }
                let span = 100.0 - floor;
                Ok(scan
                    .iter()
                    .map(|p| 1.0 - (p.raw_signal - floor) / span)
                    .collect())
            }
        }
    }
}

/// Normalise a raw scan and centre its peak at zero detuning.
///
/// Returns the scan together with its peak efficiency (DE_max). Ties for
/// the maximum resolve to the first point in acquisition order.
///
/// # Errors
/// [`HolofitError::InvalidScanData`] for an empty scan, a non-finite
/// reading, or an unusable detector offset.
pub fn normalize(scan: &[ScanPoint], mode: NormalizationMode) -> Result<(NormalizedScan, f64)> {
    if scan.is_empty() {
        return Err(HolofitError::InvalidScanData("scan contains no points".into()));
    }
    if let Some((i, p)) = scan
        .iter()
        .enumerate()
        .find(|(_, p)| !p.angle_deg.is_finite() || !p.raw_signal.is_finite())
    {
        return Err(HolofitError::InvalidScanData(format!(
            "non-finite reading at point {i}: angle={}, signal={}",
            p.angle_deg, p.raw_signal
        )));
    }

    let efficiencies = mode.invert(scan)?;

    let (peak_index, max_efficiency) = first_maximum(&efficiencies);
    let peak_angle_deg = scan[peak_index].angle_deg;
    let angles_deg: Vec<f64> = scan.iter().map(|p| p.angle_deg - peak_angle_deg).collect();

    let outside = efficiencies
        .iter()
        .filter(|e| !(0.0..=1.0).contains(*e))
        .count();
    if outside > 0 {
        log::warn!(
            "{outside} of {} efficiencies fall outside [0, 1] after {} normalisation",
            efficiencies.len(),
            mode.label()
        );
    }
    log::debug!(
        "Normalised {} points: peak η={:.4} at {:.3}°",
        scan.len(),
        max_efficiency,
        peak_angle_deg
    );

    let normalized =
        NormalizedScan::from_parts(angles_deg, efficiencies, peak_angle_deg, max_efficiency);
    Ok((normalized, max_efficiency))
}

/// Index and value of the first maximal element.
fn first_maximum(values: &[f64]) -> (usize, f64) {
    let mut best = (0, values[0]);
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > best.1 {
            best = (i, v);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scan(points: &[(f64, f64)]) -> Vec<ScanPoint> {
        points.iter().map(|&(a, s)| ScanPoint::new(a, s)).collect()
    }

    /// Direct inversion reads the signal as 0th-order transmission, so a
    /// 100 % reading in the middle becomes the minimum of `[1, 0, 1]`. The
    /// tie between the two outer points goes to the first one and the axis
    /// comes out as `[0, 1, 2]`; the symmetric `[-1, 0, 1]` axis is what
    /// [`NormalizationMode::FirstOrder`] produces for the same readings.
    #[test]
    fn test_direct_invert_peak_at_zero() {
        let raw = scan(&[(-1.0, 0.0), (0.0, 100.0), (1.0, 0.0)]);
        let (norm, max) = normalize(&raw, NormalizationMode::DirectInvert).unwrap();
        assert_eq!(max, 1.0);
        assert_eq!(norm.angles_deg(), &[0.0, 1.0, 2.0]);
        assert_eq!(norm.efficiencies()[0], 1.0);
        assert_eq!(norm.peak_angle_deg(), -1.0);
    }

    #[test]
    fn test_first_order_peak_is_symmetric() {
        let raw = scan(&[(-1.0, 0.0), (0.0, 100.0), (1.0, 0.0)]);
        let (norm, max) = normalize(&raw, NormalizationMode::FirstOrder).unwrap();
        assert_eq!(max, 1.0);
        assert_eq!(norm.angles_deg(), &[-1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_peak_at_first_index() {
        let raw = scan(&[(10.0, 20.0), (11.0, 50.0), (12.0, 80.0)]);
        let (norm, max) = normalize(&raw, NormalizationMode::DirectInvert).unwrap();
        assert_relative_eq!(max, 0.8);
        assert_eq!(norm.angles_deg(), &[0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_flat_signal_resolves_to_first_point() {
        let raw = scan(&[(3.0, 40.0), (4.0, 40.0), (5.0, 40.0)]);
        let (norm, _) = normalize(&raw, NormalizationMode::DirectInvert).unwrap();
        assert_eq!(norm.peak_angle_deg(), 3.0);
        assert_eq!(norm.angles_deg(), &[0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_zero_order_correct_uses_offset() {
        let raw = scan(&[(-1.0, 90.0), (0.0, 10.0), (1.0, 90.0)]);
        let mode = NormalizationMode::ZeroOrderCorrect { offset: Some(10.0) };
        let (norm, max) = normalize(&raw, mode).unwrap();
        // Offset reading maps to full diffraction.
        assert_relative_eq!(max, 1.0);
        assert_relative_eq!(norm.efficiencies()[0], 1.0 - 80.0 / 90.0, max_relative = 1e-12);
    }

    #[test]
    fn test_zero_order_correct_defaults_to_measured_floor() {
        let raw = scan(&[(-1.0, 60.0), (0.0, 20.0), (1.0, 60.0)]);
        let mode = NormalizationMode::ZeroOrderCorrect { offset: None };
        let (norm, max) = normalize(&raw, mode).unwrap();
        assert_relative_eq!(max, 1.0);
        assert_relative_eq!(norm.efficiencies()[2], 0.5, max_relative = 1e-12);
    }

    #[test]
    fn test_unusable_offset_is_rejected() {
        let raw = scan(&[(0.0, 100.0), (1.0, 100.0)]);
        let mode = NormalizationMode::ZeroOrderCorrect { offset: None };
        assert!(matches!(
            normalize(&raw, mode),
            Err(HolofitError::InvalidScanData(_))
        ));
    }

    #[test]
    fn test_empty_and_non_finite_scans_are_rejected() {
        assert!(normalize(&[], NormalizationMode::DirectInvert).is_err());
        let raw = scan(&[(0.0, f64::INFINITY)]);
        assert!(normalize(&raw, NormalizationMode::DirectInvert).is_err());
    }
}
