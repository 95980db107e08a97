//! Forward models against closed-form Kogelnik results.

use approx::{assert_abs_diff_eq, assert_relative_eq};

use holofit_core::grating::compute_bragg_angle;
use holofit_core::model::{AbsorptionGrating, EfficiencyModel, LosslessPhaseGrating};
use holofit_core::{predict_efficiency, GratingParameters, HolofitError, ModelVariant};

// ─────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────

/// 800 l/mm grating probed with a HeNe laser in a photopolymer.
fn hene_grating() -> GratingParameters {
    GratingParameters::new(0.8, 0.633, 1.5).unwrap()
}

fn detuning_grid() -> Vec<f64> {
    (-40..=40).map(|i| i as f64 * 0.125).collect()
}

// ─────────────────────────────────────────────────────────────
// Geometry
// ─────────────────────────────────────────────────────────────

#[test]
fn test_bragg_angle_of_hene_grating() {
    let theta = compute_bragg_angle(0.8, 0.633, 1.5).unwrap();
    assert_relative_eq!(theta.sin(), 0.8 * 0.633 / 3.0, max_relative = 1e-14);
    assert_abs_diff_eq!(theta.to_degrees(), 9.718, epsilon = 1e-3);
}

#[test]
fn test_bragg_angle_rejects_impossible_geometry() {
    // f·λ/(2n) = 3·0.8/2 > 1
    let err = compute_bragg_angle(3.0, 0.8, 1.0).unwrap_err();
    assert!(matches!(err, HolofitError::InvalidGeometry(_)));
    assert!(compute_bragg_angle(0.8, -0.633, 1.5).is_err());
    assert!(compute_bragg_angle(0.8, 0.633, f64::NAN).is_err());
}

// ─────────────────────────────────────────────────────────────
// Lossless phase grating
// ─────────────────────────────────────────────────────────────

#[test]
fn test_on_bragg_efficiency_is_sin_squared_nu() {
    let params = hene_grating();
    let model = LosslessPhaseGrating::new(params);
    for &(n1, t) in &[(0.005, 10.0), (0.01, 20.0), (0.02, 30.0), (0.03, 45.0)] {
        let nu = params.phase_parameter(n1, t);
        assert_abs_diff_eq!(model.efficiency_at(0.0, n1, t), nu.sin().powi(2), epsilon = 1e-9);
    }
}

#[test]
fn test_zero_modulation_gives_zero_everywhere() {
    let params = hene_grating();
    for variant in [ModelVariant::LosslessPhase, ModelVariant::AbsorptionGrating] {
        let eta = predict_efficiency(&detuning_grid(), 0.0, 20.0, &params, variant);
        assert!(eta.iter().all(|&e| e == 0.0), "{variant:?} should vanish");
    }
}

#[test]
fn test_curve_peaks_on_bragg_and_stays_physical() {
    let params = hene_grating();
    let angles = detuning_grid();
    let eta = predict_efficiency(&angles, 0.01, 20.0, &params, ModelVariant::LosslessPhase);
    let centre = angles.iter().position(|&a| a == 0.0).unwrap();
    for (i, &e) in eta.iter().enumerate() {
        assert!((0.0..=1.0).contains(&e));
        assert!(e <= eta[centre] + 1e-15, "point {i} exceeds the on-Bragg value");
    }
}

#[test]
fn test_thicker_grating_is_more_selective() {
    // Same ν, twice the thickness: the curve at a fixed detuning drops.
    let params = hene_grating();
    let thin = predict_efficiency(&[0.5], 0.01, 20.0, &params, ModelVariant::LosslessPhase)[0];
    let thick = predict_efficiency(&[0.5], 0.005, 40.0, &params, ModelVariant::LosslessPhase)[0];
    assert_relative_eq!(
        params.phase_parameter(0.01, 20.0),
        params.phase_parameter(0.005, 40.0),
        max_relative = 1e-14
    );
    assert!(thick < thin);
}

// ─────────────────────────────────────────────────────────────
// Absorption grating
// ─────────────────────────────────────────────────────────────

#[test]
fn test_absorption_without_bulk_loss_peaks_at_sinh_squared() {
    let params = hene_grating().with_film_absorption(0.0).unwrap();
    let model = AbsorptionGrating::new(params);
    let (alpha1, t) = (0.04, 10.0);
    let v = model.coupling_strength(alpha1, t);
    assert_relative_eq!(model.efficiency_at(0.0, alpha1, t), v.sinh().powi(2), max_relative = 1e-12);
}

#[test]
fn test_absorption_curve_is_continuous_across_critical_detuning() {
    // Where E = ν the square root changes branch.
    let params = hene_grating().with_film_absorption(0.005).unwrap();
    let model = AbsorptionGrating::new(params);
    let angles: Vec<f64> = (0..=2000).map(|i| i as f64 * 0.0025).collect();
    let eta = model.efficiencies(&angles, 0.05, 15.0);
    for pair in eta.windows(2) {
        assert!((pair[1] - pair[0]).abs() < 1e-3);
    }
    assert!(eta.iter().all(|e| e.is_finite() && *e >= 0.0));
}

#[test]
fn test_unset_absorption_means_no_bulk_loss() {
    let model = AbsorptionGrating::new(hene_grating());
    assert_eq!(model.attenuation(30.0), 1.0);
}
