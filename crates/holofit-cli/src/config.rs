//! TOML configuration deserialisation for fit jobs.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use holofit_core::{FitBounds, ModelVariant, NormalizationMode};

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub grating: GratingConfig,
    pub data: DataConfig,
    pub fit: FitConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Recording and probe geometry.
#[derive(Debug, Deserialize)]
pub struct GratingConfig {
    /// Fringe frequency (lines/µm).
    pub spatial_frequency: f64,
    /// Probe wavelength in air (µm).
    pub wavelength_air: f64,
    /// Average refractive index of the film.
    pub film_index: f64,
    /// Bulk absorption coefficient α₀ (µm⁻¹). Selects the absorption model
    /// when `fit.variant = "auto"`.
    #[serde(default)]
    pub film_absorption: Option<f64>,
}

/// Scan file and how its readings are converted.
#[derive(Debug, Deserialize)]
pub struct DataConfig {
    /// Path to the delimited scan table, relative to the job file.
    pub file: String,
    #[serde(default)]
    pub mode: DataMode,
    /// Detector offset (percent) for `zero-order-correct`.
    #[serde(default)]
    pub offset: Option<f64>,
}

/// Acquisition channel of the DE column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataMode {
    #[default]
    DirectInvert,
    ZeroOrderCorrect,
    FirstOrder,
}

impl DataConfig {
    pub fn normalization_mode(&self) -> NormalizationMode {
        match self.mode {
            DataMode::DirectInvert => NormalizationMode::DirectInvert,
            DataMode::ZeroOrderCorrect => NormalizationMode::ZeroOrderCorrect {
                offset: self.offset,
            },
            DataMode::FirstOrder => NormalizationMode::FirstOrder,
        }
    }
}

/// Starting point, limits and budget of the fit.
#[derive(Debug, Deserialize)]
pub struct FitConfig {
    /// Initial modulation. Estimated from the peak efficiency when omitted.
    #[serde(default)]
    pub modulation: Option<f64>,
    /// Initial film thickness (µm).
    pub thickness: f64,
    #[serde(default)]
    pub modulation_bounds: Option<[f64; 2]>,
    #[serde(default)]
    pub thickness_bounds: Option<[f64; 2]>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub variant: VariantChoice,
}

fn default_max_iterations() -> usize {
    200
}

/// Model selection: explicit, or implied by `grating.film_absorption`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariantChoice {
    #[default]
    Auto,
    LosslessPhase,
    Absorption,
}

impl FitConfig {
    /// Bounds for `variant`, filling unset limits with its defaults.
    pub fn bounds(&self, variant: ModelVariant) -> FitBounds {
        let defaults = FitBounds::default_for(variant);
        FitBounds::new(
            self.modulation_bounds.unwrap_or(defaults.modulation),
            self.thickness_bounds.unwrap_or(defaults.thickness),
        )
    }
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to save measured/fitted curves as CSV (default: true).
    #[serde(default = "default_true")]
    pub save_curve: bool,
    /// Whether to also save the fit result as JSON (default: false).
    #[serde(default)]
    pub save_json: bool,
    /// Samples in the dense model curve (default: 400).
    #[serde(default = "default_curve_points")]
    pub curve_points: usize,
    /// Detuning range of the dense model curve (degrees). Defaults to the
    /// measured range for fits and ±5° for predictions.
    #[serde(default)]
    pub curve_range: Option<[f64; 2]>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_curve: true,
            save_json: false,
            curve_points: default_curve_points(),
            curve_range: None,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}
fn default_true() -> bool {
    true
}
fn default_curve_points() -> usize {
    400
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job file {}", path.display()))?;
    let config: JobConfig = toml::from_str(&content)
        .with_context(|| format!("Invalid job file {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [grating]
        spatial_frequency = 0.8
        wavelength_air = 0.633
        film_index = 1.5

        [data]
        file = "scan.csv"

        [fit]
        thickness = 15.0
    "#;

    #[test]
    fn test_minimal_job_uses_defaults() {
        let job: JobConfig = toml::from_str(MINIMAL).unwrap();
        assert_eq!(job.data.mode, DataMode::DirectInvert);
        assert_eq!(job.fit.variant, VariantChoice::Auto);
        assert_eq!(job.fit.max_iterations, 200);
        assert!(job.fit.modulation.is_none());
        assert_eq!(job.output.directory, "./output");
        assert!(job.output.save_curve);
        assert!(!job.output.save_json);
        assert_eq!(job.output.curve_points, 400);
    }

    #[test]
    fn test_full_job() {
        let content = r#"
            [grating]
            spatial_frequency = 1.2
            wavelength_air = 0.532
            film_index = 1.48
            film_absorption = 0.004

            [data]
            file = "data/run3.txt"
            mode = "zero-order-correct"
            offset = 4.5

            [fit]
            modulation = 0.03
            thickness = 20.0
            modulation_bounds = [0.0, 0.5]
            variant = "absorption"
            max_iterations = 50

            [output]
            directory = "results"
            save_json = true
            curve_range = [-3.0, 3.0]
        "#;
        let job: JobConfig = toml::from_str(content).unwrap();
        assert_eq!(
            job.data.normalization_mode(),
            NormalizationMode::ZeroOrderCorrect { offset: Some(4.5) }
        );
        assert_eq!(job.fit.variant, VariantChoice::Absorption);
        let bounds = job.fit.bounds(ModelVariant::AbsorptionGrating);
        assert_eq!(bounds.modulation, [0.0, 0.5]);
        assert_eq!(bounds.thickness, [0.0, 50.0]);
        assert_eq!(job.output.curve_range, Some([-3.0, 3.0]));
    }

    #[test]
    fn test_demo_job_parses() {
        let job: JobConfig = toml::from_str(include_str!("../../../demos/job.toml")).unwrap();
        assert_eq!(job.data.file, "scan.csv");
        assert!(job.output.save_json);
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let content = MINIMAL.replace("file = \"scan.csv\"", "file = \"scan.csv\"\nmode = \"ratio\"");
        assert!(toml::from_str::<JobConfig>(&content).is_err());
    }
}
