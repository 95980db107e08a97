//! Fit runner: ties together scan ingestion, normalisation and the fit.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use holofit_core::diagnostics::{AnalyticalEstimate, Bandwidth};
use holofit_core::model::AbsorptionGrating;
use holofit_core::{
    analytical_estimate, angular_bandwidth, fit, normalize, predict_efficiency, Diagnostics,
    FitGuess, FitOptions, FitResult, GratingParameters, ModelVariant, NormalizationMode,
    NormalizedScan,
};
use holofit_data::read_scan_file;

use crate::config::{DataMode, JobConfig, VariantChoice};

/// Detuning range used for predictions without a configured range.
const DEFAULT_PREDICT_RANGE: [f64; 2] = [-5.0, 5.0];

/// Everything produced by one fit run.
pub struct FitOutput {
    pub params: GratingParameters,
    pub mode: NormalizationMode,
    pub data_file: PathBuf,
    pub scan: NormalizedScan,
    pub max_efficiency: f64,
    pub estimate: Option<AnalyticalEstimate>,
    pub result: FitResult,
    pub diagnostics: Diagnostics,
    pub bandwidth: Option<Bandwidth>,
}

/// Build the validated grating context from the job.
pub fn grating_parameters(job: &JobConfig) -> Result<GratingParameters> {
    let g = &job.grating;
    let params = GratingParameters::new(g.spatial_frequency, g.wavelength_air, g.film_index)
        .context("Invalid [grating] section")?;
    match g.film_absorption {
        Some(alpha0) => params
            .with_film_absorption(alpha0)
            .context("Invalid [grating] film_absorption"),
        None => Ok(params),
    }
}

/// Model to fit, honouring an explicit `fit.variant`.
pub fn resolve_variant(job: &JobConfig, params: &GratingParameters) -> ModelVariant {
    match job.fit.variant {
        VariantChoice::Auto => ModelVariant::for_grating(params),
        VariantChoice::LosslessPhase => ModelVariant::LosslessPhase,
        VariantChoice::Absorption => ModelVariant::AbsorptionGrating,
    }
}

/// Resolve the scan path: an explicit override wins, otherwise the job's
/// `data.file` relative to the job file's directory.
pub fn resolve_data_path(job: &JobConfig, config_path: &Path, data_override: Option<&Path>) -> PathBuf {
    if let Some(path) = data_override {
        return path.to_path_buf();
    }
    let file = Path::new(&job.data.file);
    if file.is_absolute() {
        return file.to_path_buf();
    }
    config_path
        .parent()
        .map(|dir| dir.join(file))
        .unwrap_or_else(|| file.to_path_buf())
}

/// Check everything that can be checked without reading the scan.
pub fn validate_job(job: &JobConfig) -> Result<(GratingParameters, ModelVariant)> {
    let params = grating_parameters(job)?;
    let variant = resolve_variant(job, &params);
    let bounds = job.fit.bounds(variant);
    bounds.validate().context("Invalid [fit] bounds")?;

    if let Some(modulation) = job.fit.modulation {
        let guess = FitGuess::new(modulation, job.fit.thickness);
        if !bounds.contains(&guess) {
            anyhow::bail!(
                "Initial guess (modulation={}, thickness={}) lies outside bounds \
                 modulation={:?}, thickness={:?}",
                modulation,
                job.fit.thickness,
                bounds.modulation,
                bounds.thickness
            );
        }
    }
    if job.fit.max_iterations == 0 {
        anyhow::bail!("[fit] max_iterations must be at least 1");
    }
    if job.output.curve_points < 2 {
        anyhow::bail!("[output] curve_points must be at least 2");
    }
    if job.data.offset.is_some() && job.data.mode != DataMode::ZeroOrderCorrect {
        log::warn!("[data] offset is ignored unless mode = \"zero-order-correct\"");
    }
    Ok((params, variant))
}

/// Run the full pipeline: read, normalise, seed, fit, diagnose.
pub fn run_fit(job: &JobConfig, data_file: &Path) -> Result<FitOutput> {
    let (params, variant) = validate_job(job)?;
    let mode = job.data.normalization_mode();

    let raw = read_scan_file(data_file)
        .with_context(|| format!("Failed to load scan {}", data_file.display()))?;
    println!("  Scan: {} points from {}", raw.len(), data_file.display());

    let (scan, max_efficiency) =
        normalize(&raw, mode).context("Failed to normalise scan")?;
    println!(
        "  Peak: DE_max = {:.4} at {:.3}° ({} normalisation)",
        max_efficiency,
        scan.peak_angle_deg(),
        mode.label()
    );

    let thickness = job.fit.thickness;
    let estimate = analytical_estimate(max_efficiency.clamp(0.0, 1.0), thickness, &params).ok();

    let bounds = job.fit.bounds(variant);
    let modulation = match job.fit.modulation {
        Some(m) => m,
        None => {
            let seed = seed_modulation(&params, variant, max_efficiency, thickness, estimate)?;
            let seed = bounds.clamp([seed, thickness])[0];
            println!("  Seed modulation from peak efficiency: {:.4e}", seed);
            seed
        }
    };

    let options = FitOptions {
        max_iterations: job.fit.max_iterations,
        ..FitOptions::default()
    };
    let result = fit(
        &scan,
        &params,
        variant,
        FitGuess::new(modulation, thickness),
        bounds,
        &options,
    )
    .context("Curve fit failed")?;

    let diagnostics = result.diagnostics(&params);
    let bandwidth = angular_bandwidth(&scan);

    Ok(FitOutput {
        params,
        mode,
        data_file: data_file.to_path_buf(),
        scan,
        max_efficiency,
        estimate,
        result,
        diagnostics,
        bandwidth,
    })
}

/// Starting modulation reproducing the measured peak at the guessed
/// thickness.
fn seed_modulation(
    params: &GratingParameters,
    variant: ModelVariant,
    max_efficiency: f64,
    thickness: f64,
    estimate: Option<AnalyticalEstimate>,
) -> Result<f64> {
    match variant {
        ModelVariant::LosslessPhase => estimate.map(|e| e.modulation).context(
            "Cannot estimate an initial modulation; set [fit] modulation explicitly",
        ),
        ModelVariant::AbsorptionGrating => {
            // η(0) = A·sinh²(ν) with ν = α₁T/(2cosθ_B)
            let attenuation = AbsorptionGrating::new(*params).attenuation(thickness);
            let nu = (max_efficiency.max(0.0) / attenuation).sqrt().asinh();
            Ok(2.0 * nu * params.bragg_angle().cos() / thickness)
        }
    }
}

/// Print the fit summary to stdout.
pub fn print_summary(output: &FitOutput) {
    let r = &output.result;
    let d = &output.diagnostics;
    println!();
    println!("Fit ({}, {} points, {} iterations)", r.variant.label(), r.points, r.iterations);
    println!("  Bragg angle:        {:.4}° (internal)", output.params.bragg_angle().to_degrees());
    println!("  Modulation:         {:.6e} ± {:.2e}", r.modulation, r.modulation_stderr);
    println!("  Thickness:          {:.4} ± {:.2e} µm", r.thickness, r.thickness_stderr);
    println!("  Correlation:        {:+.4}", r.correlation[0][1]);
    println!("  SSR:                {:.4e}", r.residual_sum_squares);
    println!("  R²:                 {:.6}", r.r_squared);
    println!("  ν:                  {:.4}", d.phase_parameter);
    println!("  Q (Cook-Klein):     {:.3} → {}", d.cook_klein, d.regime.label());
    println!("  ρ (Moharam-Young):  {:.3}", d.moharam_young);
    if let Some(e) = &output.estimate {
        println!(
            "  Peak estimate:      ν_a = {:.4}, modulation_a = {:.4e} at T = {} µm",
            e.phase_parameter, e.modulation, e.thickness
        );
    }
    match &output.bandwidth {
        Some(bw) => println!(
            "  FWHM (measured):    {:.4}° [{:.4}°, {:.4}°]",
            bw.fwhm_deg, bw.lower_deg, bw.upper_deg
        ),
        None => println!("  FWHM (measured):    not resolved by the scan"),
    }
}

/// Evenly spaced detuning grid over `range`.
pub fn angle_grid(range: [f64; 2], points: usize) -> Vec<f64> {
    let [start, end] = range;
    (0..points)
        .map(|i| start + (end - start) * i as f64 / (points - 1).max(1) as f64)
        .collect()
}

/// Range of the dense model curve for a fit.
fn curve_range(output: &FitOutput, job: &JobConfig) -> [f64; 2] {
    job.output.curve_range.unwrap_or_else(|| {
        let angles = output.scan.angles_deg();
        let lo = angles.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = angles.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        [lo, hi]
    })
}

fn create_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))
}

fn write_metadata(file: &mut std::fs::File, title: &str, output: &FitOutput) -> Result<()> {
    let p = &output.params;
    let r = &output.result;
    writeln!(file, "# Holofit — {}", title)?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(file, "# data: {}", output.data_file.display())?;
    writeln!(
        file,
        "# grating: spatial_frequency={} l/um, wavelength_air={} um, film_index={}",
        p.spatial_frequency(),
        p.wavelength_air(),
        p.film_index()
    )?;
    if let Some(alpha0) = p.film_absorption() {
        writeln!(file, "# film_absorption: {} 1/um", alpha0)?;
    }
    writeln!(file, "# normalisation: {}", output.mode.label())?;
    writeln!(file, "# peak_angle_deg: {}", output.scan.peak_angle_deg())?;
    writeln!(
        file,
        "# fit: variant={}, modulation={:.6e}, thickness={:.6} um",
        r.variant.label(),
        r.modulation,
        r.thickness
    )?;
    writeln!(file, "#")?;
    Ok(())
}

/// Write measured and fitted efficiencies at the scan angles.
pub fn write_fit_csv(output: &FitOutput, path: &Path) -> Result<()> {
    let mut file = create_file(path)?;
    write_metadata(&mut file, "Measured vs Fitted Efficiency", output)?;
    writeln!(file, "detuning_deg,measured,fitted,residual")?;

    let fitted = output.result.fitted_curve(output.scan.angles_deg(), &output.params);
    for ((angle, measured), model) in output.scan.points().zip(fitted) {
        writeln!(
            file,
            "{:.6},{:.6e},{:.6e},{:.6e}",
            angle,
            measured,
            model,
            model - measured
        )?;
    }

    println!("Fit curve written to: {}", path.display());
    Ok(())
}

/// Write the fitted model on a dense angle grid.
pub fn write_model_curve_csv(output: &FitOutput, path: &Path, job: &JobConfig) -> Result<()> {
    let mut file = create_file(path)?;
    write_metadata(&mut file, "Fitted Model Curve", output)?;
    writeln!(file, "detuning_deg,efficiency")?;

    let angles = angle_grid(curve_range(output, job), job.output.curve_points);
    let curve = output.result.fitted_curve(&angles, &output.params);
    for (angle, eta) in angles.iter().zip(curve) {
        writeln!(file, "{:.6},{:.6e}", angle, eta)?;
    }

    println!("Model curve written to: {}", path.display());
    Ok(())
}

#[derive(Serialize)]
struct FitReport<'a> {
    data_file: String,
    grating: &'a GratingParameters,
    normalisation: &'a NormalizationMode,
    peak_angle_deg: f64,
    max_efficiency: f64,
    result: &'a FitResult,
    diagnostics: &'a Diagnostics,
    analytical_estimate: Option<&'a AnalyticalEstimate>,
    bandwidth: Option<&'a Bandwidth>,
}

/// Write the fit result and diagnostics to a JSON file.
pub fn write_result_json(output: &FitOutput, path: &Path) -> Result<()> {
    let report = FitReport {
        data_file: output.data_file.display().to_string(),
        grating: &output.params,
        normalisation: &output.mode,
        peak_angle_deg: output.scan.peak_angle_deg(),
        max_efficiency: output.max_efficiency,
        result: &output.result,
        diagnostics: &output.diagnostics,
        analytical_estimate: output.estimate.as_ref(),
        bandwidth: output.bandwidth.as_ref(),
    };
    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| anyhow::anyhow!("JSON serialisation error: {}", e))?;
    let mut file = create_file(path)?;
    file.write_all(json.as_bytes())?;

    println!("Fit result (JSON) written to: {}", path.display());
    Ok(())
}

/// Evaluate the forward model for given parameters over the configured range.
pub fn run_predict(job: &JobConfig, modulation: f64, thickness: f64) -> Result<Vec<(f64, f64)>> {
    let params = grating_parameters(job)?;
    let variant = resolve_variant(job, &params);
    if !modulation.is_finite() || modulation < 0.0 {
        anyhow::bail!("Modulation must be finite and non-negative, got {}", modulation);
    }
    if !thickness.is_finite() || thickness <= 0.0 {
        anyhow::bail!("Thickness must be positive, got {}", thickness);
    }
    let range = job.output.curve_range.unwrap_or(DEFAULT_PREDICT_RANGE);
    let angles = angle_grid(range, job.output.curve_points.max(2));
    let eta = predict_efficiency(&angles, modulation, thickness, &params, variant);
    log::debug!(
        "Predicted {} points with {} (modulation={}, thickness={})",
        angles.len(),
        variant.label(),
        modulation,
        thickness
    );
    Ok(angles.into_iter().zip(eta).collect())
}
