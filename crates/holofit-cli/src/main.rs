//! Holofit command-line interface.
//!
//! Fit Kogelnik curves to measured angular scans from TOML job files:
//! ```sh
//! holofit fit job.toml
//! holofit validate job.toml
//! holofit predict job.toml --modulation 0.01 --thickness 20
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "holofit")]
#[command(about = "Holofit: Kogelnik coupled-wave fits of volume grating scans")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a measured scan described by a TOML job file.
    Fit {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Scan table (overrides the job's data.file).
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Validate a job file without fitting.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// Print the forward model for given parameters.
    Predict {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Index modulation n₁, or absorption modulation α₁ (1/µm).
        #[arg(long)]
        modulation: f64,
        /// Film thickness (µm).
        #[arg(long)]
        thickness: f64,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Fit {
            config,
            output,
            data,
        } => {
            println!("Holofit Kogelnik Fit");
            println!("====================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let data_file = runner::resolve_data_path(&job, &config, data.as_deref());
            let result = runner::run_fit(&job, &data_file)?;
            runner::print_summary(&result);
            println!();

            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));

            // CSV curves (default on)
            if job.output.save_curve {
                runner::write_fit_csv(&result, &out_dir.join("fit_curve.csv"))?;
                runner::write_model_curve_csv(&result, &out_dir.join("model_curve.csv"), &job)?;
            }

            // JSON result (optional)
            if job.output.save_json {
                runner::write_result_json(&result, &out_dir.join("fit_result.json"))?;
            }

            println!("Fit complete.");
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            let (params, variant) = runner::validate_job(&job)?;
            println!("Configuration is valid: {}", config.display());
            println!(
                "  Bragg angle: {:.4}° (internal), period {:.4} µm",
                params.bragg_angle().to_degrees(),
                params.period()
            );
            println!("  Model: {}", variant.label());
            let data_file = runner::resolve_data_path(&job, &config, None);
            if !data_file.exists() {
                log::warn!("Scan file {} does not exist yet", data_file.display());
            }
            Ok(())
        }
        Commands::Predict {
            config,
            modulation,
            thickness,
        } => {
            let job = config::load_config(&config)?;
            let curve = runner::run_predict(&job, modulation, thickness)?;
            println!("detuning_deg,efficiency");
            for (angle, eta) in curve {
                println!("{:.6},{:.6e}", angle, eta);
            }
            Ok(())
        }
    }
}
