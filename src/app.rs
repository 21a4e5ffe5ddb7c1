//! Top-level application orchestration.
//!
//! `src/main.rs` only sets up logging; this module is the "real main" that:
//! - parses CLI arguments
//! - runs the selected pipeline
//! - prints results
//! - writes the report, overlays and optional JSON export

use std::path::Path;
use std::time::Duration;

use clap::Parser;

use crate::cli::{Command, InputArgs, ProfilesArgs, SolverArgs, SynthArgs, VolumeArgs};
use crate::data::{SynthConfig, generate_synth, write_synth};
use crate::domain::{ProfileFitConfig, VolumeFitConfig};
use crate::error::{AppError, EXIT_IO};
use crate::io::{
    PROFILE_REPORT_FILE, ProfilesExport, VOLUME_REPORT_FILE, VolumeExport, write_fwhm_report, write_json,
};
use crate::math::gaussian::fwhm_from_sigma;
use crate::math::lm::SolverOptions;
use crate::plot::{PROFILE_FIGURE_FILE, write_plane_comparison, write_profiles_figure};
use crate::report::{format_profile_result, format_volume_result};

pub mod pipeline;

use pipeline::{CalibrationSource, ProfileSource};

/// Entry point for the `psf` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Profiles(args) => handle_profiles(&args),
        Command::Volume(args) => handle_volume(&args),
        Command::Synth(args) => handle_synth(&args),
    }
}

pub fn handle_profiles(args: &ProfilesArgs) -> Result<(), AppError> {
    let config = profile_config_from_args(args)?;
    let calibration = calibration_from_args(&args.input);
    let source = ProfileSource {
        dir: args.profile_dir.clone(),
        pattern: args.pattern.clone(),
        skip_rows: args.skip_rows,
    };

    let run = pipeline::run_profiles(&calibration, &source, &config)?;
    for (axis, fit) in &run.fits {
        print!("{}", format_profile_result(*axis, fit));
    }

    ensure_dir(&args.output_dir)?;
    if !args.output.no_plot {
        write_profiles_figure(&args.output_dir.join(PROFILE_FIGURE_FILE), &run.fits)
            .map_err(|e| AppError::at_stage("plot", e))?;
    }
    if let Some(path) = &args.output.export_json {
        write_json(path, &ProfilesExport::new(run.pixel_size, &run.fits))?;
    }

    let report = write_fwhm_report(&args.output_dir, PROFILE_REPORT_FILE, run.fwhm_um())
        .map_err(|e| AppError::at_stage("report", e))?;
    println!("FWHM results saved to {}", report.display());
    Ok(())
}

pub fn handle_volume(args: &VolumeArgs) -> Result<(), AppError> {
    let config = volume_config_from_args(args)?;
    let calibration = calibration_from_args(&args.input);

    let run = pipeline::run_volume(&calibration, &config)?;
    print!("{}", format_volume_result(&run.fit));

    ensure_dir(&args.output_dir)?;
    let fwhm_um = run.fit.fwhm_um.map(Some);
    let report = write_fwhm_report(&args.output_dir, VOLUME_REPORT_FILE, fwhm_um)
        .map_err(|e| AppError::at_stage("report", e))?;
    println!("FWHM results saved to {}", report.display());

    if !args.output.no_plot {
        for pair in &run.planes {
            write_plane_comparison(&args.output_dir.join(pair.kind.file_name()), pair)
                .map_err(|e| AppError::at_stage("plot", e))?;
        }
    }
    if let Some(path) = &args.output.export_json {
        write_json(path, &VolumeExport::new(run.pixel_size, run.volume.shape(), &run.fit))?;
    }
    Ok(())
}

pub fn handle_synth(args: &SynthArgs) -> Result<(), AppError> {
    let config = SynthConfig {
        shape: args.shape,
        center: args.center,
        sigma_px: args.sigma,
        amplitude: args.amplitude,
        offset: args.offset,
        pixel_size_um: args.pixel_size,
        noise: args.noise,
        seed: args.seed,
    };
    let data = generate_synth(&config)?;
    for path in write_synth(&args.output_dir, &data)? {
        println!("wrote {}", path.display());
    }

    let expected = data
        .truth
        .sigma
        .iter()
        .zip(data.pixel_size.as_array())
        .map(|(s, um)| format!("{:.3}", fwhm_from_sigma(*s) * um))
        .collect::<Vec<_>>()
        .join(", ");
    println!("Expected FWHM (x, y, z): {expected} microns");
    Ok(())
}

fn calibration_from_args(args: &InputArgs) -> CalibrationSource {
    CalibrationSource {
        volume: args.volume.clone(),
        metadata: args.metadata.clone(),
        pixel_size: args.pixel_size,
    }
}

pub fn profile_config_from_args(args: &ProfilesArgs) -> Result<ProfileFitConfig, AppError> {
    Ok(ProfileFitConfig {
        model: args.model,
        initial_sigma_px: args.initial_sigma,
        solver: solver_from_args(&args.solver, SolverOptions::default())?,
    })
}

pub fn volume_config_from_args(args: &VolumeArgs) -> Result<VolumeFitConfig, AppError> {
    let defaults = VolumeFitConfig::default();
    Ok(VolumeFitConfig {
        psf_prior_um: args.psf_prior_um,
        solver: solver_from_args(&args.solver, defaults.solver)?,
    })
}

/// Overlay command-line solver limits on pipeline defaults.
fn solver_from_args(args: &SolverArgs, defaults: SolverOptions) -> Result<SolverOptions, AppError> {
    let time_budget = match args.time_budget {
        Some(secs) => Some(
            Duration::try_from_secs_f64(secs)
                .map_err(|e| AppError::new(EXIT_IO, format!("Invalid --time-budget {secs}: {e}")))?,
        ),
        None => defaults.time_budget,
    };
    for (name, value) in [("ftol", args.ftol), ("xtol", args.xtol), ("gtol", args.gtol)] {
        if let Some(v) = value.filter(|v| !(v.is_finite() && *v >= 0.0)) {
            return Err(AppError::new(EXIT_IO, format!("--{name} must be >= 0, got {v}")));
        }
    }
    if args.max_evaluations == Some(0) {
        return Err(AppError::new(EXIT_IO, "--max-evaluations must be > 0."));
    }

    Ok(SolverOptions {
        max_evaluations: args.max_evaluations.or(defaults.max_evaluations),
        ftol: args.ftol.unwrap_or(defaults.ftol),
        xtol: args.xtol.unwrap_or(defaults.xtol),
        gtol: args.gtol.unwrap_or(defaults.gtol),
        time_budget,
    })
}

fn ensure_dir(dir: &Path) -> Result<(), AppError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::new(EXIT_IO, format!("Failed to create output directory '{}': {e}", dir.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::error::EXIT_DATA;

    fn parse(argv: &[&str]) -> Command {
        Cli::try_parse_from(argv).unwrap().command
    }

    fn synth_into(dir: &Path) {
        let out = dir.to_str().unwrap();
        let Command::Synth(args) = parse(&["psf", "synth", out, "--shape", "16,32,32", "--center", "15.3,16.2,7.8"])
        else {
            panic!("expected synth");
        };
        handle_synth(&args).unwrap();
    }

    #[test]
    fn profiles_command_writes_report_and_figure() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        synth_into(input.path());
        let volume = input.path().join("volume.npy");
        let json = output.path().join("fits.json");

        let Command::Profiles(args) = parse(&[
            "psf",
            "profiles",
            volume.to_str().unwrap(),
            input.path().to_str().unwrap(),
            output.path().to_str().unwrap(),
            "--model",
            "offset",
            "--export-json",
            json.to_str().unwrap(),
        ]) else {
            panic!("expected profiles");
        };
        handle_profiles(&args).unwrap();

        let report = std::fs::read_to_string(output.path().join(PROFILE_REPORT_FILE)).unwrap();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("fwhm_x = "), "{report}");
        assert!(lines[2].starts_with("fwhm_z = "), "{report}");
        assert!(output.path().join(PROFILE_FIGURE_FILE).exists());
        let exported: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap();
        assert_eq!(exported["axes"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn uncalibrated_profiles_fail_at_report_stage() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        synth_into(input.path());
        std::fs::remove_file(input.path().join("volume.json")).unwrap();

        let Command::Profiles(args) = parse(&[
            "psf",
            "profiles",
            input.path().join("volume.npy").to_str().unwrap(),
            input.path().to_str().unwrap(),
            output.path().to_str().unwrap(),
            "--no-plot",
        ]) else {
            panic!("expected profiles");
        };
        let err = handle_profiles(&args).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_DATA);
        assert!(err.message().starts_with("report failed"), "{}", err.message());
        assert!(!output.path().join(PROFILE_REPORT_FILE).exists());
    }

    #[test]
    fn volume_command_writes_report_and_planes() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        synth_into(input.path());

        let Command::Volume(args) = parse(&[
            "psf",
            "volume",
            input.path().join("volume.npy").to_str().unwrap(),
            output.path().to_str().unwrap(),
            "--psf-prior-um",
            "0.5",
        ]) else {
            panic!("expected volume");
        };
        handle_volume(&args).unwrap();

        let report = std::fs::read_to_string(output.path().join(VOLUME_REPORT_FILE)).unwrap();
        // sigma_x = 2 px at 0.1 µm: 0.471 µm.
        assert!(report.starts_with("fwhm_x = 0.47\n"), "{report}");
        for name in ["plane_XY.png", "plane_XZ.png", "plane_YZ.png"] {
            assert!(output.path().join(name).exists(), "{name}");
        }
    }

    #[test]
    fn solver_flags_override_defaults() {
        let Command::Volume(args) = parse(&[
            "psf",
            "volume",
            "v.npy",
            "out",
            "--ftol",
            "1e-6",
            "--time-budget",
            "2.5",
        ]) else {
            panic!("expected volume");
        };
        let config = volume_config_from_args(&args).unwrap();
        assert_eq!(config.solver.ftol, 1e-6);
        assert_eq!(config.solver.xtol, 1e-8);
        assert_eq!(config.solver.max_evaluations, Some(5000));
        assert_eq!(config.solver.time_budget, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn invalid_solver_flags_are_usage_errors() {
        let Command::Profiles(args) = parse(&[
            "psf",
            "profiles",
            "v.npy",
            "p",
            "out",
            "--time-budget=-1",
        ]) else {
            panic!("expected profiles");
        };
        let err = profile_config_from_args(&args).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_IO);
    }
}
