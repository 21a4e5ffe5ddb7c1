//! Command-line parsing for the PSF FWHM estimator.
//!
//! Argument parsing and command dispatch stay separate from the fitting code;
//! `app` folds these structs into `ProfileFitConfig` / `VolumeFitConfig`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::ProfileModelKind;
use crate::io::{DEFAULT_PROFILE_PATTERN, DEFAULT_SKIP_ROWS};
use crate::math::gaussian::{DEFAULT_INITIAL_SIGMA_PX, DEFAULT_PSF_PRIOR_UM};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "psf", version, about = "Microscope PSF FWHM estimation from bead images")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit 1D Gaussians to pre-extracted X/Y/Z line profiles.
    Profiles(ProfilesArgs),
    /// Fit one anisotropic 3D Gaussian to the whole volume.
    Volume(VolumeArgs),
    /// Write a synthetic bead volume, metadata and profiles.
    Synth(SynthArgs),
}

/// Input volume and calibration options shared by both pipelines.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// Volume as a `.npy` array of shape (Z, Y, X).
    pub volume: PathBuf,

    /// Metadata JSON sidecar (defaults to the volume path with a `.json` extension).
    #[arg(long, value_name = "JSON")]
    pub metadata: Option<PathBuf>,

    /// Pixel size in µm as X,Y,Z; overrides the metadata.
    #[arg(long, value_name = "X,Y,Z", value_parser = parse_triple::<f64>)]
    pub pixel_size: Option<[f64; 3]>,
}

/// Optimizer limits shared by both pipelines.
#[derive(Debug, Args, Clone)]
pub struct SolverArgs {
    /// Maximum residual evaluations (default depends on the pipeline).
    #[arg(long)]
    pub max_evaluations: Option<usize>,

    /// Relative cost-reduction tolerance.
    #[arg(long)]
    pub ftol: Option<f64>,

    /// Relative step tolerance.
    #[arg(long)]
    pub xtol: Option<f64>,

    /// Gradient orthogonality tolerance.
    #[arg(long)]
    pub gtol: Option<f64>,

    /// Wall-clock limit for each fit, in seconds.
    #[arg(long, value_name = "SECS")]
    pub time_budget: Option<f64>,
}

/// Output options shared by both pipelines.
#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Also write the full fit results as JSON.
    #[arg(long, value_name = "PATH")]
    pub export_json: Option<PathBuf>,

    /// Skip the PNG overlays.
    #[arg(long)]
    pub no_plot: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ProfilesArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Directory holding the profile files.
    pub profile_dir: PathBuf,

    /// Directory for the report and overlays.
    pub output_dir: PathBuf,

    /// Profile file name pattern; `{axis}` becomes X, Y or Z.
    #[arg(long, default_value = DEFAULT_PROFILE_PATTERN)]
    pub pattern: String,

    /// Preamble lines to skip in each profile file.
    #[arg(long, default_value_t = DEFAULT_SKIP_ROWS)]
    pub skip_rows: usize,

    /// Profile model.
    #[arg(long, value_enum, default_value_t = ProfileModelKind::Plain)]
    pub model: ProfileModelKind,

    /// Initial sigma guess in pixels.
    #[arg(long, default_value_t = DEFAULT_INITIAL_SIGMA_PX)]
    pub initial_sigma: f64,

    #[command(flatten)]
    pub solver: SolverArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args, Clone)]
pub struct VolumeArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Directory for the report and overlays.
    pub output_dir: PathBuf,

    /// Expected PSF width in µm, used to seed the sigmas.
    #[arg(long, default_value_t = DEFAULT_PSF_PRIOR_UM)]
    pub psf_prior_um: f64,

    #[command(flatten)]
    pub solver: SolverArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    /// Directory to write volume.npy, volume.json and profile_{X,Y,Z}.csv into.
    pub output_dir: PathBuf,

    /// Volume extents as Z,Y,X.
    #[arg(long, value_name = "Z,Y,X", value_parser = parse_triple::<usize>, default_value = "24,48,48")]
    pub shape: [usize; 3],

    /// Bead centre in pixels as X,Y,Z (defaults to the volume centre).
    #[arg(long, value_name = "X,Y,Z", value_parser = parse_triple::<f64>)]
    pub center: Option<[f64; 3]>,

    /// Bead sigma in pixels as X,Y,Z.
    #[arg(long, value_name = "X,Y,Z", value_parser = parse_triple::<f64>, default_value = "2,2,1.5")]
    pub sigma: [f64; 3],

    #[arg(long, default_value_t = 1000.0)]
    pub amplitude: f64,

    /// Constant background.
    #[arg(long, default_value_t = 100.0)]
    pub offset: f64,

    /// Voxel size in µm as X,Y,Z.
    #[arg(long, value_name = "X,Y,Z", value_parser = parse_triple::<f64>, default_value = "0.1,0.1,0.3")]
    pub pixel_size: [f64; 3],

    /// Standard deviation of additive Gaussian noise.
    #[arg(long, default_value_t = 5.0)]
    pub noise: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Parse `a,b,c` into a triple.
pub fn parse_triple<T: std::str::FromStr>(s: &str) -> Result<[T; 3], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [a, b, c] = parts.as_slice() else {
        return Err(format!("expected three comma-separated values, got '{s}'"));
    };
    let parse = |v: &str| v.parse::<T>().map_err(|_| format!("invalid value '{v}' in '{s}'"));
    Ok([parse(a)?, parse(b)?, parse(c)?])
}
