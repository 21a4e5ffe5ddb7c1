//! The two fitting pipelines, without any printing or file output.
//!
//! ```text
//! profiles: calibration (optional) -> read X/Y/Z profiles -> 3 parallel 1D fits
//! volume:   read volume -> calibration (required) -> one 3D fit -> planes
//! ```
//!
//! `app` handles presentation; tests drive these functions directly.

use std::path::PathBuf;

use rayon::prelude::*;

use crate::domain::{Axis, PixelSize, ProfileFit, ProfileFitConfig, Volume3D, VolumeFit, VolumeFitConfig};
use crate::error::{AppError, CalibrationError};
use crate::fit::{fit_profile, fit_volume};
use crate::io::{profile_path, read_pixel_size, read_profile, read_volume, sidecar_path};
use crate::report::planes::{PlanePair, extract_planes};

/// Where pixel sizes come from.
#[derive(Debug, Clone)]
pub struct CalibrationSource {
    /// Volume the metadata belongs to.
    pub volume: PathBuf,
    /// Explicit sidecar; defaults to `sidecar_path(volume)`.
    pub metadata: Option<PathBuf>,
    /// Pixel size in µm as `(x, y, z)`; bypasses the metadata entirely.
    pub pixel_size: Option<[f64; 3]>,
}

impl CalibrationSource {
    pub fn resolve(&self) -> Result<PixelSize, CalibrationError> {
        if let Some([x, y, z]) = self.pixel_size {
            log::info!("Pixel size from command line: x={x} y={y} z={z} µm");
            return PixelSize::new(x, y, z);
        }
        let path = self
            .metadata
            .clone()
            .unwrap_or_else(|| sidecar_path(&self.volume));
        read_pixel_size(&path)
    }
}

/// Profile file layout.
#[derive(Debug, Clone)]
pub struct ProfileSource {
    pub dir: PathBuf,
    pub pattern: String,
    pub skip_rows: usize,
}

/// Outputs of the profile pipeline.
#[derive(Debug, Clone)]
pub struct ProfilesRun {
    /// `None` when calibration failed; fits are then pixel-only.
    pub pixel_size: Option<PixelSize>,
    /// X, Y, Z order.
    pub fits: Vec<(Axis, ProfileFit)>,
}

impl ProfilesRun {
    /// Per-axis FWHM in microns, `None` for uncalibrated axes.
    pub fn fwhm_um(&self) -> [Option<f64>; 3] {
        let mut out = [None; 3];
        for (axis, fit) in &self.fits {
            out[axis.index()] = fit.fwhm.microns;
        }
        out
    }
}

/// Outputs of the volume pipeline.
#[derive(Debug, Clone)]
pub struct VolumeRun {
    pub pixel_size: PixelSize,
    pub volume: Volume3D,
    pub fit: VolumeFit,
    pub planes: Vec<PlanePair>,
}

/// Fit the three line profiles.
///
/// A calibration failure is logged and the fits continue in pixel units; any
/// axis failure stops the run with the axis named in the error.
pub fn run_profiles(
    calibration: &CalibrationSource,
    profiles: &ProfileSource,
    config: &ProfileFitConfig,
) -> Result<ProfilesRun, AppError> {
    let pixel_size = match calibration.resolve() {
        Ok(px) => Some(px),
        Err(e) => {
            log::warn!("calibration failed, reporting FWHM in pixels only: {e}");
            None
        }
    };

    let results: Vec<Result<(Axis, ProfileFit), AppError>> = Axis::ALL
        .par_iter()
        .map(|&axis| fit_axis(axis, profiles, pixel_size, config))
        .collect();
    let fits = results.into_iter().collect::<Result<Vec<_>, _>>()?;

    Ok(ProfilesRun { pixel_size, fits })
}

fn fit_axis(
    axis: Axis,
    source: &ProfileSource,
    pixel_size: Option<PixelSize>,
    config: &ProfileFitConfig,
) -> Result<(Axis, ProfileFit), AppError> {
    let stage = format!("axis {axis} fit");
    let path = profile_path(&source.dir, &source.pattern, axis);
    log::info!("Fitting axis {axis} from {}", path.display());

    let profile = read_profile(&path, source.skip_rows).map_err(|e| AppError::at_stage(&stage, e))?;
    let fit = fit_profile(&profile, pixel_size.map(|px| px.get(axis)), config)
        .map_err(|e| AppError::at_stage(&stage, e))?;
    Ok((axis, fit))
}

/// Fit the whole volume. Calibration is mandatory here.
pub fn run_volume(calibration: &CalibrationSource, config: &VolumeFitConfig) -> Result<VolumeRun, AppError> {
    let volume = read_volume(&calibration.volume).map_err(|e| AppError::at_stage("volume load", e))?;
    let pixel_size = calibration
        .resolve()
        .map_err(|e| AppError::at_stage("calibration", e))?;

    let fit = fit_volume(&volume, &pixel_size, config).map_err(|e| AppError::at_stage("volume fit", e))?;
    let planes = extract_planes(&volume, &fit.params);

    Ok(VolumeRun {
        pixel_size,
        volume,
        fit,
        planes,
    })
}
