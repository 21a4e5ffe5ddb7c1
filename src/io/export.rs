//! Result persistence: the plain-text FWHM report and the JSON export.
//!
//! The text report is all-or-nothing. If any axis lacks a physical FWHM, the
//! file is not created.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::domain::{Axis, PixelSize, ProfileFit, VolumeFit};
use crate::error::{AppError, EXIT_DATA, EXIT_IO};
use crate::report::format_report_lines;

pub const PROFILE_REPORT_FILE: &str = "fwhm_1d_results.txt";
pub const VOLUME_REPORT_FILE: &str = "fwhm_3d_results.txt";

/// Write `fwhm_x/y/z = <µm>` lines to `dir/file_name`.
pub fn write_fwhm_report(
    dir: &Path,
    file_name: &str,
    fwhm_um: [Option<f64>; 3],
) -> Result<PathBuf, AppError> {
    let mut values = [0.0; 3];
    for axis in Axis::ALL {
        values[axis.index()] = fwhm_um[axis.index()].ok_or_else(|| {
            AppError::new(
                EXIT_DATA,
                format!("FWHM in microns is unavailable for axis {axis} (uncalibrated); report not written."),
            )
        })?;
    }

    let path = dir.join(file_name);
    let mut file = File::create(&path)
        .map_err(|e| AppError::new(EXIT_IO, format!("Failed to create report '{}': {e}", path.display())))?;
    for line in format_report_lines(values) {
        writeln!(file, "{line}")
            .map_err(|e| AppError::new(EXIT_IO, format!("Failed to write report: {e}")))?;
    }

    log::info!("Saved {}", path.display());
    Ok(path)
}

/// One axis of a profile export.
#[derive(Debug, Clone, Serialize)]
pub struct AxisExport<'a> {
    pub axis: Axis,
    pub fit: &'a ProfileFit,
}

/// Full profile-pipeline results.
#[derive(Debug, Clone, Serialize)]
pub struct ProfilesExport<'a> {
    pub tool: &'static str,
    pub pipeline: &'static str,
    pub generated_at: String,
    pub pixel_size_um: Option<PixelSize>,
    pub axes: Vec<AxisExport<'a>>,
}

/// Full volume-pipeline results.
#[derive(Debug, Clone, Serialize)]
pub struct VolumeExport<'a> {
    pub tool: &'static str,
    pub pipeline: &'static str,
    pub generated_at: String,
    pub pixel_size_um: PixelSize,
    /// `(Z, Y, X)`.
    pub shape: [usize; 3],
    pub fit: &'a VolumeFit,
}

impl<'a> ProfilesExport<'a> {
    pub fn new(pixel_size_um: Option<PixelSize>, fits: &'a [(Axis, ProfileFit)]) -> Self {
        Self {
            tool: "psf",
            pipeline: "profiles",
            generated_at: chrono::Local::now().to_rfc3339(),
            pixel_size_um,
            axes: fits.iter().map(|(axis, fit)| AxisExport { axis: *axis, fit }).collect(),
        }
    }
}

impl<'a> VolumeExport<'a> {
    pub fn new(pixel_size_um: PixelSize, shape: [usize; 3], fit: &'a VolumeFit) -> Self {
        Self {
            tool: "psf",
            pipeline: "volume",
            generated_at: chrono::Local::now().to_rfc3339(),
            pixel_size_um,
            shape,
            fit,
        }
    }
}

/// Write any export as pretty JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            AppError::new(EXIT_IO, format!("Failed to create '{}': {e}", parent.display()))
        })?;
    }
    let file = File::create(path)
        .map_err(|e| AppError::new(EXIT_IO, format!("Failed to create JSON export '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, value)
        .map_err(|e| AppError::new(EXIT_IO, format!("Failed to write JSON export: {e}")))?;
    log::info!("Saved {}", path.display());
    Ok(())
}
