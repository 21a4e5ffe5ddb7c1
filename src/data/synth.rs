//! Synthetic bead acquisitions.
//!
//! A single anisotropic Gaussian bead on a flat background, with optional
//! additive Gaussian noise, plus the three line profiles through the voxel
//! nearest to the bead centre. Written in the same formats the pipelines read,
//! so it doubles as demo input and end-to-end test fixture.

use std::path::{Path, PathBuf};

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Axis, GaussianParams3D, PixelSize, Profile1D, Volume3D};
use crate::error::{AppError, EXIT_IO};
use crate::io::{
    DEFAULT_PROFILE_PATTERN, profile_path, sidecar_path, write_metadata, write_profile, write_volume,
};
use crate::math::gaussian::gaussian_3d;
use crate::report::planes::slice_index;

pub const SYNTH_VOLUME_FILE: &str = "volume.npy";

/// Generator settings. Triples are `(x, y, z)` except `shape`, which is `(Z, Y, X)`.
#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub shape: [usize; 3],
    /// Bead centre in pixels; `None` centres it in the volume.
    pub center: Option<[f64; 3]>,
    pub sigma_px: [f64; 3],
    pub amplitude: f64,
    pub offset: f64,
    /// Voxel size in µm.
    pub pixel_size_um: [f64; 3],
    /// Standard deviation of the additive noise.
    pub noise: f64,
    pub seed: u64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            shape: [24, 48, 48],
            center: None,
            sigma_px: [2.0, 2.0, 1.5],
            amplitude: 1000.0,
            offset: 100.0,
            pixel_size_um: [0.1, 0.1, 0.3],
            noise: 5.0,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthData {
    pub truth: GaussianParams3D,
    pub pixel_size: PixelSize,
    pub volume: Volume3D,
    /// X, Y, Z order.
    pub profiles: [Profile1D; 3],
}

pub fn generate_synth(config: &SynthConfig) -> Result<SynthData, AppError> {
    if config.shape.iter().any(|&n| n == 0) {
        return Err(AppError::new(EXIT_IO, "Synthetic volume extents must be > 0."));
    }
    if config.sigma_px.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
        return Err(AppError::new(EXIT_IO, "Synthetic bead sigmas must be positive."));
    }
    if !(config.amplitude.is_finite() && config.amplitude > 0.0 && config.offset.is_finite()) {
        return Err(AppError::new(EXIT_IO, "Invalid synthetic amplitude/offset."));
    }
    let [sx, sy, sz] = config.pixel_size_um;
    let pixel_size = PixelSize::new(sx, sy, sz).map_err(|e| AppError::new(EXIT_IO, e.to_string()))?;

    let [nz, ny, nx] = config.shape;
    let center = config.center.unwrap_or([
        (nx as f64 - 1.0) / 2.0,
        (ny as f64 - 1.0) / 2.0,
        (nz as f64 - 1.0) / 2.0,
    ]);
    let truth = GaussianParams3D {
        amplitude: config.amplitude,
        center,
        sigma: config.sigma_px,
        offset: config.offset,
    };

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, config.noise)
        .map_err(|e| AppError::new(EXIT_IO, format!("Noise distribution error: {e}")))?;

    let volume = Volume3D::from_fn(config.shape, |x, y, z| {
        gaussian_3d(x as f64, y as f64, z as f64, &truth) + normal.sample(&mut rng)
    });

    let (cx, cy, cz) = (
        slice_index(center[0], nx),
        slice_index(center[1], ny),
        slice_index(center[2], nz),
    );
    let line = |n: usize, at: &dyn Fn(usize) -> f64| {
        Profile1D::from_samples((0..n).map(|i| (Some(i as f64), Some(at(i)))))
    };
    let profiles = [
        line(nx, &|i| volume.get(cz, cy, i)),
        line(ny, &|i| volume.get(cz, i, cx)),
        line(nz, &|i| volume.get(i, cy, cx)),
    ];

    Ok(SynthData {
        truth,
        pixel_size,
        volume,
        profiles,
    })
}

/// Write `volume.npy`, `volume.json` and `profile_{X,Y,Z}.csv` into `dir`.
pub fn write_synth(dir: &Path, data: &SynthData) -> Result<Vec<PathBuf>, AppError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::new(EXIT_IO, format!("Failed to create '{}': {e}", dir.display())))?;

    let volume_path = dir.join(SYNTH_VOLUME_FILE);
    write_volume(&volume_path, &data.volume)?;
    let metadata_path = sidecar_path(&volume_path);
    write_metadata(&metadata_path, &data.pixel_size)?;

    let mut written = vec![volume_path, metadata_path];
    for axis in Axis::ALL {
        let path = profile_path(dir, DEFAULT_PROFILE_PATTERN, axis);
        write_profile(&path, &data.profiles[axis.index()], &format!("Synthetic profile {axis}"))?;
        written.push(path);
    }
    Ok(written)
}
