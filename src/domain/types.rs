//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON
//! - handed to the reporting/plotting code without copying sample arrays

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{CalibrationError, FitError};
use crate::math::gaussian::{
    DEFAULT_INITIAL_SIGMA_PX, DEFAULT_PSF_PRIOR_UM, DEFAULT_VOLUME_MAX_EVALUATIONS,
};
use crate::math::lm::SolverOptions;

/// Spatial axis of the image volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn label(self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        }
    }

    /// Position in `(x, y, z)` ordered triples.
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Physical voxel size in microns per pixel along X, Y and Z.
///
/// Either all three sizes are valid or there is no `PixelSize` at all; a
/// partially calibrated volume cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelSize {
    x: f64,
    y: f64,
    z: f64,
}

impl PixelSize {
    /// Build a pixel size from micron values, rejecting non-positive or non-finite ones.
    pub fn new(x: f64, y: f64, z: f64) -> Result<Self, CalibrationError> {
        for (axis, v) in Axis::ALL.iter().zip([x, y, z]) {
            if !(v.is_finite() && v > 0.0) {
                return Err(CalibrationError::InvalidValue {
                    path: format!("pixel_size.{}", axis.label().to_lowercase()),
                    value: v.to_string(),
                });
            }
        }
        Ok(Self { x, y, z })
    }

    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// `(x, y, z)` ordered array.
    pub fn as_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// One intensity profile along a single axis.
///
/// Positions are in pixel units. Samples with a missing or non-finite coordinate
/// are dropped at construction and counted in `dropped`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile1D {
    pub positions: Vec<f64>,
    pub intensities: Vec<f64>,
    pub dropped: usize,
}

impl Profile1D {
    pub fn from_samples<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = (Option<f64>, Option<f64>)>,
    {
        let mut profile = Profile1D::default();
        for sample in samples {
            match sample {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => {
                    profile.positions.push(x);
                    profile.intensities.push(y);
                }
                _ => profile.dropped += 1,
            }
        }
        profile
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Dense intensity volume indexed `(z, y, x)`, stored row-major (x fastest).
#[derive(Debug, Clone, PartialEq)]
pub struct Volume3D {
    shape: [usize; 3],
    data: Vec<f64>,
}

impl Volume3D {
    /// `shape` is `(Z, Y, X)`.
    pub fn new(shape: [usize; 3], data: Vec<f64>) -> Result<Self, FitError> {
        if shape.iter().any(|&n| n == 0) {
            return Err(FitError::InvalidInput(format!(
                "volume extents must be >= 1, got {shape:?}"
            )));
        }
        let expected = shape[0] * shape[1] * shape[2];
        if data.len() != expected {
            return Err(FitError::InvalidInput(format!(
                "volume shape {shape:?} needs {expected} values, got {}",
                data.len()
            )));
        }
        if let Some(bad) = data.iter().position(|v| !v.is_finite()) {
            return Err(FitError::InvalidInput(format!(
                "non-finite intensity at voxel {bad}"
            )));
        }
        Ok(Self { shape, data })
    }

    /// Build a volume by evaluating `f(x, y, z)` at every voxel.
    pub fn from_fn(shape: [usize; 3], mut f: impl FnMut(usize, usize, usize) -> f64) -> Self {
        let [nz, ny, nx] = shape;
        let mut data = Vec::with_capacity(nz * ny * nx);
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    data.push(f(x, y, z));
                }
            }
        }
        Self { shape, data }
    }

    /// `(Z, Y, X)` extents.
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn get(&self, z: usize, y: usize, x: usize) -> f64 {
        self.data[(z * self.shape[1] + y) * self.shape[2] + x]
    }

    /// Convert a flat index into `(z, y, x)`.
    pub fn unravel(&self, idx: usize) -> (usize, usize, usize) {
        let nx = self.shape[2];
        let ny = self.shape[1];
        (idx / (ny * nx), (idx / nx) % ny, idx % nx)
    }
}

/// Which 1D Gaussian model to fit to profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProfileModelKind {
    /// `a · exp(-(x - x0)² / 2σ²)`; assumes background-subtracted profiles.
    #[default]
    Plain,
    /// Same Gaussian plus a constant background term.
    Offset,
}

impl ProfileModelKind {
    pub fn param_count(self) -> usize {
        match self {
            ProfileModelKind::Plain => 3,
            ProfileModelKind::Offset => 4,
        }
    }
}

/// 1D Gaussian parameters (pixel units).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianParams1D {
    pub amplitude: f64,
    pub center: f64,
    pub sigma: f64,
    /// Constant background; `None` for the plain model.
    pub offset: Option<f64>,
}

/// Anisotropic 3D Gaussian parameters (pixel units).
///
/// `center` and `sigma` are `(x, y, z)` ordered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianParams3D {
    pub amplitude: f64,
    pub center: [f64; 3],
    pub sigma: [f64; 3],
    pub offset: f64,
}

impl GaussianParams3D {
    pub const LEN: usize = 8;

    /// Optimizer vector order: `(amp, x0, y0, z0, sx, sy, sz, offset)`.
    pub fn to_vec(&self) -> Vec<f64> {
        let [x0, y0, z0] = self.center;
        let [sx, sy, sz] = self.sigma;
        vec![self.amplitude, x0, y0, z0, sx, sy, sz, self.offset]
    }

    pub fn from_slice(p: &[f64]) -> Self {
        Self {
            amplitude: p[0],
            center: [p[1], p[2], p[3]],
            sigma: [p[4], p[5], p[6]],
            offset: p[7],
        }
    }
}

/// Full width at half maximum, in pixels and (when calibrated) microns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fwhm {
    pub pixels: f64,
    pub microns: Option<f64>,
}

/// How the optimizer finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Residuals are exactly zero.
    ExactFit,
    /// Relative cost reduction fell below `ftol`.
    Cost,
    /// Relative step size fell below `xtol`.
    Step,
    /// Gradient/residual cosine fell below `gtol`.
    Gradient,
}

/// Optimizer diagnostics attached to each fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveSummary {
    pub evaluations: usize,
    pub iterations: usize,
    /// `½ Σ r²` at the solution.
    pub cost: f64,
    pub rmse: f64,
    pub termination: Termination,
}

/// Result of fitting one profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileFit {
    pub params: GaussianParams1D,
    pub fwhm: Fwhm,
    pub positions: Vec<f64>,
    pub intensities: Vec<f64>,
    pub solve: SolveSummary,
}

/// Result of fitting a volume.
///
/// The volume itself is not copied in; callers that want to plot keep their own
/// `Volume3D` alongside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeFit {
    pub params: GaussianParams3D,
    /// `(x, y, z)` FWHM in pixels.
    pub fwhm_px: [f64; 3],
    /// `(x, y, z)` FWHM in microns.
    pub fwhm_um: [f64; 3],
    pub solve: SolveSummary,
}

impl VolumeFit {
    pub fn fwhm(&self, axis: Axis) -> Fwhm {
        Fwhm {
            pixels: self.fwhm_px[axis.index()],
            microns: Some(self.fwhm_um[axis.index()]),
        }
    }
}

/// Profile fitting configuration.
#[derive(Debug, Clone)]
pub struct ProfileFitConfig {
    pub model: ProfileModelKind,
    /// Initial sigma guess in pixels.
    pub initial_sigma_px: f64,
    pub solver: SolverOptions,
}

impl Default for ProfileFitConfig {
    fn default() -> Self {
        Self {
            model: ProfileModelKind::Plain,
            initial_sigma_px: DEFAULT_INITIAL_SIGMA_PX,
            solver: SolverOptions::default(),
        }
    }
}

/// Volume fitting configuration.
#[derive(Debug, Clone)]
pub struct VolumeFitConfig {
    /// Assumed physical PSF width (µm) used to seed the sigma guess.
    pub psf_prior_um: f64,
    pub solver: SolverOptions,
}

impl Default for VolumeFitConfig {
    fn default() -> Self {
        Self {
            psf_prior_um: DEFAULT_PSF_PRIOR_UM,
            solver: SolverOptions {
                max_evaluations: Some(DEFAULT_VOLUME_MAX_EVALUATIONS),
                ftol: 1e-8,
                xtol: 1e-8,
                gtol: 1e-8,
                time_budget: None,
            },
        }
    }
}
