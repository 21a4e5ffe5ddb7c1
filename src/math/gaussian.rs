//! Gaussian model evaluation and FWHM conversions.
//!
//! The models are:
//!
//! - 1D: `g(x) = a · exp(-(x - x0)² / 2σ²) [+ b]`
//! - 3D: `g(x,y,z) = a · exp(-Σ (u - u0)² / 2σ_u²) + b`
//!
//! Numerical notes:
//! - `σ` enters the model squared, so the optimizer may legitimately land on a
//!   negative sigma. Widths are always reported from `|σ|`.
//! - Inside the 3D model `σ` is floored at `SIGMA_FLOOR` so a parameter sitting
//!   on its zero bound does not divide by zero.

use crate::domain::{GaussianParams1D, GaussianParams3D};

/// FWHM / σ ratio for a Gaussian (≈ 2√(2 ln 2)).
pub const FWHM_PER_SIGMA: f64 = 2.355;

/// Metadata distances are stored in meters.
pub const METERS_TO_MICRONS: f64 = 1e6;

/// Assumed physical PSF width (µm) used to seed the 3D sigma guess.
pub const DEFAULT_PSF_PRIOR_UM: f64 = 10.0;

/// Default starting sigma (pixels) for profile fits.
pub const DEFAULT_INITIAL_SIGMA_PX: f64 = 1.0;

/// Evaluation cap for the volume fit.
pub const DEFAULT_VOLUME_MAX_EVALUATIONS: usize = 5000;

/// Smallest sigma the 3D model evaluates with.
pub const SIGMA_FLOOR: f64 = 1e-6;

pub fn fwhm_from_sigma(sigma: f64) -> f64 {
    FWHM_PER_SIGMA * sigma.abs()
}

pub fn sigma_from_fwhm(fwhm: f64) -> f64 {
    fwhm / FWHM_PER_SIGMA
}

/// Convert a pixel-space length to microns.
pub fn to_microns(pixels: f64, pixel_size_um: f64) -> f64 {
    pixels * pixel_size_um
}

/// Convert a micron length to pixels.
pub fn to_pixels(microns: f64, pixel_size_um: f64) -> f64 {
    microns / pixel_size_um
}

/// Evaluate the 1D model.
pub fn gaussian_1d(x: f64, p: &GaussianParams1D) -> f64 {
    let d = x - p.center;
    p.amplitude * (-(d * d) / (2.0 * p.sigma * p.sigma)).exp() + p.offset.unwrap_or(0.0)
}

/// Evaluate the 3D model at `(x, y, z)`.
pub fn gaussian_3d(x: f64, y: f64, z: f64, p: &GaussianParams3D) -> f64 {
    let q = quad_term(x, p.center[0], p.sigma[0])
        + quad_term(y, p.center[1], p.sigma[1])
        + quad_term(z, p.center[2], p.sigma[2]);
    p.amplitude * (-q).exp() + p.offset
}

/// `(u - u0)² / 2σ²` with the sigma floor applied.
pub fn quad_term(u: f64, u0: f64, sigma: f64) -> f64 {
    let s = sigma.abs().max(SIGMA_FLOOR);
    let d = u - u0;
    d * d / (2.0 * s * s)
}
