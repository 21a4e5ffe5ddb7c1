//! Residual models for the 1D and 3D Gaussians.
//!
//! The solver relies on one primitive operation per sample: the residual
//! `model - observed` together with the model gradient with respect to the
//! parameters. These are implemented here for each model.
//!
//! Parameter order:
//! - profile: `(a, x0, σ)` or `(a, x0, σ, b)` for the offset variant
//! - volume: `(a, x0, y0, z0, σx, σy, σz, b)`

use crate::domain::{ProfileModelKind, Volume3D};
use crate::math::gaussian::SIGMA_FLOOR;
use crate::math::lm::ResidualModel;

/// 1D Gaussian over `(position, intensity)` samples.
pub struct ProfileModel<'a> {
    positions: &'a [f64],
    intensities: &'a [f64],
    kind: ProfileModelKind,
}

impl<'a> ProfileModel<'a> {
    /// # Panics
    /// Panics if `positions` and `intensities` differ in length.
    pub fn new(positions: &'a [f64], intensities: &'a [f64], kind: ProfileModelKind) -> Self {
        assert_eq!(positions.len(), intensities.len());
        Self {
            positions,
            intensities,
            kind,
        }
    }
}

impl ResidualModel for ProfileModel<'_> {
    fn n_params(&self) -> usize {
        self.kind.param_count()
    }

    fn n_samples(&self) -> usize {
        self.positions.len()
    }

    fn residual(&self, i: usize, p: &[f64], grad: Option<&mut [f64]>) -> f64 {
        let (a, x0, s) = (p[0], p[1], p[2]);
        let offset = match self.kind {
            ProfileModelKind::Plain => 0.0,
            ProfileModelKind::Offset => p[3],
        };
        let d = self.positions[i] - x0;
        let s2 = s * s;
        let e = (-(d * d) / (2.0 * s2)).exp();

        if let Some(g) = grad {
            g[0] = e;
            g[1] = a * e * d / s2;
            g[2] = a * e * d * d / (s2 * s);
            if self.kind == ProfileModelKind::Offset {
                g[3] = 1.0;
            }
        }

        a * e + offset - self.intensities[i]
    }
}

/// Anisotropic 3D Gaussian plus background over every voxel of a volume.
///
/// Voxel coordinates are derived from the flat index, so no coordinate grids
/// are allocated.
pub struct VolumeModel<'a> {
    volume: &'a Volume3D,
}

impl<'a> VolumeModel<'a> {
    pub fn new(volume: &'a Volume3D) -> Self {
        Self { volume }
    }
}

impl ResidualModel for VolumeModel<'_> {
    fn n_params(&self) -> usize {
        8
    }

    fn n_samples(&self) -> usize {
        self.volume.len()
    }

    fn residual(&self, i: usize, p: &[f64], grad: Option<&mut [f64]>) -> f64 {
        let (z, y, x) = self.volume.unravel(i);
        let coords = [x as f64, y as f64, z as f64];
        let amp = p[0];

        let mut d = [0.0; 3];
        let mut s = [0.0; 3];
        let mut q = 0.0;
        for axis in 0..3 {
            d[axis] = coords[axis] - p[1 + axis];
            s[axis] = p[4 + axis].abs().max(SIGMA_FLOOR);
            q += d[axis] * d[axis] / (2.0 * s[axis] * s[axis]);
        }
        let e = (-q).exp();

        if let Some(g) = grad {
            g[0] = e;
            for axis in 0..3 {
                let s2 = s[axis] * s[axis];
                g[1 + axis] = amp * e * d[axis] / s2;
                g[4 + axis] = amp * e * d[axis] * d[axis] / (s2 * s[axis]);
            }
            g[7] = 1.0;
        }

        amp * e + p[7] - self.volume.data()[i]
    }
}
