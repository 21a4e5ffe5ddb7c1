//! Orthogonal comparison planes through the fitted centre.
//!
//! Each plane pairs a slice of the measured volume with the fitted model
//! evaluated on the same grid. The slice index along the dropped axis is the
//! rounded fitted centre, clamped into the volume.

use crate::domain::{GaussianParams3D, Volume3D};
use crate::math::gaussian::gaussian_3d;
use crate::math::stats::min_max;

/// Which two axes a plane spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneKind {
    /// rows = Y, cols = X, fixed Z.
    XY,
    /// rows = Z, cols = X, fixed Y.
    XZ,
    /// rows = Z, cols = Y, fixed X.
    YZ,
}

impl PlaneKind {
    pub const ALL: [PlaneKind; 3] = [PlaneKind::XY, PlaneKind::XZ, PlaneKind::YZ];

    pub fn label(self) -> &'static str {
        match self {
            PlaneKind::XY => "XY",
            PlaneKind::XZ => "XZ",
            PlaneKind::YZ => "YZ",
        }
    }

    pub fn file_name(self) -> String {
        format!("plane_{}.png", self.label())
    }
}

/// Row-major 2D grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl Plane {
    fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Self { rows, cols, data }
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    /// Finite value range, used for colour scaling.
    pub fn range(&self) -> Option<(f64, f64)> {
        min_max(&self.data)
    }
}

/// Measured and fitted versions of one plane.
#[derive(Debug, Clone)]
pub struct PlanePair {
    pub kind: PlaneKind,
    /// Voxel index of the slice along the dropped axis.
    pub index: usize,
    pub measured: Plane,
    pub fitted: Plane,
}

/// Nearest voxel index to `center`, clamped to `0..extent`.
pub fn slice_index(center: f64, extent: usize) -> usize {
    if !center.is_finite() || center <= 0.0 || extent == 0 {
        return 0;
    }
    (center.round() as usize).min(extent - 1)
}

/// Cut the XY, XZ and YZ planes through the fitted centre.
pub fn extract_planes(volume: &Volume3D, params: &GaussianParams3D) -> Vec<PlanePair> {
    let [nz, ny, nx] = volume.shape();
    let [x0, y0, z0] = params.center;

    PlaneKind::ALL
        .iter()
        .map(|&kind| match kind {
            PlaneKind::XY => {
                let k = slice_index(z0, nz);
                PlanePair {
                    kind,
                    index: k,
                    measured: Plane::from_fn(ny, nx, |y, x| volume.get(k, y, x)),
                    fitted: Plane::from_fn(ny, nx, |y, x| gaussian_3d(x as f64, y as f64, z0, params)),
                }
            }
            PlaneKind::XZ => {
                let k = slice_index(y0, ny);
                PlanePair {
                    kind,
                    index: k,
                    measured: Plane::from_fn(nz, nx, |z, x| volume.get(z, k, x)),
                    fitted: Plane::from_fn(nz, nx, |z, x| gaussian_3d(x as f64, y0, z as f64, params)),
                }
            }
            PlaneKind::YZ => {
                let k = slice_index(x0, nx);
                PlanePair {
                    kind,
                    index: k,
                    measured: Plane::from_fn(nz, ny, |z, y| volume.get(z, y, k)),
                    fitted: Plane::from_fn(nz, ny, |z, y| gaussian_3d(x0, y as f64, z as f64, params)),
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> GaussianParams3D {
        GaussianParams3D {
            amplitude: 10.0,
            center: [3.0, 2.0, 1.0],
            sigma: [1.0, 1.0, 1.0],
            offset: 1.0,
        }
    }

    #[test]
    fn slice_index_rounds_and_clamps() {
        assert_eq!(slice_index(2.4, 5), 2);
        assert_eq!(slice_index(2.6, 5), 3);
        assert_eq!(slice_index(9.0, 5), 4);
        assert_eq!(slice_index(-1.0, 5), 0);
        assert_eq!(slice_index(f64::NAN, 5), 0);
    }

    #[test]
    fn planes_have_expected_shapes_and_slices() {
        let vol = Volume3D::from_fn([3, 4, 5], |x, y, z| (100 * z + 10 * y + x) as f64);
        let planes = extract_planes(&vol, &params());
        assert_eq!(planes.len(), 3);

        let xy = &planes[0];
        assert_eq!((xy.measured.rows, xy.measured.cols), (4, 5));
        assert_eq!(xy.index, 1);
        assert_eq!(xy.measured.get(2, 3), 123.0);

        let xz = &planes[1];
        assert_eq!((xz.measured.rows, xz.measured.cols), (3, 5));
        assert_eq!(xz.measured.get(2, 4), 224.0);

        let yz = &planes[2];
        assert_eq!((yz.measured.rows, yz.measured.cols), (3, 4));
        assert_eq!(yz.measured.get(1, 3), 133.0);
    }

    #[test]
    fn fitted_plane_peaks_at_center() {
        let vol = Volume3D::from_fn([3, 4, 5], |_, _, _| 0.0);
        let planes = extract_planes(&vol, &params());
        let xy = &planes[0].fitted;
        assert!((xy.get(2, 3) - 11.0).abs() < 1e-12);
        assert_eq!(xy.range().map(|(_, hi)| hi), Some(xy.get(2, 3)));
    }
}
