//! Initial-guess heuristics.
//!
//! Both fitters start from the brightest sample:
//!
//! - profile: amplitude = max intensity, center = its position, sigma = a fixed
//!   pixel guess (default 1 px)
//! - volume: amplitude = max voxel, center = its `(x, y, z)` index, offset =
//!   median intensity, sigma = an assumed physical PSF width converted to pixels
//!
//! The heuristics assume a single, reasonably centred peak. Multi-modal or flat
//! inputs get a poor starting point and may fail to converge.

use crate::domain::{Axis, GaussianParams1D, GaussianParams3D, PixelSize, Profile1D, ProfileModelKind, Volume3D};
use crate::math::gaussian::{FWHM_PER_SIGMA, to_pixels};
use crate::math::stats::{argmax, median, min_max};

/// Starting point for a profile fit. `None` for an empty profile.
pub fn profile_initial_guess(
    profile: &Profile1D,
    kind: ProfileModelKind,
    initial_sigma_px: f64,
) -> Option<GaussianParams1D> {
    let peak = argmax(&profile.intensities)?;
    let max = profile.intensities[peak];
    let center = profile.positions[peak];

    Some(match kind {
        ProfileModelKind::Plain => GaussianParams1D {
            amplitude: max,
            center,
            sigma: initial_sigma_px,
            offset: None,
        },
        ProfileModelKind::Offset => {
            let (min, _) = min_max(&profile.intensities)?;
            GaussianParams1D {
                amplitude: max - min,
                center,
                sigma: initial_sigma_px,
                offset: Some(min),
            }
        }
    })
}

/// Sigma (pixels) of a Gaussian whose FWHM is `prior_um` microns.
pub fn sigma_from_prior(prior_um: f64, pixel_size_um: f64) -> f64 {
    to_pixels(prior_um, pixel_size_um) / FWHM_PER_SIGMA
}

/// Starting point for a volume fit. `None` for an empty volume.
pub fn volume_initial_guess(
    volume: &Volume3D,
    pixel_size: &PixelSize,
    prior_um: f64,
) -> Option<GaussianParams3D> {
    let peak = argmax(volume.data())?;
    let (z, y, x) = volume.unravel(peak);
    let offset = median(volume.data())?;

    Some(GaussianParams3D {
        amplitude: volume.data()[peak],
        center: [x as f64, y as f64, z as f64],
        sigma: Axis::ALL.map(|axis| sigma_from_prior(prior_um, pixel_size.get(axis))),
        offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_guess_uses_brightest_sample() {
        let p = Profile1D::from_samples([
            (Some(0.0), Some(3.0)),
            (Some(1.0), Some(9.0)),
            (Some(2.0), Some(4.0)),
        ]);
        let g = profile_initial_guess(&p, ProfileModelKind::Plain, 1.0).unwrap();
        assert_eq!((g.amplitude, g.center, g.sigma, g.offset), (9.0, 1.0, 1.0, None));

        let g = profile_initial_guess(&p, ProfileModelKind::Offset, 2.0).unwrap();
        assert_eq!((g.amplitude, g.offset), (6.0, Some(3.0)));
        assert!(profile_initial_guess(&Profile1D::default(), ProfileModelKind::Plain, 1.0).is_none());
    }

    #[test]
    fn ten_micron_prior_in_pixels() {
        // 10 / (2.355 * 0.1)
        assert!((sigma_from_prior(10.0, 0.1) - 42.462845).abs() < 1e-5);
    }

    #[test]
    fn volume_guess_reorders_peak_to_xyz() {
        let vol = Volume3D::from_fn([3, 4, 5], |x, y, z| if (x, y, z) == (4, 1, 2) { 10.0 } else { 1.0 });
        let ps = PixelSize::new(0.1, 0.1, 0.3).unwrap();
        let g = volume_initial_guess(&vol, &ps, 10.0).unwrap();
        assert_eq!(g.center, [4.0, 1.0, 2.0]);
        assert_eq!(g.amplitude, 10.0);
        assert_eq!(g.offset, 1.0);
        assert!((g.sigma[2] - 10.0 / (2.355 * 0.3)).abs() < 1e-9);
    }
}
