//! 3D volumetric fitting.
//!
//! One joint fit of an anisotropic Gaussian with constant background over every
//! voxel:
//!
//! ```text
//! g(x,y,z) = a · exp(-[(x-x0)²/2σx² + (y-y0)²/2σy² + (z-z0)²/2σz²]) + b
//! ```
//!
//! Amplitude, centre and sigmas are bounded below by zero; the background `b` is
//! free. Every axis needs at least two planes, otherwise its sigma has no
//! gradient and would stay at the prior. FWHM per axis is `2.355 · σ_axis · pixel_size_axis`.

use std::time::Instant;

use crate::domain::{Axis, GaussianParams3D, PixelSize, Volume3D, VolumeFit, VolumeFitConfig};
use crate::error::FitError;
use crate::fit::guess::volume_initial_guess;
use crate::math::gaussian::{fwhm_from_sigma, to_microns};
use crate::math::lm::{Bounds, minimize};
use crate::math::stats::min_max;
use crate::models::VolumeModel;

/// Fit the anisotropic 3D Gaussian to a calibrated volume.
pub fn fit_volume(
    volume: &Volume3D,
    pixel_size: &PixelSize,
    config: &VolumeFitConfig,
) -> Result<VolumeFit, FitError> {
    if volume.len() < GaussianParams3D::LEN {
        return Err(FitError::DegenerateVolume(format!(
            "{} voxels, the model needs at least {}",
            volume.len(),
            GaussianParams3D::LEN
        )));
    }
    let [nz, ny, nx] = volume.shape();
    for (axis, extent) in Axis::ALL.into_iter().zip([nx, ny, nz]) {
        if extent < 2 {
            return Err(FitError::DegenerateVolume(format!(
                "axis {axis} has extent {extent}, its width cannot be measured"
            )));
        }
    }
    let Some((lo, hi)) = min_max(volume.data()) else {
        return Err(FitError::DegenerateVolume("no finite intensities".to_string()));
    };
    if hi <= lo {
        return Err(FitError::DegenerateVolume(format!(
            "uniform intensity {lo}, no distinguishable peak"
        )));
    }
    if !(config.psf_prior_um.is_finite() && config.psf_prior_um > 0.0) {
        return Err(FitError::InvalidInput(format!(
            "PSF width prior must be positive, got {}",
            config.psf_prior_um
        )));
    }

    let guess = volume_initial_guess(volume, pixel_size, config.psf_prior_um).ok_or_else(|| {
        FitError::DegenerateVolume("volume is empty".to_string())
    })?;
    log::debug!("volume initial guess: {guess:?}");

    let mut lower = vec![0.0; GaussianParams3D::LEN];
    lower[7] = f64::NEG_INFINITY;
    let bounds = Bounds::new(lower, vec![f64::INFINITY; GaussianParams3D::LEN])?;

    let started = Instant::now();
    let model = VolumeModel::new(volume);
    let solution = minimize(&model, &guess.to_vec(), &bounds, &config.solver)?;
    log::info!(
        "volume fit converged in {:.2}s ({} evaluations, {:?})",
        started.elapsed().as_secs_f64(),
        solution.summary.evaluations,
        solution.summary.termination
    );

    let params = GaussianParams3D::from_slice(&solution.params);
    if params.amplitude <= 0.0 || params.sigma.iter().any(|&s| s <= 0.0) {
        return Err(FitError::NonConvergence {
            evaluations: solution.summary.evaluations,
            reason: format!(
                "fit collapsed onto a bound (amplitude {}, sigma {:?})",
                params.amplitude, params.sigma
            ),
        });
    }

    let fwhm_px = params.sigma.map(fwhm_from_sigma);
    let fwhm_um = Axis::ALL.map(|axis| to_microns(fwhm_px[axis.index()], pixel_size.get(axis)));

    Ok(VolumeFit {
        params,
        fwhm_px,
        fwhm_um,
        solve: solution.summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::gaussian::gaussian_3d;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    fn bead() -> GaussianParams3D {
        GaussianParams3D {
            amplitude: 1000.0,
            center: [16.0, 16.0, 8.0],
            sigma: [2.0, 2.0, 1.0],
            offset: 50.0,
        }
    }

    fn bead_volume(noise_sigma: f64, seed: u64) -> Volume3D {
        let truth = bead();
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, noise_sigma.max(f64::MIN_POSITIVE)).unwrap();
        Volume3D::from_fn([16, 32, 32], |x, y, z| {
            let v = gaussian_3d(x as f64, y as f64, z as f64, &truth);
            if noise_sigma > 0.0 { v + noise.sample(&mut rng) } else { v }
        })
    }

    fn pixel_size() -> PixelSize {
        PixelSize::new(0.1, 0.1, 0.3).unwrap()
    }

    /// Bead-scale prior: 0.5 µm instead of the widefield default.
    fn config() -> VolumeFitConfig {
        VolumeFitConfig {
            psf_prior_um: 0.5,
            ..VolumeFitConfig::default()
        }
    }

    fn rel(a: f64, b: f64) -> f64 {
        ((a - b) / b).abs()
    }

    #[test]
    fn recovers_all_parameters_without_noise() {
        let fit = fit_volume(&bead_volume(0.0, 0), &pixel_size(), &config()).unwrap();
        let truth = bead().to_vec();
        for (i, (got, want)) in fit.params.to_vec().iter().zip(&truth).enumerate() {
            assert!(rel(*got, *want) < 1e-4, "param {i}: {got} vs {want}");
        }
    }

    #[test]
    fn reports_fwhm_in_microns() {
        let fit = fit_volume(&bead_volume(0.0, 0), &pixel_size(), &config()).unwrap();
        let [fx, fy, fz] = fit.fwhm_um;
        assert!(rel(fx, 0.471) < 0.05, "fwhm_x {fx}");
        assert!(rel(fy, 0.471) < 0.05, "fwhm_y {fy}");
        assert!(rel(fz, 0.7065) < 0.05, "fwhm_z {fz}");
        assert_eq!(fit.fwhm(Axis::Z).microns, Some(fz));
        assert!((fit.fwhm_px[2] - 2.355).abs() < 1e-3);
    }

    #[test]
    fn noisy_sigmas_stay_within_a_few_percent() {
        let fit = fit_volume(&bead_volume(5.0, 7), &pixel_size(), &config()).unwrap();
        for (got, want) in fit.params.sigma.iter().zip(bead().sigma) {
            assert!(rel(*got, want) < 0.03, "sigma {got} vs {want}");
        }
        assert!(rel(fit.params.offset, 50.0) < 0.01, "offset {}", fit.params.offset);
    }

    #[test]
    fn uniform_volume_is_degenerate() {
        let vol = Volume3D::from_fn([4, 4, 4], |_, _, _| 12.0);
        let err = fit_volume(&vol, &pixel_size(), &VolumeFitConfig::default()).unwrap_err();
        assert!(matches!(err, FitError::DegenerateVolume(_)), "{err}");
    }

    #[test]
    fn undersized_volume_is_degenerate() {
        let vol = Volume3D::from_fn([1, 2, 3], |x, _, _| x as f64);
        let err = fit_volume(&vol, &pixel_size(), &VolumeFitConfig::default()).unwrap_err();
        assert!(matches!(err, FitError::DegenerateVolume(_)), "{err}");
    }

    #[test]
    fn exhausted_budget_is_non_convergence() {
        let mut cfg = config();
        cfg.solver.max_evaluations = Some(3);
        let err = fit_volume(&bead_volume(5.0, 1), &pixel_size(), &cfg).unwrap_err();
        assert!(matches!(err, FitError::NonConvergence { .. }), "{err}");
    }

    #[test]
    fn default_prior_recovers_bead() {
        let fit = fit_volume(&bead_volume(0.0, 0), &pixel_size(), &VolumeFitConfig::default()).unwrap();
        let [fx, fy, fz] = fit.fwhm_um;
        assert!(rel(fx, 0.471) < 0.01, "fwhm_x {fx}");
        assert!(rel(fy, 0.471) < 0.01, "fwhm_y {fy}");
        assert!(rel(fz, 0.7065) < 0.01, "fwhm_z {fz}");
    }

    #[test]
    fn single_plane_axis_is_degenerate() {
        let vol = Volume3D::from_fn([1, 1, 20], |x, _, _| {
            let d = x as f64 - 10.0;
            1000.0 * (-(d * d) / 8.0).exp() + 50.0
        });
        let err = fit_volume(&vol, &pixel_size(), &config()).unwrap_err();
        assert!(matches!(err, FitError::DegenerateVolume(_)), "{err}");
        assert!(err.to_string().contains("axis Y"), "{err}");
    }
}
