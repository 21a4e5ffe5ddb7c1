//! 1D profile fitting.
//!
//! Given a cleaned `(position, intensity)` profile we fit, without bounds,
//!
//! ```text
//! g(x) = a · exp(-(x - x0)² / 2σ²)
//! ```
//!
//! and report `FWHM = 2.355 · |σ|` in pixels, plus microns when the axis is
//! calibrated. A zero amplitude or a σ wider than the sampled span leaves the
//! width unidentified and is reported as non-convergence.
//!
//! The default model has no background term, unlike the volume model. Profiles
//! are expected to be background-subtracted; `ProfileModelKind::Offset` adds a
//! constant term for profiles that are not.

use crate::domain::{Fwhm, GaussianParams1D, Profile1D, ProfileFit, ProfileFitConfig, ProfileModelKind};
use crate::error::FitError;
use crate::fit::guess::profile_initial_guess;
use crate::math::gaussian::{fwhm_from_sigma, to_microns};
use crate::math::lm::{Bounds, minimize};
use crate::math::stats::min_max;
use crate::models::ProfileModel;

/// Fit a Gaussian to one profile.
///
/// `pixel_size_um` is the calibration of the profile's axis; `None` yields a
/// pixel-only result (`fwhm.microns == None`).
pub fn fit_profile(
    profile: &Profile1D,
    pixel_size_um: Option<f64>,
    config: &ProfileFitConfig,
) -> Result<ProfileFit, FitError> {
    let k = config.model.param_count();
    if profile.len() < k {
        return Err(FitError::InsufficientData {
            available: profile.len(),
            required: k,
        });
    }
    if !(config.initial_sigma_px.is_finite() && config.initial_sigma_px > 0.0) {
        return Err(FitError::InvalidInput(format!(
            "initial sigma must be positive, got {}",
            config.initial_sigma_px
        )));
    }

    let guess = profile_initial_guess(profile, config.model, config.initial_sigma_px).ok_or(
        FitError::InsufficientData {
            available: 0,
            required: k,
        },
    )?;
    log::debug!("profile initial guess: {guess:?}");

    let mut p0 = vec![guess.amplitude, guess.center, guess.sigma];
    if let Some(b) = guess.offset {
        p0.push(b);
    }

    let model = ProfileModel::new(&profile.positions, &profile.intensities, config.model);
    let solution = minimize(&model, &p0, &Bounds::unbounded(k), &config.solver)?;
    let p = &solution.params;

    let evaluations = solution.summary.evaluations;
    if !p[0].is_finite() || p[0] == 0.0 {
        return Err(FitError::NonConvergence {
            evaluations,
            reason: format!("fit collapsed to amplitude {}, width unidentifiable", p[0]),
        });
    }
    let sigma = p[2].abs();
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(FitError::NonConvergence {
            evaluations,
            reason: format!("fitted sigma is not a usable width ({})", p[2]),
        });
    }
    let span = sample_span(&profile.positions);
    if sigma > span {
        return Err(FitError::NonConvergence {
            evaluations,
            reason: format!("fitted sigma {sigma} px exceeds the sampled span {span} px"),
        });
    }

    let params = GaussianParams1D {
        amplitude: p[0],
        center: p[1],
        sigma,
        offset: match config.model {
            ProfileModelKind::Plain => None,
            ProfileModelKind::Offset => Some(p[3]),
        },
    };
    let pixels = fwhm_from_sigma(sigma);
    let microns = pixel_size_um
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|size| to_microns(pixels, size));

    log::debug!(
        "profile fit: {params:?}, {} evaluations, rmse {:.4}",
        solution.summary.evaluations,
        solution.summary.rmse
    );

    Ok(ProfileFit {
        params,
        fwhm: Fwhm { pixels, microns },
        positions: profile.positions.clone(),
        intensities: profile.intensities.clone(),
        solve: solution.summary,
    })
}

/// Distance covered by the samples; a wider Gaussian is not constrained by them.
fn sample_span(positions: &[f64]) -> f64 {
    min_max(positions).map_or(0.0, |(lo, hi)| hi - lo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::gaussian::FWHM_PER_SIGMA;

    fn synthetic(a: f64, x0: f64, sigma: f64, offset: f64, n: usize) -> Profile1D {
        Profile1D::from_samples((0..n).map(|i| {
            let x = i as f64;
            let d = x - x0;
            (Some(x), Some(a * (-(d * d) / (2.0 * sigma * sigma)).exp() + offset))
        }))
    }

    fn rel(a: f64, b: f64) -> f64 {
        ((a - b) / b).abs()
    }

    #[test]
    fn recovers_noise_free_gaussian() {
        let profile = synthetic(500.0, 20.3, 3.2, 0.0, 41);
        let fit = fit_profile(&profile, None, &ProfileFitConfig::default()).unwrap();
        assert!(rel(fit.params.amplitude, 500.0) < 1e-4, "{:?}", fit.params);
        assert!(rel(fit.params.center, 20.3) < 1e-4, "{:?}", fit.params);
        assert!(rel(fit.params.sigma, 3.2) < 1e-4, "{:?}", fit.params);
        assert_eq!(fit.fwhm.pixels, FWHM_PER_SIGMA * fit.params.sigma);
        assert_eq!(fit.fwhm.microns, None);
        assert_eq!(fit.positions.len(), 41);
    }

    #[test]
    fn calibrated_axis_reports_microns() {
        let profile = synthetic(200.0, 12.0, 2.0, 0.0, 25);
        let fit = fit_profile(&profile, Some(0.1), &ProfileFitConfig::default()).unwrap();
        let um = fit.fwhm.microns.unwrap();
        assert!((um - fit.fwhm.pixels * 0.1).abs() < 1e-12);
        assert!(rel(um, 2.355 * 2.0 * 0.1) < 1e-4, "fwhm {um}");
    }

    #[test]
    fn offset_model_recovers_background() {
        let profile = synthetic(300.0, 10.0, 2.0, 40.0, 21);
        let config = ProfileFitConfig {
            model: ProfileModelKind::Offset,
            ..ProfileFitConfig::default()
        };
        let fit = fit_profile(&profile, None, &config).unwrap();
        assert!(rel(fit.params.sigma, 2.0) < 1e-4, "{:?}", fit.params);
        assert!(rel(fit.params.offset.unwrap(), 40.0) < 1e-4, "{:?}", fit.params);
    }

    #[test]
    fn missing_samples_are_skipped_not_fatal() {
        let mut samples: Vec<(Option<f64>, Option<f64>)> = (0..31)
            .map(|i| {
                let d = i as f64 - 15.0;
                (Some(i as f64), Some(80.0 * (-(d * d) / 8.0).exp()))
            })
            .collect();
        samples[3].1 = None;
        samples[27].0 = None;
        let profile = Profile1D::from_samples(samples);
        assert_eq!(profile.dropped, 2);
        let fit = fit_profile(&profile, None, &ProfileFitConfig::default()).unwrap();
        assert!(rel(fit.params.sigma, 2.0) < 1e-4, "{:?}", fit.params);
    }

    #[test]
    fn fewer_than_three_samples_is_insufficient() {
        let profile = Profile1D::from_samples([
            (Some(0.0), Some(1.0)),
            (Some(1.0), None),
            (Some(2.0), Some(3.0)),
        ]);
        let err = fit_profile(&profile, Some(0.1), &ProfileFitConfig::default()).unwrap_err();
        assert_eq!(
            err,
            FitError::InsufficientData {
                available: 2,
                required: 3
            }
        );
    }

    #[test]
    fn offset_model_needs_four_samples() {
        let profile = synthetic(10.0, 1.0, 1.0, 0.0, 3);
        let config = ProfileFitConfig {
            model: ProfileModelKind::Offset,
            ..ProfileFitConfig::default()
        };
        assert!(matches!(
            fit_profile(&profile, None, &config),
            Err(FitError::InsufficientData { required: 4, .. })
        ));
    }

    #[test]
    fn all_zero_profile_does_not_report_the_seed_width() {
        let profile = Profile1D::from_samples((0..10).map(|i| (Some(i as f64), Some(0.0))));
        let err = fit_profile(&profile, Some(0.1), &ProfileFitConfig::default()).unwrap_err();
        assert!(matches!(err, FitError::NonConvergence { .. }), "{err}");
    }

    #[test]
    fn flat_profile_is_non_convergence() {
        let profile = Profile1D::from_samples((0..21).map(|i| (Some(i as f64), Some(50.0))));
        let err = fit_profile(&profile, Some(0.1), &ProfileFitConfig::default()).unwrap_err();
        assert!(matches!(err, FitError::NonConvergence { .. }), "{err}");
    }

    #[test]
    fn span_limits_the_width() {
        assert_eq!(sample_span(&[3.0, 1.0, 7.5]), 6.5);
        assert_eq!(sample_span(&[]), 0.0);
    }
}
