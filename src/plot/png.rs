//! PNG overlays rendered with Plotters' bitmap backend.
//!
//! Figures carry no text (the build has no font backend); panels are ordered
//! X, Y, Z top to bottom, and comparison images are measured (left, grey) next
//! to fitted (right, viridis).

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::domain::{Axis, ProfileFit};
use crate::error::{AppError, EXIT_IO};
use crate::math::gaussian::gaussian_1d;
use crate::math::stats::min_max;
use crate::report::planes::{Plane, PlanePair};

/// Samples on the fitted curve of each profile panel.
pub const CURVE_POINTS: usize = 500;

pub const PROFILE_FIGURE_FILE: &str = "fit1d_all_axes.png";

type Panel<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

fn draw_err<E: std::fmt::Display>(path: &Path) -> impl Fn(E) -> AppError + '_ {
    move |e| AppError::new(EXIT_IO, format!("Failed to draw '{}': {e}", path.display()))
}

/// Stacked panels: measured samples and fitted curve per axis.
pub fn write_profiles_figure(path: &Path, fits: &[(Axis, ProfileFit)]) -> Result<(), AppError> {
    let root = BitMapBackend::new(path, (800, 1200)).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err(path))?;

    let panels = root.split_evenly((fits.len().max(1), 1));
    for ((axis, fit), panel) in fits.iter().zip(&panels) {
        draw_profile_panel(panel, *axis, fit, path)?;
    }

    root.present().map_err(draw_err(path))?;
    log::info!("Saved {}", path.display());
    Ok(())
}

fn draw_profile_panel(panel: &Panel, axis: Axis, fit: &ProfileFit, path: &Path) -> Result<(), AppError> {
    let Some((x0, x1)) = min_max(&fit.positions) else {
        return Ok(());
    };
    let curve = sample_curve(fit, x0, x1, CURVE_POINTS);
    let values: Vec<f64> = fit
        .intensities
        .iter()
        .copied()
        .chain(curve.iter().map(|&(_, y)| y))
        .collect();
    let Some((y0, y1)) = min_max(&values) else {
        return Ok(());
    };
    let (x0, x1) = padded(x0, x1);
    let (y0, y1) = padded(y0, y1);

    let mut chart = ChartBuilder::on(panel)
        .margin(20)
        .build_cartesian_2d(x0..x1, y0..y1)
        .map_err(draw_err(path))?;

    let color = colorous::TABLEAU10[axis.index() % colorous::TABLEAU10.len()];
    let rgb = RGBColor(color.r, color.g, color.b);

    chart
        .draw_series(PointSeries::of_element(
            fit.positions.iter().copied().zip(fit.intensities.iter().copied()),
            3,
            &rgb,
            &|c, s, st| Circle::new(c, s, st.filled()),
        ))
        .map_err(draw_err(path))?;
    chart
        .draw_series(LineSeries::new(curve, BLACK.stroke_width(2)))
        .map_err(draw_err(path))?;
    Ok(())
}

/// Fitted curve on `n` evenly spaced points across `[x0, x1]`.
pub fn sample_curve(fit: &ProfileFit, x0: f64, x1: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let x = x0 + (x1 - x0) * i as f64 / (n - 1) as f64;
            (x, gaussian_1d(x, &fit.params))
        })
        .collect()
}

/// Side-by-side measured/fitted heatmaps for one plane.
pub fn write_plane_comparison(path: &Path, pair: &PlanePair) -> Result<(), AppError> {
    let root = BitMapBackend::new(path, (1000, 400)).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err(path))?;

    let halves = root.split_evenly((1, 2));
    draw_heatmap(&halves[0], &pair.measured, colorous::GREYS, true, path)?;
    draw_heatmap(&halves[1], &pair.fitted, colorous::VIRIDIS, false, path)?;

    root.present().map_err(draw_err(path))?;
    log::info!("Saved {}", path.display());
    Ok(())
}

fn draw_heatmap(
    panel: &Panel,
    plane: &Plane,
    cmap: colorous::Gradient,
    invert: bool,
    path: &Path,
) -> Result<(), AppError> {
    if plane.rows == 0 || plane.cols == 0 {
        return Ok(());
    }
    let (lo, hi) = plane.range().unwrap_or((0.0, 1.0));
    let span = if hi > lo { hi - lo } else { 1.0 };
    let rows = plane.rows as f64;

    let mut chart = ChartBuilder::on(panel)
        .margin(15)
        .build_cartesian_2d(0.0..plane.cols as f64, 0.0..rows)
        .map_err(draw_err(path))?;

    // Row 0 is drawn at the top, as an image would be.
    chart
        .draw_series((0..plane.rows).flat_map(|r| {
            (0..plane.cols).map(move |c| {
                let u = ((plane.get(r, c) - lo) / span).clamp(0.0, 1.0);
                let color = cmap.eval_continuous(if invert { 1.0 - u } else { u });
                let top = rows - r as f64;
                Rectangle::new(
                    [(c as f64, top - 1.0), (c as f64 + 1.0, top)],
                    RGBColor(color.r, color.g, color.b).filled(),
                )
            })
        }))
        .map_err(draw_err(path))?;
    Ok(())
}

fn padded(lo: f64, hi: f64) -> (f64, f64) {
    let pad = if hi > lo { 0.05 * (hi - lo) } else { 1.0 };
    (lo - pad, hi + pad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Fwhm, GaussianParams1D, SolveSummary, Termination};

    #[test]
    fn curve_spans_range_with_requested_points() {
        let fit = ProfileFit {
            params: GaussianParams1D {
                amplitude: 2.0,
                center: 5.0,
                sigma: 1.0,
                offset: None,
            },
            fwhm: Fwhm {
                pixels: 2.355,
                microns: None,
            },
            positions: vec![0.0, 10.0],
            intensities: vec![0.0, 0.0],
            solve: SolveSummary {
                evaluations: 1,
                iterations: 0,
                cost: 0.0,
                rmse: 0.0,
                termination: Termination::ExactFit,
            },
        };
        let curve = sample_curve(&fit, 0.0, 10.0, CURVE_POINTS);
        assert_eq!(curve.len(), CURVE_POINTS);
        assert_eq!(curve[0].0, 0.0);
        assert_eq!(curve[CURVE_POINTS - 1].0, 10.0);
        let peak = curve.iter().map(|&(_, y)| y).fold(f64::MIN, f64::max);
        assert!((peak - 2.0).abs() < 1e-3);
    }

    #[test]
    fn padding_widens_degenerate_ranges() {
        assert_eq!(padded(3.0, 3.0), (2.0, 4.0));
        let (lo, hi) = padded(0.0, 10.0);
        assert!((lo + 0.5).abs() < 1e-12 && (hi - 10.5).abs() < 1e-12);
    }
}
