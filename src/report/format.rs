//! Terminal and report text.
//!
//! Formatting lives here so the fitting code never builds strings and output
//! changes stay in one file.

use crate::domain::{Axis, ProfileFit, SolveSummary, VolumeFit};

/// `fwhm_x = 0.47` style lines, µm with two decimals, X/Y/Z order.
pub fn format_report_lines(fwhm_um: [f64; 3]) -> Vec<String> {
    Axis::ALL
        .iter()
        .map(|axis| {
            format!(
                "fwhm_{} = {:.2}",
                axis.label().to_lowercase(),
                fwhm_um[axis.index()]
            )
        })
        .collect()
}

/// Console block for one profile fit.
pub fn format_profile_result(axis: Axis, fit: &ProfileFit) -> String {
    let mut out = format!("=== Axis {axis} ===\n");
    match fit.fwhm.microns {
        Some(um) => out.push_str(&format!(
            "   FWHM = {:.2} pixels = {:.2} microns\n",
            fit.fwhm.pixels, um
        )),
        None => out.push_str(&format!(
            "   FWHM = {:.2} pixels (no calibration)\n",
            fit.fwhm.pixels
        )),
    }
    let p = &fit.params;
    out.push_str(&format!(
        "   a = {:.2}, x0 = {:.2}, sigma = {:.3}",
        p.amplitude, p.center, p.sigma
    ));
    if let Some(b) = p.offset {
        out.push_str(&format!(", offset = {b:.2}"));
    }
    out.push('\n');
    out.push_str(&format_solve(&fit.solve));
    out
}

/// Console block for the volume fit.
pub fn format_volume_result(fit: &VolumeFit) -> String {
    let mut out = String::new();
    for axis in Axis::ALL {
        let i = axis.index();
        out.push_str(&format!("=== Axis {axis} ===\n"));
        out.push_str(&format!("   FWHM = {:.2} microns\n", fit.fwhm_um[i]));
        out.push_str(&format!(
            "   center = {:.2} px, sigma = {:.3} px\n",
            fit.params.center[i], fit.params.sigma[i]
        ));
    }
    out.push_str(&format!(
        "amplitude = {:.2}, offset = {:.2}\n",
        fit.params.amplitude, fit.params.offset
    ));
    out.push_str(&format_solve(&fit.solve));
    out
}

fn format_solve(s: &SolveSummary) -> String {
    format!(
        "   solver: {} evaluations, {} iterations, RMSE={:.4}, stop={:?}\n",
        s.evaluations, s.iterations, s.rmse, s.termination
    )
}
