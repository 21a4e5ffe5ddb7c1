//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - calibration and sample containers (`PixelSize`, `Profile1D`, `Volume3D`)
//! - Gaussian parameter sets (`GaussianParams1D`, `GaussianParams3D`)
//! - fit outputs (`ProfileFit`, `VolumeFit`, `Fwhm`, `SolveSummary`)
//! - fit configuration (`ProfileFitConfig`, `VolumeFitConfig`)

pub mod types;

pub use types::*;
