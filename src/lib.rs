//! `psf-fwhm` library crate.
//!
//! Estimates a microscope's point spread function width (FWHM per axis, in
//! microns) from a bead acquisition, either from three pre-extracted line
//! profiles or from one 3D Gaussian fit of the whole volume.
//!
//! The binary (`psf`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the fitters can be reused without the CLI

pub mod app;
pub mod calibration;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
