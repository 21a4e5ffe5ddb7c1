//! Image overlays for visual inspection of the fits.

pub mod png;

pub use png::*;
