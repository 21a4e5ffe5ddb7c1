//! Input/output helpers.
//!
//! - `.npy` volume read/write (`volume`)
//! - metadata sidecar + calibration (`metadata`)
//! - profile CSV read/write (`profile`)
//! - FWHM report and JSON export (`export`)

pub mod export;
pub mod metadata;
pub mod profile;
pub mod volume;

pub use export::*;
pub use metadata::*;
pub use profile::*;
pub use volume::*;
