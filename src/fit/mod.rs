//! Gaussian fitting.
//!
//! Responsibilities:
//!
//! - seed each fit from the data (`guess`)
//! - fit 1D profiles, one axis at a time (`profile`)
//! - fit the whole volume in one bounded solve (`volume`)

pub mod guess;
pub mod profile;
pub mod volume;

pub use guess::*;
pub use profile::*;
pub use volume::*;
