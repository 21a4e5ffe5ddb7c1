//! Reporting: console text, report lines and comparison planes.

pub mod format;
pub mod planes;

pub use format::*;
pub use planes::*;
