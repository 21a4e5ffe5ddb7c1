//! Mathematical utilities: Gaussian models, descriptive statistics and the
//! bounded Levenberg–Marquardt solver.

pub mod gaussian;
pub mod lm;
pub mod stats;

pub use gaussian::*;
pub use lm::{Bounds, ResidualModel, Solution, SolverOptions, minimize};
pub use stats::*;
