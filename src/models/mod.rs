//! Gaussian residual models.
//!
//! Models are implemented as small structs borrowing the sample data so that the
//! solver code can stay generic over dimensionality.

pub mod model;

pub use model::*;
