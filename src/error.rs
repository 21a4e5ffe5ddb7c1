//! Error types.
//!
//! Two layers:
//!
//! - domain errors (`CalibrationError`, `FitError`) returned by the library
//! - `AppError`, the process-level error carrying an exit code and a message
//!   that names the failing stage

use std::path::PathBuf;

/// Exit code for I/O and usage problems.
pub const EXIT_IO: u8 = 2;
/// Exit code for unusable inputs (calibration, too little or degenerate data).
pub const EXIT_DATA: u8 = 3;
/// Exit code for optimizer failures.
pub const EXIT_FIT: u8 = 4;

/// Pixel calibration could not be read from the metadata tree.
///
/// Calibration is all-or-nothing: any of these means none of the three axes
/// has a usable pixel size.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    #[error("metadata field `{0}` is missing")]
    MissingField(String),
    #[error("metadata value at `{path}` is not a positive distance: {value}")]
    InvalidValue { path: String, value: String },
    #[error("failed to read metadata '{}': {message}", path.display())]
    Unreadable { path: PathBuf, message: String },
}

/// A Gaussian fit could not produce a result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error("insufficient data: {available} valid samples, the model needs at least {required}")]
    InsufficientData { available: usize, required: usize },
    #[error("optimizer did not converge after {evaluations} evaluations: {reason}")]
    NonConvergence { evaluations: usize, reason: String },
    #[error("degenerate volume: {0}")]
    DegenerateVolume(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl FitError {
    pub fn exit_code(&self) -> u8 {
        match self {
            FitError::InsufficientData { .. } | FitError::DegenerateVolume(_) => EXIT_DATA,
            FitError::NonConvergence { .. } => EXIT_FIT,
            FitError::InvalidInput(_) => EXIT_IO,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    /// Wrap an error with the pipeline stage it came from (e.g. "axis X fit").
    pub fn at_stage(stage: &str, err: impl Into<AppError>) -> Self {
        let err = err.into();
        Self {
            exit_code: err.exit_code,
            message: format!("{stage} failed: {}", err.message),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl From<CalibrationError> for AppError {
    fn from(err: CalibrationError) -> Self {
        let code = match err {
            CalibrationError::Unreadable { .. } => EXIT_IO,
            _ => EXIT_DATA,
        };
        AppError::new(code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
