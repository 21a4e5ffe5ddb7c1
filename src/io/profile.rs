//! Profile CSV ingest.
//!
//! Profiles are plain delimited text as exported by line-profile tools:
//!
//! - the first `skip_rows` lines are preamble (title, header) and ignored
//! - column 0 is the distance in pixels, column 1 the intensity
//! - a cell that does not parse as a number is missing data: the row is
//!   dropped, the file is not rejected

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::domain::{Axis, Profile1D};
use crate::error::{AppError, EXIT_IO};

/// Default number of preamble lines in a profile export.
pub const DEFAULT_SKIP_ROWS: usize = 2;

/// Default file name pattern; `{axis}` becomes `X`, `Y` or `Z`.
pub const DEFAULT_PROFILE_PATTERN: &str = "profile_{axis}.csv";

/// Path of the profile for `axis` inside `dir`.
pub fn profile_path(dir: &Path, pattern: &str, axis: Axis) -> PathBuf {
    dir.join(pattern.replace("{axis}", axis.label()))
}

/// Read one profile.
pub fn read_profile(path: &Path, skip_rows: usize) -> Result<Profile1D, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(EXIT_IO, format!("Failed to open profile '{}': {e}", path.display()))
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut samples = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        if idx < skip_rows {
            continue;
        }
        match result {
            Ok(record) => samples.push((
                record.get(0).and_then(parse_cell),
                record.get(1).and_then(parse_cell),
            )),
            Err(e) => {
                log::warn!("{}: unreadable row {}: {e}", path.display(), idx + 1);
                samples.push((None, None));
            }
        }
    }

    let profile = Profile1D::from_samples(samples);
    if profile.dropped > 0 {
        log::warn!(
            "{}: dropped {} rows with missing values",
            path.display(),
            profile.dropped
        );
    }
    Ok(profile)
}

/// Write a profile in the same layout `read_profile` expects.
pub fn write_profile(path: &Path, profile: &Profile1D, title: &str) -> Result<(), AppError> {
    let write_err =
        |e: csv::Error| AppError::new(EXIT_IO, format!("Failed to write profile '{}': {e}", path.display()));

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(write_err)?;
    writer.write_record([title]).map_err(write_err)?;
    writer
        .write_record(["Distance [px]", "Intensity"])
        .map_err(write_err)?;
    for (x, y) in profile.positions.iter().zip(&profile.intensities) {
        writer
            .write_record([x.to_string(), y.to_string()])
            .map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(EXIT_IO, format!("Failed to flush profile '{}': {e}", path.display())))
}

fn parse_cell(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn skips_preamble_and_bad_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile_X.csv");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "Plot Values").unwrap();
        writeln!(f, "Distance,Intensity").unwrap();
        writeln!(f, "0, 1.5").unwrap();
        writeln!(f, "1,abc").unwrap();
        writeln!(f, "2,3.5").unwrap();
        writeln!(f, "3").unwrap();
        writeln!(f, " 4 ,5.0").unwrap();
        drop(f);

        let profile = read_profile(&path, DEFAULT_SKIP_ROWS).unwrap();
        assert_eq!(profile.positions, vec![0.0, 2.0, 4.0]);
        assert_eq!(profile.intensities, vec![1.5, 3.5, 5.0]);
        assert_eq!(profile.dropped, 2);
    }

    #[test]
    fn written_profiles_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.csv");
        let profile = Profile1D::from_samples([(Some(0.0), Some(2.0)), (Some(0.5), Some(4.25))]);
        write_profile(&path, &profile, "synthetic").unwrap();
        let back = read_profile(&path, DEFAULT_SKIP_ROWS).unwrap();
        assert_eq!(back.positions, profile.positions);
        assert_eq!(back.intensities, profile.intensities);
    }

    #[test]
    fn pattern_substitutes_axis() {
        let p = profile_path(Path::new("/data"), DEFAULT_PROFILE_PATTERN, Axis::Z);
        assert_eq!(p, PathBuf::from("/data/profile_Z.csv"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_profile(Path::new("/nonexistent/profile_X.csv"), 2).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_IO);
    }
}
