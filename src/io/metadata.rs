//! Metadata sidecar read/write.
//!
//! The sidecar is the microscope metadata tree serialized as JSON. By default it
//! sits next to the volume with a `.json` extension.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::calibration::{calibrate, metadata_for};
use crate::domain::{Axis, PixelSize};
use crate::error::{AppError, CalibrationError, EXIT_IO};

/// Default sidecar location for a volume file.
pub fn sidecar_path(volume: &Path) -> PathBuf {
    volume.with_extension("json")
}

/// Read the metadata tree.
pub fn read_metadata(path: &Path) -> Result<Value, CalibrationError> {
    let unreadable = |message: String| CalibrationError::Unreadable {
        path: path.to_path_buf(),
        message,
    };
    let file = File::open(path).map_err(|e| unreadable(e.to_string()))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| unreadable(e.to_string()))
}

/// Read the metadata tree and extract the pixel size (µm).
pub fn read_pixel_size(path: &Path) -> Result<PixelSize, CalibrationError> {
    let metadata = read_metadata(path)?;
    let pixel_size = calibrate(&metadata)?;
    log::info!(
        "Pixel size from {:?}: x={:.4} y={:.4} z={:.4} µm",
        path,
        pixel_size.get(Axis::X),
        pixel_size.get(Axis::Y),
        pixel_size.get(Axis::Z)
    );
    Ok(pixel_size)
}

/// Write a sidecar describing `pixel_size`.
pub fn write_metadata(path: &Path, pixel_size: &PixelSize) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(EXIT_IO, format!("Failed to create metadata '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(file, &metadata_for(pixel_size))
        .map_err(|e| AppError::new(EXIT_IO, format!("Failed to write metadata: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_replaces_extension() {
        assert_eq!(
            sidecar_path(Path::new("/data/bead.npy")),
            PathBuf::from("/data/bead.json")
        );
    }

    #[test]
    fn written_sidecar_calibrates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volume.json");
        write_metadata(&path, &PixelSize::new(0.1, 0.1, 0.3).unwrap()).unwrap();
        let px = read_pixel_size(&path).unwrap();
        assert!((px.get(Axis::X) - 0.1).abs() < 1e-12);
        assert!((px.get(Axis::Z) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn string_values_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        std::fs::write(
            &path,
            r#"{"ImageDocument":{"Metadata":{"Scaling":{"Items":{"Distance":[
                {"Id":"X","Value":"6.5E-08"},{"Id":"Y","Value":"6.5E-08"},{"Id":"Z","Value":"2E-07"}
            ]}}}}}"#,
        )
        .unwrap();
        let px = read_pixel_size(&path).unwrap();
        assert!((px.get(Axis::X) - 0.065).abs() < 1e-12);
        assert!((px.get(Axis::Z) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn missing_or_malformed_files_are_unreadable() {
        let err = read_pixel_size(Path::new("/nonexistent/meta.json")).unwrap_err();
        assert!(matches!(err, CalibrationError::Unreadable { .. }), "{err}");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = read_pixel_size(&path).unwrap_err();
        assert!(matches!(err, CalibrationError::Unreadable { .. }), "{err}");
    }
}
