//! Volume ingest and export as NumPy `.npy` arrays.
//!
//! Arrays are `(Z, Y, X)` in C order. Leading/inner singleton axes beyond the
//! third are squeezed away, and 2D images are promoted to a single Z plane.
//! Integer and float dtypes are widened to `f64`.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Instant;

use npyz::{DType, NpyFile, Order, TypeChar, WriterBuilder};

use crate::domain::Volume3D;
use crate::error::{AppError, EXIT_IO};

/// Read a `(Z, Y, X)` volume.
pub fn read_volume(path: &Path) -> Result<Volume3D, AppError> {
    let now = Instant::now();
    log::info!("Loading {:?}...", path);

    let io_err = |e: std::io::Error| {
        AppError::new(EXIT_IO, format!("Failed to read volume '{}': {e}", path.display()))
    };

    let file = File::open(path).map_err(io_err)?;
    let npy = NpyFile::new(BufReader::new(file)).map_err(io_err)?;

    if !matches!(npy.order(), Order::C) {
        return Err(AppError::new(
            EXIT_IO,
            format!("Volume '{}' is stored in Fortran order; C order is required.", path.display()),
        ));
    }
    let shape = squeeze_to_3d(npy.shape()).ok_or_else(|| {
        AppError::new(
            EXIT_IO,
            format!("Volume '{}' has shape {:?}, expected (Z, Y, X).", path.display(), npy.shape()),
        )
    })?;

    let DType::Plain(type_str) = npy.dtype() else {
        return Err(AppError::new(
            EXIT_IO,
            format!("Volume '{}' has a structured dtype.", path.display()),
        ));
    };
    let data: Vec<f64> = match (type_str.type_char(), type_str.size_field()) {
        (TypeChar::Float, 8) => npy.into_vec::<f64>().map_err(io_err)?,
        (TypeChar::Float, 4) => widen(npy.into_vec::<f32>().map_err(io_err)?),
        (TypeChar::Uint, 1) => widen(npy.into_vec::<u8>().map_err(io_err)?),
        (TypeChar::Uint, 2) => widen(npy.into_vec::<u16>().map_err(io_err)?),
        (TypeChar::Uint, 4) => widen(npy.into_vec::<u32>().map_err(io_err)?),
        (TypeChar::Int, 2) => widen(npy.into_vec::<i16>().map_err(io_err)?),
        (TypeChar::Int, 4) => widen(npy.into_vec::<i32>().map_err(io_err)?),
        _ => {
            return Err(AppError::new(
                EXIT_IO,
                format!("Volume '{}' has unsupported dtype {type_str}.", path.display()),
            ));
        }
    };

    let volume = Volume3D::new(shape, data)
        .map_err(|e| AppError::new(EXIT_IO, format!("Volume '{}': {e}", path.display())))?;
    log::info!(
        "... loaded {:?} voxels in {:.2}s",
        volume.shape(),
        now.elapsed().as_secs_f64()
    );
    Ok(volume)
}

/// Write a volume as a little-endian `f64` array of shape `(Z, Y, X)`.
pub fn write_volume(path: &Path, volume: &Volume3D) -> Result<(), AppError> {
    let io_err = |e: std::io::Error| {
        AppError::new(EXIT_IO, format!("Failed to write volume '{}': {e}", path.display()))
    };

    let file = File::create(path).map_err(io_err)?;
    let shape: Vec<u64> = volume.shape().iter().map(|&n| n as u64).collect();
    let mut writer = npyz::WriteOptions::<f64>::new()
        .default_dtype()
        .shape(&shape)
        .writer(BufWriter::new(file))
        .begin_nd()
        .map_err(io_err)?;
    for v in volume.data() {
        writer.push(v).map_err(io_err)?;
    }
    writer.finish().map_err(io_err)
}

fn widen<T: Into<f64>>(values: Vec<T>) -> Vec<f64> {
    values.into_iter().map(Into::into).collect()
}

fn squeeze_to_3d(shape: &[u64]) -> Option<[usize; 3]> {
    let mut dims: Vec<usize> = shape.iter().map(|&n| n as usize).collect();
    while dims.len() > 3 {
        let singleton = dims.iter().position(|&n| n == 1)?;
        dims.remove(singleton);
    }
    while dims.len() < 3 {
        dims.insert(0, 1);
    }
    Some([dims[0], dims[1], dims[2]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squeeze_rules() {
        assert_eq!(squeeze_to_3d(&[1, 1, 5, 6, 7]), Some([5, 6, 7]));
        assert_eq!(squeeze_to_3d(&[5, 1, 6, 7]), Some([5, 6, 7]));
        assert_eq!(squeeze_to_3d(&[6, 7]), Some([1, 6, 7]));
        assert_eq!(squeeze_to_3d(&[2, 3, 4, 5]), None);
    }

    #[test]
    fn write_then_read_preserves_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vol.npy");
        let vol = Volume3D::from_fn([2, 3, 4], |x, y, z| (100 * z + 10 * y + x) as f64);
        write_volume(&path, &vol).unwrap();
        let back = read_volume(&path).unwrap();
        assert_eq!(back, vol);
        assert_eq!(back.get(1, 2, 3), 123.0);
    }

    #[test]
    fn truncated_volume_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vol.npy");
        write_volume(&path, &Volume3D::from_fn([4, 8, 8], |x, y, z| (x + y + z) as f64)).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        let err = read_volume(&path).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_IO);
    }

    #[test]
    fn missing_volume_is_io_error() {
        let err = read_volume(Path::new("/nonexistent/vol.npy")).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_IO);
    }
}
