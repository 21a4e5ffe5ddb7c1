//! Pixel calibration from microscope metadata.
//!
//! The metadata tree stores one distance-per-pixel entry per axis, in meters:
//!
//! ```text
//! ImageDocument.Metadata.Scaling.Items.Distance[0..3].Value
//! ```
//!
//! Entries are read in fixed X, Y, Z order. Values may be JSON numbers or numeric
//! strings (XML-derived trees keep everything as text).

use serde_json::Value;

use crate::domain::PixelSize;
use crate::error::CalibrationError;
use crate::math::gaussian::METERS_TO_MICRONS;

const DISTANCE_PATH: [&str; 5] = ["ImageDocument", "Metadata", "Scaling", "Items", "Distance"];

/// Extract the X/Y/Z pixel size (µm) from a metadata tree.
///
/// Any missing or unusable entry fails the whole calibration.
pub fn calibrate(metadata: &Value) -> Result<PixelSize, CalibrationError> {
    let mut node = metadata;
    let mut path = String::new();
    for key in DISTANCE_PATH {
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(key);
        node = node
            .get(key)
            .ok_or_else(|| CalibrationError::MissingField(path.clone()))?;
    }

    let mut microns = [0.0; 3];
    for (i, slot) in microns.iter_mut().enumerate() {
        let entry_path = format!("{path}[{i}].Value");
        let value = node
            .get(i)
            .and_then(|entry| entry.get("Value"))
            .ok_or_else(|| CalibrationError::MissingField(entry_path.clone()))?;
        let meters = parse_distance(value).ok_or_else(|| CalibrationError::InvalidValue {
            path: entry_path.clone(),
            value: value.to_string(),
        })?;
        *slot = meters * METERS_TO_MICRONS;
    }

    PixelSize::new(microns[0], microns[1], microns[2])
}

/// Build the metadata tree for a given pixel size (µm).
pub fn metadata_for(pixel_size: &PixelSize) -> Value {
    let distances: Vec<Value> = ["X", "Y", "Z"]
        .iter()
        .zip(pixel_size.as_array())
        .map(|(id, um)| serde_json::json!({ "Id": id, "Value": um / METERS_TO_MICRONS }))
        .collect();
    serde_json::json!({
        "ImageDocument": {
            "Metadata": {
                "Scaling": {
                    "Items": { "Distance": distances }
                }
            }
        }
    })
}

fn parse_distance(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (v.is_finite() && v > 0.0).then_some(v)
}
