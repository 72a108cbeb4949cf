//! Plain-text data collaborators.
//!
//! - images: one example per line, `width` comma-separated byte pixel values; each is
//!   normalized to `pixel / 256`
//! - labels: one non-negative integer per line
//!
//! Blank lines are skipped. Malformed rows are reported with their 1-based line
//! number.

use std::io::{BufRead, Write};

use crate::{Error, Result, Vector};

/// Read flattened images of exactly `width` pixels per line.
pub fn load_images<R: BufRead>(reader: R, width: usize) -> Result<Vec<Vector>> {
    if width == 0 {
        return Err(Error::InvalidConfig("image width must be > 0".to_owned()));
    }

    let mut images = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut image = Vec::with_capacity(width);
        for field in line.split(',') {
            let pixel: u8 = field.trim().parse().map_err(|e| {
                Error::InvalidData(format!(
                    "line {}: bad pixel value {field:?}: {e}",
                    line_no + 1
                ))
            })?;
            image.push(f32::from(pixel) / 256.0);
        }
        if image.len() != width {
            return Err(Error::InvalidData(format!(
                "line {}: expected {width} pixels, got {}",
                line_no + 1,
                image.len()
            )));
        }
        images.push(Vector::from_vec(image));
    }
    Ok(images)
}

/// Read one label per line.
pub fn load_labels<R: BufRead>(reader: R) -> Result<Vec<usize>> {
    let mut labels = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let label = line.parse().map_err(|e| {
            Error::InvalidData(format!("line {}: bad label {line:?}: {e}", line_no + 1))
        })?;
        labels.push(label);
    }
    Ok(labels)
}

/// Write one label per line.
pub fn save_labels<W: Write>(mut writer: W, labels: &[usize]) -> Result<()> {
    for label in labels {
        writeln!(writer, "{label}")?;
    }
    writer.flush()?;
    Ok(())
}
