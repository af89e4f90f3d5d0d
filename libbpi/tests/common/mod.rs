#![allow(dead_code)]

use libbpi::{BitWriter, ColorModel, Raster};

/// Raw BPI bytes for `(model, raster)` pairs written back to back
pub fn stream_of(blocks: &[(ColorModel, Raster)]) -> anyhow::Result<Vec<u8>> {
    let mut w = BitWriter::new(Vec::new());
    for (model, raster) in blocks {
        model.write(&mut w)?;
        raster.encode(&mut w)?;
    }
    Ok(w.into_inner()?)
}

/// A `width`x`height` gradient of opaque gray ARGB pixels
pub fn gray_ramp(width: u16, height: u16) -> Vec<u32> {
    let count = u32::from(width) * u32::from(height);
    (0..count)
        .map(|i| {
            let v = (i * 255 / count.max(2).saturating_sub(1)).min(255);
            0xFF00_0000 | v << 16 | v << 8 | v
        })
        .collect()
}
