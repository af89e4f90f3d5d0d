#![allow(clippy::module_name_repetitions)]

pub(crate) mod color;
pub(crate) mod depth;
pub(crate) mod palette;
pub(crate) mod raster;
pub(crate) mod scale;

/// Bit-width conversions between stored samples and 8-bit channels
pub mod scaling {
    pub use crate::image::scale::{expand, reduce, rescale, MAX_SAMPLE_BITS};
}

/// Wire-format constants
pub mod consts {
    pub use crate::image::depth::{DEPTH_BITS, MAX_BITS_PER_COLOR, MIN_DEPTH_TO_USE_PALETTE};
    pub use crate::image::palette::{MIN_PALETTE_LENGTH, TRANSPARENT_SENTINEL};
    pub use crate::image::raster::{MAX_HEIGHT, MAX_WIDTH, MIN_HEIGHT, MIN_WIDTH, SIZE_BITS};
}

pub use color::{join_argb, luma, split_argb, ColorModel, DirectModel, IndexedModel};
pub use depth::{ColorSpace, DepthProfile};
pub use palette::Palette;
pub use raster::Raster;

use ::image::{Rgba, RgbaImage};

use crate::Error;

/// A decoded image: row-major 32-bit ARGB pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    width: u16,
    height: u16,
    pixels: Vec<u32>,
}

impl DecodedImage {
    /// Wraps an ARGB buffer
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the buffer length does not match the dimensions
    pub fn new(width: u16, height: u16, pixels: Vec<u32>) -> Result<Self, Error> {
        if pixels.len() != usize::from(width) * usize::from(height) {
            return Err(Error::invalid_argument(format!(
                "{} pixels given for a {width}x{height} image",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Returns the width of the image
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Returns the height of the image
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Returns the ARGB pixels, row-major
    #[must_use]
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Consumes the image, returning its ARGB pixels
    #[must_use]
    pub fn into_pixels(self) -> Vec<u32> {
        self.pixels
    }

    /// Converts an RGBA image into ARGB pixels
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the image is wider or taller than `u16::MAX`
    pub fn from_rgba_image(img: &RgbaImage) -> Result<Self, Error> {
        let (width, height) = img.dimensions();
        let too_big = |_| Error::invalid_argument(format!("image of {width}x{height} is too big"));
        let width = u16::try_from(width).map_err(too_big)?;
        let height = u16::try_from(height).map_err(too_big)?;
        let pixels = img
            .pixels()
            .map(|Rgba([r, g, b, a])| {
                join_argb(u32::from(*a), u32::from(*r), u32::from(*g), u32::from(*b))
            })
            .collect();
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Converts the ARGB pixels into an RGBA image
    #[must_use]
    pub fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_fn(u32::from(self.width), u32::from(self.height), |x, y| {
            let i = y as usize * usize::from(self.width) + x as usize;
            let (a, r, g, b) = split_argb(self.pixels[i]);
            #[allow(clippy::cast_possible_truncation)]
            Rgba([r as u8, g as u8, b as u8, a as u8])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_image_round_trip() {
        let img = DecodedImage::new(2, 1, vec![0x80FF_0000, 0xFF00_10FF]).unwrap();
        let rgba = img.to_rgba_image();
        assert_eq!(rgba.get_pixel(0, 0), &Rgba([0xFF, 0, 0, 0x80]));
        assert_eq!(rgba.get_pixel(1, 0), &Rgba([0, 0x10, 0xFF, 0xFF]));
        assert_eq!(DecodedImage::from_rgba_image(&rgba).unwrap(), img);
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        assert!(DecodedImage::new(2, 2, vec![0; 3]).is_err());
    }
}
