use std::io::{Read, Write};

use tracing::{instrument, trace};

use crate::{
    bits::{BitReader, BitWriter, MAX_FIELD_BITS},
    Error,
};

/// Width of each dimension field on the wire
pub const SIZE_BITS: u8 = 9;
/// Smallest raster width (the wire stores `width - MIN_WIDTH`)
pub const MIN_WIDTH: u16 = 1;
/// Smallest raster height (the wire stores `height - MIN_HEIGHT`)
pub const MIN_HEIGHT: u16 = 1;
/// Largest raster width
pub const MAX_WIDTH: u16 = MIN_WIDTH + (1 << SIZE_BITS) - 1;
/// Largest raster height
pub const MAX_HEIGHT: u16 = MIN_HEIGHT + (1 << SIZE_BITS) - 1;

// Backing storage, narrowest element that holds `bits_per_pixel`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Samples {
    Narrow(Vec<u8>),
    Medium(Vec<u16>),
    Wide(Vec<u32>),
}

impl Samples {
    fn zeroed(bits_per_pixel: u8, len: usize) -> Self {
        match bits_per_pixel {
            0..=8 => Self::Narrow(vec![0; len]),
            9..=16 => Self::Medium(vec![0; len]),
            _ => Self::Wide(vec![0; len]),
        }
    }

    fn get(&self, i: usize) -> Option<u32> {
        match self {
            Self::Narrow(v) => v.get(i).copied().map(u32::from),
            Self::Medium(v) => v.get(i).copied().map(u32::from),
            Self::Wide(v) => v.get(i).copied(),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn set(&mut self, i: usize, value: u32) {
        match self {
            Self::Narrow(v) => v[i] = value as u8,
            Self::Medium(v) => v[i] = value as u16,
            Self::Wide(v) => v[i] = value,
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Narrow(v) => v.len(),
            Self::Medium(v) => v.len(),
            Self::Wide(v) => v.len(),
        }
    }
}

/// A rectangular block of raw pixels, row-major
///
/// Pixel values are raw: direct-model bands or palette indices, masked to
/// `bits_per_pixel`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Raster {
    width: u16,
    height: u16,
    bits_per_pixel: u8,
    samples: Samples,
}

fn check_size(width: u16, height: u16) -> Result<(), Error> {
    if !(MIN_WIDTH..=MAX_WIDTH).contains(&width) || !(MIN_HEIGHT..=MAX_HEIGHT).contains(&height) {
        return Err(Error::invalid_argument(format!(
            "raster size {width}x{height} is outside {MIN_WIDTH}x{MIN_HEIGHT}..={MAX_WIDTH}x{MAX_HEIGHT}"
        )));
    }
    Ok(())
}

impl Raster {
    /// Creates a zero-filled raster
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if a dimension is outside `1..=512` or
    /// `bits_per_pixel` is outside `1..=32`
    pub fn new(width: u16, height: u16, bits_per_pixel: u8) -> Result<Self, Error> {
        check_size(width, height)?;
        if !(1..=MAX_FIELD_BITS).contains(&bits_per_pixel) {
            return Err(Error::invalid_argument(format!(
                "{bits_per_pixel} bits per pixel is outside 1..={MAX_FIELD_BITS}"
            )));
        }
        Ok(Self {
            width,
            height,
            bits_per_pixel,
            samples: Samples::zeroed(bits_per_pixel, usize::from(width) * usize::from(height)),
        })
    }

    /// Creates a raster from row-major raw pixels
    ///
    /// # Errors
    ///
    /// See [`Self::new`]; additionally fails if `pixels.len() != width * height`
    pub fn from_pixels(
        width: u16,
        height: u16,
        bits_per_pixel: u8,
        pixels: &[u32],
    ) -> Result<Self, Error> {
        let mut raster = Self::new(width, height, bits_per_pixel)?;
        if pixels.len() != raster.samples.len() {
            return Err(Error::invalid_argument(format!(
                "{} pixels given for a {width}x{height} raster",
                pixels.len()
            )));
        }
        let mask = raster.mask();
        for (i, &p) in pixels.iter().enumerate() {
            raster.samples.set(i, p & mask);
        }
        Ok(raster)
    }

    const fn mask(&self) -> u32 {
        if self.bits_per_pixel >= 32 {
            u32::MAX
        } else {
            (1 << self.bits_per_pixel) - 1
        }
    }

    /// Returns the width of the raster
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Returns the height of the raster
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Returns the width of each stored pixel
    #[must_use]
    pub const fn bits_per_pixel(&self) -> u8 {
        self.bits_per_pixel
    }

    fn offset(&self, x: u16, y: u16) -> Option<usize> {
        (x < self.width && y < self.height)
            .then(|| usize::from(y) * usize::from(self.width) + usize::from(x))
    }

    /// Raw value at `(x, y)`
    #[must_use]
    pub fn pixel(&self, x: u16, y: u16) -> Option<u32> {
        self.offset(x, y).and_then(|i| self.samples.get(i))
    }

    /// Sets the raw value at `(x, y)`, masked to the pixel width. Out of bounds writes are ignored
    pub fn set_pixel(&mut self, x: u16, y: u16, value: u32) {
        if let Some(i) = self.offset(x, y) {
            let value = value & self.mask();
            self.samples.set(i, value);
        }
    }

    /// All raw values, row-major
    pub fn pixels(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.samples.len()).filter_map(|i| self.samples.get(i))
    }

    /// Raw values of row `y`
    #[must_use]
    pub fn row(&self, y: u16) -> Option<Vec<u32>> {
        (y < self.height).then(|| {
            let start = usize::from(y) * usize::from(self.width);
            (start..start + usize::from(self.width))
                .filter_map(|i| self.samples.get(i))
                .collect()
        })
    }

    /// Iterates over rows, top to bottom
    pub fn rows(&self) -> impl Iterator<Item = Vec<u32>> + '_ {
        (0..self.height).filter_map(|y| self.row(y))
    }

    /// Substitutes every pixel equal to `from` with `to`, returning the number replaced
    pub fn replace_pixel(&mut self, from: u32, to: u32) -> usize {
        let to = to & self.mask();
        let mut replaced = 0;
        for i in 0..self.samples.len() {
            if self.samples.get(i) == Some(from) {
                self.samples.set(i, to);
                replaced += 1;
            }
        }
        replaced
    }

    /// Total size of the raster block on the wire
    #[must_use]
    pub fn encoded_bits(&self) -> u64 {
        2 * u64::from(SIZE_BITS)
            + u64::from(self.width) * u64::from(self.height) * u64::from(self.bits_per_pixel)
    }

    /// Writes the raster block: the two dimension fields, then every pixel
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from the sink
    #[instrument(level = "trace", skip_all, fields(width = self.width, height = self.height))]
    pub fn encode<W: Write>(&self, w: &mut BitWriter<W>) -> Result<(), Error> {
        w.write_bits(u32::from(self.width - MIN_WIDTH), SIZE_BITS)?;
        w.write_bits(u32::from(self.height - MIN_HEIGHT), SIZE_BITS)?;
        for p in self.pixels() {
            w.write_bits(p, self.bits_per_pixel)?;
        }
        Ok(())
    }

    /// Reads only the dimension fields of a raster block
    ///
    /// # Errors
    ///
    /// [`Error::EndOfStream`] if the stream is truncated
    pub fn read_size<R: Read>(r: &mut BitReader<R>) -> Result<(u16, u16), Error> {
        #[allow(clippy::cast_possible_truncation)]
        let width = r.read_bits(SIZE_BITS)? as u16 + MIN_WIDTH;
        #[allow(clippy::cast_possible_truncation)]
        let height = r.read_bits(SIZE_BITS)? as u16 + MIN_HEIGHT;
        trace!("raster size {width}x{height}");
        Ok((width, height))
    }

    /// Reads a whole raster block of `bits_per_pixel`-wide pixels
    ///
    /// # Errors
    ///
    /// [`Error::EndOfStream`] if the stream is truncated
    #[instrument(level = "trace", skip(r))]
    pub fn decode<R: Read>(r: &mut BitReader<R>, bits_per_pixel: u8) -> Result<Self, Error> {
        let (width, height) = Self::read_size(r)?;
        let mut raster = Self::new(width, height, bits_per_pixel)?;
        for i in 0..raster.samples.len() {
            let p = r.read_bits(bits_per_pixel)?;
            raster.samples.set(i, p);
        }
        Ok(raster)
    }

    /// Skips over a raster block, returning its dimensions
    ///
    /// # Errors
    ///
    /// [`Error::EndOfStream`] if the stream ends before the block does
    pub fn skip<R: Read>(r: &mut BitReader<R>, bits_per_pixel: u8) -> Result<(u16, u16), Error> {
        let (width, height) = Self::read_size(r)?;
        r.skip_bits(u64::from(width) * u64::from(height) * u64::from(bits_per_pixel))?;
        Ok((width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn rejects_bad_sizes() {
        assert!(matches!(Raster::new(0, 1, 8), Err(Error::InvalidArgument(_))));
        assert!(matches!(Raster::new(513, 1, 8), Err(Error::InvalidArgument(_))));
        assert!(matches!(Raster::new(1, 513, 8), Err(Error::InvalidArgument(_))));
        assert!(matches!(Raster::new(4, 4, 0), Err(Error::InvalidArgument(_))));
        assert!(Raster::new(512, 512, 24).is_ok());
        assert!(Raster::from_pixels(2, 2, 8, &[1, 2, 3]).is_err());
    }

    #[test]
    fn encodes_dimensions_biased_by_one() {
        let raster = Raster::from_pixels(2, 1, 8, &[0x00, 0xFF]).unwrap();
        let mut w = BitWriter::new(Vec::new());
        raster.encode(&mut w).unwrap();
        assert_eq!(w.position().as_bits(), raster.encoded_bits());
        let bytes = w.into_inner().unwrap();
        // 000000001 000000000 00000000 11111111 (+ 6 padding bits)
        assert_eq!(bytes, vec![0x00, 0x80, 0x00, 0x3F, 0xC0]);

        let decoded = Raster::decode(&mut BitReader::new(Cursor::new(bytes)), 8).unwrap();
        assert_eq!(decoded, raster);
    }

    #[test]
    fn odd_widths_round_trip() {
        for bpp in [1, 3, 12, 15, 24] {
            let pixels: Vec<u32> = (0..35).map(|i| i * 7919).collect();
            let raster = Raster::from_pixels(7, 5, bpp, &pixels).unwrap();
            let mut w = BitWriter::new(Vec::new());
            raster.encode(&mut w).unwrap();
            let bytes = w.into_inner().unwrap();
            let mut r = BitReader::new(Cursor::new(bytes.clone()));
            assert_eq!(Raster::decode(&mut r, bpp).unwrap(), raster);

            let mut r = BitReader::new(Cursor::new(bytes));
            assert_eq!(Raster::skip(&mut r, bpp).unwrap(), (7, 5));
            assert_eq!(r.position().as_bits(), raster.encoded_bits());
        }
    }

    #[test]
    fn pixel_access() {
        let mut raster = Raster::new(3, 2, 4).unwrap();
        raster.set_pixel(2, 1, 0x1F);
        raster.set_pixel(3, 0, 9);
        assert_eq!(raster.pixel(2, 1), Some(0xF));
        assert_eq!(raster.pixel(3, 0), None);
        assert_eq!(raster.row(1), Some(vec![0, 0, 0xF]));
        assert_eq!(raster.rows().count(), 2);
        assert_eq!(raster.replace_pixel(0, 5), 5);
        assert_eq!(raster.pixels().collect::<Vec<_>>(), vec![5, 5, 5, 5, 5, 0xF]);
    }

    #[test]
    fn truncated_block_is_end_of_stream() {
        let raster = Raster::from_pixels(4, 4, 8, &[7; 16]).unwrap();
        let mut w = BitWriter::new(Vec::new());
        raster.encode(&mut w).unwrap();
        let mut bytes = w.into_inner().unwrap();
        bytes.truncate(10);
        let mut r = BitReader::new(Cursor::new(bytes.clone()));
        assert!(matches!(Raster::decode(&mut r, 8), Err(Error::EndOfStream)));
        let mut r = BitReader::new(Cursor::new(bytes));
        assert!(matches!(Raster::skip(&mut r, 8), Err(Error::EndOfStream)));
    }
}
