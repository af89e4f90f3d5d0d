//! MSB-first bit cursor over byte streams.
//!
//! Every BPI field (block headers, palette entries, pixel samples) is packed
//! back to back with no byte alignment, so both sides of the codec work on
//! top of these two types.

use std::io::{self, Read, Seek, SeekFrom, Write};
use tracing::trace;

use crate::Error;

/// Widest field that can be read or written in one call
pub const MAX_FIELD_BITS: u8 = 32;

/// An exact cursor position inside a bit stream
///
/// `byte` is counted from the start of the BPI stream, `bit` is the number of
/// bits of that byte already consumed (`0..=7`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BitPosition {
    /// byte offset since the stream start
    pub byte: u64,
    /// bit offset within the byte
    pub bit: u8,
}

impl BitPosition {
    /// Position `bits` bits after the stream start
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            byte: bits / 8,
            #[allow(clippy::cast_possible_truncation)]
            bit: (bits % 8) as u8,
        }
    }

    /// Total number of bits since the stream start
    #[must_use]
    pub const fn as_bits(self) -> u64 {
        self.byte * 8 + self.bit as u64
    }
}

#[inline]
const fn low_mask(bits: u8) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1 << bits) - 1
    }
}

fn check_width(n: u8) -> Result<(), Error> {
    if n > MAX_FIELD_BITS {
        return Err(Error::invalid_argument(format!(
            "cannot transfer {n} bits at once (max {MAX_FIELD_BITS})"
        )));
    }
    Ok(())
}

/// Reads unsigned fields of 0 to 32 bits, most significant bit first
#[derive(Debug)]
pub struct BitReader<R> {
    inner: R,
    origin: u64,
    current: u8,
    bits_left: u8,
    bytes_read: u64,
}

impl<R: Read> BitReader<R> {
    /// Creates a reader whose offsets are absolute positions in `inner`.
    ///
    /// `inner` is expected to be at its start; use [`Self::with_origin`] for a stream embedded
    /// further into `inner`.
    pub const fn new(inner: R) -> Self {
        Self::with_origin(inner, 0)
    }

    /// Creates a reader whose offsets are relative to absolute position `origin` of `inner`.
    ///
    /// `inner` is expected to be positioned at `origin`.
    pub const fn with_origin(inner: R, origin: u64) -> Self {
        Self {
            inner,
            origin,
            current: 0,
            bits_left: 0,
            bytes_read: 0,
        }
    }

    fn fetch(&mut self) -> Result<(), Error> {
        let mut byte = [0];
        self.inner.read_exact(&mut byte)?;
        self.current = byte[0];
        self.bits_left = 8;
        self.bytes_read += 1;
        Ok(())
    }

    /// Returns the next `n` bits as an unsigned integer
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `n > 32`
    /// - [`Error::EndOfStream`] if fewer than `n` bits remain
    pub fn read_bits(&mut self, n: u8) -> Result<u32, Error> {
        check_width(n)?;
        let mut remaining = n;
        let mut value = 0u32;
        while remaining > 0 {
            if self.bits_left == 0 {
                self.fetch()?;
            }
            let take = remaining.min(self.bits_left);
            let chunk = u32::from(self.current >> (self.bits_left - take)) & low_mask(take);
            value = (value << take) | chunk;
            self.bits_left -= take;
            remaining -= take;
        }
        Ok(value)
    }

    /// Returns the next bit
    ///
    /// # Errors
    ///
    /// [`Error::EndOfStream`] if the stream is exhausted
    pub fn read_bit(&mut self) -> Result<bool, Error> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Advances the cursor by `n` bits without materializing them
    ///
    /// # Errors
    ///
    /// [`Error::EndOfStream`] if fewer than `n` bits remain
    pub fn skip_bits(&mut self, n: u64) -> Result<(), Error> {
        let buffered = u64::from(self.bits_left);
        if n <= buffered {
            #[allow(clippy::cast_possible_truncation)]
            {
                self.bits_left -= n as u8;
            }
            return Ok(());
        }
        let rest = n - buffered;
        self.bits_left = 0;

        let whole_bytes = rest / 8;
        let copied = io::copy(&mut (&mut self.inner).take(whole_bytes), &mut io::sink())?;
        self.bytes_read += copied;
        if copied < whole_bytes {
            return Err(Error::EndOfStream);
        }

        #[allow(clippy::cast_possible_truncation)]
        let tail = (rest % 8) as u8;
        if tail > 0 {
            self.fetch()?;
            self.bits_left -= tail;
        }
        trace!("skipped {n} bits");
        Ok(())
    }

    /// The position of the next unread bit
    #[must_use]
    pub const fn position(&self) -> BitPosition {
        if self.bits_left == 0 {
            BitPosition {
                byte: self.bytes_read,
                bit: 0,
            }
        } else {
            BitPosition {
                byte: self.bytes_read - 1,
                bit: 8 - self.bits_left,
            }
        }
    }

    /// Returns the wrapped byte source, dropping any partially consumed byte
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> BitReader<R> {
    /// Restores a cursor position previously returned by [`Self::position`]
    ///
    /// # Errors
    ///
    /// Fails if the underlying stream cannot seek, or with
    /// [`Error::EndOfStream`] if the position points inside a missing byte.
    pub fn seek(&mut self, pos: BitPosition) -> Result<(), Error> {
        if pos.bit > 7 {
            return Err(Error::invalid_argument(format!(
                "bit offset {} is not within a byte",
                pos.bit
            )));
        }
        self.inner.seek(SeekFrom::Start(self.origin + pos.byte))?;
        self.bytes_read = pos.byte;
        self.bits_left = 0;
        if pos.bit > 0 {
            self.fetch()?;
            self.bits_left -= pos.bit;
        }
        trace!("seeked to {pos:?}");
        Ok(())
    }
}

/// Writes unsigned fields of 0 to 32 bits, most significant bit first
///
/// A partially filled byte is kept until [`Self::flush`] pads it with zero bits.
#[derive(Debug)]
pub struct BitWriter<W: Write> {
    inner: W,
    current: u8,
    bits_used: u8,
    bytes_written: u64,
}

impl<W: Write> BitWriter<W> {
    /// Creates a writer over `inner`
    pub const fn new(inner: W) -> Self {
        Self {
            inner,
            current: 0,
            bits_used: 0,
            bytes_written: 0,
        }
    }

    fn emit(&mut self) -> Result<(), Error> {
        self.inner.write_all(&[self.current])?;
        self.bytes_written += 1;
        self.current = 0;
        self.bits_used = 0;
        Ok(())
    }

    /// Writes the low `n` bits of `value`
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `n > 32`
    /// - an I/O error from the underlying sink
    pub fn write_bits(&mut self, value: u32, n: u8) -> Result<(), Error> {
        check_width(n)?;
        let mut remaining = n;
        while remaining > 0 {
            let free = 8 - self.bits_used;
            let take = remaining.min(free);
            #[allow(clippy::cast_possible_truncation)]
            let chunk = ((value >> (remaining - take)) & low_mask(take)) as u8;
            self.current |= chunk << (free - take);
            self.bits_used += take;
            remaining -= take;
            if self.bits_used == 8 {
                self.emit()?;
            }
        }
        Ok(())
    }

    /// Writes a single bit
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from the underlying sink
    pub fn write_bit(&mut self, bit: bool) -> Result<(), Error> {
        self.write_bits(u32::from(bit), 1)
    }

    /// The position the next bit will be written at
    #[must_use]
    pub const fn position(&self) -> BitPosition {
        BitPosition {
            byte: self.bytes_written,
            bit: self.bits_used,
        }
    }

    /// Pads the pending partial byte with zero bits, writes it and flushes the sink
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from the underlying sink
    pub fn flush(&mut self) -> Result<(), Error> {
        if self.bits_used > 0 {
            self.emit()?;
        }
        self.inner.flush()?;
        Ok(())
    }

    /// Flushes and returns the wrapped sink
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from the underlying sink
    pub fn into_inner(mut self) -> Result<W, Error> {
        self.flush()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_fields_across_byte_boundaries() {
        // 1010_1100 0111_0001
        let mut r = BitReader::new(Cursor::new(vec![0xAC, 0x71]));
        assert_eq!(r.read_bits(3).unwrap(), 0b101);
        assert_eq!(r.read_bits(9).unwrap(), 0b0_1100_0111);
        assert!(!r.read_bit().unwrap());
        assert_eq!(r.position(), BitPosition { byte: 1, bit: 5 });
        assert_eq!(r.read_bits(3).unwrap(), 0b001);
        assert!(matches!(r.read_bits(1), Err(Error::EndOfStream)));
    }

    #[test]
    fn full_width_fields() {
        let mut r = BitReader::new(Cursor::new(vec![0xDE, 0xAD, 0xBE, 0xEF, 0x80]));
        assert_eq!(r.read_bits(0).unwrap(), 0);
        assert_eq!(r.read_bits(32).unwrap(), 0xDEAD_BEEF);
        assert!(r.read_bit().unwrap());
        assert!(matches!(r.read_bits(33), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn writer_pads_last_byte() {
        let mut w = BitWriter::new(Vec::new());
        w.write_bits(0b101, 3).unwrap();
        w.write_bits(0x1FF, 9).unwrap();
        w.write_bit(true).unwrap();
        assert_eq!(w.position(), BitPosition { byte: 1, bit: 5 });
        let bytes = w.into_inner().unwrap();
        assert_eq!(bytes, vec![0b1011_1111, 0b1111_1000]);
    }

    #[test]
    fn writer_masks_wide_values() {
        let mut w = BitWriter::new(Vec::new());
        w.write_bits(0xFFFF_FFF0, 4).unwrap();
        w.write_bits(0x1234_5678, 32).unwrap();
        w.write_bits(0, 4).unwrap();
        let bytes = w.into_inner().unwrap();
        assert_eq!(bytes, vec![0x01, 0x23, 0x45, 0x67, 0x80]);
    }

    #[test]
    fn skip_and_seek_restore_exact_positions() {
        let data: Vec<u8> = (0u8..16).collect();
        let mut r = BitReader::new(Cursor::new(data));
        r.read_bits(5).unwrap();
        r.skip_bits(2).unwrap();
        let mark = r.position();
        assert_eq!(mark, BitPosition { byte: 0, bit: 7 });
        let expected = r.read_bits(13).unwrap();

        r.skip_bits(29).unwrap();
        assert_eq!(r.position().as_bits(), 7 + 13 + 29);

        r.seek(mark).unwrap();
        assert_eq!(r.read_bits(13).unwrap(), expected);
        assert!(matches!(r.skip_bits(200), Err(Error::EndOfStream)));
    }

    #[test]
    fn seek_offsets_follow_the_origin() {
        let data: Vec<u8> = (0u8..8).map(|b| b * 0x11).collect();
        let mut r = BitReader::new(Cursor::new(data.clone()));
        r.read_bits(8).unwrap();
        r.seek(BitPosition { byte: 3, bit: 0 }).unwrap();
        assert_eq!(r.read_bits(8).unwrap(), 0x33);

        let mut inner = Cursor::new(data);
        inner.set_position(2);
        let mut r = BitReader::with_origin(inner, 2);
        assert_eq!(r.read_bits(8).unwrap(), 0x22);
        r.seek(BitPosition { byte: 1, bit: 4 }).unwrap();
        assert_eq!(r.read_bits(4).unwrap(), 0x3);
        assert_eq!(r.position(), BitPosition { byte: 2, bit: 0 });
    }

    #[test]
    fn bit_position_conversions() {
        let p = BitPosition::from_bits(83);
        assert_eq!(p, BitPosition { byte: 10, bit: 3 });
        assert_eq!(p.as_bits(), 83);
    }
}
