//! Conversions between 8-bit channels and narrower stored samples.

use crate::Error;

/// Widest sample the scaler accepts on either side
pub const MAX_SAMPLE_BITS: u8 = 8;

/// Rescales a `from`-bit sample to `to` bits.
///
/// Widening replicates the source bit pattern (`abc` → `abcabcab`), narrowing
/// keeps the most significant bits.
///
/// # Errors
///
/// [`Error::InvalidArgument`] if either width exceeds 8 bits
pub fn rescale(sample: u32, from: u8, to: u8) -> Result<u32, Error> {
    if from > MAX_SAMPLE_BITS || to > MAX_SAMPLE_BITS {
        return Err(Error::invalid_argument(format!(
            "sample widths {from} -> {to} exceed {MAX_SAMPLE_BITS} bits"
        )));
    }
    Ok(rescale_unchecked(sample, from, to))
}

pub(crate) const fn rescale_unchecked(sample: u32, from: u8, to: u8) -> u32 {
    if from == 0 || to == 0 {
        return 0;
    }
    let sample = sample & ((1 << from) - 1);
    if from == to {
        return sample;
    }
    if from > to {
        return sample >> (from - to);
    }
    let mut acc = sample;
    let mut bits = from;
    while bits < to {
        acc = (acc << from) | sample;
        bits += from;
    }
    acc >> (bits - to)
}

/// Widens an `n`-bit sample to an 8-bit channel value by bit replication
///
/// # Errors
///
/// [`Error::InvalidArgument`] if `n > 8`
pub fn expand(sample: u32, n: u8) -> Result<u8, Error> {
    #[allow(clippy::cast_possible_truncation)]
    rescale(sample, n, 8).map(|v| v as u8)
}

/// Truncates an 8-bit channel value to its `n` most significant bits
///
/// # Errors
///
/// [`Error::InvalidArgument`] if `n > 8`
pub fn reduce(value: u8, n: u8) -> Result<u32, Error> {
    rescale(u32::from(value), 8, n)
}
