use std::fmt::Display;

use strum::{Display as StrumDisplay, IntoStaticStr};

use crate::Error;

/// Number of bits used to store a depth code on the wire
pub const DEPTH_BITS: u8 = 4;
/// Lowest depth code that may carry a palette
pub const MIN_DEPTH_TO_USE_PALETTE: u8 = 1;
/// Widest raw pixel of any profile
pub const MAX_BITS_PER_COLOR: u8 = 24;

const RGB_MASK: u8 = 0b1000;
const ALPHA_MASK: u8 = 0b0100;

// band widths in band order: (gray[, alpha]) or (r, g, b[, a])
const BANDS: [&[u8]; 16] = [
    &[1],
    &[2],
    &[4],
    &[8],
    &[2, 2],
    &[4, 4],
    &[6, 6],
    &[8, 8],
    &[3, 3, 2],
    &[4, 4, 4],
    &[5, 5, 5],
    &[5, 6, 5],
    &[3, 3, 3, 3],
    &[4, 4, 4, 4],
    &[5, 5, 5, 5],
    &[6, 6, 6, 6],
];

#[derive(Debug, Eq, PartialEq, Copy, Clone, StrumDisplay, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
/// Color space of a depth profile
pub enum ColorSpace {
    /// Single luminance band
    Gray,
    /// Red, green and blue bands
    Rgb,
}

/// One of the sixteen fixed pixel layouts, selected by a 4-bit code.
///
/// Codes `0..=7` are grayscale, `8..=15` RGB; bit 2 of the code adds an alpha band.
///
/// Bands are stored MSB-first. Layouts with an even number of bands put the
/// alpha band (the last one in band order) in the most significant field and
/// the remaining bands after it, while odd layouts are stored in band order.
/// Existing BPI files depend on this ordering.
#[derive(Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Copy, Clone)]
pub struct DepthProfile(u8);

impl TryFrom<u8> for DepthProfile {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        if usize::from(code) < BANDS.len() {
            Ok(Self(code))
        } else {
            Err(Error::invalid_argument(format!(
                "depth code {code} is not within 0..=15"
            )))
        }
    }
}

impl From<DepthProfile> for u8 {
    fn from(value: DepthProfile) -> Self {
        value.0
    }
}

impl Display for DepthProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let widths = self
            .band_widths()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("");
        let suffix = if self.has_alpha() { "a" } else { "" };
        write!(f, "{}{suffix}{widths}", self.color_space())
    }
}

impl DepthProfile {
    /// 1-bit opaque gray
    pub const GRAY1: Self = Self(0);
    /// 8-bit opaque gray
    pub const GRAY8: Self = Self(3);
    /// 8-bit gray with 8-bit alpha
    pub const GRAY8_ALPHA8: Self = Self(7);
    /// 16-bit RGB 565
    pub const RGB565: Self = Self(11);
    /// 24-bit RGBA 6666
    pub const RGBA6666: Self = Self(15);

    /// Iterates over all sixteen profiles in code order
    pub fn all() -> impl Iterator<Item = Self> {
        (0..16).map(Self)
    }

    /// The 4-bit wire code
    #[must_use]
    pub const fn code(self) -> u8 {
        self.0
    }

    /// Whether the profile stores red, green and blue bands
    #[must_use]
    pub const fn is_rgb(self) -> bool {
        self.0 & RGB_MASK != 0
    }

    /// Whether the profile stores an alpha band
    #[must_use]
    pub const fn has_alpha(self) -> bool {
        self.0 & ALPHA_MASK != 0
    }

    /// Gray or RGB
    #[must_use]
    pub const fn color_space(self) -> ColorSpace {
        if self.is_rgb() {
            ColorSpace::Rgb
        } else {
            ColorSpace::Gray
        }
    }

    /// Band widths in band order (gray[, alpha] or r, g, b[, a])
    #[must_use]
    pub const fn band_widths(self) -> &'static [u8] {
        BANDS[self.0 as usize]
    }

    /// Width of a raw pixel (sum of all band widths)
    #[must_use]
    pub fn bits_per_color(self) -> u8 {
        self.band_widths().iter().sum()
    }

    /// Whether a palette can be attached to this profile
    #[must_use]
    pub const fn can_use_palette(self) -> bool {
        self.0 >= MIN_DEPTH_TO_USE_PALETTE
    }

    /// The opaque profile of the same family (alpha bit cleared)
    #[must_use]
    pub const fn without_alpha(self) -> Self {
        Self(self.0 & !ALPHA_MASK)
    }

    /// The profile of the same family with an alpha band
    #[must_use]
    pub const fn with_alpha(self) -> Self {
        Self(self.0 | ALPHA_MASK)
    }

    /// Band indices in storage order, most significant field first
    fn storage_order(self) -> impl Iterator<Item = usize> {
        let n = self.band_widths().len();
        let rotate = usize::from(n % 2 == 0);
        (0..n).map(move |i| (i + n - rotate) % n)
    }

    /// Packs band values (band order, each already at its band width) into a raw pixel.
    /// Extra bits of each band value are discarded.
    #[must_use]
    pub fn pack_bands(self, bands: &[u32]) -> u32 {
        let widths = self.band_widths();
        self.storage_order().fold(0, |raw, band| {
            let w = widths[band];
            let v = bands.get(band).copied().unwrap_or(0) & ((1 << w) - 1);
            (raw << w) | v
        })
    }

    /// Splits a raw pixel into band values, returned in band order
    #[must_use]
    pub fn unpack_bands(self, raw: u32) -> Vec<u32> {
        let widths = self.band_widths();
        let mut bands = vec![0; widths.len()];
        let mut shift = u32::from(self.bits_per_color());
        for band in self.storage_order() {
            let w = widths[band];
            shift -= u32::from(w);
            bands[band] = (raw >> shift) & ((1 << w) - 1);
        }
        bands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_widths() {
        let expected = [1, 2, 4, 8, 4, 8, 12, 16, 8, 12, 15, 16, 12, 16, 20, 24];
        for (profile, bits) in DepthProfile::all().zip(expected) {
            assert_eq!(profile.bits_per_color(), bits, "{profile}");
            assert!(profile.bits_per_color() <= MAX_BITS_PER_COLOR);
        }
    }

    #[test]
    fn flags_follow_code_bits() {
        let p = DepthProfile::try_from(13).unwrap();
        assert!(p.is_rgb());
        assert!(p.has_alpha());
        assert_eq!(p.without_alpha().code(), 9);
        assert_eq!(DepthProfile::try_from(2).unwrap().with_alpha().code(), 6);
        assert!(!DepthProfile::GRAY1.can_use_palette());
        assert!(DepthProfile::try_from(1).unwrap().can_use_palette());
        assert!(DepthProfile::try_from(16).is_err());
    }

    #[test]
    fn alpha_is_stored_first_for_even_band_counts() {
        // gray 4 + alpha 4: alpha in the high nibble
        let p = DepthProfile::try_from(5).unwrap();
        assert_eq!(p.pack_bands(&[0x3, 0xC]), 0xC3);
        assert_eq!(p.unpack_bands(0xC3), vec![0x3, 0xC]);

        // rgba 4444: a, r, g, b
        let p = DepthProfile::try_from(13).unwrap();
        assert_eq!(p.pack_bands(&[0x1, 0x2, 0x3, 0x4]), 0x4123);
        assert_eq!(p.unpack_bands(0x4123), vec![1, 2, 3, 4]);
    }

    #[test]
    fn odd_band_counts_keep_band_order() {
        let p = DepthProfile::RGB565;
        assert_eq!(p.pack_bands(&[0x1F, 0, 0x1F]), 0b11111_000000_11111);
        assert_eq!(p.unpack_bands(0xFFFF), vec![0x1F, 0x3F, 0x1F]);
    }

    #[test]
    fn names() {
        assert_eq!(DepthProfile::GRAY1.to_string(), "gray1");
        assert_eq!(DepthProfile::RGBA6666.to_string(), "rgba6666");
        assert_eq!(DepthProfile::RGB565.to_string(), "rgb565");
    }
}
