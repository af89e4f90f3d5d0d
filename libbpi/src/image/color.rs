//! Color models: how raw stored pixels map to and from 32-bit ARGB.

use std::{
    collections::HashSet,
    io::{Read, Write},
};

use itertools::Itertools;
use tracing::{debug, instrument, trace};

use super::{
    depth::{ColorSpace, DepthProfile, DEPTH_BITS},
    palette::{Palette, MIN_PALETTE_LENGTH, TRANSPARENT_SENTINEL},
    scale::rescale_unchecked,
};
use crate::{
    bits::{BitReader, BitWriter},
    Error,
};

const OPAQUE: u32 = 0xFF;

/// Splits an ARGB value into `(a, r, g, b)`
#[must_use]
pub const fn split_argb(argb: u32) -> (u32, u32, u32, u32) {
    (
        argb >> 24,
        (argb >> 16) & 0xFF,
        (argb >> 8) & 0xFF,
        argb & 0xFF,
    )
}

/// Composes `(a, r, g, b)` 8-bit channels into an ARGB value
#[must_use]
pub const fn join_argb(a: u32, r: u32, g: u32, b: u32) -> u32 {
    ((a & 0xFF) << 24) | ((r & 0xFF) << 16) | ((g & 0xFF) << 8) | (b & 0xFF)
}

/// Integer luma approximation used when a colored pixel is stored in a gray profile
#[must_use]
pub const fn luma(r: u32, g: u32, b: u32) -> u32 {
    (77 * r + 150 * g + 29 * b + 128) >> 8
}

/// Pixel values are the color itself, scaled from the profile's band widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirectModel {
    profile: DepthProfile,
    transparent: Option<u32>,
}

impl DirectModel {
    /// Creates a direct model, optionally reserving one raw value as fully transparent
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if a transparent value is given for a profile
    /// with an alpha band, or does not fit the profile's pixel width
    pub fn new(profile: DepthProfile, transparent: Option<u32>) -> Result<Self, Error> {
        if let Some(value) = transparent {
            if profile.has_alpha() {
                return Err(Error::invalid_argument(format!(
                    "profile {profile} has an alpha band and cannot declare a transparent value"
                )));
            }
            if u64::from(value) >> profile.bits_per_color() != 0 {
                return Err(Error::invalid_argument(format!(
                    "transparent value {value:#x} does not fit in {} bits",
                    profile.bits_per_color()
                )));
            }
        }
        Ok(Self {
            profile,
            transparent,
        })
    }

    /// Direct model without a transparent value
    #[must_use]
    pub const fn opaque(profile: DepthProfile) -> Self {
        Self {
            profile,
            transparent: None,
        }
    }

    /// The depth profile
    #[must_use]
    pub const fn profile(&self) -> DepthProfile {
        self.profile
    }

    /// The raw value reserved for transparency
    #[must_use]
    pub const fn transparent(&self) -> Option<u32> {
        self.transparent
    }

    /// Expands a raw pixel into ARGB
    #[must_use]
    pub fn to_argb(&self, raw: u32) -> u32 {
        let bits = u32::from(self.profile.bits_per_color());
        let raw = raw & ((1u64 << bits) - 1) as u32;
        let widths = self.profile.band_widths();
        let bands = self.profile.unpack_bands(raw);
        let expand = |band: usize| rescale_unchecked(bands[band], widths[band], 8);

        let (mut a, r, g, b) = match self.profile.color_space() {
            ColorSpace::Gray => {
                let v = expand(0);
                let a = if self.profile.has_alpha() { expand(1) } else { OPAQUE };
                (a, v, v, v)
            }
            ColorSpace::Rgb => {
                let a = if self.profile.has_alpha() { expand(3) } else { OPAQUE };
                (a, expand(0), expand(1), expand(2))
            }
        };
        if self.transparent == Some(raw) {
            a = 0;
        }
        join_argb(a, r, g, b)
    }

    /// Reduces an ARGB color to a raw pixel
    #[must_use]
    pub fn from_argb(&self, argb: u32) -> u32 {
        let (a, r, g, b) = split_argb(argb);
        if a == 0 {
            if let Some(value) = self.transparent {
                return value;
            }
        }
        let widths = self.profile.band_widths();
        let reduce = |v: u32, band: usize| rescale_unchecked(v, 8, widths[band]);
        let bands: Vec<u32> = match self.profile.color_space() {
            ColorSpace::Gray => {
                let v = if r == g && g == b { r } else { luma(r, g, b) };
                let mut bands = vec![reduce(v, 0)];
                if self.profile.has_alpha() {
                    bands.push(reduce(a, 1));
                }
                bands
            }
            ColorSpace::Rgb => {
                let mut bands = vec![reduce(r, 0), reduce(g, 1), reduce(b, 2)];
                if self.profile.has_alpha() {
                    bands.push(reduce(a, 3));
                }
                bands
            }
        };
        self.profile.pack_bands(&bands)
    }
}

/// Pixel values index a [`Palette`] whose entries use the profile's band layout on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexedModel {
    profile: DepthProfile,
    palette: Palette,
}

impl IndexedModel {
    /// Largest palette (sentinel included) the profile's length field can describe
    #[must_use]
    pub fn max_palette_len(profile: DepthProfile) -> usize {
        (1usize << (profile.bits_per_color() - 1)) + MIN_PALETTE_LENGTH - 1
    }

    /// Attaches a palette to a profile
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the profile cannot carry a palette, if a
    /// transparent sentinel is requested on a profile with an alpha band, or if
    /// the palette is too long for the profile's length field
    pub fn new(profile: DepthProfile, palette: Palette) -> Result<Self, Error> {
        if !profile.can_use_palette() {
            return Err(Error::invalid_argument(format!(
                "profile {profile} cannot carry a palette"
            )));
        }
        if palette.has_transparent() && profile.has_alpha() {
            return Err(Error::invalid_argument(format!(
                "profile {profile} has an alpha band and cannot reserve a transparent entry"
            )));
        }
        let max = Self::max_palette_len(profile);
        if palette.len() > max {
            return Err(Error::invalid_argument(format!(
                "palette of {} entries exceeds the {max} allowed by profile {profile}",
                palette.len()
            )));
        }
        Ok(Self { profile, palette })
    }

    /// The depth profile the palette entries are stored with
    #[must_use]
    pub const fn profile(&self) -> DepthProfile {
        self.profile
    }

    /// The palette
    #[must_use]
    pub const fn palette(&self) -> &Palette {
        &self.palette
    }
}

/// How the raw pixels of a raster are turned into colors
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColorModel {
    /// Raw pixels are scaled color bands
    Direct(DirectModel),
    /// Raw pixels are palette indices
    Indexed(IndexedModel),
}

impl From<DirectModel> for ColorModel {
    fn from(value: DirectModel) -> Self {
        Self::Direct(value)
    }
}

impl From<IndexedModel> for ColorModel {
    fn from(value: IndexedModel) -> Self {
        Self::Indexed(value)
    }
}

impl ColorModel {
    /// The underlying depth profile
    #[must_use]
    pub const fn profile(&self) -> DepthProfile {
        match self {
            Self::Direct(m) => m.profile,
            Self::Indexed(m) => m.profile,
        }
    }

    /// Width of one stored pixel for rasters using this model
    #[must_use]
    pub fn bits_per_pixel(&self) -> u8 {
        match self {
            Self::Direct(m) => m.profile.bits_per_color(),
            Self::Indexed(m) => m.palette.index_bits(),
        }
    }

    /// The palette of an indexed model
    #[must_use]
    pub const fn palette(&self) -> Option<&Palette> {
        match self {
            Self::Direct(_) => None,
            Self::Indexed(m) => Some(&m.palette),
        }
    }

    /// Converts a raw pixel to ARGB
    #[must_use]
    pub fn to_argb(&self, raw: u32) -> u32 {
        match self {
            Self::Direct(m) => m.to_argb(raw),
            Self::Indexed(m) => m.palette.get(raw),
        }
    }

    /// Converts an ARGB color to a raw pixel
    #[must_use]
    pub fn from_argb(&self, argb: u32) -> u32 {
        match self {
            Self::Direct(m) => m.from_argb(argb),
            Self::Indexed(m) => m.palette.index_of(argb),
        }
    }

    /// Number of bits the color-model block occupies on the wire
    #[must_use]
    pub fn encoded_bits(&self) -> u64 {
        let profile = self.profile();
        let bpc = u64::from(profile.bits_per_color());
        let mut bits = u64::from(DEPTH_BITS);
        if profile.can_use_palette() {
            bits += 1;
        }
        if !profile.has_alpha() {
            bits += 1;
        }
        match self {
            Self::Direct(m) if m.transparent.is_some() => bits + bpc,
            Self::Direct(_) => bits,
            Self::Indexed(m) => bits + (bpc - 1) + bpc * m.palette.stored_colors().len() as u64,
        }
    }

    /// Reads a color-model block
    ///
    /// # Errors
    ///
    /// [`Error::EndOfStream`] if the block is truncated
    #[instrument(level = "trace", skip_all)]
    pub fn read<R: Read>(r: &mut BitReader<R>) -> Result<Self, Error> {
        #[allow(clippy::cast_possible_truncation)]
        let profile = DepthProfile::try_from(r.read_bits(DEPTH_BITS)? as u8)?;
        let has_palette = profile.can_use_palette() && r.read_bit()?;
        let has_transparent = !profile.has_alpha() && r.read_bit()?;
        let bpc = profile.bits_per_color();
        trace!(%profile, has_palette, has_transparent, "color model header");

        if !has_palette {
            let transparent = if has_transparent {
                Some(r.read_bits(bpc)?)
            } else {
                None
            };
            return Ok(Self::Direct(DirectModel {
                profile,
                transparent,
            }));
        }

        let len = r.read_bits(bpc - 1)? as usize + MIN_PALETTE_LENGTH;
        let stored = len - usize::from(has_transparent);
        let entries = DirectModel::opaque(profile);
        let colors = (0..stored)
            .map(|_| r.read_bits(bpc).map(|raw| entries.to_argb(raw)))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("read palette of {len} entries for {profile}");
        Ok(Self::Indexed(IndexedModel {
            profile,
            palette: Palette::from_parts(colors, has_transparent)?,
        }))
    }

    /// Writes a color-model block
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from the sink
    #[instrument(level = "trace", skip_all)]
    pub fn write<W: Write>(&self, w: &mut BitWriter<W>) -> Result<(), Error> {
        let profile = self.profile();
        let bpc = profile.bits_per_color();
        w.write_bits(u32::from(profile.code()), DEPTH_BITS)?;
        if profile.can_use_palette() {
            w.write_bit(matches!(self, Self::Indexed(_)))?;
        }
        match self {
            Self::Direct(m) => {
                if !profile.has_alpha() {
                    w.write_bit(m.transparent.is_some())?;
                }
                if let Some(value) = m.transparent {
                    w.write_bits(value, bpc)?;
                }
            }
            Self::Indexed(m) => {
                if !profile.has_alpha() {
                    w.write_bit(m.palette.has_transparent())?;
                }
                #[allow(clippy::cast_possible_truncation)]
                w.write_bits((m.palette.len() - MIN_PALETTE_LENGTH) as u32, bpc - 1)?;
                let entries = DirectModel::opaque(profile);
                for &color in m.palette.stored_colors() {
                    w.write_bits(entries.from_argb(color), bpc)?;
                }
            }
        }
        Ok(())
    }

    /// Picks a color model for an ARGB buffer.
    ///
    /// The smallest direct profile that reproduces every visible color exactly
    /// is preferred, falling back to 8-bit gray or RGB 565. Fully transparent
    /// pixels get a spare raw value when the profile has no alpha band. An
    /// indexed model over the same profile replaces the direct one when it
    /// encodes to fewer bits.
    #[must_use]
    #[instrument(level = "debug", skip(pixels), fields(pixels = pixels.len()))]
    pub fn infer(pixels: &[u32]) -> Self {
        let stats = PixelStats::collect(pixels);
        let direct = stats.direct_candidate();
        let Some(indexed) = stats.indexed_candidate(direct.profile) else {
            debug!("inferred direct {}", direct.profile);
            return Self::Direct(direct);
        };

        let count = pixels.len() as u64;
        let direct_model = Self::Direct(direct);
        let direct_bits =
            direct_model.encoded_bits() + count * u64::from(direct_model.bits_per_pixel());
        let indexed_model = Self::Indexed(indexed);
        let indexed_bits =
            indexed_model.encoded_bits() + count * u64::from(indexed_model.bits_per_pixel());
        debug!(direct_bits, indexed_bits, "comparing candidates");
        if indexed_bits < direct_bits {
            indexed_model
        } else {
            direct_model
        }
    }
}

struct PixelStats {
    visible: Vec<u32>,
    gray: bool,
    translucent: bool,
    transparent: bool,
}

impl PixelStats {
    fn collect(pixels: &[u32]) -> Self {
        let mut transparent = false;
        let mut translucent = false;
        let mut gray = true;
        let mut visible = Vec::new();
        let mut seen = HashSet::new();
        for &argb in pixels {
            let (a, r, g, b) = split_argb(argb);
            match a {
                0 => {
                    transparent = true;
                    continue;
                }
                OPAQUE => {}
                _ => translucent = true,
            }
            gray &= r == g && g == b;
            if seen.insert(argb) {
                visible.push(argb);
            }
        }
        Self {
            visible,
            gray,
            translucent,
            transparent,
        }
    }

    fn family(&self) -> [u8; 4] {
        if self.gray {
            [0, 1, 2, 3]
        } else {
            [8, 9, 10, 11]
        }
    }

    fn profiles(&self) -> impl Iterator<Item = DepthProfile> {
        self.family()
            .into_iter()
            .filter_map(|code| DepthProfile::try_from(code).ok())
    }

    fn is_exact(&self, profile: DepthProfile) -> bool {
        let model = DirectModel::opaque(profile);
        self.visible
            .iter()
            .all(|&argb| model.to_argb(model.from_argb(argb)) == argb)
    }

    fn direct_candidate(&self) -> DirectModel {
        if self.translucent {
            let profile = if self.gray {
                DepthProfile::GRAY8_ALPHA8
            } else {
                DepthProfile::RGBA6666
            };
            return DirectModel::opaque(profile);
        }

        let fallback = if self.gray {
            DepthProfile::GRAY8
        } else {
            DepthProfile::RGB565
        };
        let start = self
            .profiles()
            .find(|&p| self.is_exact(p))
            .unwrap_or(fallback);
        if !self.transparent {
            return DirectModel::opaque(start);
        }

        for profile in self.profiles().filter(|p| *p >= start) {
            if let Some(value) = self.spare_raw_value(profile) {
                trace!("transparent raw value {value:#x} for {profile}");
                return DirectModel {
                    profile,
                    transparent: Some(value),
                };
            }
        }
        DirectModel::opaque(fallback.with_alpha())
    }

    fn spare_raw_value(&self, profile: DepthProfile) -> Option<u32> {
        let model = DirectModel::opaque(profile);
        let used: HashSet<u32> = self.visible.iter().map(|&c| model.from_argb(c)).collect();
        (0..(1u32 << profile.bits_per_color())).find(|raw| !used.contains(raw))
    }

    fn indexed_candidate(&self, profile: DepthProfile) -> Option<IndexedModel> {
        if !profile.can_use_palette() {
            return None;
        }
        let entries = DirectModel::opaque(profile);
        let mut colors = self
            .visible
            .iter()
            .map(|&c| entries.to_argb(entries.from_argb(c)))
            .unique()
            .collect_vec();
        if self.transparent && profile.has_alpha() && colors.iter().all(|&c| c >> 24 != 0) {
            colors.push(TRANSPARENT_SENTINEL);
        }
        let sentinel = self.transparent && !profile.has_alpha();
        let palette = Palette::from_parts(colors, sentinel).ok()?;
        IndexedModel::new(profile, palette).ok()
    }
}
