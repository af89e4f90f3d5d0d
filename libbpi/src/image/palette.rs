use tracing::warn;

use crate::Error;

/// Smallest number of entries a palette can hold, sentinel included
pub const MIN_PALETTE_LENGTH: usize = 2;

/// Color used for the reserved transparent entry
pub const TRANSPARENT_SENTINEL: u32 = 0x0000_0000;

/// Ordered list of ARGB colors addressed by pixel index.
///
/// A transparent palette reserves its last entry as the transparent sentinel;
/// that entry is implied on the wire and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Palette {
    colors: Vec<u32>,
    transparent: bool,
}

impl Palette {
    /// Creates an opaque palette
    ///
    /// # Errors
    ///
    /// [`Error::MalformedDescriptor`] if fewer than [`MIN_PALETTE_LENGTH`] colors are given
    pub fn new(colors: Vec<u32>) -> Result<Self, Error> {
        Self::from_parts(colors, false)
    }

    /// Creates a palette whose trailing entry is the transparent sentinel, appended after `colors`
    ///
    /// # Errors
    ///
    /// [`Error::MalformedDescriptor`] if the resulting length is below [`MIN_PALETTE_LENGTH`]
    pub fn with_transparent(colors: Vec<u32>) -> Result<Self, Error> {
        Self::from_parts(colors, true)
    }

    pub(crate) fn from_parts(mut colors: Vec<u32>, transparent: bool) -> Result<Self, Error> {
        if transparent {
            colors.push(TRANSPARENT_SENTINEL);
        }
        if colors.len() < MIN_PALETTE_LENGTH {
            return Err(Error::malformed(format!(
                "palette holds {} entries, at least {MIN_PALETTE_LENGTH} are required",
                colors.len()
            )));
        }
        Ok(Self {
            colors,
            transparent,
        })
    }

    /// Number of entries, sentinel included
    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Always `false`: a palette holds at least [`MIN_PALETTE_LENGTH`] entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Whether the last entry is the transparent sentinel
    #[must_use]
    pub const fn has_transparent(&self) -> bool {
        self.transparent
    }

    /// All entries in index order, sentinel included
    #[must_use]
    pub fn colors(&self) -> &[u32] {
        &self.colors
    }

    /// Entries that are stored on the wire (sentinel excluded)
    #[must_use]
    pub fn stored_colors(&self) -> &[u32] {
        let stored = self.colors.len() - usize::from(self.transparent);
        &self.colors[..stored]
    }

    /// Index of the transparent sentinel, if any
    #[must_use]
    pub fn transparent_index(&self) -> Option<usize> {
        self.transparent.then(|| self.colors.len() - 1)
    }

    /// Width of a pixel index: the smallest `b >= 1` with `len - 1 < 2^b`
    #[must_use]
    pub fn index_bits(&self) -> u8 {
        index_bits_for(self.colors.len())
    }

    /// Color at `index`; indices past the end resolve to the last entry
    #[must_use]
    pub fn get(&self, index: u32) -> u32 {
        let index = index as usize;
        if let Some(color) = self.colors.get(index) {
            *color
        } else {
            warn!(
                "palette index {index} out of range ({} entries), using last entry",
                self.colors.len()
            );
            self.colors.last().copied().unwrap_or(TRANSPARENT_SENTINEL)
        }
    }

    /// Index to store for `argb`.
    ///
    /// Fully transparent colors map to the sentinel, or to any fully transparent
    /// entry, when there is one. Otherwise an exact match is preferred, else the nearest entry by squared ARGB distance.
    #[must_use]
    pub fn index_of(&self, argb: u32) -> u32 {
        let stored = self.stored_colors();
        if argb >> 24 == 0 {
            if let Some(i) = self
                .transparent_index()
                .or_else(|| stored.iter().position(|&c| c >> 24 == 0))
            {
                return to_index(i);
            }
        }
        if let Some(i) = stored.iter().position(|&c| c == argb) {
            return to_index(i);
        }
        stored
            .iter()
            .enumerate()
            .min_by_key(|&(_, &c)| distance(c, argb))
            .map_or(0, |(i, _)| to_index(i))
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn to_index(i: usize) -> u32 {
    i as u32
}

pub(crate) fn index_bits_for(len: usize) -> u8 {
    let max = len.saturating_sub(1);
    let mut bits = 1;
    while bits < usize::BITS && max >> bits != 0 {
        bits += 1;
    }
    #[allow(clippy::cast_possible_truncation)]
    {
        bits as u8
    }
}

fn distance(a: u32, b: u32) -> u32 {
    (0..4)
        .map(|band| {
            let x = (a >> (band * 8)) & 0xFF;
            let y = (b >> (band * 8)) & 0xFF;
            x.abs_diff(y).pow(2)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_bits_is_ceil_log2() {
        for (len, bits) in [(2, 1), (3, 2), (4, 2), (5, 3), (8, 3), (9, 4), (256, 8), (257, 9)] {
            assert_eq!(index_bits_for(len), bits, "len {len}");
        }
        assert_eq!(index_bits_for((1 << 23) + 1), 24);
        assert_eq!(index_bits_for((1 << 24) + 1), 25);
    }

    #[test]
    fn too_short_palettes_are_rejected() {
        assert!(matches!(
            Palette::new(vec![0xFF00_0000]),
            Err(Error::MalformedDescriptor(_))
        ));
        let p = Palette::with_transparent(vec![0xFF00_0000]).unwrap();
        assert_eq!(p.len(), 2);
        assert_eq!(p.stored_colors(), &[0xFF00_0000]);
        assert_eq!(p.transparent_index(), Some(1));
    }

    #[test]
    fn out_of_range_index_uses_last_entry() {
        let p = Palette::new(vec![0xFF11_2233, 0xFF44_5566, 0xFF77_8899]).unwrap();
        assert_eq!(p.get(1), 0xFF44_5566);
        assert_eq!(p.get(3), 0xFF77_8899);
        assert_eq!(p.index_bits(), 2);
    }

    #[test]
    fn lookup_prefers_sentinel_then_exact_then_nearest() {
        let p = Palette::with_transparent(vec![0xFF00_0000, 0xFFFF_FFFF, 0xFF80_8080]).unwrap();
        assert_eq!(p.index_of(0x00FF_FFFF), 3);
        assert_eq!(p.index_of(0xFFFF_FFFF), 1);
        assert_eq!(p.index_of(0xFF10_1010), 0);
        assert_eq!(p.index_of(0xFF90_8070), 2);
    }

    #[test]
    fn transparent_colors_find_a_clear_entry() {
        let p = Palette::new(vec![0x1C80_8080, 0x0000_0000, 0xFF80_8080]).unwrap();
        assert_eq!(p.index_of(0x0080_8080), 1);
        assert_eq!(p.index_of(0x2080_8080), 0);
    }
}
