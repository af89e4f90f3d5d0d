use std::{
    collections::VecDeque,
    io::{Read, Seek},
};

use tracing::{debug, trace};

use super::descriptor::{BlockKind, CollectionDescriptor};
use crate::{
    bits::{BitPosition, BitReader},
    image::{ColorModel, Raster},
    Error,
};

/// Start positions of consecutive blocks, `offsets[i]` being the start of block `base + i`.
///
/// The last entry is the first position not yet scanned: the start of the next
/// block, or the end of the stream.
#[derive(Debug)]
struct OffsetCache {
    base: usize,
    offsets: VecDeque<BitPosition>,
}

impl OffsetCache {
    fn new() -> Self {
        Self {
            base: 0,
            offsets: VecDeque::from([BitPosition::default()]),
        }
    }

    fn get(&self, block: usize) -> Option<BitPosition> {
        block
            .checked_sub(self.base)
            .and_then(|i| self.offsets.get(i))
            .copied()
    }

    /// Index of the first block that has not been scanned yet
    fn frontier(&self) -> usize {
        self.base + self.offsets.len() - 1
    }

    fn frontier_position(&self) -> BitPosition {
        self.offsets.back().copied().unwrap_or_default()
    }

    fn push(&mut self, next_start: BitPosition) {
        self.offsets.push_back(next_start);
    }

    fn discard_before(&mut self, block: usize) {
        while self.base < block && self.offsets.len() > 1 {
            self.offsets.pop_front();
            self.base += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// The block structure was supplied up front
    Known,
    /// Blocks alternate color model / raster and are discovered by scanning
    Streaming { exhausted: bool },
}

/// Forward-scanning block index over one BPI stream.
///
/// Every block is parsed once, just far enough to learn its length; its end
/// position is cached so later requests seek straight to it.
#[derive(Debug)]
pub(crate) struct BlockLocator<R> {
    reader: BitReader<R>,
    descriptor: CollectionDescriptor,
    mode: Mode,
    offsets: OffsetCache,
    models: Vec<Option<ColorModel>>,
    scan_steps: usize,
}

impl<R: Read + Seek> BlockLocator<R> {
    pub(crate) fn new(reader: BitReader<R>, descriptor: Option<CollectionDescriptor>) -> Self {
        let (descriptor, mode) = match descriptor {
            Some(d) => (d, Mode::Known),
            None => (
                CollectionDescriptor::new(),
                Mode::Streaming { exhausted: false },
            ),
        };
        Self {
            reader,
            descriptor,
            mode,
            offsets: OffsetCache::new(),
            models: Vec::new(),
            scan_steps: 0,
        }
    }

    /// Descriptor supplied up front, or the part discovered so far
    pub(crate) const fn descriptor(&self) -> &CollectionDescriptor {
        &self.descriptor
    }

    /// Whether the full block structure is known
    pub(crate) const fn is_complete(&self) -> bool {
        !matches!(self.mode, Mode::Streaming { exhausted: false })
    }

    #[cfg(test)]
    const fn scan_steps(&self) -> usize {
        self.scan_steps
    }

    /// Lowest block whose start position is still cached
    #[cfg(test)]
    const fn first_cached_block(&self) -> usize {
        self.offsets.base
    }

    fn kind_of(&self, block: usize) -> Option<BlockKind> {
        match self.mode {
            Mode::Known => self.descriptor.block(block).map(|b| b.kind()),
            Mode::Streaming { exhausted: true } => None,
            Mode::Streaming { exhausted: false } => Some(if block % 2 == 0 {
                BlockKind::ColorModel
            } else {
                BlockKind::Raster
            }),
        }
    }

    /// Pixel width shared by every color model of raster block `block`
    fn raster_bits(&self, block: usize) -> Result<u8, Error> {
        let refs = match self.mode {
            Mode::Known => self
                .descriptor
                .color_model_refs(block)
                .map(<[usize]>::to_vec)
                .unwrap_or_default(),
            Mode::Streaming { .. } => vec![block.saturating_sub(1)],
        };
        let mut bits = None;
        for cm in refs {
            let model = self
                .models
                .get(cm)
                .and_then(Option::as_ref)
                .ok_or_else(|| {
                    Error::malformed(format!(
                        "raster {block} references color model {cm} which does not precede it"
                    ))
                })?;
            let bpp = model.bits_per_pixel();
            match bits {
                None => bits = Some(bpp),
                Some(b) if b != bpp => {
                    return Err(Error::malformed(format!(
                        "raster {block} is shared by color models of {b} and {bpp} bits per pixel"
                    )))
                }
                Some(_) => {}
            }
        }
        bits.ok_or_else(|| Error::malformed(format!("raster {block} has no color model")))
    }

    fn seek_to(&mut self, pos: BitPosition) -> Result<(), Error> {
        if self.reader.position() != pos {
            self.reader.seek(pos)?;
        }
        Ok(())
    }

    /// Parses the first unscanned block. Returns `false` when there is no such block
    fn scan_next(&mut self) -> Result<bool, Error> {
        let block = self.offsets.frontier();
        let Some(kind) = self.kind_of(block) else {
            return Ok(false);
        };
        let start = self.offsets.frontier_position();
        self.seek_to(start)?;

        let scanned = match kind {
            BlockKind::ColorModel => ColorModel::read(&mut self.reader).map(|model| {
                if self.models.len() <= block {
                    self.models.resize(block + 1, None);
                }
                self.models[block] = Some(model);
            }),
            BlockKind::Raster => {
                let bpp = self.raster_bits(block)?;
                Raster::skip(&mut self.reader, bpp).map(|_| ())
            }
        };
        match scanned {
            Ok(()) => {}
            Err(Error::EndOfStream) if matches!(self.mode, Mode::Streaming { .. }) => {
                debug!(
                    "end of stream while scanning block {block}, {} images found",
                    self.descriptor.image_count()
                );
                self.mode = Mode::Streaming { exhausted: true };
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        let end = self.reader.position();
        self.offsets.push(end);
        self.scan_steps += 1;
        if matches!(self.mode, Mode::Streaming { .. }) && kind == BlockKind::Raster {
            self.descriptor.append_image();
        }
        trace!(
            "block {block} ({kind}) spans {start:?}..{end:?}, {} blocks scanned",
            self.scan_steps
        );
        Ok(true)
    }

    /// Scans forward until `block` has been parsed. Returns `false` if the stream has no such block
    pub(crate) fn ensure_block(&mut self, block: usize) -> Result<bool, Error> {
        while self.offsets.frontier() <= block {
            if !self.scan_next()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Scans every remaining block
    pub(crate) fn scan_to_end(&mut self) -> Result<(), Error> {
        while self.scan_next()? {}
        Ok(())
    }

    fn out_of_range(&self, block: usize) -> Error {
        Error::IndexOutOfRange {
            index: block,
            len: self.descriptor.block_count(),
        }
    }

    /// Positions the cursor at the start of `block`
    pub(crate) fn locate(&mut self, block: usize) -> Result<(), Error> {
        if !self.ensure_block(block)? {
            return Err(self.out_of_range(block));
        }
        let pos = self.offsets.get(block).ok_or_else(|| {
            debug!(
                "block {block} precedes the first cached block {}",
                self.offsets.base
            );
            self.out_of_range(block)
        })?;
        self.seek_to(pos)
    }

    /// Decoded color model of block `block`
    pub(crate) fn color_model(&mut self, block: usize) -> Result<ColorModel, Error> {
        if !self.ensure_block(block)? {
            return Err(self.out_of_range(block));
        }
        self.models
            .get(block)
            .and_then(Option::as_ref)
            .cloned()
            .ok_or_else(|| Error::malformed(format!("block {block} is not a color model")))
    }

    /// Dimensions of raster block `block`
    pub(crate) fn raster_size(&mut self, block: usize) -> Result<(u16, u16), Error> {
        self.locate(block)?;
        Raster::read_size(&mut self.reader)
    }

    /// Raw pixels of raster block `block`
    pub(crate) fn raster(&mut self, block: usize) -> Result<Raster, Error> {
        if !self.ensure_block(block)? {
            return Err(self.out_of_range(block));
        }
        let bpp = self.raster_bits(block)?;
        self.locate(block)?;
        Raster::decode(&mut self.reader, bpp)
    }

    /// Forgets cached start positions of blocks before `block`
    pub(crate) fn discard_before(&mut self, block: usize) {
        let before = self.offsets.base;
        self.offsets.discard_before(block);
        if self.offsets.base != before {
            trace!("dropped offsets of blocks {before}..{}", self.offsets.base);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bits::BitWriter,
        image::{DepthProfile, DirectModel},
    };
    use std::io::Cursor;

    fn stream(images: usize) -> Vec<u8> {
        let mut w = BitWriter::new(Vec::new());
        for i in 0..images {
            ColorModel::Direct(DirectModel::opaque(DepthProfile::GRAY8))
                .write(&mut w)
                .unwrap();
            #[allow(clippy::cast_possible_truncation)]
            let raster = Raster::from_pixels(3, 1, 8, &[i as u32, 1, 2]).unwrap();
            raster.encode(&mut w).unwrap();
        }
        w.into_inner().unwrap()
    }

    fn locator(images: usize) -> BlockLocator<Cursor<Vec<u8>>> {
        BlockLocator::new(BitReader::new(Cursor::new(stream(images))), None)
    }

    #[test]
    fn cached_blocks_are_not_rescanned() {
        let mut loc = locator(3);
        for block in 0..6 {
            loc.locate(block).unwrap();
        }
        assert_eq!(loc.scan_steps(), 6);
        loc.locate(0).unwrap();
        loc.locate(3).unwrap();
        assert_eq!(loc.scan_steps(), 6);
        assert_eq!(loc.raster(3).unwrap().pixel(0, 0), Some(1));
    }

    #[test]
    fn streaming_discovers_images_until_end_of_stream() {
        let mut loc = locator(4);
        assert!(!loc.is_complete());
        loc.ensure_block(2).unwrap();
        assert_eq!(loc.descriptor().image_count(), 1);
        loc.scan_to_end().unwrap();
        assert!(loc.is_complete());
        assert_eq!(loc.descriptor().image_count(), 4);
        assert_eq!(loc.descriptor().block_count(), 8);
        assert!(!loc.ensure_block(8).unwrap());
        assert!(matches!(
            loc.locate(9),
            Err(Error::IndexOutOfRange { index: 9, len: 8 })
        ));
    }

    #[test]
    fn known_structure_propagates_truncation() {
        let mut bytes = stream(2);
        bytes.truncate(bytes.len() - 2);
        let mut d = CollectionDescriptor::new();
        d.append_image();
        d.append_image();
        let mut loc = BlockLocator::new(BitReader::new(Cursor::new(bytes)), Some(d));
        assert!(loc.ensure_block(2).unwrap());
        assert!(matches!(loc.ensure_block(3), Err(Error::EndOfStream)));
    }

    #[test]
    fn discarded_offsets_cannot_be_revisited() {
        let mut loc = locator(3);
        loc.ensure_block(5).unwrap();
        loc.discard_before(2);
        assert_eq!(loc.first_cached_block(), 2);
        assert!(loc.locate(2).is_ok());
        assert!(matches!(
            loc.locate(1),
            Err(Error::IndexOutOfRange { index: 1, .. })
        ));
        // decoded color models survive
        assert!(loc.color_model(0).is_ok());
    }

    #[test]
    fn mixed_pixel_widths_on_one_raster_are_malformed() {
        let mut w = BitWriter::new(Vec::new());
        ColorModel::Direct(DirectModel::opaque(DepthProfile::GRAY8))
            .write(&mut w)
            .unwrap();
        ColorModel::Direct(DirectModel::opaque(DepthProfile::RGB565))
            .write(&mut w)
            .unwrap();
        Raster::from_pixels(1, 1, 8, &[0])
            .unwrap()
            .encode(&mut w)
            .unwrap();
        let mut d = CollectionDescriptor::new();
        let a = d.append_color_model();
        let b = d.append_color_model();
        d.append_raster(&[a, b]).unwrap();
        let mut loc = BlockLocator::new(BitReader::new(Cursor::new(w.into_inner().unwrap())), Some(d));
        assert!(matches!(
            loc.ensure_block(2),
            Err(Error::MalformedDescriptor(_))
        ));
    }
}
