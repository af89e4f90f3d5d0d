use std::io::{Read, Seek};

use bon::Builder;
use tracing::{debug, info, instrument};

use super::{
    descriptor::{CollectionDescriptor, ImageRef},
    locator::BlockLocator,
};
use crate::{
    bits::BitReader,
    image::{ColorModel, DecodedImage, Raster},
    Error,
};

/// Options for [`open_reader_with`]
#[derive(Builder, Debug, Default, Clone)]
pub struct ReadOptions {
    /// Block structure of the stream, when known ahead of time (usually read from the
    /// `.definition` file next to it). Without it, blocks are expected to alternate
    /// color model / raster and are discovered by scanning.
    descriptor: Option<CollectionDescriptor>,
    /// Images will only be requested in increasing order, so positions of
    /// blocks behind the last requested image can be forgotten
    #[builder(default)]
    forward_only: bool,
}

/// Opens a stream of BPI blocks in streaming mode
///
/// # Errors
///
/// Fails if the current position of `source` cannot be queried
pub fn open_reader<R: Read + Seek>(source: R) -> Result<BpiReader<R>, Error> {
    open_reader_with(source, ReadOptions::default())
}

/// Opens a stream of BPI blocks starting at the current position of `source`
///
/// # Errors
///
/// Fails if the current position of `source` cannot be queried
pub fn open_reader_with<R: Read + Seek>(
    mut source: R,
    options: ReadOptions,
) -> Result<BpiReader<R>, Error> {
    let origin = source.stream_position()?;
    info!(
        "opening BPI stream at byte {origin} ({} descriptor, forward only: {})",
        if options.descriptor.is_some() { "with" } else { "without" },
        options.forward_only
    );
    Ok(BpiReader {
        locator: BlockLocator::new(BitReader::with_origin(source, origin), options.descriptor),
        forward_only: options.forward_only,
        min_image: 0,
    })
}

/// Decodes images out of a BPI block stream
#[derive(Debug)]
pub struct BpiReader<R> {
    locator: BlockLocator<R>,
    forward_only: bool,
    min_image: usize,
}

impl<R: Read + Seek> BpiReader<R> {
    /// The descriptor given when opening, or the part of the block structure discovered so far
    #[must_use]
    pub const fn descriptor(&self) -> &CollectionDescriptor {
        self.locator.descriptor()
    }

    /// Number of images in the stream.
    ///
    /// Returns `None` when the count is not known yet and `allow_full_scan` is `false`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if a full scan is needed on a forward-only reader
    /// - any error raised while scanning a block
    pub fn image_count(&mut self, allow_full_scan: bool) -> Result<Option<usize>, Error> {
        if !self.locator.is_complete() {
            if !allow_full_scan {
                return Ok(None);
            }
            if self.forward_only {
                return Err(Error::invalid_state(
                    "cannot scan the whole stream of a forward-only reader",
                ));
            }
            self.locator.scan_to_end()?;
        }
        Ok(Some(self.descriptor().image_count()))
    }

    fn resolve(&mut self, image: usize) -> Result<ImageRef, Error> {
        if self.forward_only && image < self.min_image {
            debug!("image {image} is behind forward-only minimum {}", self.min_image);
            return Err(Error::IndexOutOfRange {
                index: image,
                len: self.descriptor().image_count(),
            });
        }
        if !self.locator.is_complete() {
            // in streaming mode image `i` is raster block `2i + 1`
            let Some(raster) = image.checked_mul(2).and_then(|b| b.checked_add(1)) else {
                return Err(Error::IndexOutOfRange {
                    index: image,
                    len: self.descriptor().image_count(),
                });
            };
            self.locator.ensure_block(raster)?;
        }
        let found = self.descriptor().image(image)?;
        if self.forward_only {
            self.min_image = image;
            self.locator.discard_before(found.raster);
        }
        Ok(found)
    }

    /// Width and height of image `image`
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfRange`] if there is no such image
    pub fn image_size(&mut self, image: usize) -> Result<(u16, u16), Error> {
        let found = self.resolve(image)?;
        self.locator.raster_size(found.raster)
    }

    /// Color model of image `image`
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfRange`] if there is no such image
    pub fn image_color_model(&mut self, image: usize) -> Result<ColorModel, Error> {
        let found = self.resolve(image)?;
        self.locator.color_model(found.color_model)
    }

    /// Raw, undecoded pixels of image `image`
    ///
    /// Images sharing a raster return identical rasters.
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfRange`] if there is no such image
    pub fn read_raster(&mut self, image: usize) -> Result<Raster, Error> {
        let found = self.resolve(image)?;
        self.locator.raster(found.raster)
    }

    fn check_block(&mut self, block: usize) -> Result<(), Error> {
        if !self.locator.is_complete() {
            // a streamed block is listed once the raster closing its image is scanned
            self.locator.ensure_block(block | 1)?;
        }
        let len = self.descriptor().block_count();
        if block >= len {
            return Err(Error::IndexOutOfRange { index: block, len });
        }
        Ok(())
    }

    /// Color model stored in block `block`, whether or not a raster refers to it
    ///
    /// # Errors
    ///
    /// - [`Error::IndexOutOfRange`] if the stream has no such block
    /// - [`Error::MalformedDescriptor`] if block `block` is a raster
    pub fn block_color_model(&mut self, block: usize) -> Result<ColorModel, Error> {
        self.check_block(block)?;
        self.locator.color_model(block)
    }

    /// Raw pixels stored in raster block `block`
    ///
    /// # Errors
    ///
    /// - [`Error::IndexOutOfRange`] if the stream has no such block
    /// - [`Error::MalformedDescriptor`] if block `block` is not a raster with a color model
    pub fn block_raster(&mut self, block: usize) -> Result<Raster, Error> {
        self.check_block(block)?;
        self.locator.raster(block)
    }

    /// Decodes image `image` to ARGB
    ///
    /// # Errors
    ///
    /// - [`Error::IndexOutOfRange`] if there is no such image
    /// - [`Error::EndOfStream`] if its blocks are truncated
    /// - [`Error::MalformedDescriptor`] if its raster and color model disagree
    #[instrument(level = "debug", skip(self))]
    pub fn decode_image(&mut self, image: usize) -> Result<DecodedImage, Error> {
        let mut pixels = Vec::new();
        let (width, height) = self.decode_image_into(image, &mut pixels)?;
        DecodedImage::new(width, height, pixels)
    }

    /// Decodes image `image` into a caller-owned buffer, returning its dimensions
    ///
    /// `buf` is cleared first; its allocation is reused.
    ///
    /// # Errors
    ///
    /// See [`Self::decode_image`]
    pub fn decode_image_into(
        &mut self,
        image: usize,
        buf: &mut Vec<u32>,
    ) -> Result<(u16, u16), Error> {
        let found = self.resolve(image)?;
        let model = self.locator.color_model(found.color_model)?;
        let raster = self.locator.raster(found.raster)?;
        debug!(
            "image {image}: raster block {} ({}x{}) with color model block {}",
            found.raster,
            raster.width(),
            raster.height(),
            found.color_model
        );
        buf.clear();
        buf.extend(raster.pixels().map(|p| model.to_argb(p)));
        Ok((raster.width(), raster.height()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_builder_defaults() {
        let options = ReadOptions::builder().build();
        assert!(options.descriptor.is_none());
        assert!(!options.forward_only);

        let mut d = CollectionDescriptor::new();
        d.append_image();
        let options = ReadOptions::builder()
            .descriptor(d.clone())
            .forward_only(true)
            .build();
        assert_eq!(options.descriptor, Some(d));
        assert!(options.forward_only);
    }
}
