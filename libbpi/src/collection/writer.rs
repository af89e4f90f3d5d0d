use std::io::Write;

use tracing::{debug, info, instrument, warn};

use super::descriptor::{Block, CollectionDescriptor};
use crate::{
    bits::BitWriter,
    image::{ColorModel, Raster},
    Error,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    SequenceOpen,
    SequenceClosed,
}

/// Opens a BPI block writer over `sink`
pub fn open_writer<W: Write>(sink: W) -> BpiWriter<W> {
    BpiWriter {
        writer: BitWriter::new(sink),
        state: State::Idle,
        descriptor: CollectionDescriptor::new(),
        provided: false,
        next_block: 0,
        models: Vec::new(),
    }
}

/// Writes a sequence of images as BPI blocks
///
/// Without a descriptor every image becomes a color-model block followed by a
/// raster block. With one, blocks are written in the order it lists them.
#[derive(Debug)]
pub struct BpiWriter<W: Write> {
    writer: BitWriter<W>,
    state: State,
    descriptor: CollectionDescriptor,
    provided: bool,
    next_block: usize,
    models: Vec<Option<ColorModel>>,
}

impl<W: Write> BpiWriter<W> {
    /// Starts the sequence, optionally following a block structure given up front
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if a sequence was already started
    pub fn begin_sequence(&mut self, descriptor: Option<CollectionDescriptor>) -> Result<(), Error> {
        if self.state != State::Idle {
            return Err(Error::invalid_state("a write sequence was already started"));
        }
        self.provided = descriptor.is_some();
        self.descriptor = descriptor.unwrap_or_default();
        self.state = State::SequenceOpen;
        info!(
            "write sequence started ({} blocks expected)",
            if self.provided {
                self.descriptor.block_count().to_string()
            } else {
                "any number of".to_owned()
            }
        );
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), Error> {
        match self.state {
            State::SequenceOpen => Ok(()),
            State::Idle => Err(Error::invalid_state("no write sequence has been started")),
            State::SequenceClosed => Err(Error::invalid_state("the write sequence is closed")),
        }
    }

    fn next_provided_block(&self, offset: usize) -> Result<&Block, Error> {
        let index = self.next_block + offset;
        self.descriptor.block(index).ok_or_else(|| {
            Error::invalid_state(format!(
                "the descriptor has no block {index} (it lists {})",
                self.descriptor.block_count()
            ))
        })
    }

    /// Model the pixels of raster block `raster` are encoded with, given a model about to be written
    fn raster_model(
        &self,
        raster: usize,
        pending: Option<(usize, &ColorModel)>,
    ) -> Result<ColorModel, Error> {
        let refs = self.descriptor.color_model_refs(raster).unwrap_or_default();
        let mut chosen: Option<ColorModel> = None;
        for &cm in refs {
            let model = match pending {
                Some((index, model)) if index == cm => Some(model),
                _ => self.models.get(cm).and_then(Option::as_ref),
            }
            .ok_or_else(|| {
                Error::malformed(format!(
                    "raster {raster} references color model {cm} which has not been written"
                ))
            })?;
            match &chosen {
                None => chosen = Some(model.clone()),
                Some(first) if first.bits_per_pixel() != model.bits_per_pixel() => {
                    return Err(Error::malformed(format!(
                        "raster {raster} is shared by color models of {} and {} bits per pixel",
                        first.bits_per_pixel(),
                        model.bits_per_pixel()
                    )))
                }
                Some(_) => {}
            }
        }
        chosen.ok_or_else(|| Error::malformed(format!("raster {raster} has no color model")))
    }

    fn remember_model(&mut self, block: usize, model: ColorModel) {
        if self.models.len() <= block {
            self.models.resize(block + 1, None);
        }
        self.models[block] = Some(model);
    }

    /// Writes one ARGB image
    ///
    /// Without a `hint` the color model is inferred from the pixels. When
    /// following a descriptor whose next block is a raster, the pixels are
    /// encoded with that raster's first color model and the hint is unused.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] outside an open sequence, or if the descriptor has no room left
    /// - [`Error::InvalidArgument`] if the dimensions are out of range or do not match the buffer
    /// - [`Error::MalformedDescriptor`] if the raster's color models are unusable
    ///
    /// Nothing is written when an error is returned.
    #[instrument(level = "debug", skip(self, argb, hint))]
    pub fn write_image(
        &mut self,
        argb: &[u32],
        width: u16,
        height: u16,
        hint: Option<ColorModel>,
    ) -> Result<(), Error> {
        self.ensure_open()?;
        // validates dimensions before anything is written
        Raster::new(width, height, 1)?;
        if argb.len() != usize::from(width) * usize::from(height) {
            return Err(Error::invalid_argument(format!(
                "{} pixels given for a {width}x{height} image",
                argb.len()
            )));
        }

        if !self.provided {
            let model = hint.unwrap_or_else(|| ColorModel::infer(argb));
            let raster = quantize(argb, width, height, &model)?;
            model.write(&mut self.writer)?;
            raster.encode(&mut self.writer)?;
            let (cm, raster_block) = self.descriptor.append_image();
            debug!("wrote color model block {cm} ({}) and raster block {raster_block}", model.profile());
            self.remember_model(cm, model);
            self.next_block = raster_block + 1;
            return Ok(());
        }

        let (cm_block, model) = match self.next_provided_block(0)? {
            Block::ColorModel => {
                let model = hint.unwrap_or_else(|| ColorModel::infer(argb));
                (Some(self.next_block), Some(model))
            }
            Block::Raster(_) => {
                if hint.is_some() {
                    debug!("color model hint unused, raster {} already has its models", self.next_block);
                }
                (None, None)
            }
        };
        let raster_block = self.next_block + usize::from(cm_block.is_some());
        match self.next_provided_block(usize::from(cm_block.is_some()))? {
            Block::Raster(_) => {}
            Block::ColorModel => {
                return Err(Error::invalid_state(format!(
                    "block {raster_block} of the descriptor is not a raster"
                )))
            }
        }
        let pending = cm_block.zip(model.as_ref());
        let encoding = self.raster_model(raster_block, pending)?;
        let raster = quantize(argb, width, height, &encoding)?;

        if let (Some(block), Some(model)) = (cm_block, model) {
            model.write(&mut self.writer)?;
            debug!("wrote color model block {block} ({})", model.profile());
            self.remember_model(block, model);
        }
        raster.encode(&mut self.writer)?;
        debug!("wrote raster block {raster_block}");
        self.next_block = raster_block + 1;
        Ok(())
    }

    /// Writes a lone color-model block, when following a descriptor whose next block is one
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] outside an open sequence, without a descriptor, or
    /// if the next block is not a color model
    pub fn write_color_model(&mut self, model: ColorModel) -> Result<(), Error> {
        self.ensure_open()?;
        if !self.provided {
            return Err(Error::invalid_state(
                "lone color models can only be written when following a descriptor",
            ));
        }
        if !matches!(self.next_provided_block(0)?, Block::ColorModel) {
            return Err(Error::invalid_state(format!(
                "block {} of the descriptor is not a color model",
                self.next_block
            )));
        }
        model.write(&mut self.writer)?;
        debug!("wrote color model block {} ({})", self.next_block, model.profile());
        self.remember_model(self.next_block, model);
        self.next_block += 1;
        Ok(())
    }

    /// Writes pre-quantized raw pixels as the next raster block of the descriptor
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] outside an open sequence, without a descriptor, or
    ///   if the next block is not a raster
    /// - [`Error::InvalidArgument`] if the pixel width differs from the raster's color models
    /// - [`Error::MalformedDescriptor`] if the raster's color models are unusable
    pub fn write_raster(&mut self, raster: &Raster) -> Result<(), Error> {
        self.ensure_open()?;
        if !self.provided {
            return Err(Error::invalid_state(
                "lone rasters can only be written when following a descriptor",
            ));
        }
        if !matches!(self.next_provided_block(0)?, Block::Raster(_)) {
            return Err(Error::invalid_state(format!(
                "block {} of the descriptor is not a raster",
                self.next_block
            )));
        }
        let model = self.raster_model(self.next_block, None)?;
        if model.bits_per_pixel() != raster.bits_per_pixel() {
            return Err(Error::invalid_argument(format!(
                "raster has {} bits per pixel, its color models use {}",
                raster.bits_per_pixel(),
                model.bits_per_pixel()
            )));
        }
        raster.encode(&mut self.writer)?;
        debug!("wrote raster block {}", self.next_block);
        self.next_block += 1;
        Ok(())
    }

    /// Closes the sequence and flushes the sink, returning the block structure that was written
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] outside an open sequence; I/O errors from the sink
    pub fn end_sequence(&mut self) -> Result<CollectionDescriptor, Error> {
        self.ensure_open()?;
        if self.provided && self.next_block < self.descriptor.block_count() {
            warn!(
                "write sequence ended after {} of {} blocks",
                self.next_block,
                self.descriptor.block_count()
            );
        }
        self.writer.flush()?;
        self.state = State::SequenceClosed;
        info!(
            "write sequence ended: {} blocks, {} images",
            self.next_block,
            self.descriptor.image_count()
        );
        Ok(self.descriptor.clone())
    }

    /// Flushes and returns the sink
    ///
    /// # Errors
    ///
    /// I/O errors from the sink
    pub fn into_inner(self) -> Result<W, Error> {
        if self.state == State::SequenceOpen {
            warn!("write sequence was not ended");
        }
        self.writer.into_inner()
    }
}

fn quantize(argb: &[u32], width: u16, height: u16, model: &ColorModel) -> Result<Raster, Error> {
    let raw: Vec<u32> = argb.iter().map(|&p| model.from_argb(p)).collect();
    Raster::from_pixels(width, height, model.bits_per_pixel(), &raw)
}
