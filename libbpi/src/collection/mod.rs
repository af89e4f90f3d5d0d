//! Collections of images stored as a sequence of color-model and raster blocks.
//!
//! A BPI stream carries no framing of its own. Which blocks are color models,
//! which are rasters, and which color models each raster is paired with is
//! described by a [`CollectionDescriptor`], kept next to the stream in a
//! `.definition` file. Without one, blocks are assumed to alternate color model
//! and raster, one image per pair.

pub(crate) mod descriptor;
pub(crate) mod locator;
pub(crate) mod reader;
pub(crate) mod writer;

pub use descriptor::{Block, BlockKind, CollectionDescriptor, ImageRef};
pub use reader::{open_reader, open_reader_with, BpiReader, ReadOptions};
pub use writer::{open_writer, BpiWriter};
