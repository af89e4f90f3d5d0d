//! # libbpi
//!
//!
//! This library reads and writes BPI, a compact bit-packed image format meant for
//! small sprites and icons on constrained targets.
//!
//! A BPI stream is a plain run of bits made of two kinds of blocks:
//! - a **color model**: a 4-bit depth profile, optionally followed by a palette or
//!   a transparent color
//! - a **raster**: 9-bit width and height fields followed by packed pixel values
//!
//! Blocks are not framed; a raster can only be read once the color model it is
//! paired with is known. A [`CollectionDescriptor`] lists which blocks are which
//! and lets several color models share one raster, each pairing yielding one image.
//!
//! ### Depth profiles
//!
//! The 4-bit profile code selects gray or RGB samples, with or without alpha, at
//! one of four band widths. See [`DepthProfile`] for the full table.
//!
//! ### Usage
//!
//! #### Writing and reading a stream
//!
//! ```rust
//! use std::io::Cursor;
//! use libbpi::{open_reader, open_writer};
//!
//! fn main() -> anyhow::Result<()> {
//!     let pixels = [0xFF00_0000, 0xFFFF_FFFF, 0xFFFF_FFFF, 0xFF00_0000];
//!
//!     let mut writer = open_writer(Vec::new());
//!     writer.begin_sequence(None)?;
//!     writer.write_image(&pixels, 2, 2, None)?;
//!     let descriptor = writer.end_sequence()?;
//!     let bytes = writer.into_inner()?;
//!     assert_eq!(descriptor.image_count(), 1);
//!
//!     let mut reader = open_reader(Cursor::new(bytes))?;
//!     let image = reader.decode_image(0)?;
//!     assert_eq!((image.width(), image.height()), (2, 2));
//!     assert_eq!(image.pixels(), &pixels);
//!     Ok(())
//! }
//! ```
//!
//! #### Sharing a raster between color models
//!
//! ```rust
//! use std::io::Cursor;
//! use libbpi::{
//!     open_reader_with, open_writer, CollectionDescriptor, ColorModel, DepthProfile,
//!     IndexedModel, Palette, Raster, ReadOptions,
//! };
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut descriptor = CollectionDescriptor::new();
//!     let day = descriptor.append_color_model();
//!     let night = descriptor.append_color_model();
//!     descriptor.append_raster(&[day, night])?;
//!
//!     let model = |colors| -> anyhow::Result<ColorModel> {
//!         Ok(IndexedModel::new(DepthProfile::RGB565, Palette::new(colors)?)?.into())
//!     };
//!     let mut writer = open_writer(Vec::new());
//!     writer.begin_sequence(Some(descriptor.clone()))?;
//!     writer.write_color_model(model(vec![0xFFFF_FFFF, 0xFF00_0000])?)?;
//!     writer.write_color_model(model(vec![0xFF00_0000, 0xFFFF_FFFF])?)?;
//!     writer.write_raster(&Raster::from_pixels(2, 1, 1, &[0, 1])?)?;
//!     writer.end_sequence()?;
//!     let bytes = writer.into_inner()?;
//!
//!     let options = ReadOptions::builder().descriptor(descriptor).build();
//!     let mut reader = open_reader_with(Cursor::new(bytes), options)?;
//!     assert_eq!(reader.image_count(false)?, Some(2));
//!     assert_eq!(reader.decode_image(0)?.pixels(), &[0xFFFF_FFFF, 0xFF00_0000]);
//!     assert_eq!(reader.decode_image(1)?.pixels(), &[0xFF00_0000, 0xFFFF_FFFF]);
//!     Ok(())
//! }
//! ```
//!
//! #### Descriptor files
//!
//! Descriptors are stored as a small XML document named after the stream, with
//! [`DESCRIPTOR_SUFFIX`] appended (see [`descriptor_path`],
//! [`CollectionDescriptor::from_file`] and [`CollectionDescriptor::into_file`]).
//!
//! #### Unstable API
//!
//! This crate is still very much a work-in-progress. Expect breaking changes between minor
//! releases until `v1.0`.
//!

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

/// Bit-level readers and writers over byte streams
pub mod bits;
/// Block streams, their descriptors, readers and writers
pub mod collection;
mod error;
/// Color models, depth profiles, palettes and rasters
pub mod image;
mod serde;

pub use bits::{BitPosition, BitReader, BitWriter};
pub use collection::{
    open_reader, open_reader_with, open_writer, BpiReader, BpiWriter, CollectionDescriptor,
    ReadOptions,
};
pub use error::Error;
pub use image::{
    ColorModel, DecodedImage, DepthProfile, DirectModel, IndexedModel, Palette, Raster,
};
pub use serde::{descriptor_path, error::Error as DescriptorError, DESCRIPTOR_SUFFIX};
