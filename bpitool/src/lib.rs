use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Seek, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use itertools::Itertools;
use libbpi::{
    collection::Block, descriptor_path, image::consts::MIN_DEPTH_TO_USE_PALETTE,
    open_reader_with, open_writer, BpiReader, CollectionDescriptor, ColorModel, DecodedImage,
    DepthProfile, DirectModel, IndexedModel, Palette, ReadOptions,
};
use tracing::{debug, info, instrument};

/// How `convert` picks the color model of an image
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertOptions {
    /// Fixed depth profile
    pub depth: Option<DepthProfile>,
    /// Build a palette from the image's distinct colors
    pub palette: bool,
}

fn palette_model(img: &DecodedImage, depth: Option<DepthProfile>) -> Result<ColorModel> {
    let profile = match depth {
        Some(p) => p,
        None => {
            let inferred = ColorModel::infer(img.pixels()).profile();
            if inferred.can_use_palette() {
                inferred
            } else {
                DepthProfile::try_from(MIN_DEPTH_TO_USE_PALETTE)?
            }
        }
    };
    let entries = DirectModel::opaque(profile);
    let transparent = img.pixels().iter().any(|&p| p >> 24 == 0) && !profile.has_alpha();
    let mut colors = img
        .pixels()
        .iter()
        .filter(|&&p| !transparent || p >> 24 != 0)
        .map(|&p| entries.to_argb(entries.from_argb(p)))
        .unique()
        .collect_vec();
    // at least two entries, the transparent one included
    if colors.is_empty() {
        colors.push(0xFF00_0000);
    }
    if colors.len() == 1 && !transparent {
        colors.push(colors[0]);
    }
    debug!("{} palette entries at {profile}", colors.len());
    let palette = if transparent {
        Palette::with_transparent(colors)?
    } else {
        Palette::new(colors)?
    };
    let model = IndexedModel::new(profile, palette)
        .with_context(|| format!("image has too many colors for a {profile} palette"))?;
    Ok(model.into())
}

/// Converts an image file into a single-image BPI file
#[instrument]
pub fn image_to_bpi(image_file: &Path, output_name: &Path, options: ConvertOptions) -> Result<()> {
    let rgba = image::open(image_file)
        .with_context(|| format!("open image {}", image_file.display()))?
        .to_rgba8();
    let img = DecodedImage::from_rgba_image(&rgba)?;
    debug!("read {}x{} image", img.width(), img.height());

    let hint = match options {
        ConvertOptions { palette: true, depth } => Some(palette_model(&img, depth)?),
        ConvertOptions {
            depth: Some(profile),
            ..
        } => Some(DirectModel::opaque(profile).into()),
        ConvertOptions { depth: None, .. } => None,
    };

    let output = File::options()
        .create(true)
        .write(true)
        .truncate(true)
        .open(output_name)?;
    let mut writer = open_writer(BufWriter::new(output));
    writer.begin_sequence(None)?;
    writer.write_image(img.pixels(), img.width(), img.height(), hint)?;
    writer.end_sequence()?;
    writer.into_inner()?.flush()?;
    info!("Successfully wrote {}", output_name.display());
    Ok(())
}

fn open_bpi(bpi_file: &Path) -> Result<BpiReader<BufReader<File>>> {
    let definition = descriptor_path(bpi_file);
    let descriptor = if definition.exists() {
        debug!("using descriptor {}", definition.display());
        Some(CollectionDescriptor::from_file(&definition)?)
    } else {
        None
    };
    let source = File::open(bpi_file).with_context(|| format!("open {}", bpi_file.display()))?;
    let options = ReadOptions::builder().maybe_descriptor(descriptor).build();
    Ok(open_reader_with(BufReader::new(source), options)?)
}

fn image_count<R: Read + Seek>(reader: &mut BpiReader<R>) -> Result<usize> {
    reader
        .image_count(true)?
        .context("image count unknown after a full scan")
}

/// Decodes every image of a BPI file to `<stem><i>.png` in `output_dir`, returning the written paths
#[instrument]
pub fn bpi_to_images(bpi_file: &Path, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let Some(stem) = bpi_file.file_stem().and_then(|s| s.to_str()) else {
        bail!("Invalid bpi file name {}", bpi_file.display());
    };
    let mut reader = open_bpi(bpi_file)?;
    let count = image_count(&mut reader)?;
    info!("{count} images in {}", bpi_file.display());

    let mut buf = Vec::new();
    let mut written = Vec::with_capacity(count);
    for i in 0..count {
        let (width, height) = reader
            .decode_image_into(i, &mut buf)
            .with_context(|| format!("decode image {i}"))?;
        let img = DecodedImage::new(width, height, std::mem::take(&mut buf))?;
        let path = output_dir.join(format!("{stem}{i}.png"));
        img.to_rgba_image()
            .save(&path)
            .with_context(|| format!("write {}", path.display()))?;
        debug!("wrote {}", path.display());
        buf = img.into_pixels();
        written.push(path);
    }
    Ok(written)
}

/// Appends every image of every input BPI file into one collection, keeping shared rasters shared.
///
/// The combined descriptor is written next to `output_name` and returned.
#[instrument]
pub fn collect_bpi(output_name: &Path, inputs: &[PathBuf]) -> Result<CollectionDescriptor> {
    let mut readers = Vec::with_capacity(inputs.len());
    let mut combined = CollectionDescriptor::new();
    for input in inputs {
        let mut reader = open_bpi(input)?;
        image_count(&mut reader)?;
        let offset = combined.block_count();
        for block in reader.descriptor().blocks() {
            match block {
                Block::ColorModel => {
                    combined.append_color_model();
                }
                Block::Raster(refs) => {
                    let refs = refs.iter().map(|cm| cm + offset).collect_vec();
                    combined.append_raster(&refs)?;
                }
            }
        }
        readers.push(reader);
    }

    let output = File::options()
        .create(true)
        .write(true)
        .truncate(true)
        .open(output_name)?;
    let mut writer = open_writer(BufWriter::new(output));
    writer.begin_sequence(Some(combined))?;
    for (input, reader) in inputs.iter().zip(readers.iter_mut()) {
        let descriptor = reader.descriptor().clone();
        for (block, kind) in descriptor.blocks().iter().enumerate() {
            match kind {
                Block::ColorModel => writer.write_color_model(reader.block_color_model(block)?)?,
                Block::Raster(_) => writer.write_raster(&reader.block_raster(block)?)?,
            }
        }
        info!("appended {} images of {}", descriptor.image_count(), input.display());
    }
    let combined = writer.end_sequence()?;
    writer.into_inner()?.flush()?;
    combined.into_file(descriptor_path(output_name))?;
    info!(
        "Successfully wrote {} images to {}",
        combined.image_count(),
        output_name.display()
    );
    Ok(combined)
}
