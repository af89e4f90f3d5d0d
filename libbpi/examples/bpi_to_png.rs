/// Demonstrates how to decode every image of a BPI stream to png files
///
/// `cargo run --example bpi_to_png -- icons.bpi`
use std::{fs::File, io::BufReader};

use anyhow::Context;
use libbpi::{descriptor_path, open_reader_with, CollectionDescriptor, ReadOptions};

fn main() -> anyhow::Result<()> {
    let input = std::env::args()
        .nth(1)
        .context("usage: bpi_to_png <bpi>")?;

    // a descriptor next to the stream allows shared rasters; without one the
    // stream is read as alternating color model / raster blocks
    let definition = descriptor_path(&input);
    let options = if definition.exists() {
        ReadOptions::builder()
            .descriptor(CollectionDescriptor::from_file(definition)?)
            .build()
    } else {
        ReadOptions::default()
    };
    let mut reader = open_reader_with(BufReader::new(File::open(&input)?), options)?;

    let count = reader.image_count(true)?.unwrap_or_default();
    for i in 0..count {
        let img = reader.decode_image(i)?;
        img.to_rgba_image().save(format!("{input}.{i}.png"))?;
    }
    println!("decoded {count} images from {input}");
    Ok(())
}
