/// Demonstrates how to store a png file as a single-image BPI stream
/// using the [`image`] crate
///
/// `cargo run --example png_to_bpi -- icon.png icon.bpi`
use std::{fs::File, io::Write};

use anyhow::Context;
use libbpi::{open_writer, DecodedImage};

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let input = args.next().context("usage: png_to_bpi <png> <bpi>")?;
    let output = args.next().context("usage: png_to_bpi <png> <bpi>")?;

    let img = image::open(&input)
        .with_context(|| format!("open {input}"))?
        .to_rgba8();
    let img = DecodedImage::from_rgba_image(&img)?;

    let mut writer = open_writer(File::create(&output)?);
    writer.begin_sequence(None)?;
    // no hint: the smallest color model that fits the pixels is picked
    writer.write_image(img.pixels(), img.width(), img.height(), None)?;
    writer.end_sequence()?;
    writer.into_inner()?.flush()?;
    Ok(())
}
