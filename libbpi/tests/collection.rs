use std::{
    fs::File,
    io::{BufReader, Cursor, Seek, SeekFrom, Write},
};

mod common;
use common::{gray_ramp, stream_of};
use libbpi::{
    descriptor_path, open_reader, open_reader_with, open_writer, CollectionDescriptor, ColorModel,
    DepthProfile, DirectModel, Error, IndexedModel, Palette, Raster, ReadOptions,
};
use mktemp::Temp;

fn gray8() -> ColorModel {
    DirectModel::opaque(DepthProfile::GRAY8).into()
}

#[test]
fn gray8_pixels_expand_to_opaque_argb() -> anyhow::Result<()> {
    let bytes = stream_of(&[(gray8(), Raster::from_pixels(2, 1, 8, &[0x00, 0xFF])?)])?;
    let mut reader = open_reader(Cursor::new(bytes))?;
    let image = reader.decode_image(0)?;
    assert_eq!((image.width(), image.height()), (2, 1));
    assert_eq!(image.pixels(), &[0xFF00_0000, 0xFFFF_FFFF]);
    Ok(())
}

#[test]
fn palette_indices_select_entries() -> anyhow::Result<()> {
    let palette = Palette::new(vec![0xFF11_1111, 0xFF44_4444])?;
    let model: ColorModel = IndexedModel::new(DepthProfile::GRAY8, palette)?.into();
    assert_eq!(model.bits_per_pixel(), 1);
    let bytes = stream_of(&[(model, Raster::from_pixels(4, 1, 1, &[0, 1, 1, 0])?)])?;

    let mut reader = open_reader(Cursor::new(bytes))?;
    assert_eq!(
        reader.decode_image(0)?.pixels(),
        &[0xFF11_1111, 0xFF44_4444, 0xFF44_4444, 0xFF11_1111]
    );
    Ok(())
}

#[test]
fn shared_raster_yields_one_image_per_color_model() -> anyhow::Result<()> {
    let mut descriptor = CollectionDescriptor::new();
    let light = descriptor.append_color_model();
    let dark = descriptor.append_color_model();
    descriptor.append_raster(&[light, dark])?;

    let indexed = |colors| -> anyhow::Result<ColorModel> {
        Ok(IndexedModel::new(DepthProfile::RGB565, Palette::new(colors)?)?.into())
    };
    let mut writer = open_writer(Vec::new());
    writer.begin_sequence(Some(descriptor.clone()))?;
    writer.write_color_model(indexed(vec![0xFFFF_FFFF, 0xFFFF_0000])?)?;
    writer.write_color_model(indexed(vec![0xFF00_0000, 0xFF00_00FF])?)?;
    writer.write_raster(&Raster::from_pixels(3, 1, 1, &[0, 1, 0])?)?;
    assert_eq!(writer.end_sequence()?, descriptor);
    let bytes = writer.into_inner()?;

    let options = ReadOptions::builder().descriptor(descriptor).build();
    let mut reader = open_reader_with(Cursor::new(bytes), options)?;
    assert_eq!(reader.image_count(false)?, Some(2));
    assert_eq!(reader.read_raster(0)?, reader.read_raster(1)?);
    let first = reader.decode_image(0)?;
    let second = reader.decode_image(1)?;
    assert_eq!(first.pixels(), &[0xFFFF_FFFF, 0xFFFF_0000, 0xFFFF_FFFF]);
    assert_eq!(second.pixels(), &[0xFF00_0000, 0xFF00_00FF, 0xFF00_0000]);
    Ok(())
}

#[test]
fn out_of_range_after_full_scan() -> anyhow::Result<()> {
    let raster = Raster::from_pixels(2, 2, 8, &[1, 2, 3, 4])?;
    let bytes = stream_of(&[(gray8(), raster.clone()), (gray8(), raster)])?;

    let mut reader = open_reader(Cursor::new(bytes))?;
    assert_eq!(reader.image_count(false)?, None);
    assert_eq!(reader.image_count(true)?, Some(2));
    assert!(matches!(
        reader.decode_image(2),
        Err(Error::IndexOutOfRange { index: 2, len: 2 })
    ));
    assert!(reader.decode_image(1).is_ok());
    Ok(())
}

#[test]
fn huge_indices_are_out_of_range_while_streaming() -> anyhow::Result<()> {
    let bytes = stream_of(&[(gray8(), Raster::from_pixels(1, 1, 8, &[5])?)])?;

    let mut reader = open_reader(Cursor::new(bytes))?;
    let huge = usize::MAX / 2 + 1;
    assert!(matches!(
        reader.decode_image(huge),
        Err(Error::IndexOutOfRange { index, .. }) if index == huge
    ));
    assert!(matches!(
        reader.image_size(usize::MAX),
        Err(Error::IndexOutOfRange { .. })
    ));
    assert_eq!(reader.decode_image(0)?.pixels(), &[0xFF05_0505]);
    Ok(())
}

#[test]
fn streaming_stops_at_the_last_complete_image() -> anyhow::Result<()> {
    let raster = Raster::from_pixels(4, 4, 8, &[7; 16])?;
    let mut bytes = stream_of(&[(gray8(), raster.clone()), (gray8(), raster)])?;
    bytes.truncate(bytes.len() - 3);

    let mut reader = open_reader(Cursor::new(bytes.clone()))?;
    assert!(reader.decode_image(0).is_ok());
    assert!(matches!(
        reader.decode_image(1),
        Err(Error::IndexOutOfRange { index: 1, len: 1 })
    ));
    assert_eq!(reader.image_count(false)?, Some(1));

    // with the structure known up front a truncated block is an error
    let mut descriptor = CollectionDescriptor::new();
    descriptor.append_image();
    descriptor.append_image();
    let options = ReadOptions::builder().descriptor(descriptor).build();
    let mut reader = open_reader_with(Cursor::new(bytes), options)?;
    assert!(matches!(reader.decode_image(1), Err(Error::EndOfStream)));
    Ok(())
}

#[test]
fn streaming_and_descriptor_reads_agree() -> anyhow::Result<()> {
    let mut writer = open_writer(Vec::new());
    writer.begin_sequence(None)?;
    writer.write_image(&gray_ramp(5, 3), 5, 3, None)?;
    writer.write_image(&[0xFF12_3456, 0xFF65_4321], 2, 1, None)?;
    writer.write_image(&gray_ramp(1, 9), 1, 9, Some(gray8()))?;
    let descriptor = writer.end_sequence()?;
    let bytes = writer.into_inner()?;
    assert_eq!(descriptor.image_count(), 3);

    let mut streaming = open_reader(Cursor::new(bytes.clone()))?;
    let options = ReadOptions::builder().descriptor(descriptor).build();
    let mut known = open_reader_with(Cursor::new(bytes), options)?;
    for image in [2, 0, 1] {
        assert_eq!(streaming.decode_image(image)?, known.decode_image(image)?);
        assert_eq!(streaming.image_size(image)?, known.image_size(image)?);
        assert_eq!(
            streaming.image_color_model(image)?,
            known.image_color_model(image)?
        );
    }
    assert_eq!(streaming.image_color_model(2)?, gray8());
    assert_eq!(streaming.decode_image(0)?.pixels(), gray_ramp(5, 3));
    Ok(())
}

#[test]
fn forward_only_readers() -> anyhow::Result<()> {
    let raster = Raster::from_pixels(1, 1, 8, &[9])?;
    let bytes = stream_of(&[
        (gray8(), raster.clone()),
        (gray8(), raster.clone()),
        (gray8(), raster),
    ])?;
    let options = ReadOptions::builder().forward_only(true).build();
    let mut reader = open_reader_with(Cursor::new(bytes), options)?;

    assert_eq!(reader.image_count(false)?, None);
    assert!(matches!(reader.image_count(true), Err(Error::InvalidState(_))));
    reader.decode_image(1)?;
    reader.decode_image(1)?;
    assert!(matches!(
        reader.decode_image(0),
        Err(Error::IndexOutOfRange { index: 0, .. })
    ));
    assert_eq!(reader.image_size(2)?, (1, 1));
    Ok(())
}

#[test]
fn streams_may_start_mid_file() -> anyhow::Result<()> {
    let mut bytes = b"BPI".to_vec();
    bytes.extend(stream_of(&[(
        gray8(),
        Raster::from_pixels(2, 1, 8, &[0x00, 0xFF])?,
    )])?);
    let mut source = Cursor::new(bytes);
    source.seek(SeekFrom::Start(3))?;

    let mut reader = open_reader(source)?;
    assert_eq!(reader.decode_image(0)?.pixels(), &[0xFF00_0000, 0xFFFF_FFFF]);
    // seeking back to an earlier block stays relative to the stream start
    assert_eq!(reader.image_size(0)?, (2, 1));
    Ok(())
}

#[test]
fn decoding_into_a_reused_buffer() -> anyhow::Result<()> {
    let bytes = stream_of(&[
        (gray8(), Raster::from_pixels(4, 4, 8, &[0x80; 16])?),
        (gray8(), Raster::from_pixels(2, 1, 8, &[0x00, 0xFF])?),
    ])?;
    let mut reader = open_reader(Cursor::new(bytes))?;
    let mut buf = Vec::new();
    assert_eq!(reader.decode_image_into(0, &mut buf)?, (4, 4));
    assert_eq!(buf, vec![0xFF80_8080; 16]);
    let capacity = buf.capacity();
    assert_eq!(reader.decode_image_into(1, &mut buf)?, (2, 1));
    assert_eq!(buf, vec![0xFF00_0000, 0xFFFF_FFFF]);
    assert_eq!(buf.capacity(), capacity);
    Ok(())
}

#[test]
fn collection_with_descriptor_file() -> anyhow::Result<()> {
    let bpi = Temp::new_file()?;
    let definition = descriptor_path(&bpi);

    let mut writer = open_writer(File::create(&bpi)?);
    writer.begin_sequence(None)?;
    writer.write_image(&[0xFF00_0000, 0x0000_0000, 0xFFFF_FFFF], 3, 1, None)?;
    writer.write_image(&gray_ramp(3, 3), 3, 3, None)?;
    let descriptor = writer.end_sequence()?;
    writer.into_inner()?.flush()?;
    descriptor.into_file(&definition)?;

    let options = ReadOptions::builder()
        .descriptor(CollectionDescriptor::from_file(&definition)?)
        .build();
    let mut reader = open_reader_with(BufReader::new(File::open(&bpi)?), options)?;
    assert_eq!(reader.image_count(false)?, Some(2));
    let first = reader.decode_image(0)?;
    assert_eq!(first.pixels()[0], 0xFF00_0000);
    assert_eq!(first.pixels()[1] >> 24, 0);
    assert_eq!(first.pixels()[2], 0xFFFF_FFFF);
    assert_eq!(reader.decode_image(1)?.pixels(), gray_ramp(3, 3));

    std::fs::remove_file(definition)?;
    Ok(())
}
