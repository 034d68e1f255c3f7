//! End to end decode scenarios over synthesized streams.

mod common;

use common::{dqt, flat_q, gray_jpeg, sof0, soi, ycbcr_jpeg, TestBlock};
use jpeg_lanes::errors::DecodeErrors;
use jpeg_lanes::Decoder;

#[test]
fn all_zero_gray_image_is_mid_gray() {
    let jpeg = gray_jpeg(8, 8, &flat_q(1), &[TestBlock::dc(0)]);

    let mut decoder = Decoder::new();
    let image = decoder.decode_buffer(&jpeg).unwrap();

    assert_eq!(image.width(), 8);
    assert_eq!(image.height(), 8);
    for y in 0..8 {
        for x in 0..8 {
            assert_eq!(image.pixel(x, y), (128, 128, 128));
        }
    }
}

#[test]
fn wrong_magic_bytes() {
    let mut decoder = Decoder::new();
    let err = decoder.decode_buffer(&[0x00, 0x00, 0xff, 0xd8]).unwrap_err();
    assert!(matches!(err, DecodeErrors::IllegalMagicBytes(0)));
}

#[test]
fn empty_image_has_no_frame() {
    // SOI immediately followed by EOI
    let mut decoder = Decoder::new();
    let err = decoder.decode_buffer(&[0xff, 0xd8, 0xff, 0xd9]).unwrap_err();
    assert!(matches!(err, DecodeErrors::MalformedSegment(_)));
}

#[test]
fn progressive_frames_are_unsupported() {
    let mut jpeg = soi();
    jpeg.extend(dqt(0, &flat_q(1)));
    let mut frame = sof0(8, 8, &[(1, 1, 1, 0)]);
    frame[1] = 0xc2; // rewrite the marker to SOF2, progressive DCT
    jpeg.extend(frame);

    let mut decoder = Decoder::new();
    let err = decoder.decode_buffer(&jpeg).unwrap_err();
    assert!(matches!(err, DecodeErrors::Unsupported(_)));
}

#[test]
fn truncated_stream_is_exhausted_data() {
    let mut decoder = Decoder::new();
    let err = decoder.decode_buffer(&[0xff, 0xd8, 0x12]).unwrap_err();
    assert!(matches!(err, DecodeErrors::ExhaustedData));
}

#[test]
fn zero_width_frame_is_rejected() {
    let mut jpeg = soi();
    jpeg.extend(dqt(0, &flat_q(1)));
    jpeg.extend(sof0(0, 8, &[(1, 1, 1, 0)]));

    let mut decoder = Decoder::new();
    let err = decoder.decode_buffer(&jpeg).unwrap_err();
    assert!(matches!(err, DecodeErrors::MalformedSegment(_)));
}

#[test]
fn scan_without_quantization_table_is_rejected() {
    // a structurally complete file that never defines table 0
    let full = gray_jpeg(8, 8, &flat_q(1), &[TestBlock::dc(0)]);
    let mut jpeg = Vec::new();
    let mut position = 0;
    while position < full.len() {
        // strip the DQT segment, 69 bytes starting with FF DB
        if full[position] == 0xff && full.get(position + 1) == Some(&0xdb) {
            position += 69;
            continue;
        }
        jpeg.push(full[position]);
        position += 1;
    }

    let mut decoder = Decoder::new();
    let err = decoder.decode_buffer(&jpeg).unwrap_err();
    assert!(matches!(err, DecodeErrors::MalformedSegment(_)));
}

// A 3x3 single component frame whose one block drives luma far below
// zero: every channel clamps to zero.
#[test]
fn clamped_dark_image() {
    let jpeg = gray_jpeg(3, 3, &flat_q(8), &[TestBlock::dc(-2047)]);

    let mut decoder = Decoder::new();
    let image = decoder.decode_buffer(&jpeg).unwrap();

    assert_eq!(image.width(), 3);
    assert_eq!(image.height(), 3);
    assert_eq!(image.padding(), 3);
    for y in 0..3 {
        for x in 0..3 {
            assert_eq!(image.pixel(x, y), (0, 0, 0));
        }
    }
}

// One 4:2:0 MCU: the real grid pads up to 2x2 cells and a single MCU
// covers the whole 16x16 frame.
#[test]
fn single_mcu_420_frame() {
    let blocks = vec![TestBlock::dc(0); 6]; // 4 luma + Cb + Cr
    let jpeg = ycbcr_jpeg(16, 16, 2, 2, &flat_q(1), &blocks);

    let mut decoder = Decoder::new();
    let image = decoder.decode_buffer(&jpeg).unwrap();

    assert_eq!(image.width(), 16);
    assert_eq!(image.height(), 16);
    assert_eq!(image.mcu_width_real(), 2);
    for y in 0..16 {
        for x in 0..16 {
            assert_eq!(image.pixel(x, y), (128, 128, 128));
        }
    }
}

// Chroma actually shifts the output colors: a flat Cr plane pushes red
// up and green down, blue untouched.
#[test]
fn chroma_tints_the_output() {
    // luma 0, Cb 0, Cr dequantizes to 512 which the IDCT flattens to 63
    let blocks = [TestBlock::dc(0), TestBlock::dc(0), TestBlock::dc(8)];
    let jpeg = ycbcr_jpeg(8, 8, 1, 1, &flat_q(64), &blocks);

    let mut decoder = Decoder::new();
    let image = decoder.decode_buffer(&jpeg).unwrap();

    for y in 0..8 {
        for x in 0..8 {
            let (r, g, b) = image.pixel(x, y);
            assert_eq!((r, g, b), (216, 83, 128));
        }
    }
}

// Odd MCU grids with 2x2 sampling round the real grid up to even; the
// frame still decodes and the padded cells never leak into pixels.
#[test]
fn odd_grid_420_frame() {
    // 24x24 pixels -> 3x3 grid -> 4x4 real, 2x2 MCUs of 6 blocks
    let blocks = vec![TestBlock::dc(0); 4 * 6];
    let jpeg = ycbcr_jpeg(24, 24, 2, 2, &flat_q(1), &blocks);

    let mut decoder = Decoder::new();
    let image = decoder.decode_buffer(&jpeg).unwrap();

    assert_eq!(image.mcu_width_real(), 4);
    assert_eq!(image.mcu_height_real(), 4);
    assert_eq!(image.pixel(23, 23), (128, 128, 128));
}

#[test]
fn decoder_reports_frame_dimensions() {
    let jpeg = gray_jpeg(16, 8, &flat_q(1), &vec![TestBlock::dc(0); 2]);

    let mut decoder = Decoder::new();
    decoder.decode_buffer(&jpeg).unwrap();

    assert_eq!(decoder.width(), 16);
    assert_eq!(decoder.height(), 8);
}

#[test]
fn bmp_of_a_decoded_image() {
    let jpeg = gray_jpeg(8, 8, &flat_q(1), &[TestBlock::dc(0)]);
    let mut decoder = Decoder::new();
    let image = decoder.decode_buffer(&jpeg).unwrap();

    let bmp = jpeg_lanes::bmp::encode(&image);
    assert_eq!(&bmp[0..2], b"BM");
    // 54 byte header, 8 rows of 24 bytes, no padding
    assert_eq!(bmp.len(), 54 + 8 * 24);
    // mid gray pixels all the way through
    assert!(bmp[54..].iter().all(|&b| b == 128));
}
