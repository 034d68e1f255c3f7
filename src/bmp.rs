//! BMP serialization of a decoded image
//!
//! The layout is the classic 14 byte file header, a 40 byte Windows info
//! header, and uncompressed 24 bit pixel rows written bottom up with each
//! row padded to a 4 byte boundary.
#![allow(clippy::cast_possible_truncation)]

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::decoder::DecodedImage;

/// 14 byte file header plus 40 byte info header.
const HEADER_LEN: usize = 54;
/// Uncompressed RGB, the only compression mode we emit.
const BI_RGB: u32 = 0;

/// Serialize an image to an in-memory BMP file.
#[must_use]
pub fn encode(image: &DecodedImage) -> Vec<u8> {
    let width = image.width();
    let height = image.height();
    let padding = image.padding();
    let row_size = width * 3 + padding;
    let pixel_bytes = row_size * height;

    let mut out = Vec::with_capacity(HEADER_LEN + pixel_bytes);

    // file header
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&((HEADER_LEN + pixel_bytes) as u32).to_le_bytes());
    out.extend_from_slice(&0_u16.to_le_bytes());
    out.extend_from_slice(&0_u16.to_le_bytes());
    out.extend_from_slice(&(HEADER_LEN as u32).to_le_bytes());

    // info header
    out.extend_from_slice(&40_u32.to_le_bytes());
    out.extend_from_slice(&(width as i32).to_le_bytes());
    out.extend_from_slice(&(height as i32).to_le_bytes());
    out.extend_from_slice(&1_u16.to_le_bytes());
    out.extend_from_slice(&24_u16.to_le_bytes());
    out.extend_from_slice(&BI_RGB.to_le_bytes());
    out.extend_from_slice(&(pixel_bytes as u32).to_le_bytes());
    out.extend_from_slice(&1_i32.to_le_bytes());
    out.extend_from_slice(&1_i32.to_le_bytes());
    out.extend_from_slice(&0_u32.to_le_bytes());
    out.extend_from_slice(&0_u32.to_le_bytes());

    // pixel rows, bottom up, blue first
    for y in (0..height).rev() {
        for x in 0..width {
            let (r, g, b) = image.pixel(x, y);
            out.push(b);
            out.push(g);
            out.push(r);
        }
        for _ in 0..padding {
            out.push(0);
        }
    }

    out
}

/// Serialize an image straight to a file.
///
/// # Errors
/// Any I/O error from creating or writing the file.
pub fn write<P: AsRef<Path>>(path: P, image: &DecodedImage) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(&encode(image))
}

#[cfg(test)]
mod tests {
    use super::{encode, HEADER_LEN};
    use crate::decoder::DecodedImage;

    fn solid_image(width: usize, height: usize, rgb: (i16, i16, i16)) -> DecodedImage {
        let cells_w = (width + 7) / 8;
        let cells_h = (height + 7) / 8;
        let mut data = vec![0_i16; cells_w * cells_h * 3 * 64];
        for cell in 0..cells_w * cells_h {
            for i in 0..64 {
                data[(cell * 3) * 64 + i] = rgb.0;
                data[(cell * 3 + 1) * 64 + i] = rgb.1;
                data[(cell * 3 + 2) * 64 + i] = rgb.2;
            }
        }
        DecodedImage {
            width,
            height,
            padding: width % 4,
            mcu_width_real: cells_w,
            mcu_height_real: cells_h,
            data,
        }
    }

    #[test]
    fn header_layout() {
        let image = solid_image(6, 2, (1, 2, 3));
        let bytes = encode(&image);

        // 6 pixels of 3 bytes plus 2 bytes of padding per row
        let row_size = 6 * 3 + 2;
        assert_eq!(bytes.len(), HEADER_LEN + row_size * 2);

        assert_eq!(&bytes[0..2], b"BM");
        assert_eq!(
            u32::from_le_bytes(bytes[2..6].try_into().unwrap()),
            (HEADER_LEN + row_size * 2) as u32
        );
        assert_eq!(u32::from_le_bytes(bytes[10..14].try_into().unwrap()), 54);
        assert_eq!(u32::from_le_bytes(bytes[14..18].try_into().unwrap()), 40);
        assert_eq!(i32::from_le_bytes(bytes[18..22].try_into().unwrap()), 6);
        assert_eq!(i32::from_le_bytes(bytes[22..26].try_into().unwrap()), 2);
        assert_eq!(u16::from_le_bytes(bytes[26..28].try_into().unwrap()), 1);
        assert_eq!(u16::from_le_bytes(bytes[28..30].try_into().unwrap()), 24);
        assert_eq!(u32::from_le_bytes(bytes[30..34].try_into().unwrap()), 0);
    }

    #[test]
    fn pixels_are_bottom_up_bgr() {
        let mut image = solid_image(2, 2, (0, 0, 0));
        // top left pixel red, bottom right pixel blue
        image.data[0] = 255;
        image.data[128 + 9] = 200;

        let bytes = encode(&image);
        let rows = &bytes[HEADER_LEN..];
        let row_size = 2 * 3 + 2;

        // first stored row is the bottom image row; its second pixel is
        // the blue one
        assert_eq!(rows[row_size - 2 - 3..row_size - 2], [200, 0, 0]);
        // second stored row starts with the red top left pixel as B G R
        assert_eq!(rows[row_size..row_size + 3], [0, 0, 255]);
    }

    #[test]
    fn row_padding_is_zeroed() {
        let image = solid_image(3, 1, (9, 9, 9));
        let bytes = encode(&image);
        // width 3 -> 9 pixel bytes and 3 padding bytes
        assert_eq!(bytes.len(), HEADER_LEN + 12);
        assert_eq!(&bytes[HEADER_LEN + 9..], &[0, 0, 0]);
    }
}
