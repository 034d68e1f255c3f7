//! Decode JPEG marker segments
//!
//! This file deals with decoding header information in a JPEG file and
//! populating the decoder context with it.

use std::cmp::max;

use crate::components::Components;
use crate::decoder::{Decoder, MAX_HUFFMAN_TABLES, MAX_QUANT_TABLES};
use crate::errors::DecodeErrors;
use crate::huffman::HuffmanTable;
use crate::misc::UN_ZIGZAG;
use crate::reader::ByteReader;

/// **B.2.4.1 Quantization table-specification syntax**
///
/// A single DQT segment may contain multiple tables, each one an info byte
/// (precision in the high nibble, table id in the low nibble) followed by
/// 64 entries in zig-zag order, one byte each for precision 0 and one
/// big-endian short each for precision 1.
pub fn parse_dqt(decoder: &mut Decoder, buf: &mut ByteReader) -> Result<(), DecodeErrors> {
    let mut length = i32::from(buf.read_u16_be()) - 2;

    while length > 0 {
        let qt_info = buf.read_u8();
        length -= 1;

        let precision = (qt_info >> 4) & 0x0f;
        let table_id = usize::from(qt_info & 0x0f);
        if table_id >= MAX_QUANT_TABLES {
            return Err(DecodeErrors::MalformedSegment(format!(
                "Quantization table id {table_id} out of range, expected 0..=3"
            )));
        }

        let mut table = [0u16; 64];
        match precision {
            0 => {
                for i in 0..64 {
                    table[UN_ZIGZAG[i]] = u16::from(buf.read_u8());
                }
                length -= 64;
            }
            1 => {
                for i in 0..64 {
                    table[UN_ZIGZAG[i]] = buf.read_u16_be();
                }
                length -= 128;
            }
            _ => {
                return Err(DecodeErrors::MalformedSegment(format!(
                    "Quantization table precision should be 0 or 1, found {precision}"
                )));
            }
        }

        if buf.at_eof() {
            return Err(DecodeErrors::ExhaustedData);
        }
        decoder.qt_tables[table_id] = Some(table);
    }

    if length != 0 {
        return Err(DecodeErrors::MalformedSegment(
            "DQT length does not match its contents".to_string(),
        ));
    }
    Ok(())
}

/// **B.2.4.4 Restart interval definition syntax**
pub fn parse_dri(decoder: &mut Decoder, buf: &mut ByteReader) -> Result<(), DecodeErrors> {
    let length = buf.read_u16_be();
    if length != 4 {
        return Err(DecodeErrors::MalformedSegment(format!(
            "DRI length should be 4, found {length}"
        )));
    }

    decoder.restart_interval = buf.read_u16_be();
    debug!("Restart interval: {}", decoder.restart_interval);
    Ok(())
}

/// **B.2.2 Frame header syntax**
pub fn parse_sof(decoder: &mut Decoder, buf: &mut ByteReader) -> Result<(), DecodeErrors> {
    if !decoder.components.is_empty() {
        return Err(DecodeErrors::MalformedSegment(
            "Multiple SOF markers encountered".to_string(),
        ));
    }

    let length = buf.read_u16_be();

    let precision = buf.read_u8();
    if precision != 8 {
        return Err(DecodeErrors::Unsupported(
            crate::errors::UnsupportedSchemes::HighPrecision(precision),
        ));
    }

    let height = buf.read_u16_be();
    let width = buf.read_u16_be();
    if height == 0 || width == 0 {
        return Err(DecodeErrors::MalformedSegment(format!(
            "Image dimensions cannot be zero, found {width} x {height}"
        )));
    }

    let num_components = buf.read_u8();
    if num_components == 0 || num_components > 3 {
        return Err(DecodeErrors::MalformedSegment(format!(
            "Number of components should be between 1 and 3, found {num_components}"
        )));
    }
    if length != u16::from(8 + 3 * num_components) {
        return Err(DecodeErrors::MalformedSegment(format!(
            "SOF length should be {}, found {length}",
            8 + 3 * num_components
        )));
    }

    decoder.width = width;
    decoder.height = height;
    decoder.mcu_width = (usize::from(width) + 7) / 8;
    decoder.mcu_height = (usize::from(height) + 7) / 8;
    decoder.padding = usize::from(width) % 4;
    decoder.mcu_width_real = decoder.mcu_width;
    decoder.mcu_height_real = decoder.mcu_height;

    let mut components = Vec::with_capacity(usize::from(num_components));
    for _ in 0..num_components {
        let bytes = [buf.read_u8(), buf.read_u8(), buf.read_u8()];
        if buf.at_eof() {
            return Err(DecodeErrors::ExhaustedData);
        }
        let component = Components::from(bytes)?;

        decoder.h_max = max(decoder.h_max, component.horizontal_sample);
        decoder.v_max = max(decoder.v_max, component.vertical_sample);

        components.push(component);
    }

    // grids with 2x sampling work on pairs of blocks, round the real
    // grid dimensions up so every MCU has a full complement of cells
    if decoder.h_max == 2 && decoder.mcu_width % 2 == 1 {
        decoder.mcu_width_real += 1;
    }
    if decoder.v_max == 2 && decoder.mcu_height % 2 == 1 {
        decoder.mcu_height_real += 1;
    }

    debug!(
        "Frame: {}x{} pixels, {}x{} MCU grid ({}x{} real), sampling {}x{}",
        width,
        height,
        decoder.mcu_width,
        decoder.mcu_height,
        decoder.mcu_width_real,
        decoder.mcu_height_real,
        decoder.h_max,
        decoder.v_max
    );

    decoder.components = components;
    Ok(())
}

/// **B.2.4.2 Huffman table-specification syntax**
///
/// A single DHT segment may contain multiple tables. Canonical codes are
/// generated later, once the SOS marker confirms the scan is baseline.
pub fn parse_huffman(decoder: &mut Decoder, buf: &mut ByteReader) -> Result<(), DecodeErrors> {
    let mut length = i32::from(buf.read_u16_be()) - 2;

    while length > 0 {
        let ht_info = buf.read_u8();
        length -= 1;

        let class = (ht_info >> 4) & 0x0f;
        let table_id = usize::from(ht_info & 0x0f);
        if class > 1 {
            return Err(DecodeErrors::MalformedSegment(format!(
                "Huffman table class should be 0 (DC) or 1 (AC), found {class}"
            )));
        }
        if table_id >= MAX_HUFFMAN_TABLES {
            return Err(DecodeErrors::MalformedSegment(format!(
                "Huffman table id {table_id} out of range, expected 0..=3"
            )));
        }

        let mut counts = [0u8; 16];
        for count in &mut counts {
            *count = buf.read_u8();
        }
        let total: usize = counts.iter().map(|c| usize::from(*c)).sum();

        let mut symbols = vec![0u8; total];
        for symbol in &mut symbols {
            *symbol = buf.read_u8();
        }
        if buf.at_eof() {
            return Err(DecodeErrors::ExhaustedData);
        }
        length -= 16 + total as i32;

        let table = HuffmanTable::new(&counts, &symbols)?;
        if class == 0 {
            decoder.dc_huffman_tables[table_id] = Some(table);
        } else {
            decoder.ac_huffman_tables[table_id] = Some(table);
        }
    }

    if length != 0 {
        return Err(DecodeErrors::MalformedSegment(
            "DHT length does not match its contents".to_string(),
        ));
    }
    Ok(())
}

/// **B.2.3 Scan header syntax**
///
/// Validates the scan is baseline (full spectral range, no successive
/// approximation), attaches entropy table ids to the components and
/// builds the canonical Huffman codes. The byte reader is left positioned
/// at the first entropy coded byte.
pub fn parse_sos(decoder: &mut Decoder, buf: &mut ByteReader) -> Result<(), DecodeErrors> {
    if decoder.components.is_empty() {
        return Err(DecodeErrors::MalformedSegment(
            "SOS encountered without a preceding SOF".to_string(),
        ));
    }

    let length = buf.read_u16_be();

    let num_components = buf.read_u8();
    if usize::from(num_components) != decoder.components.len() {
        return Err(DecodeErrors::MalformedSegment(format!(
            "SOS component count {} does not match the frame's {}",
            num_components,
            decoder.components.len()
        )));
    }
    if length != u16::from(6 + 2 * num_components) {
        return Err(DecodeErrors::MalformedSegment(format!(
            "SOS length should be {}, found {length}",
            6 + 2 * num_components
        )));
    }

    for _ in 0..num_components {
        let component_id = buf.read_u8();
        let tables = buf.read_u8();

        let component = decoder
            .components
            .iter_mut()
            .find(|c| c.id == component_id)
            .ok_or_else(|| {
                DecodeErrors::MalformedSegment(format!(
                    "SOS references component id {component_id} not declared in the frame"
                ))
            })?;

        component.dc_huff_table = usize::from((tables >> 4) & 0x0f);
        component.ac_huff_table = usize::from(tables & 0x0f);
        if component.dc_huff_table >= MAX_HUFFMAN_TABLES
            || component.ac_huff_table >= MAX_HUFFMAN_TABLES
        {
            return Err(DecodeErrors::MalformedSegment(format!(
                "Huffman table ids {}/{} out of range for component {component_id}",
                component.dc_huff_table, component.ac_huff_table
            )));
        }
    }

    // spectral selection and successive approximation, fixed for baseline
    let ss = buf.read_u8();
    let se = buf.read_u8();
    let approx = buf.read_u8();
    if buf.at_eof() {
        return Err(DecodeErrors::ExhaustedData);
    }

    if ss != 0 || se != 63 {
        return Err(DecodeErrors::MalformedSegment(format!(
            "Baseline scans cover the full spectral range, found Ss={ss} Se={se}"
        )));
    }
    if approx != 0 {
        return Err(DecodeErrors::MalformedSegment(format!(
            "Baseline scans use no successive approximation, found Ah/Al={approx:#04x}"
        )));
    }

    for table in decoder
        .dc_huffman_tables
        .iter_mut()
        .chain(decoder.ac_huffman_tables.iter_mut())
        .flatten()
    {
        table.build_codes();
    }

    Ok(())
}
