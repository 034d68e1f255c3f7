//! The decoder context and the top level decode pipeline

use std::fs::read;
use std::path::Path;

use crate::components::Components;
use crate::errors::{DecodeErrors, UnsupportedSchemes};
use crate::headers::{parse_dqt, parse_dri, parse_huffman, parse_sof, parse_sos};
use crate::huffman::HuffmanTable;
use crate::marker::Marker;
use crate::reader::ByteReader;
use crate::worker;

/// Maximum number of components in a scan
pub(crate) const MAX_COMPONENTS: usize = 3;
/// Quantization table slots
pub(crate) const MAX_QUANT_TABLES: usize = 4;
/// Huffman table slots per class
pub(crate) const MAX_HUFFMAN_TABLES: usize = 4;

/// A JPEG decoder instance.
///
/// One instance decodes one image: the segment reader populates the
/// context, the context is then shared read-only by every decoding lane.
pub struct Decoder {
    /// Image width in pixels
    pub(crate) width: u16,
    /// Image height in pixels
    pub(crate) height: u16,
    /// Quantization tables in natural order, indexed by DQT table id
    pub(crate) qt_tables: [Option<[u16; 64]>; MAX_QUANT_TABLES],
    /// DC Huffman tables, indexed by DHT table id
    pub(crate) dc_huffman_tables: [Option<HuffmanTable>; MAX_HUFFMAN_TABLES],
    /// AC Huffman tables, indexed by DHT table id
    pub(crate) ac_huffman_tables: [Option<HuffmanTable>; MAX_HUFFMAN_TABLES],
    /// Components in frame order
    pub(crate) components: Vec<Components>,
    /// Maximum horizontal sampling factor over all components
    pub(crate) h_max: usize,
    /// Maximum vertical sampling factor over all components
    pub(crate) v_max: usize,
    /// MCU grid cells across, `ceil(width / 8)`
    pub(crate) mcu_width: usize,
    /// MCU grid cells down, `ceil(height / 8)`
    pub(crate) mcu_height: usize,
    /// Grid cells across padded up to even when `h_max` is 2
    pub(crate) mcu_width_real: usize,
    /// Grid cells down padded up to even when `v_max` is 2
    pub(crate) mcu_height_real: usize,
    /// BMP row padding, `width % 4`
    pub(crate) padding: usize,
    /// Restart interval from DRI, zero when absent
    pub(crate) restart_interval: u16,
    /// Byte offset of the first entropy coded byte
    pub(crate) scan_start: usize,
    /// Bytes from `scan_start` to the end of the file
    pub(crate) scan_length: usize,
    /// Number of parallel entropy decoding lanes
    pub(crate) num_lanes: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder::new()
    }
}

impl Decoder {
    /// Create a new single lane decoder.
    #[must_use]
    pub fn new() -> Decoder {
        Decoder {
            width: 0,
            height: 0,
            qt_tables: [None, None, None, None],
            dc_huffman_tables: [None, None, None, None],
            ac_huffman_tables: [None, None, None, None],
            components: vec![],
            h_max: 1,
            v_max: 1,
            mcu_width: 0,
            mcu_height: 0,
            mcu_width_real: 0,
            mcu_height_real: 0,
            padding: 0,
            restart_interval: 0,
            scan_start: 0,
            scan_length: 0,
            num_lanes: 1,
        }
    }

    /// Set the number of parallel entropy decoding lanes.
    ///
    /// A value of one decodes the scan on the calling thread. The count
    /// is reduced for small scans so every lane has real work to do, so
    /// this is an upper bound.
    pub fn set_num_lanes(&mut self, lanes: usize) {
        self.num_lanes = lanes.max(1);
    }

    /// Width of the image, valid after a decode.
    #[must_use]
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Height of the image, valid after a decode.
    #[must_use]
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Decode a JPEG file from disk.
    ///
    /// # Errors
    /// Any of the [`DecodeErrors`] kinds; an unreadable file is reported
    /// as `ExhaustedData`.
    pub fn decode_file<P>(&mut self, file: P) -> Result<DecodedImage, DecodeErrors>
    where
        P: AsRef<Path>,
    {
        let buffer = read(file.as_ref()).map_err(|e| {
            error!("Could not read {:?}: {}", file.as_ref(), e);
            DecodeErrors::ExhaustedData
        })?;
        self.decode_buffer(&buffer)
    }

    /// Decode a JPEG image already in memory.
    ///
    /// # Errors
    /// - `IllegalMagicBytes` when the buffer does not start with `FFD8`
    /// - `Unsupported` for non-baseline encodings
    /// - the remaining [`DecodeErrors`] kinds for malformed streams
    pub fn decode_buffer(&mut self, data: &[u8]) -> Result<DecodedImage, DecodeErrors> {
        let mut reader = ByteReader::new(data);
        self.decode_headers(&mut reader)?;

        self.scan_start = reader.position();
        self.scan_length = data.len().saturating_sub(self.scan_start);
        debug!(
            "Entropy coded scan: {} bytes at offset {}",
            self.scan_length, self.scan_start
        );

        let mut blocks = worker::decode_scan(self, data)?;
        worker::render(self, &mut blocks);

        Ok(DecodedImage {
            width: usize::from(self.width),
            height: usize::from(self.height),
            padding: self.padding,
            mcu_width_real: self.mcu_width_real,
            mcu_height_real: self.mcu_height_real,
            data: blocks,
        })
    }

    /// Parse marker segments up to and including the SOS marker.
    ///
    /// On return the reader is positioned at the first entropy coded byte.
    fn decode_headers(&mut self, reader: &mut ByteReader) -> Result<(), DecodeErrors> {
        let magic_bytes = reader.read_u16_be();
        if magic_bytes != 0xffd8 {
            return Err(DecodeErrors::IllegalMagicBytes(magic_bytes));
        }

        loop {
            let marker = next_marker(reader)?;
            match marker {
                Marker::SOF(0) => {
                    debug!("SOF0, baseline DCT");
                    parse_sof(self, reader)?;
                }
                Marker::SOF(v) => {
                    let scheme = UnsupportedSchemes::from_int(0xc0 + v).ok_or_else(|| {
                        DecodeErrors::MalformedSegment(format!("Unknown SOF marker {v}"))
                    })?;
                    return Err(DecodeErrors::Unsupported(scheme));
                }
                Marker::DAC => {
                    return Err(DecodeErrors::Unsupported(
                        UnsupportedSchemes::ArithmeticConditioning,
                    ));
                }
                Marker::DQT => parse_dqt(self, reader)?,
                Marker::DRI => parse_dri(self, reader)?,
                Marker::DHT => parse_huffman(self, reader)?,
                Marker::SOS => {
                    parse_sos(self, reader)?;
                    // what follows is the entropy coded data
                    return Ok(());
                }
                Marker::APP(_)
                | Marker::COM
                | Marker::DNL
                | Marker::DHP
                | Marker::EXP
                | Marker::JPG(_) => {
                    debug!("Skipping {marker:?} segment");
                    skip_marker(reader)?;
                }
                Marker::SOI | Marker::EOI | Marker::RST(_) => {
                    return Err(DecodeErrors::MalformedSegment(format!(
                        "Unexpected {marker:?} while reading segments"
                    )));
                }
            }
        }
    }

}

/// Find the next marker.
///
/// Bytes before the `0xFF` are discarded with a warning, consecutive
/// `0xFF` bytes are legal padding.
fn next_marker(reader: &mut ByteReader) -> Result<Marker, DecodeErrors> {
    let mut discarded_bytes = 0_usize;

    let mut byte = reader.read_u8();
    while byte != 0xff {
        if reader.at_eof() {
            return Err(DecodeErrors::ExhaustedData);
        }
        discarded_bytes += 1;
        byte = reader.read_u8();
    }

    let mut marker = reader.read_u8();
    while marker == 0xff {
        if reader.at_eof() {
            return Err(DecodeErrors::ExhaustedData);
        }
        marker = reader.read_u8();
    }

    if discarded_bytes > 0 {
        warn!("Discarded {discarded_bytes} bytes while looking for a marker");
    }

    Marker::from_u8(marker)
        .ok_or_else(|| DecodeErrors::MalformedSegment(format!("Unknown marker {marker:#04x}")))
}

/// Skip a variable length segment whose contents we do not care about.
fn skip_marker(reader: &mut ByteReader) -> Result<(), DecodeErrors> {
    let length = reader.read_u16_be();
    // the length field includes itself
    if length < 2 {
        return Err(DecodeErrors::MalformedSegment(format!(
            "Marker segment length {length} is shorter than its own length field"
        )));
    }
    reader.skip(usize::from(length) - 2);
    Ok(())
}

/// The decoded RGB output of one image.
///
/// Pixels are stored as the MCU grid the decoder produced: for each grid
/// cell in row major order, three interleaved 64 entry blocks holding the
/// R, G and B samples of that 8x8 tile. The BMP writer consumes this
/// layout verbatim.
#[derive(Debug)]
pub struct DecodedImage {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) padding: usize,
    pub(crate) mcu_width_real: usize,
    pub(crate) mcu_height_real: usize,
    pub(crate) data: Vec<i16>,
}

impl DecodedImage {
    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// BMP row padding in bytes, `width % 4`.
    #[must_use]
    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Stride of the MCU grid in cells.
    #[must_use]
    pub fn mcu_width_real(&self) -> usize {
        self.mcu_width_real
    }

    /// Height of the MCU grid in cells.
    #[must_use]
    pub fn mcu_height_real(&self) -> usize {
        self.mcu_height_real
    }

    /// The MCU grid ordered R, G, B blocks.
    #[must_use]
    pub fn blocks(&self) -> &[i16] {
        &self.data
    }

    /// Fetch one pixel as an RGB triple.
    ///
    /// # Panics
    /// When `x` or `y` lie outside the image.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> (u8, u8, u8) {
        assert!(x < self.width && y < self.height);
        let cell = (y / 8) * self.mcu_width_real + (x / 8);
        let base = cell * 3 * 64;
        let offset = (y % 8) * 8 + (x % 8);
        (
            self.data[base + offset] as u8,
            self.data[base + 64 + offset] as u8,
            self.data[base + 128 + offset] as u8,
        )
    }
}
