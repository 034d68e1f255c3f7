//! Bit level access to the Huffman coded scan
//!
//! The scan is a byte-stuffed bitstream: a `0xFF` data byte is written as
//! `0xFF 0x00`, restart markers may be sprinkled between MCUs, and any
//! other marker after a `0xFF` means the entropy coded data is over. The
//! [`BitStream`] undoes all of that and hands out MSB-first bit groups.

use crate::errors::DecodeErrors;
use crate::huffman::HuffmanTable;
use crate::reader::ByteReader;

/// A bit reader over the entropy coded segment.
///
/// Keeps a 32 bit buffer filled from the most significant end, enough for
/// one Huffman code (16 bits) plus one coefficient receive (16 bits).
pub(crate) struct BitStream {
    /// MSB aligned bit buffer
    buffer: u32,
    /// Valid bits in `buffer`
    bits_left: u32,
    /// Set when the entropy stream ended, either on a terminating marker
    /// or because the byte source ran dry. Further reads yield zero bits.
    pub(crate) eof: bool,
}

impl BitStream {
    pub(crate) const fn new() -> BitStream {
        BitStream {
            buffer: 0,
            bits_left: 0,
            eof: false,
        }
    }

    /// Fetch the next entropy byte, undoing byte stuffing.
    ///
    /// - `FF 00` yields a literal `0xFF`.
    /// - `FF Dn` (a restart marker) is swallowed and the following byte
    ///   is delivered instead; predictors are not touched.
    /// - `FF` followed by any other non-zero byte ends the stream.
    #[inline]
    fn next_stuffed_byte(&mut self, reader: &mut ByteReader) -> u32 {
        if self.eof {
            return 0;
        }

        let mut byte = reader.read_u8();
        let mut value = u32::from(byte);

        while byte == 0xff {
            byte = reader.read_u8();
            if byte == 0xff {
                // FF bytes are legal padding before a marker, keep looking
                continue;
            }
            if byte == 0x00 {
                // stuffed literal
                value = 0xff;
            } else if (0xd0..=0xd7).contains(&byte) {
                // restart marker, discard and read a fresh byte
                byte = reader.read_u8();
                value = u32::from(byte);
            } else {
                // some other marker, the entropy stream is over
                self.eof = true;
                return 0;
            }
        }

        if reader.at_eof() {
            self.eof = true;
        }
        value
    }

    /// Read `num_bits` (0..=16) from the stream.
    ///
    /// Bits past the end of the entropy data read as zero.
    #[inline]
    pub(crate) fn get_bits(&mut self, reader: &mut ByteReader, num_bits: u8) -> i32 {
        if num_bits == 0 {
            return 0;
        }
        let num_bits = u32::from(num_bits);

        while self.bits_left < num_bits {
            let byte = self.next_stuffed_byte(reader);
            self.buffer |= byte << (24 - self.bits_left);
            self.bits_left += 8;
        }

        let bits = self.buffer >> (32 - num_bits);
        self.buffer <<= num_bits;
        self.bits_left -= num_bits;

        bits as i32
    }

    /// Decode one Huffman symbol.
    ///
    /// Reads a bit at a time, folding it into a rolling code and scanning
    /// the canonical codes of that length for an exact match.
    ///
    /// # Errors
    /// `InvalidHuffmanCode` if no code matches within 16 bits.
    pub(crate) fn huff_decode(
        &mut self,
        reader: &mut ByteReader,
        table: &HuffmanTable,
    ) -> Result<u8, DecodeErrors> {
        let mut code: u32 = 0;

        for i in 0..16 {
            code = (code << 1) | (self.get_bits(reader, 1) as u32);
            for j in table.valoffset[i]..table.valoffset[i + 1] {
                if code == table.codes[j] {
                    return Ok(table.huffval[j]);
                }
            }
        }

        Err(DecodeErrors::InvalidHuffmanCode)
    }
}
