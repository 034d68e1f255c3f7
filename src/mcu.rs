//! Entropy decoding of one 8x8 coefficient block
#![allow(clippy::cast_possible_truncation)]

use crate::bitstream::BitStream;
use crate::errors::DecodeErrors;
use crate::huffman::HuffmanTable;
use crate::misc::UN_ZIGZAG;
use crate::reader::ByteReader;

impl BitStream {
    /// Decode one block for one component.
    ///
    /// The DC delta is Huffman coded as a magnitude category followed by
    /// that many raw bits; ACs are run-length/size coded in zig-zag order.
    /// Coefficients are dequantized and de-zigzagged on the way out, and
    /// the undequantized running DC is written back to `dc_pred`.
    ///
    /// `block` must be zeroed on entry; positions skipped by runs and the
    /// end-of-block code are left untouched.
    pub(crate) fn decode_block(
        &mut self,
        reader: &mut ByteReader,
        dc_table: &HuffmanTable,
        ac_table: &HuffmanTable,
        q_table: &[u16; 64],
        block: &mut [i16; 64],
        dc_pred: &mut i32,
    ) -> Result<(), DecodeErrors> {
        // DC coefficient
        let dc_length = self.huff_decode(reader, dc_table)?;
        if dc_length > 11 {
            return Err(DecodeErrors::InvalidDcLength(dc_length));
        }

        let mut coeff = self.get_bits(reader, dc_length);
        if dc_length != 0 && coeff < (1 << (dc_length - 1)) {
            // leading zero bit means a negative coefficient
            coeff -= (1 << dc_length) - 1;
        }

        let dc = coeff + *dc_pred;
        *dc_pred = dc;
        block[0] = (dc * i32::from(q_table[0])) as i16;

        // AC coefficients
        let mut i = 1_usize;
        while i < 64 {
            let ac = self.huff_decode(reader, ac_table)?;

            // 0x00 ends the block, the rest stays zero
            if ac == 0x00 {
                break;
            }

            let mut run = usize::from(ac >> 4);
            let size = ac & 0x0f;

            // 0xF0 skips sixteen zero coefficients
            if ac == 0xf0 {
                run = 16;
            }

            if i + run >= 64 {
                return Err(DecodeErrors::RunOverflow(i + run));
            }
            i += run;

            if size > 10 {
                return Err(DecodeErrors::InvalidAcLength(size));
            }
            if size != 0 {
                let mut coeff = self.get_bits(reader, size);
                if coeff < (1 << (size - 1)) {
                    coeff -= (1 << size) - 1;
                }
                block[UN_ZIGZAG[i]] = (coeff * i32::from(q_table[UN_ZIGZAG[i]])) as i16;
                i += 1;
            }
        }

        Ok(())
    }
}
