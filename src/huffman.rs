//! Huffman table storage and canonical code generation
//!
//! Tables arrive in a DHT segment as 16 per-length symbol counts followed
//! by the symbols themselves, ordered by increasing code length. The
//! canonical codes are generated once the SOS marker has been seen.

use crate::errors::DecodeErrors;

/// Maximum number of symbols a single table may carry.
const MAX_SYMBOLS: usize = 256;

/// One DC or AC Huffman table.
pub(crate) struct HuffmanTable {
    /// `valoffset[k]` is the index into `huffval` of the first symbol
    /// whose code is `k + 1` bits long; `valoffset[16]` is the symbol
    /// count. A prefix sum of the DHT per-length counts.
    pub(crate) valoffset: [usize; 17],
    /// Symbols in order of increasing code length.
    pub(crate) huffval: [u8; MAX_SYMBOLS],
    /// Canonical codes parallel to `huffval`, valid after
    /// [`HuffmanTable::build_codes`] has run.
    pub(crate) codes: [u32; MAX_SYMBOLS],
}

impl HuffmanTable {
    /// Build a table from the 16 DHT count bytes and the symbol list.
    ///
    /// # Errors
    /// `MalformedSegment` when the counts sum to more than 256 or do not
    /// match the number of symbols supplied.
    pub fn new(counts: &[u8; 16], symbols: &[u8]) -> Result<HuffmanTable, DecodeErrors> {
        let mut valoffset = [0usize; 17];
        let mut total = 0usize;
        for (i, count) in counts.iter().enumerate() {
            total += usize::from(*count);
            valoffset[i + 1] = total;
        }

        if total > MAX_SYMBOLS {
            return Err(DecodeErrors::MalformedSegment(format!(
                "Huffman table declares {total} symbols, the maximum is {MAX_SYMBOLS}"
            )));
        }
        if total != symbols.len() {
            return Err(DecodeErrors::MalformedSegment(format!(
                "Huffman table counts sum to {total} but {} symbols were supplied",
                symbols.len()
            )));
        }

        let mut huffval = [0u8; MAX_SYMBOLS];
        huffval[..symbols.len()].copy_from_slice(symbols);

        Ok(HuffmanTable {
            valoffset,
            huffval,
            codes: [0; MAX_SYMBOLS],
        })
    }

    /// Assign canonical codes.
    ///
    /// Codes are assigned left to right over increasing code length,
    /// incrementing by one within a length and shifting left by one
    /// between lengths.
    pub fn build_codes(&mut self) {
        let mut code: u32 = 0;
        for i in 0..16 {
            for j in self.valoffset[i]..self.valoffset[i + 1] {
                self.codes[j] = code;
                code += 1;
            }
            code <<= 1;
        }
    }
}
