//! Parallel entropy decoding lanes, lane synchronization and DC stitching
//!
//! One Huffman coded scan cannot be split at MCU boundaries up front, so
//! the scan bytes are cut into equal ranges and every lane simply starts
//! decoding at the top of its range. Lanes other than the first begin in
//! the middle of a codeword and produce garbage until the variable length
//! code self-synchronizes; their DC predictors also start from zero and
//! are therefore off by a constant per component.
//!
//! Both problems are fixed after the fact. Every lane records a tape of
//! (byte offset, DC value) pairs for its first blocks. When a lane
//! exhausts its range it keeps decoding into its successor's range and
//! compares byte offsets against the successor's tape; once a full MCU of
//! blocks matches, the grid position of the overlap and the per component
//! DC deltas are known. A final single threaded pass walks the grid in
//! order, copies each lane's kept cells into place and folds the
//! accumulated DC deltas into the block DC coefficients.
//!
//! Lanes share nothing while decoding: input ranges are disjoint, output
//! grids are lane private and tapes are only read after all lanes joined.

use std::sync::atomic::{AtomicBool, Ordering};

use scoped_threadpool::Pool;

use crate::bitstream::BitStream;
use crate::color_convert::ycbcr_to_rgb_mcu;
use crate::decoder::{Decoder, MAX_COMPONENTS};
use crate::errors::DecodeErrors;
use crate::huffman::HuffmanTable;
use crate::idct::idct_block;
use crate::reader::ByteReader;

/// Entries in the per lane synchronization tape.
const SYNC_TAPE_CAPACITY: usize = 128;
/// Scans shorter than this per lane are not worth another thread.
const MIN_LANE_BYTES: usize = 256;
/// i16 slots per grid cell, three 64 entry blocks.
const CELL_SLOTS: usize = 3 * 64;

/// Per component table references resolved once before the hot loop.
struct ScanTables<'a> {
    q: &'a [u16; 64],
    dc: &'a HuffmanTable,
    ac: &'a HuffmanTable,
    h_samp: usize,
    v_samp: usize,
}

/// Result of one lane's synchronization with its successor.
struct SyncRecord {
    /// Exclusive bound (lane local flat cell index) of the cells this
    /// lane contributes to the final grid.
    end_cell: usize,
    /// MCUs at the start of the successor's output that duplicate this
    /// lane's overlap and are discarded.
    next_lane_skip_mcus: usize,
    /// This lane's DC minus the successor's DC for the matched blocks.
    dc_offset: [i32; MAX_COMPONENTS],
}

/// One entropy decoding lane.
struct LaneState<'a> {
    lane_id: usize,
    reader: ByteReader<'a>,
    stream: BitStream,
    /// Exclusive end of this lane's assigned byte range; reads past it
    /// are only legal during synchronization.
    range_end: usize,
    /// Private DC predictor per component.
    dc_pred: [i32; MAX_COMPONENTS],
    /// Decoded blocks, indexed from this lane's own grid origin. Grows as
    /// the lane decodes; the stitcher re-bases the cells into the global
    /// grid.
    blocks: Vec<i16>,
    /// (byte offset after the block, dequantized DC) for the first
    /// [`SYNC_TAPE_CAPACITY`] blocks, read by the predecessor's
    /// synchronizer.
    tape: Vec<(usize, i16)>,
    /// Grid cursor (lane local) where the main decode stopped.
    row: usize,
    col: usize,
    error: Option<DecodeErrors>,
    sync: Option<SyncRecord>,
}

impl<'a> LaneState<'a> {
    fn new(d: &Decoder, data: &'a [u8], lane_id: usize, chunk: usize) -> LaneState<'a> {
        let start = (d.scan_start + lane_id * chunk).min(data.len());
        let range_end = (d.scan_start + (lane_id + 1) * chunk).min(data.len());

        LaneState {
            lane_id,
            reader: ByteReader::at_position(data, start),
            stream: BitStream::new(),
            range_end,
            dc_pred: [0; MAX_COMPONENTS],
            blocks: Vec::new(),
            tape: Vec::new(),
            row: 0,
            col: 0,
            error: None,
            sync: None,
        }
    }

    /// Main decode: MCUs in row major order from the lane's own origin
    /// until the byte range or the grid is exhausted.
    fn decode_slice(&mut self, d: &Decoder, tables: &[ScanTables], cancelled: &AtomicBool) {
        // every lane but the first starts mid-codeword and must chew
        // through garbage until the code self-synchronizes
        let tolerate_garbage = self.lane_id != 0;
        let (mut row, mut col) = (0_usize, 0_usize);

        while row < d.mcu_height {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            if self.reader.position() >= self.range_end || self.stream.eof {
                break;
            }

            if let Err(e) = self.decode_mcu(d, tables, row, col, tolerate_garbage) {
                self.error = Some(e);
                cancelled.store(true, Ordering::Relaxed);
                break;
            }

            col += d.h_max;
            if col >= d.mcu_width {
                col = 0;
                row += d.v_max;
            }
        }

        self.row = row;
        self.col = col;
    }

    /// Decode the blocks of one MCU at grid cell `(row, col)`.
    fn decode_mcu(
        &mut self,
        d: &Decoder,
        tables: &[ScanTables],
        row: usize,
        col: usize,
        tolerate_garbage: bool,
    ) -> Result<(), DecodeErrors> {
        for (index, table) in tables.iter().enumerate() {
            for y in 0..table.v_samp {
                for x in 0..table.h_samp {
                    let mut block = [0_i16; 64];
                    loop {
                        match self.stream.decode_block(
                            &mut self.reader,
                            table.dc,
                            table.ac,
                            table.q,
                            &mut block,
                            &mut self.dc_pred[index],
                        ) {
                            Ok(()) => break,
                            Err(_) if tolerate_garbage && !self.reader.at_eof() => {
                                // mid-stream entry, not a real error yet
                                block = [0; 64];
                            }
                            Err(e) => return Err(e),
                        }
                    }

                    if self.tape.len() < SYNC_TAPE_CAPACITY {
                        self.tape.push((self.reader.position(), block[0]));
                    }
                    self.store_block(d, row + y, col + x, index, &block);
                }
            }
        }
        Ok(())
    }

    /// Decode past the assigned range until the successor's tape confirms
    /// alignment; a pure function of this lane's overflow decode and the
    /// successor's tape, see the module docs.
    fn synchronize(
        &mut self,
        d: &Decoder,
        tables: &[ScanTables],
        next_tape: &[(usize, i16)],
        cancelled: &AtomicBool,
    ) -> Result<SyncRecord, DecodeErrors> {
        let blocks_per_mcu: usize = tables.iter().map(|t| t.h_samp * t.v_samp).sum();
        // a full MCU of consecutive matches plus safety margin
        let min_synched = d.h_max * d.v_max + 2;

        let mut elapsed = 0_usize; // cursor into the successor's tape
        let mut matched = 0_usize;
        let mut dc_offset = [0_i32; MAX_COMPONENTS];
        let (mut row, mut col) = (self.row, self.col);

        loop {
            if cancelled.load(Ordering::Relaxed) {
                // another lane failed, the result will be discarded
                return Err(DecodeErrors::Desynchronized(self.lane_id));
            }
            if matched > min_synched {
                return Ok(SyncRecord {
                    end_cell: row * d.mcu_width_real + col,
                    next_lane_skip_mcus: elapsed / blocks_per_mcu,
                    dc_offset,
                });
            }
            if row >= d.mcu_height {
                return Err(DecodeErrors::Desynchronized(self.lane_id));
            }

            for (index, table) in tables.iter().enumerate() {
                for y in 0..table.v_samp {
                    for x in 0..table.h_samp {
                        let mut block = [0_i16; 64];
                        self.stream.decode_block(
                            &mut self.reader,
                            table.dc,
                            table.ac,
                            table.q,
                            &mut block,
                            &mut self.dc_pred[index],
                        )?;
                        self.store_block(d, row + y, col + x, index, &block);

                        let my_offset = self.reader.position();
                        let (next_offset, next_dc) = *next_tape
                            .get(elapsed)
                            .ok_or(DecodeErrors::Desynchronized(self.lane_id))?;

                        if my_offset < next_offset {
                            // this lane is behind, decode more blocks
                            matched = 0;
                        } else if my_offset > next_offset {
                            // the successor is behind, advance its tape
                            matched = 0;
                            while elapsed < next_tape.len() && next_tape[elapsed].0 < my_offset {
                                elapsed += 1;
                            }
                            let (caught_up, dc) = *next_tape
                                .get(elapsed)
                                .ok_or(DecodeErrors::Desynchronized(self.lane_id))?;
                            if caught_up == my_offset {
                                dc_offset[index] = i32::from(block[0]) - i32::from(dc);
                                matched += 1;
                                elapsed += 1;
                            }
                        } else {
                            dc_offset[index] = i32::from(block[0]) - i32::from(next_dc);
                            matched += 1;
                            elapsed += 1;
                        }
                    }
                }
            }

            col += d.h_max;
            if col >= d.mcu_width {
                col = 0;
                row += d.v_max;
            }
        }
    }

    fn store_block(&mut self, d: &Decoder, cell_row: usize, cell_col: usize, component: usize, block: &[i16; 64]) {
        let index = ((cell_row * d.mcu_width_real + cell_col) * 3 + component) * 64;
        if index + 64 > self.blocks.len() {
            self.blocks.resize(index + 64, 0);
        }
        self.blocks[index..index + 64].copy_from_slice(block);
    }
}

/// Decode the entropy coded scan into the stitched coefficient grid.
///
/// Lanes run in three phases with join barriers between them: main decode
/// over disjoint byte ranges, synchronization of each lane against its
/// successor's tape, and the single threaded DC stitch.
pub(crate) fn decode_scan(d: &Decoder, data: &[u8]) -> Result<Vec<i16>, DecodeErrors> {
    let num_lanes = effective_lane_count(d.scan_length, d.num_lanes);
    let chunk = lane_chunk(d.scan_length, num_lanes);
    debug!("Decoding scan with {num_lanes} lane(s), {chunk} bytes each");

    let tables = scan_tables(d)?;
    let cancelled = AtomicBool::new(false);

    let mut lanes: Vec<LaneState> = (0..num_lanes)
        .map(|k| LaneState::new(d, data, k, chunk))
        .collect();

    if num_lanes == 1 {
        lanes[0].decode_slice(d, &tables, &cancelled);
        if let Some(e) = lanes[0].error.take() {
            return Err(e);
        }
    } else {
        let mut pool = Pool::new(num_lanes as u32);

        // phase 1: all lanes decode their own range
        pool.scoped(|scope| {
            for lane in &mut lanes {
                let tables = &tables;
                let cancelled = &cancelled;
                scope.execute(move || lane.decode_slice(d, tables, cancelled));
            }
        });
        for lane in &mut lanes {
            if let Some(e) = lane.error.take() {
                return Err(e);
            }
        }

        // phase 2: every lane except the last aligns with its successor;
        // the barrier above guarantees the tapes are complete
        let tapes: Vec<Vec<(usize, i16)>> = lanes.iter().map(|l| l.tape.clone()).collect();
        let (sync_lanes, _) = lanes.split_at_mut(num_lanes - 1);
        pool.scoped(|scope| {
            for (k, lane) in sync_lanes.iter_mut().enumerate() {
                let next_tape = &tapes[k + 1];
                let tables = &tables;
                let cancelled = &cancelled;
                scope.execute(move || {
                    match lane.synchronize(d, tables, next_tape, cancelled) {
                        Ok(record) => lane.sync = Some(record),
                        Err(e) => {
                            lane.error = Some(e);
                            cancelled.store(true, Ordering::Relaxed);
                        }
                    }
                });
            }
        });
        for lane in &mut lanes {
            if let Some(e) = lane.error.take() {
                return Err(e);
            }
        }
    }

    // phase 3: stitch lane outputs into one grid
    Ok(stitch(d, &lanes))
}

/// Walk the global MCU grid, copying each lane's kept cells into place
/// and folding the accumulated DC offsets into the block DC coefficients.
///
/// Lane 0's cells are already correct relative to the true predictor
/// chain; entering lane k adds lane k-1's recorded offsets to the
/// accumulator applied to everything lane k contributed.
fn stitch(d: &Decoder, lanes: &[LaneState]) -> Vec<i16> {
    let stride = d.mcu_width_real;
    let mut out = vec![0_i16; d.mcu_height_real * stride * CELL_SLOTS];
    let mut acc = [0_i32; MAX_COMPONENTS];

    let (mut g_row, mut g_col) = (0_usize, 0_usize);

    for (k, lane) in lanes.iter().enumerate() {
        let (mut l_row, mut l_col) = if k == 0 {
            (0, 0)
        } else {
            // the previous lane's sync decided how much of this lane's
            // leading output is duplicate
            let skip = lanes[k - 1]
                .sync
                .as_ref()
                .map_or(0, |s| s.next_lane_skip_mcus);
            let mcus_per_row = (d.mcu_width + d.h_max - 1) / d.h_max;
            ((skip / mcus_per_row) * d.v_max, (skip % mcus_per_row) * d.h_max)
        };
        if k > 0 {
            if let Some(record) = &lanes[k - 1].sync {
                for (a, o) in acc.iter_mut().zip(record.dc_offset.iter()) {
                    *a += *o;
                }
            }
        }
        let end_cell = lane.sync.as_ref().map_or(usize::MAX, |s| s.end_cell);

        while g_row < d.mcu_height && l_row * stride + l_col < end_cell {
            for (index, component) in d.components.iter().enumerate() {
                for y in 0..component.vertical_sample {
                    for x in 0..component.horizontal_sample {
                        let src = (((l_row + y) * stride + l_col + x) * 3 + index) * 64;
                        let dst = (((g_row + y) * stride + g_col + x) * 3 + index) * 64;

                        for (i, slot) in out[dst..dst + 64].iter_mut().enumerate() {
                            *slot = lane.blocks.get(src + i).copied().unwrap_or(0);
                        }
                        if k > 0 {
                            out[dst] = (i32::from(out[dst]) + acc[index]) as i16;
                        }
                    }
                }
            }

            g_col += d.h_max;
            if g_col >= d.mcu_width {
                g_col = 0;
                g_row += d.v_max;
            }
            l_col += d.h_max;
            if l_col >= d.mcu_width {
                l_col = 0;
                l_row += d.v_max;
            }
        }
    }

    out
}

/// Inverse DCT and color conversion over the stitched grid, parallel over
/// bands of whole MCU rows.
pub(crate) fn render(d: &Decoder, blocks: &mut [i16]) {
    let stride = d.mcu_width_real;
    let workers = effective_lane_count(d.scan_length, d.num_lanes);

    // band height must be a whole number of MCU rows
    let mcu_row_height = d.v_max;
    let mcu_rows = (d.mcu_height_real + mcu_row_height - 1) / mcu_row_height;
    let band_mcu_rows = (mcu_rows + workers - 1) / workers;
    let band_len = band_mcu_rows * mcu_row_height * stride * CELL_SLOTS;

    if workers == 1 || band_len == 0 {
        render_band(d, blocks, 0);
        return;
    }

    let mut pool = Pool::new(workers as u32);
    pool.scoped(|scope| {
        for (band_index, band) in blocks.chunks_mut(band_len).enumerate() {
            let start_row = band_index * band_mcu_rows * mcu_row_height;
            scope.execute(move || render_band(d, band, start_row));
        }
    });
}

/// IDCT every decoded block of the band, then convert each MCU to RGB.
fn render_band(d: &Decoder, band: &mut [i16], band_start_row: usize) {
    let stride = d.mcu_width_real;
    let band_rows = band.len() / (stride * CELL_SLOTS);

    let mut row = 0_usize;
    while row < band_rows && band_start_row + row < d.mcu_height {
        let mut col = 0_usize;
        while col < d.mcu_width {
            for (index, component) in d.components.iter().enumerate() {
                for y in 0..component.vertical_sample {
                    for x in 0..component.horizontal_sample {
                        let base = (((row + y) * stride + col + x) * 3 + index) * 64;
                        idct_block(&mut band[base..base + 64]);
                    }
                }
            }
            ycbcr_to_rgb_mcu(band, stride, row, col, d.h_max, d.v_max);

            col += d.h_max;
        }
        row += d.v_max;
    }
}

/// Resolve each component's tables once, before any lane runs.
fn scan_tables(d: &Decoder) -> Result<Vec<ScanTables>, DecodeErrors> {
    d.components
        .iter()
        .map(|c| {
            Ok(ScanTables {
                q: d.qt_tables[c.quantization_table_id]
                    .as_ref()
                    .ok_or_else(|| missing_table("quantization", c.quantization_table_id))?,
                dc: d.dc_huffman_tables[c.dc_huff_table]
                    .as_ref()
                    .ok_or_else(|| missing_table("DC Huffman", c.dc_huff_table))?,
                ac: d.ac_huffman_tables[c.ac_huff_table]
                    .as_ref()
                    .ok_or_else(|| missing_table("AC Huffman", c.ac_huff_table))?,
                h_samp: c.horizontal_sample,
                v_samp: c.vertical_sample,
            })
        })
        .collect()
}

fn missing_table(kind: &str, id: usize) -> DecodeErrors {
    DecodeErrors::MalformedSegment(format!("No {kind} table in slot {id}"))
}

/// Lanes below a minimum byte count only add synchronization overhead.
fn effective_lane_count(scan_length: usize, requested: usize) -> usize {
    let cap = (scan_length / MIN_LANE_BYTES).max(1);
    requested.clamp(1, cap)
}

/// Bytes of scan per lane, rounded up to an 8 byte alignment.
fn lane_chunk(scan_length: usize, lanes: usize) -> usize {
    let per_lane = (scan_length + lanes - 1) / lanes;
    (per_lane + 7) & !7
}
