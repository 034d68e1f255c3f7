//! In-code JPEG synthesis for the integration tests.
//!
//! Builds minimal but well-formed baseline streams: real marker segments,
//! canonical Huffman tables and hand-packed entropy bits with byte
//! stuffing. The decoder under test never sees a file from disk.
#![allow(dead_code)]

/// One 8x8 block of the scan, described by what the encoder emits for it.
#[derive(Copy, Clone)]
pub struct TestBlock {
    /// DC delta against the running predictor, magnitude below 2048.
    pub dc_delta: i32,
    /// Optional single AC coefficient at zig-zag position 1, value ±1.
    pub ac: Option<i32>,
}

impl TestBlock {
    pub fn dc(dc_delta: i32) -> TestBlock {
        TestBlock { dc_delta, ac: None }
    }

    pub fn with_ac(dc_delta: i32, ac: i32) -> TestBlock {
        TestBlock {
            dc_delta,
            ac: Some(ac),
        }
    }
}

/// MSB-first bit packer with JPEG byte stuffing.
pub struct BitSink {
    bytes: Vec<u8>,
    acc: u32,
    filled: u32,
}

impl BitSink {
    pub fn new() -> BitSink {
        BitSink {
            bytes: Vec::new(),
            acc: 0,
            filled: 0,
        }
    }

    pub fn push_bits(&mut self, value: u32, count: u32) {
        for shift in (0..count).rev() {
            self.acc = (self.acc << 1) | ((value >> shift) & 1);
            self.filled += 1;
            if self.filled == 8 {
                self.flush_byte();
            }
        }
    }

    fn flush_byte(&mut self) {
        let byte = (self.acc & 0xff) as u8;
        self.bytes.push(byte);
        if byte == 0xff {
            // stuffing: a literal FF data byte is followed by 00
            self.bytes.push(0x00);
        }
        self.acc = 0;
        self.filled = 0;
    }

    /// Pad the last byte with one bits, the conventional JPEG filler.
    pub fn finish(mut self) -> Vec<u8> {
        if self.filled > 0 {
            let pad = 8 - self.filled;
            self.acc = (self.acc << pad) | ((1 << pad) - 1);
            self.filled = 8;
            self.flush_byte();
        }
        self.bytes
    }
}

// ---- marker segments ----------------------------------------------------

pub fn soi() -> Vec<u8> {
    vec![0xff, 0xd8]
}

pub fn eoi() -> Vec<u8> {
    vec![0xff, 0xd9]
}

/// DQT with one 8-bit precision table; `values` are in zig-zag order.
pub fn dqt(id: u8, values: &[u8; 64]) -> Vec<u8> {
    let mut out = vec![0xff, 0xdb, 0x00, 67, id];
    out.extend_from_slice(values);
    out
}

/// DHT with one table; `class` 0 is DC, 1 is AC.
pub fn dht(class: u8, id: u8, counts: &[u8; 16], symbols: &[u8]) -> Vec<u8> {
    let length = (2 + 1 + 16 + symbols.len()) as u16;
    let mut out = vec![0xff, 0xc4];
    out.extend_from_slice(&length.to_be_bytes());
    out.push((class << 4) | id);
    out.extend_from_slice(counts);
    out.extend_from_slice(symbols);
    out
}

/// SOF0; components are `(id, h_samp, v_samp, quant_table)`.
pub fn sof0(width: u16, height: u16, components: &[(u8, u8, u8, u8)]) -> Vec<u8> {
    let length = (8 + 3 * components.len()) as u16;
    let mut out = vec![0xff, 0xc0];
    out.extend_from_slice(&length.to_be_bytes());
    out.push(8); // precision
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&width.to_be_bytes());
    out.push(components.len() as u8);
    for &(id, h, v, qt) in components {
        out.push(id);
        out.push((h << 4) | v);
        out.push(qt);
    }
    out
}

/// SOS; components are `(id, dc_table, ac_table)`.
pub fn sos(components: &[(u8, u8, u8)]) -> Vec<u8> {
    let length = (6 + 2 * components.len()) as u16;
    let mut out = vec![0xff, 0xda];
    out.extend_from_slice(&length.to_be_bytes());
    out.push(components.len() as u8);
    for &(id, dc, ac) in components {
        out.push(id);
        out.push((dc << 4) | ac);
    }
    out.extend_from_slice(&[0, 63, 0]); // Ss, Se, Ah/Al for baseline
    out
}

// ---- entropy coding with the fixed test tables --------------------------

/// DC test table: categories 0..=11, all with four bit codes.
pub fn test_dc_table() -> ([u8; 16], Vec<u8>) {
    let mut counts = [0u8; 16];
    counts[3] = 12;
    (counts, (0..=11).collect())
}

/// AC test table: 00 is end-of-block, 01 is (run 0, size 1).
pub fn test_ac_table() -> ([u8; 16], Vec<u8>) {
    let mut counts = [0u8; 16];
    counts[1] = 2;
    (counts, vec![0x00, 0x01])
}

/// Emit one block's bits using the test tables.
pub fn put_block(sink: &mut BitSink, block: TestBlock) {
    let delta = block.dc_delta;
    let category = (32 - delta.unsigned_abs().leading_zeros()) as u32;
    assert!(category <= 11, "dc delta {delta} too large for the table");

    // categories have canonical codes 0000..1011
    sink.push_bits(category, 4);
    if category > 0 {
        let bits = if delta >= 0 {
            delta as u32
        } else {
            (delta + (1 << category) - 1) as u32
        };
        sink.push_bits(bits, category);
    }

    if let Some(ac) = block.ac {
        assert!(ac == 1 || ac == -1);
        sink.push_bits(0b01, 2); // (run 0, size 1)
        sink.push_bits(u32::from(ac == 1), 1);
    }

    sink.push_bits(0b00, 2); // end of block
}

/// Pack a whole scan.
pub fn encode_scan(blocks: &[TestBlock]) -> Vec<u8> {
    let mut sink = BitSink::new();
    for block in blocks {
        put_block(&mut sink, *block);
    }
    sink.finish()
}

// ---- complete files -----------------------------------------------------

/// A quantization table of all ones except the DC entry.
pub fn flat_q(dc: u8) -> [u8; 64] {
    let mut q = [1u8; 64];
    q[0] = dc;
    q
}

/// A complete single component (grayscale) JPEG.
///
/// `blocks` must hold one entry per grid cell in row major order.
pub fn gray_jpeg(width: u16, height: u16, q: &[u8; 64], blocks: &[TestBlock]) -> Vec<u8> {
    let cells = usize::from((width + 7) / 8) * usize::from((height + 7) / 8);
    assert_eq!(blocks.len(), cells, "need one block per grid cell");

    let (dc_counts, dc_symbols) = test_dc_table();
    let (ac_counts, ac_symbols) = test_ac_table();

    let mut out = soi();
    out.extend(dqt(0, q));
    out.extend(sof0(width, height, &[(1, 1, 1, 0)]));
    out.extend(dht(0, 0, &dc_counts, &dc_symbols));
    out.extend(dht(1, 0, &ac_counts, &ac_symbols));
    out.extend(sos(&[(1, 0, 0)]));
    out.extend(encode_scan(blocks));
    out.extend(eoi());
    out
}

/// A complete three component JPEG with luminance sampling `h x v`.
///
/// `blocks` must be in scan order: for every MCU the `h * v` luma blocks
/// (rows before columns), then one Cb block, then one Cr block.
pub fn ycbcr_jpeg(
    width: u16,
    height: u16,
    h_samp: u8,
    v_samp: u8,
    q: &[u8; 64],
    blocks: &[TestBlock],
) -> Vec<u8> {
    let mcu_w = usize::from((width + 7) / 8);
    let mcu_h = usize::from((height + 7) / 8);
    let mcus = ((mcu_w + usize::from(h_samp) - 1) / usize::from(h_samp))
        * ((mcu_h + usize::from(v_samp) - 1) / usize::from(v_samp));
    let per_mcu = usize::from(h_samp) * usize::from(v_samp) + 2;
    assert_eq!(blocks.len(), mcus * per_mcu, "need {per_mcu} blocks per MCU");

    let (dc_counts, dc_symbols) = test_dc_table();
    let (ac_counts, ac_symbols) = test_ac_table();

    let mut out = soi();
    out.extend(dqt(0, q));
    out.extend(sof0(
        width,
        height,
        &[(1, h_samp, v_samp, 0), (2, 1, 1, 0), (3, 1, 1, 0)],
    ));
    out.extend(dht(0, 0, &dc_counts, &dc_symbols));
    out.extend(dht(1, 0, &ac_counts, &ac_symbols));
    out.extend(sos(&[(1, 0, 0), (2, 0, 0), (3, 0, 0)]));
    out.extend(encode_scan(blocks));
    out.extend(eoi());
    out
}
