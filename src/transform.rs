//! Post-decode transforms on the finished RGB grid
#![allow(clippy::cast_possible_truncation)]

use crate::decoder::DecodedImage;

/// i16 slots per grid cell, three 64 entry blocks.
const CELL_SLOTS: usize = 3 * 64;

impl DecodedImage {
    /// Mirror the image around its vertical axis.
    ///
    /// Grid columns swap with their opposite across the real grid width
    /// and pixel columns swap within each 8x8 block.
    pub fn flip_horizontal(&mut self) {
        let stride = self.mcu_width_real;
        let rows = self.data.len() / (stride * CELL_SLOTS);

        for row in 0..rows {
            for col in 0..stride / 2 {
                let left_cell = row * stride + col;
                let right_cell = row * stride + (stride - 1 - col);
                for channel in 0..3 {
                    let left = (left_cell * 3 + channel) * 64;
                    let right = (right_cell * 3 + channel) * 64;
                    for y in 0..8 {
                        for x in 0..8 {
                            self.data.swap(left + y * 8 + x, right + y * 8 + (7 - x));
                        }
                    }
                }
            }
        }

        // odd real widths leave a middle column that mirrors onto itself
        if stride % 2 == 1 {
            let col = stride / 2;
            for row in 0..rows {
                let cell = row * stride + col;
                for channel in 0..3 {
                    let base = (cell * 3 + channel) * 64;
                    for y in 0..8 {
                        for x in 0..4 {
                            self.data.swap(base + y * 8 + x, base + y * 8 + (7 - x));
                        }
                    }
                }
            }
        }
    }

    /// Scale the image down by two in both dimensions.
    ///
    /// Two passes: every block folds its pixels into 2x2 averages in its
    /// top left quadrant, then four neighboring blocks tile their reduced
    /// quadrants into one, halving the grid.
    pub fn half_scale(&mut self) {
        let stride = self.mcu_width_real;
        let rows = self.data.len() / (stride * CELL_SLOTS);
        if stride < 2 || rows < 2 {
            return;
        }

        // pass one: reduce each block into its top left 4x4
        for cell in 0..rows * stride {
            for channel in 0..3 {
                let base = (cell * 3 + channel) * 64;
                for y in 0..4 {
                    for x in 0..4 {
                        let sum = i32::from(self.data[base + y * 2 * 8 + x * 2])
                            + i32::from(self.data[base + y * 2 * 8 + x * 2 + 1])
                            + i32::from(self.data[base + (y * 2 + 1) * 8 + x * 2])
                            + i32::from(self.data[base + (y * 2 + 1) * 8 + x * 2 + 1]);
                        self.data[base + y * 8 + x] = (sum >> 2) as i16;
                    }
                }
            }
        }

        // pass two: tile four reduced quadrants into one block of a
        // compacted, half sized grid
        let new_stride = stride / 2;
        let new_rows = rows / 2;
        let mut reduced = vec![0_i16; new_rows * new_stride * CELL_SLOTS];

        for row in 0..new_rows {
            for col in 0..new_stride {
                for channel in 0..3 {
                    let dst = ((row * new_stride + col) * 3 + channel) * 64;
                    let top_left = ((row * 2 * stride + col * 2) * 3 + channel) * 64;
                    let top_right = ((row * 2 * stride + col * 2 + 1) * 3 + channel) * 64;
                    let bottom_left = (((row * 2 + 1) * stride + col * 2) * 3 + channel) * 64;
                    let bottom_right = (((row * 2 + 1) * stride + col * 2 + 1) * 3 + channel) * 64;

                    for y in 0..4 {
                        for x in 0..4 {
                            reduced[dst + y * 8 + x] = self.data[top_left + y * 8 + x];
                            reduced[dst + y * 8 + x + 4] = self.data[top_right + y * 8 + x];
                            reduced[dst + (y + 4) * 8 + x] = self.data[bottom_left + y * 8 + x];
                            reduced[dst + (y + 4) * 8 + x + 4] =
                                self.data[bottom_right + y * 8 + x];
                        }
                    }
                }
            }
        }

        self.data = reduced;
        self.mcu_width_real = new_stride;
        self.mcu_height_real = new_rows;
        self.width /= 2;
        self.height /= 2;
        self.padding = self.width % 4;
    }
}
