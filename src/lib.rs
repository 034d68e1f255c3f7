//! A multi-lane baseline JPEG decoder.
//!
//! The decoder splits one Huffman coded scan across several worker lanes,
//! re-synchronizes their outputs on the MCU grid and the running DC
//! predictors, and renders the result as an RGB MCU grid that the [`bmp`]
//! module serializes verbatim.
//!
//! Only baseline sequential Huffman coded JPEG with 8 bit precision is
//! supported; progressive, arithmetic, hierarchical, lossless and 12 bit
//! streams are rejected with [`errors::DecodeErrors::Unsupported`].
#![allow(
    clippy::needless_return,
    clippy::similar_names,
    clippy::module_name_repetitions
)]
#![warn(clippy::correctness, clippy::perf, clippy::pedantic)]
#[macro_use]
extern crate log;

pub use crate::decoder::{DecodedImage, Decoder};

mod bitstream;
pub mod bmp;
mod color_convert;
mod components;
mod decoder;
pub mod errors;
mod headers;
mod huffman;
mod idct;
mod marker;
mod mcu;
mod misc;
mod reader;
mod transform;
mod worker;
