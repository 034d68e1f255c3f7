//! Errors that may be encountered when decoding a JPEG image
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

use crate::misc::{
    START_OF_FRAME_EXT_AR, START_OF_FRAME_EXT_SEQ, START_OF_FRAME_LOS_SEQ,
    START_OF_FRAME_LOS_SEQ_AR, START_OF_FRAME_PROG_DCT, START_OF_FRAME_PROG_DCT_AR,
};

/// Common decode errors
///
/// All of these are non-retryable for the failing image; the caller is
/// expected to drop the image and move on to the next file.
pub enum DecodeErrors {
    /// The file does not start with `0xFFD8`, it is not a JPEG
    IllegalMagicBytes(u16),
    /// The encoding scheme is one we do not support
    Unsupported(UnsupportedSchemes),
    /// A marker segment is internally inconsistent, e.g. a length field
    /// that does not match its contents, a table id out of range, a
    /// duplicate SOF or an SOS without a matching SOF
    MalformedSegment(String),
    /// No Huffman code matched the bitstream within 16 bits
    InvalidHuffmanCode,
    /// A DC coefficient declared a magnitude category above 11
    InvalidDcLength(u8),
    /// An AC coefficient declared a magnitude category above 10
    InvalidAcLength(u8),
    /// An AC run-length pushed the coefficient index past the block
    RunOverflow(usize),
    /// A decoding lane could not align itself with its successor
    Desynchronized(usize),
    /// The byte source was exhausted in the middle of a segment
    ExhaustedData,
}

impl Display for DecodeErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IllegalMagicBytes(bytes) => {
                write!(f, "Not a JPEG file, illegal start bytes {bytes:#06x}")
            }
            Self::Unsupported(ref scheme) => write!(f, "{scheme:?}"),
            Self::MalformedSegment(ref reason) => {
                write!(f, "Malformed marker segment. Reason: {reason}")
            }
            Self::InvalidHuffmanCode => {
                write!(f, "No Huffman code matched the bitstream within 16 bits")
            }
            Self::InvalidDcLength(length) => {
                write!(f, "DC coefficient length {length} greater than 11")
            }
            Self::InvalidAcLength(length) => {
                write!(f, "AC coefficient length {length} greater than 10")
            }
            Self::RunOverflow(position) => write!(
                f,
                "AC run-length overflow, coefficient index {position} exceeds 64"
            ),
            Self::Desynchronized(lane) => write!(
                f,
                "Lane {lane} could not align with its successor's output"
            ),
            Self::ExhaustedData => write!(f, "Byte source exhausted in the middle of a segment"),
        }
    }
}

impl Debug for DecodeErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Error for DecodeErrors {}

/// Encoding schemes advertised by an SOF marker that this library
/// does not decode.
#[derive(Eq, PartialEq, Copy, Clone)]
pub enum UnsupportedSchemes {
    /// SOF_1 Extended sequential DCT, Huffman coding
    ExtendedSequentialHuffman,
    /// Progressive DCT, Huffman coding
    ProgressiveDctHuffman,
    /// Lossless (sequential), Huffman coding
    LosslessHuffman,
    /// Extended sequential DCT, arithmetic coding
    ExtendedSequentialDctArithmetic,
    /// Progressive DCT, arithmetic coding
    ProgressiveDctArithmetic,
    /// Lossless (sequential), arithmetic coding
    LosslessArithmetic,
    /// Differential (hierarchical) coding, any entropy coder
    Hierarchical,
    /// Arithmetic coding conditioning (DAC marker)
    ArithmeticConditioning,
    /// Sample precision other than 8 bits
    HighPrecision(u8),
}

impl Debug for UnsupportedSchemes {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExtendedSequentialHuffman => {
                write!(f, "The library cannot decode images encoded with the Extended Sequential Huffman scheme")
            }
            Self::ProgressiveDctHuffman => {
                write!(f, "The library cannot decode images encoded with the Progressive DCT Huffman scheme")
            }
            Self::LosslessHuffman => {
                write!(f, "The library cannot decode images encoded with the Lossless Huffman scheme")
            }
            Self::ExtendedSequentialDctArithmetic => {
                write!(f, "The library cannot decode images encoded with the Extended Sequential DCT Arithmetic scheme")
            }
            Self::ProgressiveDctArithmetic => {
                write!(f, "The library cannot decode images encoded with the Progressive DCT Arithmetic scheme")
            }
            Self::LosslessArithmetic => {
                write!(f, "The library cannot decode images encoded with the Lossless Arithmetic scheme")
            }
            Self::Hierarchical => {
                write!(f, "The library cannot decode hierarchical (differential) images")
            }
            Self::ArithmeticConditioning => {
                write!(f, "The library cannot decode images that use arithmetic coding")
            }
            Self::HighPrecision(bits) => {
                write!(f, "The library can only decode 8 bit images, the image has {bits} bits of precision")
            }
        }
    }
}

impl UnsupportedSchemes {
    /// Map an SOF marker code to the scheme it advertises.
    ///
    /// Returns `None` if the marker is not a start of frame marker.
    #[must_use]
    pub fn from_int(int: u8) -> Option<UnsupportedSchemes> {
        match u16::from(int) | 0xff00 {
            START_OF_FRAME_PROG_DCT => Some(Self::ProgressiveDctHuffman),
            START_OF_FRAME_PROG_DCT_AR => Some(Self::ProgressiveDctArithmetic),
            START_OF_FRAME_LOS_SEQ => Some(Self::LosslessHuffman),
            START_OF_FRAME_LOS_SEQ_AR => Some(Self::LosslessArithmetic),
            START_OF_FRAME_EXT_SEQ => Some(Self::ExtendedSequentialHuffman),
            START_OF_FRAME_EXT_AR => Some(Self::ExtendedSequentialDctArithmetic),
            0xffc5..=0xffc7 | 0xffcd..=0xffcf => Some(Self::Hierarchical),
            _ => None,
        }
    }
}
