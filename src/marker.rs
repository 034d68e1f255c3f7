//! JPEG marker identification
//!
//! Marker code points are taken from CCITT Rec T.81 page 32.

/// Markers that can appear in a JPEG stream.
///
/// A marker is the byte following one or more `0xFF` bytes; `0xFF 0x00`
/// is byte stuffing inside the entropy stream, not a marker.
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum Marker {
    /// Start of image
    SOI,
    /// End of image
    EOI,
    /// Start of scan
    SOS,
    /// Define quantization tables
    DQT,
    /// Define Huffman tables
    DHT,
    /// Define arithmetic coding conditioning
    DAC,
    /// Define number of lines
    DNL,
    /// Define restart interval
    DRI,
    /// Define hierarchical progression
    DHP,
    /// Expand reference components
    EXP,
    /// Comment
    COM,
    /// Start of frame, `SOF(0)` is baseline DCT
    SOF(u8),
    /// Restart interval termination, 0..=7
    RST(u8),
    /// Application specific segment, 0..=15
    APP(u8),
    /// JPEG extension, 0..=13
    JPG(u8),
}

impl Marker {
    /// Identify a marker code byte.
    ///
    /// Returns `None` for byte values that are not assigned markers
    /// (including `0x00` and `0xFF`, which can never be marker codes).
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Marker> {
        match value {
            0xd8 => Some(Marker::SOI),
            0xd9 => Some(Marker::EOI),
            0xda => Some(Marker::SOS),
            0xdb => Some(Marker::DQT),
            0xc4 => Some(Marker::DHT),
            0xcc => Some(Marker::DAC),
            0xdc => Some(Marker::DNL),
            0xdd => Some(Marker::DRI),
            0xde => Some(Marker::DHP),
            0xdf => Some(Marker::EXP),
            0xfe => Some(Marker::COM),
            // SOF markers, the gaps at 0xc4, 0xc8 and 0xcc are
            // DHT, JPG and DAC respectively
            0xc0..=0xc3 | 0xc5..=0xc7 | 0xc9..=0xcb | 0xcd..=0xcf => {
                Some(Marker::SOF(value - 0xc0))
            }
            0xd0..=0xd7 => Some(Marker::RST(value - 0xd0)),
            0xe0..=0xef => Some(Marker::APP(value - 0xe0)),
            0xf0..=0xfd => Some(Marker::JPG(value - 0xf0)),
            _ => None,
        }
    }
}
