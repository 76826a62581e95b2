//! BITMAPINFOHEADER-compatible frame header.
//!
//! The layout is declared field by field instead of relying on a compiler
//! struct layout, so the offsets stay correct on every target.

use byteorder::{ByteOrder, NativeEndian};
use webeye_core::FrameDecodeError;

/// Size of the fixed header in bytes.
pub const HEADER_LEN: usize = 40;

const SIZE: usize = 0;
const WIDTH: usize = 4;
const HEIGHT: usize = 8;
const PLANES: usize = 12;
const BIT_COUNT: usize = 14;
const COMPRESSION: usize = 16;
const SIZE_IMAGE: usize = 20;
const X_PELS_PER_METER: usize = 24;
const Y_PELS_PER_METER: usize = 28;
const CLR_USED: usize = 32;
const CLR_IMPORTANT: usize = 36;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameHeader {
    /// Header size; pixel data starts this many bytes into the buffer.
    pub size: u32,
    pub width: i32,
    /// Positive: rows stored bottom-up. Negative: rows stored top-down.
    pub height: i32,
    pub planes: u16,
    pub bit_count: u16,
    pub compression: u32,
    pub size_image: u32,
    pub x_pels_per_meter: i32,
    pub y_pels_per_meter: i32,
    pub clr_used: u32,
    pub clr_important: u32,
}

impl FrameHeader {
    /// Header for an uncompressed frame, rows stored bottom-up.
    pub fn new(width: i32, height: i32, bit_count: u16) -> Self {
        Self {
            size: HEADER_LEN as u32,
            width,
            height,
            planes: 1,
            bit_count,
            ..Self::default()
        }
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, FrameDecodeError> {
        if bytes.len() < HEADER_LEN {
            return Err(FrameDecodeError::InvalidHeader {
                reason: format!("need {HEADER_LEN} header bytes, got {}", bytes.len()),
            });
        }
        Ok(Self {
            size: NativeEndian::read_u32(&bytes[SIZE..]),
            width: NativeEndian::read_i32(&bytes[WIDTH..]),
            height: NativeEndian::read_i32(&bytes[HEIGHT..]),
            planes: NativeEndian::read_u16(&bytes[PLANES..]),
            bit_count: NativeEndian::read_u16(&bytes[BIT_COUNT..]),
            compression: NativeEndian::read_u32(&bytes[COMPRESSION..]),
            size_image: NativeEndian::read_u32(&bytes[SIZE_IMAGE..]),
            x_pels_per_meter: NativeEndian::read_i32(&bytes[X_PELS_PER_METER..]),
            y_pels_per_meter: NativeEndian::read_i32(&bytes[Y_PELS_PER_METER..]),
            clr_used: NativeEndian::read_u32(&bytes[CLR_USED..]),
            clr_important: NativeEndian::read_u32(&bytes[CLR_IMPORTANT..]),
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        NativeEndian::write_u32(&mut out[SIZE..], self.size);
        NativeEndian::write_i32(&mut out[WIDTH..], self.width);
        NativeEndian::write_i32(&mut out[HEIGHT..], self.height);
        NativeEndian::write_u16(&mut out[PLANES..], self.planes);
        NativeEndian::write_u16(&mut out[BIT_COUNT..], self.bit_count);
        NativeEndian::write_u32(&mut out[COMPRESSION..], self.compression);
        NativeEndian::write_u32(&mut out[SIZE_IMAGE..], self.size_image);
        NativeEndian::write_i32(&mut out[X_PELS_PER_METER..], self.x_pels_per_meter);
        NativeEndian::write_i32(&mut out[Y_PELS_PER_METER..], self.y_pels_per_meter);
        NativeEndian::write_u32(&mut out[CLR_USED..], self.clr_used);
        NativeEndian::write_u32(&mut out[CLR_IMPORTANT..], self.clr_important);
        out
    }

    pub fn is_bottom_up(&self) -> bool {
        self.height > 0
    }
}
