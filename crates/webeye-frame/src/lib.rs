//! webeye-frame: turns the DIB buffers handed out by the native engine into
//! caller-owned [`Frame`]s.
//!
//! # Buffer layout
//!
//! ```text
//! ┌──────────────────────┐  offset 0
//! │ FrameHeader (40 B)   │  size, width, height, planes, bit_count, ...
//! ├──────────────────────┤  offset header.size
//! │ row |height|-1       │  stride bytes (4-byte aligned)
//! │ ...                  │
//! │ row 0                │  bottom-up when height > 0
//! └──────────────────────┘
//! ```
//!
//! Decoding copies `stride * |height|` bytes, flips bottom-up buffers so the
//! first row is the top of the image, and releases the engine buffer on
//! every exit path.

mod buffer;
pub mod header;

pub use buffer::NativeBuffer;
pub use header::{FrameHeader, HEADER_LEN};

use bytes::BytesMut;
use tracing::trace;
use webeye_core::{Frame, FrameDecodeError, PixelFormat};

/// Row length in bytes for `width` pixels of `bit_count` bits, padded to a
/// multiple of 4. `None` on overflow.
pub fn stride_for(width: u32, bit_count: u16) -> Option<usize> {
    let bits = (width as usize).checked_mul(bit_count as usize)?;
    let raw_stride = bits.checked_add(7)? / 8;
    let padding = if raw_stride % 4 == 0 { 0 } else { 4 - raw_stride % 4 };
    raw_stride.checked_add(padding)
}

/// Copies the frame out of `buffer`. The buffer is released before this
/// returns, whether decoding succeeds or not.
pub fn decode(buffer: NativeBuffer) -> Result<Frame, FrameDecodeError> {
    // SAFETY: every engine frame starts with a complete header.
    let header = FrameHeader::parse(unsafe { buffer.bytes(HEADER_LEN)? })?;

    let format = PixelFormat::from_bit_count(header.bit_count).ok_or(FrameDecodeError::UnsupportedFormat {
        bits_per_pixel: header.bit_count,
    })?;
    if header.width <= 0 {
        return Err(invalid(format!("width {} is not positive", header.width)));
    }
    if header.height == 0 {
        return Err(invalid("height is zero".to_string()));
    }
    let header_len = header.size as usize;
    if header_len < HEADER_LEN {
        return Err(invalid(format!("header size {header_len} is below {HEADER_LEN}")));
    }

    let width = header.width as u32;
    let height = header.height.unsigned_abs();
    let stride = stride_for(width, header.bit_count).ok_or_else(|| invalid("stride overflows".to_string()))?;
    let pixel_len = stride
        .checked_mul(height as usize)
        .ok_or_else(|| invalid("image size overflows".to_string()))?;
    let total = header_len
        .checked_add(pixel_len)
        .ok_or_else(|| invalid("buffer size overflows".to_string()))?;

    // SAFETY: `total` is derived from the header the engine wrote.
    let pixels = &unsafe { buffer.bytes(total)? }[header_len..];

    let mut data = BytesMut::with_capacity(pixel_len);
    if header.is_bottom_up() {
        for row in pixels.chunks_exact(stride).rev() {
            data.extend_from_slice(row);
        }
    } else {
        data.extend_from_slice(pixels);
    }
    trace!("Decoded {}x{} {} frame (stride {})", width, height, format, stride);

    Ok(Frame {
        data: data.freeze(),
        width,
        height,
        stride,
        format,
    })
}

fn invalid(reason: String) -> FrameDecodeError {
    FrameDecodeError::InvalidHeader { reason }
}
