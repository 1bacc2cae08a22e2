//! Pixel-format normalization.
//!
//! Backends hand frames over exactly as the OS produced them: padded rows,
//! bottom-up DIB order, BGRA or stranger channel orders, 16-bit packed
//! pixels. Everything funnels through [`normalize`] so none of those quirks
//! ever reach a caller.

use crate::geometry::Rect;
use crate::{CaptureError, PixelBuffer, PixelFormat, RawFrame, Result};

/// Convert a backend-native frame into the canonical top-down tight RGB
/// buffer for `region`. Fails when the frame does not match the requested
/// dimensions or its buffer is too short for the declared geometry.
pub(crate) fn normalize(frame: RawFrame, region: Rect) -> Result<PixelBuffer> {
    if frame.width != region.width || frame.height != region.height {
        return Err(CaptureError::CaptureFailed {
            region,
            reason: format!(
                "Backend returned {}x{} for a {}x{} request",
                frame.width, frame.height, region.width, region.height
            ),
        });
    }

    let width = frame.width as usize;
    let height = frame.height as usize;
    let bpp = frame.format.bytes_per_pixel();

    if frame.stride < width * bpp {
        return Err(CaptureError::CaptureFailed {
            region,
            reason: format!("Stride {} smaller than row size {}", frame.stride, width * bpp),
        });
    }

    // The final row may arrive without its trailing padding.
    let needed = frame.stride * height.saturating_sub(1) + width * bpp;
    if frame.data.len() < needed {
        return Err(CaptureError::CaptureFailed {
            region,
            reason: format!("Truncated buffer: {} bytes, need {}", frame.data.len(), needed),
        });
    }

    let mut data = Vec::with_capacity(width * height * PixelBuffer::BYTES_PER_PIXEL);
    for row in 0..height {
        let src_row = if frame.bottom_up { height - 1 - row } else { row };
        let base = src_row * frame.stride;

        match frame.format.rgb_offsets() {
            Some((r, g, b)) => {
                for x in 0..width {
                    let px = base + x * bpp;
                    data.push(frame.data[px + r]);
                    data.push(frame.data[px + g]);
                    data.push(frame.data[px + b]);
                }
            }
            None => {
                // RGB565, little-endian.
                for x in 0..width {
                    let px = base + x * 2;
                    let pixel = u16::from_le_bytes([frame.data[px], frame.data[px + 1]]);
                    data.push((((pixel >> 11) & 0x1f) as u8) << 3);
                    data.push((((pixel >> 5) & 0x3f) as u8) << 2);
                    data.push(((pixel & 0x1f) as u8) << 3);
                }
            }
        }
    }

    Ok(PixelBuffer { width: frame.width, height: frame.height, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
        bottom_up: bool,
        data: Vec<u8>,
    ) -> RawFrame {
        RawFrame { data, width, height, stride, format, bottom_up }
    }

    fn region(width: u32, height: u32) -> Rect {
        Rect::new(0, 0, width, height)
    }

    #[test]
    fn test_bgra_channel_swap() {
        // One blue pixel, one red pixel.
        let raw = frame(
            2,
            1,
            8,
            PixelFormat::BGRA,
            false,
            vec![0xff, 0, 0, 0xff, 0, 0, 0xff, 0xff],
        );
        let out = normalize(raw, region(2, 1)).unwrap();
        assert_eq!(out.data, vec![0, 0, 0xff, 0xff, 0, 0]);
    }

    #[test]
    fn test_rgba_drops_alpha() {
        let raw = frame(1, 1, 4, PixelFormat::RGBA, false, vec![1, 2, 3, 0xff]);
        assert_eq!(normalize(raw, region(1, 1)).unwrap().data, vec![1, 2, 3]);
    }

    #[test]
    fn test_argb_channel_order() {
        let raw = frame(1, 1, 4, PixelFormat::ARGB, false, vec![0xff, 1, 2, 3]);
        assert_eq!(normalize(raw, region(1, 1)).unwrap().data, vec![1, 2, 3]);
    }

    #[test]
    fn test_abgr_channel_order() {
        let raw = frame(1, 1, 4, PixelFormat::ABGR, false, vec![0xff, 3, 2, 1]);
        assert_eq!(normalize(raw, region(1, 1)).unwrap().data, vec![1, 2, 3]);
    }

    #[test]
    fn test_bgr_packed() {
        let raw = frame(2, 1, 6, PixelFormat::BGR, false, vec![3, 2, 1, 6, 5, 4]);
        assert_eq!(normalize(raw, region(2, 1)).unwrap().data, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_row_padding_stripped() {
        // 2x2 BGRA, 4 bytes of 0xee padding per row; the blue channel tags
        // each pixel with row * 10 + column.
        let mut bytes = Vec::new();
        for row in 0..2u8 {
            for col in 0..2u8 {
                bytes.extend_from_slice(&[row * 10 + col, 0, 0, 0xff]);
            }
            bytes.extend_from_slice(&[0xee; 4]);
        }
        let raw = frame(2, 2, 12, PixelFormat::BGRA, false, bytes);
        let out = normalize(raw, region(2, 2)).unwrap();
        assert_eq!(out.data, vec![0, 0, 0, 0, 0, 1, 0, 0, 10, 0, 0, 11]);
    }

    #[test]
    fn test_bottom_up_rows_flipped() {
        // 1x2, red channel 2 in the first stored row (bottom), 1 in the
        // second (top).
        let raw = frame(
            1,
            2,
            4,
            PixelFormat::BGRA,
            true,
            vec![0, 0, 2, 0xff, 0, 0, 1, 0xff],
        );
        let out = normalize(raw, region(1, 2)).unwrap();
        assert_eq!(out.data, vec![1, 0, 0, 2, 0, 0]);
    }

    #[test]
    fn test_rgb565_expansion() {
        let mut bytes = Vec::new();
        for pixel in [0xf800u16, 0x07e0, 0x001f] {
            bytes.extend_from_slice(&pixel.to_le_bytes());
        }
        let raw = frame(3, 1, 6, PixelFormat::RGB565, false, bytes);
        let out = normalize(raw, region(3, 1)).unwrap();
        assert_eq!(out.data, vec![0xf8, 0, 0, 0, 0xfc, 0, 0, 0, 0xf8]);
    }

    #[test]
    fn test_single_pixel_is_three_bytes() {
        let raw = frame(1, 1, 4, PixelFormat::BGRA, false, vec![9, 9, 9, 9]);
        let out = normalize(raw, region(1, 1)).unwrap();
        assert_eq!((out.width, out.height), (1, 1));
        assert_eq!(out.data.len(), 3);
    }

    #[test]
    fn test_output_length_is_exactly_whx3() {
        let stride = 5 * 4 + 12;
        let raw = frame(5, 4, stride, PixelFormat::RGBA, false, vec![7; stride * 4]);
        let out = normalize(raw, region(5, 4)).unwrap();
        assert_eq!(out.data.len(), 5 * 4 * 3);
    }

    #[test]
    fn test_unpadded_final_row_accepted() {
        // Two rows at stride 12, but the buffer ends right after the last
        // pixel of the last row.
        let raw = frame(2, 2, 12, PixelFormat::BGRA, false, vec![1; 12 + 8]);
        assert!(normalize(raw, region(2, 2)).is_ok());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let raw = frame(2, 2, 8, PixelFormat::BGRA, false, vec![0; 16]);
        let err = normalize(raw, region(4, 2)).unwrap_err();
        assert!(matches!(err, CaptureError::CaptureFailed { .. }));
    }

    #[test]
    fn test_short_buffer_rejected() {
        let raw = frame(2, 2, 8, PixelFormat::BGRA, false, vec![0; 12]);
        assert!(matches!(
            normalize(raw, region(2, 2)),
            Err(CaptureError::CaptureFailed { .. })
        ));
    }

    #[test]
    fn test_undersized_stride_rejected() {
        let raw = frame(2, 1, 4, PixelFormat::BGRA, false, vec![0; 8]);
        assert!(matches!(
            normalize(raw, region(2, 1)),
            Err(CaptureError::CaptureFailed { .. })
        ));
    }
}
