use tracing::{debug, info};
use x11rb::connection::Connection;
use x11rb::protocol::randr::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{
    ConnectionExt as _, Format, ImageFormat, ImageOrder, Screen, Visualid, Visualtype, Window,
};
use x11rb::rust_connection::RustConnection;

use crate::geometry::Rect;
use crate::registry::PhysicalMonitor;
use crate::{CaptureError, DisplayBackend, PixelFormat, RawFrame, Result};

/// X11 backend: RandR for monitor geometry, core-protocol `GetImage` for
/// pixels. Everything is read through one display connection owned by the
/// session.
pub struct X11Backend {
    conn: RustConnection,
    root: Window,
    /// ZPixmap formats advertised by the server, keyed by depth.
    formats: Vec<Format>,
    lsb_first: bool,
    red_mask: u32,
}

impl X11Backend {
    /// Bits per pixel and row stride for a ZPixmap reply of `depth`.
    fn row_geometry(&self, depth: u8, width: u32) -> Option<(u8, usize)> {
        let format = self.formats.iter().find(|f| f.depth == depth)?;
        Some((format.bits_per_pixel, scanline_stride(format, width)))
    }
}

impl DisplayBackend for X11Backend {
    fn open() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None)
            .map_err(|e| CaptureError::BackendUnavailable(format!("Cannot open X display: {e}")))?;

        let (lsb_first, formats, root, root_depth, red_mask) = {
            let setup = conn.setup();
            let screen: &Screen = &setup.roots[screen_num];
            let visual = find_visual(screen, screen.root_visual).ok_or_else(|| {
                CaptureError::BackendUnavailable("Root visual not advertised by the server".into())
            })?;
            (
                setup.image_byte_order == ImageOrder::LSB_FIRST,
                setup.pixmap_formats.clone(),
                screen.root,
                screen.root_depth,
                visual.red_mask,
            )
        };

        let backend = Self { conn, root, formats, lsb_first, red_mask };

        // Unsupported pixel layouts should surface at open, not per capture.
        let (bits_per_pixel, _) = backend.row_geometry(root_depth, 1).ok_or_else(|| {
            CaptureError::BackendUnavailable(format!("No ZPixmap format for depth {root_depth}"))
        })?;
        if zpixmap_format(bits_per_pixel, backend.lsb_first, backend.red_mask).is_none() {
            return Err(CaptureError::BackendUnavailable(format!(
                "Unsupported root pixel layout: {} bpp, red mask {:#010x}",
                bits_per_pixel, backend.red_mask
            )));
        }

        info!(
            "X11 display open: screen {}, depth {}, {} byte order",
            screen_num,
            root_depth,
            if backend.lsb_first { "LSB" } else { "MSB" }
        );
        Ok(backend)
    }

    fn monitors(&self) -> Result<Vec<PhysicalMonitor>> {
        let resources = self
            .conn
            .randr_get_screen_resources_current(self.root)
            .map_err(conn_lost)?
            .reply()
            .map_err(request_failed)?;

        // Best effort: servers without RandR 1.3 simply get no primary flag.
        let primary = self
            .conn
            .randr_get_output_primary(self.root)
            .ok()
            .and_then(|cookie| cookie.reply().ok())
            .map(|reply| reply.output)
            .unwrap_or(0);

        let mut monitors = Vec::new();
        for &output in &resources.outputs {
            let info = self
                .conn
                .randr_get_output_info(output, resources.config_timestamp)
                .map_err(conn_lost)?
                .reply()
                .map_err(request_failed)?;

            if info.connection != randr::Connection::CONNECTED || info.crtc == 0 {
                continue;
            }

            let crtc = self
                .conn
                .randr_get_crtc_info(info.crtc, resources.config_timestamp)
                .map_err(conn_lost)?
                .reply()
                .map_err(request_failed)?;
            if crtc.width == 0 || crtc.height == 0 {
                continue;
            }

            monitors.push(PhysicalMonitor {
                rect: Rect::new(crtc.x as i32, crtc.y as i32, crtc.width as u32, crtc.height as u32),
                name: String::from_utf8_lossy(&info.name).into_owned(),
                primary: output == primary,
            });
        }

        debug!("RandR reported {} active output(s)", monitors.len());
        Ok(monitors)
    }

    fn capture(&self, region: Rect) -> Result<RawFrame> {
        let x = i16::try_from(region.left).map_err(|_| coords_out_of_range(region))?;
        let y = i16::try_from(region.top).map_err(|_| coords_out_of_range(region))?;
        let width = u16::try_from(region.width).map_err(|_| coords_out_of_range(region))?;
        let height = u16::try_from(region.height).map_err(|_| coords_out_of_range(region))?;

        let image = self
            .conn
            .get_image(ImageFormat::Z_PIXMAP, self.root, x, y, width, height, u32::MAX)
            .map_err(|e| CaptureError::CaptureFailed {
                region,
                reason: format!("GetImage send failed: {e}"),
            })?
            .reply()
            .map_err(|e| CaptureError::CaptureFailed {
                region,
                reason: format!("GetImage failed: {e}"),
            })?;

        let (bits_per_pixel, stride) =
            self.row_geometry(image.depth, region.width)
                .ok_or_else(|| CaptureError::CaptureFailed {
                    region,
                    reason: format!("No ZPixmap format for depth {}", image.depth),
                })?;
        let format = zpixmap_format(bits_per_pixel, self.lsb_first, self.red_mask).ok_or_else(
            || CaptureError::CaptureFailed {
                region,
                reason: format!(
                    "Unsupported pixel layout: {} bpp, red mask {:#010x}",
                    bits_per_pixel, self.red_mask
                ),
            },
        )?;

        Ok(RawFrame {
            data: image.data,
            width: region.width,
            height: region.height,
            stride,
            format,
            bottom_up: false,
        })
    }
}

/// Row stride in bytes for `width` pixels of the given ZPixmap format,
/// honoring the server's scanline pad.
fn scanline_stride(format: &Format, width: u32) -> usize {
    let bpp = format.bits_per_pixel as usize;
    let pad = (format.scanline_pad as usize).max(1);
    let bits_per_line = width as usize * bpp;
    (bits_per_line + pad - 1) / pad * pad / 8
}

/// Map server byte order and the root visual's red mask onto one of the
/// layouts the engine understands.
fn zpixmap_format(bits_per_pixel: u8, lsb_first: bool, red_mask: u32) -> Option<PixelFormat> {
    match (bits_per_pixel, lsb_first, red_mask) {
        (32, true, 0x00ff_0000) => Some(PixelFormat::BGRA),
        (32, true, 0x0000_00ff) => Some(PixelFormat::RGBA),
        (32, false, 0x00ff_0000) => Some(PixelFormat::ARGB),
        (32, false, 0x0000_00ff) => Some(PixelFormat::ABGR),
        (24, true, 0x00ff_0000) => Some(PixelFormat::BGR),
        (24, false, 0x00ff_0000) => Some(PixelFormat::RGB),
        (16, _, 0x0000_f800) => Some(PixelFormat::RGB565),
        _ => None,
    }
}

fn find_visual(screen: &Screen, id: Visualid) -> Option<Visualtype> {
    screen
        .allowed_depths
        .iter()
        .flat_map(|depth| depth.visuals.iter())
        .find(|visual| visual.visual_id == id)
        .copied()
}

fn conn_lost(e: x11rb::errors::ConnectionError) -> CaptureError {
    CaptureError::BackendUnavailable(format!("X connection lost: {e}"))
}

fn request_failed(e: x11rb::errors::ReplyError) -> CaptureError {
    CaptureError::BackendUnavailable(format!("X request failed: {e}"))
}

fn coords_out_of_range(region: Rect) -> CaptureError {
    CaptureError::CaptureFailed {
        region,
        reason: "Region exceeds the X11 coordinate range".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zpixmap_format_mapping() {
        assert_eq!(zpixmap_format(32, true, 0x00ff_0000), Some(PixelFormat::BGRA));
        assert_eq!(zpixmap_format(32, false, 0x00ff_0000), Some(PixelFormat::ARGB));
        assert_eq!(zpixmap_format(32, true, 0x0000_00ff), Some(PixelFormat::RGBA));
        assert_eq!(zpixmap_format(32, false, 0x0000_00ff), Some(PixelFormat::ABGR));
        assert_eq!(zpixmap_format(24, true, 0x00ff_0000), Some(PixelFormat::BGR));
        assert_eq!(zpixmap_format(16, true, 0x0000_f800), Some(PixelFormat::RGB565));
        assert_eq!(zpixmap_format(32, true, 0x00ff_00f0), None);
        assert_eq!(zpixmap_format(8, true, 0x0000_00ff), None);
    }

    #[test]
    fn test_scanline_stride_honors_pad() {
        let bgra = Format { depth: 24, bits_per_pixel: 32, scanline_pad: 32 };
        assert_eq!(scanline_stride(&bgra, 1920), 1920 * 4);
        assert_eq!(scanline_stride(&bgra, 1), 4);

        // 24 bpp packed: 3 pixels are 9 bytes, padded up to 12.
        let packed = Format { depth: 24, bits_per_pixel: 24, scanline_pad: 32 };
        assert_eq!(scanline_stride(&packed, 3), 12);

        let rgb565 = Format { depth: 16, bits_per_pixel: 16, scanline_pad: 16 };
        assert_eq!(scanline_stride(&rgb565, 5), 10);
    }
}
