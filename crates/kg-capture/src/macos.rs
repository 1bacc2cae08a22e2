use core_foundation::data::CFData;
use core_graphics::display::CGDisplay;
use core_graphics::geometry::{CGPoint, CGRect, CGSize};
use core_graphics::window::{
    kCGNullWindowID, kCGWindowImageNominalResolution, kCGWindowListOptionOnScreenOnly,
};
use tracing::{debug, info};

use crate::geometry::Rect;
use crate::registry::PhysicalMonitor;
use crate::{CaptureError, DisplayBackend, PixelFormat, RawFrame, Result};

/// Quartz backend: `CGGetActiveDisplayList` for geometry,
/// `CGWindowListCreateImage` for pixels.
///
/// All coordinates are points at nominal resolution, on both the geometry
/// and the capture side, so Retina scaling never leaks into the monitor
/// list or the returned buffer dimensions.
pub struct QuartzBackend;

impl DisplayBackend for QuartzBackend {
    fn open() -> Result<Self> {
        let displays = CGDisplay::active_displays().map_err(|e| {
            CaptureError::BackendUnavailable(format!("CGGetActiveDisplayList failed: error {e}"))
        })?;

        info!("Quartz session open, {} active display(s)", displays.len());
        Ok(Self)
    }

    fn monitors(&self) -> Result<Vec<PhysicalMonitor>> {
        let ids = CGDisplay::active_displays().map_err(|e| {
            CaptureError::BackendUnavailable(format!("CGGetActiveDisplayList failed: error {e}"))
        })?;

        let mut monitors = Vec::with_capacity(ids.len());
        for id in ids {
            let display = CGDisplay::new(id);
            let bounds = display.bounds();
            if bounds.size.width < 1.0 || bounds.size.height < 1.0 {
                continue;
            }

            monitors.push(PhysicalMonitor {
                rect: Rect::new(
                    bounds.origin.x as i32,
                    bounds.origin.y as i32,
                    bounds.size.width as u32,
                    bounds.size.height as u32,
                ),
                name: format!("Display {id}"),
                primary: display.is_main(),
            });
        }

        debug!("Quartz reported {} display(s)", monitors.len());
        Ok(monitors)
    }

    fn capture(&self, region: Rect) -> Result<RawFrame> {
        let bounds = CGRect::new(
            &CGPoint::new(region.left as f64, region.top as f64),
            &CGSize::new(region.width as f64, region.height as f64),
        );

        let image = CGDisplay::screenshot(
            bounds,
            kCGWindowListOptionOnScreenOnly,
            kCGNullWindowID,
            kCGWindowImageNominalResolution,
        )
        .ok_or_else(|| CaptureError::CaptureFailed {
            region,
            reason: "CGWindowListCreateImage returned no image \
                     (missing screen-recording permission?)"
                .into(),
        })?;

        if image.bits_per_pixel() != 32 {
            return Err(CaptureError::CaptureFailed {
                region,
                reason: format!("Unexpected {}-bit image", image.bits_per_pixel()),
            });
        }

        let stride = image.bytes_per_row();
        let cf_data: CFData = image.data();
        Ok(RawFrame {
            data: cf_data.bytes().to_vec(),
            width: image.width() as u32,
            height: image.height() as u32,
            stride,
            format: PixelFormat::BGRA,
            bottom_up: false,
        })
    }
}
