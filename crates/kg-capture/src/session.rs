use tracing::{debug, info};

use crate::geometry::Rect;
use crate::registry::Monitor;
use crate::{CaptureError, PixelBuffer, Result};
#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
use crate::{DisplayBackend, PlatformBackend, convert, registry};

/// An open connection to the platform's display subsystem.
///
/// All enumeration and capture goes through a session. Dropping it releases
/// the native resources exactly once, on every exit path; a session is
/// cheap to open and may be held across many captures. A single session is
/// not meant to be driven from two threads at once.
pub struct Session {
    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
    backend: PlatformBackend,
}

impl Session {
    /// Connect to the display subsystem.
    ///
    /// Fails with [`CaptureError::BackendUnavailable`] when no display
    /// server / graphics subsystem is reachable, and with
    /// [`CaptureError::UnsupportedPlatform`] on targets without a backend.
    pub fn open() -> Result<Self> {
        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        return Err(CaptureError::UnsupportedPlatform);

        #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
        {
            let backend = PlatformBackend::open()?;
            info!("Capture session opened ({})", std::env::consts::OS);
            Ok(Self { backend })
        }
    }

    /// The monitor list, freshly queried from the backend.
    ///
    /// Index 0 is the synthetic entry covering the whole virtual desktop;
    /// physical monitors follow in backend-defined order. Fails with
    /// [`CaptureError::NoDisplaysFound`] when the backend reports none.
    pub fn monitors(&self) -> Result<Vec<Monitor>> {
        #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
        {
            let physical = self.backend.monitors()?;
            debug!("Backend reported {} physical monitor(s)", physical.len());
            registry::assemble(physical)
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        Err(CaptureError::UnsupportedPlatform)
    }

    /// Capture `region` and normalize it to top-down tight RGB.
    ///
    /// The region must be non-empty and lie entirely within the virtual
    /// desktop, otherwise the call fails with
    /// [`CaptureError::CaptureFailed`]. Capturing mutates nothing and can
    /// be repeated on the same session.
    pub fn capture(&self, region: Rect) -> Result<PixelBuffer> {
        #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
        {
            let physical = self.backend.monitors()?;
            let rects: Vec<Rect> = physical.iter().map(|p| p.rect).collect();
            let desktop = Rect::bounding_box(&rects).ok_or(CaptureError::NoDisplaysFound)?;
            validate_region(region, desktop)?;

            debug!("Capturing {}", region);
            let raw = self.backend.capture(region)?;
            convert::normalize(raw, region)
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            let _ = region;
            Err(CaptureError::UnsupportedPlatform)
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        debug!("Capture session closed");
    }
}

/// Reject degenerate regions and regions leaving the virtual desktop, so
/// out-of-bounds behavior does not depend on which backend is underneath.
fn validate_region(region: Rect, desktop: Rect) -> Result<()> {
    if region.is_empty() {
        return Err(CaptureError::CaptureFailed {
            region,
            reason: "Empty region".into(),
        });
    }
    if !desktop.contains(&region) {
        return Err(CaptureError::CaptureFailed {
            region,
            reason: format!("Region leaves the virtual desktop ({desktop})"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_inside_desktop_accepted() {
        let desktop = Rect::new(0, 0, 3200, 1080);
        assert!(validate_region(Rect::new(1920, 0, 1280, 1024), desktop).is_ok());
        assert!(validate_region(desktop, desktop).is_ok());
        assert!(validate_region(Rect::new(0, 0, 1, 1), desktop).is_ok());
    }

    #[test]
    fn test_out_of_bounds_region_rejected() {
        let desktop = Rect::new(0, 0, 3200, 1080);
        let err = validate_region(Rect::new(3000, 900, 400, 400), desktop).unwrap_err();
        assert!(matches!(err, CaptureError::CaptureFailed { .. }));
    }

    #[test]
    fn test_empty_region_rejected() {
        let desktop = Rect::new(0, 0, 1920, 1080);
        assert!(validate_region(Rect::new(0, 0, 0, 10), desktop).is_err());
        assert!(validate_region(Rect::new(0, 0, 10, 0), desktop).is_err());
    }

    #[test]
    fn test_negative_origin_desktop() {
        let desktop = Rect::new(-1920, 0, 4480, 1440);
        assert!(validate_region(Rect::new(-1920, 0, 1920, 1080), desktop).is_ok());
        assert!(validate_region(Rect::new(-2000, 0, 100, 100), desktop).is_err());
    }
}
