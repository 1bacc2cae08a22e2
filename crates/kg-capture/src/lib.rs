//! Cross-platform screen capture.
//!
//! Enumerates monitors and grabs raw pixels for any region of the virtual
//! desktop. One backend per OS: X11 on Linux, GDI on Windows, Quartz on
//! macOS. Whatever the OS hands back, callers always receive the same
//! canonical buffer: top-down rows, 3 bytes per pixel (RGB), no row padding.
//!
//! ```no_run
//! use kg_capture::Session;
//!
//! # fn main() -> kg_capture::Result<()> {
//! let session = Session::open()?;
//! for monitor in session.monitors()? {
//!     if monitor.is_virtual {
//!         continue;
//!     }
//!     let shot = session.capture(monitor.rect)?;
//!     println!("{}: {}x{}", monitor.name, shot.width, shot.height);
//! }
//! # Ok(())
//! # }
//! ```

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod win32;

mod convert;
mod geometry;
mod registry;
mod session;

use thiserror::Error;

pub use geometry::Rect;
pub use registry::{Monitor, PhysicalMonitor, VIRTUAL_MONITOR_NAME};
pub use session::Session;

pub type Result<T> = std::result::Result<T, CaptureError>;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Platform not supported")]
    UnsupportedPlatform,

    #[error("Display backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("No displays found")]
    NoDisplaysFound,

    #[error("Capture of {region} failed: {reason}")]
    CaptureFailed { region: Rect, reason: String },
}

/// Canonical capture output: top-down rows, 3 bytes per pixel (RGB), no
/// row padding. `data.len()` is always `width * height * 3`.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    pub const BYTES_PER_PIXEL: usize = 3;
}

/// Backend-native pixel layouts the engine knows how to normalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    BGRA,
    RGBA,
    ARGB,
    ABGR,
    BGR,
    RGB,
    RGB565,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::BGRA | PixelFormat::RGBA | PixelFormat::ARGB | PixelFormat::ABGR => 4,
            PixelFormat::BGR | PixelFormat::RGB => 3,
            PixelFormat::RGB565 => 2,
        }
    }

    /// Byte offsets of (r, g, b) within one pixel. `RGB565` is bit-packed
    /// and has no per-channel byte offsets.
    pub(crate) fn rgb_offsets(self) -> Option<(usize, usize, usize)> {
        match self {
            PixelFormat::BGRA | PixelFormat::BGR => Some((2, 1, 0)),
            PixelFormat::RGBA | PixelFormat::RGB => Some((0, 1, 2)),
            PixelFormat::ARGB => Some((1, 2, 3)),
            PixelFormat::ABGR => Some((3, 2, 1)),
            PixelFormat::RGB565 => None,
        }
    }
}

/// One frame exactly as the OS returned it: possibly padded rows, possibly
/// bottom-up, in whatever channel order the backend produces.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Bytes per row, including any trailing padding.
    pub stride: usize,
    pub format: PixelFormat,
    /// Rows stored bottom-to-top (DIB order).
    pub bottom_up: bool,
}

/// Trait that all platform-specific display backends must provide
pub trait DisplayBackend: Sized {
    /// Connect to the display subsystem.
    fn open() -> Result<Self>;

    /// All physical monitors, in backend-defined order.
    fn monitors(&self) -> Result<Vec<PhysicalMonitor>>;

    /// Grab raw pixels for `region`, in the backend's native layout.
    fn capture(&self, region: Rect) -> Result<RawFrame>;
}

// Select the correct platform implementation at compile time
#[cfg(target_os = "linux")]
pub(crate) type PlatformBackend = linux::X11Backend;

#[cfg(target_os = "macos")]
pub(crate) type PlatformBackend = macos::QuartzBackend;

#[cfg(target_os = "windows")]
pub(crate) type PlatformBackend = win32::GdiBackend;
