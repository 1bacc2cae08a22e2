use std::mem::size_of;

use tracing::{debug, info};
use windows::Win32::Foundation::{LPARAM, RECT};
use windows::Win32::Graphics::Gdi::{
    BI_RGB, BITMAPINFO, BITMAPINFOHEADER, BitBlt, CAPTUREBLT, CreateCompatibleBitmap,
    CreateCompatibleDC, DIB_RGB_COLORS, DeleteDC, DeleteObject, EnumDisplayMonitors, GetDC,
    GetDIBits, GetMonitorInfoW, HBITMAP, HDC, HGDIOBJ, HMONITOR, MONITORINFO, MONITORINFOEXW,
    MONITORINFOF_PRIMARY, ROP_CODE, ReleaseDC, SRCCOPY, SelectObject,
};
use windows::core::BOOL;

use crate::geometry::Rect;
use crate::registry::PhysicalMonitor;
use crate::{CaptureError, DisplayBackend, PixelFormat, RawFrame, Result};

/// GDI backend: `EnumDisplayMonitors` for geometry, `BitBlt` + `GetDIBits`
/// for pixels. Device contexts are acquired per call, so the backend itself
/// carries no state beyond the open-time probe.
pub struct GdiBackend;

impl DisplayBackend for GdiBackend {
    fn open() -> Result<Self> {
        // Probe the screen DC once; services without an interactive window
        // station have none.
        let _dc = ScreenDc::acquire().ok_or_else(|| {
            CaptureError::BackendUnavailable("No screen device context available".into())
        })?;

        info!("GDI screen device context available");
        Ok(Self)
    }

    fn monitors(&self) -> Result<Vec<PhysicalMonitor>> {
        let mut handles: Vec<HMONITOR> = Vec::new();
        let ok = unsafe {
            EnumDisplayMonitors(
                None,
                None,
                Some(collect_monitor),
                LPARAM(&mut handles as *mut Vec<HMONITOR> as isize),
            )
        };
        if !ok.as_bool() {
            return Err(CaptureError::BackendUnavailable(
                "EnumDisplayMonitors failed".into(),
            ));
        }

        let mut monitors = Vec::with_capacity(handles.len());
        for handle in handles {
            let mut info = MONITORINFOEXW::default();
            info.monitorInfo.cbSize = size_of::<MONITORINFOEXW>() as u32;
            let ok = unsafe {
                GetMonitorInfoW(handle, (&mut info as *mut MONITORINFOEXW).cast::<MONITORINFO>())
            };
            if !ok.as_bool() {
                // Monitor went away between enumeration and query.
                continue;
            }

            let rc: RECT = info.monitorInfo.rcMonitor;
            let width = rc.right - rc.left;
            let height = rc.bottom - rc.top;
            if width <= 0 || height <= 0 {
                continue;
            }

            monitors.push(PhysicalMonitor {
                rect: Rect::new(rc.left, rc.top, width as u32, height as u32),
                name: device_name(&info.szDevice),
                primary: info.monitorInfo.dwFlags & MONITORINFOF_PRIMARY != 0,
            });
        }

        debug!("GDI reported {} monitor(s)", monitors.len());
        Ok(monitors)
    }

    fn capture(&self, region: Rect) -> Result<RawFrame> {
        let width = region.width as i32;
        let height = region.height as i32;

        let screen = ScreenDc::acquire().ok_or_else(|| CaptureError::CaptureFailed {
            region,
            reason: "No screen device context available".into(),
        })?;

        let bitmap = unsafe { CreateCompatibleBitmap(screen.0, width, height) };
        if bitmap.is_invalid() {
            return Err(CaptureError::CaptureFailed {
                region,
                reason: "CreateCompatibleBitmap failed".into(),
            });
        }
        let bitmap = Bitmap(bitmap);

        let mem = MemDc::create(&screen, &bitmap).ok_or_else(|| CaptureError::CaptureFailed {
            region,
            reason: "CreateCompatibleDC failed".into(),
        })?;

        // Screen DC coordinates are virtual-desktop coordinates, so left/top
        // may be negative for monitors left of or above the primary.
        unsafe {
            BitBlt(
                mem.hdc,
                0,
                0,
                width,
                height,
                Some(screen.0),
                region.left,
                region.top,
                ROP_CODE(SRCCOPY.0 | CAPTUREBLT.0),
            )
        }
        .map_err(|e| CaptureError::CaptureFailed {
            region,
            reason: format!("BitBlt failed: {e}"),
        })?;

        // Positive biHeight: rows come back bottom-up, 32-bit BGRA.
        let mut info = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width,
                biHeight: height,
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let stride = region.width as usize * 4;
        let mut data = vec![0u8; stride * region.height as usize];
        let lines = unsafe {
            GetDIBits(
                mem.hdc,
                bitmap.0,
                0,
                region.height,
                Some(data.as_mut_ptr().cast()),
                &mut info,
                DIB_RGB_COLORS,
            )
        };
        if lines != height {
            return Err(CaptureError::CaptureFailed {
                region,
                reason: format!("GetDIBits copied {lines} of {height} rows"),
            });
        }

        Ok(RawFrame {
            data,
            width: region.width,
            height: region.height,
            stride,
            format: PixelFormat::BGRA,
            bottom_up: true,
        })
    }
}

unsafe extern "system" fn collect_monitor(
    monitor: HMONITOR,
    _hdc: HDC,
    _clip: *mut RECT,
    data: LPARAM,
) -> BOOL {
    let handles = unsafe { &mut *(data.0 as *mut Vec<HMONITOR>) };
    handles.push(monitor);
    BOOL::from(true)
}

/// Device name from a nul-terminated UTF-16 buffer.
fn device_name(buffer: &[u16]) -> String {
    let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    String::from_utf16_lossy(&buffer[..len])
}

/// Screen DC for the whole virtual desktop, released on drop.
struct ScreenDc(HDC);

impl ScreenDc {
    fn acquire() -> Option<Self> {
        let hdc = unsafe { GetDC(None) };
        if hdc.is_invalid() { None } else { Some(Self(hdc)) }
    }
}

impl Drop for ScreenDc {
    fn drop(&mut self) {
        unsafe {
            ReleaseDC(None, self.0);
        }
    }
}

/// Memory DC with a bitmap selected into it; restores the previous
/// selection and deletes the DC on drop.
struct MemDc {
    hdc: HDC,
    old: HGDIOBJ,
}

impl MemDc {
    fn create(screen: &ScreenDc, bitmap: &Bitmap) -> Option<Self> {
        let hdc = unsafe { CreateCompatibleDC(Some(screen.0)) };
        if hdc.is_invalid() {
            return None;
        }
        let old = unsafe { SelectObject(hdc, bitmap.0.into()) };
        Some(Self { hdc, old })
    }
}

impl Drop for MemDc {
    fn drop(&mut self) {
        unsafe {
            SelectObject(self.hdc, self.old);
            let _ = DeleteDC(self.hdc);
        }
    }
}

/// GDI bitmap, deleted on drop.
struct Bitmap(HBITMAP);

impl Drop for Bitmap {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteObject(self.0.into());
        }
    }
}
