use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::{CaptureError, Result};

/// Name given to the synthetic whole-desktop entry at index 0.
pub const VIRTUAL_MONITOR_NAME: &str = "all-monitors";

/// A physical monitor as reported by the platform backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalMonitor {
    pub rect: Rect,
    pub name: String,
    pub primary: bool,
}

/// One entry of the monitor list.
///
/// Index 0 is always the synthetic entry covering the whole virtual
/// desktop; physical monitors follow at 1..N in backend order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    pub index: usize,
    pub rect: Rect,
    pub name: String,
    pub primary: bool,
    pub is_virtual: bool,
}

/// Build the monitor list from the backend's physical monitors.
pub(crate) fn assemble(physical: Vec<PhysicalMonitor>) -> Result<Vec<Monitor>> {
    if physical.is_empty() {
        return Err(CaptureError::NoDisplaysFound);
    }

    let rects: Vec<Rect> = physical.iter().map(|p| p.rect).collect();
    let bounds = Rect::bounding_box(&rects).ok_or(CaptureError::NoDisplaysFound)?;

    let mut monitors = Vec::with_capacity(physical.len() + 1);
    monitors.push(Monitor {
        index: 0,
        rect: bounds,
        name: VIRTUAL_MONITOR_NAME.into(),
        primary: false,
        is_virtual: true,
    });
    for (i, p) in physical.into_iter().enumerate() {
        monitors.push(Monitor {
            index: i + 1,
            rect: p.rect,
            name: p.name,
            primary: p.primary,
            is_virtual: false,
        });
    }

    Ok(monitors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn physical(left: i32, top: i32, width: u32, height: u32, name: &str) -> PhysicalMonitor {
        PhysicalMonitor {
            rect: Rect::new(left, top, width, height),
            name: name.into(),
            primary: false,
        }
    }

    #[test]
    fn test_virtual_entry_is_bounding_box() {
        let list = assemble(vec![
            physical(0, 0, 1920, 1080, "DP-1"),
            physical(1920, 0, 1280, 1024, "HDMI-1"),
        ])
        .unwrap();

        assert_eq!(list.len(), 3);
        assert_eq!(list[0].rect, Rect::new(0, 0, 3200, 1080));
        assert_eq!(list[0].name, VIRTUAL_MONITOR_NAME);
        assert!(list[0].is_virtual);
        assert!(!list[0].primary);
    }

    #[test]
    fn test_virtual_entry_contains_every_monitor() {
        let list = assemble(vec![
            physical(-1920, 200, 1920, 1080, "DP-2"),
            physical(0, 0, 2560, 1440, "DP-1"),
            physical(2560, -500, 1080, 1920, "HDMI-1"),
        ])
        .unwrap();

        let bounds = list[0].rect;
        for monitor in &list[1..] {
            assert!(bounds.contains(&monitor.rect), "{} outside {}", monitor.rect, bounds);
        }
    }

    #[test]
    fn test_backend_order_and_indices_preserved() {
        let list = assemble(vec![
            physical(800, 0, 800, 600, "second"),
            physical(0, 0, 800, 600, "first"),
        ])
        .unwrap();

        assert_eq!(list[1].name, "second");
        assert_eq!(list[2].name, "first");
        let indices: Vec<usize> = list.iter().map(|m| m.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_single_monitor_virtual_matches_physical() {
        let list = assemble(vec![physical(0, 0, 2560, 1440, "eDP-1")]).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].rect, list[1].rect);
    }

    #[test]
    fn test_zero_monitors_is_no_displays() {
        assert!(matches!(assemble(vec![]), Err(CaptureError::NoDisplaysFound)));
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let input = vec![
            physical(0, 0, 1920, 1080, "DP-1"),
            physical(1920, 0, 1280, 1024, "HDMI-1"),
        ];
        assert_eq!(assemble(input.clone()).unwrap(), assemble(input).unwrap());
    }

    #[test]
    fn test_primary_flag_carried_over() {
        let mut input = vec![physical(0, 0, 1920, 1080, "DP-1")];
        input[0].primary = true;
        let list = assemble(input).unwrap();
        assert!(!list[0].primary);
        assert!(list[1].primary);
    }
}
