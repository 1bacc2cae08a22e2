use serde::{Deserialize, Serialize};
use std::fmt;

/// A rectangle in virtual-desktop coordinates.
///
/// The origin is the primary monitor's top-left corner, so `left`/`top`
/// are negative for monitors placed left of or above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self { left, top, width, height }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i64 {
        self.left as i64 + self.width as i64
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i64 {
        self.top as i64 + self.height as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when `other` lies entirely inside this rectangle.
    pub fn contains(&self, other: &Rect) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Minimal rectangle covering every rectangle in `rects`.
    pub fn bounding_box(rects: &[Rect]) -> Option<Rect> {
        let first = rects.first()?;
        let mut left = first.left;
        let mut top = first.top;
        let mut right = first.right();
        let mut bottom = first.bottom();

        for rect in &rects[1..] {
            left = left.min(rect.left);
            top = top.min(rect.top);
            right = right.max(rect.right());
            bottom = bottom.max(rect.bottom());
        }

        Some(Rect {
            left,
            top,
            width: (right - left as i64) as u32,
            height: (bottom - top as i64) as u32,
        })
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} at ({}, {})", self.width, self.height, self.left, self.top)
    }
}
