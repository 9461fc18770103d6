//! Pixel geometry shared by the controllers and the overlay.

use rand::Rng;
use std::fmt;

/// Pixel offset of the watermark field inside its container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Width/height in whole pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const ZERO: Size = Size { width: 0, height: 0 };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True if either dimension is zero (not laid out yet, or collapsed).
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Largest top-left offset at which `field` still fits inside `self`.
    ///
    /// May be negative when the field is larger than the container;
    /// `random_coord` clamps that to zero.
    pub fn max_offset(&self, field: Size) -> Point {
        let span = |outer: u32, inner: u32| -> i32 {
            let diff = i64::from(outer) - i64::from(inner);
            diff.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
        };
        Point::new(span(self.width, field.width), span(self.height, field.height))
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Uniform integer in `[0, max]`; a degenerate range yields 0.
pub fn random_coord(max: i32) -> i32 {
    if max <= 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..=max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_offset() {
        let container = Size::new(200, 100);
        let field = Size::new(50, 20);
        assert_eq!(container.max_offset(field), Point::new(150, 80));

        // Field larger than its container
        assert_eq!(Size::new(10, 10).max_offset(field), Point::new(-40, -10));
    }

    #[test]
    fn test_random_coord_in_range() {
        for _ in 0..1000 {
            let v = random_coord(150);
            assert!((0..=150).contains(&v));
        }
    }

    #[test]
    fn test_random_coord_degenerate_range() {
        assert_eq!(random_coord(0), 0);
        assert_eq!(random_coord(-25), 0);
        assert_eq!(random_coord(i32::MIN), 0);
    }

    #[test]
    fn test_size_is_empty() {
        assert!(Size::ZERO.is_empty());
        assert!(Size::new(100, 0).is_empty());
        assert!(!Size::new(1, 1).is_empty());
    }
}
