//! Line-segment obstacle map.
//!
//! The map is a fixed list of wall segments inside a rectangular arena.  It is
//! built once, wrapped in an `Arc`, and never mutated afterwards, so every
//! obstacle check reads it without locking.
//!
//! # Example
//!
//! ```rust
//! use rover_perception::line_map::{ObstacleMap, Segment};
//! use rover_types::Point2;
//!
//! let map = ObstacleMap::reference_arena();
//! // A short probe crossing the first interior wall.
//! let probe = Segment::new(Point2::new(45.0, 60.0), Point2::new(55.0, 60.0));
//! assert!(map.intersects(&probe));
//! ```

use rover_types::Point2;
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Primitive types
// ────────────────────────────────────────────────────────────────────────────

/// A closed line segment between two points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point2,
    pub end: Point2,
}

impl Segment {
    pub fn new(start: Point2, end: Point2) -> Self {
        Self { start, end }
    }

    /// Convenience constructor from raw coordinates.
    pub fn from_coords(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(Point2::new(x1, y1), Point2::new(x2, y2))
    }

    pub fn length(&self) -> f32 {
        self.start.distance_to(self.end)
    }

    /// The segment extended by `amount` past both of its ends.
    ///
    /// Zero-length segments are returned unchanged.
    pub fn lengthened(&self, amount: f32) -> Self {
        let len = self.length();
        if len <= f32::EPSILON {
            return *self;
        }
        let ux = (self.end.x - self.start.x) / len;
        let uy = (self.end.y - self.start.y) / len;
        Self::from_coords(
            self.start.x - ux * amount,
            self.start.y - uy * amount,
            self.end.x + ux * amount,
            self.end.y + uy * amount,
        )
    }

    /// `true` when the two closed segments share at least one point.
    ///
    /// Touching end points and collinear overlap both count.
    pub fn intersects(&self, other: &Segment) -> bool {
        let (p1, p2, p3, p4) = (self.start, self.end, other.start, other.end);
        let d1 = orientation(p3, p4, p1);
        let d2 = orientation(p3, p4, p2);
        let d3 = orientation(p1, p2, p3);
        let d4 = orientation(p1, p2, p4);

        if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
            && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
        {
            return true;
        }

        (d1 == 0.0 && on_segment(p3, p4, p1))
            || (d2 == 0.0 && on_segment(p3, p4, p2))
            || (d3 == 0.0 && on_segment(p1, p2, p3))
            || (d4 == 0.0 && on_segment(p1, p2, p4))
    }
}

/// Cross product of `(b - a) × (c - a)`; sign gives the turn direction.
fn orientation(a: Point2, b: Point2, c: Point2) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Whether collinear point `p` lies within the bounding box of `a`–`b`.
fn on_segment(a: Point2, b: Point2, p: Point2) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Axis-aligned arena bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, p: Point2) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ObstacleMap
// ────────────────────────────────────────────────────────────────────────────

/// An immutable set of wall segments within an arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleMap {
    segments: Vec<Segment>,
    bounds: Rect,
}

impl ObstacleMap {
    pub fn new(segments: Vec<Segment>, bounds: Rect) -> Self {
        Self { segments, bounds }
    }

    /// The 150 × 150 reference arena: four border walls and two 10 × 70
    /// interior blocks.
    pub fn reference_arena() -> Self {
        let s = Segment::from_coords;
        let segments = vec![
            // borders
            s(0.0, 0.0, 150.0, 0.0),
            s(150.0, 0.0, 150.0, 150.0),
            s(0.0, 150.0, 150.0, 150.0),
            s(0.0, 0.0, 0.0, 150.0),
            // first block
            s(50.0, 40.0, 60.0, 40.0),
            s(60.0, 40.0, 60.0, 110.0),
            s(50.0, 110.0, 60.0, 110.0),
            s(50.0, 40.0, 50.0, 110.0),
            // second block
            s(100.0, 40.0, 110.0, 40.0),
            s(110.0, 40.0, 110.0, 110.0),
            s(100.0, 110.0, 110.0, 110.0),
            s(100.0, 40.0, 100.0, 110.0),
        ];
        Self::new(segments, Rect::new(0.0, 0.0, 150.0, 150.0))
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// `true` if `probe` touches any wall.
    pub fn intersects(&self, probe: &Segment) -> bool {
        self.segments.iter().any(|wall| wall.intersects(probe))
    }

    /// A copy of the map with every wall extended by `amount` at both ends,
    /// giving planners clearance around corners.
    pub fn lengthened(&self, amount: f32) -> Self {
        Self::new(
            self.segments.iter().map(|s| s.lengthened(amount)).collect(),
            self.bounds,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossing_segments_intersect() {
        let a = Segment::from_coords(0.0, 0.0, 10.0, 10.0);
        let b = Segment::from_coords(0.0, 10.0, 10.0, 0.0);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
    }

    #[test]
    fn parallel_segments_do_not_intersect() {
        let a = Segment::from_coords(0.0, 0.0, 10.0, 0.0);
        let b = Segment::from_coords(0.0, 1.0, 10.0, 1.0);
        assert!(!a.intersects(&b));
    }

    #[test]
    fn touching_end_point_counts() {
        let wall = Segment::from_coords(50.0, 40.0, 50.0, 110.0);
        let probe = Segment::from_coords(33.0, 60.0, 50.0, 60.0);
        assert!(wall.intersects(&probe));
    }

    #[test]
    fn collinear_overlap_counts_but_gap_does_not() {
        let a = Segment::from_coords(0.0, 0.0, 10.0, 0.0);
        assert!(a.intersects(&Segment::from_coords(5.0, 0.0, 15.0, 0.0)));
        assert!(!a.intersects(&Segment::from_coords(11.0, 0.0, 15.0, 0.0)));
    }

    #[test]
    fn short_probe_in_open_floor_is_clear() {
        let map = ObstacleMap::reference_arena();
        let probe = Segment::from_coords(20.0, 20.0, 37.0, 20.0);
        assert!(!map.intersects(&probe));
    }

    #[test]
    fn probe_reaching_border_is_blocked() {
        let map = ObstacleMap::reference_arena();
        let probe = Segment::from_coords(140.0, 20.0, 157.0, 20.0);
        assert!(map.intersects(&probe));
    }

    #[test]
    fn lengthened_extends_both_ends() {
        let s = Segment::from_coords(0.0, 0.0, 10.0, 0.0).lengthened(5.0);
        assert!((s.start.x + 5.0).abs() < 1e-5);
        assert!((s.end.x - 15.0).abs() < 1e-5);

        let map = ObstacleMap::reference_arena().lengthened(20.0);
        // The first block's left wall now reaches down to y = 20.
        let probe = Segment::from_coords(40.0, 25.0, 60.0, 25.0);
        assert!(map.intersects(&probe));
        assert!(!ObstacleMap::reference_arena().intersects(&probe));
    }

    #[test]
    fn bounds_contain_arena_points_only() {
        let bounds = ObstacleMap::reference_arena().bounds();
        assert!(bounds.contains(Point2::new(75.0, 75.0)));
        assert!(!bounds.contains(Point2::new(-1.0, 75.0)));
        assert!(!bounds.contains(Point2::new(75.0, 151.0)));
    }
}
