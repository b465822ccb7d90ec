use crate::{Interval, Vec2, Vec3};

/// Axis-aligned box in camera or raster space.
///
/// A bound is defined by three intervals (one per axis). In raster space
/// x and y are pixel coordinates and z stays camera-space depth.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Bound {
    pub x: Interval,
    pub y: Interval,
    pub z: Interval,
}

impl Bound {
    /// Create a new bound from three intervals.
    pub fn new(x: Interval, y: Interval, z: Interval) -> Self {
        Self { x, y, z }
    }

    /// Create a bound from two corner points (in any order).
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self::enclosing([a, b])
    }

    /// Smallest bound enclosing every point of the iterator.
    ///
    /// Returns [`Bound::EMPTY`] for an empty iterator.
    pub fn enclosing<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        let mut bound = Self::EMPTY;
        for p in points {
            bound.include_point(p);
        }
        bound
    }

    /// Create a bound that surrounds two other bounds.
    pub fn surrounding(a: &Bound, b: &Bound) -> Self {
        Self {
            x: Interval::surrounding(&a.x, &b.x),
            y: Interval::surrounding(&a.y, &b.y),
            z: Interval::surrounding(&a.z, &b.z),
        }
    }

    /// Grow the bound to include a point.
    pub fn include_point(&mut self, p: Vec3) {
        self.x.include(p.x);
        self.y.include(p.y);
        self.z.include(p.z);
    }

    /// Grow the bound to include another bound.
    pub fn include(&mut self, other: &Bound) {
        *self = Bound::surrounding(self, other);
    }

    pub fn min(&self) -> Vec3 {
        Vec3::new(self.x.min, self.y.min, self.z.min)
    }

    pub fn max(&self) -> Vec3 {
        Vec3::new(self.x.max, self.y.max, self.z.max)
    }

    /// Get the interval for a specific axis (0=X, 1=Y, 2=Z).
    pub fn axis_interval(&self, n: usize) -> Interval {
        match n {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// The eight corners of the box.
    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.min(), self.max());
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ]
    }

    /// True if any axis is empty (including NaN extents).
    pub fn is_empty(&self) -> bool {
        self.x.is_empty() || self.y.is_empty() || self.z.is_empty()
    }

    /// True if any extent is NaN.
    pub fn has_nan(&self) -> bool {
        self.x.has_nan() || self.y.has_nan() || self.z.has_nan()
    }

    /// True if every extent is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// True if the two boxes overlap in all three axes.
    pub fn intersects(&self, other: &Bound) -> bool {
        self.x.overlaps(&other.x) && self.y.overlaps(&other.y) && self.z.overlaps(&other.z)
    }

    /// True if the two boxes overlap in x and y, ignoring depth.
    pub fn intersects_xy(&self, other: &Bound) -> bool {
        self.x.overlaps(&other.x) && self.y.overlaps(&other.y)
    }

    /// True if `other` lies entirely inside this box.
    pub fn contains_bound(&self, other: &Bound) -> bool {
        self.x.contains_interval(&other.x)
            && self.y.contains_interval(&other.y)
            && self.z.contains_interval(&other.z)
    }

    /// True if the 2D point lies inside the x/y extent.
    pub fn contains_xy(&self, p: Vec2) -> bool {
        self.x.contains(p.x) && self.y.contains(p.y)
    }

    /// Expand x and y by separate amounts, leaving depth untouched.
    pub fn pad_xy(&self, dx: f32, dy: f32) -> Bound {
        Bound::new(self.x.pad(dx), self.y.pad(dy), self.z)
    }

    /// Expand every axis by `amount`.
    pub fn pad(&self, amount: f32) -> Bound {
        Bound::new(self.x.pad(amount), self.y.pad(amount), self.z.pad(amount))
    }

    /// Translate the bound by an offset vector.
    pub fn translate(&self, offset: Vec3) -> Bound {
        Bound::new(
            self.x.add_scalar(offset.x),
            self.y.add_scalar(offset.y),
            self.z.add_scalar(offset.z),
        )
    }

    /// Returns the center point of the bounding box.
    pub fn centroid(&self) -> Vec3 {
        Vec3::new(self.x.center(), self.y.center(), self.z.center())
    }

    /// Static constants
    pub const EMPTY: Bound = Bound {
        x: Interval::EMPTY,
        y: Interval::EMPTY,
        z: Interval::EMPTY,
    };

    pub const UNIVERSE: Bound = Bound {
        x: Interval::UNIVERSE,
        y: Interval::UNIVERSE,
        z: Interval::UNIVERSE,
    };
}

impl Default for Bound {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_from_points() {
        let bound = Bound::from_points(Vec3::new(10.0, 0.0, 5.0), Vec3::new(0.0, 10.0, 0.0));

        assert_eq!(bound.min(), Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(bound.max(), Vec3::new(10.0, 10.0, 5.0));
    }

    #[test]
    fn test_bound_enclosing() {
        let bound = Bound::enclosing([
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(-1.0, 5.0, 0.0),
            Vec3::new(0.0, 0.0, 9.0),
        ]);
        assert_eq!(bound.min(), Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(bound.max(), Vec3::new(1.0, 5.0, 9.0));

        assert!(Bound::enclosing(std::iter::empty()).is_empty());
    }

    #[test]
    fn test_bound_surrounding() {
        let a = Bound::from_points(Vec3::ZERO, Vec3::splat(5.0));
        let b = Bound::from_points(Vec3::splat(3.0), Vec3::splat(10.0));
        let s = Bound::surrounding(&a, &b);

        assert_eq!(s.min(), Vec3::ZERO);
        assert_eq!(s.max(), Vec3::splat(10.0));
        assert!(s.contains_bound(&a));
        assert!(s.contains_bound(&b));
    }

    #[test]
    fn test_bound_intersects() {
        let a = Bound::from_points(Vec3::ZERO, Vec3::ONE);
        let b = Bound::from_points(Vec3::splat(0.5), Vec3::splat(2.0));
        let c = Bound::from_points(Vec3::new(0.0, 0.0, 5.0), Vec3::new(1.0, 1.0, 6.0));

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        // Same footprint, different depth
        assert!(a.intersects_xy(&c));
    }

    #[test]
    fn test_bound_nan_is_empty() {
        let bound = Bound::from_points(Vec3::new(f32::NAN, 0.0, 0.0), Vec3::ONE);
        assert!(!bound.is_finite());
        assert!(bound.has_nan());
        assert!(bound.is_empty());
        assert!(!Bound::EMPTY.has_nan());
    }

    #[test]
    fn test_bound_pad_xy() {
        let bound = Bound::from_points(Vec3::ZERO, Vec3::ONE).pad_xy(1.0, 2.0);
        assert_eq!(bound.min(), Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(bound.max(), Vec3::new(2.0, 3.0, 1.0));
    }

    #[test]
    fn test_bound_corners() {
        let bound = Bound::from_points(Vec3::ZERO, Vec3::ONE);
        let corners = bound.corners();
        assert_eq!(corners.len(), 8);
        assert!(corners.iter().all(|c| bound.contains_xy(c.truncate())));
        assert_eq!(Bound::enclosing(corners), bound);
    }

    #[test]
    fn test_bound_centroid() {
        let bound = Bound::from_points(Vec3::ZERO, Vec3::splat(10.0));
        assert_eq!(bound.centroid(), Vec3::splat(5.0));
    }
}
