/// A closed range of real values `[min, max]`.
///
/// Used for one axis of a [`Bound`](crate::Bound), for shutter and
/// time ranges, and for depth ranges during occlusion tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f32,
    pub max: f32,
}

impl Interval {
    /// Create a new interval given min and max values.
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Interval covering a single value.
    pub fn point(x: f32) -> Self {
        Self { min: x, max: x }
    }

    /// Returns the size of the interval (max - min).
    pub fn size(&self) -> f32 {
        self.max - self.min
    }

    /// Midpoint of the interval.
    pub fn center(&self) -> f32 {
        0.5 * (self.min + self.max)
    }

    /// True when min > max (nothing is contained).
    pub fn is_empty(&self) -> bool {
        !(self.min <= self.max)
    }

    /// True when both ends are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// True when either end is NaN.
    pub fn has_nan(&self) -> bool {
        self.min.is_nan() || self.max.is_nan()
    }

    /// Returns true if x is within the interval [min, max] (inclusive).
    pub fn contains(&self, x: f32) -> bool {
        self.min <= x && x <= self.max
    }

    /// Returns true if `other` lies entirely inside this interval.
    pub fn contains_interval(&self, other: &Interval) -> bool {
        self.min <= other.min && other.max <= self.max
    }

    /// Returns true if the two closed intervals share at least one value.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.min <= other.max && other.min <= self.max
    }

    /// Clamps x to be within the interval [min, max].
    pub fn clamp(&self, x: f32) -> f32 {
        x.clamp(self.min, self.max)
    }

    /// Expands the interval by `amount` on each side.
    pub fn pad(&self, amount: f32) -> Interval {
        Interval::new(self.min - amount, self.max + amount)
    }

    /// Grow the interval to include `x`.
    /// A NaN poisons the interval so it is never mistaken for a real range.
    pub fn include(&mut self, x: f32) {
        if x.is_nan() {
            *self = Interval::new(f32::NAN, f32::NAN);
            return;
        }
        if x < self.min {
            self.min = x;
        }
        if x > self.max {
            self.max = x;
        }
    }

    /// Adds a scalar displacement to both min and max.
    pub fn add_scalar(&self, displacement: f32) -> Interval {
        Interval::new(self.min + displacement, self.max + displacement)
    }

    /// Creates an interval that surrounds two other intervals.
    pub fn surrounding(a: &Interval, b: &Interval) -> Interval {
        if a.has_nan() || b.has_nan() {
            return Interval::new(f32::NAN, f32::NAN);
        }
        Interval::new(a.min.min(b.min), a.max.max(b.max))
    }

    /// The overlap of two intervals (may be empty).
    pub fn intersection(a: &Interval, b: &Interval) -> Interval {
        Interval::new(a.min.max(b.min), a.max.min(b.max))
    }

    /// Map `t` in [0, 1] onto the interval.
    pub fn lerp(&self, t: f32) -> f32 {
        self.min + (self.max - self.min) * t
    }

    /// An empty interval (min > max, contains nothing).
    pub const EMPTY: Interval = Interval {
        min: f32::INFINITY,
        max: f32::NEG_INFINITY,
    };

    /// A universe interval (contains everything).
    pub const UNIVERSE: Interval = Interval {
        min: f32::NEG_INFINITY,
        max: f32::INFINITY,
    };
}
