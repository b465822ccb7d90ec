//! Micropolygons: the atomic quads (or triangles) the sampler tests.
//!
//! Corners are stored in raster space, in parametric order
//! `(0,0), (1,0), (1,1), (0,1)`. A triangular polygon ignores corner 2,
//! the phantom vertex of a triangle diced as a parallelogram.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

use reyes_math::{lerp, Bound, Color, Interval, Vec2, Vec3};

use crate::motion::MotionKeys;

/// Polygons smaller than this raster area are degenerate.
const DEGENERATE_AREA: f32 = 1.0e-10;

/// Status bits. Each bit is written by a single owner.
const FLAG_HIT: u8 = 1 << 0;
const FLAG_TRIMMED: u8 = 1 << 1;
const FLAG_PUSHED_FORWARD: u8 = 1 << 2;

/// A bound valid over part of the shutter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedBound {
    pub bound: Bound,
    pub time: Interval,
}

#[inline]
fn cross2(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Corner indices that belong to the polygon.
#[inline]
fn live_corners(triangular: bool) -> &'static [usize] {
    if triangular {
        &[0, 1, 3]
    } else {
        &[0, 1, 2, 3]
    }
}

fn corner_bound(corners: &[Vec3; 4], triangular: bool) -> Bound {
    Bound::enclosing(live_corners(triangular).iter().map(|&i| corners[i]))
}

fn raster_area(corners: &[Vec3; 4], triangular: bool) -> f32 {
    let p = corners.map(|c| c.truncate());
    if triangular {
        0.5 * cross2(p[1] - p[0], p[3] - p[0]).abs()
    } else {
        0.5 * cross2(p[2] - p[0], p[3] - p[1]).abs()
    }
}

/// Solve `p = bilinear(a, b, c, d; u, v)` for `(u, v)` in the unit square.
///
/// `a, b, c, d` are the corners at `(0,0), (1,0), (1,1), (0,1)`.
pub fn inverse_bilinear(p: Vec2, a: Vec2, b: Vec2, c: Vec2, d: Vec2) -> Option<Vec2> {
    const EPS: f32 = 1.0e-5;
    let e = b - a;
    let f = d - a;
    let g = a - b + c - d;
    let h = p - a;

    let k2 = cross2(g, f);
    let k1 = cross2(e, f) + cross2(h, g);
    let k0 = cross2(h, e);

    let solve_u = |v: f32| -> Option<f32> {
        let denom = e + g * v;
        let num = h - f * v;
        if denom.x.abs() >= denom.y.abs() {
            (denom.x != 0.0).then(|| num.x / denom.x)
        } else {
            Some(num.y / denom.y)
        }
    };
    let in_range = |x: f32| (-EPS..=1.0 + EPS).contains(&x);

    if k2.abs() <= EPS * k1.abs().max(EPS) {
        // Parallelogram-like: the equation in v is linear
        if k1 == 0.0 {
            return None;
        }
        let v = -k0 / k1;
        let u = solve_u(v)?;
        return (in_range(u) && in_range(v)).then(|| Vec2::new(u, v).clamp(Vec2::ZERO, Vec2::ONE));
    }

    let disc = k1 * k1 - 4.0 * k0 * k2;
    if disc < 0.0 {
        return None;
    }
    let w = disc.sqrt();
    let inv = 0.5 / k2;
    for v in [(-k1 - w) * inv, (-k1 + w) * inv] {
        if !in_range(v) {
            continue;
        }
        if let Some(u) = solve_u(v) {
            if in_range(u) {
                return Some(Vec2::new(u, v).clamp(Vec2::ZERO, Vec2::ONE));
            }
        }
    }
    None
}

/// Containment test for one set of corners. Returns the depth on a hit.
fn corners_contain(corners: &[Vec3; 4], triangular: bool, p: Vec2) -> Option<f32> {
    if triangular {
        let (a, b, d) = (corners[0], corners[1], corners[3]);
        let area = cross2(b.truncate() - a.truncate(), d.truncate() - a.truncate());
        if area == 0.0 {
            return None;
        }
        let w1 = cross2(p - a.truncate(), d.truncate() - a.truncate()) / area;
        let w2 = cross2(b.truncate() - a.truncate(), p - a.truncate()) / area;
        let w0 = 1.0 - w1 - w2;
        if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
            return None;
        }
        return Some(a.z * w0 + b.z * w1 + d.z * w2);
    }

    let [a, b, c, d] = corners.map(|v| v.truncate());
    let st = inverse_bilinear(p, a, b, c, d)?;
    let bottom = lerp(corners[0].z, corners[1].z, st.x);
    let top = lerp(corners[3].z, corners[2].z, st.x);
    Some(lerp(bottom, top, st.y))
}

/// Corner keys of a moving micropolygon plus its lazily built
/// per-interval bounds.
#[derive(Debug)]
pub struct MovingMicroPolygon {
    keys: MotionKeys<[Vec3; 4]>,
    triangular: bool,
    pad: Vec2,
    sub_bounds: OnceLock<Vec<TimedBound>>,
}

impl MovingMicroPolygon {
    pub fn new(keys: MotionKeys<[Vec3; 4]>, triangular: bool, pad: Vec2) -> Self {
        Self {
            keys,
            triangular,
            pad,
            sub_bounds: OnceLock::new(),
        }
    }

    pub fn keys(&self) -> &MotionKeys<[Vec3; 4]> {
        &self.keys
    }

    /// Corners at `time`: exact at a key, linear between keys.
    pub fn corners_at(&self, time: f32) -> [Vec3; 4] {
        self.keys.sample(time, |a, b, t| {
            [
                lerp(a[0], b[0], t),
                lerp(a[1], b[1], t),
                lerp(a[2], b[2], t),
                lerp(a[3], b[3], t),
            ]
        })
    }

    /// Union of every key's box, padded.
    pub fn total_bound(&self) -> Bound {
        let mut bound = Bound::EMPTY;
        for corners in self.keys.values() {
            bound.include(&corner_bound(corners, self.triangular));
        }
        bound.pad_xy(self.pad.x, self.pad.y)
    }

    fn build_sub_bounds(&self) -> Vec<TimedBound> {
        let times = self.keys.times();
        let boxes: Vec<Bound> = self
            .keys
            .values()
            .iter()
            .map(|c| corner_bound(c, self.triangular))
            .collect();
        boxes
            .windows(2)
            .zip(times.windows(2))
            .map(|(b, t)| TimedBound {
                bound: Bound::surrounding(&b[0], &b[1]).pad_xy(self.pad.x, self.pad.y),
                time: Interval::new(t[0], t[1]),
            })
            .collect()
    }

    fn sub_bounds(&self) -> &[TimedBound] {
        self.sub_bounds.get_or_init(|| self.build_sub_bounds())
    }

    /// Number of time intervals (keys - 1).
    pub fn sub_bound_count(&self) -> usize {
        self.keys.len().saturating_sub(1)
    }

    /// Bound of interval `index` together with the time range it covers.
    /// Built on first use; later calls return the cached value.
    pub fn sub_bound(&self, index: usize) -> Option<TimedBound> {
        self.sub_bounds().get(index).copied()
    }

    /// Tightest cached bound valid at `time`.
    pub fn bound_at(&self, time: f32) -> Bound {
        let subs = self.sub_bounds();
        subs.iter()
            .find(|s| time <= s.time.max)
            .or_else(|| subs.last())
            .map(|s| s.bound)
            .unwrap_or_else(|| self.total_bound())
    }

    fn is_degenerate(&self) -> bool {
        self.keys.values().iter().any(|c| c.iter().any(|p| !p.is_finite()))
            || self
                .keys
                .values()
                .iter()
                .all(|c| raster_area(c, self.triangular) < DEGENERATE_AREA)
    }
}

/// Corner geometry of a micropolygon.
#[derive(Debug)]
pub enum Shape {
    Static([Vec3; 4]),
    Moving(MovingMicroPolygon),
}

/// An atomic quad (or triangle) with flat colour and opacity.
#[derive(Debug)]
pub struct MicroPolygon {
    shape: Shape,
    /// Premultiplied colour (Ci)
    pub color: Color,
    /// Opacity (Oi)
    pub opacity: Color,
    pub matte: bool,
    triangular: bool,
    /// Depth used to evaluate the lens offset
    focus_depth: f32,
    bound: Bound,
    flags: AtomicU8,
}

impl MicroPolygon {
    /// A static polygon. `pad` widens the x/y bound (circle of confusion).
    pub fn new_static(corners: [Vec3; 4], triangular: bool, pad: Vec2, color: Color, opacity: Color) -> Self {
        let bound = corner_bound(&corners, triangular).pad_xy(pad.x, pad.y);
        let focus_depth = mean_depth(&corners, triangular);
        Self {
            shape: Shape::Static(corners),
            color,
            opacity,
            matte: false,
            triangular,
            focus_depth,
            bound,
            flags: AtomicU8::new(0),
        }
    }

    /// A moving polygon with one corner set per motion key.
    pub fn new_moving(
        keys: MotionKeys<[Vec3; 4]>,
        triangular: bool,
        pad: Vec2,
        color: Color,
        opacity: Color,
    ) -> Self {
        if !keys.is_moving() {
            return Self::new_static(*keys.first(), triangular, pad, color, opacity);
        }
        let focus_depth = mean_depth(keys.first(), triangular);
        let moving = MovingMicroPolygon::new(keys, triangular, pad);
        let bound = moving.total_bound();
        Self {
            shape: Shape::Moving(moving),
            color,
            opacity,
            matte: false,
            triangular,
            focus_depth,
            bound,
            flags: AtomicU8::new(0),
        }
    }

    pub fn with_matte(mut self, matte: bool) -> Self {
        self.matte = matte;
        self
    }

    /// Mark the polygon as needing per-sample near/far rejection.
    pub fn with_trimmed(self, trimmed: bool) -> Self {
        if trimmed {
            self.flags.fetch_or(FLAG_TRIMMED, Ordering::Relaxed);
        }
        self
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn moving(&self) -> Option<&MovingMicroPolygon> {
        match &self.shape {
            Shape::Moving(m) => Some(m),
            Shape::Static(_) => None,
        }
    }

    pub fn is_triangular(&self) -> bool {
        self.triangular
    }

    /// Raster bound over the whole shutter, including lens blur.
    pub fn bound(&self) -> &Bound {
        &self.bound
    }

    /// Tightest bound valid at `time`.
    pub fn bound_at(&self, time: f32) -> Bound {
        match &self.shape {
            Shape::Static(_) => self.bound,
            Shape::Moving(m) => m.bound_at(time),
        }
    }

    pub fn focus_depth(&self) -> f32 {
        self.focus_depth
    }

    /// Corners at a shutter time.
    pub fn corners_at(&self, time: f32) -> [Vec3; 4] {
        match &self.shape {
            Shape::Static(c) => *c,
            Shape::Moving(m) => m.corners_at(time),
        }
    }

    /// Test a raster sample position at a shutter time. Returns the
    /// interpolated depth when the point is inside.
    #[inline]
    pub fn contains(&self, point: Vec2, time: f32) -> Option<f32> {
        match &self.shape {
            Shape::Static(c) => corners_contain(c, self.triangular, point),
            Shape::Moving(m) => corners_contain(&m.corners_at(time), self.triangular, point),
        }
    }

    /// Corners collapsed to (near) zero area, or non-finite.
    pub fn is_degenerate(&self) -> bool {
        match &self.shape {
            Shape::Static(c) => {
                c.iter().any(|p| !p.is_finite()) || raster_area(c, self.triangular) < DEGENERATE_AREA
            }
            Shape::Moving(m) => m.is_degenerate(),
        }
    }

    pub fn mark_hit(&self) {
        self.flags.fetch_or(FLAG_HIT, Ordering::Relaxed);
    }

    pub fn was_hit(&self) -> bool {
        self.flags.load(Ordering::Relaxed) & FLAG_HIT != 0
    }

    pub fn is_trimmed(&self) -> bool {
        self.flags.load(Ordering::Relaxed) & FLAG_TRIMMED != 0
    }

    /// Set the pushed-forward bit. Returns false if it was already set,
    /// so a polygon is forwarded at most once per bucket visit.
    pub fn mark_pushed_forward(&self) -> bool {
        self.flags.fetch_or(FLAG_PUSHED_FORWARD, Ordering::Relaxed) & FLAG_PUSHED_FORWARD == 0
    }

    /// Clear the pushed-forward bit once the polygon is active elsewhere.
    pub fn clear_pushed_forward(&self) {
        self.flags.fetch_and(!FLAG_PUSHED_FORWARD, Ordering::Relaxed);
    }

    pub fn is_pushed_forward(&self) -> bool {
        self.flags.load(Ordering::Relaxed) & FLAG_PUSHED_FORWARD != 0
    }
}

fn mean_depth(corners: &[Vec3; 4], triangular: bool) -> f32 {
    let live = live_corners(triangular);
    live.iter().map(|&i| corners[i].z).sum::<f32>() / live.len() as f32
}

/// Handle to a micropolygon stored in a [`MicroPolygonArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MpgId(u32);

impl MpgId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Slot arena for the micropolygons of one render.
///
/// Buckets queue handles, never polygons, so a polygon is stored once no
/// matter how many buckets it crosses.
#[derive(Debug, Default)]
pub struct MicroPolygonArena {
    slots: Vec<Option<MicroPolygon>>,
    free: Vec<u32>,
    live: usize,
}

impl MicroPolygonArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mpg: MicroPolygon) -> MpgId {
        self.live += 1;
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Some(mpg);
                MpgId(slot)
            }
            None => {
                self.slots.push(Some(mpg));
                MpgId(self.slots.len() as u32 - 1)
            }
        }
    }

    pub fn get(&self, id: MpgId) -> Option<&MicroPolygon> {
        self.slots.get(id.index()).and_then(|s| s.as_ref())
    }

    /// Release a polygon's slot.
    pub fn remove(&mut self, id: MpgId) -> Option<MicroPolygon> {
        let taken = self.slots.get_mut(id.index()).and_then(|s| s.take());
        if taken.is_some() {
            self.live -= 1;
            self.free.push(id.0);
        }
        taken
    }

    /// Polygons currently stored.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.live = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square(depths: [f32; 4]) -> [Vec3; 4] {
        [
            Vec3::new(0.0, 0.0, depths[0]),
            Vec3::new(1.0, 0.0, depths[1]),
            Vec3::new(1.0, 1.0, depths[2]),
            Vec3::new(0.0, 1.0, depths[3]),
        ]
    }

    fn static_mpg(corners: [Vec3; 4]) -> MicroPolygon {
        MicroPolygon::new_static(corners, false, Vec2::ZERO, Color::ONE, Color::ONE)
    }

    #[test]
    fn test_unit_square_interior_hits() {
        let mpg = static_mpg(unit_square([1.0, 1.0, 1.0, 1.0]));
        for p in [Vec2::new(0.5, 0.5), Vec2::new(0.1, 0.9), Vec2::new(0.99, 0.01)] {
            let depth = mpg.contains(p, 0.0);
            assert!(depth.is_some(), "{p:?} should hit");
            assert!((depth.unwrap() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_unit_square_exterior_misses() {
        let mpg = static_mpg(unit_square([1.0; 4]));
        for p in [
            Vec2::new(-0.1, 0.5),
            Vec2::new(1.1, 0.5),
            Vec2::new(0.5, -0.2),
            Vec2::new(0.5, 1.5),
            Vec2::new(3.0, 3.0),
        ] {
            assert!(mpg.contains(p, 0.0).is_none(), "{p:?} should miss");
        }
    }

    #[test]
    fn test_depth_is_interpolated() {
        // Depth 1 on the left edge, 3 on the right edge
        let mpg = static_mpg(unit_square([1.0, 3.0, 3.0, 1.0]));
        let depth = mpg.contains(Vec2::new(0.25, 0.5), 0.0).unwrap();
        assert!((depth - 1.5).abs() < 1e-4);

        // Bilinear in both directions
        let mpg = static_mpg(unit_square([0.0, 1.0, 2.0, 1.0]));
        let depth = mpg.contains(Vec2::new(0.5, 0.5), 0.0).unwrap();
        assert!((depth - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_non_parallel_quad() {
        // A trapezoid: wide bottom, narrow top
        let corners = [
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(4.0, 0.0, 1.0),
            Vec3::new(3.0, 2.0, 1.0),
            Vec3::new(1.0, 2.0, 1.0),
        ];
        let st = inverse_bilinear(
            Vec2::new(2.0, 1.0),
            corners[0].truncate(),
            corners[1].truncate(),
            corners[2].truncate(),
            corners[3].truncate(),
        )
        .unwrap();
        assert!((st.x - 0.5).abs() < 1e-4);
        assert!((st.y - 0.5).abs() < 1e-4);

        let mpg = static_mpg(corners);
        assert!(mpg.contains(Vec2::new(0.4, 1.9), 0.0).is_none());
        assert!(mpg.contains(Vec2::new(1.2, 1.9), 0.0).is_some());
    }

    #[test]
    fn test_clockwise_quad_still_hits() {
        let mut corners = unit_square([2.0; 4]);
        corners.swap(1, 3);
        let mpg = static_mpg(corners);
        assert!(mpg.contains(Vec2::new(0.5, 0.5), 0.0).is_some());
    }

    #[test]
    fn test_triangular_ignores_phantom_corner() {
        // Corner 2 is the phantom vertex of a parallelogram
        let corners = unit_square([1.0, 2.0, 9.0, 3.0]);
        let mpg = MicroPolygon::new_static(corners, true, Vec2::ZERO, Color::ONE, Color::ONE);

        assert!(mpg.contains(Vec2::new(0.2, 0.2), 0.0).is_some());
        assert!(mpg.contains(Vec2::new(0.8, 0.8), 0.0).is_none());

        // Barycentric depth: at (0.5, 0) halfway between corners 0 and 1
        let depth = mpg.contains(Vec2::new(0.5, 0.0), 0.0).unwrap();
        assert!((depth - 1.5).abs() < 1e-4);
        let depth = mpg.contains(Vec2::new(0.0, 0.5), 0.0).unwrap();
        assert!((depth - 2.0).abs() < 1e-4);

        // The bound excludes the phantom corner's depth
        assert_eq!(mpg.bound().z, Interval::new(1.0, 3.0));
    }

    #[test]
    fn test_degenerate_detection() {
        let collapsed = [Vec3::new(1.0, 1.0, 1.0); 4];
        assert!(static_mpg(collapsed).is_degenerate());

        let line = [
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(2.0, 0.0, 1.0),
            Vec3::new(3.0, 0.0, 1.0),
        ];
        assert!(static_mpg(line).is_degenerate());

        let mut nan = unit_square([1.0; 4]);
        nan[2].x = f32::NAN;
        assert!(static_mpg(nan).is_degenerate());

        assert!(!static_mpg(unit_square([1.0; 4])).is_degenerate());
    }

    #[test]
    fn test_motion_midpoint_is_mean_of_keys() {
        let start = unit_square([1.0; 4]);
        let end = start.map(|c| c + Vec3::new(4.0, 2.0, 1.0));
        let keys = MotionKeys::from_keys([(0.0, start), (1.0, end)]).unwrap();
        let mpg = MicroPolygon::new_moving(keys, false, Vec2::ZERO, Color::ONE, Color::ONE);

        let mid = mpg.corners_at(0.5);
        for i in 0..4 {
            assert_eq!(mid[i], (start[i] + end[i]) * 0.5);
        }
        // Exactly at a key
        assert_eq!(mpg.corners_at(1.0), end);

        // Moves out from under a fixed sample point
        assert!(mpg.contains(Vec2::new(0.5, 0.5), 0.0).is_some());
        assert!(mpg.contains(Vec2::new(0.5, 0.5), 1.0).is_none());
        assert!(mpg.contains(Vec2::new(2.5, 1.5), 0.5).is_some());
    }

    #[test]
    fn test_moving_bound_covers_all_keys() {
        let start = unit_square([1.0; 4]);
        let end = start.map(|c| c + Vec3::new(10.0, 0.0, 0.0));
        let keys = MotionKeys::from_keys([(0.0, start), (1.0, end)]).unwrap();
        let mpg = MicroPolygon::new_moving(keys, false, Vec2::ZERO, Color::ONE, Color::ONE);

        assert_eq!(mpg.bound().x, Interval::new(0.0, 11.0));
        assert_eq!(mpg.bound().y, Interval::new(0.0, 1.0));
    }

    #[test]
    fn test_sub_bounds_are_idempotent() {
        let k0 = unit_square([1.0; 4]);
        let k1 = k0.map(|c| c + Vec3::new(5.0, 0.0, 0.0));
        let k2 = k0.map(|c| c + Vec3::new(5.0, 5.0, 0.0));
        let keys = MotionKeys::from_keys([(0.0, k0), (0.5, k1), (1.0, k2)]).unwrap();
        let mpg = MicroPolygon::new_moving(keys, false, Vec2::ZERO, Color::ONE, Color::ONE);
        let moving = mpg.moving().unwrap();

        assert_eq!(moving.sub_bound_count(), 2);
        let first = moving.sub_bound(0).unwrap();
        let second = moving.sub_bound(1).unwrap();
        assert_eq!(moving.sub_bound(0), Some(first));
        assert_eq!(moving.sub_bound(1), Some(second));
        assert!(moving.sub_bound(2).is_none());

        assert_eq!(first.time, Interval::new(0.0, 0.5));
        assert_eq!(first.bound.x, Interval::new(0.0, 6.0));
        assert_eq!(first.bound.y, Interval::new(0.0, 1.0));
        assert_eq!(second.bound.y, Interval::new(0.0, 6.0));

        // Sub-bounds are tighter than the total bound
        assert!(mpg.bound().contains_bound(&first.bound));
        assert!(mpg.bound().contains_bound(&second.bound));
        assert_eq!(mpg.bound_at(0.25), first.bound);
        assert_eq!(mpg.bound_at(0.75), second.bound);
    }

    #[test]
    fn test_single_key_motion_is_static() {
        let keys = MotionKeys::fixed(unit_square([1.0; 4]));
        let mpg = MicroPolygon::new_moving(keys, false, Vec2::ZERO, Color::ONE, Color::ONE);
        assert!(mpg.moving().is_none());
    }

    #[test]
    fn test_flags() {
        let mpg = static_mpg(unit_square([1.0; 4]));
        assert!(!mpg.was_hit());
        mpg.mark_hit();
        assert!(mpg.was_hit());

        assert!(mpg.mark_pushed_forward());
        assert!(!mpg.mark_pushed_forward());
        mpg.clear_pushed_forward();
        assert!(!mpg.is_pushed_forward());

        assert!(!mpg.is_trimmed());
        assert!(static_mpg(unit_square([1.0; 4])).with_trimmed(true).is_trimmed());
    }

    #[test]
    fn test_arena_reuses_slots() {
        let mut arena = MicroPolygonArena::new();
        let a = arena.insert(static_mpg(unit_square([1.0; 4])));
        let b = arena.insert(static_mpg(unit_square([2.0; 4])));
        assert_eq!(arena.len(), 2);

        assert!(arena.remove(a).is_some());
        assert!(arena.get(a).is_none());
        assert!(arena.remove(a).is_none());

        let c = arena.insert(static_mpg(unit_square([3.0; 4])));
        assert_eq!(c, a);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(b).unwrap().bound().z.min, 2.0);
    }
}
