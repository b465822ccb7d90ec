//! Buckets: the unit of rendering work.
//!
//! The image (or crop window) is divided into tiles visited one at a time
//! in a configurable traversal order. Each bucket holds the surfaces whose
//! bound first reaches it and the micropolygons waiting to be sampled
//! there.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use reyes_core::BucketOrder;
use reyes_math::{Bound, Interval};

use crate::micropolygon::MpgId;
use crate::surface::Surface;

/// An axis-aligned rectangle of pixels (end exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn x1(&self) -> u32 {
        self.x + self.width
    }

    pub fn y1(&self) -> u32 {
        self.y + self.height
    }

    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x1() && y >= self.y && y < self.y1()
    }

    /// Grow by `border` pixels on each side, clipped to `[0, limit)`.
    pub fn expand(&self, border: [u32; 2], limit: [u32; 2]) -> PixelRect {
        let x = self.x.saturating_sub(border[0]);
        let y = self.y.saturating_sub(border[1]);
        let x1 = (self.x1() + border[0]).min(limit[0]);
        let y1 = (self.y1() + border[1]).min(limit[1]);
        PixelRect::new(x, y, x1 - x, y1 - y)
    }

    /// Raster-space bound with unbounded depth.
    pub fn bound(&self) -> Bound {
        Bound::new(
            Interval::new(self.x as f32, self.x1() as f32),
            Interval::new(self.y as f32, self.y1() as f32),
            Interval::UNIVERSE,
        )
    }
}

/// Lifecycle of a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketState {
    /// Nothing registered yet
    Empty,
    /// Holding surfaces or micropolygons, not yet rendered
    Filling,
    /// Currently being rendered
    Sampling,
    /// Rendered and released
    Complete,
}

/// Heap entry: nearest surface first, then insertion order.
#[derive(Debug)]
struct QueuedSurface {
    depth: f32,
    seq: u64,
    surface: Surface,
}

impl PartialEq for QueuedSurface {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedSurface {}

impl PartialOrd for QueuedSurface {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedSurface {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap
        other
            .depth
            .total_cmp(&self.depth)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A tile of the output image.
#[derive(Debug)]
pub struct Bucket {
    /// Position in traversal order
    pub index: usize,
    /// Pixels this bucket outputs
    pub rect: PixelRect,
    /// Pixels this bucket samples: `rect` plus the filter border
    pub sample_rect: PixelRect,
    state: BucketState,
    surfaces: BinaryHeap<QueuedSurface>,
    next_seq: u64,
    /// Micropolygons forwarded or routed here
    pending: Vec<MpgId>,
}

impl Bucket {
    pub fn new(index: usize, rect: PixelRect, sample_rect: PixelRect) -> Self {
        Self {
            index,
            rect,
            sample_rect,
            state: BucketState::Empty,
            surfaces: BinaryHeap::new(),
            next_seq: 0,
            pending: Vec::new(),
        }
    }

    pub fn state(&self) -> BucketState {
        self.state
    }

    /// Raster-space bound of the sampled region.
    pub fn sample_bound(&self) -> Bound {
        self.sample_rect.bound()
    }

    /// True if `bound` reaches any sample of this bucket.
    pub fn overlaps(&self, bound: &Bound) -> bool {
        self.sample_bound().intersects_xy(bound)
    }

    /// Register a surface, keyed on the near depth of its raster bound.
    pub fn push_surface(&mut self, surface: Surface, depth: f32) {
        self.surfaces.push(QueuedSurface {
            depth,
            seq: self.next_seq,
            surface,
        });
        self.next_seq += 1;
        if self.state == BucketState::Empty {
            self.state = BucketState::Filling;
        }
    }

    /// Nearest queued surface.
    pub fn pop_surface(&mut self) -> Option<Surface> {
        self.surfaces.pop().map(|q| q.surface)
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    pub fn push_micropolygon(&mut self, id: MpgId) {
        self.pending.push(id);
        if self.state == BucketState::Empty {
            self.state = BucketState::Filling;
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn take_pending(&mut self) -> Vec<MpgId> {
        std::mem::take(&mut self.pending)
    }

    pub fn begin_sampling(&mut self) {
        self.state = BucketState::Sampling;
    }

    /// Release all per-bucket storage.
    pub fn finish(&mut self) {
        self.surfaces.clear();
        self.pending.clear();
        self.state = BucketState::Complete;
    }

    /// Return to the freshly created state.
    pub fn reset(&mut self) {
        self.finish();
        self.next_seq = 0;
        self.state = BucketState::Empty;
    }
}

/// Cut `region` into tiles of at most `size` pixels, row-major.
pub fn tile_region(region: PixelRect, size: [u32; 2]) -> Vec<PixelRect> {
    let mut tiles = Vec::new();
    let mut y = region.y;
    while y < region.y1() {
        let h = size[1].min(region.y1() - y);
        let mut x = region.x;
        while x < region.x1() {
            let w = size[0].min(region.x1() - x);
            tiles.push(PixelRect::new(x, y, w, h));
            x += size[0];
        }
        y += size[1];
    }
    tiles
}

/// Visit order over a `cols × rows` tile grid. Returns row-major tile
/// indices in the order they are rendered.
pub fn traversal_order(cols: usize, rows: usize, order: BucketOrder, seed: u64) -> Vec<usize> {
    let mut indices: Vec<usize> = match order {
        BucketOrder::Horizontal => (0..cols * rows).collect(),
        BucketOrder::Vertical => (0..cols)
            .flat_map(|c| (0..rows).map(move |r| r * cols + c))
            .collect(),
        BucketOrder::ZigZag => (0..rows)
            .flat_map(|r| {
                let row: Vec<usize> = (0..cols).map(|c| r * cols + c).collect();
                if r % 2 == 1 {
                    row.into_iter().rev().collect::<Vec<_>>()
                } else {
                    row
                }
            })
            .collect(),
        BucketOrder::Spiral | BucketOrder::Random => (0..cols * rows).collect(),
    };

    match order {
        BucketOrder::Spiral => sort_spiral(&mut indices, cols, rows),
        BucketOrder::Random => indices.shuffle(&mut StdRng::seed_from_u64(seed)),
        _ => {}
    }
    indices
}

/// Sort tile indices by distance of the tile centre from the grid centre.
/// The sort is stable, so ties keep row-major order.
fn sort_spiral(indices: &mut [usize], cols: usize, rows: usize) {
    let center_x = cols as f32 / 2.0;
    let center_y = rows as f32 / 2.0;
    let dist = |i: usize| {
        let x = (i % cols) as f32 + 0.5;
        let y = (i / cols) as f32 + 0.5;
        (x - center_x).powi(2) + (y - center_y).powi(2)
    };
    indices.sort_by(|&a, &b| dist(a).partial_cmp(&dist(b)).unwrap_or(Ordering::Equal));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::BilinearPatch;
    use reyes_core::AttributeStore;
    use reyes_math::Vec3;

    fn surface() -> Surface {
        let store = AttributeStore::new();
        let patch = BilinearPatch::new(Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::new(1.0, 1.0, 0.0));
        Surface::new(patch, store.default_id())
    }

    #[test]
    fn test_tile_region_covers_exactly() {
        let tiles = tile_region(PixelRect::new(0, 0, 100, 50), [32, 32]);
        assert_eq!(tiles.len(), 4 * 2);
        assert_eq!(tiles[3], PixelRect::new(96, 0, 4, 32));
        assert_eq!(tiles[7], PixelRect::new(96, 32, 4, 18));
        let area: usize = tiles.iter().map(PixelRect::pixel_count).sum();
        assert_eq!(area, 100 * 50);
    }

    #[test]
    fn test_expand_clips_to_image() {
        let rect = PixelRect::new(0, 8, 8, 8);
        assert_eq!(rect.expand([2, 2], [12, 12]), PixelRect::new(0, 6, 10, 6));
    }

    #[test]
    fn test_traversal_orders() {
        assert_eq!(traversal_order(3, 2, BucketOrder::Horizontal, 0), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(traversal_order(3, 2, BucketOrder::Vertical, 0), vec![0, 3, 1, 4, 2, 5]);
        assert_eq!(traversal_order(3, 2, BucketOrder::ZigZag, 0), vec![0, 1, 2, 5, 4, 3]);

        let spiral = traversal_order(3, 3, BucketOrder::Spiral, 0);
        assert_eq!(spiral[0], 4);
        assert_eq!(&spiral[1..5], &[1, 3, 5, 7]);

        let mut random = traversal_order(4, 4, BucketOrder::Random, 9);
        assert_eq!(random, traversal_order(4, 4, BucketOrder::Random, 9));
        random.sort_unstable();
        assert_eq!(random, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_surfaces_pop_nearest_first() {
        let mut bucket = Bucket::new(0, PixelRect::new(0, 0, 8, 8), PixelRect::new(0, 0, 8, 8));
        assert_eq!(bucket.state(), BucketState::Empty);

        bucket.push_surface(surface(), 5.0);
        bucket.push_surface(surface(), 1.0);
        bucket.push_surface(surface(), 3.0);
        assert_eq!(bucket.state(), BucketState::Filling);
        assert_eq!(bucket.surface_count(), 3);

        let mut popped = 0;
        while bucket.pop_surface().is_some() {
            popped += 1;
        }
        assert_eq!(popped, 3);
    }

    #[test]
    fn test_heap_order_with_ties() {
        let mut heap = BinaryHeap::new();
        for (seq, depth) in [(0, 2.0), (1, 1.0), (2, 2.0), (3, 0.5)] {
            heap.push(QueuedSurface {
                depth,
                seq,
                surface: surface(),
            });
        }
        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|q| q.seq)).collect();
        assert_eq!(order, vec![3, 1, 0, 2]);
    }

    #[test]
    fn test_finish_releases_storage() {
        let mut bucket = Bucket::new(0, PixelRect::new(0, 0, 4, 4), PixelRect::new(0, 0, 4, 4));
        let mut arena = crate::micropolygon::MicroPolygonArena::new();
        let id = arena.insert(crate::micropolygon::MicroPolygon::new_static(
            [Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y],
            false,
            reyes_math::Vec2::ZERO,
            reyes_math::Color::ONE,
            reyes_math::Color::ONE,
        ));
        bucket.push_micropolygon(id);
        assert_eq!(bucket.pending_count(), 1);
        bucket.finish();
        assert_eq!(bucket.state(), BucketState::Complete);
        assert_eq!(bucket.pending_count(), 0);
        assert_eq!(bucket.surface_count(), 0);
    }
}
