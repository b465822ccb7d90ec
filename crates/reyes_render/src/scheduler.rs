//! Split/dice decisions.
//!
//! [`Scheduler::classify`] decides the fate of one surface. Termination
//! is guaranteed by two budgets carried on each surface: eye splits for
//! geometry crossing the hither plane (or with unusable bounds), and
//! split depth for everything else. Exhausting either discards the
//! surface.

use reyes_core::{AttributeStore, Attributes, RenderOptions};
use reyes_math::{Bound, Interval, Vec2};

use crate::camera::Camera;
use crate::filter::PixelFilter;
use crate::stats::RenderStats;
use crate::surface::{DiceSize, SplitAxis, Surface};

/// Why a surface was culled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullReason {
    /// The bound contains nothing
    Empty,
    /// Wholly nearer than the hither plane or beyond the yon plane
    OutsideClip,
    /// Projects outside the crop window (plus filter border)
    OutsideRegion,
}

/// Why a surface was given up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    EyeSplitLimit,
    SplitDepthLimit,
}

/// Outcome of classifying one surface.
#[derive(Debug)]
pub enum Classification {
    Cull(CullReason),
    Dice(DiceSize),
    Split(Vec<Surface>),
    Discard(DiscardReason),
}

impl Classification {
    /// Count this outcome for `parent`.
    pub fn record(&self, parent: &Surface, stats: &mut RenderStats) {
        match self {
            Classification::Cull(_) => stats.surfaces_culled += 1,
            Classification::Discard(_) => stats.surfaces_discarded += 1,
            Classification::Split(children) => {
                let eye = children
                    .first()
                    .is_some_and(|c| c.eye_splits() > parent.eye_splits());
                if eye {
                    stats.eye_splits += 1;
                } else {
                    stats.splits += 1;
                }
            }
            Classification::Dice(_) => {}
        }
    }
}

/// Raster region that can receive samples: the crop window grown by the
/// filter border.
pub fn render_region(options: &RenderOptions) -> Bound {
    let (x0, y0, x1, y1) = options.crop_rect();
    let [bx, by] = PixelFilter::from_options(&options.filter).border();
    Bound::new(
        Interval::new(x0 as f32 - bx as f32, x1 as f32 + bx as f32),
        Interval::new(y0 as f32 - by as f32, y1 as f32 + by as f32),
        Interval::UNIVERSE,
    )
}

/// Classifies surfaces against one camera and option set.
pub struct Scheduler<'a> {
    camera: &'a Camera,
    options: &'a RenderOptions,
    attributes: &'a AttributeStore,
    region: Bound,
}

impl<'a> Scheduler<'a> {
    pub fn new(camera: &'a Camera, options: &'a RenderOptions, attributes: &'a AttributeStore) -> Self {
        Self {
            camera,
            options,
            attributes,
            region: render_region(options),
        }
    }

    pub fn region(&self) -> &Bound {
        &self.region
    }

    /// Camera-space bound grown by the displacement bound.
    pub fn surface_bound(&self, surface: &Surface) -> Bound {
        let attributes = self.attributes.get(surface.attributes());
        let bound = surface.bound();
        if attributes.displacement_bound > 0.0 {
            bound.pad(attributes.displacement_bound)
        } else {
            bound
        }
    }

    /// Raster bound of a surface, or `None` when it cannot be projected.
    pub fn raster_bound(&self, surface: &Surface) -> Option<Bound> {
        self.camera.raster_bound(&self.surface_bound(surface))
    }

    /// Decide whether to cull, dice, split or discard `surface`.
    pub fn classify(&self, surface: &Surface) -> Classification {
        let attributes = self.attributes.get(surface.attributes());
        let bound = self.surface_bound(surface);

        if bound.has_nan() {
            return self.eye_split(surface, "non-finite bound");
        }
        if bound.is_empty() {
            return Classification::Cull(CullReason::Empty);
        }
        if bound.z.max < self.camera.near() || bound.z.min > self.camera.far() {
            return Classification::Cull(CullReason::OutsideClip);
        }
        if !bound.is_finite() {
            return self.eye_split(surface, "unbounded");
        }
        if bound.z.min < self.camera.near() {
            return self.eye_split(surface, "crosses the hither plane");
        }
        let Some(raster) = self.camera.raster_bound(&bound) else {
            return self.eye_split(surface, "cannot be projected");
        };
        if !raster.intersects_xy(&self.region) {
            return Classification::Cull(CullReason::OutsideRegion);
        }

        let lengths = surface.projected_lengths(self.camera);
        match lengths.and_then(|l| self.dice_size(surface, attributes, l)) {
            Some(size) => Classification::Dice(size),
            None => self.split(surface, lengths),
        }
    }

    /// Grid resolution for the projected edge lengths, or `None` when the
    /// grid would exceed the size limit.
    pub fn dice_size(&self, surface: &Surface, attributes: &Attributes, lengths: Vec2) -> Option<DiceSize> {
        let side = attributes.effective_shading_rate(self.options).sqrt();
        let mut cells = (lengths / side).ceil().max(Vec2::ONE);
        if surface.square_dicing() {
            cells = Vec2::splat(cells.max_element());
        }
        if !cells.is_finite() {
            return None;
        }

        let limit = self.options.max_grid_size as f64;
        if cells.x as f64 * cells.y as f64 > limit {
            return None;
        }
        let mut size = DiceSize::new(cells.x as u32, cells.y as u32);
        if attributes.effective_binary_dicing(self.options) {
            size = DiceSize::new(size.u.next_power_of_two(), size.v.next_power_of_two());
            if size.cells() as f64 > limit {
                return None;
            }
        }
        Some(size)
    }

    fn eye_split(&self, surface: &Surface, why: &str) -> Classification {
        if surface.eye_splits() >= self.options.max_eye_splits {
            log::debug!(
                "Discarding {} surface ({}): eye-split limit {} reached",
                surface.kind().name(),
                why,
                self.options.max_eye_splits
            );
            return Classification::Discard(DiscardReason::EyeSplitLimit);
        }
        Classification::Split(surface.eye_split())
    }

    fn split(&self, surface: &Surface, lengths: Option<Vec2>) -> Classification {
        if surface.split_depth() >= self.options.max_split_depth {
            log::debug!(
                "Discarding {} surface: split depth limit {} reached",
                surface.kind().name(),
                self.options.max_split_depth
            );
            return Classification::Discard(DiscardReason::SplitDepthLimit);
        }
        Classification::Split(surface.split(split_axis(surface, lengths)))
    }

    /// Classify `surface` and all of its descendants, returning the
    /// diceable leaves. Uses an explicit stack, so deep split chains never
    /// grow the call stack.
    pub fn resolve(&self, surface: Surface, stats: &mut RenderStats) -> Vec<(Surface, DiceSize)> {
        let mut pending = vec![surface];
        let mut leaves = Vec::new();
        while let Some(surface) = pending.pop() {
            let result = self.classify(&surface);
            result.record(&surface, stats);
            match result {
                Classification::Dice(size) => leaves.push((surface, size)),
                Classification::Split(children) => pending.extend(children),
                Classification::Cull(_) | Classification::Discard(_) => {}
            }
        }
        leaves
    }
}

/// Split across the larger projected extent. Near-ties, and surfaces with
/// no usable lengths, alternate with the previous split.
fn split_axis(surface: &Surface, lengths: Option<Vec2>) -> SplitAxis {
    let alternate = surface.last_split().map_or(SplitAxis::U, SplitAxis::other);
    match lengths {
        Some(l) if l.x > l.y * 1.05 => SplitAxis::U,
        Some(l) if l.y > l.x * 1.05 => SplitAxis::V,
        _ => alternate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::MicroPolygonGrid;
    use crate::surface::{BilinearPatch, Primitive, SurfaceKind, Triangle};
    use reyes_core::Projection;
    use reyes_math::Vec3;

    /// 16x16 orthographic view where camera (x, y) maps to raster (x, 16 - y).
    fn ortho_options() -> RenderOptions {
        let mut options = RenderOptions {
            width: 16,
            height: 16,
            ..Default::default()
        };
        options.filter.width = [1.0, 1.0];
        options.camera.projection = Projection::Orthographic;
        options.camera.screen_window = Some([0.0, 16.0, 0.0, 16.0]);
        options
    }

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32, z: f32) -> Surface {
        Surface::new(
            BilinearPatch::rectangle(Vec2::new(x0, y0), Vec2::new(x1, y1), z),
            Default::default(),
        )
    }

    /// Never diceable; splitting returns two copies of itself.
    #[derive(Debug, Clone)]
    struct Stubborn {
        bound: Bound,
    }

    impl Primitive for Stubborn {
        fn bound(&self) -> Bound {
            self.bound
        }
        fn projected_lengths(&self, _camera: &Camera) -> Option<Vec2> {
            None
        }
        fn split(&self, _axis: SplitAxis) -> Vec<SurfaceKind> {
            vec![
                SurfaceKind::External(Box::new(self.clone())),
                SurfaceKind::External(Box::new(self.clone())),
            ]
        }
        fn dice(&self, _size: DiceSize) -> Option<MicroPolygonGrid> {
            None
        }
    }

    #[test]
    fn test_small_patch_dices() {
        let options = ortho_options();
        let camera = Camera::from_options(&options);
        let store = AttributeStore::new();
        let scheduler = Scheduler::new(&camera, &options, &store);

        match scheduler.classify(&rect(2.0, 2.0, 6.0, 4.0, 1.0)) {
            Classification::Dice(size) => assert_eq!(size, DiceSize::new(4, 2)),
            other => panic!("expected dice, got {other:?}"),
        }
    }

    #[test]
    fn test_shading_rate_scales_resolution() {
        let options = ortho_options();
        let camera = Camera::from_options(&options);
        let mut store = AttributeStore::new();
        let coarse = store.insert(Attributes::default().with_shading_rate(4.0));
        let scheduler = Scheduler::new(&camera, &options, &store);

        let surface = Surface::new(
            BilinearPatch::rectangle(Vec2::new(0.0, 0.0), Vec2::new(8.0, 8.0), 1.0),
            coarse,
        );
        match scheduler.classify(&surface) {
            Classification::Dice(size) => assert_eq!(size, DiceSize::new(4, 4)),
            other => panic!("expected dice, got {other:?}"),
        }
    }

    #[test]
    fn test_binary_dicing_snaps_to_power_of_two() {
        let mut options = ortho_options();
        options.binary_dicing = true;
        let camera = Camera::from_options(&options);
        let store = AttributeStore::new();
        let scheduler = Scheduler::new(&camera, &options, &store);

        match scheduler.classify(&rect(0.0, 0.0, 3.0, 5.0, 1.0)) {
            Classification::Dice(size) => assert_eq!(size, DiceSize::new(4, 8)),
            other => panic!("expected dice, got {other:?}"),
        }
    }

    #[test]
    fn test_oversize_grid_splits_along_longer_axis() {
        let mut options = ortho_options();
        options.max_grid_size = 16;
        let camera = Camera::from_options(&options);
        let store = AttributeStore::new();
        let scheduler = Scheduler::new(&camera, &options, &store);

        let surface = rect(0.0, 0.0, 16.0, 4.0, 1.0);
        let Classification::Split(children) = scheduler.classify(&surface) else {
            panic!("expected split");
        };
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|c| c.last_split() == Some(SplitAxis::U)));

        // Children shrink in raster
        let parent = scheduler.raster_bound(&surface).unwrap();
        for child in &children {
            let child_raster = scheduler.raster_bound(child).unwrap();
            assert!(child_raster.x.size() < parent.x.size());
        }
    }

    #[test]
    fn test_cull_cases() {
        let options = ortho_options();
        let camera = Camera::from_options(&options);
        let store = AttributeStore::new();
        let scheduler = Scheduler::new(&camera, &options, &store);

        assert!(matches!(
            scheduler.classify(&rect(2.0, 2.0, 4.0, 4.0, -3.0)),
            Classification::Cull(CullReason::OutsideClip)
        ));
        assert!(matches!(
            scheduler.classify(&rect(40.0, 2.0, 44.0, 4.0, 1.0)),
            Classification::Cull(CullReason::OutsideRegion)
        ));
    }

    #[test]
    fn test_crop_window_culls() {
        let mut options = ortho_options();
        options.crop_window.x_max = 0.5;
        let camera = Camera::from_options(&options);
        let store = AttributeStore::new();
        let scheduler = Scheduler::new(&camera, &options, &store);

        assert!(matches!(
            scheduler.classify(&rect(10.0, 2.0, 12.0, 4.0, 1.0)),
            Classification::Cull(CullReason::OutsideRegion)
        ));
        assert!(matches!(
            scheduler.classify(&rect(2.0, 2.0, 4.0, 4.0, 1.0)),
            Classification::Dice(_)
        ));
    }

    #[test]
    fn test_hither_crossing_eye_splits() {
        let options = RenderOptions {
            width: 32,
            height: 32,
            ..Default::default()
        };
        let camera = Camera::from_options(&options);
        let store = AttributeStore::new();
        let scheduler = Scheduler::new(&camera, &options, &store);

        // A floor running from behind the camera out to z = 10
        let floor = Surface::new(
            BilinearPatch::new(
                Vec3::new(-1.0, -1.0, -2.0),
                Vec3::new(1.0, -1.0, -2.0),
                Vec3::new(-1.0, -1.0, 10.0),
                Vec3::new(1.0, -1.0, 10.0),
            ),
            store.default_id(),
        );
        let Classification::Split(children) = scheduler.classify(&floor) else {
            panic!("expected eye split");
        };
        assert_eq!(children.len(), 4);
        assert!(children.iter().all(|c| c.eye_splits() == 1));

        let mut stats = RenderStats::default();
        let leaves = scheduler.resolve(floor, &mut stats);
        assert!(!leaves.is_empty());
        assert!(stats.eye_splits > 0);
        for (leaf, _) in &leaves {
            assert!(leaf.bound().z.min >= camera.near());
        }
    }

    #[test]
    fn test_eye_split_budget_terminates() {
        let mut options = RenderOptions::default();
        options.max_eye_splits = 2;
        let camera = Camera::from_options(&options);
        let store = AttributeStore::new();
        let scheduler = Scheduler::new(&camera, &options, &store);

        let nan = Stubborn {
            bound: Bound::from_points(Vec3::new(f32::NAN, 0.0, 1.0), Vec3::ONE),
        };
        let mut stats = RenderStats::default();
        let leaves = scheduler.resolve(
            Surface::new(SurfaceKind::External(Box::new(nan)), store.default_id()),
            &mut stats,
        );

        assert!(leaves.is_empty());
        // Two levels of four-way splits, then every leaf is discarded
        assert_eq!(stats.eye_splits, 1 + 4);
        assert_eq!(stats.surfaces_discarded, 16);
    }

    #[test]
    fn test_never_diceable_terminates_by_split_depth() {
        let mut options = ortho_options();
        options.max_split_depth = 5;
        let camera = Camera::from_options(&options);
        let store = AttributeStore::new();
        let scheduler = Scheduler::new(&camera, &options, &store);

        let stubborn = Stubborn {
            bound: Bound::from_points(Vec3::new(1.0, 1.0, 1.0), Vec3::new(3.0, 3.0, 1.0)),
        };
        let mut stats = RenderStats::default();
        let leaves = scheduler.resolve(
            Surface::new(SurfaceKind::External(Box::new(stubborn)), store.default_id()),
            &mut stats,
        );
        assert!(leaves.is_empty());
        assert_eq!(stats.surfaces_discarded, 32);
        assert_eq!(stats.splits, 31);
    }

    #[test]
    fn test_split_axis_alternates_on_ties() {
        let surface = rect(0.0, 0.0, 4.0, 4.0, 1.0);
        assert_eq!(split_axis(&surface, None), SplitAxis::U);
        assert_eq!(split_axis(&surface, Some(Vec2::new(1.0, 8.0))), SplitAxis::V);

        let child = surface.split(SplitAxis::U).remove(0);
        assert_eq!(split_axis(&child, Some(Vec2::splat(4.0))), SplitAxis::V);
    }

    #[test]
    fn test_triangles_dice_square() {
        let options = ortho_options();
        let camera = Camera::from_options(&options);
        let store = AttributeStore::new();
        let scheduler = Scheduler::new(&camera, &options, &store);

        let triangle = Surface::new(
            Triangle::new(
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(4.0, 0.0, 1.0),
                Vec3::new(0.0, 2.0, 1.0),
            ),
            store.default_id(),
        );
        let Classification::Dice(size) = scheduler.classify(&triangle) else {
            panic!("expected dice");
        };
        assert_eq!(size.u, size.v);
    }

    #[test]
    fn test_displacement_bound_grows_surface_bound() {
        let options = ortho_options();
        let camera = Camera::from_options(&options);
        let mut store = AttributeStore::new();
        let bumpy = store.insert(Attributes::default().with_displacement_bound(0.5));
        let scheduler = Scheduler::new(&camera, &options, &store);

        let surface = Surface::new(
            BilinearPatch::rectangle(Vec2::new(2.0, 2.0), Vec2::new(4.0, 4.0), 1.0),
            bumpy,
        );
        assert_eq!(scheduler.surface_bound(&surface).x, Interval::new(1.5, 4.5));
    }
}
