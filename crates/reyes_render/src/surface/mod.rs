//! Renderable primitives.
//!
//! Every primitive kind implements [`Primitive`]; [`SurfaceKind`] is the
//! closed set the pipeline knows about, with [`SurfaceKind::External`] for
//! tessellators living in other crates. A [`Surface`] pairs a primitive
//! with its attribute handle and the split bookkeeping the scheduler
//! needs to guarantee termination.

mod patch;
mod procedural;
mod triangle;

use std::fmt;

use reyes_core::AttributesId;
use reyes_math::{Bound, Vec2};

use crate::camera::Camera;
use crate::grid::MicroPolygonGrid;

pub use patch::BilinearPatch;
pub use procedural::{Generator, Procedural};
pub use triangle::{fan_polygon, Triangle};

/// Parametric direction of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitAxis {
    U,
    V,
}

impl SplitAxis {
    pub fn other(self) -> Self {
        match self {
            SplitAxis::U => SplitAxis::V,
            SplitAxis::V => SplitAxis::U,
        }
    }
}

/// Grid resolution in cells (micropolygons) along u and v.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceSize {
    pub u: u32,
    pub v: u32,
}

impl DiceSize {
    pub fn new(u: u32, v: u32) -> Self {
        Self { u, v }
    }

    pub fn cells(&self) -> u64 {
        self.u as u64 * self.v as u64
    }
}

/// Capability contract shared by every primitive kind.
pub trait Primitive: Send + Sync + fmt::Debug {
    /// Camera-space bound over every motion key.
    fn bound(&self) -> Bound;

    /// Longest raster-space length of the u and v parametric edges over
    /// every motion key. `None` when the primitive cannot be projected.
    fn projected_lengths(&self, camera: &Camera) -> Option<Vec2>;

    /// Subdivide along `axis`. Children together cover the parent.
    fn split(&self, axis: SplitAxis) -> Vec<SurfaceKind>;

    /// Produce a grid of `size` cells, or `None` if this kind never dices.
    fn dice(&self, size: DiceSize) -> Option<MicroPolygonGrid>;

    /// Primitives that need the same resolution along u and v.
    fn square_dicing(&self) -> bool {
        false
    }
}

/// The primitive kinds the pipeline can render.
#[derive(Debug)]
pub enum SurfaceKind {
    Patch(BilinearPatch),
    Triangle(Triangle),
    Procedural(Procedural),
    External(Box<dyn Primitive>),
}

impl SurfaceKind {
    pub fn primitive(&self) -> &dyn Primitive {
        match self {
            SurfaceKind::Patch(p) => p,
            SurfaceKind::Triangle(t) => t,
            SurfaceKind::Procedural(p) => p,
            SurfaceKind::External(p) => p.as_ref(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SurfaceKind::Patch(_) => "patch",
            SurfaceKind::Triangle(_) => "triangle",
            SurfaceKind::Procedural(_) => "procedural",
            SurfaceKind::External(_) => "external",
        }
    }
}

impl From<BilinearPatch> for SurfaceKind {
    fn from(patch: BilinearPatch) -> Self {
        SurfaceKind::Patch(patch)
    }
}

impl From<Triangle> for SurfaceKind {
    fn from(triangle: Triangle) -> Self {
        SurfaceKind::Triangle(triangle)
    }
}

impl From<Procedural> for SurfaceKind {
    fn from(procedural: Procedural) -> Self {
        SurfaceKind::Procedural(procedural)
    }
}

impl From<Box<dyn Primitive>> for SurfaceKind {
    fn from(primitive: Box<dyn Primitive>) -> Self {
        SurfaceKind::External(primitive)
    }
}

/// A primitive posted to the pipeline, plus split lineage.
///
/// Every surface split from another shares its attribute handle.
#[derive(Debug)]
pub struct Surface {
    kind: SurfaceKind,
    attributes: AttributesId,
    eye_splits: u32,
    split_depth: u32,
    last_split: Option<SplitAxis>,
}

impl Surface {
    pub fn new(kind: impl Into<SurfaceKind>, attributes: AttributesId) -> Self {
        Self {
            kind: kind.into(),
            attributes,
            eye_splits: 0,
            split_depth: 0,
            last_split: None,
        }
    }

    pub fn kind(&self) -> &SurfaceKind {
        &self.kind
    }

    pub fn attributes(&self) -> AttributesId {
        self.attributes
    }

    /// Forced hither-plane splits taken along this lineage.
    pub fn eye_splits(&self) -> u32 {
        self.eye_splits
    }

    /// Ordinary splits taken along this lineage.
    pub fn split_depth(&self) -> u32 {
        self.split_depth
    }

    pub fn last_split(&self) -> Option<SplitAxis> {
        self.last_split
    }

    pub fn bound(&self) -> Bound {
        self.kind.primitive().bound()
    }

    pub fn projected_lengths(&self, camera: &Camera) -> Option<Vec2> {
        self.kind.primitive().projected_lengths(camera)
    }

    pub fn square_dicing(&self) -> bool {
        self.kind.primitive().square_dicing()
    }

    fn child(&self, kind: SurfaceKind, eye_splits: u32, split_depth: u32, axis: Option<SplitAxis>) -> Surface {
        Surface {
            kind,
            attributes: self.attributes,
            eye_splits,
            split_depth,
            last_split: axis.or(self.last_split),
        }
    }

    /// Ordinary split along `axis`.
    pub fn split(&self, axis: SplitAxis) -> Vec<Surface> {
        self.kind
            .primitive()
            .split(axis)
            .into_iter()
            .map(|kind| self.child(kind, self.eye_splits, self.split_depth + 1, Some(axis)))
            .collect()
    }

    /// Forced split along both axes for a surface straddling the hither
    /// plane. Consumes one unit of the eye-split budget.
    pub fn eye_split(&self) -> Vec<Surface> {
        let eye_splits = self.eye_splits + 1;
        let pieces = match &self.kind {
            SurfaceKind::Procedural(p) => p.expand(),
            kind => kind
                .primitive()
                .split(SplitAxis::U)
                .into_iter()
                .flat_map(|half| half.primitive().split(SplitAxis::V))
                .collect(),
        };
        pieces
            .into_iter()
            .map(|kind| self.child(kind, eye_splits, self.split_depth, None))
            .collect()
    }

    /// Dice into a grid tagged with this surface's attributes.
    pub fn dice(&self, size: DiceSize) -> Option<MicroPolygonGrid> {
        self.kind
            .primitive()
            .dice(size)
            .map(|grid| grid.with_attributes(self.attributes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reyes_core::AttributeStore;
    use reyes_math::Vec3;

    fn square() -> BilinearPatch {
        BilinearPatch::new(
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(2.0, 0.0, 1.0),
            Vec3::new(0.0, 2.0, 1.0),
            Vec3::new(2.0, 2.0, 1.0),
        )
    }

    #[test]
    fn test_split_tracks_lineage() {
        let store = AttributeStore::new();
        let surface = Surface::new(square(), store.default_id());

        let children = surface.split(SplitAxis::U);
        assert_eq!(children.len(), 2);
        for child in &children {
            assert_eq!(child.split_depth(), 1);
            assert_eq!(child.eye_splits(), 0);
            assert_eq!(child.last_split(), Some(SplitAxis::U));
            assert_eq!(child.attributes(), surface.attributes());
        }
    }

    #[test]
    fn test_eye_split_quarters() {
        let store = AttributeStore::new();
        let surface = Surface::new(square(), store.default_id());
        let children = surface.eye_split();

        assert_eq!(children.len(), 4);
        assert!(children.iter().all(|c| c.eye_splits() == 1 && c.split_depth() == 0));

        let mut union = Bound::EMPTY;
        for child in &children {
            union.include(&child.bound());
        }
        assert_eq!(union, surface.bound());
    }

    #[test]
    fn test_dice_tags_attributes() {
        let mut store = AttributeStore::new();
        let id = store.insert(reyes_core::Attributes::default().with_matte(true));
        let surface = Surface::new(square(), id);
        let grid = surface.dice(DiceSize::new(2, 3)).unwrap();
        assert_eq!(grid.attributes(), id);
        assert_eq!(grid.u_cells(), 2);
        assert_eq!(grid.v_cells(), 3);
    }
}
