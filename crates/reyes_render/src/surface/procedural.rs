//! Deferred geometry.
//!
//! A procedural declares an object-space bound up front and only builds
//! its surfaces when the scheduler first tries to split it, which happens
//! once the bucket it lands in becomes current.

use std::fmt;
use std::sync::Arc;

use reyes_math::{Bound, Mat4, Mat4Ext, Vec2};

use super::{DiceSize, Primitive, SplitAxis, SurfaceKind};
use crate::camera::Camera;
use crate::grid::MicroPolygonGrid;

/// Builds camera-space surfaces on demand.
pub trait Generator: Send + Sync + fmt::Debug {
    /// Produce surfaces, applying `object_to_camera` to object-space
    /// geometry.
    fn generate(&self, object_to_camera: &Mat4) -> Vec<SurfaceKind>;
}

/// A primitive expanded lazily by a [`Generator`].
#[derive(Debug, Clone)]
pub struct Procedural {
    object_bound: Bound,
    object_to_camera: Mat4,
    generator: Arc<dyn Generator>,
}

impl Procedural {
    pub fn new(object_bound: Bound, object_to_camera: Mat4, generator: Arc<dyn Generator>) -> Self {
        Self {
            object_bound,
            object_to_camera,
            generator,
        }
    }

    pub fn expand(&self) -> Vec<SurfaceKind> {
        let surfaces = self.generator.generate(&self.object_to_camera);
        log::trace!("Procedural expanded into {} surfaces", surfaces.len());
        surfaces
    }
}

impl Primitive for Procedural {
    fn bound(&self) -> Bound {
        self.object_to_camera.transform_bound(&self.object_bound)
    }

    /// Never diceable: the first split expands it.
    fn projected_lengths(&self, _camera: &Camera) -> Option<Vec2> {
        None
    }

    fn split(&self, _axis: SplitAxis) -> Vec<SurfaceKind> {
        self.expand()
    }

    fn dice(&self, _size: DiceSize) -> Option<MicroPolygonGrid> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::BilinearPatch;
    use reyes_math::{Interval, Vec3};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingSquare {
        calls: AtomicUsize,
    }

    impl Generator for CountingSquare {
        fn generate(&self, object_to_camera: &Mat4) -> Vec<SurfaceKind> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let p = |x: f32, y: f32| object_to_camera.transform_point3(Vec3::new(x, y, 0.0));
            vec![BilinearPatch::new(p(0.0, 0.0), p(1.0, 0.0), p(0.0, 1.0), p(1.0, 1.0)).into()]
        }
    }

    #[test]
    fn test_bound_is_transformed() {
        let procedural = Procedural::new(
            Bound::from_points(Vec3::ZERO, Vec3::ONE),
            Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0)),
            Arc::new(CountingSquare::default()),
        );
        assert_eq!(procedural.bound().z, Interval::new(5.0, 6.0));
    }

    #[test]
    fn test_split_expands_generator() {
        let generator = Arc::new(CountingSquare::default());
        let procedural = Procedural::new(
            Bound::from_points(Vec3::ZERO, Vec3::ONE),
            Mat4::from_translation(Vec3::new(0.0, 0.0, 2.0)),
            generator.clone(),
        );
        let camera = Camera::from_options(&reyes_core::RenderOptions::default());

        assert!(procedural.projected_lengths(&camera).is_none());
        assert!(procedural.dice(DiceSize::new(1, 1)).is_none());

        let children = procedural.split(SplitAxis::U);
        assert_eq!(children.len(), 1);
        assert_eq!(generator.calls.load(Ordering::Relaxed), 1);
        assert!(procedural.bound().contains_bound(&children[0].primitive().bound()));
    }
}
