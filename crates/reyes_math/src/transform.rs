// Transform utilities for Mat4
//
// Extends glam::Mat4 with bound-aware helpers used when moving
// geometry from object space into camera space.

use crate::Bound;
use glam::{Mat4, Vec3};

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Transform an axis-aligned bound.
    /// Computes the bound of all 8 transformed corners.
    fn transform_bound(&self, bound: &Bound) -> Bound;

    /// Transform a slice of points in place.
    fn transform_points(&self, points: &mut [Vec3]);
}

impl Mat4Ext for Mat4 {
    fn transform_bound(&self, bound: &Bound) -> Bound {
        if bound.is_empty() {
            return *bound;
        }
        Bound::enclosing(
            bound
                .corners()
                .iter()
                .map(|&corner| self.transform_point3(corner)),
        )
    }

    fn transform_points(&self, points: &mut [Vec3]) {
        for p in points {
            *p = self.transform_point3(*p);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_bound_identity() {
        let bound = Bound::from_points(Vec3::ZERO, Vec3::ONE);
        let transformed = Mat4::IDENTITY.transform_bound(&bound);

        assert!((transformed.min() - bound.min()).length() < 0.001);
        assert!((transformed.max() - bound.max()).length() < 0.001);
    }

    #[test]
    fn test_transform_bound_translation() {
        let mat = Mat4::from_translation(Vec3::new(5.0, 5.0, 5.0));
        let bound = Bound::from_points(Vec3::ZERO, Vec3::ONE);
        let transformed = mat.transform_bound(&bound);

        assert!((transformed.min() - Vec3::splat(5.0)).length() < 0.001);
        assert!((transformed.max() - Vec3::splat(6.0)).length() < 0.001);
    }

    #[test]
    fn test_transform_bound_rotation_grows() {
        use std::f32::consts::PI;

        // A unit box rotated 45 degrees about Z covers a wider footprint
        let mat = Mat4::from_rotation_z(PI / 4.0);
        let bound = Bound::from_points(Vec3::splat(-0.5), Vec3::splat(0.5));
        let transformed = mat.transform_bound(&bound);

        assert!(transformed.x.size() > 1.4);
        assert!(transformed.contains_bound(&Bound::from_points(
            Vec3::new(-0.5, -0.5, -0.5),
            Vec3::new(0.5, 0.5, 0.5)
        )));
    }

    #[test]
    fn test_transform_bound_empty_stays_empty() {
        let transformed = Mat4::from_scale(Vec3::splat(2.0)).transform_bound(&Bound::EMPTY);
        assert!(transformed.is_empty());
    }

    #[test]
    fn test_transform_points() {
        let mat = Mat4::from_translation(Vec3::new(0.0, 0.0, 10.0));
        let mut points = [Vec3::ZERO, Vec3::X];
        mat.transform_points(&mut points);
        assert_eq!(points, [Vec3::new(0.0, 0.0, 10.0), Vec3::new(1.0, 0.0, 10.0)]);
    }
}
