//! Camera-to-raster projection and thin-lens depth of field.
//!
//! Camera space looks down +z. Raster space has x to the right and y
//! down in pixel units; raster z keeps the camera-space depth so depth
//! comparisons stay linear.

use reyes_core::{Projection, RenderOptions};
use reyes_math::{Bound, Interval, Vec2, Vec3};

/// Depth below which a perspective projection is undefined.
pub const EYE_EPSILON: f32 = 1.0e-4;

/// Thin lens derived from fstop / focal length / focal distance.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Lens {
    radius: f32,
    focal_distance: f32,
}

/// Projection provider for the pipeline.
#[derive(Debug, Clone)]
pub struct Camera {
    pub image_width: u32,
    pub image_height: u32,

    perspective: bool,
    near: f32,
    far: f32,
    shutter: Interval,

    // Screen window
    left: f32,
    top: f32,

    // Cached computed values
    /// 1 / tan(fov / 2) for perspective, 1 for orthographic
    screen_scale: f32,
    /// Raster pixels per screen unit in x and y
    raster_scale: Vec2,
    lens: Option<Lens>,
}

impl Camera {
    /// Build the camera described by the render options.
    pub fn from_options(options: &RenderOptions) -> Self {
        let [left, right, bottom, top] = options.screen_window();
        let (perspective, screen_scale) = match options.camera.projection {
            Projection::Perspective { fov } => (true, 1.0 / (fov.to_radians() * 0.5).tan()),
            Projection::Orthographic => (false, 1.0),
        };

        let lens = match options.camera.depth_of_field {
            Some(dof) if perspective => Some(Lens {
                radius: 0.5 * dof.focal_length / dof.fstop,
                focal_distance: dof.focal_distance,
            }),
            Some(_) => {
                log::warn!("Depth of field ignored for orthographic projection");
                None
            }
            None => None,
        };

        Self {
            image_width: options.width,
            image_height: options.height,
            perspective,
            near: options.camera.near,
            far: options.camera.far,
            shutter: options.shutter_interval(),
            left,
            top,
            screen_scale,
            raster_scale: Vec2::new(
                options.width as f32 / (right - left),
                options.height as f32 / (top - bottom),
            ),
            lens,
        }
    }

    /// Hither clipping depth.
    pub fn near(&self) -> f32 {
        self.near
    }

    /// Yon clipping depth.
    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn shutter(&self) -> Interval {
        self.shutter
    }

    pub fn is_perspective(&self) -> bool {
        self.perspective
    }

    pub fn has_depth_of_field(&self) -> bool {
        self.lens.is_some()
    }

    /// Project a camera-space point to raster space.
    ///
    /// The result is meaningless for perspective cameras when `p.z` is at
    /// or behind the eye; callers check depth first.
    #[inline]
    pub fn to_raster(&self, p: Vec3) -> Vec3 {
        let (sx, sy) = if self.perspective {
            let inv_z = 1.0 / p.z;
            (p.x * self.screen_scale * inv_z, p.y * self.screen_scale * inv_z)
        } else {
            (p.x, p.y)
        };
        Vec3::new(
            (sx - self.left) * self.raster_scale.x,
            (self.top - sy) * self.raster_scale.y,
            p.z,
        )
    }

    /// Raster x/y of a camera-space point, or `None` when it cannot be
    /// projected (non-finite, or at/behind the eye for perspective).
    #[inline]
    pub fn project_xy(&self, p: Vec3) -> Option<Vec2> {
        if !p.is_finite() || (self.perspective && p.z <= EYE_EPSILON) {
            return None;
        }
        Some(self.to_raster(p).truncate())
    }

    /// Raster-space bound of a camera-space bound, expanded by the
    /// largest circle of confusion over its depth range.
    ///
    /// Returns `None` when the bound cannot be projected: it is empty or
    /// not finite, or (for perspective) it reaches the eye plane.
    pub fn raster_bound(&self, bound: &Bound) -> Option<Bound> {
        if bound.is_empty() || !bound.is_finite() {
            return None;
        }
        if self.perspective && bound.z.min <= EYE_EPSILON {
            return None;
        }
        let mut raster = Bound::enclosing(bound.corners().iter().map(|&c| self.to_raster(c)));
        raster.z = bound.z;
        let coc = self.max_coc(bound.z);
        Some(raster.pad_xy(coc.x, coc.y))
    }

    /// Circle-of-confusion radius in raster units at a depth.
    ///
    /// Zero when depth of field is off. A lens offset `l` on the unit disk
    /// displaces the image of a point at `depth` by `l * coc(depth)`.
    #[inline]
    pub fn coc(&self, depth: f32) -> Vec2 {
        match self.lens {
            Some(lens) if depth > EYE_EPSILON => {
                let k = self.screen_scale
                    * lens.radius
                    * (1.0 / lens.focal_distance - 1.0 / depth).abs();
                self.raster_scale * k
            }
            Some(_) => Vec2::splat(f32::INFINITY),
            None => Vec2::ZERO,
        }
    }

    /// Largest circle of confusion over a depth range.
    pub fn max_coc(&self, depth: Interval) -> Vec2 {
        if self.lens.is_none() {
            return Vec2::ZERO;
        }
        self.coc(depth.min).max(self.coc(depth.max))
    }

    /// Signed raster offset of the image of a point at `depth` seen
    /// through lens position `lens` (unit disk).
    #[inline]
    pub fn lens_offset(&self, lens: Vec2, depth: f32) -> Vec2 {
        match self.lens {
            Some(l) => {
                let k = self.screen_scale * l.radius * (1.0 / l.focal_distance - 1.0 / depth);
                // Screen y points up, raster y points down
                Vec2::new(lens.x * k * self.raster_scale.x, -lens.y * k * self.raster_scale.y)
            }
            None => Vec2::ZERO,
        }
    }
}
