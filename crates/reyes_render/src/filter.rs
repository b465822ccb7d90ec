//! Pixel reconstruction filters.

use std::f32::consts::PI;

use reyes_core::{FilterKind, FilterOptions};
use reyes_math::Vec2;

/// A filter kernel with separate x and y widths (in pixels).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelFilter {
    kind: FilterKind,
    width: Vec2,
}

#[inline]
fn sinc(x: f32) -> f32 {
    if x.abs() < 1.0e-6 {
        1.0
    } else {
        let px = PI * x;
        px.sin() / px
    }
}

#[inline]
fn catmull_rom(t: f32) -> f32 {
    let t = t.abs();
    if t < 1.0 {
        1.5 * t * t * t - 2.5 * t * t + 1.0
    } else if t < 2.0 {
        -0.5 * t * t * t + 2.5 * t * t - 4.0 * t + 2.0
    } else {
        0.0
    }
}

impl PixelFilter {
    pub fn new(kind: FilterKind, width: Vec2) -> Self {
        Self { kind, width }
    }

    pub fn from_options(options: &FilterOptions) -> Self {
        Self::new(options.kind, Vec2::from(options.width))
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Half width: the support extends this far from a pixel centre.
    pub fn radius(&self) -> Vec2 {
        self.width * 0.5
    }

    /// Extra pixels sampled around each bucket so every pixel's filter
    /// support is covered.
    pub fn border(&self) -> [u32; 2] {
        let border = |w: f32| (w * 0.5 - 0.5).ceil().max(0.0) as u32;
        [border(self.width.x), border(self.width.y)]
    }

    /// Weight of a sample `(dx, dy)` pixels away from the pixel centre.
    pub fn weight(&self, dx: f32, dy: f32) -> f32 {
        let r = self.radius();
        if dx.abs() > r.x || dy.abs() > r.y {
            return 0.0;
        }
        // Offsets scaled so the support edge is at 1
        let (nx, ny) = (dx / r.x, dy / r.y);
        match self.kind {
            FilterKind::Box => 1.0,
            FilterKind::Triangle => (1.0 - nx.abs()) * (1.0 - ny.abs()),
            FilterKind::CatmullRom => catmull_rom(2.0 * nx) * catmull_rom(2.0 * ny),
            FilterKind::Gaussian => (-2.0 * (nx * nx + ny * ny)).exp(),
            FilterKind::Sinc => sinc(dx) * sinc(nx) * sinc(dy) * sinc(ny),
            FilterKind::Disk => {
                if nx * nx + ny * ny <= 1.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_border_from_width() {
        let border = |w: f32| PixelFilter::new(FilterKind::Box, Vec2::splat(w)).border()[0];
        assert_eq!(border(1.0), 0);
        assert_eq!(border(2.0), 1);
        assert_eq!(border(3.0), 1);
        assert_eq!(border(4.0), 2);
    }

    #[test]
    fn test_support_is_zero_outside() {
        for kind in [
            FilterKind::Box,
            FilterKind::Triangle,
            FilterKind::CatmullRom,
            FilterKind::Gaussian,
            FilterKind::Sinc,
            FilterKind::Disk,
        ] {
            let filter = PixelFilter::new(kind, Vec2::new(2.0, 4.0));
            assert_eq!(filter.weight(1.1, 0.0), 0.0, "{kind:?}");
            assert_eq!(filter.weight(0.0, 2.1), 0.0, "{kind:?}");
            assert!(filter.weight(0.0, 0.0) > 0.99, "{kind:?}");
        }
    }

    #[test]
    fn test_kernel_shapes() {
        let triangle = PixelFilter::new(FilterKind::Triangle, Vec2::splat(2.0));
        assert!((triangle.weight(0.5, 0.0) - 0.5).abs() < 1e-6);

        let gaussian = PixelFilter::new(FilterKind::Gaussian, Vec2::splat(2.0));
        assert!(gaussian.weight(0.25, 0.0) > gaussian.weight(0.5, 0.0));

        let disk = PixelFilter::new(FilterKind::Disk, Vec2::splat(2.0));
        assert_eq!(disk.weight(0.9, 0.9), 0.0);
        assert_eq!(disk.weight(0.5, 0.5), 1.0);

        let catmull = PixelFilter::new(FilterKind::CatmullRom, Vec2::splat(4.0));
        assert!(catmull.weight(1.5, 0.0) < 0.0);
        assert!(catmull.weight(1.0, 0.0).abs() < 1e-6);
    }
}
