// Re-export glam for convenience
pub use glam::*;

mod bound;
mod interval;
mod transform;

pub use bound::Bound;
pub use interval::Interval;
pub use transform::Mat4Ext;

/// RGB colour (or opacity) triple, typically in 0-1.
pub type Color = Vec3;

/// Linear interpolation between two values of any vector-like type.
#[inline]
pub fn lerp<T>(a: T, b: T, t: f32) -> T
where
    T: std::ops::Mul<f32, Output = T> + std::ops::Add<Output = T>,
{
    a * (1.0 - t) + b * t
}
