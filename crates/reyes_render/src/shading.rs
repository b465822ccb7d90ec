//! Shading collaborators.
//!
//! The pipeline calls [`ShadingExecution::shade`] once per diced grid.
//! A shader fills the grid's output colour (Ci) and opacity (Oi), may add
//! custom channels, and may displace positions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use reyes_core::Attributes;
use reyes_math::{Color, Vec3};

use crate::camera::Camera;
use crate::grid::MicroPolygonGrid;

/// Populates a grid's shading channels in place.
pub trait ShadingExecution: Send + Sync {
    fn shade(&self, grid: &mut MicroPolygonGrid, attributes: &Attributes, camera: &Camera);
}

/// Per-vertex Cs and Os: the grid's varying values when present,
/// otherwise the attribute constants.
fn inputs(grid: &MicroPolygonGrid, attributes: &Attributes) -> (Vec<Color>, Vec<Color>) {
    let n = grid.vertex_count();
    let cs = grid
        .colors()
        .map(<[Color]>::to_vec)
        .unwrap_or_else(|| vec![attributes.color; n]);
    let os = grid
        .opacities()
        .map(<[Color]>::to_vec)
        .unwrap_or_else(|| vec![attributes.opacity; n]);
    (cs, os)
}

/// `Ci = Os · Cs`, `Oi = Os`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantShading;

impl ShadingExecution for ConstantShading {
    fn shade(&self, grid: &mut MicroPolygonGrid, attributes: &Attributes, _camera: &Camera) {
        let (cs, os) = inputs(grid, attributes);
        for ((ci, cs), os) in grid.ci_mut().iter_mut().zip(&cs).zip(&os) {
            *ci = *os * *cs;
        }
        grid.oi_mut().copy_from_slice(&os);
    }
}

/// Colour scaled by how directly each point faces the eye.
#[derive(Debug, Clone, Copy)]
pub struct FacingShading {
    /// Minimum brightness of grazing points
    pub ambient: f32,
}

impl Default for FacingShading {
    fn default() -> Self {
        Self { ambient: 0.1 }
    }
}

impl ShadingExecution for FacingShading {
    fn shade(&self, grid: &mut MicroPolygonGrid, attributes: &Attributes, camera: &Camera) {
        let (cs, os) = inputs(grid, attributes);
        let normals = grid.ensure_normals().to_vec();
        let positions = grid.positions().to_vec();

        for (k, ci) in grid.ci_mut().iter_mut().enumerate() {
            let incident = if camera.is_perspective() {
                positions[k].normalize_or_zero()
            } else {
                Vec3::Z
            };
            let facing = normals[k].dot(incident).abs();
            let brightness = self.ambient + (1.0 - self.ambient) * facing;
            *ci = os[k] * cs[k] * brightness;
        }
        grid.oi_mut().copy_from_slice(&os);
    }
}

/// Displaces along the normal by a ripple in `s`, then runs `inner`.
/// The amplitude is clamped to the attribute displacement bound.
pub struct RippleDisplacement {
    pub amplitude: f32,
    pub frequency: f32,
    pub inner: Arc<dyn ShadingExecution>,
}

impl fmt::Debug for RippleDisplacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RippleDisplacement")
            .field("amplitude", &self.amplitude)
            .field("frequency", &self.frequency)
            .finish_non_exhaustive()
    }
}

impl ShadingExecution for RippleDisplacement {
    fn shade(&self, grid: &mut MicroPolygonGrid, attributes: &Attributes, camera: &Camera) {
        let amplitude = self.amplitude.clamp(0.0, attributes.displacement_bound);
        if amplitude > 0.0 {
            let st = grid.st().to_vec();
            let frequency = self.frequency * std::f32::consts::TAU;
            grid.displace(|k, p, n| p + n * amplitude * (st[k].x * frequency).sin());
        }
        self.inner.shade(grid, attributes, camera);
    }
}

/// Dispatches on `Attributes::surface_shader`, falling back to a default
/// shader for unnamed or unknown names.
pub struct ShaderTable {
    shaders: HashMap<String, Arc<dyn ShadingExecution>>,
    fallback: Arc<dyn ShadingExecution>,
}

impl fmt::Debug for ShaderTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.shaders.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ShaderTable").field("shaders", &names).finish_non_exhaustive()
    }
}

impl Default for ShaderTable {
    fn default() -> Self {
        Self::new(Arc::new(ConstantShading))
            .with_shader("constant", Arc::new(ConstantShading))
            .with_shader("facing", Arc::new(FacingShading::default()))
    }
}

impl ShaderTable {
    pub fn new(fallback: Arc<dyn ShadingExecution>) -> Self {
        Self {
            shaders: HashMap::new(),
            fallback,
        }
    }

    pub fn with_shader(mut self, name: impl Into<String>, shader: Arc<dyn ShadingExecution>) -> Self {
        self.shaders.insert(name.into(), shader);
        self
    }

    pub fn resolve(&self, name: Option<&str>) -> &dyn ShadingExecution {
        match name.and_then(|n| self.shaders.get(n)) {
            Some(shader) => shader.as_ref(),
            None => {
                if let Some(name) = name {
                    log::debug!("Unknown surface shader '{}', using fallback", name);
                }
                self.fallback.as_ref()
            }
        }
    }
}

impl ShadingExecution for ShaderTable {
    fn shade(&self, grid: &mut MicroPolygonGrid, attributes: &Attributes, camera: &Camera) {
        self.resolve(attributes.surface_shader.as_deref())
            .shade(grid, attributes, camera);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::MotionKeys;
    use reyes_core::{Projection, RenderOptions};

    fn camera(projection: Projection) -> Camera {
        let mut options = RenderOptions::default();
        options.camera.projection = projection;
        Camera::from_options(&options)
    }

    /// 2x2-cell grid in the plane z = depth, facing the camera.
    fn flat(depth: f32) -> MicroPolygonGrid {
        let mut points = Vec::new();
        for j in 0..3 {
            for i in 0..3 {
                points.push(Vec3::new(i as f32, j as f32, depth));
            }
        }
        MicroPolygonGrid::new(2, 2, MotionKeys::fixed(points))
    }

    #[test]
    fn test_constant_premultiplies() {
        let attributes = Attributes::default()
            .with_color(Color::new(1.0, 0.5, 0.0))
            .with_opacity(Color::splat(0.5));
        let mut grid = flat(1.0);
        ConstantShading.shade(&mut grid, &attributes, &camera(Projection::Orthographic));
        assert!(grid.ci().iter().all(|&c| c == Color::new(0.5, 0.25, 0.0)));
        assert!(grid.oi().iter().all(|&o| o == Color::splat(0.5)));
    }

    #[test]
    fn test_constant_uses_varying_colours() {
        let colors: Vec<Color> = (0..9).map(|k| Color::splat(k as f32 / 8.0)).collect();
        let mut grid = flat(1.0).with_colors(colors.clone());
        ConstantShading.shade(&mut grid, &Attributes::default(), &camera(Projection::Orthographic));
        assert_eq!(grid.ci(), colors.as_slice());
    }

    #[test]
    fn test_facing_full_brightness_head_on() {
        let mut grid = flat(1.0);
        let shader = FacingShading { ambient: 0.0 };
        shader.shade(&mut grid, &Attributes::default(), &camera(Projection::Orthographic));
        for ci in grid.ci() {
            assert!((*ci - Color::ONE).length() < 1e-5);
        }
    }

    #[test]
    fn test_ripple_respects_displacement_bound() {
        let shader = RippleDisplacement {
            amplitude: 2.0,
            frequency: 0.25,
            inner: Arc::new(ConstantShading),
        };
        let ortho = camera(Projection::Orthographic);

        let mut grid = flat(5.0);
        shader.shade(&mut grid, &Attributes::default(), &ortho);
        assert!(grid.positions().iter().all(|p| p.z == 5.0));

        let mut grid = flat(5.0);
        let attributes = Attributes::default().with_displacement_bound(0.5);
        shader.shade(&mut grid, &attributes, &ortho);
        let bound = grid.bound();
        assert!(bound.z.size() > 0.0);
        assert!(bound.z.min >= 4.5 - 1e-5 && bound.z.max <= 5.5 + 1e-5);
        assert!(!grid.has_explicit_normals());
    }

    #[test]
    fn test_table_dispatch_and_fallback() {
        let table = ShaderTable::default();
        let ortho = camera(Projection::Orthographic);
        let attributes = Attributes::default().with_color(Color::splat(0.5));

        let mut named = flat(1.0);
        table.shade(&mut named, &attributes.clone().with_shader("facing"), &ortho);
        let mut unknown = flat(1.0);
        table.shade(&mut unknown, &attributes.clone().with_shader("missing"), &ortho);
        let mut unnamed = flat(1.0);
        table.shade(&mut unnamed, &attributes, &ortho);

        assert_eq!(unknown.ci(), unnamed.ci());
        assert!(unnamed.ci().iter().all(|&c| c == Color::splat(0.5)));
        assert!((named.ci()[4] - Color::splat(0.5)).length() < 1e-5);
    }
}
