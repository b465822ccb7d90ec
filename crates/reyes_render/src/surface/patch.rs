//! Bilinear patches.

use reyes_math::{lerp, Bound, Color, Vec2, Vec3};

use super::{DiceSize, Primitive, SplitAxis, SurfaceKind};
use crate::camera::Camera;
use crate::grid::MicroPolygonGrid;
use crate::motion::MotionKeys;

/// Corner values in `(0,0), (1,0), (0,1), (1,1)` order.
pub(crate) type Corners<T> = [T; 4];

#[inline]
pub(crate) fn bilerp<T>(c: &Corners<T>, u: f32, v: f32) -> T
where
    T: Copy + std::ops::Mul<f32, Output = T> + std::ops::Add<Output = T>,
{
    lerp(lerp(c[0], c[1], u), lerp(c[2], c[3], u), v)
}

/// Corners of the sub-rectangle `[u0, u1] × [v0, v1]`.
fn sub_corners<T>(c: &Corners<T>, u0: f32, u1: f32, v0: f32, v1: f32) -> Corners<T>
where
    T: Copy + std::ops::Mul<f32, Output = T> + std::ops::Add<Output = T>,
{
    [
        bilerp(c, u0, v0),
        bilerp(c, u1, v0),
        bilerp(c, u0, v1),
        bilerp(c, u1, v1),
    ]
}

/// Evaluate corner values over a `(u + 1) × (v + 1)` vertex lattice.
fn lattice<T>(c: &Corners<T>, size: DiceSize) -> Vec<T>
where
    T: Copy + std::ops::Mul<f32, Output = T> + std::ops::Add<Output = T>,
{
    let mut values = Vec::with_capacity(((size.u + 1) * (size.v + 1)) as usize);
    for j in 0..=size.v {
        let v = j as f32 / size.v as f32;
        for i in 0..=size.u {
            values.push(bilerp(c, i as f32 / size.u as f32, v));
        }
    }
    values
}

/// A bilinear patch with optional varying colour, opacity and normals.
///
/// Positions are camera space, one corner set per motion key.
#[derive(Debug, Clone, PartialEq)]
pub struct BilinearPatch {
    positions: MotionKeys<Corners<Vec3>>,
    colors: Option<Corners<Color>>,
    opacities: Option<Corners<Color>>,
    normals: Option<Corners<Vec3>>,
    st: Corners<Vec2>,
}

impl BilinearPatch {
    /// A static patch from its four corners.
    pub fn new(p00: Vec3, p10: Vec3, p01: Vec3, p11: Vec3) -> Self {
        Self::moving(MotionKeys::fixed([p00, p10, p01, p11]))
    }

    /// A patch with one corner set per motion key.
    pub fn moving(positions: MotionKeys<Corners<Vec3>>) -> Self {
        Self {
            positions,
            colors: None,
            opacities: None,
            normals: None,
            st: [Vec2::ZERO, Vec2::X, Vec2::Y, Vec2::ONE],
        }
    }

    /// Axis-aligned rectangle facing the camera at depth `z`.
    pub fn rectangle(min: Vec2, max: Vec2, z: f32) -> Self {
        Self::new(
            Vec3::new(min.x, max.y, z),
            Vec3::new(max.x, max.y, z),
            Vec3::new(min.x, min.y, z),
            Vec3::new(max.x, min.y, z),
        )
    }

    pub fn with_colors(mut self, colors: Corners<Color>) -> Self {
        self.colors = Some(colors);
        self
    }

    pub fn with_opacities(mut self, opacities: Corners<Color>) -> Self {
        self.opacities = Some(opacities);
        self
    }

    pub fn with_normals(mut self, normals: Corners<Vec3>) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn with_st(mut self, st: Corners<Vec2>) -> Self {
        self.st = st;
        self
    }

    pub fn positions(&self) -> &MotionKeys<Corners<Vec3>> {
        &self.positions
    }

    /// The part of this patch over `[u0, u1] × [v0, v1]`.
    pub fn sub_patch(&self, u0: f32, u1: f32, v0: f32, v1: f32) -> Self {
        Self {
            positions: self.positions.map(|c| sub_corners(c, u0, u1, v0, v1)),
            colors: self.colors.as_ref().map(|c| sub_corners(c, u0, u1, v0, v1)),
            opacities: self.opacities.as_ref().map(|c| sub_corners(c, u0, u1, v0, v1)),
            normals: self.normals.as_ref().map(|c| sub_corners(c, u0, u1, v0, v1)),
            st: sub_corners(&self.st, u0, u1, v0, v1),
        }
    }

    /// Dice into a grid, flagging it as a triangle when requested.
    pub(crate) fn dice_grid(&self, size: DiceSize, triangle: bool) -> MicroPolygonGrid {
        let positions = self.positions.map(|c| lattice(c, size));
        let mut grid = MicroPolygonGrid::new(size.u as usize, size.v as usize, positions)
            .with_st(lattice(&self.st, size))
            .with_triangle(triangle);
        if let Some(colors) = &self.colors {
            grid = grid.with_colors(lattice(colors, size));
        }
        if let Some(opacities) = &self.opacities {
            grid = grid.with_opacities(lattice(opacities, size));
        }
        if let Some(normals) = &self.normals {
            let normals = lattice(normals, size)
                .into_iter()
                .map(|n| n.normalize_or_zero())
                .collect();
            grid = grid.with_normals(normals);
        }
        grid
    }
}

/// Longest projected u and v edge of a corner set, or `None` if any
/// corner cannot be projected.
pub(crate) fn projected_edges(camera: &Camera, corners: &Corners<Vec3>) -> Option<Vec2> {
    let mut raster = [Vec2::ZERO; 4];
    for (r, &p) in raster.iter_mut().zip(corners) {
        *r = camera.project_xy(p)?;
    }
    let u = raster[0].distance(raster[1]).max(raster[2].distance(raster[3]));
    let v = raster[0].distance(raster[2]).max(raster[1].distance(raster[3]));
    Some(Vec2::new(u, v))
}

impl Primitive for BilinearPatch {
    fn bound(&self) -> Bound {
        Bound::enclosing(self.positions.values().iter().flatten().copied())
    }

    fn projected_lengths(&self, camera: &Camera) -> Option<Vec2> {
        let mut longest = Vec2::ZERO;
        for corners in self.positions.values() {
            longest = longest.max(projected_edges(camera, corners)?);
        }
        longest.is_finite().then_some(longest)
    }

    fn split(&self, axis: SplitAxis) -> Vec<SurfaceKind> {
        let halves = match axis {
            SplitAxis::U => [self.sub_patch(0.0, 0.5, 0.0, 1.0), self.sub_patch(0.5, 1.0, 0.0, 1.0)],
            SplitAxis::V => [self.sub_patch(0.0, 1.0, 0.0, 0.5), self.sub_patch(0.0, 1.0, 0.5, 1.0)],
        };
        halves.into_iter().map(SurfaceKind::Patch).collect()
    }

    fn dice(&self, size: DiceSize) -> Option<MicroPolygonGrid> {
        Some(self.dice_grid(size, false))
    }
}
