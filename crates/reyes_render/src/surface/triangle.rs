//! Triangles, diced as a parallelogram with a phantom fourth vertex.
//!
//! Vertex `a` sits at parametric `(0,0)`, `b` at `(1,0)` and `c` at
//! `(0,1)`. The phantom vertex `b + c - a` completes the parallelogram;
//! grid cells beyond the `u + v = 1` diagonal are never extracted.

use reyes_math::{Bound, Color, Vec2, Vec3};

use super::patch::{projected_edges, BilinearPatch};
use super::{DiceSize, Primitive, SplitAxis, SurfaceKind};
use crate::camera::Camera;
use crate::grid::MicroPolygonGrid;
use crate::motion::MotionKeys;

type Vertices<T> = [T; 3];

fn phantom<T>(v: &Vertices<T>) -> [T; 4]
where
    T: Copy + std::ops::Add<Output = T> + std::ops::Sub<Output = T>,
{
    [v[0], v[1], v[2], v[1] + v[2] - v[0]]
}

fn midpoint<T>(a: T, b: T) -> T
where
    T: Copy + std::ops::Add<Output = T> + std::ops::Mul<f32, Output = T>,
{
    (a + b) * 0.5
}

/// Split a vertex set into the trapezoid (as patch corners) and the
/// remaining smaller triangle.
fn split_vertices<T>(v: &Vertices<T>, axis: SplitAxis) -> ([T; 4], Vertices<T>)
where
    T: Copy + std::ops::Add<Output = T> + std::ops::Mul<f32, Output = T>,
{
    let [a, b, c] = *v;
    let ab = midpoint(a, b);
    let ac = midpoint(a, c);
    let bc = midpoint(b, c);
    match axis {
        // u <= 1/2 is a trapezoid, u >= 1/2 a triangle
        SplitAxis::U => ([a, ab, c, bc], [ab, b, bc]),
        SplitAxis::V => ([a, b, ac, bc], [ac, bc, c]),
    }
}

/// A triangle with optional per-vertex colour, opacity and normals.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    positions: MotionKeys<Vertices<Vec3>>,
    colors: Option<Vertices<Color>>,
    opacities: Option<Vertices<Color>>,
    normals: Option<Vertices<Vec3>>,
}

impl Triangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self::moving(MotionKeys::fixed([a, b, c]))
    }

    pub fn moving(positions: MotionKeys<Vertices<Vec3>>) -> Self {
        Self {
            positions,
            colors: None,
            opacities: None,
            normals: None,
        }
    }

    pub fn with_colors(mut self, colors: Vertices<Color>) -> Self {
        self.colors = Some(colors);
        self
    }

    pub fn with_opacities(mut self, opacities: Vertices<Color>) -> Self {
        self.opacities = Some(opacities);
        self
    }

    pub fn with_normals(mut self, normals: Vertices<Vec3>) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn positions(&self) -> &MotionKeys<Vertices<Vec3>> {
        &self.positions
    }

    /// The parallelogram this triangle is diced through.
    fn phantom_patch(&self) -> BilinearPatch {
        let mut patch = BilinearPatch::moving(self.positions.map(phantom))
            .with_st([Vec2::ZERO, Vec2::X, Vec2::Y, Vec2::ONE]);
        if let Some(colors) = &self.colors {
            patch = patch.with_colors(phantom(colors));
        }
        if let Some(opacities) = &self.opacities {
            patch = patch.with_opacities(phantom(opacities));
        }
        if let Some(normals) = &self.normals {
            patch = patch.with_normals(phantom(normals));
        }
        patch
    }
}

impl Primitive for Triangle {
    fn bound(&self) -> Bound {
        Bound::enclosing(self.positions.values().iter().flatten().copied())
    }

    fn projected_lengths(&self, camera: &Camera) -> Option<Vec2> {
        let mut longest = 0.0_f32;
        for v in self.positions.values() {
            let edges = projected_edges(camera, &[v[0], v[1], v[2], v[2]])?;
            let diagonal = camera.project_xy(v[1])?.distance(camera.project_xy(v[2])?);
            longest = longest.max(edges.max_element()).max(diagonal);
        }
        longest.is_finite().then_some(Vec2::splat(longest))
    }

    fn split(&self, axis: SplitAxis) -> Vec<SurfaceKind> {
        let mut positions = Vec::with_capacity(self.positions.len());
        let mut tri_positions = Vec::with_capacity(self.positions.len());
        for (time, v) in self.positions.iter() {
            let (quad, tri) = split_vertices(v, axis);
            positions.push((time, quad));
            tri_positions.push((time, tri));
        }
        let (Some(quad_keys), Some(tri_keys)) =
            (MotionKeys::from_keys(positions), MotionKeys::from_keys(tri_positions))
        else {
            return Vec::new();
        };

        let mut quad = BilinearPatch::moving(quad_keys);
        let mut tri = Triangle::moving(tri_keys);
        if let Some(colors) = &self.colors {
            let (q, t) = split_vertices(colors, axis);
            quad = quad.with_colors(q);
            tri = tri.with_colors(t);
        }
        if let Some(opacities) = &self.opacities {
            let (q, t) = split_vertices(opacities, axis);
            quad = quad.with_opacities(q);
            tri = tri.with_opacities(t);
        }
        if let Some(normals) = &self.normals {
            let (q, t) = split_vertices(normals, axis);
            quad = quad.with_normals(q);
            tri = tri.with_normals(t);
        }
        vec![SurfaceKind::Patch(quad), SurfaceKind::Triangle(tri)]
    }

    fn dice(&self, size: DiceSize) -> Option<MicroPolygonGrid> {
        let n = size.u.max(size.v);
        Some(self.phantom_patch().dice_grid(DiceSize::new(n, n), true))
    }

    fn square_dicing(&self) -> bool {
        true
    }
}

/// Fan a convex polygon into triangles sharing its first vertex.
pub fn fan_polygon(points: &[Vec3]) -> Vec<Triangle> {
    match points.split_first() {
        Some((&first, rest)) => rest
            .windows(2)
            .map(|edge| Triangle::new(first, edge[0], edge[1]))
            .collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri() -> Triangle {
        Triangle::new(
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(4.0, 0.0, 1.0),
            Vec3::new(0.0, 4.0, 1.0),
        )
    }

    #[test]
    fn test_split_yields_patch_and_triangle() {
        for axis in [SplitAxis::U, SplitAxis::V] {
            let children = tri().split(axis);
            assert_eq!(children.len(), 2);
            assert!(matches!(children[0], SurfaceKind::Patch(_)));
            assert!(matches!(children[1], SurfaceKind::Triangle(_)));

            let mut union = Bound::EMPTY;
            for child in &children {
                union.include(&child.primitive().bound());
            }
            assert_eq!(union, tri().bound());
        }
    }

    #[test]
    fn test_split_u_geometry() {
        let children = tri().split(SplitAxis::U);
        let SurfaceKind::Triangle(small) = &children[1] else {
            panic!("expected triangle");
        };
        assert_eq!(
            small.positions().first(),
            &[
                Vec3::new(2.0, 0.0, 1.0),
                Vec3::new(4.0, 0.0, 1.0),
                Vec3::new(2.0, 2.0, 1.0),
            ]
        );
    }

    #[test]
    fn test_dice_is_square_triangle_grid() {
        let grid = tri().dice(DiceSize::new(2, 4)).unwrap();
        assert!(grid.is_triangle());
        assert_eq!(grid.u_cells(), 4);
        assert_eq!(grid.v_cells(), 4);
        assert_eq!(grid.micropolygon_count(), 10);
        // Phantom corner of the lattice
        assert_eq!(grid.positions()[grid.index(4, 4)], Vec3::new(4.0, 4.0, 1.0));
    }

    #[test]
    fn test_fan_polygon() {
        let square = [
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
        ];
        let triangles = fan_polygon(&square);
        assert_eq!(triangles.len(), 2);
        assert_eq!(triangles[1].positions().first()[0], square[0]);
        assert!(fan_polygon(&square[..2]).is_empty());
        assert!(fan_polygon(&[]).is_empty());
    }
}
