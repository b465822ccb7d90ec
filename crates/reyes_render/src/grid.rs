//! Diced grids and micropolygon extraction.
//!
//! A grid of `u × v` cells stores `(u + 1) × (v + 1)` vertices in
//! row-major order (u varies fastest). Positions are camera space, one
//! set per motion key; shading channels are shared by every key.

use reyes_core::AttributesId;
use reyes_math::{Bound, Color, Interval, Vec2, Vec3};

use crate::camera::Camera;
use crate::micropolygon::MicroPolygon;
use crate::motion::MotionKeys;

/// A named per-vertex channel written by a shader.
#[derive(Debug, Clone, PartialEq)]
pub struct GridChannel {
    pub name: String,
    pub components: usize,
    pub data: Vec<f32>,
}

/// Micropolygons extracted from one grid.
#[derive(Debug, Default)]
pub struct Extraction {
    pub micropolygons: Vec<MicroPolygon>,
    /// Cells dropped because their corners collapsed
    pub degenerate: usize,
    /// Cells dropped because they lie outside near/far or reach the eye
    pub clipped: usize,
}

/// The regular array of shaded points produced by dicing one surface.
#[derive(Debug, Clone)]
pub struct MicroPolygonGrid {
    u_cells: usize,
    v_cells: usize,
    positions: MotionKeys<Vec<Vec3>>,
    normals: Option<Vec<Vec3>>,
    normals_explicit: bool,
    /// Varying input colour (Cs), if the primitive supplied one
    colors: Option<Vec<Color>>,
    /// Varying input opacity (Os)
    opacities: Option<Vec<Color>>,
    st: Vec<Vec2>,
    /// Shaded colour (Ci)
    ci: Vec<Color>,
    /// Shaded opacity (Oi)
    oi: Vec<Color>,
    channels: Vec<GridChannel>,
    attributes: AttributesId,
    triangle: bool,
}

impl MicroPolygonGrid {
    /// Create a grid of `u_cells × v_cells` from per-key vertex positions.
    pub fn new(u_cells: usize, v_cells: usize, positions: MotionKeys<Vec<Vec3>>) -> Self {
        let count = (u_cells + 1) * (v_cells + 1);
        debug_assert!(positions.values().iter().all(|p| p.len() == count));

        let mut st = Vec::with_capacity(count);
        for j in 0..=v_cells {
            for i in 0..=u_cells {
                st.push(Vec2::new(
                    i as f32 / u_cells.max(1) as f32,
                    j as f32 / v_cells.max(1) as f32,
                ));
            }
        }

        Self {
            u_cells,
            v_cells,
            positions,
            normals: None,
            normals_explicit: false,
            colors: None,
            opacities: None,
            st,
            ci: vec![Color::ONE; count],
            oi: vec![Color::ONE; count],
            channels: Vec::new(),
            attributes: AttributesId::default(),
            triangle: false,
        }
    }

    pub fn with_colors(mut self, colors: Vec<Color>) -> Self {
        self.colors = Some(colors);
        self
    }

    pub fn with_opacities(mut self, opacities: Vec<Color>) -> Self {
        self.opacities = Some(opacities);
        self
    }

    /// Normals supplied by the primitive. They are used as-is.
    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
        self.normals = Some(normals);
        self.normals_explicit = true;
        self
    }

    pub fn with_st(mut self, st: Vec<Vec2>) -> Self {
        self.st = st;
        self
    }

    /// Mark the grid as a diced triangle: cells past the diagonal are
    /// outside the surface.
    pub fn with_triangle(mut self, triangle: bool) -> Self {
        self.triangle = triangle;
        self
    }

    pub fn with_attributes(mut self, attributes: AttributesId) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn u_cells(&self) -> usize {
        self.u_cells
    }

    pub fn v_cells(&self) -> usize {
        self.v_cells
    }

    pub fn u_vertices(&self) -> usize {
        self.u_cells + 1
    }

    pub fn v_vertices(&self) -> usize {
        self.v_cells + 1
    }

    pub fn vertex_count(&self) -> usize {
        self.u_vertices() * self.v_vertices()
    }

    /// Cells that lie on the surface.
    pub fn micropolygon_count(&self) -> usize {
        if self.triangle {
            let n = self.u_cells.min(self.v_cells);
            n * (n + 1) / 2
        } else {
            self.u_cells * self.v_cells
        }
    }

    #[inline]
    pub fn index(&self, i: usize, j: usize) -> usize {
        j * self.u_vertices() + i
    }

    pub fn attributes(&self) -> AttributesId {
        self.attributes
    }

    pub fn is_triangle(&self) -> bool {
        self.triangle
    }

    pub fn is_moving(&self) -> bool {
        self.positions.is_moving()
    }

    /// Positions at the shutter-open key (P).
    pub fn positions(&self) -> &[Vec3] {
        self.positions.first()
    }

    pub fn motion_positions(&self) -> &MotionKeys<Vec<Vec3>> {
        &self.positions
    }

    pub fn colors(&self) -> Option<&[Color]> {
        self.colors.as_deref()
    }

    pub fn opacities(&self) -> Option<&[Color]> {
        self.opacities.as_deref()
    }

    pub fn st(&self) -> &[Vec2] {
        &self.st
    }

    pub fn ci(&self) -> &[Color] {
        &self.ci
    }

    pub fn ci_mut(&mut self) -> &mut [Color] {
        &mut self.ci
    }

    pub fn oi(&self) -> &[Color] {
        &self.oi
    }

    pub fn oi_mut(&mut self) -> &mut [Color] {
        &mut self.oi
    }

    pub fn normals(&self) -> Option<&[Vec3]> {
        self.normals.as_deref()
    }

    /// True when normals came from the primitive rather than the grid.
    pub fn has_explicit_normals(&self) -> bool {
        self.normals_explicit
    }

    /// Normals, deriving them from positions if none exist yet.
    pub fn ensure_normals(&mut self) -> &[Vec3] {
        if self.normals.is_none() {
            self.normals = Some(self.derive_normals());
        }
        self.normals.as_deref().unwrap_or(&[])
    }

    /// Central-difference normals at the shutter-open key.
    pub fn derive_normals(&self) -> Vec<Vec3> {
        let p = self.positions();
        let (nu, nv) = (self.u_cells, self.v_cells);
        let mut normals = Vec::with_capacity(self.vertex_count());
        for j in 0..=nv {
            for i in 0..=nu {
                let du = p[self.index((i + 1).min(nu), j)] - p[self.index(i.saturating_sub(1), j)];
                let dv = p[self.index(i, (j + 1).min(nv))] - p[self.index(i, j.saturating_sub(1))];
                normals.push(du.cross(dv).normalize_or_zero());
            }
        }
        normals
    }

    /// Move every vertex. `f` receives the vertex index, its position and
    /// normal, and returns the new position. The offset applies to every
    /// motion key; normals are re-derived afterwards.
    pub fn displace(&mut self, mut f: impl FnMut(usize, Vec3, Vec3) -> Vec3) {
        let normals = self.ensure_normals().to_vec();
        let offsets: Vec<Vec3> = self
            .positions()
            .iter()
            .zip(&normals)
            .enumerate()
            .map(|(index, (&p, &n))| f(index, p, n) - p)
            .collect();
        for key in self.positions.values_mut() {
            for (p, offset) in key.iter_mut().zip(&offsets) {
                *p += *offset;
            }
        }
        self.normals = Some(self.derive_normals());
        self.normals_explicit = false;
    }

    /// Set every shaded colour and opacity.
    pub fn fill_output(&mut self, ci: Color, oi: Color) {
        self.ci.fill(ci);
        self.oi.fill(oi);
    }

    /// Add (or reset) a zeroed channel and return its storage.
    pub fn add_channel(&mut self, name: &str, components: usize) -> &mut [f32] {
        let len = self.vertex_count() * components;
        let position = match self.channels.iter().position(|c| c.name == name) {
            Some(position) => {
                let channel = &mut self.channels[position];
                channel.components = components;
                channel.data = vec![0.0; len];
                position
            }
            None => {
                self.channels.push(GridChannel {
                    name: name.to_string(),
                    components,
                    data: vec![0.0; len],
                });
                self.channels.len() - 1
            }
        };
        &mut self.channels[position].data
    }

    pub fn channel(&self, name: &str) -> Option<&GridChannel> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// Camera-space bound over every key.
    pub fn bound(&self) -> Bound {
        Bound::enclosing(self.positions.values().iter().flatten().copied())
    }

    fn cell_is_live(&self, i: usize, j: usize) -> bool {
        !self.triangle || i + j < self.u_cells
    }

    fn cell_is_triangular(&self, i: usize, j: usize) -> bool {
        self.triangle && i + j + 1 == self.u_cells
    }

    /// Build one micropolygon per cell, in raster space.
    ///
    /// Cells with non-finite or collapsed corners are dropped, as are
    /// cells wholly outside the near/far range. Cells straddling it are
    /// flagged for per-sample rejection.
    pub fn extract_micropolygons(&self, camera: &Camera, matte: bool) -> Extraction {
        let raster = self.positions.map(|points| {
            points
                .iter()
                .map(|&p| match camera.project_xy(p) {
                    Some(xy) => xy.extend(p.z),
                    None => Vec3::NAN,
                })
                .collect::<Vec<_>>()
        });
        let clip = Interval::new(camera.near(), camera.far());

        let mut extraction = Extraction {
            micropolygons: Vec::with_capacity(self.micropolygon_count()),
            ..Default::default()
        };

        for j in 0..self.v_cells {
            for i in 0..self.u_cells {
                if !self.cell_is_live(i, j) {
                    continue;
                }
                let triangular = self.cell_is_triangular(i, j);
                let corners = [
                    self.index(i, j),
                    self.index(i + 1, j),
                    self.index(i + 1, j + 1),
                    self.index(i, j + 1),
                ];
                let live: &[usize] = if triangular { &[0, 1, 3] } else { &[0, 1, 2, 3] };

                let keys = raster.map(|r| corners.map(|k| r[k]));
                let mut depth = Interval::EMPTY;
                let mut finite = true;
                for key in keys.values() {
                    for &c in live {
                        finite &= key[c].is_finite();
                        depth.include(key[c].z);
                    }
                }
                if !finite {
                    extraction.clipped += 1;
                    continue;
                }
                if depth.max < clip.min || depth.min > clip.max {
                    extraction.clipped += 1;
                    continue;
                }
                let trimmed = !clip.contains_interval(&depth);

                let count = live.len() as f32;
                let color = live.iter().map(|&c| self.ci[corners[c]]).sum::<Color>() / count;
                let opacity = live.iter().map(|&c| self.oi[corners[c]]).sum::<Color>() / count;
                let pad = camera.max_coc(depth);

                let mpg = MicroPolygon::new_moving(keys, triangular, pad, color, opacity)
                    .with_matte(matte)
                    .with_trimmed(trimmed);
                if mpg.is_degenerate() {
                    extraction.degenerate += 1;
                    continue;
                }
                extraction.micropolygons.push(mpg);
            }
        }

        if extraction.degenerate > 0 {
            log::debug!("Dropped {} degenerate micropolygons", extraction.degenerate);
        }
        extraction
    }
}
