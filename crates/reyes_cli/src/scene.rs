//! Built-in demo scene, laid out in camera space.
//!
//! The camera sits at the origin looking down +z with y up. The scene
//! exercises every surface kind: a floor running through the hither
//! plane, coloured cards, a fanned polygon, a procedural tile field, a
//! rippled displaced card, a matte cut-out and (when the shutter is open)
//! a moving card.

use std::sync::Arc;

use reyes_core::{AttributeStore, Attributes};
use reyes_render::{
    fan_polygon, BilinearPatch, Bound, Color, Generator, ImageBuffer, Mat4, MotionKeys, Procedural, Surface,
    SurfaceKind, Triangle, Vec3,
};

/// A checkerboard of small tiles in the object-space unit square.
#[derive(Debug)]
struct TileField {
    tiles: u32,
}

impl Generator for TileField {
    fn generate(&self, object_to_camera: &Mat4) -> Vec<SurfaceKind> {
        let step = 1.0 / self.tiles as f32;
        let light = Color::new(0.9, 0.85, 0.7);
        let dark = Color::new(0.25, 0.2, 0.3);
        let mut surfaces = Vec::new();
        for j in 0..self.tiles {
            for i in 0..self.tiles {
                let (x0, y0) = (i as f32 * step, j as f32 * step);
                let corners = [
                    Vec3::new(x0, y0 + step, 0.0),
                    Vec3::new(x0 + step, y0 + step, 0.0),
                    Vec3::new(x0, y0, 0.0),
                    Vec3::new(x0 + step, y0, 0.0),
                ]
                .map(|p| object_to_camera.transform_point3(p));
                let color = if (i + j) % 2 == 0 { light } else { dark };
                let patch = BilinearPatch::new(corners[0], corners[1], corners[2], corners[3])
                    .with_colors([color; 4]);
                surfaces.push(patch.into());
            }
        }
        surfaces
    }
}

fn card(center: Vec3, half: f32) -> BilinearPatch {
    BilinearPatch::new(
        center + Vec3::new(-half, half, 0.0),
        center + Vec3::new(half, half, 0.0),
        center + Vec3::new(-half, -half, 0.0),
        center + Vec3::new(half, -half, 0.0),
    )
}

/// Regular polygon with `sides` vertices facing the camera.
fn polygon(center: Vec3, radius: f32, sides: usize) -> Vec<Triangle> {
    let points: Vec<Vec3> = (0..sides)
        .map(|k| {
            let angle = k as f32 / sides as f32 * std::f32::consts::TAU;
            center + Vec3::new(angle.cos(), angle.sin(), 0.0) * radius
        })
        .collect();
    fan_polygon(&points)
}

/// Post the demo scene. Returns the number of surfaces accepted.
pub fn populate(buffer: &mut ImageBuffer) -> usize {
    let shutter = buffer.camera().shutter();
    let attributes: &mut AttributeStore = buffer.attributes_mut();

    let floor_id = attributes.insert(Attributes::new("floor", Color::new(0.5, 0.55, 0.6)).with_shader("facing"));
    let red_id = attributes.insert(Attributes::new("red card", Color::new(0.85, 0.2, 0.15)).with_shader("facing"));
    let glass_id = attributes.insert(
        Attributes::new("glass", Color::new(0.3, 0.6, 0.9))
            .with_opacity(Color::splat(0.4))
            .with_shader("constant"),
    );
    let ripple_id = attributes.insert(
        Attributes::new("ripple", Color::new(0.3, 0.8, 0.35))
            .with_shader("ripple")
            .with_displacement_bound(0.15),
    );
    let matte_id = attributes.insert(Attributes::new("matte", Color::ZERO).with_matte(true));
    let tiles_id = attributes.insert(Attributes::new("tiles", Color::ONE).with_shader("facing"));
    let mover_id = attributes.derive(red_id, |a| {
        a.name = Some("mover".to_string());
        a.color = Color::new(0.95, 0.75, 0.1);
    });
    let poly_id = attributes.insert(Attributes::new("hexagon", Color::new(0.6, 0.3, 0.8)).with_shader("facing"));

    let mut surfaces = vec![
        // Starts behind the hither plane, so it needs eye splits
        Surface::new(
            BilinearPatch::new(
                Vec3::new(-8.0, -1.5, 0.0),
                Vec3::new(8.0, -1.5, 0.0),
                Vec3::new(-8.0, -1.5, 30.0),
                Vec3::new(8.0, -1.5, 30.0),
            ),
            floor_id,
        ),
        Surface::new(card(Vec3::new(-1.6, 0.2, 6.0), 1.0), red_id),
        Surface::new(card(Vec3::new(-0.8, -0.2, 4.5), 0.8), glass_id),
        Surface::new(card(Vec3::new(1.8, 0.8, 7.0), 1.2), ripple_id),
        Surface::new(card(Vec3::new(1.2, -0.6, 5.0), 0.35), matte_id),
    ];

    let tiles = Mat4::from_translation(Vec3::new(-2.0, 1.2, 9.0)) * Mat4::from_scale(Vec3::splat(2.5));
    let unit = Bound::from_points(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0));
    surfaces.push(Surface::new(
        Procedural::new(unit, tiles, Arc::new(TileField { tiles: 6 })),
        tiles_id,
    ));

    surfaces.extend(
        polygon(Vec3::new(0.4, 1.6, 8.0), 0.9, 6)
            .into_iter()
            .map(|t| Surface::new(t, poly_id)),
    );

    if shutter.size() > 0.0 {
        let start = card(Vec3::new(-0.5, 1.0, 5.5), 0.4);
        let keys = MotionKeys::from_keys([
            (shutter.min, *start.positions().first()),
            (shutter.max, *card(Vec3::new(0.5, 1.1, 5.5), 0.4).positions().first()),
        ]);
        if let Some(keys) = keys {
            surfaces.push(Surface::new(BilinearPatch::moving(keys), mover_id));
        }
    }

    let posted = surfaces.len();
    let accepted = surfaces
        .into_iter()
        .map(|s| buffer.post_surface(s))
        .filter(|&accepted| accepted)
        .count();
    log::info!("Posted {} surfaces, {} accepted", posted, accepted);
    accepted
}
