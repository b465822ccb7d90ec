//! Reyes Render - a bucketed split/dice micropolygon renderer.
//!
//! Surfaces in camera space are posted to an [`ImageBuffer`], split until
//! small enough on screen, diced into grids of micropolygons, shaded, and
//! sampled stochastically bucket by bucket. Filtered buckets go to a
//! [`DisplayManager`] in traversal order.
//!
//! # Example
//!
//! ```ignore
//! use reyes_core::{AttributeStore, RenderOptions};
//! use reyes_render::{BilinearPatch, ConstantShading, FrameBuffer, ImageBuffer, Surface};
//!
//! let options = RenderOptions::default();
//! let mut frame = FrameBuffer::new(options.width, options.height);
//! let mut buffer = ImageBuffer::new(options, AttributeStore::new())?;
//! let id = buffer.attributes().default_id();
//! buffer.post_surface(Surface::new(patch, id));
//! let stats = buffer.render_image(&ConstantShading, &mut frame)?;
//! frame.save_png("out.png")?;
//! ```

mod bucket;
mod camera;
mod display;
mod error;
mod filter;
mod grid;
mod image_buffer;
mod micropolygon;
mod motion;
mod sample;
mod scheduler;
mod shading;
mod stats;
mod surface;

pub use bucket::{tile_region, traversal_order, Bucket, BucketState, PixelRect};
pub use camera::{Camera, EYE_EPSILON};
pub use display::{linear_to_gamma, pixel_to_rgba, ChannelDisplay, DisplayEvent, DisplayManager, FrameBuffer, Pixel};
pub use error::{DisplayError, RenderError, RenderResult};
pub use filter::PixelFilter;
pub use grid::{Extraction, GridChannel, MicroPolygonGrid};
pub use image_buffer::{ImageBuffer, RenderControl};
pub use micropolygon::{
    inverse_bilinear, MicroPolygon, MicroPolygonArena, MovingMicroPolygon, MpgId, Shape, TimedBound,
};
pub use motion::{KeySpan, MotionKeys};
pub use sample::{Sample, SampleBuffer, SampleCounts, SampleSettings, SampleValue};
pub use scheduler::{render_region, Classification, CullReason, DiscardReason, Scheduler};
pub use shading::{ConstantShading, FacingShading, RippleDisplacement, ShaderTable, ShadingExecution};
pub use stats::RenderStats;
pub use surface::{
    fan_polygon, BilinearPatch, DiceSize, Generator, Primitive, Procedural, SplitAxis, Surface, SurfaceKind,
    Triangle,
};

// Re-export the math types that appear in the public API
pub use reyes_math::{Bound, Color, Interval, Mat4, Vec2, Vec3};
