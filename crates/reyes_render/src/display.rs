//! Display collaborators that receive finished buckets.
//!
//! The renderer hands every bucket's filtered pixels to a
//! [`DisplayManager`] in traversal order. [`FrameBuffer`] assembles the
//! image in memory (and can write it out); [`ChannelDisplay`] forwards
//! buckets to another thread over a bounded channel.

use std::path::Path;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

use reyes_math::Color;

use crate::bucket::PixelRect;
use crate::error::DisplayError;

/// One filtered output pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pixel {
    /// Premultiplied colour
    pub color: Color,
    pub alpha: f32,
    /// Nearest depth seen by the pixel's own samples
    pub depth: f32,
    /// Fraction of the pixel's own samples that hit anything
    pub coverage: f32,
}

impl Default for Pixel {
    fn default() -> Self {
        Self {
            color: Color::ZERO,
            alpha: 0.0,
            depth: f32::INFINITY,
            coverage: 0.0,
        }
    }
}

/// Receiver of rendered buckets.
pub trait DisplayManager {
    /// Take the pixels of one bucket, row-major within `rect`.
    fn accept_bucket(&mut self, rect: PixelRect, pixels: &[Pixel]) -> Result<(), DisplayError>;

    /// Called after `accept_bucket` once the bucket's resources are released.
    fn bucket_complete(&mut self, _rect: PixelRect) -> Result<(), DisplayError> {
        Ok(())
    }

    /// Called once after the last bucket, including after cancellation.
    fn image_complete(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }
}

/// Map a linear value to display gamma 2.0.
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

#[inline]
fn to_byte(x: f32) -> u8 {
    (255.0 * x.clamp(0.0, 1.0)).round() as u8
}

/// Convert a pixel to 8-bit RGBA, applying gamma to colour only.
pub fn pixel_to_rgba(pixel: &Pixel) -> [u8; 4] {
    [
        to_byte(linear_to_gamma(pixel.color.x)),
        to_byte(linear_to_gamma(pixel.color.y)),
        to_byte(linear_to_gamma(pixel.color.z)),
        to_byte(pixel.alpha),
    ]
}

/// In-memory image assembled from buckets.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Pixel>,
    buckets_received: usize,
    complete: bool,
}

impl FrameBuffer {
    /// Create an empty (transparent black) frame.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Pixel::default(); (width * height) as usize],
            buckets_received: 0,
            complete: false,
        }
    }

    pub fn get(&self, x: u32, y: u32) -> Pixel {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn buckets_received(&self) -> usize {
        self.buckets_received
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Convert to 8-bit RGBA bytes.
    pub fn to_rgba(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(pixel_to_rgba).collect()
    }

    /// Write the frame as a PNG.
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<(), DisplayError> {
        let path = path.as_ref();
        let image = image::RgbaImage::from_raw(self.width, self.height, self.to_rgba()).ok_or(
            DisplayError::OutOfBounds {
                x: 0,
                y: 0,
                width: self.width,
                height: self.height,
                image_width: self.width,
                image_height: self.height,
            },
        )?;
        image.save(path)?;
        log::info!("Wrote {}x{} image to {}", self.width, self.height, path.display());
        Ok(())
    }
}

impl DisplayManager for FrameBuffer {
    fn accept_bucket(&mut self, rect: PixelRect, pixels: &[Pixel]) -> Result<(), DisplayError> {
        if rect.x1() > self.width || rect.y1() > self.height || pixels.len() != rect.pixel_count() {
            return Err(DisplayError::OutOfBounds {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                image_width: self.width,
                image_height: self.height,
            });
        }
        for (row, line) in pixels.chunks(rect.width as usize).enumerate() {
            let start = ((rect.y + row as u32) * self.width + rect.x) as usize;
            self.pixels[start..start + line.len()].copy_from_slice(line);
        }
        self.buckets_received += 1;
        Ok(())
    }

    fn image_complete(&mut self) -> Result<(), DisplayError> {
        self.complete = true;
        Ok(())
    }
}

/// Events delivered by a [`ChannelDisplay`].
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    Bucket { rect: PixelRect, pixels: Vec<Pixel> },
    BucketComplete(PixelRect),
    ImageComplete,
}

/// Forwards buckets over a bounded channel. The renderer blocks when the
/// receiver falls `capacity` events behind.
#[derive(Debug)]
pub struct ChannelDisplay {
    sender: SyncSender<DisplayEvent>,
}

impl ChannelDisplay {
    pub fn new(capacity: usize) -> (Self, Receiver<DisplayEvent>) {
        let (sender, receiver) = sync_channel(capacity);
        (Self { sender }, receiver)
    }

    fn send(&self, event: DisplayEvent) -> Result<(), DisplayError> {
        self.sender.send(event).map_err(|_| DisplayError::Disconnected)
    }
}

impl DisplayManager for ChannelDisplay {
    fn accept_bucket(&mut self, rect: PixelRect, pixels: &[Pixel]) -> Result<(), DisplayError> {
        self.send(DisplayEvent::Bucket {
            rect,
            pixels: pixels.to_vec(),
        })
    }

    fn bucket_complete(&mut self, rect: PixelRect) -> Result<(), DisplayError> {
        self.send(DisplayEvent::BucketComplete(rect))
    }

    fn image_complete(&mut self) -> Result<(), DisplayError> {
        self.send(DisplayEvent::ImageComplete)
    }
}
