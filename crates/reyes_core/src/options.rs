//! Render-wide configuration.
//!
//! Every value the pipeline reads at render time lives here: image size,
//! sampling and filtering, dicing limits, bucket layout and the camera.
//! Options deserialize from JSON with every field optional.

use std::path::Path;

use reyes_math::Interval;
use serde::{Deserialize, Serialize};

use crate::error::{OptionsError, OptionsResult};

/// Order in which buckets are visited and handed to the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketOrder {
    /// Row by row, left to right.
    #[default]
    Horizontal,
    /// Column by column, top to bottom.
    Vertical,
    /// Rows alternating left-to-right and right-to-left.
    ZigZag,
    /// Nearest to the image centre first.
    Spiral,
    /// A seeded shuffle.
    Random,
}

/// Pixel reconstruction filter kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Box,
    Triangle,
    CatmullRom,
    #[default]
    Gaussian,
    Sinc,
    Disk,
}

/// Filter kernel plus its support in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    pub kind: FilterKind,
    /// Full filter width in x and y (pixels).
    pub width: [f32; 2],
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            kind: FilterKind::Gaussian,
            width: [2.0, 2.0],
        }
    }
}

/// Sub-rectangle of the image to render, as fractions of the full frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropWindow {
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
}

impl Default for CropWindow {
    fn default() -> Self {
        Self {
            x_min: 0.0,
            x_max: 1.0,
            y_min: 0.0,
            y_max: 1.0,
        }
    }
}

impl CropWindow {
    /// Pixel rectangle `(x0, y0, x1, y1)` (end exclusive) covered by the
    /// crop window for an image of the given size.
    pub fn raster_rect(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let clamp = |v: f32, n: u32| ((v * n as f32).ceil().max(0.0) as u32).min(n);
        (
            clamp(self.x_min, width),
            clamp(self.y_min, height),
            clamp(self.x_max, width),
            clamp(self.y_max, height),
        )
    }
}

/// Camera projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Projection {
    /// Perspective projection with a field of view in degrees, measured
    /// across the shorter screen axis.
    Perspective { fov: f32 },
    Orthographic,
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Perspective { fov: 90.0 }
    }
}

/// Thin-lens depth of field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthOfField {
    pub fstop: f32,
    pub focal_length: f32,
    pub focal_distance: f32,
}

/// Camera description consumed by the projection provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraOptions {
    pub projection: Projection,
    /// Hither clipping plane (camera-space depth).
    pub near: f32,
    /// Yon clipping plane (camera-space depth).
    pub far: f32,
    /// Screen window `[left, right, bottom, top]`; derived from the frame
    /// aspect ratio when absent.
    pub screen_window: Option<[f32; 4]>,
    pub depth_of_field: Option<DepthOfField>,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            projection: Projection::default(),
            near: 0.01,
            far: 1.0e6,
            screen_window: None,
            depth_of_field: None,
        }
    }
}

/// Render configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    pub crop_window: CropWindow,
    /// Stochastic sub-samples per pixel in x and y
    pub pixel_samples: [u32; 2],
    pub filter: FilterOptions,
    /// Micropolygon area in pixels; attributes may override it
    pub shading_rate: f32,
    /// Largest micropolygon count a diceable grid may have
    pub max_grid_size: u32,
    /// Forced splits allowed for a surface crossing the hither plane
    pub max_eye_splits: u32,
    /// Ordinary splits allowed along one surface lineage
    pub max_split_depth: u32,
    pub bucket_size: [u32; 2],
    pub bucket_order: BucketOrder,
    /// Snap dice resolution to powers of two; attributes may override it
    pub binary_dicing: bool,
    /// Jitter sample positions, times and lens positions within their strata
    pub jitter: bool,
    pub seed: u64,
    /// Shutter open and close times
    pub shutter: [f32; 2],
    pub camera: CameraOptions,
    /// Skip dicing surfaces already hidden in the current bucket
    pub occlusion_culling: bool,
    /// Micropolygons gathered before an intermediate sampling pass
    pub sample_batch: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            crop_window: CropWindow::default(),
            pixel_samples: [2, 2],
            filter: FilterOptions::default(),
            shading_rate: 1.0,
            max_grid_size: 256,
            max_eye_splits: 10,
            max_split_depth: 48,
            bucket_size: [16, 16],
            bucket_order: BucketOrder::Horizontal,
            binary_dicing: false,
            jitter: true,
            seed: 0,
            shutter: [0.0, 0.0],
            camera: CameraOptions::default(),
            occlusion_culling: true,
            sample_batch: 512,
        }
    }
}

impl RenderOptions {
    /// Parse options from a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> OptionsResult<Self> {
        let options: RenderOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> OptionsResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| OptionsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let options = Self::from_json_str(&json)?;
        log::info!(
            "Loaded render options from {:?}: {}x{}",
            path,
            options.width,
            options.height
        );
        Ok(options)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_string(&self) -> OptionsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every value for consistency.
    pub fn validate(&self) -> OptionsResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(OptionsError::invalid("resolution", "width and height must be non-zero"));
        }
        if self.pixel_samples.iter().any(|&n| n == 0) {
            return Err(OptionsError::invalid("pixel_samples", "must be at least 1 in each axis"));
        }
        if self
            .filter
            .width
            .iter()
            .any(|w| !w.is_finite() || *w <= 0.0)
        {
            return Err(OptionsError::invalid("filter.width", "must be positive"));
        }
        if !self.shading_rate.is_finite() || self.shading_rate <= 0.0 {
            return Err(OptionsError::invalid("shading_rate", "must be positive"));
        }
        if self.max_grid_size == 0 {
            return Err(OptionsError::invalid("max_grid_size", "must be at least 1"));
        }
        if self.bucket_size.iter().any(|&n| n == 0) {
            return Err(OptionsError::invalid("bucket_size", "must be at least 1 in each axis"));
        }
        if self.sample_batch == 0 {
            return Err(OptionsError::invalid("sample_batch", "must be at least 1"));
        }
        let [open, close] = self.shutter;
        if !(open.is_finite() && close.is_finite() && open <= close) {
            return Err(OptionsError::invalid("shutter", "open must not exceed close"));
        }

        let crop = &self.crop_window;
        let unit = Interval::new(0.0, 1.0);
        if !(unit.contains(crop.x_min)
            && unit.contains(crop.x_max)
            && unit.contains(crop.y_min)
            && unit.contains(crop.y_max))
            || crop.x_min >= crop.x_max
            || crop.y_min >= crop.y_max
        {
            return Err(OptionsError::invalid("crop_window", "must be a non-empty sub-range of [0, 1]"));
        }
        let (x0, y0, x1, y1) = self.crop_rect();
        if x0 >= x1 || y0 >= y1 {
            return Err(OptionsError::invalid("crop_window", "covers no pixels"));
        }

        let camera = &self.camera;
        if !(camera.near > 0.0 && camera.far > camera.near) {
            return Err(OptionsError::invalid("camera.near", "need 0 < near < far"));
        }
        if let Projection::Perspective { fov } = camera.projection {
            if !(fov > 0.0 && fov < 180.0) {
                return Err(OptionsError::invalid("camera.projection.fov", "must be in (0, 180) degrees"));
            }
        }
        if let Some([left, right, bottom, top]) = camera.screen_window {
            if left >= right || bottom >= top {
                return Err(OptionsError::invalid("camera.screen_window", "must have positive extent"));
            }
        }
        if let Some(dof) = &camera.depth_of_field {
            if !(dof.fstop > 0.0 && dof.focal_length > 0.0 && dof.focal_distance > dof.focal_length) {
                return Err(OptionsError::invalid(
                    "camera.depth_of_field",
                    "need fstop > 0, focal_length > 0 and focal_distance > focal_length",
                ));
            }
        }
        Ok(())
    }

    /// Sub-samples per pixel.
    pub fn samples_per_pixel(&self) -> usize {
        (self.pixel_samples[0] * self.pixel_samples[1]) as usize
    }

    /// Pixel rectangle `(x0, y0, x1, y1)` covered by the crop window.
    pub fn crop_rect(&self) -> (u32, u32, u32, u32) {
        self.crop_window.raster_rect(self.width, self.height)
    }

    /// Width over height of the full frame.
    pub fn frame_aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Shutter as an interval.
    pub fn shutter_interval(&self) -> Interval {
        Interval::new(self.shutter[0], self.shutter[1])
    }

    /// Screen window `[left, right, bottom, top]`, either explicit or
    /// derived from the frame aspect ratio so the shorter axis spans [-1, 1].
    pub fn screen_window(&self) -> [f32; 4] {
        if let Some(window) = self.camera.screen_window {
            return window;
        }
        let aspect = self.frame_aspect();
        if aspect >= 1.0 {
            [-aspect, aspect, -1.0, 1.0]
        } else {
            [-1.0, 1.0, -1.0 / aspect, 1.0 / aspect]
        }
    }
}
