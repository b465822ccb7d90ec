//! Reyes Core - render configuration and shared attribute state.
//!
//! This crate provides:
//!
//! - **Options**: `RenderOptions` and the camera/filter/bucket settings
//!   the pipeline is driven by, loadable from JSON
//! - **Attributes**: immutable per-object snapshots (`Attributes`) stored in
//!   an `AttributeStore` and shared by handle between a surface and all of
//!   its split descendants
//!
//! # Example
//!
//! ```ignore
//! use reyes_core::RenderOptions;
//!
//! let options = RenderOptions::load("render.json")?;
//! println!("{}x{} @ {:?} samples",
//!     options.width, options.height, options.pixel_samples);
//! ```

pub mod attributes;
pub mod error;
pub mod options;

// Re-export commonly used types
pub use attributes::{AttributeStore, Attributes, AttributesId};
pub use error::{OptionsError, OptionsResult};
pub use options::{
    BucketOrder, CameraOptions, CropWindow, DepthOfField, FilterKind, FilterOptions, Projection,
    RenderOptions,
};
