//! Render and display errors.
//!
//! Geometry never produces an error: degenerate input is culled or
//! discarded. These cover configuration and output only.

use reyes_core::OptionsError;
use thiserror::Error;

/// A display collaborator could not take a bucket or finish the image.
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("Display disconnected")]
    Disconnected,

    #[error("Bucket at ({x}, {y}) of {width}x{height} lies outside the {image_width}x{image_height} image")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("Failed to write image: {0}")]
    Image(#[from] image::ImageError),
}

/// Errors returned by `ImageBuffer`.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid render options: {0}")]
    Options(#[from] OptionsError),

    #[error("Display error: {0}")]
    Display(#[from] DisplayError),
}

/// Result type for rendering.
pub type RenderResult<T> = Result<T, RenderError>;
