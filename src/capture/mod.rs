mod sampler;
mod webcam;

pub use sampler::{grab_still, run_sampler, spawn_sampler, SamplerConfig};
pub use webcam::PreviewCapture;

use anyhow::Result;
use image::RgbImage;

/// Trait for camera capture sources
pub trait CaptureSource {
    /// Capture a single frame
    fn capture_frame(&mut self) -> Result<RgbImage>;

    /// Get the resolution of captured frames
    fn resolution(&self) -> (u32, u32);
}
