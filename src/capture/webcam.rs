use super::CaptureSource;
use crate::viewport::Viewport;
use anyhow::{Context, Result};
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;

/// Live preview camera, opened once at startup and kept streaming for the
/// lifetime of the program.
pub struct PreviewCapture {
    camera: Camera,
    viewport: Viewport,
}

impl PreviewCapture {
    /// Opens the preview camera with a format closest to the viewport.
    ///
    /// Callers treat failure as "no preview": the rest of the pipeline
    /// keeps running and composites over a black base instead.
    pub fn open(device_index: u32, viewport: Viewport) -> Result<Self> {
        tracing::info!(
            "Opening preview camera {} at {}x{}",
            device_index,
            viewport.width,
            viewport.height
        );

        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(viewport.width, viewport.height),
                FrameFormat::MJPEG,
                30,
            ),
        ));

        let mut camera = Camera::new(CameraIndex::Index(device_index), requested)
            .context("Failed to open preview camera")?;

        camera
            .open_stream()
            .context("Failed to start preview stream")?;

        tracing::info!("Preview camera streaming");

        Ok(Self { camera, viewport })
    }
}

impl CaptureSource for PreviewCapture {
    fn capture_frame(&mut self) -> Result<RgbImage> {
        let frame = self
            .camera
            .frame()
            .context("Failed to read preview frame")?;

        frame
            .decode_image::<RgbFormat>()
            .context("Failed to decode preview frame")
    }

    fn resolution(&self) -> (u32, u32) {
        (self.viewport.width, self.viewport.height)
    }
}
