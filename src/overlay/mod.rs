mod loopback;

pub use loopback::V4L2Output;

use crate::segmentation::MaskImage;
use crate::viewport::Viewport;
use anyhow::Result;
use image::{imageops, RgbImage};

/// Trait for output destinations
pub trait OverlaySink {
    /// Write a composited frame to the output
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Get the expected output resolution
    fn resolution(&self) -> (u32, u32);
}

/// Blends the segmentation mask over the live preview at a fixed opacity.
#[derive(Debug, Clone, Copy)]
pub struct Compositor {
    viewport: Viewport,
    opacity: f32,
    mask_only: bool,
}

impl Compositor {
    pub fn new(viewport: Viewport, opacity: f32, mask_only: bool) -> Self {
        Self {
            viewport,
            opacity: opacity.clamp(0.0, 1.0),
            mask_only,
        }
    }

    /// Produce the displayed frame from the current preview and mask.
    ///
    /// No mask yet: the preview passes through unchanged. No preview
    /// (camera failed at startup): the mask is layered over black. In
    /// mask-only mode the mask is shown at full strength.
    pub fn composite(&self, preview: Option<&RgbImage>, mask: Option<&MaskImage>) -> RgbImage {
        let base = match preview {
            Some(frame) => self.fit(frame),
            None => RgbImage::new(self.viewport.width, self.viewport.height),
        };

        let Some(mask) = mask else {
            return base;
        };
        let mask = self.fit(mask);

        if self.mask_only {
            return mask;
        }

        let mut out = base;
        for (pixel, mask_pixel) in out.pixels_mut().zip(mask.pixels()) {
            for channel in 0..3 {
                let below = pixel[channel] as f32;
                let above = mask_pixel[channel] as f32;
                pixel[channel] =
                    (below + (above - below) * self.opacity).round().clamp(0.0, 255.0) as u8;
            }
        }
        out
    }

    fn fit(&self, image: &RgbImage) -> RgbImage {
        if image.dimensions() == (self.viewport.width, self.viewport.height) {
            image.clone()
        } else {
            imageops::resize(
                image,
                self.viewport.width,
                self.viewport.height,
                imageops::FilterType::Triangle,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        Viewport {
            width: 2,
            height: 2,
        }
    }

    fn solid(shade: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(2, 2, image::Rgb(shade))
    }

    #[test]
    fn no_mask_passes_preview_through() {
        let compositor = Compositor::new(viewport(), 0.5, false);
        let preview = solid([10, 20, 30]);
        let out = compositor.composite(Some(&preview), None);
        assert_eq!(out, preview);
    }

    #[test]
    fn half_opacity_averages_preview_and_mask() {
        let compositor = Compositor::new(viewport(), 0.5, false);
        let preview = solid([0, 100, 200]);
        let mask = solid([200, 100, 0]);
        let out = compositor.composite(Some(&preview), Some(&mask));
        assert_eq!(out.get_pixel(0, 0).0, [100, 100, 100]);
    }

    #[test]
    fn missing_preview_layers_mask_over_black() {
        let compositor = Compositor::new(viewport(), 0.5, false);
        let mask = solid([200, 200, 200]);
        let out = compositor.composite(None, Some(&mask));
        assert_eq!(out.get_pixel(0, 0).0, [100, 100, 100]);
    }

    #[test]
    fn mask_only_shows_mask_at_full_strength() {
        let compositor = Compositor::new(viewport(), 0.5, true);
        let preview = solid([1, 2, 3]);
        let mask = solid([200, 100, 50]);
        let out = compositor.composite(Some(&preview), Some(&mask));
        assert_eq!(out, mask);
    }

    #[test]
    fn inputs_are_fitted_to_the_viewport() {
        let compositor = Compositor::new(viewport(), 0.5, false);
        let preview = RgbImage::from_pixel(8, 8, image::Rgb([50, 50, 50]));
        let out = compositor.composite(Some(&preview), None);
        assert_eq!(out.dimensions(), (2, 2));
    }

    #[test]
    fn opacity_is_clamped() {
        let compositor = Compositor::new(viewport(), 7.0, false);
        let preview = solid([0, 0, 0]);
        let mask = solid([100, 100, 100]);
        let out = compositor.composite(Some(&preview), Some(&mask));
        assert_eq!(out.get_pixel(0, 0).0, [100, 100, 100]);
    }
}
