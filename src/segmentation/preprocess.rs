use super::config::PreprocessorConfig;
use anyhow::Result;
use image::{imageops, RgbImage};
use ndarray::{Array4, ArrayViewD};

/// Converts RGB frames to normalized model input tensors and model
/// outputs back to rendered class masks.
pub struct Preprocessor {
    size: u32,
    mean: [f32; 3],
    std: [f32; 3],
}

impl Preprocessor {
    pub fn new(config: &PreprocessorConfig) -> Self {
        Self {
            size: config.size,
            mean: config.image_mean,
            std: config.image_std,
        }
    }

    pub fn input_size(&self) -> u32 {
        self.size
    }

    /// Preprocess an RGB image into a normalized NCHW tensor
    ///
    /// Steps:
    /// 1. Resize to the model input size
    /// 2. Scale to [0, 1], then normalize with the configured mean/std
    /// 3. Transpose from HWC to NCHW format
    ///
    /// Returns: Array4<f32> with shape [1, 3, size, size]
    pub fn preprocess(&self, image: &RgbImage) -> Result<Array4<f32>> {
        let _span = tracing::debug_span!("preprocess").entered();

        let resized = if image.dimensions() != (self.size, self.size) {
            imageops::resize(image, self.size, self.size, imageops::FilterType::Lanczos3)
        } else {
            image.clone()
        };

        let side = self.size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));

        for (x, y, pixel) in resized.enumerate_pixels() {
            for channel in 0..3 {
                let value = pixel[channel] as f32 / 255.0;
                tensor[[0, channel, y as usize, x as usize]] =
                    (value - self.mean[channel]) / self.std[channel];
            }
        }

        Ok(tensor)
    }
}

/// Per-pixel argmax over class logits.
///
/// `logits` has shape [1, num_classes, H, W]; the result is a row-major
/// class-id map of H*W entries.
pub fn argmax_classes(logits: &ArrayViewD<f32>) -> Result<(Vec<u16>, u32, u32)> {
    let _span = tracing::debug_span!("argmax").entered();

    let shape = logits.shape();
    anyhow::ensure!(
        shape.len() == 4 && shape[0] == 1,
        "unexpected logits shape {shape:?}"
    );
    let classes = shape[1];
    let height = shape[2];
    let width = shape[3];

    let mut map = Vec::with_capacity(height * width);
    for y in 0..height {
        for x in 0..width {
            let mut best = 0usize;
            let mut best_score = f32::NEG_INFINITY;
            for c in 0..classes {
                let score = logits[[0, c, y, x]];
                if score > best_score {
                    best_score = score;
                    best = c;
                }
            }
            map.push(best as u16);
        }
    }

    Ok((map, width as u32, height as u32))
}

/// Render a class-id map as a color image, one fixed color per class.
pub fn colorize(classes: &[u16], width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let idx = (y * width + x) as usize;
        image::Rgb(class_color(classes[idx]))
    })
}

/// Deterministic color for a class id.
///
/// Walks the hue circle by the golden angle so neighboring ids get
/// visually distant colors.
pub fn class_color(class_id: u16) -> [u8; 3] {
    let hue = (class_id as f32 * 137.508) % 360.0;
    let sector = hue / 60.0;
    let fraction = sector - sector.floor();
    // Fixed saturation/value, hue-only variation
    let (low, rising, falling) = (64u8, (64.0 + 166.0 * fraction) as u8, (230.0 - 166.0 * fraction) as u8);
    match sector as u32 {
        0 => [230, rising, low],
        1 => [falling, 230, low],
        2 => [low, 230, rising],
        3 => [low, falling, 230],
        4 => [rising, low, 230],
        _ => [230, low, falling],
    }
}

/// Scale a rendered mask to the target frame size.
///
/// Nearest-neighbor keeps class boundaries hard instead of smearing
/// colors between classes.
pub fn resize_mask(mask: &RgbImage, target_width: u32, target_height: u32) -> RgbImage {
    if mask.dimensions() == (target_width, target_height) {
        return mask.clone();
    }
    imageops::resize(
        mask,
        target_width,
        target_height,
        imageops::FilterType::Nearest,
    )
}
