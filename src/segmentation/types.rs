use anyhow::Result;
use image::RgbImage;

/// Rendered segmentation mask, one color per semantic class, sized to the
/// frame it was computed from.
pub type MaskImage = RgbImage;

/// Capability contract for segmentation models.
///
/// Initialization happens in the implementation's constructor; the
/// adapter that drives inference depends only on this trait.
pub trait SegmentationModel {
    /// Process a frame and return a rendered class mask
    ///
    /// # Arguments
    /// * `frame` - Input RGB frame
    ///
    /// # Returns
    /// * Mask image with the same dimensions as `frame`
    fn process(&mut self, frame: &RgbImage) -> Result<MaskImage>;

    /// Get the model's preferred input dimensions
    ///
    /// Returns (width, height)
    fn input_size(&self) -> (u32, u32);
}
