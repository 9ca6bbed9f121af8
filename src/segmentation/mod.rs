mod config;
mod preprocess;
mod segformer;
pub mod types;
mod worker;

pub use config::{ModelDescriptor, PreprocessorConfig};
pub use preprocess::Preprocessor;
pub use segformer::Segformer;
pub use types::{MaskImage, SegmentationModel};
pub use worker::{run_inference, spawn_inference};

use anyhow::Result;

/// Load the default segmentation model (SegFormer) from a descriptor.
pub fn load_default_model(descriptor: &ModelDescriptor) -> Result<Box<dyn SegmentationModel + Send>> {
    let model = Segformer::load(descriptor)?;
    Ok(Box::new(model))
}
