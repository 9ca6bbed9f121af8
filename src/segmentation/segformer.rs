use super::config::ModelDescriptor;
use super::preprocess::{argmax_classes, colorize, resize_mask, Preprocessor};
use super::types::{MaskImage, SegmentationModel};
use anyhow::{Context, Result};
use image::RgbImage;
use ort::{GraphOptimizationLevel, Session};

/// SegFormer semantic segmentation over an ONNX Runtime session.
///
/// The graph takes one normalized NCHW frame and returns per-class logits
/// at a quarter of the input resolution; the mask is argmaxed, colorized,
/// and scaled back to frame size.
pub struct Segformer {
    session: Session,
    preprocessor: Preprocessor,
    labels: Option<Vec<String>>,
}

impl Segformer {
    /// Load model weights and sidecar configs named by the descriptor.
    pub fn load(descriptor: &ModelDescriptor) -> Result<Self> {
        let path = &descriptor.model_path;
        tracing::info!("Loading segmentation model from {}", path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        let preprocessor_config = descriptor
            .load_preprocessor()
            .context("Failed to load preprocessor config")?;
        let labels = descriptor
            .load_labels()
            .context("Failed to load label table")?;

        tracing::info!(
            "Segmentation model loaded: input {0}x{0}, {1} labels",
            preprocessor_config.size,
            labels.as_ref().map_or(0, Vec::len)
        );

        Ok(Self {
            session,
            preprocessor: Preprocessor::new(&preprocessor_config),
            labels,
        })
    }

    fn label(&self, class_id: u16) -> &str {
        self.labels
            .as_deref()
            .and_then(|labels| labels.get(class_id as usize))
            .map(String::as_str)
            .unwrap_or("?")
    }

    fn log_dominant_class(&self, classes: &[u16]) {
        if classes.is_empty() {
            return;
        }
        let mut counts = std::collections::HashMap::new();
        for &class in classes {
            *counts.entry(class).or_insert(0usize) += 1;
        }
        if let Some((&class, &count)) = counts.iter().max_by_key(|entry| *entry.1) {
            tracing::debug!(
                "Dominant class: {} ({}) covering {}% of frame",
                class,
                self.label(class),
                count * 100 / classes.len()
            );
        }
    }
}

impl SegmentationModel for Segformer {
    fn process(&mut self, frame: &RgbImage) -> Result<MaskImage> {
        let _span = tracing::debug_span!("segformer_process").entered();

        let input_tensor = self.preprocessor.preprocess(frame)?;

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![input_tensor.view()]?)
            .context("Failed to run inference")?;
        drop(_infer_span);

        let logits = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract logits")?;

        let (classes, mask_width, mask_height) = argmax_classes(&logits.view())?;
        self.log_dominant_class(&classes);

        let mask = colorize(&classes, mask_width, mask_height);
        let (frame_width, frame_height) = frame.dimensions();
        Ok(resize_mask(&mask, frame_width, frame_height))
    }

    fn input_size(&self) -> (u32, u32) {
        let side = self.preprocessor.input_size();
        (side, side)
    }
}
