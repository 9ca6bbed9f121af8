use crate::capture::{spawn_sampler, SamplerConfig};
use crate::segmentation::{spawn_inference, MaskImage, ModelDescriptor};
use crate::state::{LatestCell, TokenGate};
use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Owns the sampler and inference threads and the state they share with
/// the render loop.
///
/// Shutdown is scoped: `shutdown()` (or dropping the pipeline) clears the
/// running flag and joins both threads, so the sampling schedule and any
/// per-tick camera are released on every exit path.
pub struct Pipeline {
    overlay: Arc<TokenGate<MaskImage>>,
    running: Arc<AtomicBool>,
    sampler: Option<JoinHandle<()>>,
    inference: Option<JoinHandle<()>>,
}

impl Pipeline {
    pub fn start(sampler_config: SamplerConfig, descriptor: ModelDescriptor) -> Self {
        let frames: Arc<LatestCell<RgbImage>> = Arc::new(LatestCell::new());
        let overlay = Arc::new(TokenGate::new());
        let running = Arc::new(AtomicBool::new(true));

        let sampler = spawn_sampler(
            sampler_config,
            Arc::clone(&frames),
            Arc::clone(&running),
        );
        let inference = spawn_inference(
            descriptor,
            Arc::clone(&frames),
            Arc::clone(&overlay),
            Arc::clone(&running),
        );

        Self {
            overlay,
            running,
            sampler: Some(sampler),
            inference: Some(inference),
        }
    }

    /// Latest rendered mask, if inference has produced one yet.
    pub fn current_overlay(&self) -> Option<MaskImage> {
        self.overlay.snapshot().map(|(_, mask)| mask)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stops the schedule and joins both worker threads. Idempotent.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.sampler.take() {
            if handle.join().is_err() {
                tracing::error!("Sampler thread panicked");
            }
        }
        if let Some(handle) = self.inference.take() {
            if handle.join().is_err() {
                tracing::error!("Inference thread panicked");
            }
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::Viewport;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config() -> SamplerConfig {
        SamplerConfig {
            device_index: 250, // no such camera; grabs fail and are swallowed
            viewport: Viewport {
                width: 4,
                height: 4,
            },
            period: Duration::from_millis(10),
        }
    }

    fn descriptor() -> ModelDescriptor {
        // Model load fails; the worker logs and exits, which the
        // pipeline's shutdown still handles.
        ModelDescriptor::new(PathBuf::from("/nonexistent/model.onnx"), None, None)
    }

    #[test]
    fn shutdown_joins_both_threads() {
        let mut pipeline = Pipeline::start(config(), descriptor());
        assert!(pipeline.is_running());
        std::thread::sleep(Duration::from_millis(30));

        pipeline.shutdown();
        assert!(!pipeline.is_running());
        assert!(pipeline.sampler.is_none());
        assert!(pipeline.inference.is_none());

        // Idempotent
        pipeline.shutdown();
    }

    #[test]
    fn drop_performs_shutdown() {
        let pipeline = Pipeline::start(config(), descriptor());
        let running = Arc::clone(&pipeline.running);
        drop(pipeline);
        assert!(!running.load(Ordering::Relaxed));
    }

    #[test]
    fn overlay_is_empty_until_inference_publishes() {
        let mut pipeline = Pipeline::start(config(), descriptor());
        assert!(pipeline.current_overlay().is_none());
        pipeline.shutdown();
    }
}
