use super::types::{MaskImage, SegmentationModel};
use super::{load_default_model, ModelDescriptor};
use crate::state::{FrameToken, LatestCell, TokenGate};
use anyhow::{Context, Result};
use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const WAIT_SLICE: Duration = Duration::from_millis(100);

/// Drives a ready model over the frame slot until `running` clears.
///
/// `ready_mark` is the newest frame token at the moment the model became
/// ready; that frame and everything older is skipped, since readiness
/// only covers frames that arrive afterwards. Each newer token
/// gets exactly one processing call, and the result is applied through the
/// token gate so a stale completion never replaces a newer mask.
///
/// A processing error ends the worker; unrecovered by design.
pub fn run_inference(
    mut model: Box<dyn SegmentationModel + Send>,
    frames: &LatestCell<RgbImage>,
    overlay: &TokenGate<MaskImage>,
    running: &AtomicBool,
    ready_mark: Option<FrameToken>,
) -> Result<()> {
    let mut seen = ready_mark;
    if seen.is_some() {
        tracing::debug!("Skipping frame published before model readiness");
    }

    while running.load(Ordering::Relaxed) {
        let Some((token, frame)) = frames.wait_newer(seen, WAIT_SLICE) else {
            continue;
        };
        seen = Some(token);

        let mask = model
            .process(&frame)
            .context("Failed to process frame")?;

        if overlay.apply(token, mask) {
            tracing::debug!("Published overlay for {:?}", token);
        } else {
            tracing::debug!("Discarded stale overlay for {:?}", token);
        }
    }

    Ok(())
}

/// Spawns the inference worker: loads the model on the worker thread so
/// sampling starts immediately, then hands off to [`run_inference`].
pub fn spawn_inference(
    descriptor: ModelDescriptor,
    frames: Arc<LatestCell<RgbImage>>,
    overlay: Arc<TokenGate<MaskImage>>,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("inference".into())
        .spawn(move || {
            let model = match load_default_model(&descriptor) {
                Ok(model) => model,
                Err(e) => {
                    tracing::error!("Model initialization failed: {e:#}");
                    return;
                }
            };
            tracing::info!("Model ready, processing new frames");
            let ready_mark = frames.latest_token();

            if let Err(e) = run_inference(model, &frames, &overlay, &running, ready_mark) {
                tracing::error!("Inference worker failed: {e:#}");
            }
        })
        .expect("failed to spawn inference thread")
}
