use crate::state::LatestCell;
use crate::viewport::Viewport;
use anyhow::{Context, Result};
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct SamplerConfig {
    pub device_index: u32,
    pub viewport: Viewport,
    pub period: Duration,
}

/// Takes one still photo from a freshly opened camera stream.
///
/// The stream lives only for the duration of this call: it is stopped
/// explicitly and the camera dropped before returning, success or not.
pub fn grab_still(device_index: u32, viewport: Viewport) -> Result<RgbImage> {
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
        CameraFormat::new(
            Resolution::new(viewport.width, viewport.height),
            FrameFormat::MJPEG,
            30,
        ),
    ));

    let mut camera = Camera::new(CameraIndex::Index(device_index), requested)
        .context("Failed to open still camera")?;
    camera
        .open_stream()
        .context("Failed to start still stream")?;

    let result = camera
        .frame()
        .context("Failed to take still photo")
        .and_then(|frame| {
            frame
                .decode_image::<RgbFormat>()
                .context("Failed to decode still photo")
        });

    if let Err(e) = camera.stop_stream() {
        tracing::debug!("Still stream close failed: {e}");
    }

    result
}

/// Runs the sampling schedule until `running` clears.
///
/// Each tick invokes `grab` once and publishes the result into `frames`,
/// replacing the previous still. A failed tick is logged and the schedule
/// continues; ticks fire on a drift-free period regardless of how long a
/// grab took or whether it succeeded.
pub fn run_sampler<G>(
    mut grab: G,
    frames: &LatestCell<RgbImage>,
    running: &AtomicBool,
    period: Duration,
) where
    G: FnMut() -> Result<RgbImage>,
{
    let mut next_tick = Instant::now();

    while running.load(Ordering::Relaxed) {
        match grab() {
            Ok(image) => {
                let token = frames.publish(image);
                tracing::debug!("Published still {:?}", token);
            }
            Err(e) => {
                tracing::warn!("Still capture failed: {e:#}");
            }
        }

        next_tick += period;
        loop {
            if !running.load(Ordering::Relaxed) {
                return;
            }
            let now = Instant::now();
            if now >= next_tick {
                break;
            }
            // Sleep in short slices so shutdown is observed promptly.
            std::thread::sleep((next_tick - now).min(Duration::from_millis(50)));
        }
    }
}

/// Spawns the sampler on its own thread, grabbing from a fresh camera
/// stream each tick.
pub fn spawn_sampler(
    config: SamplerConfig,
    frames: Arc<LatestCell<RgbImage>>,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("sampler".into())
        .spawn(move || {
            tracing::info!(
                "Sampler started: every {:?} at {}x{}",
                config.period,
                config.viewport.width,
                config.viewport.height
            );
            run_sampler(
                || grab_still(config.device_index, config.viewport),
                &frames,
                &running,
                config.period,
            );
            tracing::info!("Sampler stopped");
        })
        .expect("failed to spawn sampler thread")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn test_image(shade: u8) -> RgbImage {
        RgbImage::from_pixel(2, 2, image::Rgb([shade, shade, shade]))
    }

    #[test]
    fn keeps_ticking_after_a_failed_grab() {
        let frames = LatestCell::new();
        let running = AtomicBool::new(true);
        let attempts = AtomicUsize::new(0);

        run_sampler(
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n >= 3 {
                    running.store(false, Ordering::SeqCst);
                }
                if n == 0 {
                    anyhow::bail!("camera unavailable");
                }
                Ok(test_image(n as u8))
            },
            &frames,
            &running,
            Duration::from_millis(5),
        );

        assert!(attempts.load(Ordering::SeqCst) >= 2);
        // The failed first tick did not stop later publishes.
        assert!(frames.snapshot().is_some());
    }

    #[test]
    fn newest_still_replaces_previous() {
        let frames = LatestCell::new();
        let running = AtomicBool::new(true);
        let attempts = AtomicUsize::new(0);

        run_sampler(
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n == 2 {
                    running.store(false, Ordering::SeqCst);
                }
                Ok(test_image(n as u8))
            },
            &frames,
            &running,
            Duration::from_millis(1),
        );

        let (_, image) = frames.snapshot().unwrap();
        let last = attempts.load(Ordering::SeqCst) as u8 - 1;
        assert_eq!(image.get_pixel(0, 0).0[0], last);
    }

    #[test]
    fn ticks_follow_the_configured_period() {
        let frames = LatestCell::new();
        let running = AtomicBool::new(true);
        let attempts = AtomicUsize::new(0);
        let period = Duration::from_millis(20);

        let start = Instant::now();
        run_sampler(
            || {
                if attempts.fetch_add(1, Ordering::SeqCst) == 3 {
                    running.store(false, Ordering::SeqCst);
                }
                Ok(test_image(0))
            },
            &frames,
            &running,
            period,
        );

        // Four grabs, three full periods between them.
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert!(start.elapsed() >= period * 3);
    }

    #[test]
    fn stops_promptly_when_running_clears() {
        let frames = Arc::new(LatestCell::new());
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let frames = Arc::clone(&frames);
            let running = Arc::clone(&running);
            std::thread::spawn(move || {
                run_sampler(
                    || Ok(test_image(7)),
                    &frames,
                    &running,
                    Duration::from_secs(60),
                )
            })
        };

        std::thread::sleep(Duration::from_millis(20));
        running.store(false, Ordering::SeqCst);
        let start = Instant::now();
        handle.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
