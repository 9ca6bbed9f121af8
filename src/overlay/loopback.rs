use super::OverlaySink;
use anyhow::{Context, Result};
use image::RgbImage;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use v4l::video::Output;
use v4l::{Device, Format, FourCC};

/// Writes composited frames to a v4l2loopback device.
///
/// The device is switched to YUYV at the output resolution so readers
/// negotiate the right format; raw frames are then written to the device
/// file directly.
pub struct V4L2Output {
    // Held so the negotiated format outlives format-probing readers.
    _device: Device,
    file: File,
    width: u32,
    height: u32,
}

impl V4L2Output {
    pub fn new<P: AsRef<Path>>(device_path: P, width: u32, height: u32) -> Result<Self> {
        let path = device_path.as_ref();
        tracing::info!(
            "Opening v4l2loopback device at {} ({}x{})",
            path.display(),
            width,
            height
        );

        let device = Device::with_path(path)
            .with_context(|| format!("Failed to open v4l2loopback device at {}", path.display()))?;
        let format = Format::new(width, height, FourCC::new(b"YUYV"));
        Output::set_format(&device, &format)
            .context("Failed to set v4l2loopback output format")?;

        let file = File::options()
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open v4l2loopback device at {}", path.display()))?;

        Ok(Self {
            _device: device,
            file,
            width,
            height,
        })
    }
}

impl OverlaySink for V4L2Output {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let frame = if frame.dimensions() != (self.width, self.height) {
            image::imageops::resize(
                frame,
                self.width,
                self.height,
                image::imageops::FilterType::Triangle,
            )
        } else {
            frame.clone()
        };

        self.file
            .write_all(&rgb_to_yuyv(&frame))
            .context("Failed to write frame to v4l2loopback device")?;

        Ok(())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Pack an RGB frame as YUYV (4:2:2): two pixels share one U/V pair.
fn rgb_to_yuyv(frame: &RgbImage) -> Vec<u8> {
    let (width, height) = frame.dimensions();
    let mut yuyv = Vec::with_capacity((width * height * 2) as usize);

    for y in 0..height {
        let mut x = 0;
        while x < width {
            let left = frame.get_pixel(x, y);
            let right = if x + 1 < width {
                frame.get_pixel(x + 1, y)
            } else {
                left
            };

            let (y0, u0, v0) = rgb_to_yuv(left.0);
            let (y1, u1, v1) = rgb_to_yuv(right.0);

            yuyv.push(y0);
            yuyv.push(((u0 as u16 + u1 as u16) / 2) as u8);
            yuyv.push(y1);
            yuyv.push(((v0 as u16 + v1 as u16) / 2) as u8);

            x += 2;
        }
    }

    yuyv
}

/// BT.601 full-range RGB to YUV.
fn rgb_to_yuv([r, g, b]: [u8; 3]) -> (u8, u8, u8) {
    let (r, g, b) = (r as f32, g as f32, b as f32);

    let y = (0.299 * r + 0.587 * g + 0.114 * b).clamp(0.0, 255.0) as u8;
    let u = ((-0.147 * r - 0.289 * g + 0.436 * b) + 128.0).clamp(0.0, 255.0) as u8;
    let v = ((0.615 * r - 0.515 * g - 0.100 * b) + 128.0).clamp(0.0, 255.0) as u8;

    (y, u, v)
}
