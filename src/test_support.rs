//! Shared fixtures for unit tests: synthetic images and a recording encoder sink.

use crate::error::{TimelapseError, TimelapseResult};
use crate::video_processor::{EncodeSettings, FrameSink, SinkFactory};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbImage, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Solid-color JPEG of the given size
pub fn jpeg_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let pixels = RgbImage::from_pixel(width, height, image::Rgb(rgb));
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 95)
        .encode(pixels.as_raw(), width, height, ColorType::Rgb8)
        .unwrap();
    out
}

/// Half-transparent PNG with an alpha channel
pub fn png_rgba_bytes(width: u32, height: u32) -> Vec<u8> {
    let pixels = RgbaImage::from_pixel(width, height, Rgba([0, 128, 255, 128]));
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(pixels.as_raw(), width, height, ColorType::Rgba8)
        .unwrap();
    out
}

/// PNG whose header is valid but whose compressed pixel data is corrupt,
/// so the dimensions can be read while a full decode fails
pub fn png_corrupt_pixels_bytes(width: u32, height: u32) -> Vec<u8> {
    let pixels = RgbImage::from_pixel(width, height, image::Rgb([128, 128, 128]));
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(pixels.as_raw(), width, height, ColorType::Rgb8)
        .unwrap();

    // First payload byte of IDAT is the zlib CMF byte; flipping it breaks the stream
    let idat = out.windows(4).position(|w| w == b"IDAT").unwrap();
    out[idat + 4] ^= 0xFF;
    out
}

pub fn write_jpeg(dir: &Path, name: &str, width: u32, height: u32, rgb: [u8; 3]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, jpeg_bytes(width, height, rgb)).unwrap();
    path
}

/// ffmpeg is installed and was built with libx264
pub fn ffmpeg_available() -> bool {
    let Some(ffmpeg) = crate::platform::PlatformCommands::instance().get_tool_path("ffmpeg") else {
        return false;
    };
    std::process::Command::new(ffmpeg)
        .args(["-hide_banner", "-encoders"])
        .output()
        .map(|output| String::from_utf8_lossy(&output.stdout).contains("libx264"))
        .unwrap_or(false)
}

/// What the recording sink saw for one frame
#[derive(Debug, Clone)]
pub struct RecordedFrame {
    pub width: u32,
    pub height: u32,
    pub mean: [u8; 3],
}

impl RecordedFrame {
    pub fn dominant_red(&self) -> bool {
        self.mean[0] > 200 && self.mean[1] < 60 && self.mean[2] < 60
    }

    pub fn dominant_blue(&self) -> bool {
        self.mean[2] > 200 && self.mean[0] < 60 && self.mean[1] < 60
    }
}

/// Sink factory that keeps frames in memory and writes a placeholder file on finish
#[derive(Default)]
pub struct RecordingSinkFactory {
    frames: Arc<Mutex<Vec<RecordedFrame>>>,
    fail_open: bool,
}

impl RecordingSinkFactory {
    pub fn failing() -> Self {
        Self {
            frames: Arc::default(),
            fail_open: true,
        }
    }

    pub fn frames(&self) -> Vec<RecordedFrame> {
        self.frames.lock().unwrap().clone()
    }
}

impl SinkFactory for RecordingSinkFactory {
    fn open(&self, settings: &EncodeSettings) -> TimelapseResult<Box<dyn FrameSink>> {
        if self.fail_open {
            return Err(TimelapseError::EncoderInit("recording sink told to fail".to_string()));
        }
        Ok(Box::new(RecordingSink {
            frames: self.frames.clone(),
            output_path: settings.output_path.clone(),
            count: 0,
        }))
    }
}

struct RecordingSink {
    frames: Arc<Mutex<Vec<RecordedFrame>>>,
    output_path: PathBuf,
    count: usize,
}

impl FrameSink for RecordingSink {
    fn write_frame(&mut self, frame: &RgbImage) -> TimelapseResult<()> {
        let mut sums = [0u64; 3];
        for pixel in frame.pixels() {
            for (sum, channel) in sums.iter_mut().zip(pixel.0) {
                *sum += channel as u64;
            }
        }
        let n = (frame.width() as u64 * frame.height() as u64).max(1);

        self.frames.lock().unwrap().push(RecordedFrame {
            width: frame.width(),
            height: frame.height(),
            mean: sums.map(|s| (s / n) as u8),
        });
        self.count += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> TimelapseResult<()> {
        if self.count > 0 {
            std::fs::write(&self.output_path, format!("fake video with {} frames", self.count))?;
        }
        Ok(())
    }
}
