//! Frame buffers produced by sampling a composition.
//!
//! Pixel storage is reference counted and copy-on-write: cloning a frame is
//! cheap, and the first writer through [`Frame::pixels_mut`] gets a private
//! copy. A frame held by the cache can therefore never be modified through
//! a handle given out to a caller.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, Pixel, Rgb, Rgba, RgbaImage};

use subcraft_common::error::{SubcraftError, SubcraftResult};

/// An 8-bit-per-channel image tagged with the time it represents.
#[derive(Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    channels: u8,
    timestamp: f64,
    pixels: Arc<Vec<u8>>,
}

impl Frame {
    /// Wrap a raw row-major buffer. The buffer length must be
    /// `width * height * channels`.
    pub fn new(
        width: u32,
        height: u32,
        channels: u8,
        timestamp: f64,
        pixels: Vec<u8>,
    ) -> SubcraftResult<Self> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(SubcraftError::render(format!(
                "unsupported channel count {channels}"
            )));
        }
        let expected = width as usize * height as usize * channels as usize;
        if pixels.len() != expected {
            return Err(SubcraftError::render(format!(
                "frame buffer holds {} bytes, {width}x{height}x{channels} needs {expected}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            timestamp,
            pixels: Arc::new(pixels),
        })
    }

    /// A frame filled with a single RGB color.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3], timestamp: f64) -> Self {
        let pixel_count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(pixel_count * 3);
        for _ in 0..pixel_count {
            pixels.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            channels: 3,
            timestamp,
            pixels: Arc::new(pixels),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Time in seconds this frame was sampled at.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Same pixels, different timestamp.
    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable pixel access. Copies the buffer first if it is shared.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        Arc::make_mut(&mut self.pixels).as_mut_slice()
    }

    /// Size of the pixel buffer in bytes.
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }

    /// Whether two frames share one pixel buffer.
    pub fn shares_pixels_with(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.channels as usize
    }

    /// Channel values of one pixel, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = self.offset(x, y);
        Some(&self.pixels[start..start + self.channels as usize])
    }

    /// Alpha-blend an RGBA color over one pixel. Out-of-bounds writes are
    /// ignored.
    pub fn blend_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        self.fill_rect(x, y, 1, 1, rgba);
    }

    /// Blend an RGBA rectangle, clipped to the frame.
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, rgba: [u8; 4]) {
        let x_end = x.saturating_add(width).min(self.width);
        let y_end = y.saturating_add(height).min(self.height);
        if x >= x_end || y >= y_end {
            return;
        }
        let (frame_width, frame_height) = self.size();
        let over = Rgba(rgba);
        let region = (x, y, x_end, y_end);
        let channels = self.channels;
        let pixels = self.pixels_mut();
        match channels {
            1 => blend_region::<Luma<u8>>(pixels, frame_width, frame_height, region, over, |p| {
                p.to_luma()
            }),
            3 => blend_region::<Rgb<u8>>(pixels, frame_width, frame_height, region, over, |p| {
                p.to_rgb()
            }),
            _ => {
                if let Some(mut bottom) =
                    ImageBuffer::<Rgba<u8>, &mut [u8]>::from_raw(frame_width, frame_height, pixels)
                {
                    let patch = RgbaImage::from_pixel(x_end - x, y_end - y, over);
                    imageops::overlay(&mut bottom, &patch, x as i64, y as i64);
                }
            }
        }
    }

    /// Nearest-neighbour resample to a new size.
    pub fn resized(&self, width: u32, height: u32) -> Frame {
        if (width, height) == (self.width, self.height) {
            return self.clone();
        }
        let channels = self.channels as usize;
        let resampled = if self.width == 0 || self.height == 0 || width == 0 || height == 0 {
            None
        } else {
            let source = self.pixels();
            match self.channels {
                1 => resample::<Luma<u8>>(source, self.width, self.height, width, height),
                3 => resample::<Rgb<u8>>(source, self.width, self.height, width, height),
                _ => resample::<Rgba<u8>>(source, self.width, self.height, width, height),
            }
        };
        let pixels = resampled
            .unwrap_or_else(|| vec![0; width as usize * height as usize * channels]);
        Frame {
            width,
            height,
            channels: self.channels,
            timestamp: self.timestamp,
            pixels: Arc::new(pixels),
        }
    }

    /// Write the frame to an image file. The format follows the file
    /// extension and falls back to PNG.
    pub fn save_image(&self, path: &Path) -> SubcraftResult<()> {
        let color = match self.channels {
            1 => image::ColorType::L8,
            3 => image::ColorType::Rgb8,
            _ => image::ColorType::Rgba8,
        };
        let format = image::ImageFormat::from_path(path).unwrap_or(image::ImageFormat::Png);
        image::save_buffer_with_format(
            path,
            self.pixels(),
            self.width,
            self.height,
            color,
            format,
        )
        .map_err(|e| SubcraftError::render(format!("failed to write {}: {e}", path.display())))
    }
}

/// Resample a raw buffer of `P` pixels with `image`'s nearest filter.
fn resample<P>(source: &[u8], width: u32, height: u32, new_width: u32, new_height: u32) -> Option<Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let view = ImageBuffer::<P, &[u8]>::from_raw(width, height, source)?;
    Some(imageops::resize(&view, new_width, new_height, FilterType::Nearest).into_raw())
}

/// Composite `over` onto every pixel of `region` (x0, y0, x1, y1; end
/// exclusive) through RGBA, converting back with `store`.
fn blend_region<P>(
    pixels: &mut [u8],
    width: u32,
    height: u32,
    region: (u32, u32, u32, u32),
    over: Rgba<u8>,
    store: fn(&Rgba<u8>) -> P,
) where
    P: Pixel<Subpixel = u8>,
{
    let Some(mut image) = ImageBuffer::<P, &mut [u8]>::from_raw(width, height, pixels) else {
        return;
    };
    let (x0, y0, x1, y1) = region;
    for y in y0..y1 {
        for x in x0..x1 {
            let pixel = image.get_pixel_mut(x, y);
            let mut composed = pixel.to_rgba();
            composed.blend(&over);
            *pixel = store(&composed);
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("timestamp", &self.timestamp)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}
