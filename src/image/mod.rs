//! Image manipulation.
//!
//! This module provides:
//!
//! - The [`Image`] type, an owned RGBA image.
//! - A variety of [`draw`] functions to annotate frames and lay out the window contents.
//! - [`Rect`], a floating-point rectangle describing parts of an image, and [`Resolution`].

pub mod draw;
mod rect;
mod resolution;


use std::{fmt, ops::Index, path::Path};

use ::image::{imageops, ImageBuffer, Rgba, RgbaImage};
use embedded_graphics::{pixelcolor::raw::RawU32, prelude::PixelColor};

pub use rect::*;
pub use resolution::*;

#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    fn from_path(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("jpg" | "jpeg") => Ok(Self::Jpeg),
            Some("png") => Ok(Self::Png),
            _ => anyhow::bail!(
                "invalid image path '{}' (must have one of the supported extensions)",
                path.display()
            ),
        }
    }
}

/// An 8-bit sRGB image with alpha channel.
#[derive(Clone)]
pub struct Image {
    // RGBA8 so that the window texture can be uploaded without conversion.
    pub(crate) buf: RgbaImage,
}

impl Image {
    /// Loads an image from the filesystem.
    ///
    /// The path must have a supported file extension (`jpeg`, `jpg` or `png`).
    pub fn load<A: AsRef<Path>>(path: A) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref())
    }

    fn load_impl(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read(path)?;
        match ImageFormat::from_path(path)? {
            ImageFormat::Jpeg => Self::decode_jpeg(&data),
            ImageFormat::Png => {
                let buf = ::image::load_from_memory_with_format(&data, ::image::ImageFormat::Png)?
                    .to_rgba8();
                Ok(Self { buf })
            }
        }
    }

    /// Decodes a JFIF JPEG or Motion JPEG from a byte slice.
    pub fn decode_jpeg(data: &[u8]) -> anyhow::Result<Self> {
        let buf =
            ::image::load_from_memory_with_format(data, ::image::ImageFormat::Jpeg)?.to_rgba8();
        Ok(Self { buf })
    }

    /// Creates an empty image of a specified size.
    ///
    /// The image will start out black and fully transparent.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: ImageBuffer::new(width, height),
        }
    }

    /// Creates an image of a specified size with every pixel set to `color`.
    pub fn filled(res: Resolution, color: Color) -> Self {
        Self {
            buf: ImageBuffer::from_pixel(res.width(), res.height(), Rgba(color.0)),
        }
    }

    /// Returns the width of this image, in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    /// Returns the height of this image, in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    /// Returns the size of this image.
    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns a [`Rect`] covering this image.
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_top_left(0.0, 0.0, self.width() as f32, self.height() as f32)
    }

    /// Gets the image color at the given pixel coordinates.
    ///
    /// Returns [`None`] if `(x, y)` lies outside of the image.
    pub fn get(&self, x: i64, y: i64) -> Option<Color> {
        if x < 0 || y < 0 || x >= i64::from(self.width()) || y >= i64::from(self.height()) {
            return None;
        }
        Some(Color(self.buf[(x as u32, y as u32)].0))
    }

    /// Sets the image color at the given pixel coordinates.
    ///
    /// Writes outside of the image are ignored.
    pub fn set(&mut self, x: i64, y: i64, color: Color) {
        if x < 0 || y < 0 || x >= i64::from(self.width()) || y >= i64::from(self.height()) {
            return;
        }
        self.buf[(x as u32, y as u32)] = Rgba(color.0);
    }

    pub fn flip_horizontal_in_place(&mut self) {
        imageops::flip_horizontal_in_place(&mut self.buf);
    }

    /// Returns a copy of `self` resized to `res`, stretching the image if the aspect ratio differs.
    pub fn resized(&self, res: Resolution) -> Image {
        if res == self.resolution() {
            return self.clone();
        }

        Image {
            buf: imageops::resize(
                &self.buf,
                res.width(),
                res.height(),
                imageops::FilterType::Triangle,
            ),
        }
    }

    /// Returns a copy of `self`, scaled to the largest size that fits into `bounds` while keeping
    /// the aspect ratio.
    pub fn scaled_to_fit(&self, bounds: Resolution) -> Image {
        self.resized(self.resolution().fit_into(bounds))
    }

    /// Copies `src` into `self`, placing its top left corner at `(x, y)`.
    ///
    /// Parts of `src` that fall outside of `self` are clipped.
    pub fn blit_from(&mut self, x: i64, y: i64, src: &Image) {
        imageops::replace(&mut self.buf, &src.buf, x, y);
    }

    /// Clears the image, setting every pixel value to `color`.
    pub fn clear(&mut self, color: Color) {
        self.buf.pixels_mut().for_each(|pix| pix.0 = color.0);
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        self.buf.as_raw()
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} Image", self.width(), self.height())
    }
}

/// An 8-bit RGBA color.
///
/// Colors are always in the sRGB color space and use non-premultiplied alpha.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Color(pub(crate) [u8; 4]);

impl Color {
    /// Fully transparent black (all components are 0).
    pub const NULL: Self = Self([0, 0, 0, 0]);
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const RED: Self = Self([255, 0, 0, 255]);
    pub const GREEN: Self = Self([0, 255, 0, 255]);
    pub const BLUE: Self = Self([0, 0, 255, 255]);
    pub const YELLOW: Self = Self([255, 255, 0, 255]);
    pub const CYAN: Self = Self([0, 255, 255, 255]);

    #[inline]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    #[inline]
    pub fn r(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> u8 {
        self.0[2]
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.0[3]
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}{:02x}",
            self.r(),
            self.g(),
            self.b(),
            self.a(),
        )
    }
}

impl Index<usize> for Color {
    type Output = u8;

    #[inline]
    fn index(&self, index: usize) -> &u8 {
        &self.0[index]
    }
}

// FIXME leaks `embedded-graphics` dependency
impl PixelColor for Color {
    type Raw = RawU32;
}
