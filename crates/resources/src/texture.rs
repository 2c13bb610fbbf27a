//! RGBA8 texture decoding.

use std::path::Path;

use flightdeck_rhi::vk;
use tracing::info;

use crate::error::{ResourceError, ResourceResult};

/// Bytes per decoded pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Decoded image, tightly packed RGBA8, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Decodes an image file, converting whatever channel layout it has to RGBA8.
    pub fn load(path: impl AsRef<Path>) -> ResourceResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }

        let rgba = image::open(path)?.into_rgba8();
        let texture = Self::from_rgba(rgba);
        info!(
            "Loaded texture '{}' ({}x{})",
            path.display(),
            texture.width,
            texture.height
        );
        Ok(texture)
    }

    /// Decodes an encoded image (PNG, JPEG) held in memory.
    pub fn from_bytes(bytes: &[u8]) -> ResourceResult<Self> {
        Ok(Self::from_rgba(image::load_from_memory(bytes)?.into_rgba8()))
    }

    /// A single opaque white pixel, bound when no texture is configured.
    pub fn white() -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: vec![255; BYTES_PER_PIXEL],
        }
    }

    fn from_rgba(image: image::RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            pixels: image.into_raw(),
        }
    }

    /// Size as a Vulkan extent.
    pub fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.width,
            height: self.height,
        }
    }

    /// Total byte size of the pixel data.
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode_png(img: &image::DynamicImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_decode_rgba_png() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 40]));
        let bytes = encode_png(&img.into());

        let texture = TextureData::from_bytes(&bytes).unwrap();
        assert_eq!(texture.width, 3);
        assert_eq!(texture.height, 2);
        assert_eq!(texture.byte_size(), 3 * 2 * BYTES_PER_PIXEL);
        assert_eq!(&texture.pixels[..4], &[10, 20, 30, 40]);
    }

    #[test]
    fn test_rgb_gets_opaque_alpha() {
        let img = RgbImage::from_pixel(2, 2, Rgb([1, 2, 3]));
        let bytes = encode_png(&img.into());

        let texture = TextureData::from_bytes(&bytes).unwrap();
        assert_eq!(texture.pixels.len(), 16);
        assert!(texture.pixels.chunks(4).all(|p| p == [1, 2, 3, 255]));
    }

    #[test]
    fn test_white_fallback() {
        let white = TextureData::white();
        assert_eq!(white.extent(), vk::Extent2D { width: 1, height: 1 });
        assert_eq!(white.pixels, vec![255, 255, 255, 255]);
    }

    #[test]
    fn test_garbage_bytes_fail() {
        let result = TextureData::from_bytes(&[0, 1, 2, 3]);
        assert!(matches!(result, Err(ResourceError::Image(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checker.png");
        RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]))
            .save(&path)
            .unwrap();

        let texture = TextureData::load(&path).unwrap();
        assert_eq!(texture.extent(), vk::Extent2D { width: 4, height: 4 });
    }
}
