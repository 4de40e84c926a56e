//! Raster sniffing and validation shared by the loader and both renderers.

use std::fmt;

use image::{DynamicImage, ImageFormat};

/// Raster formats both renderers can embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetFormat {
    Png,
    Jpeg,
    Gif,
}

impl AssetFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AssetFormat::Png => "png",
            AssetFormat::Jpeg => "jpeg",
            AssetFormat::Gif => "gif",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            AssetFormat::Png => "image/png",
            AssetFormat::Jpeg => "image/jpeg",
            AssetFormat::Gif => "image/gif",
        }
    }
}

/// A loaded, validated image. Dimensions are in pixels.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub bytes: Vec<u8>,
    pub format: AssetFormat,
    pub width: u32,
    pub height: u32,
}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl ImageAsset {
    /// Sniffs the format and decodes the image once to read its dimensions.
    /// Unsupported or corrupt data returns `None`.
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        let format = match image::guess_format(&bytes).ok()? {
            ImageFormat::Png => AssetFormat::Png,
            ImageFormat::Jpeg => AssetFormat::Jpeg,
            ImageFormat::Gif => AssetFormat::Gif,
            _ => return None,
        };
        let decoded = image::load_from_memory(&bytes).ok()?;
        let (width, height) = (decoded.width(), decoded.height());
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self {
            bytes,
            format,
            width,
            height,
        })
    }

    /// Decodes the pixels. Both renderers gate embedding on this, so an
    /// image is either in both outputs or in neither.
    pub fn decode(&self) -> Result<DynamicImage, image::ImageError> {
        image::load_from_memory(&self.bytes)
    }

    pub fn is_decodable(&self) -> bool {
        self.width > 0 && self.height > 0 && self.decode().is_ok()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::Cursor;

    use image::{ImageBuffer, ImageFormat, Rgba};

    /// Encodes a solid-color PNG of the given size.
    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let buffer = ImageBuffer::from_pixel(width, height, Rgba([200u8, 30, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        buffer
            .write_to(&mut out, ImageFormat::Png)
            .expect("encode fixture png");
        out.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_reads_png_dimensions() {
        let asset = ImageAsset::from_bytes(fixtures::png_bytes(4, 2)).unwrap();
        assert_eq!(asset.format, AssetFormat::Png);
        assert_eq!((asset.width, asset.height), (4, 2));
    }

    #[test]
    fn test_from_bytes_rejects_non_images() {
        assert!(ImageAsset::from_bytes(b"<html>not found</html>".to_vec()).is_none());
        assert!(ImageAsset::from_bytes(Vec::new()).is_none());
    }

    #[test]
    fn test_is_decodable_checks_pixels_not_just_magic() {
        let good = ImageAsset::from_bytes(fixtures::png_bytes(4, 4)).unwrap();
        assert!(good.is_decodable());

        let mut corrupt = good.clone();
        corrupt.bytes.truncate(corrupt.bytes.len() / 2);
        assert!(image::guess_format(&corrupt.bytes).is_ok());
        assert!(!corrupt.is_decodable());
    }

    #[test]
    fn test_truncated_png_is_rejected() {
        let mut bytes = fixtures::png_bytes(8, 8);
        bytes.truncate(bytes.len() / 2);
        assert!(ImageAsset::from_bytes(bytes).is_none());
    }
}
