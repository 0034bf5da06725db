//! Gear images embedded in icon appearances.
//!
//! Images are decoded with the `image` crate, any alpha channel is flattened
//! onto the icon's circle colour (viewers disagree on soft masks inside
//! annotation appearances), and the RGB samples are stored Flate-compressed.

use crate::error::{Error, Result};
use crate::filters::flate_encode;
use crate::icon_config::Rgb;
use crate::object::Object;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Decoded 8-bit RGB image.
#[derive(Debug, Clone, PartialEq)]
pub struct GearImage {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Interleaved RGB samples
    pub rgb: Vec<u8>,
}

fn channel(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0) as u8
}

fn blend(fg: u8, bg: u8, alpha: u8) -> u8 {
    let a = u32::from(alpha);
    ((u32::from(fg) * a + u32::from(bg) * (255 - a) + 127) / 255) as u8
}

impl GearImage {
    /// Decode PNG or JPEG bytes, compositing transparency over `background`.
    pub fn from_bytes(data: &[u8], background: Rgb) -> Result<Self> {
        let img = image::load_from_memory(data).map_err(|e| Error::Image(e.to_string()))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::Image("image has no pixels".to_string()));
        }

        let bg = [channel(background[0]), channel(background[1]), channel(background[2])];
        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for pixel in rgba.pixels() {
            let [r, g, b, a] = pixel.0;
            rgb.push(blend(r, bg[0], a));
            rgb.push(blend(g, bg[1], a));
            rgb.push(blend(b, bg[2], a));
        }

        Ok(Self { width, height, rgb })
    }

    /// Read and decode an image file.
    pub fn from_file(path: impl AsRef<Path>, background: Rgb) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(&data, background)
    }

    /// Pixel dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Build the image XObject stream.
    pub fn to_xobject(&self) -> Result<Object> {
        let data = flate_encode(&self.rgb)?;

        let mut dict = HashMap::new();
        dict.insert("Type".to_string(), Object::Name("XObject".to_string()));
        dict.insert("Subtype".to_string(), Object::Name("Image".to_string()));
        dict.insert("Width".to_string(), Object::Integer(i64::from(self.width)));
        dict.insert("Height".to_string(), Object::Integer(i64::from(self.height)));
        dict.insert("ColorSpace".to_string(), Object::Name("DeviceRGB".to_string()));
        dict.insert("BitsPerComponent".to_string(), Object::Integer(8));
        dict.insert("Filter".to_string(), Object::Name("FlateDecode".to_string()));

        Ok(Object::Stream {
            dict,
            data: bytes::Bytes::from(data),
        })
    }
}

/// Loads gear images relative to an icon directory, caching by path and
/// background colour.
#[derive(Debug, Clone)]
pub struct ImageLoader {
    root: PathBuf,
    cache: HashMap<(String, [u8; 3]), GearImage>,
}

impl ImageLoader {
    /// Loader rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: HashMap::new(),
        }
    }

    /// Icon directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load `relative` over `background`.
    ///
    /// A missing or undecodable file is logged and yields `None`; the icon
    /// is then drawn without its image.
    pub fn load(&mut self, relative: &str, background: Rgb) -> Option<&GearImage> {
        let key = (
            relative.to_string(),
            [channel(background[0]), channel(background[1]), channel(background[2])],
        );
        if !self.cache.contains_key(&key) {
            let path = self.root.join(relative);
            if !path.exists() {
                log::warn!("Gear image not found: {}", path.display());
                return None;
            }
            match GearImage::from_file(&path, background) {
                Ok(img) => {
                    log::debug!("Loaded gear image {} ({}x{})", path.display(), img.width, img.height);
                    self.cache.insert(key.clone(), img);
                },
                Err(e) => {
                    log::warn!("Failed to load gear image {}: {}", path.display(), e);
                    return None;
                },
            }
        }
        self.cache.get(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn png_bytes(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
        let img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_pixel(width, height, Rgba(pixel));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_transparent_pixels_take_background() {
        let img = GearImage::from_bytes(&png_bytes(2, 1, [255, 255, 255, 0]), [1.0, 0.0, 0.0]).unwrap();
        assert_eq!(img.dimensions(), (2, 1));
        assert_eq!(img.rgb, vec![255, 0, 0, 255, 0, 0]);
    }

    #[test]
    fn test_opaque_pixels_unchanged() {
        let img = GearImage::from_bytes(&png_bytes(1, 1, [10, 20, 30, 255]), [1.0, 1.0, 1.0]).unwrap();
        assert_eq!(img.rgb, vec![10, 20, 30]);
    }

    #[test]
    fn test_half_alpha_blends() {
        let img = GearImage::from_bytes(&png_bytes(1, 1, [255, 255, 255, 128]), [0.0, 0.0, 0.0]).unwrap();
        assert_eq!(img.rgb, vec![128, 128, 128]);
    }

    #[test]
    fn test_xobject() {
        let img = GearImage::from_bytes(&png_bytes(3, 2, [0, 0, 0, 255]), [0.0, 0.0, 0.0]).unwrap();
        let xobj = img.to_xobject().unwrap();
        let dict = xobj.as_dict().unwrap();
        assert_eq!(dict.get("Width"), Some(&Object::Integer(3)));
        assert_eq!(dict.get("ColorSpace").and_then(|o| o.as_name()), Some("DeviceRGB"));
        assert_eq!(xobj.decode_stream_data().unwrap().len(), 18);
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(matches!(GearImage::from_bytes(b"not an image", [0.0; 3]), Err(Error::Image(_))));
    }

    #[test]
    fn test_loader_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = ImageLoader::new(dir.path());
        assert!(loader.load("APs/missing.png", [0.0; 3]).is_none());
    }

    #[test]
    fn test_loader_reads_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("APs")).unwrap();
        std::fs::write(dir.path().join("APs").join("ap.png"), png_bytes(4, 2, [1, 2, 3, 255])).unwrap();
        let mut loader = ImageLoader::new(dir.path());
        assert_eq!(loader.load("APs/ap.png", [0.0; 3]).map(|i| i.dimensions()), Some((4, 2)));
    }
}
