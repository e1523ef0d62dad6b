//! Image loading and pixel-format conversions.
//!
//! Every image is decoded to 8-bit RGB. Alpha is dropped and 16-bit inputs
//! are scaled down, so paired images always compare in the same layout.

use std::path::Path;

use imgref::{ImgRef, ImgVec};
use rgb::RGB8;

use crate::error::{Error, Result};

/// Decode an image file into an RGB8 raster.
///
/// # Errors
///
/// Returns [`Error::ImageLoad`] if the file cannot be opened or decoded.
pub fn load_rgb8(path: &Path) -> Result<ImgVec<RGB8>> {
    let load_err = |reason: String| Error::ImageLoad {
        path: path.to_path_buf(),
        reason,
    };

    // The format comes from the file content, not the extension.
    let img = image::ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| load_err(e.to_string()))?
        .decode()
        .map_err(|e| load_err(e.to_string()))?;

    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let pixels: Vec<RGB8> = rgb
        .pixels()
        .map(|p| RGB8::new(p[0], p[1], p[2]))
        .collect();

    Ok(ImgVec::new(pixels, width as usize, height as usize))
}

/// Luma of one pixel with BT.601 weights, on the 0-255 scale.
#[inline]
fn luma(p: RGB8) -> f64 {
    0.299 * f64::from(p.r) + 0.587 * f64::from(p.g) + 0.114 * f64::from(p.b)
}

/// Convert an RGB8 image to grayscale in the range 0.0-1.0.
#[must_use]
pub fn to_gray_unit(img: ImgRef<'_, RGB8>) -> ImgVec<f64> {
    let pixels: Vec<f64> = img.pixels().map(|p| luma(p) / 255.0).collect();
    ImgVec::new(pixels, img.width(), img.height())
}

/// Split an RGB8 image into three planes with values in 0.0-1.0.
#[must_use]
pub fn to_unit_planes(img: ImgRef<'_, RGB8>) -> [ImgVec<f64>; 3] {
    let len = img.width() * img.height();
    let mut r = Vec::with_capacity(len);
    let mut g = Vec::with_capacity(len);
    let mut b = Vec::with_capacity(len);

    for p in img.pixels() {
        r.push(f64::from(p.r) / 255.0);
        g.push(f64::from(p.g) / 255.0);
        b.push(f64::from(p.b) / 255.0);
    }

    let (width, height) = (img.width(), img.height());
    [
        ImgVec::new(r, width, height),
        ImgVec::new(g, width, height),
        ImgVec::new(b, width, height),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_weights() {
        let img = ImgVec::new(
            vec![
                RGB8::new(255, 255, 255),
                RGB8::new(0, 0, 0),
                RGB8::new(255, 0, 0),
            ],
            3,
            1,
        );
        let gray = to_gray_unit(img.as_ref());
        let values: Vec<f64> = gray.pixels().collect();
        assert!((values[0] - 1.0).abs() < 1e-9);
        assert!(values[1].abs() < 1e-9);
        assert!((values[2] - 0.299).abs() < 1e-9);
    }

    #[test]
    fn test_unit_planes() {
        let img = ImgVec::new(vec![RGB8::new(255, 0, 51); 4], 2, 2);
        let [r, g, b] = to_unit_planes(img.as_ref());
        assert_eq!(r.width(), 2);
        assert!(r.pixels().all(|v| (v - 1.0).abs() < 1e-9));
        assert!(g.pixels().all(|v| v == 0.0));
        assert!(b.pixels().all(|v| (v - 0.2).abs() < 1e-9));
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_rgb8(Path::new("/nonexistent/img_rain.png"));
        assert!(matches!(result, Err(Error::ImageLoad { .. })));
    }

    #[test]
    fn test_load_roundtrip_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.png");
        let buf = image::RgbImage::from_fn(4, 3, |x, y| image::Rgb([x as u8 * 10, y as u8 * 20, 7]));
        buf.save(&path).unwrap();

        let img = load_rgb8(&path).unwrap();
        assert_eq!((img.width(), img.height()), (4, 3));
        let last = img.pixels().last().unwrap();
        assert_eq!(last, RGB8::new(30, 40, 7));
    }
}
