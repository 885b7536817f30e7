//! Pixel measurements that do not need OCR

use image::{Rgba, RgbaImage};

/// Colour of the empty part of the energy bar
pub const EMPTY_BAR_GRAY: [u8; 3] = [118, 117, 118];

fn is_empty_bar(pixel: &Rgba<u8>, tolerance: u8) -> bool {
    pixel.0[..3]
        .iter()
        .zip(EMPTY_BAR_GRAY.iter())
        .all(|(value, gray)| value.abs_diff(*gray) <= tolerance)
}

/// Energy percentage from a capture of the energy bar.
///
/// Reads the middle row: every pixel that is not the empty-bar gray counts
/// as filled. Returns `None` for an empty capture.
pub fn energy_from_bar(bar: &RgbaImage, tolerance: u8) -> Option<u8> {
    let (width, height) = bar.dimensions();
    if width == 0 || height == 0 {
        return None;
    }
    let row = height / 2;
    let filled = (0..width)
        .filter(|x| !is_empty_bar(bar.get_pixel(*x, row), tolerance))
        .count();
    let percent = (filled as f64 * 100.0 / f64::from(width)).round();
    Some(percent.clamp(0.0, 100.0) as u8)
}

/// Mean grayscale brightness of a capture
pub fn mean_brightness(image: &RgbaImage) -> f32 {
    let gray = image::imageops::grayscale(image);
    let count = gray.width() as usize * gray.height() as usize;
    if count == 0 {
        return 0.0;
    }
    let sum: u64 = gray.pixels().map(|p| u64::from(p.0[0])).sum();
    sum as f32 / count as f32
}

/// The infirmary button is lit when its mean brightness exceeds `threshold`
pub fn infirmary_active(button: &RgbaImage, threshold: f32) -> bool {
    mean_brightness(button) > threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(width: u32, filled: u32) -> RgbaImage {
        RgbaImage::from_fn(width, 3, |x, _| {
            if x < filled {
                Rgba([90, 200, 140, 255])
            } else {
                Rgba([EMPTY_BAR_GRAY[0], EMPTY_BAR_GRAY[1], EMPTY_BAR_GRAY[2], 255])
            }
        })
    }

    #[test]
    fn test_energy_from_bar() {
        assert_eq!(energy_from_bar(&bar(200, 0), 2), Some(0));
        assert_eq!(energy_from_bar(&bar(200, 90), 2), Some(45));
        assert_eq!(energy_from_bar(&bar(200, 200), 2), Some(100));
    }

    #[test]
    fn test_energy_tolerates_gray_noise() {
        let mut image = bar(10, 0);
        image.put_pixel(3, 1, Rgba([120, 115, 119, 255]));
        assert_eq!(energy_from_bar(&image, 2), Some(0));
        assert_eq!(energy_from_bar(&image, 1), Some(10));
    }

    #[test]
    fn test_empty_capture_is_unknown() {
        assert_eq!(energy_from_bar(&RgbaImage::new(0, 0), 2), None);
    }

    #[test]
    fn test_infirmary_brightness() {
        let lit = RgbaImage::from_pixel(4, 4, Rgba([220, 220, 220, 255]));
        let dim = RgbaImage::from_pixel(4, 4, Rgba([60, 60, 60, 255]));
        assert!(infirmary_active(&lit, 150.0));
        assert!(!infirmary_active(&dim, 150.0));
    }
}
