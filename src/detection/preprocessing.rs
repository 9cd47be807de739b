use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Global binarization: pixels strictly above `level` become 255, the rest 0
pub fn binarize(gray: &GrayImage, level: u8) -> GrayImage {
    let mut out = gray.clone();
    for p in out.pixels_mut() {
        *p = Luma([if p[0] > level { 255 } else { 0 }]);
    }
    out
}

/// Bring a frame to the working resolution used for detection
pub fn resize_frame(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    if img.width() == width && img.height() == height {
        return img.clone();
    }
    img.resize_exact(width, height, FilterType::Triangle)
}
