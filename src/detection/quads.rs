use image::{DynamicImage, GrayImage};
use tracing::debug;

use crate::config::{DetectorConfig, REFERENCE_FRAME_SIZE};
use crate::detection::{contours, preprocessing};
use crate::models::{Contour, Quadrilateral};

/// Finds card-shaped regions: large contours whose polygon approximation
/// has exactly four vertices
#[derive(Debug, Clone)]
pub struct QuadDetector {
    config: DetectorConfig,
}

impl QuadDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Binarize the frame and detect quadrilaterals in it
    pub fn detect(&self, frame: &DynamicImage) -> Vec<Quadrilateral> {
        let gray = preprocessing::to_grayscale(frame);
        let binary = preprocessing::binarize(&gray, self.config.threshold);
        self.detect_in_binary(&binary)
    }

    /// Detect quadrilaterals in an already binarized frame.
    /// Corners come back in contour traversal order.
    pub fn detect_in_binary(&self, binary: &GrayImage) -> Vec<Quadrilateral> {
        let min_area = self.min_area_for(binary.width(), binary.height());
        let all = contours::find_contours(binary, self.config.include_holes);

        let quads: Vec<Quadrilateral> = all
            .iter()
            .filter_map(|c| self.to_quad(c, min_area))
            .collect();

        debug!(
            contours = all.len(),
            quads = quads.len(),
            min_area,
            "quadrilateral detection"
        );
        quads
    }

    /// Area threshold for a frame of the given size
    pub fn min_area_for(&self, width: u32, height: u32) -> f64 {
        if !self.config.scale_min_area {
            return self.config.min_area;
        }
        let (ref_w, ref_h) = REFERENCE_FRAME_SIZE;
        let scale = (width as f64 * height as f64) / (ref_w as f64 * ref_h as f64);
        self.config.min_area * scale
    }

    fn to_quad(&self, contour: &Contour, min_area: f64) -> Option<Quadrilateral> {
        if contour.area() <= min_area {
            return None;
        }
        let epsilon = self.config.epsilon_fraction * contour.perimeter();
        let approx = contours::approximate_polygon(&contour.points, epsilon);
        match approx.as_slice() {
            [a, b, c, d] => Some(Quadrilateral::new([*a, *b, *c, *d])),
            _ => None,
        }
    }
}

impl Default for QuadDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Point;
    use image::{Rgb, RgbImage};
    use imageproc::drawing::draw_polygon_mut;
    use imageproc::point::Point as PolyPoint;

    fn frame_with_polygon(w: u32, h: u32, poly: &[(i32, i32)]) -> DynamicImage {
        let mut img = RgbImage::from_pixel(w, h, Rgb([20, 20, 20]));
        let pts: Vec<PolyPoint<i32>> = poly.iter().map(|&(x, y)| PolyPoint::new(x, y)).collect();
        draw_polygon_mut(&mut img, &pts, Rgb([230, 230, 230]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_axis_aligned_rectangle_is_one_quad() {
        let frame = frame_with_polygon(640, 480, &[(100, 60), (300, 60), (300, 340), (100, 340)]);
        let quads = QuadDetector::default().detect(&frame);
        assert_eq!(quads.len(), 1);
        for corner in [(100, 60), (300, 60), (300, 340), (100, 340)] {
            let near = quads[0]
                .corners
                .iter()
                .any(|p| p.distance(&Point::new(corner.0, corner.1)) <= 2.0);
            assert!(near, "no detected corner near {:?}", corner);
        }
    }

    #[test]
    fn test_skewed_rectangle_is_one_quad() {
        let frame = frame_with_polygon(640, 480, &[(210, 50), (390, 90), (330, 400), (140, 360)]);
        let quads = QuadDetector::default().detect(&frame);
        assert_eq!(quads.len(), 1);
    }

    #[test]
    fn test_rectangles_flush_with_frame_edges() {
        let binary_rect = |x0: u32, y0: u32, x1: u32, y1: u32| {
            GrayImage::from_fn(640, 480, |x, y| {
                let inside = x >= x0 && x <= x1 && y >= y0 && y <= y1;
                image::Luma([if inside { 255 } else { 0 }])
            })
        };
        let detector = QuadDetector::default();

        for (label, (x0, y0, x1, y1)) in [
            ("left", (0, 50, 250, 400)),
            ("left+bottom", (0, 50, 250, 479)),
            ("right", (389, 50, 639, 400)),
            ("top", (100, 0, 350, 300)),
            ("bottom", (100, 179, 350, 479)),
        ] {
            let quads = detector.detect_in_binary(&binary_rect(x0, y0, x1, y1));
            assert_eq!(quads.len(), 1, "{} edge", label);
            for corner in [(x0, y0), (x1, y0), (x1, y1), (x0, y1)] {
                let target = Point::new(corner.0 as i32, corner.1 as i32);
                assert!(
                    quads[0].corners.iter().any(|p| p.distance(&target) <= 2.0),
                    "{} edge: no corner near {:?}",
                    label,
                    corner
                );
            }
        }
    }

    #[test]
    fn test_small_region_is_rejected() {
        let frame = frame_with_polygon(640, 480, &[(10, 10), (30, 10), (30, 40), (10, 40)]);
        assert!(QuadDetector::default().detect(&frame).is_empty());
    }

    #[test]
    fn test_blank_frame_yields_nothing() {
        let frame = DynamicImage::ImageRgb8(RgbImage::from_pixel(320, 240, Rgb([10, 10, 10])));
        assert!(QuadDetector::default().detect(&frame).is_empty());
    }

    #[test]
    fn test_triangle_is_rejected() {
        let frame = frame_with_polygon(640, 480, &[(100, 400), (320, 40), (540, 400)]);
        assert!(QuadDetector::default().detect(&frame).is_empty());
    }

    #[test]
    fn test_min_area_scales_with_resolution() {
        let detector = QuadDetector::default();
        assert!((detector.min_area_for(1270, 720) - 4000.0).abs() < 1e-9);
        assert!((detector.min_area_for(635, 720) - 2000.0).abs() < 1e-9);

        let fixed = QuadDetector::new(DetectorConfig {
            scale_min_area: false,
            ..DetectorConfig::default()
        });
        assert_eq!(fixed.min_area_for(100, 100), 4000.0);
    }
}
