//! Perspective rectification of card candidates.

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use std::borrow::Cow;

use crate::config::RectifierConfig;
use crate::error::ScanError;
use crate::models::{Point, Quadrilateral};

/// Projective transform taking each `src[i]` to `dst[i]`.
///
/// Fails with `DegenerateGeometry` when source or destination corners
/// coincide, three of them are collinear, or the system is singular.
pub fn projection_between(
    src: [(f32, f32); 4],
    dst: [(f32, f32); 4],
) -> Result<Projection, ScanError> {
    check_general_position(&src)?;
    check_general_position(&dst)?;
    Projection::from_control_points(src, dst)
        .ok_or(ScanError::DegenerateGeometry("singular correspondence system"))
}

fn check_general_position(pts: &[(f32, f32); 4]) -> Result<(), ScanError> {
    for i in 0..4 {
        for j in i + 1..4 {
            let (dx, dy) = (pts[i].0 - pts[j].0, pts[i].1 - pts[j].1);
            if dx.abs() < 1e-6 && dy.abs() < 1e-6 {
                return Err(ScanError::DegenerateGeometry("coincident corners"));
            }
        }
    }
    for skip in 0..4 {
        let tri: Vec<&(f32, f32)> = pts
            .iter()
            .enumerate()
            .filter_map(|(i, p)| (i != skip).then_some(p))
            .collect();
        let cross = (tri[1].0 - tri[0].0) * (tri[2].1 - tri[0].1)
            - (tri[1].1 - tri[0].1) * (tri[2].0 - tri[0].0);
        if cross.abs() < 1e-6 {
            return Err(ScanError::DegenerateGeometry("three collinear corners"));
        }
    }
    Ok(())
}

/// Warps normalized quadrilaterals into fixed-size card images
#[derive(Debug, Clone)]
pub struct Rectifier {
    width: u32,
    height: u32,
}

impl Rectifier {
    pub fn new(config: &RectifierConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
        }
    }

    /// Transform from normalized corners `[TL, TR, BL, BR]` to the card frame
    pub fn projection(&self, quad: &Quadrilateral) -> Result<Projection, ScanError> {
        let (w, h) = (self.width as f32, self.height as f32);
        let src = quad.corners.map(|Point { x, y }| (x as f32, y as f32));
        let dst = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)];
        projection_between(src, dst)
    }

    /// Resample the quadrilateral into a `width`×`height` image.
    /// Pixels that map outside the frame are black.
    pub fn rectify(&self, frame: &DynamicImage, quad: &Quadrilateral) -> Result<RgbImage, ScanError> {
        let projection = self.projection(quad)?;

        let rgb: Cow<'_, RgbImage> = match frame.as_rgb8() {
            Some(rgb) => Cow::Borrowed(rgb),
            None => Cow::Owned(frame.to_rgb8()),
        };

        let mut out = RgbImage::new(self.width, self.height);
        warp_into(&*rgb, &projection, Interpolation::Bilinear, Rgb([0, 0, 0]), &mut out);
        Ok(out)
    }
}

impl Default for Rectifier {
    fn default() -> Self {
        Self::new(&RectifierConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(points: [(i32, i32); 4]) -> Quadrilateral {
        Quadrilateral::new(points.map(|(x, y)| Point::new(x, y)))
    }

    #[test]
    fn test_projection_maps_corners() {
        let src = [(12.0, 30.0), (210.0, 48.0), (5.0, 300.0), (230.0, 290.0)];
        let dst = [(0.0, 0.0), (733.0, 0.0), (0.0, 1024.0), (733.0, 1024.0)];
        let projection = projection_between(src, dst).unwrap();
        for (s, d) in src.iter().zip(dst.iter()) {
            let (u, v) = projection * *s;
            assert!((u - d.0).abs() < 0.1 && (v - d.1).abs() < 0.1, "{:?} -> ({}, {})", s, u, v);
        }
    }

    #[test]
    fn test_identity_projection() {
        let pts = [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)];
        let projection = projection_between(pts, pts).unwrap();
        let (u, v) = projection * (3.0, 7.0);
        assert!((u - 3.0).abs() < 1e-3 && (v - 7.0).abs() < 1e-3);
    }

    #[test]
    fn test_collinear_corners_are_degenerate() {
        let rectifier = Rectifier::default();
        let result = rectifier.projection(&quad([(0, 0), (10, 10), (20, 20), (30, 0)]));
        assert!(matches!(result, Err(ScanError::DegenerateGeometry(_))));
    }

    #[test]
    fn test_coincident_corners_are_degenerate() {
        let rectifier = Rectifier::default();
        let result = rectifier.projection(&quad([(5, 5), (5, 5), (0, 40), (30, 40)]));
        assert!(matches!(result, Err(ScanError::DegenerateGeometry(_))));
    }

    #[test]
    fn test_output_size_is_fixed() {
        let rectifier = Rectifier::default();
        let frame = DynamicImage::new_rgb8(400, 300);
        for q in [
            quad([(10, 10), (60, 10), (10, 90), (60, 90)]),
            quad([(100, 20), (390, 60), (80, 280), (360, 295)]),
            quad([(200, 10), (300, 150), (50, 120), (150, 290)]),
        ] {
            let out = rectifier.rectify(&frame, &q).unwrap();
            assert_eq!(out.dimensions(), (733, 1024));
        }
    }

    #[test]
    fn test_rectify_preserves_layout() {
        // left half red, right half blue inside the card region
        let frame = DynamicImage::ImageRgb8(RgbImage::from_fn(300, 300, |x, _| {
            if x < 150 { Rgb([220, 0, 0]) } else { Rgb([0, 0, 220]) }
        }));
        let rectifier = Rectifier::new(&RectifierConfig { width: 100, height: 140 });
        let out = rectifier
            .rectify(&frame, &quad([(100, 50), (200, 50), (100, 250), (200, 250)]))
            .unwrap();
        assert_eq!(out.get_pixel(20, 70)[0], 220);
        assert_eq!(out.get_pixel(80, 70)[2], 220);
    }
}
