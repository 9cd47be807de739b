use anyhow::Result;
use image::DynamicImage;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::detection::corners::CornerOrdering;
use crate::detection::preprocessing;
use crate::detection::quads::QuadDetector;
use crate::error::ScanError;
use crate::fingerprint::FingerprintEngine;
use crate::matcher;
use crate::pipeline::{PipelineContext, PipelineData, PipelineStep};
use crate::rectify::Rectifier;

/// Apply `f` to every candidate, dropping those it rejects.
/// Candidates are independent, so this runs on the rayon pool when asked to.
fn per_candidate<F>(data: Vec<PipelineData>, context: &PipelineContext, f: F) -> Vec<PipelineData>
where
    F: Fn(PipelineData) -> Option<PipelineData> + Send + Sync,
{
    if context.parallel {
        data.into_par_iter().filter_map(f).collect()
    } else {
        data.into_iter().filter_map(f).collect()
    }
}

/// Resize frames to the working resolution (frame and working image both)
pub struct ResizeStep {
    pub width: u32,
    pub height: u32,
}

impl PipelineStep for ResizeStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        Ok(data
            .into_iter()
            .map(|item| {
                let resized = preprocessing::resize_frame(&item.original, self.width, self.height);
                let mut new_item = item.with_image(resized.clone());
                new_item.original = Arc::new(resized);
                new_item
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Resize"
    }
}

/// Convert image to grayscale
pub struct GrayscaleStep;

impl PipelineStep for GrayscaleStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        Ok(data
            .into_iter()
            .map(|item| {
                let gray = preprocessing::to_grayscale(&item.image);
                item.with_image(DynamicImage::ImageLuma8(gray))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Grayscale Conversion"
    }
}

/// Global threshold to a binary image
pub struct ThresholdStep {
    pub level: u8,
}

impl PipelineStep for ThresholdStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        Ok(data
            .into_iter()
            .map(|item| {
                let binary = preprocessing::binarize(&item.image.to_luma8(), self.level);
                item.with_image(DynamicImage::ImageLuma8(binary))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Threshold"
    }
}

/// Find card-shaped quadrilaterals - splits one frame into one item per candidate
pub struct QuadDetectionStep {
    pub detector: QuadDetector,
}

impl PipelineStep for QuadDetectionStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();

        for item in data {
            let binary = item.image.to_luma8();
            let quads = self.detector.detect_in_binary(&binary);

            for (index, quad) in quads.into_iter().enumerate() {
                result.push(PipelineData::from_candidate(item.original.clone(), index, quad));
            }
        }

        if result.is_empty() {
            debug!("{}", ScanError::NoCandidatesFound);
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Quad Detection"
    }
}

/// Put candidate corners in `[TL, TR, BL, BR]` order
pub struct CornerOrderingStep {
    pub ordering: CornerOrdering,
}

impl PipelineStep for CornerOrderingStep {
    fn process(&self, data: Vec<PipelineData>, context: &PipelineContext) -> Result<Vec<PipelineData>> {
        Ok(per_candidate(data, context, |mut item| {
            let quad = item.quad?;
            item.quad = Some(self.ordering.normalize(&quad));
            Some(item)
        }))
    }

    fn name(&self) -> &str {
        "Corner Ordering"
    }
}

/// Warp each candidate to the canonical card size.
/// Degenerate candidates are dropped without affecting the others.
pub struct RectifyStep {
    pub rectifier: Rectifier,
}

impl PipelineStep for RectifyStep {
    fn process(&self, data: Vec<PipelineData>, context: &PipelineContext) -> Result<Vec<PipelineData>> {
        Ok(per_candidate(data, context, |item| {
            let quad = item.quad?;
            match self.rectifier.rectify(&item.original, &quad) {
                Ok(card) => Some(item.with_image(DynamicImage::ImageRgb8(card))),
                Err(e) => {
                    warn!(candidate = ?item.candidate, "Skipping candidate: {}", e);
                    None
                }
            }
        }))
    }

    fn name(&self) -> &str {
        "Perspective Rectification"
    }
}

/// Compute the perceptual fingerprint of each rectified card
pub struct FingerprintStep {
    pub engine: FingerprintEngine,
}

impl PipelineStep for FingerprintStep {
    fn process(&self, data: Vec<PipelineData>, context: &PipelineContext) -> Result<Vec<PipelineData>> {
        Ok(per_candidate(data, context, |mut item| {
            item.fingerprint = Some(self.engine.compute(&item.image));
            Some(item)
        }))
    }

    fn name(&self) -> &str {
        "Fingerprint"
    }
}

/// Look up each fingerprint in a catalog snapshot
pub struct MatchStep {
    pub catalog: Arc<Catalog>,
    pub top_k: usize,
}

impl PipelineStep for MatchStep {
    fn process(&self, data: Vec<PipelineData>, context: &PipelineContext) -> Result<Vec<PipelineData>> {
        if data.is_empty() {
            return Ok(data);
        }
        if self.catalog.is_empty() {
            return Err(ScanError::CatalogUnavailable.into());
        }

        Ok(per_candidate(data, context, |mut item| {
            let fingerprint = item.fingerprint?;
            item.matches = matcher::rank(&fingerprint, &self.catalog, self.top_k).ok()?;
            if let Some(best) = item.matches.first() {
                debug!(
                    candidate = ?item.candidate,
                    card_id = %best.card_id,
                    distance = best.distance,
                    "candidate matched"
                );
            }
            Some(item)
        }))
    }

    fn name(&self) -> &str {
        "Catalog Match"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DetectorConfig, RectifierConfig};
    use crate::fingerprint::Fingerprint;
    use crate::models::{CardRecord, Point, Quadrilateral};
    use image::{Rgb, RgbImage};

    fn candidate(quad: [(i32, i32); 4]) -> PipelineData {
        let frame = Arc::new(DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 200, Rgb([90, 90, 90]))));
        PipelineData::from_candidate(
            frame,
            0,
            Quadrilateral::new(quad.map(|(x, y)| Point::new(x, y))),
        )
    }

    #[test]
    fn test_rectify_drops_only_degenerate_candidates() {
        let step = RectifyStep {
            rectifier: Rectifier::new(&RectifierConfig { width: 30, height: 40 }),
        };
        let mut bad = candidate([(0, 0), (10, 10), (20, 20), (30, 30)]);
        bad.candidate = Some(1);
        let data = vec![candidate([(10, 10), (60, 10), (10, 80), (60, 80)]), bad];

        for parallel in [false, true] {
            let context = PipelineContext { parallel, debug: None };
            let out = step.process(data.clone(), &context).unwrap();
            assert_eq!(out.len(), 1);
            assert_eq!(out[0].candidate, Some(0));
            assert_eq!((out[0].image.width(), out[0].image.height()), (30, 40));
        }
    }

    #[test]
    fn test_match_step_reports_empty_catalog() {
        let step = MatchStep {
            catalog: Arc::new(Catalog::default()),
            top_k: 1,
        };
        let mut item = candidate([(10, 10), (60, 10), (10, 80), (60, 80)]);
        item.fingerprint = Some(Fingerprint::from_bits(7));
        let err = step.process(vec![item], &PipelineContext::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<ScanError>(), Some(ScanError::CatalogUnavailable)));

        // nothing to match: no catalog lookup is attempted
        assert!(step.process(Vec::new(), &PipelineContext::default()).unwrap().is_empty());
    }

    #[test]
    fn test_match_step_ranks() {
        let catalog = Catalog::from_records(vec![
            CardRecord::new("x", Fingerprint::from_bits(0xff)),
            CardRecord::new("y", Fingerprint::from_bits(0x07)),
        ])
        .unwrap();
        let step = MatchStep {
            catalog: Arc::new(catalog),
            top_k: 2,
        };
        let mut item = candidate([(10, 10), (60, 10), (10, 80), (60, 80)]);
        item.fingerprint = Some(Fingerprint::from_bits(0x03));
        let out = step.process(vec![item], &PipelineContext::default()).unwrap();
        assert_eq!(out[0].matches[0].card_id, "y");
        assert_eq!(out[0].matches[1].card_id, "x");
    }

    #[test]
    fn test_detection_step_splits_frame() {
        let mut frame = RgbImage::from_pixel(400, 300, Rgb([0, 0, 0]));
        for (x0, x1) in [(20u32, 150u32), (220, 370)] {
            for y in 40..260 {
                for x in x0..x1 {
                    frame.put_pixel(x, y, Rgb([255, 255, 255]));
                }
            }
        }
        let data = vec![PipelineData::from_image(DynamicImage::ImageRgb8(frame))];
        let context = PipelineContext::default();
        let data = ThresholdStep { level: 127 }.process(data, &context).unwrap();
        let step = QuadDetectionStep {
            detector: QuadDetector::new(DetectorConfig::default()),
        };
        let out = step.process(data, &context).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|d| d.quad.is_some()));
        assert_eq!(out[1].candidate, Some(1));
    }
}
