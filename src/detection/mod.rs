pub mod contours;
pub mod corners;
pub mod preprocessing;
pub mod quads;
pub mod steps;

use image::DynamicImage;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::catalog::{Catalog, CatalogStore};
use crate::config::ScannerConfig;
use crate::error::ScanError;
use crate::fingerprint::FingerprintEngine;
use crate::models::{Identification, Quadrilateral};
use crate::pipeline::Pipeline;
use crate::rectify::Rectifier;
use quads::QuadDetector;
use steps::*;

/// Frame-to-card identification: detection, corner ordering,
/// rectification, fingerprinting and catalog matching
pub struct CardScanner {
    config: ScannerConfig,
    catalog: Arc<CatalogStore>,
    debug_dir: Option<PathBuf>,
}

impl CardScanner {
    pub fn new(config: ScannerConfig, catalog: Arc<CatalogStore>) -> Result<Self, ScanError> {
        config.validate()?;
        Ok(Self {
            config,
            catalog,
            debug_dir: None,
        })
    }

    pub fn with_catalog(config: ScannerConfig, catalog: Catalog) -> Result<Self, ScanError> {
        Self::new(config, Arc::new(CatalogStore::new(catalog)))
    }

    /// Dump per-step images of the next identification into `dir`
    /// (must be empty or non-existent)
    pub fn with_debug(mut self, dir: PathBuf) -> Self {
        self.debug_dir = Some(dir);
        self
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    pub fn fingerprint_engine(&self) -> Result<FingerprintEngine, ScanError> {
        FingerprintEngine::new(self.config.fingerprint.grid_size)
    }

    /// Detect and normalize candidates without rectifying or matching
    pub fn detect(&self, frame: &DynamicImage) -> Vec<Quadrilateral> {
        let detector = QuadDetector::new(self.config.detector.clone());
        let ordering = self.config.detector.corner_ordering;
        detector
            .detect(frame)
            .iter()
            .map(|q| ordering.normalize(q))
            .collect()
    }

    /// Standard pipeline matching against the given catalog snapshot
    pub fn build_pipeline(&self, catalog: Arc<Catalog>) -> Result<Pipeline, ScanError> {
        let mut pipeline = Pipeline::new().with_parallel(self.config.parallel);

        if let Some((width, height)) = self.config.working_size {
            pipeline = pipeline.add_step(Arc::new(ResizeStep { width, height }));
        }

        Ok(pipeline
            .add_step(Arc::new(GrayscaleStep))
            .add_step(Arc::new(ThresholdStep {
                level: self.config.detector.threshold,
            }))
            .add_step(Arc::new(QuadDetectionStep {
                detector: QuadDetector::new(self.config.detector.clone()),
            }))
            .add_step(Arc::new(CornerOrderingStep {
                ordering: self.config.detector.corner_ordering,
            }))
            .add_step(Arc::new(RectifyStep {
                rectifier: Rectifier::new(&self.config.rectifier),
            }))
            .add_step(Arc::new(FingerprintStep {
                engine: self.fingerprint_engine()?,
            }))
            .add_step(Arc::new(MatchStep {
                catalog,
                top_k: self.config.matching.top_k,
            })))
    }

    /// Identify every card in a frame.
    ///
    /// Returns `NoCandidatesFound` when no candidate survives detection and
    /// rectification, and `CatalogUnavailable` when the published catalog
    /// is empty. Matches are nearest neighbours with no distance cutoff.
    pub fn identify(&self, frame: &DynamicImage) -> Result<Vec<Identification>, ScanError> {
        let catalog = self.catalog.snapshot();
        if catalog.is_empty() {
            return Err(ScanError::CatalogUnavailable);
        }

        let mut pipeline = self.build_pipeline(catalog)?;
        if let Some(dir) = &self.debug_dir {
            pipeline = pipeline.with_debug(dir.clone())?;
        }

        let results = pipeline
            .run(frame.clone())
            .map_err(ScanError::from_pipeline)?;
        if results.is_empty() {
            return Err(ScanError::NoCandidatesFound);
        }

        let keep = self.config.keep_card_images;
        let identifications: Vec<Identification> = results
            .into_iter()
            .filter_map(|item| item.into_identification(keep))
            .collect();

        info!("Identified {} card(s) in frame", identifications.len());
        Ok(identifications)
    }
}
