use anyhow::Result;
use image::{DynamicImage, GenericImageView};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::fingerprint::Fingerprint;
use crate::models::{Identification, MatchResult, Quadrilateral};

/// Bounding box in the original image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Axis-aligned box around a quadrilateral, clamped to the image
    pub fn around(quad: &Quadrilateral, img_width: u32, img_height: u32) -> Option<Self> {
        if img_width == 0 || img_height == 0 {
            return None;
        }
        let clamp = |v: i32, max: u32| v.clamp(0, max as i32 - 1) as u32;
        let min_x = clamp(quad.corners.iter().map(|p| p.x).min()?, img_width);
        let max_x = clamp(quad.corners.iter().map(|p| p.x).max()?, img_width);
        let min_y = clamp(quad.corners.iter().map(|p| p.y).min()?, img_height);
        let max_y = clamp(quad.corners.iter().map(|p| p.y).max()?, img_height);
        Some(Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        })
    }
}

/// Data that flows through the pipeline.
/// Starts as one item holding the whole frame; detection splits it into
/// one item per card candidate.
#[derive(Debug, Clone)]
pub struct PipelineData {
    /// Working image: the frame (or a derived gray/binary version), a crop
    /// around a candidate, or the rectified card
    pub image: DynamicImage,

    /// The frame candidates are located in (shared efficiently via Arc)
    pub original: Arc<DynamicImage>,

    /// Index of the candidate in detector order
    pub candidate: Option<usize>,

    /// Candidate corners in `original` coordinates
    pub quad: Option<Quadrilateral>,

    pub fingerprint: Option<Fingerprint>,

    /// Ranked catalog matches, best first
    pub matches: Vec<MatchResult>,
}

impl PipelineData {
    /// Create PipelineData for a full frame
    pub fn from_image(image: DynamicImage) -> Self {
        let original = Arc::new(image.clone());
        Self {
            image,
            original,
            candidate: None,
            quad: None,
            fingerprint: None,
            matches: Vec::new(),
        }
    }

    /// Create PipelineData for one detected candidate of a frame
    pub fn from_candidate(original: Arc<DynamicImage>, index: usize, quad: Quadrilateral) -> Self {
        let (w, h) = original.dimensions();
        let image = match BoundingBox::around(&quad, w, h) {
            Some(bbox) => original.crop_imm(bbox.x, bbox.y, bbox.width, bbox.height),
            None => DynamicImage::new_rgb8(1, 1),
        };
        Self {
            image,
            original,
            candidate: Some(index),
            quad: Some(quad),
            fingerprint: None,
            matches: Vec::new(),
        }
    }

    /// Replace the working image, keeping everything else
    pub fn with_image(mut self, image: DynamicImage) -> Self {
        self.image = image;
        self
    }

    /// Final result for a fully processed candidate
    pub fn into_identification(self, keep_image: bool) -> Option<Identification> {
        let best = self.matches.first()?.clone();
        Some(Identification {
            candidate: self.candidate?,
            corners: self.quad?,
            fingerprint: self.fingerprint?,
            best,
            ranked: self.matches,
            card_image: keep_image.then_some(self.image),
        })
    }
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

/// Context available to all pipeline steps
#[derive(Clone, Default)]
pub struct PipelineContext {
    /// Run per-candidate work on the rayon pool
    pub parallel: bool,
    pub debug: Option<DebugConfig>,
}

/// Trait that all pipeline steps must implement
pub trait PipelineStep: Send + Sync {
    /// Process data and return transformed data
    /// Steps can split data (1 → many), filter (many → fewer), or transform (many → many)
    fn process(&self, data: Vec<PipelineData>, context: &PipelineContext) -> Result<Vec<PipelineData>>;

    /// Human-readable name for this step (used in logs and debug directories)
    fn name(&self) -> &str;
}

/// Composable pipeline builder
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    context: PipelineContext,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            context: PipelineContext::default(),
        }
    }

    /// Process candidates in parallel where steps support it
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.context.parallel = parallel;
        self
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig { output_dir });

        Ok(self)
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Helper method to add a step from a Box (for convenience)
    pub fn add_step_boxed(mut self, step: Box<dyn PipelineStep>) -> Self {
        self.steps.push(Arc::from(step));
        self
    }

    /// Run all steps on a frame
    pub fn run(&self, input: DynamicImage) -> Result<Vec<PipelineData>> {
        self.run_partial(input, self.steps.len())
    }

    /// Run the pipeline but stop after `num_steps` steps (useful for debugging)
    pub fn run_partial(&self, input: DynamicImage, num_steps: usize) -> Result<Vec<PipelineData>> {
        self.save_debug_images("00_input", std::slice::from_ref(&input))?;

        let mut data = vec![PipelineData::from_image(input)];

        for (step_idx, step) in self.steps.iter().take(num_steps).enumerate() {
            debug!(step = step.name(), items = data.len(), "running step");
            data = step.process(data, &self.context)?;

            let step_dir_name = format!(
                "{:02}_{}",
                step_idx + 1,
                step.name().to_lowercase().replace(' ', "_")
            );
            let images: Vec<DynamicImage> = if self.debug_enabled() {
                data.iter().map(|d| d.image.clone()).collect()
            } else {
                Vec::new()
            };
            self.save_debug_images(&step_dir_name, &images)?;

            debug!(step = step.name(), items = data.len(), "step finished");
        }

        Ok(data)
    }

    fn debug_enabled(&self) -> bool {
        self.context.debug.is_some()
    }

    /// Save one PNG per item into `<debug dir>/<step_dir_name>/`
    fn save_debug_images(&self, step_dir_name: &str, images: &[DynamicImage]) -> Result<()> {
        let Some(debug_config) = self.context.debug.as_ref() else {
            return Ok(());
        };

        let step_dir = debug_config.output_dir.join(step_dir_name);
        std::fs::create_dir_all(&step_dir)?;

        for (idx, image) in images.iter().enumerate() {
            let output_path = step_dir.join(format!("{:02}.png", idx + 1));
            image
                .save(&output_path)
                .map_err(|e| anyhow::anyhow!("Failed to save debug image: {}", e))?;
        }

        debug!("Debug: saved {} images to {}/", images.len(), step_dir_name);
        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
