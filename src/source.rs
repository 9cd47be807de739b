use image::DynamicImage;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::error::ScanError;

/// A reference image for one known card
#[derive(Debug, Clone)]
pub struct ReferenceCard {
    pub card_id: String,
    pub image: DynamicImage,
}

/// Supplies the reference images a catalog is built from
pub trait CardSource {
    /// All cards of the set, in the order they should appear in the catalog
    fn cards(&self) -> Result<Vec<ReferenceCard>, ScanError>;
}

impl CardSource for Vec<ReferenceCard> {
    fn cards(&self) -> Result<Vec<ReferenceCard>, ScanError> {
        Ok(self.clone())
    }
}

/// Reference images stored one file per card; the card id is the file stem
#[derive(Debug, Clone)]
pub struct DirectoryCardSource {
    dir: PathBuf,
}

impl DirectoryCardSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CardSource for DirectoryCardSource {
    fn cards(&self) -> Result<Vec<ReferenceCard>, ScanError> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        let mut cards = Vec::with_capacity(paths.len());
        for path in paths {
            let Some(card_id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if image::ImageFormat::from_path(&path).is_err() {
                debug!("Skipping non-image file {}", path.display());
                continue;
            }
            match image::open(&path) {
                Ok(image) => cards.push(ReferenceCard {
                    card_id: card_id.to_string(),
                    image,
                }),
                Err(e) => warn!("Failed to load reference image {}: {}", path.display(), e),
            }
        }
        Ok(cards)
    }
}
