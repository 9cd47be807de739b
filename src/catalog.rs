//! Known-card catalog: building, persistence and publication.

use parking_lot::RwLock;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::ScanError;
use crate::fingerprint::{Fingerprint, FingerprintEngine};
use crate::models::CardRecord;
use crate::source::{CardSource, ReferenceCard};

/// Immutable, insertion-ordered collection of card fingerprints
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    records: Vec<CardRecord>,
}

impl Catalog {
    /// Build a catalog from records, rejecting duplicate card ids
    pub fn from_records(records: Vec<CardRecord>) -> Result<Self, ScanError> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(record.card_id.as_str()) {
                return Err(ScanError::DuplicateCardId(record.card_id.clone()));
            }
        }
        Ok(Self { records })
    }

    /// Fingerprint every reference card supplied by `source`
    pub fn build(
        source: &dyn CardSource,
        engine: &FingerprintEngine,
        parallel: bool,
    ) -> Result<Self, ScanError> {
        let cards = source.cards()?;
        let hash = |card: &ReferenceCard| CardRecord::new(&card.card_id, engine.compute(&card.image));

        let records: Vec<CardRecord> = if parallel {
            cards.par_iter().map(hash).collect()
        } else {
            cards.iter().map(hash).collect()
        };

        info!("Built catalog with {} cards", records.len());
        Self::from_records(records)
    }

    /// All records in insertion order
    pub fn lookup_all(&self) -> &[CardRecord] {
        &self.records
    }

    pub fn get(&self, card_id: &str) -> Option<&Fingerprint> {
        self.records
            .iter()
            .find(|r| r.card_id == card_id)
            .map(|r| &r.fingerprint)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Read a catalog from its JSON form
    pub fn load(path: &Path) -> Result<Self, ScanError> {
        let file = std::fs::File::open(path)?;
        let records: Vec<CardRecord> = serde_json::from_reader(std::io::BufReader::new(file))?;
        let catalog = Self::from_records(records)?;
        info!("Loaded {} cards from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Write the catalog as a pretty-printed JSON array
    pub fn save(&self, path: &Path) -> Result<(), ScanError> {
        let json = serde_json::to_string_pretty(&self.records)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Holds the currently published catalog.
///
/// Readers take a cheap snapshot and keep using it even if a new catalog
/// is published meanwhile; a catalog is only visible once fully built.
#[derive(Debug, Default)]
pub struct CatalogStore {
    current: RwLock<Arc<Catalog>>,
}

impl CatalogStore {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    pub fn snapshot(&self) -> Arc<Catalog> {
        self.current.read().clone()
    }

    /// Replace the published catalog as a whole
    pub fn publish(&self, catalog: Catalog) {
        *self.current.write() = Arc::new(catalog);
    }
}
