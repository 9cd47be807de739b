pub mod catalog;
pub mod config;
pub mod detection;
pub mod error;
pub mod fingerprint;
pub mod matcher;
pub mod models;
pub mod pipeline;
pub mod rectify;
pub mod source;

pub use catalog::{Catalog, CatalogStore};
pub use config::ScannerConfig;
pub use detection::CardScanner;
pub use detection::corners::CornerOrdering;
pub use detection::quads::QuadDetector;
pub use error::ScanError;
pub use fingerprint::{Fingerprint, FingerprintEngine};
pub use models::{CardRecord, Contour, Identification, MatchResult, Point, Quadrilateral};
pub use pipeline::{BoundingBox, DebugConfig, Pipeline, PipelineContext, PipelineData, PipelineStep};
pub use rectify::{Rectifier, projection_between};
pub use source::{CardSource, DirectoryCardSource, ReferenceCard};
