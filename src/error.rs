use thiserror::Error;

/// Errors produced by the card identification core
#[derive(Debug, Error)]
pub enum ScanError {
    /// The detector found no qualifying quadrilateral in the frame.
    /// Not fatal: there is simply nothing to identify this pass.
    #[error("no card candidates found in frame")]
    NoCandidatesFound,

    /// Matching was requested against an empty or unloaded catalog
    #[error("card catalog is empty or not loaded")]
    CatalogUnavailable,

    /// Corners are collinear or coincident, so no homography exists
    #[error("degenerate quadrilateral: {0}")]
    DegenerateGeometry(&'static str),

    #[error("invalid fingerprint '{0}': expected 16 hexadecimal digits")]
    InvalidFingerprint(String),

    #[error("duplicate card id in catalog: {0}")]
    DuplicateCardId(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error("catalog format error: {0}")]
    CatalogFormat(#[from] serde_json::Error),

    #[error("config format error: {0}")]
    ConfigFormat(#[from] toml::de::Error),

    #[error(transparent)]
    Pipeline(#[from] anyhow::Error),
}

impl ScanError {
    /// Recover a typed error from a pipeline failure when one is inside
    pub fn from_pipeline(err: anyhow::Error) -> Self {
        match err.downcast::<ScanError>() {
            Ok(scan) => scan,
            Err(other) => ScanError::Pipeline(other),
        }
    }
}
