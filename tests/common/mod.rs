#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from cardscan for tests; each test binary
// uses a different subset
#[allow(unused_imports)]
pub use cardscan::{CardScanner, Catalog, CatalogStore, FingerprintEngine, ScanError, ScannerConfig};
