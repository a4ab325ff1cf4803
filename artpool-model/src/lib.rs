//! Core data model definitions shared across artpool crates.
#![allow(missing_docs)]

pub mod config;
pub mod image;
pub mod item;
pub mod rotation;
pub mod summary;

// Intentionally curated re-exports for downstream consumers.
pub use config::{
    FallbackLanguage, LanguageConfig, LibraryConfig, PoolConfig,
    QualityConfig, RetryConfig, RunScope, TmdbConfig,
};
pub use image::{Candidate, ImageDimensions, ImageDimensionsError, ImageKind};
pub use item::{CatalogItem, ItemId, ItemKind};
pub use rotation::RotationPolicy;
pub use summary::{ItemOutcome, ItemReport, RunSummary, SkipReason};
