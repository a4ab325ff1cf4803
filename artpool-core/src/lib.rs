//! # Artpool Core
//!
//! Maintains a bounded on-disk pool of candidate artwork per media item and
//! periodically promotes one pool member to be the item's displayed artwork.
//!
//! ## Overview
//!
//! - **Top-up**: queries image providers, filters candidates by kind,
//!   orientation, resolution and language, downloads with retry, and rejects
//!   near-duplicates by byte-sampled fingerprint
//! - **Rotation**: sequential (persisted cursor) or random selection, with a
//!   cooldown that pauses top-up but never promotion
//! - **State**: rotation state and per-pool side-files are written with
//!   atomic replace semantics; corrupt documents read as empty
//! - **Management**: list, inspect, add, remove, reorder, force-promote and
//!   purge pools
//!
//! ## Architecture
//!
//! - [`catalog`]: the host media catalog port and a filesystem adapter
//! - [`providers`]: image provider port, registry and the TMDB provider
//! - [`classify`]: candidate admission and the original-language heuristic
//! - [`topup`]: pool replenishment
//! - [`rotation`]: member ordering, selection and promotion
//! - [`orchestrator`]: the sequential run loop and run summary
//! - [`management`]: manual curation operations
//!
//! ## Examples
//!
//! ```no_run
//! use artpool_core::{Orchestrator, RunContext, config};
//!
//! async fn rotate_once() -> anyhow::Result<()> {
//!     let (pool_config, _source) = config::load_from_env()?;
//!     let ctx = RunContext::from_config(pool_config)?;
//!     let summary = Orchestrator::new(ctx).run().await?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

pub mod catalog;
pub mod classify;
pub mod config;
pub mod context;
pub mod error;
pub mod fetch;
pub mod fingerprint;
pub mod management;
pub mod orchestrator;
pub mod pass;
pub mod pool;
pub mod probe;
pub mod providers;
pub mod rotation;
pub mod state;
pub mod topup;

pub use catalog::{
    ArtworkTarget, CatalogCapabilities, CatalogError, CollaboratorError, FsCatalog,
    MediaCatalog,
};
pub use context::RunContext;
pub use error::{PoolError, Result};
pub use fetch::{HttpImageFetcher, ImageFetcher};
pub use fingerprint::Fingerprint;
pub use management::{MemberDetails, PoolDetails, PoolManager, PoolSummary, PurgeReport};
pub use orchestrator::Orchestrator;
pub use providers::{ImageProvider, ProviderError, ProviderRegistry};
pub use topup::{TopUpEngine, TopUpReport};

pub use artpool_model as model;
