//! Durable artifact cache
//!
//! Stores generated poster images on disk under a path derived from their
//! [`ArtifactKey`], with an `index.json` that survives restarts. The index is
//! rewritten atomically on every mutation and heals itself when a referenced
//! file has gone missing.

mod cache;
mod error;
mod types;

pub use cache::ArtifactCache;
pub use error::{ArtifactError, Result};
pub use types::{ArtifactKey, ArtifactKind, ArtifactRecord, ArtifactStats, DEFAULT_VARIANT};
