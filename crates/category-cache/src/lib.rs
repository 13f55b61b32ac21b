//! Category cache facade
//!
//! Routes catalog lookups through a [`ttl_store::TtlStore`], applying a fixed
//! TTL per data [`Category`]. On a miss exactly one population runs per
//! `(category, key)`; concurrent callers join it and observe the same value
//! or the same failure. Failures are never cached.

mod cache;
mod error;
mod types;

pub use cache::CategoryCache;
pub use error::{FetchError, Result};
pub use types::{CacheConfig, Category, CategoryTtls, FacadeStats, Fetched, Freshness};
