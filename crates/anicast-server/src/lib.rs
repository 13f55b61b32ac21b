//! Anicast server library
//!
//! Wires the freshness engine (category cache, blacklist filter, artifact
//! cache, daily scheduler) to the Bangumi catalog, the poster renderer and
//! the push webhook, and exposes it over HTTP.

pub mod catalog;
pub mod config;
pub mod error;
pub mod jobs;
pub mod poster;
pub mod progress;
pub mod push;
pub mod render;
pub mod server;
pub mod text;
pub mod upstream;

pub use catalog::{Catalog, CatalogPayload, CatalogQuery, Served};
pub use config::Config;
pub use error::{Result, ServerError};
pub use server::{create_router, start_server, ServerState, SharedState};
