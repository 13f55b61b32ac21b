//! Bounded in-memory key-value store with per-entry expiry
//!
//! Entries expire lazily: a read that finds an entry past its `expires_at`
//! removes it and reports a miss. When an insert would push the store past
//! `max_size`, the entry closest to expiry is evicted (the incoming entry
//! competes too, so a newcomer that would expire first is simply not stored).

mod store;
mod types;

pub use store::TtlStore;
pub use types::{CacheEntry, StoreStats};
