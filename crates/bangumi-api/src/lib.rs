//! Rust client for the Bangumi (bgm.tv) catalog API
//!
//! Covers the endpoints needed to follow airing anime:
//!
//! - `GET /calendar` - Weekly broadcast calendar
//! - `POST /v0/search/subjects` - Keyword search
//! - `GET /v0/subjects/{id}` - Subject detail
//! - `GET /v0/subjects/{id}/episodes` - Episode list
//!
//! Requests are sent one at a time with a configurable delay in front of each
//! one; an HTTP 429 doubles the delay.
//!
//! ```no_run
//! use bangumi_api::{BangumiClient, BangumiConfig};
//!
//! # async fn example() -> Result<(), bangumi_api::BangumiError> {
//! let client = BangumiClient::new(BangumiConfig::default())?;
//! for day in client.calendar().await? {
//!     println!("{}: {} titles", day.weekday.cn, day.items.len());
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod types;

pub use client::{BangumiClient, BangumiConfig};
pub use error::{BangumiError, Result};
pub use types::{
    CalendarDay, Collection, Episode, EpisodeType, Images, InfoboxEntry, InfoboxItem,
    InfoboxValue, Paged, Rating, Subject, SubjectType, Weekday,
};
