//! Catalog collaborator seam
//!
//! The server only talks to the catalog through [`CatalogUpstream`], so tests
//! can substitute a counting fake for the Bangumi client.

use async_trait::async_trait;
use bangumi_api::{BangumiClient, BangumiError, CalendarDay, Episode, Subject, SubjectType};

#[async_trait]
pub trait CatalogUpstream: Send + Sync + 'static {
    async fn schedule(&self) -> Result<Vec<CalendarDay>, BangumiError>;

    async fn search(&self, keyword: &str, limit: u32) -> Result<Vec<Subject>, BangumiError>;

    async fn detail(&self, id: u64) -> Result<Subject, BangumiError>;

    async fn episodes(&self, id: u64) -> Result<Vec<Episode>, BangumiError>;
}

#[async_trait]
impl CatalogUpstream for BangumiClient {
    async fn schedule(&self) -> Result<Vec<CalendarDay>, BangumiError> {
        self.calendar().await
    }

    async fn search(&self, keyword: &str, limit: u32) -> Result<Vec<Subject>, BangumiError> {
        self.search_subjects(keyword, Some(SubjectType::Anime), limit)
            .await
    }

    async fn detail(&self, id: u64) -> Result<Subject, BangumiError> {
        self.subject(id).await
    }

    async fn episodes(&self, id: u64) -> Result<Vec<Episode>, BangumiError> {
        BangumiClient::episodes(self, id, None).await
    }
}
