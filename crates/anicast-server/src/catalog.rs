//! Catalog queries routed through the category cache
//!
//! Every query maps onto a `(category, key)` slot. The cache holds the
//! upstream payload as received; schedules and search results go through the
//! blacklist on every read, so rule changes apply to the next call.

use crate::error::{Result, ServerError};
use crate::upstream::CatalogUpstream;
use bangumi_api::{BangumiError, CalendarDay, Episode, Subject};
use catalog_filter::{Blacklist, Candidate};
use category_cache::{CategoryCache, Category, FacadeStats, FetchError, Fetched, Freshness};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

const SCHEDULE_KEY: &str = "calendar";

/// A named catalog resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogQuery {
    Schedule,
    Search { keyword: String, limit: u32 },
    Detail { id: u64 },
    Episodes { id: u64 },
}

impl CatalogQuery {
    pub fn category(&self) -> Category {
        match self {
            CatalogQuery::Schedule => Category::Schedule,
            CatalogQuery::Search { .. } => Category::Search,
            CatalogQuery::Detail { .. } => Category::Detail,
            CatalogQuery::Episodes { .. } => Category::Episodes,
        }
    }

    /// Cache key within the category; search keywords are case-folded
    pub fn key(&self) -> String {
        match self {
            CatalogQuery::Schedule => SCHEDULE_KEY.to_string(),
            CatalogQuery::Search { keyword, limit } => {
                format!("{}:{}", keyword.trim().to_lowercase(), limit)
            }
            CatalogQuery::Detail { id } | CatalogQuery::Episodes { id } => id.to_string(),
        }
    }
}

/// Cached value; serializes as the bare inner payload
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CatalogPayload {
    Schedule(Vec<CalendarDay>),
    Subjects(Vec<Subject>),
    Subject(Box<Subject>),
    Episodes(Vec<Episode>),
}

/// A typed value together with where it came from
#[derive(Debug, Clone)]
pub struct Served<T> {
    pub value: T,
    pub freshness: Freshness,
}

/// Adapter so catalog subjects can be judged by the blacklist
struct Listed(Subject);

impl Candidate for Listed {
    fn title(&self) -> &str {
        &self.0.name
    }

    fn localized_title(&self) -> &str {
        &self.0.name_cn
    }

    fn studios(&self) -> Vec<&str> {
        self.0.production_credits()
    }

    fn region(&self) -> Option<&str> {
        self.0.region()
    }
}

fn filter_subjects(blacklist: &Blacklist, subjects: Vec<Subject>) -> Vec<Subject> {
    let listed = subjects.into_iter().map(Listed).collect();
    blacklist
        .filter(listed)
        .into_iter()
        .map(|Listed(subject)| subject)
        .collect()
}

pub struct Catalog {
    cache: CategoryCache<CatalogPayload>,
    upstream: Arc<dyn CatalogUpstream>,
    blacklist: Arc<Blacklist>,
}

impl Catalog {
    pub fn new(
        cache: CategoryCache<CatalogPayload>,
        upstream: Arc<dyn CatalogUpstream>,
        blacklist: Arc<Blacklist>,
    ) -> Self {
        Self {
            cache,
            upstream,
            blacklist,
        }
    }

    pub fn blacklist(&self) -> &Arc<Blacklist> {
        &self.blacklist
    }

    /// Fetch an unfiltered resource, serving a stale copy when the upstream fails
    pub async fn fetch(
        &self,
        query: CatalogQuery,
        force_refresh: bool,
    ) -> Result<Fetched<CatalogPayload>> {
        let category = query.category();
        let key = query.key();
        debug!(category = %category, key = %key, force_refresh, "Catalog fetch");

        let upstream = Arc::clone(&self.upstream);

        let fetched = self
            .cache
            .fetch_or_stale(category, &key, force_refresh, move || async move {
                let payload = match query {
                    CatalogQuery::Schedule => CatalogPayload::Schedule(upstream.schedule().await?),
                    CatalogQuery::Search { keyword, limit } => {
                        CatalogPayload::Subjects(upstream.search(keyword.trim(), limit).await?)
                    }
                    CatalogQuery::Detail { id } => {
                        CatalogPayload::Subject(Box::new(upstream.detail(id).await?))
                    }
                    CatalogQuery::Episodes { id } => {
                        CatalogPayload::Episodes(upstream.episodes(id).await?)
                    }
                };
                Ok::<_, BangumiError>(payload)
            })
            .await?;

        Ok(fetched)
    }

    pub async fn schedule(&self, force_refresh: bool) -> Result<Served<Vec<CalendarDay>>> {
        let fetched = self.fetch(CatalogQuery::Schedule, force_refresh).await?;
        match fetched.value.as_ref() {
            CatalogPayload::Schedule(days) => {
                let days = days
                    .iter()
                    .map(|day| CalendarDay {
                        weekday: day.weekday.clone(),
                        items: filter_subjects(&self.blacklist, day.items.clone()),
                    })
                    .collect();
                Ok(served(days, fetched.freshness))
            }
            _ => Err(mismatch(Category::Schedule)),
        }
    }

    pub async fn search(
        &self,
        keyword: &str,
        limit: u32,
        force_refresh: bool,
    ) -> Result<Served<Vec<Subject>>> {
        let query = CatalogQuery::Search {
            keyword: keyword.to_string(),
            limit,
        };
        let fetched = self.fetch(query, force_refresh).await?;
        match fetched.value.as_ref() {
            CatalogPayload::Subjects(subjects) => Ok(served(
                filter_subjects(&self.blacklist, subjects.clone()),
                fetched.freshness,
            )),
            _ => Err(mismatch(Category::Search)),
        }
    }

    pub async fn detail(&self, id: u64, force_refresh: bool) -> Result<Served<Subject>> {
        let fetched = self.fetch(CatalogQuery::Detail { id }, force_refresh).await?;
        match fetched.value.as_ref() {
            CatalogPayload::Subject(subject) => {
                Ok(served(subject.as_ref().clone(), fetched.freshness))
            }
            _ => Err(mismatch(Category::Detail)),
        }
    }

    pub async fn episodes(&self, id: u64, force_refresh: bool) -> Result<Served<Vec<Episode>>> {
        let fetched = self.fetch(CatalogQuery::Episodes { id }, force_refresh).await?;
        match fetched.value.as_ref() {
            CatalogPayload::Episodes(episodes) => Ok(served(episodes.clone(), fetched.freshness)),
            _ => Err(mismatch(Category::Episodes)),
        }
    }

    pub async fn purge_expired(&self) -> usize {
        self.cache.purge_expired().await
    }

    pub async fn stats(&self) -> FacadeStats {
        self.cache.stats().await
    }
}

fn served<T>(value: T, freshness: Freshness) -> Served<T> {
    Served { value, freshness }
}

fn mismatch(category: Category) -> ServerError {
    ServerError::Fetch(FetchError::Aborted(format!(
        "cached payload does not match category {}",
        category
    )))
}
