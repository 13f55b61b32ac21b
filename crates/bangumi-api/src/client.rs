//! Bangumi API HTTP client

use crate::error::{BangumiError, Result};
use crate::types::{CalendarDay, Episode, EpisodeType, Paged, Subject, SubjectType};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.bgm.tv";
const DEFAULT_USER_AGENT: &str = "anicast/0.1 (https://github.com/anicast/anicast)";
const MAX_DELAY: Duration = Duration::from_secs(10);
/// Smallest delay after a 429, so a zero base delay still backs off
const MIN_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct BangumiConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Pause before every request
    pub rate_limit_delay: Duration,
    pub user_agent: String,
}

impl Default for BangumiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            rate_limit_delay: Duration::from_secs(1),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Client for the Bangumi catalog API
///
/// Requests go out one at a time. The mutex guarding the current delay is
/// held for the whole request, which is what serializes them.
pub struct BangumiClient {
    http: reqwest::Client,
    base_url: String,
    base_delay: Duration,
    delay: Mutex<Duration>,
}

impl BangumiClient {
    pub fn new(config: BangumiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            base_delay: config.rate_limit_delay,
            delay: Mutex::new(config.rate_limit_delay),
        })
    }

    /// Weekly broadcast calendar, one entry per weekday
    pub async fn calendar(&self) -> Result<Vec<CalendarDay>> {
        let url = format!("{}/calendar", self.base_url);
        self.send(self.http.get(&url)).await
    }

    /// Search subjects by keyword, optionally restricted to one type
    pub async fn search_subjects(
        &self,
        keyword: &str,
        subject_type: Option<SubjectType>,
        limit: u32,
    ) -> Result<Vec<Subject>> {
        let url = format!("{}/v0/search/subjects?limit={}", self.base_url, limit);
        let mut body = json!({ "keyword": keyword });
        if let Some(t) = subject_type {
            body["filter"] = json!({ "type": [t.code()] });
        }

        let page: Paged<Subject> = self.send(self.http.post(&url).json(&body)).await?;
        Ok(page.data)
    }

    pub async fn subject(&self, id: u64) -> Result<Subject> {
        let url = format!("{}/v0/subjects/{}", self.base_url, id);
        self.send(self.http.get(&url)).await
    }

    /// Episodes of a subject, optionally only one episode type
    pub async fn episodes(&self, id: u64, episode_type: Option<EpisodeType>) -> Result<Vec<Episode>> {
        let mut url = format!("{}/v0/episodes?subject_id={}", self.base_url, id);
        if let Some(t) = episode_type {
            url.push_str(&format!("&type={}", t.code()));
        }
        let page: Paged<Episode> = self.send(self.http.get(&url)).await?;
        Ok(page.data)
    }

    /// Delay currently applied before each request
    pub async fn current_delay(&self) -> Duration {
        *self.delay.lock().await
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let mut delay = self.delay.lock().await;
        if !delay.is_zero() {
            tokio::time::sleep(*delay).await;
        }

        let response = request.header("Accept", "application/json").send().await?;
        let status = response.status();

        if status.as_u16() == 429 {
            *delay = (*delay * 2).max(MIN_BACKOFF).min(MAX_DELAY);
            warn!(delay_ms = delay.as_millis() as u64, "Bangumi rate limited, backing off");
            return Err(BangumiError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BangumiError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        if *delay > self.base_delay {
            *delay = (*delay / 2).max(self.base_delay);
            debug!(delay_ms = delay.as_millis() as u64, "Bangumi delay relaxed");
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> BangumiClient {
        BangumiClient::new(BangumiConfig {
            base_url: server.base_url(),
            timeout: Duration::from_secs(5),
            rate_limit_delay: Duration::ZERO,
            ..BangumiConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_calendar() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/calendar");
                then.status(200).json_body(serde_json::json!([
                    {"weekday": {"en": "Sun", "cn": "星期日", "ja": "日耀日", "id": 7}, "items": [
                        {"id": 1, "type": 2, "name": "A", "name_cn": "甲", "rating": {"total": 3, "score": 7.2}}
                    ]}
                ]));
            })
            .await;

        let days = client(&server).calendar().await.unwrap();
        mock.assert_async().await;
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].weekday.id, 7);
        assert_eq!(days[0].items[0].display_name(), "甲");
    }

    #[tokio::test]
    async fn test_search_posts_keyword_and_type() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v0/search/subjects")
                    .query_param("limit", "5")
                    .json_body(serde_json::json!({"keyword": "frieren", "filter": {"type": [2]}}));
                then.status(200).json_body(serde_json::json!({
                    "data": [{"id": 400602, "type": 2, "name": "葬送のフリーレン", "name_cn": "葬送的芙莉莲"}],
                    "total": 1, "limit": 5, "offset": 0
                }));
            })
            .await;

        let results = client(&server)
            .search_subjects("frieren", Some(SubjectType::Anime), 5)
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(results[0].id, 400602);
    }

    #[tokio::test]
    async fn test_subject_not_found_is_status_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v0/subjects/999");
                then.status(404).body("not found");
            })
            .await;

        match client(&server).subject(999).await {
            Err(BangumiError::Status { code, body }) => {
                assert_eq!(code, 404);
                assert_eq!(body, "not found");
            }
            other => panic!("expected status error, got {:?}", other.map(|s| s.id)),
        }
    }

    #[tokio::test]
    async fn test_episodes_filter_by_type() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v0/episodes")
                    .query_param("subject_id", "42")
                    .query_param("type", "0");
                then.status(200).json_body(serde_json::json!({
                    "data": [{"id": 1, "type": 0, "sort": 1, "airdate": "2026-10-04"}],
                    "total": 1, "limit": 100, "offset": 0
                }));
            })
            .await;

        let episodes = client(&server)
            .episodes(42, Some(EpisodeType::Main))
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(episodes[0].airdate, "2026-10-04");
    }

    #[tokio::test]
    async fn test_rate_limit_backs_off() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/calendar");
                then.status(429);
            })
            .await;

        let client = client(&server);
        assert!(matches!(
            client.calendar().await,
            Err(BangumiError::RateLimited)
        ));
        assert_eq!(client.current_delay().await, MIN_BACKOFF);
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v0/subjects/1");
                then.status(200).body("<html>maintenance</html>");
            })
            .await;

        assert!(matches!(
            client(&server).subject(1).await,
            Err(BangumiError::Json(_))
        ));
    }
}
