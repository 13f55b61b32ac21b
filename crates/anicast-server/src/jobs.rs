//! Scheduled jobs

use crate::catalog::Catalog;
use crate::poster::PosterService;
use crate::push::{deliver_all, Notifier};
use crate::text::daily_digest;
use artifact_cache::ArtifactCache;
use async_trait::async_trait;
use catalog_clock::Clock;
use chrono::FixedOffset;
use daily_scheduler::{Job, JobResult};
use std::sync::Arc;
use tracing::info;

pub const POSTER_JOB: &str = "poster";
pub const CLEANUP_JOB: &str = "cleanup";
pub const PUSH_JOB: &str = "push";

/// Daily poster, plus the weekly one on Mondays
pub struct PosterJob {
    pub posters: Arc<PosterService>,
}

#[async_trait]
impl Job for PosterJob {
    async fn run(&self) -> JobResult {
        let records = self.posters.generate_scheduled().await?;
        info!(generated = records.len(), "Poster job finished");
        Ok(())
    }
}

/// Drops old artifacts and expired cache entries
pub struct CleanupJob {
    pub artifacts: Arc<ArtifactCache>,
    pub catalog: Arc<Catalog>,
    pub max_age_days: u32,
}

#[async_trait]
impl Job for CleanupJob {
    async fn run(&self) -> JobResult {
        let artifacts = self.artifacts.cleanup(self.max_age_days).await?;
        let entries = self.catalog.purge_expired().await;
        info!(artifacts, entries, "Cleanup job finished");
        Ok(())
    }
}

/// Sends today's text digest to every configured chat
pub struct PushJob {
    pub catalog: Arc<Catalog>,
    pub notifier: Arc<dyn Notifier>,
    pub chat_ids: Vec<String>,
    pub clock: Arc<dyn Clock>,
    pub utc_offset: FixedOffset,
}

#[async_trait]
impl Job for PushJob {
    async fn run(&self) -> JobResult {
        let today = self.clock.now().with_timezone(&self.utc_offset).date_naive();
        let schedule = self.catalog.schedule(false).await?;
        let text = daily_digest(&schedule.value, today);
        let delivered = deliver_all(self.notifier.as_ref(), &self.chat_ids, &text).await?;
        info!(delivered, "Push job finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::{catalog_with, day, subject, FakeUpstream};
    use crate::push::tests::RecordingNotifier;
    use artifact_cache::ArtifactKey;
    use catalog_clock::ManualClock;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use std::sync::atomic::Ordering;
    use tempfile::tempdir;

    fn clock() -> Arc<ManualClock> {
        // 2026-10-19 09:00 at +08:00, a Monday
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 19, 1, 0, 0).unwrap(),
        ))
    }

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    fn upstream() -> Arc<FakeUpstream> {
        Arc::new(FakeUpstream {
            days: vec![day(1, vec![subject(1, "Monday Show", 7.0)])],
            ..FakeUpstream::default()
        })
    }

    #[tokio::test]
    async fn test_poster_job_without_renderer_succeeds() {
        let dir = tempdir().unwrap();
        let clock = clock();
        let artifacts = Arc::new(ArtifactCache::with_clock(dir.path(), clock.clone()));
        artifacts.init().await.unwrap();
        let posters = PosterService::new(
            Arc::new(catalog_with(upstream())),
            Arc::clone(&artifacts),
            None,
            clock,
            offset(),
        );

        let job = PosterJob {
            posters: Arc::new(posters),
        };
        assert!(job.run().await.is_ok());
        assert!(artifacts.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_job_removes_old_artifacts() {
        let dir = tempdir().unwrap();
        let clock = clock();
        let artifacts = Arc::new(ArtifactCache::with_clock(dir.path(), clock.clone()));
        artifacts.init().await.unwrap();

        let old = ArtifactKey::daily(NaiveDate::from_ymd_opt(2026, 10, 1).unwrap());
        artifacts.put(&old, b"old").await.unwrap();
        clock.advance(Duration::days(10));
        let fresh = ArtifactKey::daily(NaiveDate::from_ymd_opt(2026, 10, 29).unwrap());
        artifacts.put(&fresh, b"fresh").await.unwrap();

        let job = CleanupJob {
            artifacts: Arc::clone(&artifacts),
            catalog: Arc::new(catalog_with(upstream())),
            max_age_days: 7,
        };
        job.run().await.unwrap();

        assert!(!artifacts.has(&old).await);
        assert!(artifacts.has(&fresh).await);
    }

    #[tokio::test]
    async fn test_push_job_sends_digest() {
        let notifier = Arc::new(RecordingNotifier::default());
        let upstream = upstream();
        let job = PushJob {
            catalog: Arc::new(catalog_with(Arc::clone(&upstream))),
            notifier: notifier.clone(),
            chat_ids: vec!["group:1".to_string(), "group:2".to_string()],
            clock: clock(),
            utc_offset: offset(),
        };

        job.run().await.unwrap();

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].1.contains("Monday Show"));
        assert_eq!(upstream.schedule_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_push_job_fails_when_upstream_down() {
        let upstream = upstream();
        upstream.failing.store(true, Ordering::SeqCst);
        let job = PushJob {
            catalog: Arc::new(catalog_with(upstream)),
            notifier: Arc::new(RecordingNotifier::default()),
            chat_ids: vec!["group:1".to_string()],
            clock: clock(),
            utc_offset: offset(),
        };

        assert!(job.run().await.is_err());
    }
}
