//! Daily and weekly schedule posters
//!
//! A poster is built from the filtered broadcast calendar: the day's titles
//! (or the week's best) sorted by score, the first one featured. The HTML
//! document is handed to the render collaborator and the resulting image is
//! stored in the artifact cache. Without a renderer the poster is skipped and
//! callers fall back to the text digest.

use crate::catalog::Catalog;
use crate::error::Result;
use crate::render::{escape_html, Renderer};
use artifact_cache::{ArtifactCache, ArtifactKey, ArtifactKind, ArtifactRecord};
use bangumi_api::{CalendarDay, Subject};
use catalog_clock::Clock;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Weekday};
use serde::Serialize;
use std::fmt::Write;
use std::sync::Arc;
use tracing::{info, warn};

pub const POSTER_WIDTH: u32 = 1200;
pub const POSTER_HEIGHT: u32 = 1600;

const DAILY_OTHERS: usize = 4;
const WEEKLY_TOP: usize = 8;
const PLACEHOLDER: &str = "暂无";
const TIME_TBD: &str = "时间待定";

/// One title as shown on a poster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PosterCard {
    pub id: u64,
    pub title: String,
    pub score: String,
    pub watchers: String,
    pub air_time: String,
    pub cover_url: String,
}

impl PosterCard {
    pub fn from_subject(subject: &Subject) -> Self {
        let score = subject.score();
        let watchers = subject.watchers();
        // Calendar entries carry a date only; show its month-day tail
        let air_time = subject
            .premiere()
            .map(|date| {
                let skip = date.chars().count().saturating_sub(5);
                date.chars().skip(skip).collect::<String>()
            })
            .unwrap_or_else(|| TIME_TBD.to_string());

        Self {
            id: subject.id,
            title: subject.display_name().to_string(),
            score: if score > 0.0 {
                format!("{:.1}", score)
            } else {
                PLACEHOLDER.to_string()
            },
            watchers: if watchers > 0 {
                watchers.to_string()
            } else {
                PLACEHOLDER.to_string()
            },
            air_time,
            cover_url: subject.cover_url().to_string(),
        }
    }
}

/// Everything a poster template needs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PosterData {
    pub heading: String,
    pub featured: Option<PosterCard>,
    pub others: Vec<PosterCard>,
    pub generated_at: String,
}

impl PosterData {
    pub fn is_empty(&self) -> bool {
        self.featured.is_none()
    }
}

/// Titles airing on `date`, matched on the calendar's Monday-first weekday id
pub fn items_for_day(days: &[CalendarDay], date: NaiveDate) -> Vec<Subject> {
    let weekday = date.weekday().number_from_monday() as u8;
    days.iter()
        .find(|day| day.weekday.id == weekday)
        .map(|day| day.items.clone())
        .unwrap_or_default()
}

fn by_score_desc(mut items: Vec<Subject>) -> Vec<Subject> {
    items.sort_by(|a, b| b.score().total_cmp(&a.score()));
    items
}

fn assemble(heading: String, ranked: &[Subject], now: DateTime<FixedOffset>) -> PosterData {
    let mut cards = ranked.iter().map(PosterCard::from_subject);
    PosterData {
        heading,
        featured: cards.next(),
        others: cards.collect(),
        generated_at: now.format("%Y-%m-%d %H:%M").to_string(),
    }
}

pub fn prepare_daily(days: &[CalendarDay], now: DateTime<FixedOffset>) -> PosterData {
    let ranked = by_score_desc(items_for_day(days, now.date_naive()));
    let shown = ranked.len().min(1 + DAILY_OTHERS);
    assemble(
        now.format("%Y年%m月%d日").to_string(),
        &ranked[..shown],
        now,
    )
}

pub fn prepare_weekly(days: &[CalendarDay], now: DateTime<FixedOffset>) -> PosterData {
    let all = days.iter().flat_map(|day| day.items.iter().cloned()).collect();
    let ranked = by_score_desc(all);
    let shown = ranked.len().min(WEEKLY_TOP);
    let week = now.date_naive().iso_week();
    assemble(
        format!("{}年第{}周 汇总", week.year(), week.week()),
        &ranked[..shown],
        now,
    )
}

fn card_html(out: &mut String, card: &PosterCard, class: &str) {
    let _ = write!(
        out,
        r#"<div class="{class}"><img src="{cover}" alt=""><div class="info"><h2>{title}</h2><p class="meta">★ {score} · {watchers} 在看 · {air}</p></div></div>"#,
        class = class,
        cover = escape_html(&card.cover_url),
        title = escape_html(&card.title),
        score = escape_html(&card.score),
        watchers = escape_html(&card.watchers),
        air = escape_html(&card.air_time),
    );
}

/// Self-contained poster document sized for the renderer viewport
pub fn poster_html(data: &PosterData) -> String {
    let mut out = String::with_capacity(4096);
    let _ = write!(
        out,
        r#"<!DOCTYPE html><html><head><meta charset="utf-8"><style>
body{{margin:0;width:{w}px;min-height:{h}px;font-family:"Noto Sans CJK SC",sans-serif;background:#1d1f2b;color:#f4f4f8}}
header{{padding:48px 56px 24px}}h1{{margin:0;font-size:56px}}
.featured{{display:flex;gap:32px;margin:0 56px 32px;padding:24px;background:#2a2d3d;border-radius:16px}}
.featured img{{width:320px;height:450px;object-fit:cover;border-radius:12px}}
.grid{{display:grid;grid-template-columns:1fr 1fr;gap:24px;margin:0 56px}}
.card{{display:flex;gap:16px;padding:16px;background:#2a2d3d;border-radius:12px}}
.card img{{width:120px;height:170px;object-fit:cover;border-radius:8px}}
.meta{{color:#b8bccf}}.empty{{margin:120px 56px;font-size:40px;color:#b8bccf}}
footer{{padding:32px 56px;color:#7d8197;font-size:20px}}
</style></head><body><header><h1>{heading}</h1></header>"#,
        w = POSTER_WIDTH,
        h = POSTER_HEIGHT,
        heading = escape_html(&data.heading),
    );

    match &data.featured {
        None => out.push_str(r#"<p class="empty">今日暂无番剧更新</p>"#),
        Some(featured) => {
            card_html(&mut out, featured, "featured");
            out.push_str(r#"<div class="grid">"#);
            for card in &data.others {
                card_html(&mut out, card, "card");
            }
            out.push_str("</div>");
        }
    }

    let _ = write!(
        out,
        "<footer>生成于 {}</footer></body></html>",
        escape_html(&data.generated_at)
    );
    out
}

/// Generates posters and stores them as artifacts
pub struct PosterService {
    catalog: Arc<Catalog>,
    artifacts: Arc<ArtifactCache>,
    renderer: Option<Arc<dyn Renderer>>,
    clock: Arc<dyn Clock>,
    utc_offset: FixedOffset,
}

impl PosterService {
    pub fn new(
        catalog: Arc<Catalog>,
        artifacts: Arc<ArtifactCache>,
        renderer: Option<Arc<dyn Renderer>>,
        clock: Arc<dyn Clock>,
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            catalog,
            artifacts,
            renderer,
            clock,
            utc_offset,
        }
    }

    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }

    pub fn local_now(&self) -> DateTime<FixedOffset> {
        self.clock.now().with_timezone(&self.utc_offset)
    }

    /// Build, render and store one poster for the current local date
    ///
    /// Returns `Ok(None)` when no renderer is configured.
    pub async fn generate(&self, kind: ArtifactKind) -> Result<Option<ArtifactRecord>> {
        let Some(renderer) = &self.renderer else {
            info!(kind = %kind, "No renderer configured, skipping poster");
            return Ok(None);
        };

        let now = self.local_now();
        let schedule = self.catalog.schedule(false).await?;
        let (data, key) = match kind {
            ArtifactKind::Daily => (
                prepare_daily(&schedule.value, now),
                ArtifactKey::daily(now.date_naive()),
            ),
            ArtifactKind::Weekly => (
                prepare_weekly(&schedule.value, now),
                ArtifactKey::weekly(now.date_naive()),
            ),
        };

        if data.is_empty() {
            warn!(kind = %kind, "No titles for poster, rendering empty notice");
        }

        let image = renderer
            .render(&poster_html(&data), POSTER_WIDTH, POSTER_HEIGHT)
            .await?;
        let record = self.artifacts.put(&key, &image).await?;
        info!(
            key = %key,
            size = record.size,
            freshness = schedule.freshness.as_str(),
            "Poster stored"
        );
        Ok(Some(record))
    }

    /// The daily poster, plus the weekly one on Mondays
    pub async fn generate_scheduled(&self) -> Result<Vec<ArtifactRecord>> {
        let mut records = Vec::new();
        if let Some(record) = self.generate(ArtifactKind::Daily).await? {
            records.push(record);
        }
        if self.local_now().weekday() == Weekday::Mon {
            if let Some(record) = self.generate(ArtifactKind::Weekly).await? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::tests::{catalog_with, day, subject, FakeUpstream};
    use crate::error::ServerError;
    use async_trait::async_trait;
    use catalog_clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[derive(Default)]
    pub(crate) struct FakeRenderer {
        pub calls: AtomicUsize,
        pub fail: bool,
    }

    #[async_trait]
    impl Renderer for FakeRenderer {
        async fn render(&self, html: &str, width: u32, height: u32) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ServerError::Render("renderer down".to_string()));
            }
            assert_eq!((width, height), (POSTER_WIDTH, POSTER_HEIGHT));
            Ok(html.as_bytes().to_vec())
        }
    }

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    /// Monday 2026-10-19 06:00 at +08:00
    fn monday_morning() -> DateTime<FixedOffset> {
        offset().with_ymd_and_hms(2026, 10, 19, 6, 0, 0).unwrap()
    }

    fn week() -> Vec<CalendarDay> {
        vec![
            day(
                1,
                vec![
                    subject(1, "Low", 5.0),
                    subject(2, "High", 8.9),
                    subject(3, "Mid", 7.1),
                    subject(4, "Four", 6.0),
                    subject(5, "Five", 6.5),
                    subject(6, "Six", 4.0),
                ],
            ),
            day(2, vec![subject(7, "Tuesday", 9.1)]),
            day(7, (10..20).map(|i| subject(i, "Sunday", 1.0 + i as f64 / 10.0)).collect()),
        ]
    }

    #[test]
    fn test_items_for_day_uses_monday_first_ids() {
        let monday = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert_eq!(items_for_day(&week(), monday).len(), 6);
        assert_eq!(items_for_day(&week(), sunday).len(), 10);
        assert!(items_for_day(&week(), NaiveDate::from_ymd_opt(2026, 10, 21).unwrap()).is_empty());
    }

    #[test]
    fn test_prepare_daily_features_best_score() {
        let data = prepare_daily(&week(), monday_morning());
        assert_eq!(data.heading, "2026年10月19日");
        assert_eq!(data.featured.as_ref().unwrap().title, "High");
        let others: Vec<u64> = data.others.iter().map(|c| c.id).collect();
        assert_eq!(others, vec![3, 5, 4, 1]);
        assert_eq!(data.generated_at, "2026-10-19 06:00");
    }

    #[test]
    fn test_prepare_weekly_takes_top_eight() {
        let data = prepare_weekly(&week(), monday_morning());
        assert_eq!(data.heading, "2026年第43周 汇总");
        assert_eq!(data.featured.as_ref().unwrap().id, 7);
        assert_eq!(data.others.len(), WEEKLY_TOP - 1);
    }

    #[test]
    fn test_empty_day() {
        let data = prepare_daily(&[], monday_morning());
        assert!(data.is_empty());
        assert!(poster_html(&data).contains("今日暂无番剧更新"));
    }

    #[test]
    fn test_card_placeholders() {
        let mut s = subject(1, "Unrated", 0.0);
        s.name_cn = "未评分".to_string();
        s.air_date = Some("2026-10-04".to_string());
        let card = PosterCard::from_subject(&s);
        assert_eq!(card.title, "未评分");
        assert_eq!(card.score, PLACEHOLDER);
        assert_eq!(card.watchers, PLACEHOLDER);
        assert_eq!(card.air_time, "10-04");

        assert_eq!(PosterCard::from_subject(&subject(2, "x", 7.25)).air_time, TIME_TBD);
    }

    #[test]
    fn test_poster_html_escapes_titles() {
        let data = prepare_daily(
            &[day(1, vec![subject(1, "<script>alert(1)</script>", 8.0)])],
            monday_morning(),
        );
        let html = poster_html(&data);
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("width:1200px"));
    }

    fn service(renderer: Option<Arc<dyn Renderer>>, dir: &std::path::Path) -> PosterService {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 18, 22, 0, 0).unwrap(),
        ));
        let upstream = Arc::new(FakeUpstream {
            days: week(),
            ..FakeUpstream::default()
        });
        PosterService::new(
            Arc::new(catalog_with(upstream)),
            Arc::new(ArtifactCache::with_clock(dir, clock.clone())),
            renderer,
            clock,
            offset(),
        )
    }

    #[tokio::test]
    async fn test_generate_without_renderer_is_skipped() {
        let dir = tempdir().unwrap();
        let posters = service(None, dir.path());
        posters.artifacts.init().await.unwrap();

        assert!(posters.generate(ArtifactKind::Daily).await.unwrap().is_none());
        assert!(posters.artifacts.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_generate_scheduled_on_monday_stores_both() {
        let dir = tempdir().unwrap();
        let renderer = Arc::new(FakeRenderer::default());
        let posters = service(Some(renderer.clone() as Arc<dyn Renderer>), dir.path());
        posters.artifacts.init().await.unwrap();

        let records = posters.generate_scheduled().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);

        let daily = posters
            .artifacts
            .get(&ArtifactKey::daily(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()))
            .await
            .unwrap();
        assert!(String::from_utf8(daily).unwrap().contains("High"));
        assert!(posters
            .artifacts
            .has(&ArtifactKey::weekly(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()))
            .await);
    }

    #[tokio::test]
    async fn test_render_failure_propagates() {
        let dir = tempdir().unwrap();
        let renderer = Arc::new(FakeRenderer {
            fail: true,
            ..FakeRenderer::default()
        });
        let posters = service(Some(renderer as Arc<dyn Renderer>), dir.path());
        posters.artifacts.init().await.unwrap();

        assert!(matches!(
            posters.generate(ArtifactKind::Daily).await,
            Err(ServerError::Render(_))
        ));
        assert!(posters.artifacts.list().await.is_empty());
    }
}
