//! Configuration loaded once from the environment

use crate::error::{Result, ServerError};
use bangumi_api::BangumiConfig;
use catalog_filter::{RuleList, RuleSet};
use category_cache::{CacheConfig, CategoryTtls};
use chrono::{FixedOffset, NaiveTime};
use daily_scheduler::{parse_time_of_day, SchedulerConfig};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_KEYWORDS: &str = "试看集,PV,预告,OP,ED,CM,番外,OVA,OAD";

#[derive(Debug, Clone)]
pub struct PushConfig {
    pub enabled: bool,
    pub webhook_url: Option<String>,
    pub chat_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub url: String,
    pub timeout: Duration,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: PathBuf,
    pub bangumi: BangumiConfig,
    pub cache: CacheConfig,
    pub scheduler: SchedulerConfig,
    pub poster_time: NaiveTime,
    pub cleanup_time: NaiveTime,
    pub push_time: NaiveTime,
    pub push: PushConfig,
    pub artifact_max_age_days: u32,
    /// `None` disables image rendering; posters degrade to text
    pub render: Option<RenderConfig>,
    /// Rules written to `blacklist.json` when it does not exist yet
    pub filter_seed: RuleSet,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable numbers fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        let bangumi = BangumiConfig {
            base_url: lookup("BANGUMI_BASE_URL").unwrap_or_else(|| BangumiConfig::default().base_url),
            timeout: Duration::from_secs(parsed(&lookup, "BANGUMI_TIMEOUT_SECS", 30)),
            rate_limit_delay: Duration::from_millis(parsed(&lookup, "BANGUMI_RATE_LIMIT_MS", 1000)),
            ..BangumiConfig::default()
        };

        let cache = CacheConfig {
            ttls: CategoryTtls {
                schedule: Duration::from_secs(parsed(&lookup, "SCHEDULE_TTL_SECS", 1800)),
                search: Duration::from_secs(parsed(&lookup, "SEARCH_TTL_SECS", 3600)),
                detail: Duration::from_secs(parsed(&lookup, "DETAIL_TTL_SECS", 3600)),
                episodes: Duration::from_secs(parsed(&lookup, "EPISODES_TTL_SECS", 1800)),
            },
            max_size: parsed(&lookup, "CACHE_MAX_SIZE", 500),
            stale_ttl: Duration::from_secs(parsed(&lookup, "STALE_TTL_SECS", 86400)),
            populate_timeout: Duration::from_secs(parsed(&lookup, "POPULATE_TIMEOUT_SECS", 45)),
        };

        let offset_hours: i32 = parsed(&lookup, "UTC_OFFSET_HOURS", 8);
        let utc_offset = offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ServerError::Config(format!("UTC_OFFSET_HOURS out of range: {}", offset_hours))
            })?;

        let scheduler = SchedulerConfig {
            tick: Duration::from_secs(parsed(&lookup, "SCHEDULER_TICK_SECS", 30)),
            retry_window: chrono::Duration::minutes(parsed(&lookup, "RETRY_WINDOW_MINS", 60)),
            utc_offset,
            state_path: Some(data_dir.join("scheduler_state.json")),
        };

        let push = PushConfig {
            enabled: flag(&lookup, "PUSH_ENABLED", false),
            webhook_url: lookup("PUSH_WEBHOOK_URL").filter(|url| !url.trim().is_empty()),
            chat_ids: list(&lookup, "PUSH_CHAT_IDS", ""),
        };
        if push.enabled && push.webhook_url.is_none() {
            return Err(ServerError::Config(
                "PUSH_ENABLED requires PUSH_WEBHOOK_URL".to_string(),
            ));
        }

        let render = lookup("RENDER_URL")
            .filter(|url| !url.trim().is_empty())
            .map(|url| RenderConfig {
                url,
                timeout: Duration::from_secs(parsed(&lookup, "RENDER_TIMEOUT_SECS", 60)),
            });

        let filter_seed = RuleSet {
            enabled: flag(&lookup, "FILTER_ENABLED", true),
            origin_filter: flag(&lookup, "FILTER_ORIGIN", true),
            keyword: RuleList::enabled_with(list(&lookup, "FILTER_KEYWORDS", DEFAULT_KEYWORDS)),
            studio: RuleList::enabled_with(list(&lookup, "FILTER_STUDIOS", "")),
            title: RuleList::enabled_with(list(&lookup, "FILTER_TITLES", "")),
        };

        Ok(Self {
            port: parsed(&lookup, "PORT", 3005),
            bangumi,
            cache,
            scheduler,
            poster_time: time_of_day(&lookup, "POSTER_TIME", "06:00")?,
            cleanup_time: time_of_day(&lookup, "CLEANUP_TIME", "03:30")?,
            push_time: time_of_day(&lookup, "PUSH_TIME", "09:00")?,
            push,
            artifact_max_age_days: parsed(&lookup, "ARTIFACT_MAX_AGE_DAYS", 7),
            render,
            filter_seed,
            data_dir,
        })
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.data_dir.join("artifacts")
    }

    pub fn blacklist_path(&self) -> PathBuf {
        self.data_dir.join("blacklist.json")
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn flag<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

fn list<F>(lookup: &F, key: &str, default: &str) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .unwrap_or_else(|| default.to_string())
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn time_of_day<F>(lookup: &F, key: &str, default: &str) -> Result<NaiveTime>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).unwrap_or_else(|| default.to_string());
    parse_time_of_day(&value).map_err(|e| ServerError::Config(format!("{}: {}", key, e)))
}
