//! Episode progress of an airing title
//!
//! The catalog's own `eps` counter often lags behind. Progress is recomputed
//! from the episode list (main episodes whose air date has passed) and, when
//! no episode carries a date, estimated at one episode per week since the
//! premiere.

use bangumi_api::{Episode, Subject};
use chrono::NaiveDate;
use serde::Serialize;

/// Gap beyond which the computed count overrides a lower reported one
const LAG_THRESHOLD: u32 = 2;
/// Gap beyond which the computed count overrides a higher reported one
const AHEAD_THRESHOLD: u32 = 3;
/// Weeks after the premiere from which a reported zero is suspicious
const ZERO_WEEKS: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Discrepancy {
    /// Reported zero episodes well after the premiere
    ZeroReported,
    /// Reported count says finished, aired count does not
    PrematureCompletion,
    Lagging,
    Ahead,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpisodeProgress {
    pub subject_id: u64,
    /// Episodes aired so far according to the catalog
    pub reported: Option<u32>,
    pub total: Option<u32>,
    /// Episodes aired so far by our own count
    pub aired: u32,
    /// `aired` came from the premiere date rather than the episode list
    pub estimated: bool,
    pub discrepancy: Option<Discrepancy>,
    /// Best figure to show
    pub current: u32,
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

fn aired_from_episodes(episodes: &[Episode], today: NaiveDate) -> Option<u32> {
    let dated: Vec<NaiveDate> = episodes
        .iter()
        .filter(|ep| ep.is_main())
        .filter_map(|ep| parse_date(&ep.airdate))
        .collect();
    if dated.is_empty() {
        return None;
    }
    Some(dated.iter().filter(|date| **date <= today).count() as u32)
}

fn aired_from_premiere(premiere: NaiveDate, total: u32, today: NaiveDate) -> u32 {
    let weeks = (today - premiere).num_days() / 7;
    if weeks < 1 || total == 0 {
        return 0;
    }
    (weeks as u32).clamp(1, total)
}

fn classify(
    reported: u32,
    aired: u32,
    total: Option<u32>,
    weeks_since_premiere: Option<i64>,
) -> Option<Discrepancy> {
    if aired == 0 {
        return None;
    }
    if reported == 0 && weeks_since_premiere.is_some_and(|w| w > ZERO_WEEKS) {
        return Some(Discrepancy::ZeroReported);
    }
    if let Some(total) = total {
        if reported >= total && aired < total {
            return Some(Discrepancy::PrematureCompletion);
        }
    }
    if aired.saturating_sub(reported) > LAG_THRESHOLD {
        return Some(Discrepancy::Lagging);
    }
    if reported.saturating_sub(aired) > AHEAD_THRESHOLD {
        return Some(Discrepancy::Ahead);
    }
    None
}

pub fn compute_progress(subject: &Subject, episodes: &[Episode], today: NaiveDate) -> EpisodeProgress {
    let total = subject
        .total_episodes
        .or_else(|| {
            let main = episodes.iter().filter(|ep| ep.is_main()).count() as u32;
            (main > 0).then_some(main)
        })
        .filter(|t| *t > 0);
    let premiere = subject.premiere().and_then(parse_date);

    let (aired, estimated) = match aired_from_episodes(episodes, today) {
        Some(aired) => (aired, false),
        None => match (premiere, total) {
            (Some(premiere), Some(total)) => (aired_from_premiere(premiere, total, today), true),
            _ => (0, true),
        },
    };

    let weeks = premiere.map(|p| (today - p).num_days() / 7);
    let discrepancy = subject
        .eps
        .and_then(|reported| classify(reported, aired, total, weeks));

    let current = match (subject.eps, discrepancy) {
        (Some(reported), None) => reported,
        _ => aired,
    };

    EpisodeProgress {
        subject_id: subject.id,
        reported: subject.eps,
        total,
        aired,
        estimated,
        discrepancy,
        current,
    }
}
