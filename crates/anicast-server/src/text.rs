//! Plain-text renditions of catalog data
//!
//! Used for the push digest and whenever posters cannot be rendered.

use crate::poster::items_for_day;
use crate::progress::EpisodeProgress;
use bangumi_api::{CalendarDay, Subject};
use chrono::{Datelike, NaiveDate};

const WEEKDAY_NAMES: [&str; 7] = ["周一", "周二", "周三", "周四", "周五", "周六", "周日"];
const PER_DAY: usize = 5;
const SEARCH_SHOWN: usize = 10;
const SUMMARY_CHARS: usize = 50;

fn weekday_name(id: u8) -> &'static str {
    match id {
        1..=7 => WEEKDAY_NAMES[(id - 1) as usize],
        _ => "未知",
    }
}

fn score_label(subject: &Subject) -> String {
    let score = subject.score();
    if score > 0.0 {
        format!("⭐ {:.1}", score)
    } else {
        "⭐ 暂无评分".to_string()
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// The whole week, today's entry marked
pub fn format_schedule(days: &[CalendarDay], today: NaiveDate) -> String {
    if days.iter().all(|day| day.items.is_empty()) {
        return "暂无放送日程信息".to_string();
    }

    let today_id = today.weekday().number_from_monday() as u8;
    let mut lines = vec!["📺 每日放送日程".to_string()];

    for day in days.iter().filter(|day| !day.items.is_empty()) {
        let name = weekday_name(day.weekday.id);
        if day.weekday.id == today_id {
            lines.push(format!("\n【🌟 {} (今天)】", name));
        } else {
            lines.push(format!("\n【{}】", name));
        }
        for item in day.items.iter().take(PER_DAY) {
            lines.push(format!("  📺 {}", item.display_name()));
        }
        if day.items.len() > PER_DAY {
            lines.push(format!("  ... 还有{}部番剧", day.items.len() - PER_DAY));
        }
    }

    lines.join("\n")
}

/// Today's titles, best rated first
pub fn daily_digest(days: &[CalendarDay], today: NaiveDate) -> String {
    let mut items = items_for_day(days, today);
    let heading = format!(
        "🎌 {} {} 新番",
        today.format("%Y-%m-%d"),
        weekday_name(today.weekday().number_from_monday() as u8)
    );
    if items.is_empty() {
        return format!("{}\n\n今日暂无番剧更新", heading);
    }

    items.sort_by(|a, b| b.score().total_cmp(&a.score()));
    let mut lines = vec![heading, String::new()];
    for (i, item) in items.iter().enumerate() {
        lines.push(format!("{}. {}  {}", i + 1, item.display_name(), score_label(item)));
    }
    lines.join("\n")
}

pub fn format_search(keyword: &str, results: &[Subject]) -> String {
    if results.is_empty() {
        return format!("未找到与「{}」相关的番剧", keyword);
    }

    let mut lines = vec![format!("🔍 搜索「{}」的结果 (共{}个):", keyword, results.len())];
    for item in results.iter().take(SEARCH_SHOWN) {
        lines.push(String::new());
        lines.push(format!("📺 {} (ID: {})", item.display_name(), item.id));
        lines.push(format!("   {}", score_label(item)));
        let summary = truncate(&item.summary, SUMMARY_CHARS);
        if !summary.is_empty() {
            lines.push(format!("   📝 {}", summary));
        }
    }
    lines.join("\n")
}

pub fn format_detail(subject: &Subject, progress: Option<&EpisodeProgress>) -> String {
    let mut lines = vec![format!("📺 {}", subject.display_name())];
    if !subject.name_cn.trim().is_empty() && subject.name != subject.name_cn {
        lines.push(format!("   {}", subject.name));
    }

    match &subject.rating {
        Some(rating) if rating.score > 0.0 => {
            lines.push(format!("📊 ⭐ {:.1} ({}人评分)", rating.score, rating.total))
        }
        _ => lines.push("📊 ⭐ 暂无评分".to_string()),
    }

    if let Some(premiere) = subject.premiere() {
        match subject.air_weekday {
            Some(id) => lines.push(format!("📅 {} ({})", premiere, weekday_name(id))),
            None => lines.push(format!("📅 {}", premiere)),
        }
    }

    let total = progress.and_then(|p| p.total).or(subject.total_episodes);
    if let Some(total) = total {
        lines.push(format!("🎬 共{}集", total));
    }
    let current = progress.map(|p| p.current).or(subject.eps);
    if let Some(current) = current.filter(|c| *c > 0) {
        lines.push(format!("📺 已更新至{}集", current));
    }

    let summary = subject.summary.trim();
    lines.push(format!(
        "\n📝 简介:\n{}",
        if summary.is_empty() { "暂无简介" } else { summary }
    ));
    lines.join("\n")
}
