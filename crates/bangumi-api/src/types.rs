//! Bangumi API response types

use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// Treat an explicit JSON `null` like a missing field
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Subject category on Bangumi
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectType {
    Book,
    Anime,
    Music,
    Game,
    Real,
}

impl SubjectType {
    pub fn code(&self) -> u8 {
        match self {
            SubjectType::Book => 1,
            SubjectType::Anime => 2,
            SubjectType::Music => 3,
            SubjectType::Game => 4,
            SubjectType::Real => 6,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(SubjectType::Book),
            2 => Some(SubjectType::Anime),
            3 => Some(SubjectType::Music),
            4 => Some(SubjectType::Game),
            6 => Some(SubjectType::Real),
            _ => None,
        }
    }
}

impl FromStr for SubjectType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "book" => Ok(SubjectType::Book),
            "anime" => Ok(SubjectType::Anime),
            "music" => Ok(SubjectType::Music),
            "game" => Ok(SubjectType::Game),
            "real" => Ok(SubjectType::Real),
            other => Err(format!("unknown subject type '{}'", other)),
        }
    }
}

/// Episode category (`type` field of an episode)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EpisodeType {
    Main,
    Special,
    Opening,
    Ending,
    Trailer,
    Mad,
    Other,
}

impl EpisodeType {
    pub fn code(&self) -> u8 {
        match self {
            EpisodeType::Main => 0,
            EpisodeType::Special => 1,
            EpisodeType::Opening => 2,
            EpisodeType::Ending => 3,
            EpisodeType::Trailer => 4,
            EpisodeType::Mad => 5,
            EpisodeType::Other => 6,
        }
    }
}

/// Day header of the broadcast calendar; `id` runs 1 (Monday) to 7 (Sunday)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Weekday {
    #[serde(default, deserialize_with = "nullable")]
    pub en: String,
    #[serde(default, deserialize_with = "nullable")]
    pub cn: String,
    #[serde(default, deserialize_with = "nullable")]
    pub ja: String,
    pub id: u8,
}

/// One day of `GET /calendar`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub weekday: Weekday,
    #[serde(default, deserialize_with = "nullable")]
    pub items: Vec<Subject>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default, deserialize_with = "nullable")]
    pub total: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Images {
    pub large: String,
    pub common: String,
    pub medium: String,
    pub small: String,
    pub grid: String,
}

impl Images {
    /// Best image for a poster card
    pub fn cover(&self) -> &str {
        [&self.medium, &self.common, &self.large]
            .into_iter()
            .find(|url| !url.is_empty())
            .map(String::as_str)
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Collection {
    pub wish: u32,
    pub collect: u32,
    pub doing: u32,
    pub on_hold: u32,
    pub dropped: u32,
}

/// One entry of a list-valued infobox field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoboxEntry {
    #[serde(default)]
    pub k: Option<String>,
    pub v: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InfoboxValue {
    Text(String),
    List(Vec<InfoboxEntry>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoboxItem {
    pub key: String,
    pub value: InfoboxValue,
}

impl InfoboxItem {
    pub fn texts(&self) -> Vec<&str> {
        match &self.value {
            InfoboxValue::Text(text) => vec![text.as_str()],
            InfoboxValue::List(entries) => entries.iter().map(|e| e.v.as_str()).collect(),
        }
    }
}

/// Infobox keys that carry production credits
const PRODUCTION_KEYS: &[&str] = &["动画制作", "制作", "制作公司", "製作"];

const REGION_KEY: &str = "国家/地区";

/// A subject as returned by both the legacy calendar and the v0 endpoints
///
/// Fields absent from one of the two shapes default to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: u64,
    #[serde(rename = "type", default)]
    pub subject_type: u8,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name_cn: String,
    #[serde(default, deserialize_with = "nullable")]
    pub summary: String,
    /// Premiere date (v0)
    #[serde(default)]
    pub date: Option<String>,
    /// Premiere date (legacy calendar)
    #[serde(default)]
    pub air_date: Option<String>,
    #[serde(default)]
    pub air_weekday: Option<u8>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub images: Option<Images>,
    #[serde(default)]
    pub rating: Option<Rating>,
    #[serde(default)]
    pub collection: Option<Collection>,
    #[serde(default, deserialize_with = "nullable")]
    pub infobox: Vec<InfoboxItem>,
    /// Episodes aired so far as reported by the site
    #[serde(default)]
    pub eps: Option<u32>,
    #[serde(default)]
    pub total_episodes: Option<u32>,
}

impl Subject {
    /// Localized name when present, otherwise the original
    pub fn display_name(&self) -> &str {
        if self.name_cn.trim().is_empty() {
            &self.name
        } else {
            &self.name_cn
        }
    }

    pub fn score(&self) -> f64 {
        self.rating.as_ref().map(|r| r.score).unwrap_or(0.0)
    }

    pub fn premiere(&self) -> Option<&str> {
        self.date
            .as_deref()
            .or(self.air_date.as_deref())
            .filter(|d| !d.is_empty())
    }

    pub fn cover_url(&self) -> &str {
        self.images.as_ref().map(Images::cover).unwrap_or("")
    }

    pub fn watchers(&self) -> u32 {
        self.collection.as_ref().map(|c| c.doing).unwrap_or(0)
    }

    /// Text values of every infobox field named `key`
    pub fn infobox_texts(&self, key: &str) -> Vec<&str> {
        self.infobox
            .iter()
            .filter(|item| item.key == key)
            .flat_map(InfoboxItem::texts)
            .collect()
    }

    /// Studio and production credits from the infobox
    pub fn production_credits(&self) -> Vec<&str> {
        PRODUCTION_KEYS
            .iter()
            .flat_map(|key| self.infobox_texts(key))
            .collect()
    }

    pub fn region(&self) -> Option<&str> {
        self.infobox_texts(REGION_KEY).into_iter().next()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: u64,
    #[serde(rename = "type", default)]
    pub episode_type: u8,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name_cn: String,
    #[serde(default, deserialize_with = "nullable")]
    pub sort: f64,
    #[serde(default)]
    pub ep: Option<f64>,
    /// `YYYY-MM-DD`, empty when not yet scheduled
    #[serde(default, deserialize_with = "nullable")]
    pub airdate: String,
    #[serde(default, deserialize_with = "nullable")]
    pub duration: String,
    #[serde(default, deserialize_with = "nullable")]
    pub comment: u32,
}

impl Episode {
    pub fn is_main(&self) -> bool {
        self.episode_type == EpisodeType::Main.code()
    }
}

/// Paged list envelope used by the v0 API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paged<T> {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calendar_day_deserialization() {
        let json = r#"{
            "weekday": {"en": "Mon", "cn": "星期一", "ja": "月耀日", "id": 1},
            "items": [{
                "id": 400602,
                "url": "http://bgm.tv/subject/400602",
                "type": 2,
                "name": "葬送のフリーレン",
                "name_cn": "葬送的芙莉莲",
                "summary": "",
                "air_date": "2023-09-29",
                "air_weekday": 1,
                "rating": {"total": 100, "count": {"10": 50}, "score": 9.1},
                "rank": 1,
                "images": null,
                "collection": {"doing": 1234}
            }]
        }"#;

        let day: CalendarDay = serde_json::from_str(json).unwrap();
        assert_eq!(day.weekday.id, 1);
        let subject = &day.items[0];
        assert_eq!(subject.display_name(), "葬送的芙莉莲");
        assert_eq!(subject.score(), 9.1);
        assert_eq!(subject.watchers(), 1234);
        assert_eq!(subject.cover_url(), "");
        assert_eq!(subject.premiere(), Some("2023-09-29"));
    }

    #[test]
    fn test_subject_infobox() {
        let json = r#"{
            "id": 1,
            "type": 2,
            "name": "Some Show",
            "name_cn": "",
            "summary": null,
            "date": "2026-10-04",
            "images": {"large": "l.jpg", "common": "c.jpg", "medium": "", "small": "s.jpg", "grid": "g.jpg"},
            "infobox": [
                {"key": "中文名", "value": "某剧"},
                {"key": "动画制作", "value": "MAPPA"},
                {"key": "制作", "value": [{"v": "製作委員会"}, {"k": "协力", "v": "Studio X"}]},
                {"key": "国家/地区", "value": "日本"}
            ],
            "eps": 12,
            "total_episodes": 13
        }"#;

        let subject: Subject = serde_json::from_str(json).unwrap();
        assert_eq!(subject.display_name(), "Some Show");
        assert_eq!(subject.summary, "");
        assert_eq!(subject.cover_url(), "c.jpg");
        assert_eq!(
            subject.production_credits(),
            vec!["MAPPA", "製作委員会", "Studio X"]
        );
        assert_eq!(subject.region(), Some("日本"));
        assert_eq!(subject.eps, Some(12));
    }

    #[test]
    fn test_episode_page() {
        let json = r#"{
            "data": [
                {"id": 10, "type": 0, "name": "Ep 1", "name_cn": "", "sort": 1, "ep": 1, "airdate": "2026-10-04", "duration": "00:24:00", "comment": 5},
                {"id": 11, "type": 2, "name": "OP", "sort": 1, "airdate": null}
            ],
            "total": 2,
            "limit": 100,
            "offset": 0
        }"#;

        let page: Paged<Episode> = serde_json::from_str(json).unwrap();
        assert_eq!(page.total, 2);
        assert!(page.data[0].is_main());
        assert!(!page.data[1].is_main());
        assert_eq!(page.data[1].airdate, "");
    }

    #[test]
    fn test_subject_type_codes() {
        assert_eq!("anime".parse::<SubjectType>().unwrap().code(), 2);
        assert_eq!(SubjectType::from_code(6), Some(SubjectType::Real));
        assert!("podcast".parse::<SubjectType>().is_err());
    }
}
