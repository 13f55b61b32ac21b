//! Rule set and pure evaluation

use crate::error::FilterError;
use crate::origin::is_domestic_production;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Anything the filter can judge
pub trait Candidate {
    /// Original-language title
    fn title(&self) -> &str;

    /// Localized title, empty when the catalog has none
    fn localized_title(&self) -> &str {
        ""
    }

    /// Studio and production credits
    fn studios(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Region marker reported by the catalog
    fn region(&self) -> Option<&str> {
        None
    }
}

/// Kind of user-editable blacklist rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Keyword,
    Studio,
    Title,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Keyword => "keyword",
            RuleKind::Studio => "studio",
            RuleKind::Title => "title",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleKind {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(RuleKind::Keyword),
            "studio" => Ok(RuleKind::Studio),
            "title" => Ok(RuleKind::Title),
            other => Err(FilterError::UnknownKind(other.to_string())),
        }
    }
}

/// One independently toggleable list of patterns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleList {
    pub enabled: bool,
    pub patterns: BTreeSet<String>,
}

impl RuleList {
    pub fn enabled_with<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: true,
            patterns: patterns
                .into_iter()
                .map(Into::into)
                .map(|p: String| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// First pattern found (case-insensitively) inside any of `haystacks`
    fn first_match(&self, haystacks: &[String]) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.patterns
            .iter()
            .find(|pattern| {
                let needle = pattern.to_lowercase();
                haystacks.iter().any(|h| h.contains(&needle))
            })
            .map(String::as_str)
    }
}

/// Full blacklist configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Master switch; when off every item is accepted
    pub enabled: bool,
    /// Reject domestic-only productions
    pub origin_filter: bool,
    pub keyword: RuleList,
    pub studio: RuleList,
    pub title: RuleList,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            enabled: true,
            origin_filter: true,
            keyword: RuleList::enabled_with([
                "试看集", "PV", "预告", "OP", "ED", "CM", "番外", "OVA", "OAD",
            ]),
            studio: RuleList::enabled_with(Vec::<String>::new()),
            title: RuleList::enabled_with(Vec::<String>::new()),
        }
    }
}

/// Which rule rejected an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Origin,
    Keyword(String),
    Studio(String),
    Title(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Origin => write!(f, "domestic production"),
            RejectReason::Keyword(p) => write!(f, "keyword: {}", p),
            RejectReason::Studio(p) => write!(f, "studio: {}", p),
            RejectReason::Title(p) => write!(f, "title: {}", p),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(RejectReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

impl RuleSet {
    /// Every predicate off
    pub fn permissive() -> Self {
        Self {
            enabled: false,
            origin_filter: false,
            keyword: RuleList::default(),
            studio: RuleList::default(),
            title: RuleList::default(),
        }
    }

    pub fn list(&self, kind: RuleKind) -> &RuleList {
        match kind {
            RuleKind::Keyword => &self.keyword,
            RuleKind::Studio => &self.studio,
            RuleKind::Title => &self.title,
        }
    }

    pub(crate) fn list_mut(&mut self, kind: RuleKind) -> &mut RuleList {
        match kind {
            RuleKind::Keyword => &mut self.keyword,
            RuleKind::Studio => &mut self.studio,
            RuleKind::Title => &mut self.title,
        }
    }

    /// Judge an item; the first matching enabled rule decides
    pub fn evaluate<C: Candidate + ?Sized>(&self, item: &C) -> Verdict {
        if !self.enabled {
            return Verdict::Accepted;
        }

        let studios = item.studios();

        if self.origin_filter
            && is_domestic_production(item.title(), item.localized_title(), &studios, item.region())
        {
            return Verdict::Rejected(RejectReason::Origin);
        }

        let titles = [
            item.title().to_lowercase(),
            item.localized_title().to_lowercase(),
        ];

        if let Some(pattern) = self.keyword.first_match(&titles) {
            return Verdict::Rejected(RejectReason::Keyword(pattern.to_string()));
        }

        let credits: Vec<String> = studios.iter().map(|s| s.to_lowercase()).collect();
        if let Some(pattern) = self.studio.first_match(&credits) {
            return Verdict::Rejected(RejectReason::Studio(pattern.to_string()));
        }

        if let Some(pattern) = self.title.first_match(&titles) {
            return Verdict::Rejected(RejectReason::Title(pattern.to_string()));
        }

        Verdict::Accepted
    }

    pub fn accepts<C: Candidate + ?Sized>(&self, item: &C) -> bool {
        self.evaluate(item).is_accepted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Show {
        name: &'static str,
        name_cn: &'static str,
        studios: Vec<&'static str>,
    }

    impl Candidate for Show {
        fn title(&self) -> &str {
            self.name
        }
        fn localized_title(&self) -> &str {
            self.name_cn
        }
        fn studios(&self) -> Vec<&str> {
            self.studios.clone()
        }
    }

    fn show(name: &'static str) -> Show {
        Show {
            name,
            name_cn: "",
            studios: vec![],
        }
    }

    #[test]
    fn test_keyword_is_case_insensitive() {
        let mut rules = RuleSet::permissive();
        rules.enabled = true;
        rules.keyword = RuleList::enabled_with(["ova"]);

        assert_eq!(
            rules.evaluate(&show("Show X OVA")),
            Verdict::Rejected(RejectReason::Keyword("ova".to_string()))
        );
        assert!(rules.accepts(&show("Show X")));
    }

    #[test]
    fn test_keyword_matches_localized_title() {
        let rules = RuleSet::default();
        let item = Show {
            name: "Sousou no Frieren",
            name_cn: "葬送的芙莉莲 番外",
            studios: vec!["MADHOUSE"],
        };
        assert!(!rules.accepts(&item));
    }

    #[test]
    fn test_studio_rule() {
        let mut rules = RuleSet::permissive();
        rules.enabled = true;
        rules.studio = RuleList::enabled_with(["Studio Deen"]);

        let item = Show {
            name: "Some Show",
            name_cn: "",
            studios: vec!["studio deen"],
        };
        assert_eq!(
            rules.evaluate(&item),
            Verdict::Rejected(RejectReason::Studio("Studio Deen".to_string()))
        );
    }

    #[test]
    fn test_title_rule_substring() {
        let mut rules = RuleSet::permissive();
        rules.enabled = true;
        rules.title = RuleList::enabled_with(["Isekai"]);

        assert!(!rules.accepts(&show("My ISEKAI Life")));
        assert!(rules.accepts(&show("Slice of Life")));
    }

    #[test]
    fn test_origin_filter() {
        let rules = RuleSet::default();
        let domestic = Show {
            name: "Xian Ni",
            name_cn: "仙逆",
            studios: vec!["原力动画"],
        };
        assert_eq!(rules.evaluate(&domestic), Verdict::Rejected(RejectReason::Origin));

        let mut no_origin = rules.clone();
        no_origin.origin_filter = false;
        assert!(no_origin.accepts(&domestic));
    }

    #[test]
    fn test_disabled_list_never_matches() {
        let mut rules = RuleSet::default();
        rules.keyword.enabled = false;
        assert!(rules.accepts(&show("Show X OVA")));
    }

    #[test]
    fn test_everything_disabled_accepts_all() {
        let mut rules = RuleSet::default();
        rules.enabled = false;
        let domestic = Show {
            name: "",
            name_cn: "凡人修仙传 PV",
            studios: vec!["原力"],
        };
        assert!(rules.accepts(&domestic));
        assert!(RuleSet::permissive().accepts(&show("OVA")));
    }

    #[test]
    fn test_rule_kind_parsing() {
        assert_eq!("Keyword".parse::<RuleKind>().unwrap(), RuleKind::Keyword);
        assert_eq!(" studio ".parse::<RuleKind>().unwrap(), RuleKind::Studio);
        assert!("genre".parse::<RuleKind>().is_err());
    }

    #[test]
    fn test_rule_set_round_trips_through_json() {
        let rules = RuleSet::default();
        let json = serde_json::to_string(&rules).unwrap();
        assert!(json.contains("\"origin_filter\":true"));
        let back: RuleSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rules);
    }
}
