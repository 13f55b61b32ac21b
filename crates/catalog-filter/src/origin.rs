//! Production-origin classification

/// Studios and platforms whose credit marks a domestic (mainland) production
const DOMESTIC_STUDIOS: &[&str] = &[
    "腾讯",
    "哔哩哔哩",
    "爱奇艺",
    "优酷",
    "芒果TV",
    "搜狐视频",
    "乐视",
    "若鸿",
    "索以",
    "炎龙",
    "原力",
    "追光",
    "十月数码",
    "米粒",
    "绘梦",
    "福煦",
    "绘界",
    "澜映",
    "震雷",
    "彩色铅笔",
    "大火鸟",
    "娃娃鱼",
    "铁风筝",
];

const DOMESTIC_REGIONS: &[&str] = &["中国大陆", "CN"];

pub(crate) fn is_domestic_studio(credit: &str) -> bool {
    DOMESTIC_STUDIOS.iter().any(|studio| credit.contains(studio))
}

/// Heuristic: domestic studio credit, a region marker, or a title that
/// only exists in localized form
pub(crate) fn is_domestic_production(
    title: &str,
    localized_title: &str,
    studios: &[&str],
    region: Option<&str>,
) -> bool {
    if studios.iter().any(|credit| is_domestic_studio(credit)) {
        return true;
    }
    if region.is_some_and(|r| DOMESTIC_REGIONS.contains(&r)) {
        return true;
    }
    title.trim().is_empty() && !localized_title.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_studio_credit_substring() {
        assert!(is_domestic_studio("绘梦动画"));
        assert!(!is_domestic_studio("MAPPA"));
    }

    #[test]
    fn test_localized_only_title() {
        assert!(is_domestic_production("", "凡人修仙传", &[], None));
        assert!(!is_domestic_production("葬送のフリーレン", "葬送的芙莉莲", &[], None));
    }

    #[test]
    fn test_region_marker() {
        assert!(is_domestic_production("Title", "", &[], Some("中国大陆")));
        assert!(!is_domestic_production("Title", "", &[], Some("日本")));
    }
}
