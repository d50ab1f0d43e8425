//! Static region keyword and flag emoji tables
//!
//! Region detection is a case-insensitive substring match over the display
//! name. Entries are ordered so that more specific keywords win over short
//! codes they could collide with ("Ukraine" before the "kr" of Korea,
//! "Frankfurt" via Germany before the "fr" of France, "Russia" and
//! "Australia" before the "us" of the United States).

struct RegionEntry {
    region: &'static str,
    emoji: &'static str,
    keywords: &'static [&'static str],
}

const REGIONS: &[RegionEntry] = &[
    RegionEntry {
        region: "hongkong",
        emoji: "\u{1F1ED}\u{1F1F0}",
        keywords: &["hong kong", "hongkong", "hkg", "hk", "香港", "港"],
    },
    RegionEntry {
        region: "taiwan",
        emoji: "\u{1F1F9}\u{1F1FC}",
        keywords: &["taiwan", "taipei", "tw", "台湾", "臺灣", "台北"],
    },
    RegionEntry {
        region: "macau",
        emoji: "\u{1F1F2}\u{1F1F4}",
        keywords: &["macau", "macao", "澳门", "澳門"],
    },
    RegionEntry {
        region: "japan",
        emoji: "\u{1F1EF}\u{1F1F5}",
        keywords: &["japan", "tokyo", "osaka", "jp", "日本", "东京", "大阪"],
    },
    RegionEntry {
        region: "singapore",
        emoji: "\u{1F1F8}\u{1F1EC}",
        keywords: &["singapore", "sgp", "sg", "新加坡", "狮城", "坡"],
    },
    RegionEntry {
        region: "ukraine",
        emoji: "\u{1F1FA}\u{1F1E6}",
        keywords: &["ukraine", "kyiv", "乌克兰"],
    },
    RegionEntry {
        region: "korea",
        emoji: "\u{1F1F0}\u{1F1F7}",
        keywords: &["korea", "seoul", "kor", "kr", "韩国", "韓國", "首尔"],
    },
    RegionEntry {
        region: "germany",
        emoji: "\u{1F1E9}\u{1F1EA}",
        keywords: &["germany", "frankfurt", "ger", "deu", "德国", "德國", "法兰克福"],
    },
    RegionEntry {
        region: "france",
        emoji: "\u{1F1EB}\u{1F1F7}",
        keywords: &["france", "paris", "fra", "fr", "法国", "法國", "巴黎"],
    },
    RegionEntry {
        region: "netherlands",
        emoji: "\u{1F1F3}\u{1F1F1}",
        keywords: &["netherlands", "amsterdam", "nld", "nl", "荷兰", "荷蘭"],
    },
    RegionEntry {
        region: "australia",
        emoji: "\u{1F1E6}\u{1F1FA}",
        keywords: &["australia", "sydney", "aus", "澳大利亚", "悉尼"],
    },
    RegionEntry {
        region: "russia",
        emoji: "\u{1F1F7}\u{1F1FA}",
        keywords: &["russia", "moscow", "rus", "ru", "俄罗斯", "俄羅斯", "莫斯科"],
    },
    RegionEntry {
        region: "usa",
        emoji: "\u{1F1FA}\u{1F1F8}",
        keywords: &[
            "united states",
            "america",
            "los angeles",
            "san jose",
            "silicon valley",
            "usa",
            "us",
            "美国",
            "美國",
            "洛杉矶",
            "圣何塞",
        ],
    },
    RegionEntry {
        region: "uk",
        emoji: "\u{1F1EC}\u{1F1E7}",
        keywords: &["united kingdom", "britain", "london", "gbr", "uk", "英国", "英國", "伦敦"],
    },
    RegionEntry {
        region: "canada",
        emoji: "\u{1F1E8}\u{1F1E6}",
        keywords: &["canada", "toronto", "can", "ca", "加拿大", "多伦多"],
    },
    // Before India: "indonesia" contains the "ind" short code
    RegionEntry {
        region: "indonesia",
        emoji: "\u{1F1EE}\u{1F1E9}",
        keywords: &["indonesia", "jakarta", "idn", "印尼", "印度尼西亚"],
    },
    RegionEntry {
        region: "india",
        emoji: "\u{1F1EE}\u{1F1F3}",
        keywords: &["india", "mumbai", "ind", "印度", "孟买"],
    },
    RegionEntry {
        region: "turkey",
        emoji: "\u{1F1F9}\u{1F1F7}",
        keywords: &["turkey", "istanbul", "tur", "tr", "土耳其"],
    },
    RegionEntry {
        region: "brazil",
        emoji: "\u{1F1E7}\u{1F1F7}",
        keywords: &["brazil", "sao paulo", "bra", "br", "巴西", "圣保罗"],
    },
    RegionEntry {
        region: "malaysia",
        emoji: "\u{1F1F2}\u{1F1FE}",
        keywords: &["malaysia", "kuala lumpur", "mys", "my", "马来西亚", "馬來西亞"],
    },
    RegionEntry {
        region: "vietnam",
        emoji: "\u{1F1FB}\u{1F1F3}",
        keywords: &["vietnam", "hanoi", "vnm", "vn", "越南"],
    },
    RegionEntry {
        region: "thailand",
        emoji: "\u{1F1F9}\u{1F1ED}",
        keywords: &["thailand", "bangkok", "tha", "th", "泰国", "泰國", "曼谷"],
    },
    RegionEntry {
        region: "philippines",
        emoji: "\u{1F1F5}\u{1F1ED}",
        keywords: &["philippines", "manila", "phl", "ph", "菲律宾", "菲律賓"],
    },
];

/// Region fallback when no keyword matches
pub const OTHER: &str = "other";

/// Detect a region hint from a display name
///
/// Matching is case-insensitive substring, first table entry wins.
/// Returns [`OTHER`] when nothing matches.
pub fn detect(name: &str) -> &'static str {
    let lowered = name.to_lowercase();
    for entry in REGIONS {
        for keyword in entry.keywords {
            if lowered.contains(keyword) {
                return entry.region;
            }
        }
    }
    OTHER
}

/// Flag emoji for a region hint, `None` for unknown regions and `"other"`
pub fn emoji_for(region: &str) -> Option<&'static str> {
    REGIONS
        .iter()
        .find(|entry| entry.region == region)
        .map(|entry| entry.emoji)
}
