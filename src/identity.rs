use chrono::NaiveDate;

use crate::model::Section;

/// Characters of the description that feed the slug. Anything past this
/// prefix never changes the id.
const DESCRIPTION_PREFIX_CHARS: usize = 50;
const SLUG_WORDS: usize = 3;
const UNDATED: &str = "undated";

/// Deterministic document id: `<section initials>_<YYYYMMDD>[_<slug>]`.
///
/// `(Public Notice, 2023-07-15, "Amendment in Export Policy ...")`
/// yields `PN_20230715_amendment_in_export`.
pub fn identify(section: Section, date: Option<NaiveDate>, description: &str) -> String {
    let initials: String = section
        .name()
        .split_whitespace()
        .filter_map(|w| w.chars().next())
        .collect();

    let date_part = match date {
        Some(d) => d.format("%Y%m%d").to_string(),
        None => UNDATED.to_string(),
    };

    let prefix: String = description.chars().take(DESCRIPTION_PREFIX_CHARS).collect();
    let slug: String = prefix
        .split_whitespace()
        .take(SLUG_WORDS)
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();

    if slug.is_empty() {
        format!("{}_{}", initials, date_part)
    } else {
        format!("{}_{}_{}", initials, date_part, slug)
    }
}

// ── Tests ──
