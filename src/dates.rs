use std::sync::LazyLock;

use chrono::{Duration, NaiveDate};
use regex::Regex;

/// Tried in order. Day-first numeric forms come before the US form so
/// "05/07/2023" reads as 5 July; "07/15/2023" only matches `%m/%d/%Y`.
const FORMATS: &[&str] = &[
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d %b, %Y",
    "%d %B, %Y",
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d %B %Y",
    "%d %b %Y",
];

static ORDINAL_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d{1,2})(?:st|nd|rd|th)?\s+(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|jun(?:e)?|jul(?:y)?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)[\s,]+(20\d{2})",
    )
    .unwrap()
});

const MONTHS: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Parse a free-form date as printed in listing tables. Returns `None`
/// when nothing recognisable is found.
pub fn normalize(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    for fmt in FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return Some(d);
        }
    }

    // Free text fallback: "15th July, 2023", "dated 3 Aug 2024"
    let caps = ORDINAL_DATE_RE.captures(text)?;
    let day: u32 = caps[1].parse().ok()?;
    let month_key = caps[2].to_lowercase();
    let month = MONTHS.iter().position(|m| month_key.starts_with(m))? as u32 + 1;
    let year: i32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// "15 Jul 2023", or "N/A" for unknown dates.
pub fn format_display(date: Option<NaiveDate>) -> String {
    match date {
        Some(d) => d.format("%d %b %Y").to_string(),
        None => "N/A".to_string(),
    }
}

/// Earliest day still inside a window of `days` days ending `today`.
pub fn cutoff(days: u32, today: NaiveDate) -> NaiveDate {
    today - Duration::days(days as i64)
}

// ── Tests ──
