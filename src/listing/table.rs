use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::columns;
use crate::dates;
use crate::model::{ListingRecord, Section};

static TABLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static WINDOW_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"window\.open\(\s*['"]([^'"]+)['"]"#).unwrap());

/// Result of parsing one listing page.
#[derive(Debug, Default)]
pub struct Listing {
    pub records: Vec<ListingRecord>,
    pub table_found: bool,
    pub skipped_short_rows: usize,
    pub skipped_without_attachment: usize,
}

impl Listing {
    pub fn skipped_rows(&self) -> usize {
        self.skipped_short_rows + self.skipped_without_attachment
    }
}

/// Parse the first table of a listing page into records, newest first.
/// Rows that are too short or carry no resolvable attachment are counted
/// and dropped.
pub fn extract(markup: &str, base_url: &Url, section: Section) -> Listing {
    let doc = Html::parse_document(markup);
    let Some(table) = doc.select(&TABLE_SEL).next() else {
        warn!(section = %section, "no table in listing page");
        return Listing::default();
    };

    let mut rows = table.select(&ROW_SEL);
    let Some(header_row) = rows.next() else {
        return Listing { table_found: true, ..Default::default() };
    };

    let headers: Vec<String> = cells(header_row).into_iter().map(cell_text).collect();
    let map = columns::resolve(&headers);
    debug!(section = %section, ?headers, columns = ?map.indices(), "resolved listing columns");
    let min_cells = map.max_index() + 1;

    let mut listing = Listing { table_found: true, ..Default::default() };

    for row in rows {
        let cells = cells(row);
        if cells.len() < min_cells {
            listing.skipped_short_rows += 1;
            continue;
        }

        let Some(attachment_url) = attachment_link(cells[map.attachment.index], base_url) else {
            listing.skipped_without_attachment += 1;
            continue;
        };

        let raw_date_text = cell_text(cells[map.date.index]);
        listing.records.push(ListingRecord {
            section,
            date: dates::normalize(&raw_date_text),
            raw_date_text,
            description: cell_text(cells[map.description.index]),
            attachment_url,
        });
    }

    // Stable: equal dates keep page order. `None` sorts last.
    listing.records.sort_by(|a, b| match (a.date, b.date) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    listing
}

/// Direct `td`/`th` children of a row, so nested tables don't leak cells.
fn cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|e| matches!(e.value().name(), "td" | "th"))
        .collect()
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// First usable link in the cell: an `href`, else a `window.open('...')`
/// target from an `onclick` on the anchor or the cell itself.
fn attachment_link(cell: ElementRef<'_>, base_url: &Url) -> Option<String> {
    for anchor in cell.select(&ANCHOR_SEL) {
        let el = anchor.value();
        let href = el.attr("href").map(str::trim).filter(|h| is_navigable(h));
        let target = href.or_else(|| el.attr("onclick").and_then(window_open_target));
        if let Some(link) = target.and_then(|t| resolve(base_url, t)) {
            return Some(link);
        }
    }
    cell.value()
        .attr("onclick")
        .and_then(window_open_target)
        .and_then(|t| resolve(base_url, t))
}

fn is_navigable(href: &str) -> bool {
    !href.is_empty() && !href.starts_with('#') && !href.to_lowercase().starts_with("javascript:")
}

fn window_open_target(onclick: &str) -> Option<&str> {
    WINDOW_OPEN_RE
        .captures(onclick)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn resolve(base_url: &Url, link: &str) -> Option<String> {
    match base_url.join(link) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => Some(u.to_string()),
        Ok(u) => {
            debug!(link = %u, "ignoring non-http attachment link");
            None
        }
        Err(e) => {
            debug!(link, error = %e, "unresolvable attachment link");
            None
        }
    }
}

// ── Tests ──
