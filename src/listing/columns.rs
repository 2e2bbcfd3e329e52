const DATE_KEYWORDS: &[&str] = &["date", "dated", "dt"];
const DESCRIPTION_KEYWORDS: &[&str] = &["subject", "description", "title", "regarding"];
const ATTACHMENT_KEYWORDS: &[&str] = &["attach", "document", "file", "pdf", "download"];

const FALLBACK_DATE: usize = 2;
const FALLBACK_DESCRIPTION: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub index: usize,
    /// False when the positional fallback was used.
    pub by_keyword: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub date: Column,
    pub description: Column,
    pub attachment: Column,
}

impl ColumnMap {
    pub fn max_index(&self) -> usize {
        self.date
            .index
            .max(self.description.index)
            .max(self.attachment.index)
    }

    pub fn indices(&self) -> (usize, usize, usize) {
        (self.date.index, self.description.index, self.attachment.index)
    }
}

/// Map header cell texts to the date / description / attachment columns.
/// Never fails: unmatched columns get positional defaults.
pub fn resolve(headers: &[String]) -> ColumnMap {
    let lowered: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();

    let find = |keywords: &[&str], fallback: usize| -> Column {
        lowered
            .iter()
            .position(|h| keywords.iter().any(|k| h.contains(k)))
            .map(|index| Column { index, by_keyword: true })
            .unwrap_or(Column { index: fallback, by_keyword: false })
    };

    ColumnMap {
        date: find(DATE_KEYWORDS, FALLBACK_DATE),
        description: find(DESCRIPTION_KEYWORDS, FALLBACK_DESCRIPTION),
        attachment: find(ATTACHMENT_KEYWORDS, headers.len().saturating_sub(1)),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(h: &[&str]) -> Vec<String> {
        h.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn keyword_hits() {
        let m = resolve(&headers(&["S.No", "Number", "Date", "Subject", "Attachment"]));
        assert_eq!(m.indices(), (2, 3, 4));
        assert!(m.date.by_keyword && m.description.by_keyword && m.attachment.by_keyword);
    }

    #[test]
    fn first_match_by_position_wins() {
        let m = resolve(&headers(&["Dated", "Title", "Description", "PDF", "Download"]));
        assert_eq!(m.indices(), (0, 1, 3));
    }

    #[test]
    fn case_insensitive_substring() {
        let m = resolve(&headers(&["#", "NOTIFICATION DATE", "Regarding", "View File"]));
        assert_eq!(m.indices(), (1, 2, 3));
    }

    #[test]
    fn fallback_when_nothing_matches() {
        let m = resolve(&headers(&["A", "B", "C"]));
        assert_eq!(m.indices(), (2, 3, 2));
        assert!(!m.date.by_keyword && !m.description.by_keyword && !m.attachment.by_keyword);
        assert_eq!(m.max_index(), 3);
    }

    #[test]
    fn empty_header_row() {
        let m = resolve(&[]);
        assert_eq!(m.indices(), (2, 3, 0));
    }
}
