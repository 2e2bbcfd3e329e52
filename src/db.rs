use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::model::{ExtractionMethod, ExtractionResult, PageExtraction, ProcessedDocument, Section};
use crate::pipeline::RunReport;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let conn = Connection::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            id             TEXT PRIMARY KEY,
            section        TEXT NOT NULL,
            date           TEXT,
            raw_date_text  TEXT NOT NULL,
            description    TEXT NOT NULL,
            attachment_url TEXT NOT NULL,
            source_path    TEXT NOT NULL,
            method         TEXT NOT NULL CHECK(method IN ('direct_text','ocr','failed')),
            char_count     INTEGER NOT NULL,
            text           TEXT NOT NULL,
            failure        TEXT,
            notes          TEXT,
            processed_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_documents_section ON documents(section);
        CREATE INDEX IF NOT EXISTS idx_documents_date ON documents(date);

        CREATE TABLE IF NOT EXISTS document_pages (
            document_id  TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            page_index   INTEGER NOT NULL,
            method       TEXT NOT NULL,
            char_count   INTEGER NOT NULL,
            PRIMARY KEY (document_id, page_index)
        );

        CREATE TABLE IF NOT EXISTS runs (
            id               INTEGER PRIMARY KEY,
            started_at       TEXT NOT NULL,
            finished_at      TEXT NOT NULL,
            sections_ok      INTEGER NOT NULL,
            sections_failed  INTEGER NOT NULL,
            documents        INTEGER NOT NULL,
            failures         INTEGER NOT NULL,
            report           TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

// ── Documents ──

pub fn processed_ids(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT id FROM documents WHERE method != 'failed'")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<HashSet<String>, _>>()?;
    Ok(ids)
}

/// Upsert documents and their per-page breakdown. Re-saving an id replaces it.
pub fn save_documents(conn: &Connection, docs: &[ProcessedDocument]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut d_stmt = tx.prepare(
            "INSERT OR REPLACE INTO documents
             (id, section, date, raw_date_text, description, attachment_url, source_path,
              method, char_count, text, failure, notes, processed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )?;
        let mut clear_stmt = tx.prepare("DELETE FROM document_pages WHERE document_id = ?1")?;
        let mut p_stmt = tx.prepare(
            "INSERT INTO document_pages (document_id, page_index, method, char_count)
             VALUES (?1, ?2, ?3, ?4)",
        )?;

        for d in docs {
            let x = &d.extraction;
            let notes = if x.notes.is_empty() { None } else { Some(serde_json::to_string(&x.notes)?) };
            clear_stmt.execute(rusqlite::params![d.id])?;
            d_stmt.execute(rusqlite::params![
                d.id,
                d.section.key(),
                d.date.map(|v| v.to_string()),
                d.raw_date_text,
                d.description,
                d.attachment_url,
                x.source_path.to_string_lossy(),
                x.method.as_str(),
                x.char_count,
                x.text,
                x.failure,
                notes,
                d.processed_at.to_rfc3339(),
            ])?;
            for p in &x.pages {
                p_stmt.execute(rusqlite::params![d.id, p.page_index, p.method.as_str(), p.char_count])?;
            }
        }
    }
    tx.commit()?;
    Ok(docs.len())
}

pub fn fetch_document(conn: &Connection, id: &str) -> Result<Option<ProcessedDocument>> {
    let row = conn
        .query_row(
            "SELECT id, section, date, raw_date_text, description, attachment_url, source_path,
                    method, char_count, text, failure, notes, processed_at
             FROM documents WHERE id = ?1",
            [id],
            |row| {
                Ok(StoredDocument {
                    id: row.get(0)?,
                    section: row.get(1)?,
                    date: row.get(2)?,
                    raw_date_text: row.get(3)?,
                    description: row.get(4)?,
                    attachment_url: row.get(5)?,
                    source_path: row.get(6)?,
                    method: row.get(7)?,
                    char_count: row.get(8)?,
                    text: row.get(9)?,
                    failure: row.get(10)?,
                    notes: row.get(11)?,
                    processed_at: row.get(12)?,
                })
            },
        )
        .optional()?;
    let Some(row) = row else { return Ok(None) };

    let mut stmt = conn.prepare(
        "SELECT page_index, method, char_count FROM document_pages
         WHERE document_id = ?1 ORDER BY page_index",
    )?;
    let pages = stmt
        .query_map([id], |r| Ok((r.get::<_, usize>(0)?, r.get::<_, String>(1)?, r.get::<_, usize>(2)?)))?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|(page_index, method, char_count)| -> Result<PageExtraction> {
            Ok(PageExtraction { page_index, method: parse_method(&method)?, char_count })
        })
        .collect::<Result<Vec<_>>>()?;

    row.into_document(pages).map(Some)
}

struct StoredDocument {
    id: String,
    section: String,
    date: Option<String>,
    raw_date_text: String,
    description: String,
    attachment_url: String,
    source_path: String,
    method: String,
    char_count: usize,
    text: String,
    failure: Option<String>,
    notes: Option<String>,
    processed_at: String,
}

impl StoredDocument {
    fn into_document(self, pages: Vec<PageExtraction>) -> Result<ProcessedDocument> {
        let section: Section = self.section.parse().map_err(anyhow::Error::msg)?;
        let date = self
            .date
            .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d"))
            .transpose()
            .with_context(|| format!("bad stored date for {}", self.id))?;
        let processed_at = DateTime::parse_from_rfc3339(&self.processed_at)
            .with_context(|| format!("bad processed_at for {}", self.id))?
            .with_timezone(&Utc);
        let notes: Vec<String> = match self.notes {
            Some(n) => serde_json::from_str(&n)?,
            None => Vec::new(),
        };

        Ok(ProcessedDocument {
            id: self.id,
            section,
            date,
            raw_date_text: self.raw_date_text,
            description: self.description,
            attachment_url: self.attachment_url,
            extraction: ExtractionResult {
                source_path: PathBuf::from(self.source_path),
                method: parse_method(&self.method)?,
                text: self.text,
                char_count: self.char_count,
                pages,
                failure: self.failure,
                notes,
            },
            processed_at,
        })
    }
}

fn parse_method(s: &str) -> Result<ExtractionMethod> {
    ExtractionMethod::parse(s).with_context(|| format!("unknown extraction method '{}'", s))
}

// ── Runs ──

pub fn save_run(conn: &Connection, report: &RunReport) -> Result<i64> {
    let (ok, failed) = report.section_counts();
    conn.execute(
        "INSERT INTO runs (started_at, finished_at, sections_ok, sections_failed, documents, failures, report)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            report.started_at.to_rfc3339(),
            report.finished_at.to_rfc3339(),
            ok,
            failed,
            report.document_count(),
            report.failure_count(),
            serde_json::to_string(report)?,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// ── Overview ──

pub struct OverviewRow {
    pub id: String,
    pub section: String,
    pub date: Option<String>,
    pub description: String,
    pub method: String,
    pub pages: usize,
    pub char_count: usize,
}

pub fn fetch_overview(conn: &Connection, section: Option<Section>, limit: usize) -> Result<Vec<OverviewRow>> {
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    let where_clause = match section {
        Some(s) => {
            params.push(Box::new(s.key()));
            " WHERE d.section = ?1"
        }
        None => "",
    };

    let sql = format!(
        "SELECT d.id, d.section, d.date, d.description, d.method,
                (SELECT COUNT(*) FROM document_pages p WHERE p.document_id = d.id),
                d.char_count
         FROM documents d{}
         ORDER BY d.date IS NULL, d.date DESC, d.id
         LIMIT {}",
        where_clause, limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(OverviewRow {
                id: row.get(0)?,
                section: row.get(1)?,
                date: row.get(2)?,
                description: row.get(3)?,
                method: row.get(4)?,
                pages: row.get(5)?,
                char_count: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub documents: usize,
    pub direct_text: usize,
    pub ocr: usize,
    pub failed: usize,
    pub pages: usize,
    pub runs: usize,
    pub per_section: Vec<(String, usize)>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |sql: &str| -> Result<usize> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };

    let mut stmt = conn.prepare("SELECT section, COUNT(*) FROM documents GROUP BY section ORDER BY section")?;
    let per_section = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Stats {
        documents: count("SELECT COUNT(*) FROM documents")?,
        direct_text: count("SELECT COUNT(*) FROM documents WHERE method = 'direct_text'")?,
        ocr: count("SELECT COUNT(*) FROM documents WHERE method = 'ocr'")?,
        failed: count("SELECT COUNT(*) FROM documents WHERE method = 'failed'")?,
        pages: count("SELECT COUNT(*) FROM document_pages")?,
        runs: count("SELECT COUNT(*) FROM runs")?,
        per_section,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn doc(id: &str, section: Section, date: Option<NaiveDate>, method: ExtractionMethod) -> ProcessedDocument {
        ProcessedDocument {
            id: id.to_string(),
            section,
            date,
            raw_date_text: date.map(|d| d.format("%d/%m/%Y").to_string()).unwrap_or_default(),
            description: format!("Description of {}", id),
            attachment_url: format!("https://www.dgft.gov.in/uploads/{}.pdf", id),
            extraction: ExtractionResult {
                source_path: PathBuf::from(format!("/tmp/{}.pdf", id)),
                method,
                text: "--- Page 1 (Text) ---\n\nbody\n\n".into(),
                char_count: 4,
                pages: vec![
                    PageExtraction { page_index: 0, method: ExtractionMethod::DirectText, char_count: 4 },
                    PageExtraction { page_index: 1, method: ExtractionMethod::Ocr, char_count: 0 },
                ],
                failure: None,
                notes: vec!["page 2: OCR failed".into()],
            },
            processed_at: Utc.with_ymd_and_hms(2024, 3, 28, 10, 30, 0).unwrap(),
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn save_and_fetch_document() {
        let conn = memory();
        let original = doc("PN_20240328_amendment", Section::PublicNotice, ymd(2024, 3, 28), ExtractionMethod::Ocr);
        save_documents(&conn, &[original.clone()]).unwrap();

        let loaded = fetch_document(&conn, "PN_20240328_amendment").unwrap().unwrap();
        assert_eq!(loaded, original);
        assert!(fetch_document(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn resave_replaces_pages() {
        let conn = memory();
        let mut d = doc("C_undated", Section::Circular, None, ExtractionMethod::DirectText);
        save_documents(&conn, &[d.clone()]).unwrap();
        d.extraction.pages.truncate(1);
        save_documents(&conn, &[d.clone()]).unwrap();

        let loaded = fetch_document(&conn, "C_undated").unwrap().unwrap();
        assert_eq!(loaded.extraction.pages.len(), 1);
        assert_eq!(loaded.date, None);
    }

    #[test]
    fn processed_ids_skip_failed_documents() {
        let conn = memory();
        save_documents(
            &conn,
            &[
                doc("N_1", Section::Notification, ymd(2024, 1, 1), ExtractionMethod::DirectText),
                doc("N_2", Section::Notification, ymd(2024, 1, 2), ExtractionMethod::Failed),
            ],
        )
        .unwrap();
        let ids = processed_ids(&conn).unwrap();
        assert!(ids.contains("N_1"));
        assert!(!ids.contains("N_2"));
    }

    #[test]
    fn overview_orders_newest_first_undated_last() {
        let conn = memory();
        save_documents(
            &conn,
            &[
                doc("N_old", Section::Notification, ymd(2023, 5, 1), ExtractionMethod::DirectText),
                doc("N_undated", Section::Notification, None, ExtractionMethod::DirectText),
                doc("N_new", Section::Notification, ymd(2024, 2, 1), ExtractionMethod::Ocr),
                doc("C_x", Section::Circular, ymd(2024, 6, 1), ExtractionMethod::Ocr),
            ],
        )
        .unwrap();

        let rows = fetch_overview(&conn, Some(Section::Notification), 10).unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["N_new", "N_old", "N_undated"]);
        assert_eq!(rows[0].pages, 2);

        assert_eq!(fetch_overview(&conn, None, 2).unwrap().len(), 2);
    }

    #[test]
    fn stats_counts() {
        let conn = memory();
        save_documents(
            &conn,
            &[
                doc("N_1", Section::Notification, ymd(2024, 1, 1), ExtractionMethod::DirectText),
                doc("PN_1", Section::PublicNotice, ymd(2024, 1, 1), ExtractionMethod::Ocr),
            ],
        )
        .unwrap();
        let s = get_stats(&conn).unwrap();
        assert_eq!(s.documents, 2);
        assert_eq!((s.direct_text, s.ocr, s.failed), (1, 1, 0));
        assert_eq!(s.pages, 4);
        assert_eq!(s.per_section, vec![("notification".to_string(), 1), ("public-notice".to_string(), 1)]);
    }
}
