use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{info, warn};
use url::Url;

use crate::download::AttachmentSource;
use crate::fetch::PageSource;
use crate::identity;
use crate::listing;
use crate::model::{ListingRecord, ProcessedDocument, Section};
use crate::pdf::TextExtractor;

#[derive(Debug, Clone)]
pub struct SectionTarget {
    pub section: Section,
    pub url: String,
}

/// Record selection policy for one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Keep only the newest N records of each section.
    pub max_per_section: Option<usize>,
    /// Drop records dated before this day. Undated records are kept.
    pub since: Option<NaiveDate>,
    /// Ids already processed in an earlier run.
    pub skip_ids: HashSet<String>,
    /// Parent for the per-run scratch directory (system temp if unset).
    pub scratch_root: Option<PathBuf>,
    /// Work still pending at this point is reported as timed out; what
    /// finished before it is kept.
    pub deadline: Option<Instant>,
}

// ── Report ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SectionStatus {
    Fetched { strategy: String },
    NoTable { strategy: String },
    FetchFailed { reason: String },
    /// The run deadline passed first. `strategy` is set when the listing
    /// had already been fetched.
    TimedOut { strategy: Option<String> },
}

impl SectionStatus {
    pub fn strategy(&self) -> Option<&str> {
        match self {
            SectionStatus::Fetched { strategy } | SectionStatus::NoTable { strategy } => Some(strategy),
            SectionStatus::TimedOut { strategy } => strategy.as_deref(),
            SectionStatus::FetchFailed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Download,
    Extraction,
    /// Never started because the run deadline passed.
    Deadline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub id: String,
    pub description: String,
    pub attachment_url: String,
    pub stage: Stage,
    pub reason: String,
}

/// A listing row whose id matched an earlier row of the same listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateRecord {
    pub id: String,
    pub description: String,
    pub attachment_url: String,
    /// Attachment of the row that kept the id.
    pub kept_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionReport {
    pub section: Section,
    pub url: String,
    pub status: SectionStatus,
    /// Records surfaced by the listing table.
    pub listed: usize,
    pub skipped_rows: usize,
    /// Dropped by `since` / `max_per_section`.
    pub filtered_out: usize,
    pub already_processed: usize,
    pub duplicates: Vec<DuplicateRecord>,
    pub documents: Vec<ProcessedDocument>,
    pub failures: Vec<DocumentFailure>,
}

impl SectionReport {
    fn new(target: &SectionTarget, status: SectionStatus) -> Self {
        Self {
            section: target.section,
            url: target.url.clone(),
            status,
            listed: 0,
            skipped_rows: 0,
            filtered_out: 0,
            already_processed: 0,
            duplicates: Vec::new(),
            documents: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// One-word summary separating "unreachable", "nothing listed" and
    /// "listed but unreadable".
    pub fn outcome(&self) -> &'static str {
        match &self.status {
            SectionStatus::FetchFailed { .. } => "unreachable",
            SectionStatus::NoTable { .. } => "no-table",
            SectionStatus::TimedOut { .. } => "timed-out",
            SectionStatus::Fetched { .. } => {
                let extraction_failures = self.failures.iter().filter(|f| f.stage == Stage::Extraction).count();
                match (self.documents.len(), self.failures.len()) {
                    (0, 0) if self.listed == 0 => "empty",
                    (0, 0) => "up-to-date",
                    (0, n) if n == extraction_failures => "unreadable",
                    (0, _) => "failed",
                    (_, 0) => "ok",
                    _ => "partial",
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sections: Vec<SectionReport>,
}

impl RunReport {
    /// (reachable, unreachable). A section cut off before its listing was
    /// fetched counts as unreachable.
    pub fn section_counts(&self) -> (usize, usize) {
        let failed = self
            .sections
            .iter()
            .filter(|s| {
                matches!(
                    s.status,
                    SectionStatus::FetchFailed { .. } | SectionStatus::TimedOut { strategy: None }
                )
            })
            .count();
        (self.sections.len() - failed, failed)
    }

    pub fn documents(&self) -> impl Iterator<Item = &ProcessedDocument> {
        self.sections.iter().flat_map(|s| &s.documents)
    }

    pub fn document_count(&self) -> usize {
        self.sections.iter().map(|s| s.documents.len()).sum()
    }

    pub fn failure_count(&self) -> usize {
        self.sections.iter().map(|s| s.failures.len()).sum()
    }
}

// ── Pipeline ──

pub struct Pipeline {
    fetcher: Arc<dyn PageSource>,
    downloader: Arc<dyn AttachmentSource>,
    extractor: Arc<dyn TextExtractor>,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn PageSource>,
        downloader: Arc<dyn AttachmentSource>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        Self { fetcher, downloader, extractor }
    }

    /// Process every target in order. Per-section and per-document failures
    /// land in the report; only a scratch directory failure aborts the run.
    pub async fn run(&self, targets: &[SectionTarget], options: &RunOptions) -> Result<RunReport> {
        let started_at = Utc::now();
        let scratch = scratch_dir(options.scratch_root.as_deref())?;
        info!(scratch = %scratch.path().display(), sections = targets.len(), "run started");

        let mut sections = Vec::with_capacity(targets.len());
        for target in targets {
            if options.deadline.is_some_and(|at| Instant::now() >= at) {
                warn!(section = %target.section, "run deadline reached; section not started");
                sections.push(SectionReport::new(target, SectionStatus::TimedOut { strategy: None }));
                continue;
            }
            let report = self.run_section(target, options, scratch.path()).await;
            info!(
                section = %target.section,
                outcome = report.outcome(),
                documents = report.documents.len(),
                failures = report.failures.len(),
                "section finished"
            );
            sections.push(report);
        }

        // TempDir removes everything on drop; close() surfaces the error instead.
        if let Err(e) = scratch.close() {
            warn!(error = %e, "failed to remove scratch directory");
        }

        Ok(RunReport { started_at, finished_at: Utc::now(), sections })
    }

    async fn run_section(&self, target: &SectionTarget, options: &RunOptions, scratch: &Path) -> SectionReport {
        let page = match within(options.deadline, self.fetcher.fetch(&target.url)).await {
            None => {
                warn!(section = %target.section, url = %target.url, "run deadline reached while fetching");
                return SectionReport::new(target, SectionStatus::TimedOut { strategy: None });
            }
            Some(Ok(p)) => p,
            Some(Err(e)) => {
                warn!(section = %target.section, url = %target.url, error = %e, "section unreachable");
                return SectionReport::new(target, SectionStatus::FetchFailed { reason: e.to_string() });
            }
        };

        let base = match Url::parse(&page.url).or_else(|_| Url::parse(&target.url)) {
            Ok(u) => u,
            Err(e) => {
                return SectionReport::new(target, SectionStatus::FetchFailed { reason: format!("invalid URL: {}", e) })
            }
        };

        let parsed = listing::extract(&page.markup, &base, target.section);
        let strategy = page.strategy.to_string();
        let mut report = if parsed.table_found {
            SectionReport::new(target, SectionStatus::Fetched { strategy })
        } else {
            SectionReport::new(target, SectionStatus::NoTable { strategy })
        };
        report.listed = parsed.records.len();
        report.skipped_rows = parsed.skipped_rows();

        let selected = select(parsed.records, options);
        report.filtered_out = report.listed - selected.len();

        // id -> attachment of the first row carrying it
        let mut seen: HashMap<String, String> = HashMap::new();
        let mut queue = Vec::new();
        for record in selected {
            let id = identity::identify(record.section, record.date, &record.description);
            if options.skip_ids.contains(&id) {
                report.already_processed += 1;
            } else if let Some(kept_url) = seen.get(&id) {
                warn!(id = %id, url = %record.attachment_url, kept = %kept_url, "duplicate document id in listing");
                report.duplicates.push(DuplicateRecord {
                    id,
                    description: record.description,
                    attachment_url: record.attachment_url,
                    kept_url: kept_url.clone(),
                });
            } else {
                seen.insert(id.clone(), record.attachment_url.clone());
                queue.push((id, record));
            }
        }

        if queue.is_empty() {
            return report;
        }

        let pb = ProgressBar::new(queue.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len}") {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(target.section.name());

        let mut pending = queue.into_iter();
        while let Some((id, record)) = pending.next() {
            let Some(outcome) = within(options.deadline, self.process_record(&id, &record, scratch)).await else {
                let unfinished: Vec<_> = std::iter::once((id, record)).chain(pending).collect();
                warn!(section = %target.section, unfinished = unfinished.len(), "run deadline reached mid-section");
                for (id, record) in unfinished {
                    report.failures.push(DocumentFailure {
                        id,
                        description: record.description,
                        attachment_url: record.attachment_url,
                        stage: Stage::Deadline,
                        reason: "run deadline reached before processing finished".into(),
                    });
                }
                report.status = SectionStatus::TimedOut { strategy: Some(page.strategy.to_string()) };
                break;
            };
            match outcome {
                Ok(doc) => report.documents.push(doc),
                Err((stage, reason)) => {
                    warn!(id = %id, ?stage, reason = %reason, "document skipped");
                    report.failures.push(DocumentFailure {
                        id,
                        description: record.description,
                        attachment_url: record.attachment_url,
                        stage,
                        reason,
                    });
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
        report
    }

    async fn process_record(
        &self,
        id: &str,
        record: &ListingRecord,
        scratch: &Path,
    ) -> std::result::Result<ProcessedDocument, (Stage, String)> {
        let work_dir = scratch.join(id);
        let hint = format!("{}.pdf", id);
        let pdf = self
            .downloader
            .download(&record.attachment_url, &work_dir, Some(&hint))
            .await
            .map_err(|e| (Stage::Download, e.to_string()))?;

        let extractor = Arc::clone(&self.extractor);
        let pages_dir = work_dir.join("pages");
        let extraction = tokio::task::spawn_blocking(move || extractor.extract(&pdf, &pages_dir))
            .await
            .map_err(|e| (Stage::Extraction, format!("extraction task failed: {}", e)))?;

        if extraction.is_failed() {
            let reason = extraction.failure.unwrap_or_else(|| "extraction failed".to_string());
            return Err((Stage::Extraction, reason));
        }

        Ok(ProcessedDocument {
            id: id.to_string(),
            section: record.section,
            date: record.date,
            raw_date_text: record.raw_date_text.clone(),
            description: record.description.clone(),
            attachment_url: record.attachment_url.clone(),
            extraction,
            processed_at: Utc::now(),
        })
    }
}

/// Apply `since` then `max_per_section`. Records arrive newest first.
fn select(records: Vec<ListingRecord>, options: &RunOptions) -> Vec<ListingRecord> {
    let recent = records
        .into_iter()
        .filter(|r| match (options.since, r.date) {
            (Some(since), Some(d)) => d >= since,
            _ => true,
        });
    match options.max_per_section {
        Some(n) => recent.take(n).collect(),
        None => recent.collect(),
    }
}

/// Await `fut`, giving up at `deadline`.
async fn within<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(at) => tokio::time::timeout_at(at, fut).await.ok(),
        None => Some(fut.await),
    }
}

fn scratch_dir(root: Option<&Path>) -> Result<tempfile::TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("dgft-run-");
    let dir = match root {
        Some(root) => {
            std::fs::create_dir_all(root)
                .with_context(|| format!("failed to create scratch root {}", root.display()))?;
            builder.tempdir_in(root)
        }
        None => builder.tempdir(),
    };
    dir.context("failed to create scratch directory")
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DownloadError, FetchError};
    use crate::fetch::FetchedPage;
    use crate::model::{ExtractionMethod, ExtractionResult};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const SECTION_URLS: [&str; 3] = [
        "https://portal.test/CP/?opt=notification",
        "https://portal.test/CP/?opt=public-notice",
        "https://portal.test/CP/?opt=circular",
    ];

    fn listing_html(rows: &[(&str, &str, &str)]) -> String {
        let body: String = rows
            .iter()
            .enumerate()
            .map(|(i, (date, desc, href))| {
                format!(
                    "<tr><td>{}</td><td>{}/2024</td><td>{}</td><td>{}</td><td><a href=\"{}\">PDF</a></td></tr>",
                    i + 1,
                    i + 1,
                    date,
                    desc,
                    href
                )
            })
            .collect();
        format!(
            "<html><body><table><tr><th>S.No</th><th>Number</th><th>Date</th><th>Subject</th><th>Attachment</th></tr>{}</table></body></html>",
            body
        )
    }

    struct MapFetcher(HashMap<String, String>);

    #[async_trait]
    impl PageSource for MapFetcher {
        fn name(&self) -> &'static str {
            "map"
        }

        async fn fetch(&self, url: &str) -> std::result::Result<FetchedPage, FetchError> {
            match self.0.get(url) {
                Some(markup) => Ok(FetchedPage { url: url.to_string(), markup: markup.clone(), strategy: "map" }),
                None => Err(FetchError::Exhausted(vec![crate::error::StrategyFailure {
                    strategy: "map",
                    reason: "connection refused".into(),
                }])),
            }
        }
    }

    /// Never answers for `hang_on`; everything else as `MapFetcher`.
    struct HangingFetcher {
        inner: MapFetcher,
        hang_on: &'static str,
    }

    #[async_trait]
    impl PageSource for HangingFetcher {
        fn name(&self) -> &'static str {
            "hanging"
        }

        async fn fetch(&self, url: &str) -> std::result::Result<FetchedPage, FetchError> {
            if url == self.hang_on {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            }
            self.inner.fetch(url).await
        }
    }

    /// Writes the URL's file name into `dest_dir`; "missing" URLs 404 and
    /// "slow" URLs stall.
    struct FakeDownloads;

    #[async_trait]
    impl AttachmentSource for FakeDownloads {
        async fn download(&self, url: &str, dest_dir: &Path, _hint: Option<&str>) -> std::result::Result<PathBuf, DownloadError> {
            if url.contains("slow") {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            }
            if url.contains("missing") {
                return Err(DownloadError::HttpStatus { status: 404, url: url.to_string() });
            }
            std::fs::create_dir_all(dest_dir)?;
            let name = url.rsplit('/').next().unwrap_or("x.pdf");
            let path = dest_dir.join(name);
            std::fs::write(&path, b"%PDF-1.4")?;
            Ok(path)
        }
    }

    /// "scan" files are unreadable; records every path it saw.
    #[derive(Default)]
    struct FakeExtractor {
        seen: Mutex<Vec<(PathBuf, bool)>>,
    }

    impl TextExtractor for FakeExtractor {
        fn extract(&self, pdf: &Path, _work_dir: &Path) -> ExtractionResult {
            self.seen.lock().unwrap().push((pdf.to_path_buf(), pdf.exists()));
            if pdf.to_string_lossy().contains("scan") {
                return ExtractionResult::failed(pdf.to_path_buf(), "unreadable PDF: corrupt xref");
            }
            ExtractionResult {
                source_path: pdf.to_path_buf(),
                method: ExtractionMethod::DirectText,
                text: "--- Page 1 (Text) ---\n\nbody\n\n".into(),
                char_count: 4,
                pages: Vec::new(),
                failure: None,
                notes: Vec::new(),
            }
        }
    }

    fn targets() -> Vec<SectionTarget> {
        Section::ALL
            .iter()
            .zip(SECTION_URLS)
            .map(|(s, u)| SectionTarget { section: *s, url: u.to_string() })
            .collect()
    }

    fn pipeline(pages: Vec<(&str, String)>) -> (Pipeline, Arc<FakeExtractor>) {
        let map = pages.into_iter().map(|(u, m)| (u.to_string(), m)).collect();
        let extractor = Arc::new(FakeExtractor::default());
        let p = Pipeline::new(Arc::new(MapFetcher(map)), Arc::new(FakeDownloads), extractor.clone());
        (p, extractor)
    }

    fn options(root: &Path) -> RunOptions {
        RunOptions { scratch_root: Some(root.to_path_buf()), ..Default::default() }
    }

    #[tokio::test]
    async fn unreachable_section_does_not_stop_the_run() {
        let (p, _) = pipeline(vec![
            (SECTION_URLS[0], listing_html(&[("28/03/2024", "Import policy of peas", "/u/n71.pdf")])),
            (SECTION_URLS[2], listing_html(&[("01/02/2024", "Circular on RoDTEP", "/u/c7.pdf")])),
        ]);
        let root = tempfile::tempdir().unwrap();
        let report = p.run(&targets(), &options(root.path())).await.unwrap();

        assert_eq!(report.sections.len(), 3);
        assert_eq!(report.sections[0].documents.len(), 1);
        assert!(matches!(report.sections[1].status, SectionStatus::FetchFailed { .. }));
        assert_eq!(report.sections[1].outcome(), "unreachable");
        assert_eq!(report.sections[2].documents.len(), 1);
        assert_eq!(report.section_counts(), (2, 1));

        let ids: Vec<_> = report.documents().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["N_20240328_import_policy_of", "C_20240201_circular_on_rodtep"]);
        assert_eq!(report.sections[0].documents[0].attachment_url, "https://portal.test/u/n71.pdf");
    }

    #[tokio::test]
    async fn document_failures_are_recorded_and_skipped() {
        let (p, _) = pipeline(vec![(
            SECTION_URLS[0],
            listing_html(&[
                ("28/03/2024", "Good one", "/u/good.pdf"),
                ("27/03/2024", "Gone", "/u/missing.pdf"),
                ("26/03/2024", "Scanned", "/u/scan.pdf"),
            ]),
        )]);
        let root = tempfile::tempdir().unwrap();
        let report = p.run(&targets()[..1], &options(root.path())).await.unwrap();
        let s = &report.sections[0];

        assert_eq!(s.documents.len(), 1);
        let stages: Vec<_> = s.failures.iter().map(|f| f.stage).collect();
        assert_eq!(stages, vec![Stage::Download, Stage::Extraction]);
        assert!(s.failures[1].reason.contains("corrupt xref"));
        assert_eq!(s.outcome(), "partial");
    }

    #[tokio::test]
    async fn only_unreadable_documents() {
        let (p, _) = pipeline(vec![(SECTION_URLS[0], listing_html(&[("26/03/2024", "Scanned", "/u/scan.pdf")]))]);
        let root = tempfile::tempdir().unwrap();
        let report = p.run(&targets()[..1], &options(root.path())).await.unwrap();
        assert_eq!(report.sections[0].outcome(), "unreadable");
    }

    #[tokio::test]
    async fn selection_policy() {
        let html = listing_html(&[
            ("01/01/2024", "Oldest entry", "/u/a.pdf"),
            ("01/03/2024", "Newest entry", "/u/c.pdf"),
            ("01/02/2024", "Middle entry", "/u/b.pdf"),
            ("soon", "Undated entry", "/u/d.pdf"),
        ]);
        let root = tempfile::tempdir().unwrap();

        let (p, _) = pipeline(vec![(SECTION_URLS[0], html.clone())]);
        let opts = RunOptions { max_per_section: Some(1), ..options(root.path()) };
        let report = p.run(&targets()[..1], &opts).await.unwrap();
        assert_eq!(report.sections[0].documents[0].description, "Newest entry");
        assert_eq!(report.sections[0].filtered_out, 3);

        let (p, _) = pipeline(vec![(SECTION_URLS[0], html.clone())]);
        let opts = RunOptions { since: NaiveDate::from_ymd_opt(2024, 2, 1), ..options(root.path()) };
        let report = p.run(&targets()[..1], &opts).await.unwrap();
        let descs: Vec<_> = report.documents().map(|d| d.description.as_str()).collect();
        assert_eq!(descs, vec!["Newest entry", "Middle entry", "Undated entry"]);

        let (p, extractor) = pipeline(vec![(SECTION_URLS[0], html)]);
        let mut opts = options(root.path());
        opts.skip_ids.insert("N_20240301_newest_entry".into());
        let report = p.run(&targets()[..1], &opts).await.unwrap();
        assert_eq!(report.sections[0].already_processed, 1);
        assert_eq!(report.document_count(), 3);
        assert_eq!(extractor.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn duplicate_ids_processed_once() {
        let (p, _) = pipeline(vec![(
            SECTION_URLS[2],
            listing_html(&[
                ("01/03/2024", "Trade Notice No. 1", "/u/a.pdf"),
                ("01/03/2024", "Trade Notice No. 2", "/u/b.pdf"),
            ]),
        )]);
        let root = tempfile::tempdir().unwrap();
        let report = p.run(&targets()[2..], &options(root.path())).await.unwrap();
        assert_eq!(report.document_count(), 1);
        assert_eq!(
            report.sections[0].duplicates,
            vec![DuplicateRecord {
                id: "C_20240301_trade_notice_no".into(),
                description: "Trade Notice No. 2".into(),
                attachment_url: "https://portal.test/u/b.pdf".into(),
                kept_url: "https://portal.test/u/a.pdf".into(),
            }]
        );
    }

    fn deadline_in(ms: u64) -> Option<Instant> {
        Some(Instant::now() + std::time::Duration::from_millis(ms))
    }

    #[tokio::test]
    async fn deadline_keeps_finished_sections() {
        let map = MapFetcher(
            [
                (SECTION_URLS[0], listing_html(&[("28/03/2024", "Import policy of peas", "/u/n71.pdf")])),
                (SECTION_URLS[1], listing_html(&[("27/03/2024", "Amendment in para 2.5", "/u/pn12.pdf")])),
                (SECTION_URLS[2], listing_html(&[("01/02/2024", "Circular on RoDTEP", "/u/c7.pdf")])),
            ]
            .into_iter()
            .map(|(u, m)| (u.to_string(), m))
            .collect(),
        );
        let fetcher = HangingFetcher { inner: map, hang_on: SECTION_URLS[2] };
        let p = Pipeline::new(Arc::new(fetcher), Arc::new(FakeDownloads), Arc::new(FakeExtractor::default()));
        let root = tempfile::tempdir().unwrap();
        let opts = RunOptions { deadline: deadline_in(500), ..options(root.path()) };

        let report = p.run(&targets(), &opts).await.unwrap();

        assert_eq!(report.sections[0].documents.len(), 1);
        assert_eq!(report.sections[1].documents.len(), 1);
        assert_eq!(report.sections[2].status, SectionStatus::TimedOut { strategy: None });
        assert_eq!(report.sections[2].outcome(), "timed-out");
        assert_eq!(report.document_count(), 2);
        assert_eq!(report.section_counts(), (2, 1));
    }

    #[tokio::test]
    async fn deadline_mid_section_reports_unfinished_documents() {
        let (p, _) = pipeline(vec![(
            SECTION_URLS[0],
            listing_html(&[
                ("28/03/2024", "Fast one", "/u/fast.pdf"),
                ("27/03/2024", "Stalled one", "/u/slow.pdf"),
                ("26/03/2024", "Never reached", "/u/later.pdf"),
            ]),
        )]);
        let root = tempfile::tempdir().unwrap();
        let opts = RunOptions { deadline: deadline_in(500), ..options(root.path()) };

        let report = p.run(&targets()[..1], &opts).await.unwrap();
        let s = &report.sections[0];

        assert_eq!(s.documents.len(), 1);
        assert_eq!(s.documents[0].description, "Fast one");
        assert_eq!(s.status, SectionStatus::TimedOut { strategy: Some("map".into()) });
        let unfinished: Vec<_> = s.failures.iter().map(|f| (f.stage, f.description.as_str())).collect();
        assert_eq!(unfinished, vec![(Stage::Deadline, "Stalled one"), (Stage::Deadline, "Never reached")]);
        assert_eq!(report.section_counts(), (1, 0));
    }

    #[tokio::test]
    async fn expired_deadline_starts_nothing() {
        let (p, extractor) = pipeline(vec![(SECTION_URLS[0], listing_html(&[("28/03/2024", "Peas", "/u/n71.pdf")]))]);
        let root = tempfile::tempdir().unwrap();
        let opts = RunOptions { deadline: Some(Instant::now()), ..options(root.path()) };

        let report = p.run(&targets(), &opts).await.unwrap();

        assert!(report.sections.iter().all(|s| s.status == SectionStatus::TimedOut { strategy: None }));
        assert!(extractor.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn scratch_directory_is_removed() {
        let (p, extractor) = pipeline(vec![(SECTION_URLS[0], listing_html(&[("28/03/2024", "Peas", "/u/n71.pdf")]))]);
        let root = tempfile::tempdir().unwrap();
        p.run(&targets()[..1], &options(root.path())).await.unwrap();

        let seen = extractor.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (pdf, existed) = &seen[0];
        assert!(*existed);
        assert!(pdf.starts_with(root.path()));
        assert!(!pdf.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn page_without_table() {
        let (p, _) = pipeline(vec![(SECTION_URLS[1], "<html><body>Under maintenance</body></html>".into())]);
        let root = tempfile::tempdir().unwrap();
        let report = p.run(&targets()[1..2], &options(root.path())).await.unwrap();
        assert_eq!(report.sections[0].status, SectionStatus::NoTable { strategy: "map".into() });
        assert_eq!(report.sections[0].outcome(), "no-table");
    }
}
