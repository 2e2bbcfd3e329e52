mod config;
mod dates;
mod db;
mod download;
mod error;
mod fetch;
mod identity;
mod listing;
mod model;
mod pdf;
mod pipeline;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use url::Url;

use crate::config::Settings;
use crate::download::Downloader;
use crate::fetch::{static_http, FetchChain, PageSource, RenderedSource, StaticSource};
use crate::model::Section;
use crate::pdf::{TextExtractionEngine, TextExtractor};
use crate::pipeline::{Pipeline, RunOptions, RunReport, SectionStatus, SectionTarget};

#[derive(Parser)]
#[command(name = "dgft_scraper", about = "DGFT notification / public notice / circular scraper with PDF text + OCR extraction")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch listings, download new attachments, extract text, store results
    Run {
        /// Sections to process (default: all). notification, public-notice, circular
        #[arg(short, long, value_delimiter = ',')]
        section: Vec<Section>,
        /// Newest N entries per section (1 = latest only)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Skip entries dated more than N days ago
        #[arg(long)]
        since_days: Option<u32>,
        /// Reprocess documents already in the database
        #[arg(long)]
        force: bool,
        /// Skip the headless browser and fetch listings over plain HTTP
        #[arg(long)]
        static_only: bool,
        /// Cut the run off after N seconds; documents finished by then are still saved
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Write the run report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show a section's current listing without downloading anything
    List {
        #[arg(short, long, default_value = "notification")]
        section: Section,
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
        #[arg(long)]
        static_only: bool,
    },
    /// Extract text from a local PDF
    Extract {
        path: PathBuf,
        /// Write the extracted text here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Tesseract language(s), e.g. "eng+hin" (default: DGFT_OCR_LANGUAGE)
        #[arg(long)]
        lang: Option<String>,
    },
    /// Print a stored document
    Show {
        id: String,
        /// Print the stored record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Stored documents table
    Overview {
        #[arg(short, long)]
        section: Option<Section>,
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Show database statistics
    Stats,
    /// Check external tools (Poppler, Tesseract, Chromium)
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let result = match cli.command {
        Commands::Run { section, limit, since_days, force, static_only, timeout_secs, output } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;

            let skip_ids = if force { HashSet::new() } else { db::processed_ids(&conn)? };
            let options = RunOptions {
                max_per_section: limit,
                since: since_days.map(|d| dates::cutoff(d, chrono::Local::now().date_naive())),
                skip_ids,
                scratch_root: settings.scratch_root.clone(),
                deadline: timeout_secs.map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs)),
            };
            let targets = targets(&settings, &section);
            let pipeline = build_pipeline(&settings, static_only)?;

            println!(
                "Processing {} section(s), {} document(s) already stored...",
                targets.len(),
                options.skip_ids.len()
            );
            let report = pipeline.run(&targets, &options).await?;

            let docs: Vec<_> = report.documents().cloned().collect();
            db::save_documents(&conn, &docs)?;
            db::save_run(&conn, &report)?;
            print_report(&report);

            if let Some(path) = output {
                let json = serde_json::to_string_pretty(&report)?;
                std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
                println!("Report written to {}", path.display());
            }
            Ok(())
        }
        Commands::List { section, limit, static_only } => {
            let url = settings.section_url(section).to_string();
            let chain = fetch_chain(&settings, static_only)?;
            let page = chain.fetch(&url).await?;
            let base = Url::parse(&page.url).or_else(|_| Url::parse(&url))?;
            let parsed = listing::extract(&page.markup, &base, section);
            if !parsed.table_found {
                bail!("no table found on {} (fetched via {})", page.url, page.strategy);
            }

            println!("{:>3} | {:<11} | {:<34} | {:<60}", "#", "Date", "Id", "Description");
            println!("{}", "-".repeat(118));
            for (i, r) in parsed.records.iter().take(limit).enumerate() {
                let id = identity::identify(r.section, r.date, &r.description);
                println!(
                    "{:>3} | {:<11} | {:<34} | {:<60}",
                    i + 1,
                    dates::format_display(r.date),
                    truncate(&id, 34),
                    truncate(&r.description, 60)
                );
            }
            println!(
                "\n{} entries ({} rows skipped) via {} fetch",
                parsed.records.len(),
                parsed.skipped_rows(),
                page.strategy
            );
            Ok(())
        }
        Commands::Extract { path, output, lang } => {
            if !path.is_file() {
                bail!("{} is not a file", path.display());
            }
            let lang = lang.unwrap_or_else(|| settings.ocr_language.clone());
            let engine = TextExtractionEngine::with_system_tools(&lang);
            let work = tempfile::tempdir()?;
            let work_path = work.path().to_path_buf();
            let pdf = path.clone();
            let result = tokio::task::spawn_blocking(move || engine.extract(&pdf, &work_path)).await?;
            drop(work);

            if let Some(reason) = &result.failure {
                bail!("extraction failed: {}", reason);
            }
            eprintln!(
                "{}: {}, {} pages, {} chars",
                path.display(),
                result.method.as_str(),
                result.pages.len(),
                result.char_count
            );
            for p in &result.pages {
                eprintln!("  page {:>3}: {:<6} {:>6} chars", p.page_index + 1, p.method.label(), p.char_count);
            }
            for note in &result.notes {
                eprintln!("  note: {}", note);
            }

            match output {
                Some(out) => {
                    std::fs::write(&out, &result.text).with_context(|| format!("failed to write {}", out.display()))?;
                    eprintln!("Text written to {}", out.display());
                }
                None => print!("{}", result.text),
            }
            Ok(())
        }
        Commands::Show { id, json } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let Some(doc) = db::fetch_document(&conn, &id)? else {
                bail!("no stored document with id {}", id);
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&doc)?);
                return Ok(());
            }
            println!("Id:          {}", doc.id);
            println!("Section:     {}", doc.section);
            println!("Date:        {} ({})", dates::format_display(doc.date), doc.raw_date_text);
            println!("Description: {}", doc.description);
            println!("Attachment:  {}", doc.attachment_url);
            println!(
                "Extraction:  {} | {} pages | {} chars",
                doc.extraction.method.as_str(),
                doc.extraction.pages.len(),
                doc.extraction.char_count
            );
            println!("Processed:   {}", doc.processed_at.format("%Y-%m-%d %H:%M UTC"));
            println!("\n{}", doc.extraction.text);
            Ok(())
        }
        Commands::Overview { section, limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_overview(&conn, section, limit)?;
            if rows.is_empty() {
                println!("No documents stored. Run 'run' first.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<34} | {:<13} | {:<10} | {:<11} | {:>5} | {:>7} | {:<40}",
                "#", "Id", "Section", "Date", "Method", "Pages", "Chars", "Description"
            );
            println!("{}", "-".repeat(140));
            for (i, r) in rows.iter().enumerate() {
                println!(
                    "{:>3} | {:<34} | {:<13} | {:<10} | {:<11} | {:>5} | {:>7} | {:<40}",
                    i + 1,
                    truncate(&r.id, 34),
                    r.section,
                    r.date.as_deref().unwrap_or("-"),
                    r.method,
                    r.pages,
                    r.char_count,
                    truncate(&r.description, 40)
                );
            }
            println!("\n{} documents | show text: dgft_scraper show <id>", rows.len());
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Documents:   {}", s.documents);
            println!("Direct text: {}", s.direct_text);
            println!("OCR:         {}", s.ocr);
            println!("Failed:      {}", s.failed);
            println!("Pages:       {}", s.pages);
            println!("Runs:        {}", s.runs);
            for (section, n) in &s.per_section {
                println!("  {:<14} {}", section, n);
            }
            Ok(())
        }
        Commands::Check => {
            let poppler = pdf::Poppler::detect();
            let missing = poppler.missing();
            for tool in ["pdfinfo", "pdftotext", "pdftoppm"] {
                println!("{:<10} {}", tool, if missing.contains(&tool) { "MISSING" } else { "ok" });
            }
            let tesseract = pdf::Tesseract::detect(&settings.ocr_language).is_some();
            println!("{:<10} {}", "tesseract", if tesseract { "ok" } else { "MISSING (image PDFs fall back to text layer)" });
            match fetch::rendered::find_chromium() {
                Some(p) => println!("{:<10} ok ({})", "chromium", p.display()),
                None => println!("{:<10} MISSING (listings fetched over plain HTTP only)", "chromium"),
            }
            if !missing.is_empty() {
                bail!("required Poppler tools missing: {}", missing.join(", "));
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn targets(settings: &Settings, sections: &[Section]) -> Vec<SectionTarget> {
    let chosen: &[Section] = if sections.is_empty() { &Section::ALL } else { sections };
    chosen
        .iter()
        .map(|&section| SectionTarget { section, url: settings.section_url(section).to_string() })
        .collect()
}

fn fetch_chain(settings: &Settings, static_only: bool) -> anyhow::Result<FetchChain> {
    let client = static_http::build_client(settings.http_timeout())?;
    let mut sources: Vec<Box<dyn PageSource>> = Vec::new();
    if settings.rendered_fetch && !static_only {
        let rendered = RenderedSource::new(settings.render_timeout(), settings.render_settle());
        if rendered.is_available() {
            sources.push(Box::new(rendered));
        } else {
            warn!("no Chromium found (set CHROME_PATH); listings fetched over plain HTTP only");
        }
    }
    sources.push(Box::new(StaticSource::new(client)));
    let chain = FetchChain::new(sources);
    info!(strategies = ?chain.strategies(), "fetch chain ready");
    Ok(chain)
}

fn build_pipeline(settings: &Settings, static_only: bool) -> anyhow::Result<Pipeline> {
    let client = static_http::build_client(settings.http_timeout())?;
    let engine = TextExtractionEngine::with_system_tools(&settings.ocr_language);
    if !engine.has_ocr() {
        warn!(lang = %settings.ocr_language, "tesseract unavailable; image-based PDFs keep their text layer");
    }
    Ok(Pipeline::new(
        Arc::new(fetch_chain(settings, static_only)?),
        Arc::new(Downloader::new(client)),
        Arc::new(engine),
    ))
}

fn print_report(report: &RunReport) {
    println!(
        "\n{:<14} | {:<11} | {:<8} | {:>6} | {:>7} | {:>8} | {:>4} | {:>4} | {:>8}",
        "Section", "Outcome", "Via", "Listed", "Skipped", "Known", "Dups", "Docs", "Failures"
    );
    println!("{}", "-".repeat(97));
    for s in &report.sections {
        println!(
            "{:<14} | {:<11} | {:<8} | {:>6} | {:>7} | {:>8} | {:>4} | {:>4} | {:>8}",
            s.section.name(),
            s.outcome(),
            s.status.strategy().unwrap_or("-"),
            s.listed,
            s.skipped_rows,
            s.already_processed,
            s.duplicates.len(),
            s.documents.len(),
            s.failures.len()
        );
    }
    println!("(Known = already in the database, Dups = id shared with an earlier row)");

    for s in &report.sections {
        if let SectionStatus::FetchFailed { reason } = &s.status {
            println!("\n{}: {}", s.section.name(), reason);
        }
        for d in &s.duplicates {
            println!("  duplicate id {} for {} (kept {})", d.id, truncate(&d.attachment_url, 60), truncate(&d.kept_url, 60));
        }
        for f in &s.failures {
            println!("  {:?} failed for {} ({}): {}", f.stage, f.id, truncate(&f.attachment_url, 60), f.reason);
        }
    }

    let (reachable, unreachable) = report.section_counts();
    println!(
        "\n{} new documents, {} failures. {} section(s) reachable, {} unreachable.",
        report.document_count(),
        report.failure_count(),
        reachable,
        unreachable
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
