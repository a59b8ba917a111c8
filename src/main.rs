mod card;
mod db;
mod dedup;
mod export;
mod importer;
mod marketplace;
mod parser;
mod settings;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use card::CardRecord;
use importer::Importer;
use marketplace::MarketplaceClient;
use settings::Settings;

#[derive(Parser)]
#[command(name = "card_catalog", about = "Sports card catalog builder from checklist pages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the catalog tables
    Init,
    /// Extract cards from saved HTML pages and write the export file
    Scrape {
        /// Directory of saved checklist pages (default: html_dir setting)
        #[arg(long)]
        html_dir: Option<PathBuf>,
        /// Export CSV path (default: output_dir/output_file)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Also write the records as JSON next to the CSV
        #[arg(long)]
        json: bool,
    },
    /// Import an export file or a directory of them into the catalog
    Import {
        /// File or directory (default: output_dir setting)
        path: Option<PathBuf>,
    },
    /// Scrape + import in one pipeline
    Run,
    /// Fill card images from marketplace listings
    Images {
        /// Look up every card, not only those without an image
        #[arg(long)]
        all: bool,
        /// Max cards to look up
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Set groups overview table
    Sets {
        /// Filter by sport (e.g. "Hockey")
        #[arg(short, long)]
        sport: Option<String>,
        /// Filter by year (e.g. "2024-25")
        #[arg(short, long)]
        year: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Show catalog statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
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
        Commands::Init => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            println!("Catalog ready at {}", settings.db_path.display());
            Ok(())
        }
        Commands::Scrape { html_dir, out, json } => {
            let html_dir = html_dir.unwrap_or_else(|| settings.html_dir.clone());
            let out = out.unwrap_or_else(|| settings.export_path());
            scrape(&html_dir, &out, json, &settings.default_sport).map(|_| ())
        }
        Commands::Import { path } => {
            let path = path.unwrap_or_else(|| settings.output_dir.clone());
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let report = Importer::new(&conn)?.import_path(&path)?;
            report.print();
            Ok(())
        }
        Commands::Run => {
            // Phase 1: Extract + export
            let t_scrape = Instant::now();
            let out = settings.export_path();
            let written = scrape(&settings.html_dir, &out, false, &settings.default_sport)?;
            println!(
                "Exported {} cards in {:.1}s",
                written,
                t_scrape.elapsed().as_secs_f64()
            );

            // Phase 2: Import
            let t_import = Instant::now();
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let report = Importer::new(&conn)?.import_path(&out)?;
            println!("Imported in {:.1}s", t_import.elapsed().as_secs_f64());
            report.print();
            Ok(())
        }
        Commands::Images { all, limit } => {
            let client = MarketplaceClient::from_settings(&settings)?;
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let report = marketplace::backfill_images(
                &conn,
                &client,
                !all,
                limit,
                Duration::from_millis(settings.lookup_pause_ms),
            )
            .await?;
            if report.checked == 0 {
                println!("No cards need an image.");
            } else {
                report.print();
            }
            Ok(())
        }
        Commands::Sets { sport, year, limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_set_overview(&conn, sport.as_deref(), year.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No sets found.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<8} | {:<7} | {:<18} | {:<28} | {:>5} | {:>6} | {:>4}",
                "#", "Sport", "Year", "Brand", "Set", "Cards", "Images", "RC"
            );
            println!("{}", "-".repeat(100));

            for (i, r) in rows.iter().enumerate() {
                println!(
                    "{:>3} | {:<8} | {:<7} | {:<18} | {:<28} | {:>5} | {:>6} | {:>4}",
                    i + 1,
                    truncate(&r.sport, 8),
                    truncate(&r.year, 7),
                    truncate(&r.brand, 18),
                    truncate(&r.set_name, 28),
                    r.cards,
                    r.with_image,
                    r.rookies
                );
            }

            println!("\n{} sets", rows.len());
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Sets:        {}", s.sets);
            println!("Cards:       {}", s.cards);
            println!("With image:  {}", s.with_image);
            println!("Rookies:     {}", s.rookies);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Extract every page in `html_dir`, dedup per page and globally, and write
/// the export. Returns the number of records written.
fn scrape(html_dir: &Path, out: &Path, json: bool, default_sport: &str) -> anyhow::Result<usize> {
    use indicatif::{ProgressBar, ProgressStyle};

    let pages = html_files(html_dir)?;
    if pages.is_empty() {
        warn!("No .html files in {}", html_dir.display());
    }
    println!("Extracting {} pages from {}...", pages.len(), html_dir.display());

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut pooled: Vec<CardRecord> = Vec::new();
    for path in &pages {
        let html = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let page = parser::extract_page(&html, default_sport);
        let counts = page.counts;
        let deduped = dedup::dedupe_file(page.cards);

        info!(
            file = %path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
            set = %page.meta.set_name,
            raw = counts.raw(),
            panel = counts.panel,
            gallery = counts.gallery,
            skipped = counts.skipped,
            unique = deduped.records.len(),
            merged = deduped.merged,
            "extracted page"
        );
        pooled.extend(deduped.records);
        pb.inc(1);
    }
    pb.finish_and_clear();

    let global = dedup::dedupe_global(pooled);
    println!(
        "Pooled {} records: {} unique, {} merged.",
        global.input,
        global.records.len(),
        global.merged
    );

    export::write_csv(out, &global.records)?;
    println!("Wrote {}", out.display());
    if json {
        let json_path = out.with_extension("json");
        export::write_json(&json_path, &global.records)?;
        println!("Wrote {}", json_path.display());
    }
    Ok(global.records.len())
}

/// Saved pages in a directory, sorted by name.
fn html_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {:?}", dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("html"))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
