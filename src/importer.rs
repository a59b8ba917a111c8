use std::collections::HashSet;
use std::fs;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::card::{CardRecord, SetKey};
use crate::db;
use crate::export::{self, ExportRow};

/// Counts for one import file, or a whole run when summed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub files: usize,
    pub rows: usize,
    pub cards_created: usize,
    pub sets_created: usize,
    pub duplicates: usize,
    pub invalid: usize,
}

impl AddAssign for ImportReport {
    fn add_assign(&mut self, rhs: Self) {
        self.files += rhs.files;
        self.rows += rhs.rows;
        self.cards_created += rhs.cards_created;
        self.sets_created += rhs.sets_created;
        self.duplicates += rhs.duplicates;
        self.invalid += rhs.invalid;
    }
}

impl ImportReport {
    pub fn print(&self) {
        println!(
            "Imported {} cards and {} sets from {} files ({} rows: {} duplicates, {} invalid).",
            self.cards_created, self.sets_created, self.files, self.rows, self.duplicates, self.invalid,
        );
    }
}

/// Import state that lives for a whole run: set groups known to exist and
/// cards already handled, so later files never repeat earlier work.
pub struct Importer<'c> {
    conn: &'c Connection,
    known_sets: HashSet<SetKey>,
    seen_cards: HashSet<(SetKey, String)>,
}

impl<'c> Importer<'c> {
    pub fn new(conn: &'c Connection) -> Result<Self> {
        Ok(Self {
            conn,
            known_sets: db::fetch_set_keys(conn)?,
            seen_cards: HashSet::new(),
        })
    }

    /// Import a single export file or every `.csv`/`.json` file in a directory.
    /// A failing file aborts the run; files already imported stay committed.
    pub fn import_path(&mut self, path: &Path) -> Result<ImportReport> {
        let files = if path.is_dir() {
            export_files(path)?
        } else {
            vec![path.to_path_buf()]
        };

        let mut total = ImportReport::default();
        for file in files {
            total += self.import_file(&file)?;
        }
        Ok(total)
    }

    /// All rows of one file are written in a single transaction.
    pub fn import_file(&mut self, path: &Path) -> Result<ImportReport> {
        let rows = export::read_rows(path)?;
        let mut report = ImportReport {
            files: 1,
            rows: rows.len(),
            ..Default::default()
        };

        let conn = self.conn;
        let tx = conn.unchecked_transaction()?;
        for row in rows {
            self.import_row(&tx, row, &mut report)?;
        }
        tx.commit()
            .with_context(|| format!("Failed to commit import of {:?}", path))?;

        info!(
            file = %path.display(),
            created = report.cards_created,
            sets = report.sets_created,
            duplicates = report.duplicates,
            invalid = report.invalid,
            "imported file"
        );
        Ok(report)
    }

    fn import_row(&mut self, conn: &Connection, row: ExportRow, report: &mut ImportReport) -> Result<()> {
        let Some(card) = row.into_record() else {
            report.invalid += 1;
            return Ok(());
        };
        let set_key = card.set_key();
        if !self.known_sets.contains(&set_key) {
            if db::insert_set(conn, &set_key)? {
                report.sets_created += 1;
            }
            self.known_sets.insert(set_key.clone());
        }

        let catalog_key = (set_key, card.card_number.to_string());
        if self.seen_cards.contains(&catalog_key) || db::card_exists(conn, &card)? {
            debug!(card = %describe(&card), "skipping existing card");
            report.duplicates += 1;
            self.seen_cards.insert(catalog_key);
            return Ok(());
        }

        db::insert_card(conn, &card)?;
        self.seen_cards.insert(catalog_key);
        report.cards_created += 1;
        Ok(())
    }
}

/// Export files in a directory, sorted by name so runs are repeatable.
fn export_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {:?}", dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("csv") || e.eq_ignore_ascii_case("json"))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn describe(card: &CardRecord) -> String {
    format!(
        "{} {} {} #{} {}",
        card.year, card.brand, card.set_name, card.card_number, card.player_name
    )
}

// ── Tests ──
