use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::card::{CardRecord, SetKey};

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sets (
            id         INTEGER PRIMARY KEY,
            sport      TEXT NOT NULL,
            year       TEXT NOT NULL,
            brand      TEXT NOT NULL,
            set_name   TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(sport, year, brand, set_name)
        );
        CREATE INDEX IF NOT EXISTS idx_sets_sport_year ON sets(sport, year);

        CREATE TABLE IF NOT EXISTS cards (
            id          INTEGER PRIMARY KEY,
            sport       TEXT NOT NULL,
            year        TEXT NOT NULL,
            brand       TEXT NOT NULL,
            set_name    TEXT NOT NULL,
            card_number TEXT NOT NULL,
            player_name TEXT NOT NULL,
            team        TEXT,
            image_url   TEXT,
            is_rookie   BOOLEAN NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(sport, year, brand, set_name, card_number)
        );
        CREATE INDEX IF NOT EXISTS idx_cards_set ON cards(sport, year, brand, set_name);
        CREATE INDEX IF NOT EXISTS idx_cards_player ON cards(player_name);
        ",
    )?;
    Ok(())
}

// ── Import ──

pub fn fetch_set_keys(conn: &Connection) -> Result<HashSet<SetKey>> {
    let mut stmt = conn.prepare("SELECT sport, year, brand, set_name FROM sets")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(SetKey {
                sport: row.get(0)?,
                year: row.get(1)?,
                brand: row.get(2)?,
                set_name: row.get(3)?,
            })
        })?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(rows)
}

/// Returns false when the set group already existed.
pub fn insert_set(conn: &Connection, key: &SetKey) -> Result<bool> {
    let n = conn.execute(
        "INSERT OR IGNORE INTO sets (sport, year, brand, set_name) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![key.sport, key.year, key.brand, key.set_name],
    )?;
    Ok(n > 0)
}

pub fn card_exists(conn: &Connection, card: &CardRecord) -> Result<bool> {
    let mut stmt = conn.prepare_cached(
        "SELECT EXISTS(
             SELECT 1 FROM cards
             WHERE sport = ?1 AND year = ?2 AND brand = ?3 AND set_name = ?4 AND card_number = ?5
         )",
    )?;
    let exists = stmt.query_row(
        rusqlite::params![
            card.sport,
            card.year,
            card.brand,
            card.set_name,
            card.card_number.to_string(),
        ],
        |r| r.get(0),
    )?;
    Ok(exists)
}

pub fn insert_card(conn: &Connection, card: &CardRecord) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO cards
         (sport, year, brand, set_name, card_number, player_name, team, image_url, is_rookie)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    stmt.execute(rusqlite::params![
        card.sport,
        card.year,
        card.brand,
        card.set_name,
        card.card_number.to_string(),
        card.player_name,
        card.team,
        card.image_url,
        card.is_rookie,
    ])?;
    Ok(())
}

// ── Images ──

pub struct ImageTarget {
    pub id: i64,
    pub year: String,
    pub brand: String,
    pub set_name: String,
    pub card_number: String,
    pub player_name: String,
}

pub fn fetch_image_targets(
    conn: &Connection,
    only_missing: bool,
    limit: Option<usize>,
) -> Result<Vec<ImageTarget>> {
    let sql = format!(
        "SELECT id, year, brand, set_name, card_number, player_name
         FROM cards{}
         ORDER BY id{}",
        if only_missing {
            " WHERE image_url IS NULL OR image_url = ''"
        } else {
            ""
        },
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ImageTarget {
                id: row.get(0)?,
                year: row.get(1)?,
                brand: row.get(2)?,
                set_name: row.get(3)?,
                card_number: row.get(4)?,
                player_name: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_card_image(conn: &Connection, id: i64, image_url: &str) -> Result<()> {
    conn.execute(
        "UPDATE cards SET image_url = ?1 WHERE id = ?2",
        rusqlite::params![image_url, id],
    )?;
    Ok(())
}

// ── Overview ──

pub struct SetOverviewRow {
    pub sport: String,
    pub year: String,
    pub brand: String,
    pub set_name: String,
    pub cards: usize,
    pub with_image: usize,
    pub rookies: usize,
}

pub fn fetch_set_overview(
    conn: &Connection,
    sport: Option<&str>,
    year: Option<&str>,
    limit: usize,
) -> Result<Vec<SetOverviewRow>> {
    let mut conditions = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(s) = sport {
        conditions.push(format!("s.sport = ?{}", params.len() + 1));
        params.push(Box::new(s.to_string()));
    }
    if let Some(y) = year {
        conditions.push(format!("s.year = ?{}", params.len() + 1));
        params.push(Box::new(y.to_string()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT s.sport, s.year, s.brand, s.set_name,
                COUNT(c.id),
                COALESCE(SUM(CASE WHEN c.image_url IS NOT NULL AND c.image_url != '' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN c.is_rookie THEN 1 ELSE 0 END), 0)
         FROM sets s
         LEFT JOIN cards c
           ON c.sport = s.sport AND c.year = s.year AND c.brand = s.brand AND c.set_name = s.set_name{}
         GROUP BY s.id
         ORDER BY s.sport, s.year DESC, s.brand, s.set_name
         LIMIT {}",
        where_clause, limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(SetOverviewRow {
                sport: row.get(0)?,
                year: row.get(1)?,
                brand: row.get(2)?,
                set_name: row.get(3)?,
                cards: row.get(4)?,
                with_image: row.get(5)?,
                rookies: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub sets: usize,
    pub cards: usize,
    pub with_image: usize,
    pub rookies: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let sets: usize = conn.query_row("SELECT COUNT(*) FROM sets", [], |r| r.get(0))?;
    let cards: usize = conn.query_row("SELECT COUNT(*) FROM cards", [], |r| r.get(0))?;
    let with_image: usize = conn.query_row(
        "SELECT COUNT(*) FROM cards WHERE image_url IS NOT NULL AND image_url != ''",
        [],
        |r| r.get(0),
    )?;
    let rookies: usize =
        conn.query_row("SELECT COUNT(*) FROM cards WHERE is_rookie = 1", [], |r| r.get(0))?;
    Ok(Stats {
        sets,
        cards,
        with_image,
        rookies,
    })
}

// ── Tests ──
