use std::fmt;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

use crate::card::{CardNumber, CardRecord};
use crate::parser::names::{normalize, strip_promotional_suffix};

/// Columns of the handoff file, in order.
pub const COLUMNS: [&str; 9] = [
    "sport",
    "year",
    "brand",
    "set_name",
    "card_number",
    "player_name",
    "team",
    "image_url",
    "is_rookie",
];

pub fn write_csv(path: &Path, cards: &[CardRecord]) -> Result<()> {
    ensure_parent(path)?;
    let mut wtr =
        csv::Writer::from_path(path).with_context(|| format!("Failed to create {:?}", path))?;
    for card in cards {
        wtr.serialize(card)?;
    }
    if cards.is_empty() {
        wtr.write_record(COLUMNS)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json(path: &Path, cards: &[CardRecord]) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(cards)?;
    fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    Ok(())
}

/// One row of an export file as read back. Every cell is optional here so
/// the importer can decide what is missing; numbers and strings are both
/// accepted for text columns (JSON seeds carry `"year": 2023`).
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ExportRow {
    #[serde(default, deserialize_with = "lenient_text")]
    pub sport: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub year: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub brand: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub set_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub card_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub player_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub team: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_rookie: bool,
}

impl ExportRow {
    /// `None` when a field the catalog cannot do without is blank. Player
    /// names get the same cleanup as scraped ones.
    pub fn into_record(self) -> Option<CardRecord> {
        let card_number = self.card_number?;
        let player_name = normalize(&strip_promotional_suffix(&self.player_name?));
        if player_name.is_empty() {
            return None;
        }
        let set_name = self.set_name?;
        Some(CardRecord {
            sport: self.sport.unwrap_or_default(),
            year: self.year.unwrap_or_default(),
            brand: self.brand.unwrap_or_default(),
            set_name,
            card_number: CardNumber::parse(&card_number),
            player_name,
            team: self.team,
            image_url: self.image_url,
            is_rookie: self.is_rookie,
        })
    }
}

/// Read an export file. `.json` is parsed as an array of rows (numbers
/// accepted for text columns), anything else as CSV with a header line.
pub fn read_rows(path: &Path) -> Result<Vec<ExportRow>> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let rows = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Invalid JSON in {:?}", path))?;
        return Ok(rows);
    }

    let mut rdr =
        csv::Reader::from_path(path).with_context(|| format!("Failed to open {:?}", path))?;
    let rows = rdr
        .deserialize::<CsvRow>()
        .map(|row| row.map(ExportRow::from))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Malformed CSV in {:?}", path))?;
    Ok(rows)
}

/// CSV cells read verbatim as text. Letting the csv crate infer types would
/// turn "1e3" into a number and "Infinity" into "inf".
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CsvRow {
    sport: Option<String>,
    year: Option<String>,
    brand: Option<String>,
    set_name: Option<String>,
    card_number: Option<String>,
    player_name: Option<String>,
    team: Option<String>,
    image_url: Option<String>,
    is_rookie: Option<String>,
}

impl From<CsvRow> for ExportRow {
    fn from(row: CsvRow) -> Self {
        ExportRow {
            sport: text_cell(row.sport.as_deref()),
            year: text_cell(row.year.as_deref()),
            brand: text_cell(row.brand.as_deref()),
            set_name: text_cell(row.set_name.as_deref()),
            card_number: text_cell(row.card_number.as_deref()),
            player_name: text_cell(row.player_name.as_deref()),
            team: text_cell(row.team.as_deref()),
            image_url: text_cell(row.image_url.as_deref()),
            is_rookie: row.is_rookie.as_deref().is_some_and(flag_text),
        }
    }
}

// ── Lenient cell decoding ──

fn text_cell(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

fn flag_text(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "true" | "t" | "1" | "yes" | "y"
    )
}

struct TextVisitor;

impl<'de> Visitor<'de> for TextVisitor {
    type Value = Option<String>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a string, number or empty cell")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(text_cell(Some(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
        d.deserialize_any(TextVisitor)
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    d.deserialize_any(TextVisitor)
}

struct FlagVisitor;

impl<'de> Visitor<'de> for FlagVisitor {
    type Value = bool;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a boolean flag")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
        Ok(v)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
        Ok(flag_text(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
        Ok(v != 0)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<bool, E> {
        Ok(v != 0)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<bool, E> {
        Ok(v != 0.0)
    }

    fn visit_unit<E: de::Error>(self) -> Result<bool, E> {
        Ok(false)
    }

    fn visit_none<E: de::Error>(self) -> Result<bool, E> {
        Ok(false)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<bool, D::Error> {
        d.deserialize_any(FlagVisitor)
    }
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    d.deserialize_any(FlagVisitor)
}

// ── Tests ──
