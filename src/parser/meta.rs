use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::names::collapse_whitespace;

static SEASON_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}-\d{2}").unwrap());
static PLAIN_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());
static CATALOG_WORDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(Cards?|Card|Hockey|Baseball|Checklist|Checklists|Trading Card Checklists and Product Information)\b",
    )
    .unwrap()
});

static SPORT_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(r#"input[name="sport"]"#).unwrap());
static CRUMB_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"ol.breadcrumb span[itemprop="name"]"#).unwrap());

/// Page-level metadata shared by every card on a page.
/// Fields that could not be determined are `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMeta {
    pub sport: String,
    pub year: String,
    pub brand: String,
    pub set_name: String,
}

pub fn extract(doc: &Html, default_sport: &str) -> PageMeta {
    let sport = doc
        .select(&SPORT_SEL)
        .find_map(|input| input.value().attr("value"))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default_sport)
        .to_string();

    // e.g. ["Hockey Checklists", "2024-25 Checklists", "2024-25 O-Pee-Chee", "Base Hockey Cards"]
    let crumbs: Vec<String> = doc
        .select(&CRUMB_SEL)
        .map(|span| span.text().map(str::trim).collect::<String>())
        .collect();

    from_breadcrumbs(sport, &crumbs)
}

pub fn from_breadcrumbs(sport: String, crumbs: &[String]) -> PageMeta {
    let year = find_year(crumbs).unwrap_or_default();
    let brand = if year.is_empty() {
        String::new()
    } else {
        find_brand(crumbs, &year).unwrap_or_default()
    };
    let set_name = crumbs.last().map(|raw| clean_set_name(raw)).unwrap_or_default();

    PageMeta {
        sport,
        year,
        brand,
        set_name,
    }
}

/// Season span ("2024-25") wins over a plain year anywhere in the trail.
fn find_year(crumbs: &[String]) -> Option<String> {
    crumbs
        .iter()
        .find_map(|t| SEASON_RE.find(t))
        .or_else(|| crumbs.iter().find_map(|t| PLAIN_YEAR_RE.find(t)))
        .map(|m| m.as_str().to_string())
}

/// "2024-25 O-Pee-Chee" → "O-Pee-Chee", "2025 Topps" → "Topps".
fn find_brand(crumbs: &[String], year: &str) -> Option<String> {
    crumbs
        .iter()
        .find(|t| t.contains(year) && !t.contains("Checklists"))
        .map(|t| trim_dashes(&t.replace(year, "")).to_string())
}

/// "Base Hockey Cards" → "Base". Falls back to the raw label when nothing is left.
fn clean_set_name(raw: &str) -> String {
    let stripped = CATALOG_WORDS_RE.replace_all(raw, "");
    let cleaned = trim_dashes(&collapse_whitespace(&stripped)).to_string();
    if cleaned.is_empty() {
        raw.to_string()
    } else {
        cleaned
    }
}

fn trim_dashes(s: &str) -> &str {
    s.trim_matches(|c| c == ' ' || c == '-')
}

// ── Tests ──
