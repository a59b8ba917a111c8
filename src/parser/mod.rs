pub mod layouts;
pub mod meta;
pub mod names;

use scraper::Html;

use crate::card::CardRecord;
use layouts::{Layout, RawCard};
use meta::PageMeta;

/// Everything read from one catalog page.
#[derive(Debug)]
pub struct PageExtraction {
    pub meta: PageMeta,
    pub cards: Vec<CardRecord>,
    pub counts: ExtractCounts,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractCounts {
    pub panel: usize,
    pub gallery: usize,
    pub skipped: usize,
}

impl ExtractCounts {
    pub fn raw(&self) -> usize {
        self.panel + self.gallery
    }
}

/// Two-pass pipeline: page metadata, then every known card layout.
/// Both layouts can appear on the same page; the gallery pass often
/// supplies images for cards the panel pass already found.
pub fn extract_page(html: &str, default_sport: &str) -> PageExtraction {
    let doc = Html::parse_document(html);
    let meta = meta::extract(&doc, default_sport);

    let mut cards = Vec::new();
    let mut counts = ExtractCounts::default();

    for layout in [Layout::Panel, Layout::Gallery] {
        let scan = layouts::scan(&doc, layout);
        counts.skipped += scan.skipped;
        for raw in scan.cards {
            match raw.layout {
                Layout::Panel => counts.panel += 1,
                Layout::Gallery => counts.gallery += 1,
            }
            cards.push(with_meta(&meta, raw));
        }
    }

    PageExtraction { meta, cards, counts }
}

fn with_meta(meta: &PageMeta, raw: RawCard) -> CardRecord {
    CardRecord {
        sport: meta.sport.clone(),
        year: meta.year.clone(),
        brand: meta.brand.clone(),
        set_name: meta.set_name.clone(),
        card_number: raw.card_number,
        player_name: raw.player_name,
        team: raw.team,
        image_url: raw.image_url,
        is_rookie: raw.is_rookie,
    }
}

// ── Tests ──
