use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

use super::names::strip_promotional_suffix;
use crate::card::CardNumber;

static PANEL_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(\d+)\s+(.*)").unwrap());
static SEARCH_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+(\d+)\s+(.+?)\s*$").unwrap());
static BADGE_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"badge.*danger").unwrap());

fn sel(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static PANEL_SEL: LazyLock<Selector> = LazyLock::new(|| sel("div.panel.panel-primary"));
static H5_SEL: LazyLock<Selector> = LazyLock::new(|| sel("h5"));
static TEAM_SEL: LazyLock<Selector> = LazyLock::new(|| sel("div.border-muted.border-bottom"));
static DIV_SEL: LazyLock<Selector> = LazyLock::new(|| sel("div"));
static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| sel("div.row.border-separator"));
static GALLERY_SEL: LazyLock<Selector> = LazyLock::new(|| sel("div.gallery-wrapper"));
static POPUP_SEL: LazyLock<Selector> = LazyLock::new(|| sel("a.popup-image"));
static IMG_SEL: LazyLock<Selector> = LazyLock::new(|| sel("img"));
static SEARCH_SEL: LazyLock<Selector> = LazyLock::new(|| sel(r#"input[name="ebay_search"]"#));

/// Page template a card fragment was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `div.panel` blocks with a `#<n> <player>` heading, team and RC badge.
    Panel,
    /// Gallery rows with a front thumbnail and a hidden search field.
    Gallery,
}

/// One card fragment before page metadata is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCard {
    pub layout: Layout,
    pub card_number: CardNumber,
    pub player_name: String,
    pub team: Option<String>,
    pub image_url: Option<String>,
    pub is_rookie: bool,
}

/// Cards found on one page plus the fragments that looked like cards but
/// could not be read.
#[derive(Debug, Default)]
pub struct LayoutScan {
    pub cards: Vec<RawCard>,
    pub skipped: usize,
}

impl LayoutScan {
    fn push(&mut self, card: Option<RawCard>) {
        match card {
            Some(c) => self.cards.push(c),
            None => self.skipped += 1,
        }
    }
}

pub fn scan(doc: &Html, layout: Layout) -> LayoutScan {
    let mut out = LayoutScan::default();
    match layout {
        Layout::Panel => {
            for panel in doc.select(&PANEL_SEL) {
                // Panels without a heading are not card panels at all.
                if panel.select(&H5_SEL).next().is_none() {
                    continue;
                }
                out.push(read_panel(panel));
            }
        }
        Layout::Gallery => {
            for row in doc.select(&ROW_SEL) {
                let Some(gallery) = row.select(&GALLERY_SEL).next() else {
                    continue;
                };
                out.push(read_gallery_row(row, gallery));
            }
        }
    }
    out
}

// ── Panel ──

fn read_panel(panel: ElementRef) -> Option<RawCard> {
    let heading = panel.select(&H5_SEL).next()?;
    let heading_text = joined_text(heading);

    // "2024-25 Upper Deck  #499 Macklin Celebrini/Will Smith Young Gun"
    let caps = PANEL_HEADING_RE.captures(&heading_text)?;
    let card_number = CardNumber::parse(&caps[1]);
    let player_name = strip_promotional_suffix(caps[2].trim());

    let team = panel
        .select(&TEAM_SEL)
        .next()
        .map(team_text)
        .filter(|t| !t.is_empty());

    let is_rookie = panel
        .select(&DIV_SEL)
        .find(|div| {
            div.value()
                .attr("class")
                .is_some_and(|class| BADGE_CLASS_RE.is_match(class))
        })
        .is_some_and(|badge| joined_text(badge).to_uppercase().contains("RC"));

    Some(RawCard {
        layout: Layout::Panel,
        card_number,
        player_name,
        team,
        image_url: None,
        is_rookie,
    })
}

/// Team block text with its `<small>` annotations left out.
fn team_text(team_div: ElementRef) -> String {
    let mut parts = Vec::new();
    collect_text_skipping(team_div, "small", &mut parts);
    parts.join(" ")
}

fn collect_text_skipping(el: ElementRef, skip_tag: &str, parts: &mut Vec<String>) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                let t = text.trim();
                if !t.is_empty() {
                    parts.push(t.to_string());
                }
            }
            Node::Element(e) if e.name() == skip_tag => {}
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text_skipping(child_el, skip_tag, parts);
                }
            }
            _ => {}
        }
    }
}

// ── Gallery ──

fn read_gallery_row(row: ElementRef, gallery: ElementRef) -> Option<RawCard> {
    let image_url = front_image(gallery)?;

    // value="2024-25 O-Pee-Chee  23 Rasmus Dahlin "
    let value = row
        .select(&SEARCH_SEL)
        .next()?
        .value()
        .attr("value")
        .unwrap_or("")
        .trim();
    let caps = SEARCH_VALUE_RE.captures(value)?;

    Some(RawCard {
        layout: Layout::Gallery,
        card_number: CardNumber::parse(&caps[1]),
        player_name: strip_promotional_suffix(caps[2].trim()),
        team: None,
        image_url: Some(image_url),
        is_rookie: false,
    })
}

/// Front thumbnail only (`front_thumb_16218044.jpg`); backs are ignored.
fn front_image(gallery: ElementRef) -> Option<String> {
    gallery.select(&POPUP_SEL).find_map(|a| {
        let href = a.value().attr("href").unwrap_or("");
        let src = a
            .select(&IMG_SEL)
            .next()
            .and_then(|img| img.value().attr("src"))
            .unwrap_or("");
        if href.contains("front_") || src.contains("front_thumb_") {
            let url = if src.is_empty() { href } else { src };
            Some(url.to_string())
        } else {
            None
        }
    })
}

/// Text nodes trimmed and joined with single spaces.
fn joined_text(el: ElementRef) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn panel_doc(body: &str) -> Html {
        Html::parse_document(&format!("<html><body>{}</body></html>", body))
    }

    #[test]
    fn panel_with_team_and_rc_badge() {
        let doc = panel_doc(
            r#"<div class="panel panel-primary">
                 <h5>2024-25 Upper Deck <a href="/c/499">#499 Macklin Celebrini/Will Smith Young Gun</a></h5>
                 <div class="border-muted border-bottom">San Jose Sharks <small>NHL</small></div>
                 <div class="badge badge-danger">rc</div>
               </div>"#,
        );
        let scan = scan(&doc, Layout::Panel);
        assert_eq!(scan.skipped, 0);
        assert_eq!(
            scan.cards,
            vec![RawCard {
                layout: Layout::Panel,
                card_number: CardNumber::Numeric(499),
                player_name: "Macklin Celebrini/Will Smith".into(),
                team: Some("San Jose Sharks".into()),
                image_url: None,
                is_rookie: true,
            }]
        );
    }

    #[test]
    fn panel_without_number_is_skipped() {
        let doc = panel_doc(
            r#"<div class="panel panel-primary"><h5>Checklist notes</h5></div>
               <div class="panel panel-primary"><p>no heading</p></div>"#,
        );
        let scan = scan(&doc, Layout::Panel);
        assert!(scan.cards.is_empty());
        assert_eq!(scan.skipped, 1);
    }

    #[test]
    fn empty_team_becomes_none() {
        let doc = panel_doc(
            r#"<div class="panel panel-primary">
                 <h5>#12 Lane Hutson</h5>
                 <div class="border-muted border-bottom"><small>only a note</small></div>
                 <div class="badge badge-info">SP</div>
               </div>"#,
        );
        let found = scan(&doc, Layout::Panel);
        let card = &found.cards[0];
        assert_eq!(card.team, None);
        assert!(!card.is_rookie);
    }

    #[test]
    fn gallery_front_thumbnail() {
        let doc = panel_doc(
            r#"<div class="row border-separator">
                 <div class="gallery-wrapper">
                   <a class="popup-image" href="/img/back_16218044.jpg"><img src="/img/back_thumb_16218044.jpg"></a>
                   <a class="popup-image" href="/img/front_16218044.jpg"><img src="/img/front_thumb_16218044.jpg"></a>
                 </div>
                 <input type="hidden" name="ebay_search" value="2024-25 O-Pee-Chee  23 Rasmus Dahlin ">
               </div>"#,
        );
        let scan = scan(&doc, Layout::Gallery);
        assert_eq!(scan.cards.len(), 1);
        let card = &scan.cards[0];
        assert_eq!(card.image_url.as_deref(), Some("/img/front_thumb_16218044.jpg"));
        assert_eq!(card.card_number, CardNumber::Numeric(23));
        assert_eq!(card.player_name, "Rasmus Dahlin");
        assert_eq!(card.team, None);
        assert!(!card.is_rookie);
    }

    #[test]
    fn gallery_href_used_without_img() {
        let doc = panel_doc(
            r#"<div class="row border-separator">
                 <div class="gallery-wrapper"><a class="popup-image" href="/img/front_99.jpg"></a></div>
                 <input name="ebay_search" value="2025 Topps 7 Aaron Judge">
               </div>"#,
        );
        let found = scan(&doc, Layout::Gallery);
        let card = &found.cards[0];
        assert_eq!(card.image_url.as_deref(), Some("/img/front_99.jpg"));
        assert_eq!(card.player_name, "Aaron Judge");
    }

    #[test]
    fn gallery_rows_without_front_or_search_are_skipped() {
        let doc = panel_doc(
            r#"<div class="row border-separator">
                 <div class="gallery-wrapper"><a class="popup-image" href="/img/back_1.jpg"></a></div>
                 <input name="ebay_search" value="2025 Topps 1 Shohei Ohtani">
               </div>
               <div class="row border-separator">
                 <div class="gallery-wrapper"><a class="popup-image" href="/img/front_2.jpg"></a></div>
               </div>
               <div class="row border-separator">
                 <div class="gallery-wrapper"><a class="popup-image" href="/img/front_3.jpg"></a></div>
                 <input name="ebay_search" value="no number here">
               </div>
               <div class="row border-separator"><p>not a card row</p></div>"#,
        );
        let scan = scan(&doc, Layout::Gallery);
        assert!(scan.cards.is_empty());
        assert_eq!(scan.skipped, 3);
    }
}
