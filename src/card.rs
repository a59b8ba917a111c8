use std::fmt;

use serde::{Serialize, Serializer};

use crate::parser::names::normalize;

/// Card number as printed on the card. Purely numeric values are kept as
/// integers so "007" and "7" resolve to the same card.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CardNumber {
    Numeric(u64),
    Literal(String),
}

impl CardNumber {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = raw.parse::<u64>() {
                return CardNumber::Numeric(n);
            }
        }
        CardNumber::Literal(raw.to_string())
    }
}

impl fmt::Display for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardNumber::Numeric(n) => write!(f, "{}", n),
            CardNumber::Literal(s) => f.write_str(s),
        }
    }
}

impl Serialize for CardNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One catalog card. Metadata fields use `""` for "not determined" so key
/// construction is always total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardRecord {
    pub sport: String,
    pub year: String,
    pub brand: String,
    pub set_name: String,
    pub card_number: CardNumber,
    pub player_name: String,
    pub team: Option<String>,
    pub image_url: Option<String>,
    pub is_rookie: bool,
}

/// Identity of a physical card across pages and files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NaturalKey {
    pub sport: String,
    pub year: String,
    pub brand: String,
    pub set_name: String,
    pub card_number: String,
    pub player_name: String,
}

/// `(sport, year, brand, set_name)` grouping a catalog set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SetKey {
    pub sport: String,
    pub year: String,
    pub brand: String,
    pub set_name: String,
}

impl CardRecord {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            sport: self.sport.clone(),
            year: self.year.clone(),
            brand: self.brand.clone(),
            set_name: self.set_name.clone(),
            card_number: self.card_number.to_string(),
            player_name: normalize(&self.player_name),
        }
    }

    pub fn set_key(&self) -> SetKey {
        SetKey {
            sport: self.sport.clone(),
            year: self.year.clone(),
            brand: self.brand.clone(),
            set_name: self.set_name.clone(),
        }
    }

    pub fn has_image(&self) -> bool {
        is_present(&self.image_url)
    }

    pub fn has_team(&self) -> bool {
        is_present(&self.team)
    }
}

pub(crate) fn is_present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

// ── Tests ──
