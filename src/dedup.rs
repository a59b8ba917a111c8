use std::collections::HashMap;

use crate::card::{CardRecord, NaturalKey};
use crate::parser::names::normalize;

/// Result of a dedup pass. `records` holds one entry per natural key in
/// first-seen order.
#[derive(Debug, Default)]
pub struct Deduped {
    pub records: Vec<CardRecord>,
    pub input: usize,
    pub merged: usize,
}

/// Fill gaps in `existing` from a duplicate of the same card.
/// Populated fields are never cleared; the rookie flag only turns on.
pub fn merge(mut existing: CardRecord, incoming: &CardRecord) -> CardRecord {
    if !existing.has_image() && incoming.has_image() {
        existing.image_url = incoming.image_url.clone();
    }
    if !existing.has_team() && incoming.has_team() {
        existing.team = incoming.team.clone();
    }
    existing.is_rookie |= incoming.is_rookie;
    existing
}

/// Collapse the cards scraped from a single page.
pub fn dedupe_file(records: Vec<CardRecord>) -> Deduped {
    fold(records)
}

/// Collapse cards pooled from every page. Running it on its own output
/// changes nothing.
pub fn dedupe_global(records: Vec<CardRecord>) -> Deduped {
    fold(records)
}

fn fold(records: Vec<CardRecord>) -> Deduped {
    let input = records.len();
    let mut index: HashMap<NaturalKey, usize> = HashMap::with_capacity(input);
    let mut out: Vec<CardRecord> = Vec::with_capacity(input);
    let mut merged = 0;

    for mut card in records {
        card.player_name = normalize(&card.player_name);
        let key = card.natural_key();
        match index.get(&key) {
            Some(&slot) => {
                out[slot] = merge(out[slot].clone(), &card);
                merged += 1;
            }
            None => {
                index.insert(key, out.len());
                out.push(card);
            }
        }
    }

    Deduped {
        records: out,
        input,
        merged,
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::card::CardNumber;

    fn card(number: u64, player: &str) -> CardRecord {
        CardRecord {
            sport: "Hockey".into(),
            year: "2024-25".into(),
            brand: "Upper Deck".into(),
            set_name: "Base".into(),
            card_number: CardNumber::Numeric(number),
            player_name: player.into(),
            team: None,
            image_url: None,
            is_rookie: false,
        }
    }

    #[test]
    fn merge_fills_gaps() {
        let a = CardRecord {
            team: Some("Leafs".into()),
            ..card(16, "Mitch Marner")
        };
        let b = CardRecord {
            image_url: Some("http://x/img.jpg".into()),
            is_rookie: true,
            ..card(16, "Mitch Marner")
        };
        let m = merge(a, &b);
        assert_eq!(m.image_url.as_deref(), Some("http://x/img.jpg"));
        assert_eq!(m.team.as_deref(), Some("Leafs"));
        assert!(m.is_rookie);
    }

    #[test]
    fn merge_never_overwrites() {
        let a = CardRecord {
            team: Some("Leafs".into()),
            image_url: Some("http://x/a.jpg".into()),
            is_rookie: true,
            ..card(16, "Mitch Marner")
        };
        let b = CardRecord {
            team: Some(String::new()),
            image_url: Some("http://x/b.jpg".into()),
            ..card(16, "Mitch Marner")
        };
        let m = merge(a.clone(), &b);
        assert_eq!(m, a);
    }

    #[test]
    fn empty_string_counts_as_missing() {
        let a = CardRecord {
            image_url: Some(String::new()),
            ..card(3, "Auston Matthews")
        };
        let b = CardRecord {
            image_url: Some("http://x/34.jpg".into()),
            ..card(3, "Auston Matthews")
        };
        assert_eq!(merge(a, &b).image_url.as_deref(), Some("http://x/34.jpg"));
    }

    #[test]
    fn apostrophe_variants_collapse() {
        let out = dedupe_file(vec![
            card(101, "Drew O'Connor"),
            card(101, "Drew O\\'Connor"),
        ]);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.merged, 1);
        assert_eq!(out.records[0].player_name, "Drew O'Connor");
    }

    #[test]
    fn different_players_same_number_stay_apart() {
        let out = dedupe_file(vec![card(1, "Connor Bedard"), card(1, "Connor McDavid")]);
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.merged, 0);
    }

    fn sample_pool() -> Vec<CardRecord> {
        vec![
            CardRecord {
                team: Some("Leafs".into()),
                ..card(16, "Mitch  Marner")
            },
            CardRecord {
                image_url: Some("http://x/16.jpg".into()),
                ..card(16, "Mitch Marner")
            },
            CardRecord {
                is_rookie: true,
                ..card(201, "Lane Hutson")
            },
            card(201, "Lane Hutson"),
            CardRecord {
                set_name: "Young Guns".into(),
                ..card(201, "Lane Hutson")
            },
            card(7, "Connor Bedard"),
        ]
    }

    #[test]
    fn global_keys_unique_and_monotonic() {
        let pool = sample_pool();
        let out = dedupe_global(pool.clone());
        assert_eq!(out.input, 6);
        assert_eq!(out.records.len(), 4);
        assert_eq!(out.merged, 2);

        let keys: HashSet<_> = out.records.iter().map(|c| c.natural_key()).collect();
        assert_eq!(keys.len(), out.records.len());

        // Any input's populated field survives in the merged record
        for input in &pool {
            let merged = out
                .records
                .iter()
                .find(|c| c.natural_key() == input.natural_key())
                .unwrap();
            if input.has_image() {
                assert!(merged.has_image());
            }
            if input.has_team() {
                assert!(merged.has_team());
            }
            if input.is_rookie {
                assert!(merged.is_rookie);
            }
        }
    }

    #[test]
    fn global_is_idempotent() {
        let once = dedupe_global(sample_pool());
        let twice = dedupe_global(once.records.clone());
        assert_eq!(twice.records, once.records);
        assert_eq!(twice.merged, 0);
    }

    #[test]
    fn per_file_outputs_pool_into_global() {
        let page_a = dedupe_file(vec![
            CardRecord {
                team: Some("Sabres".into()),
                ..card(23, "Rasmus Dahlin")
            },
            card(23, "Rasmus Dahlin"),
        ]);
        let page_b = dedupe_file(vec![CardRecord {
            image_url: Some("http://x/23.jpg".into()),
            ..card(23, "Rasmus Dahlin")
        }]);
        let pooled: Vec<_> = page_a.records.into_iter().chain(page_b.records).collect();
        let out = dedupe_global(pooled);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].team.as_deref(), Some("Sabres"));
        assert_eq!(out.records[0].image_url.as_deref(), Some("http://x/23.jpg"));
    }
}
