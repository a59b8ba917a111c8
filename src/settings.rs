use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Runtime settings: `cards.toml` (optional) overlaid by `CARDS_*` env vars.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub db_path: PathBuf,
    pub html_dir: PathBuf,
    pub output_dir: PathBuf,
    pub output_file: String,
    /// Sport used when a page carries no hidden sport field.
    pub default_sport: String,
    pub ebay_token: Option<String>,
    pub ebay_marketplace: String,
    pub lookup_pause_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/cards.sqlite"),
            html_dir: PathBuf::from("scrapehtml"),
            output_dir: PathBuf::from("output"),
            output_file: "all_cards.csv".to_string(),
            default_sport: "Hockey".to_string(),
            ebay_token: None,
            ebay_marketplace: "EBAY_CA".to_string(),
            lookup_pause_ms: 200,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Config::builder()
            .add_source(File::with_name("cards").required(false))
            .add_source(Environment::with_prefix("CARDS"))
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")
    }

    pub fn export_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_file)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_keys() {
        let s: Settings = Config::builder()
            .set_override("default_sport", "Baseball")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(s.default_sport, "Baseball");
        assert_eq!(s.ebay_marketplace, "EBAY_CA");
        assert_eq!(s.export_path(), PathBuf::from("output/all_cards.csv"));
        assert!(s.ebay_token.is_none());
    }
}
