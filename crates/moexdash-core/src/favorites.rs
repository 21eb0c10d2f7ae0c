//! Favorite tickers persisted on disk.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

const FAVORITES_FILE: &str = "favorites.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favorites {
    pub tickers: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Favorites {
    fn default() -> Self {
        Self {
            tickers: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

pub struct FavoritesStore {
    path: PathBuf,
    favorites: Favorites,
}

impl FavoritesStore {
    /// Open the list under `data_dir`, creating the directory if needed.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
        let path = data_dir.join(FAVORITES_FILE);

        let favorites = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read favorites file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse favorites file: {}", path.display()))?
        } else {
            Favorites::default()
        };

        debug!(count = favorites.tickers.len(), "Loaded favorites");
        Ok(Self { path, favorites })
    }

    pub fn list(&self) -> &[String] {
        &self.favorites.tickers
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.favorites.updated_at
    }

    pub fn contains(&self, ticker: &str) -> bool {
        let ticker = normalize(ticker);
        self.favorites.tickers.iter().any(|t| *t == ticker)
    }

    /// Returns false when the ticker was already present or blank.
    pub fn add(&mut self, ticker: &str) -> Result<bool> {
        let ticker = normalize(ticker);
        if ticker.is_empty() || self.contains(&ticker) {
            return Ok(false);
        }
        self.favorites.tickers.push(ticker);
        self.save()?;
        Ok(true)
    }

    pub fn remove(&mut self, ticker: &str) -> Result<bool> {
        let ticker = normalize(ticker);
        let before = self.favorites.tickers.len();
        self.favorites.tickers.retain(|t| *t != ticker);
        if self.favorites.tickers.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    fn save(&mut self) -> Result<()> {
        self.favorites.updated_at = Utc::now();
        let contents = serde_json::to_string_pretty(&self.favorites)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write favorites file: {}", self.path.display()))?;
        Ok(())
    }
}

fn normalize(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}
