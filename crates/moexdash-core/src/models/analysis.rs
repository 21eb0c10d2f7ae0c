//! Analytics for a single ticker.
//!
//! These types mirror `GET /analysis/{ticker}/forecast/{days}`: price
//! history, one forecast point, factor groups feeding the model and the
//! model's quality metrics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcBar {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: String,
    pub value: f64,
    pub deviation: f64,
    pub last_close: f64,
}

impl ForecastPoint {
    /// Expected move relative to the last close, in percent.
    pub fn change_percent(&self) -> Option<f64> {
        if self.last_close == 0.0 {
            return None;
        }
        Some((self.value - self.last_close) / self.last_close * 100.0)
    }

    /// Lower and upper bound of the forecast band
    pub fn band(&self) -> (f64, f64) {
        (self.value - self.deviation, self.value + self.deviation)
    }
}

/// Factor values keyed by factor name; `None` where the backend had no data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FactorGroups {
    #[serde(default)]
    pub financial: BTreeMap<String, Option<f64>>,
    #[serde(default)]
    pub technical: BTreeMap<String, Option<f64>>,
    #[serde(default, rename = "macro")]
    pub macro_factors: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelMetrics {
    #[serde(default)]
    pub regression: BTreeMap<String, f64>,
    #[serde(default)]
    pub classification: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub ohlc: Vec<OhlcBar>,
    #[serde(default)]
    pub forecast: Option<ForecastPoint>,
    #[serde(default)]
    pub factors: FactorGroups,
    #[serde(default)]
    pub metrics: ModelMetrics,
}

impl Analysis {
    pub fn last_close(&self) -> Option<f64> {
        self.ohlc.last().map(|bar| bar.close)
    }
}
