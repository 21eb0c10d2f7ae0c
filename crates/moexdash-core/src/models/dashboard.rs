use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One daily candle of the index chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoexNewsItem {
    pub id: i64,
    pub title: String,
    pub date: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TelegramMessage {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Response of `GET /init/dashboard`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardInit {
    #[serde(default)]
    pub chart_data: Vec<Candle>,
    #[serde(default)]
    pub moex_news: Vec<MoexNewsItem>,
    /// Latest message per channel; a channel with nothing parsed maps to `None`
    #[serde(default)]
    pub telegram_news: BTreeMap<String, Option<TelegramMessage>>,
}

impl DashboardInit {
    pub fn last_candle(&self) -> Option<&Candle> {
        self.chart_data.last()
    }

    /// Channels that actually carry a message
    pub fn telegram_messages(&self) -> impl Iterator<Item = (&str, &TelegramMessage)> {
        self.telegram_news
            .iter()
            .filter_map(|(channel, message)| message.as_ref().map(|m| (channel.as_str(), m)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dashboard_init() {
        let json = r#"{
            "chart_data": [
                {"time": "2025-03-12", "open": 3200.0, "high": 3250.5, "low": 3190.0, "close": 3240.1},
                {"time": "2025-03-13", "open": 3240.1, "high": 3260.0, "low": 3220.0, "close": 3255.0}
            ],
            "moex_news": [{"id": 1, "title": "Торги", "date": "2025-03-13 10:00:00", "url": "https://moex.com/n1"}],
            "telegram_news": {"markettwits": {"date": "2025-03-13T09:00:00", "content": "hello"}, "empty": null}
        }"#;

        let dashboard: DashboardInit = serde_json::from_str(json).expect("parse");
        assert_eq!(dashboard.chart_data.len(), 2);
        assert_eq!(dashboard.last_candle().map(|c| c.close), Some(3255.0));
        assert_eq!(dashboard.moex_news[0].title, "Торги");

        let messages: Vec<_> = dashboard.telegram_messages().collect();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "markettwits");
        assert_eq!(messages[0].1.content.as_deref(), Some("hello"));
    }

    #[test]
    fn test_parse_empty_dashboard() {
        let dashboard: DashboardInit = serde_json::from_str("{}").expect("parse");
        assert!(dashboard.chart_data.is_empty());
        assert!(dashboard.last_candle().is_none());
    }
}
