//! Plain-text rendering of the shell's views.

use std::fmt::Write;

use moexdash_core::forms::{ForecastQuery, ValidationError};
use moexdash_core::models::{Analysis, DashboardInit, Identity};
use moexdash_core::AuthState;

/// News items shown per source
const NEWS_LIMIT: usize = 5;
/// Characters of a telegram message shown before eliding
const MESSAGE_PREVIEW_CHARS: usize = 160;

pub fn status(state: &AuthState) -> String {
    match state {
        AuthState::Unknown | AuthState::Loading => "Checking session...".to_string(),
        AuthState::Anonymous => "Not signed in.".to_string(),
        AuthState::Authenticated(identity) => identity_summary(identity),
    }
}

fn identity_summary(identity: &Identity) -> String {
    let mut out = format!("Signed in as {}", identity.login);
    if let Some(email) = &identity.email {
        let verified = if identity.email_verified { "verified" } else { "unverified" };
        let _ = write!(out, " <{}> ({})", email, verified);
    }
    let _ = write!(out, "\nSubscription: {}", identity.subscription_display());
    out
}

pub fn validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn dashboard(identity: Option<&Identity>, data: &DashboardInit, favorites: &[String]) -> String {
    let mut out = String::new();
    if let Some(identity) = identity {
        let _ = writeln!(out, "Welcome, {}", identity.login);
    }

    let _ = writeln!(out, "\nIMOEX index");
    match (data.chart_data.first(), data.last_candle()) {
        (Some(first), Some(last)) => {
            let _ = writeln!(
                out,
                "  {} close {:.2} (from {:.2} on {}, {} candles)",
                last.time,
                last.close,
                first.open,
                first.time,
                data.chart_data.len()
            );
        }
        _ => {
            let _ = writeln!(out, "  No chart data");
        }
    }

    if !data.moex_news.is_empty() {
        let _ = writeln!(out, "\nMOEX news");
        for item in data.moex_news.iter().take(NEWS_LIMIT) {
            let _ = writeln!(out, "  [{}] {}", item.date, item.title);
        }
    }

    let mut channels = data.telegram_messages().peekable();
    if channels.peek().is_some() {
        let _ = writeln!(out, "\nTelegram");
        for (channel, message) in channels.take(NEWS_LIMIT) {
            let text = message.content.as_deref().map(preview).unwrap_or_default();
            let _ = writeln!(out, "  @{}: {}", channel, text);
        }
    }

    if !favorites.is_empty() {
        let _ = writeln!(out, "\nFavorites: {}", favorites.join(", "));
    }
    out.trim_end().to_string()
}

pub fn forecast(query: &ForecastQuery, analysis: &Analysis) -> String {
    let mut out = format!("{} forecast, {} days", query.ticker, query.days);

    if let Some(close) = analysis.last_close() {
        let _ = write!(out, "\n  Last close: {:.2}", close);
    }

    match &analysis.forecast {
        Some(point) => {
            let (low, high) = point.band();
            let _ = write!(out, "\n  {}: {:.2} [{:.2} .. {:.2}]", point.date, point.value, low, high);
            if let Some(change) = point.change_percent() {
                let _ = write!(out, " ({:+.2}%)", change);
            }
        }
        None => {
            let _ = write!(out, "\n  No forecast available");
        }
    }

    let groups = [
        ("Financial", &analysis.factors.financial),
        ("Technical", &analysis.factors.technical),
        ("Macro", &analysis.factors.macro_factors),
    ];
    for (title, factors) in groups {
        if factors.is_empty() {
            continue;
        }
        let values: Vec<String> = factors
            .iter()
            .map(|(name, value)| match value {
                Some(v) => format!("{}={:.2}", name, v),
                None => format!("{}=n/a", name),
            })
            .collect();
        let _ = write!(out, "\n  {}: {}", title, values.join(", "));
    }

    let metrics = analysis
        .metrics
        .regression
        .iter()
        .chain(analysis.metrics.classification.iter())
        .map(|(name, value)| format!("{}={:.3}", name, value))
        .collect::<Vec<_>>();
    if !metrics.is_empty() {
        let _ = write!(out, "\n  Model: {}", metrics.join(", "));
    }
    out
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MESSAGE_PREVIEW_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(MESSAGE_PREVIEW_CHARS).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        assert_eq!(status(&AuthState::Anonymous), "Not signed in.");
        assert_eq!(status(&AuthState::Unknown), "Checking session...");

        let mut identity = Identity::new("bob");
        identity.email = Some("bob@example.com".to_string());
        identity.email_verified = true;
        let text = status(&AuthState::Authenticated(identity));
        assert!(text.starts_with("Signed in as bob <bob@example.com> (verified)"));
        assert!(text.contains("Subscription: inactive"));
    }

    #[test]
    fn test_dashboard_view() {
        let data: DashboardInit = serde_json::from_str(
            r#"{
                "chart_data": [
                    {"time": "2025-03-12", "open": 3200.0, "high": 3250.0, "low": 3190.0, "close": 3240.0},
                    {"time": "2025-03-13", "open": 3240.0, "high": 3260.0, "low": 3220.0, "close": 3255.5}
                ],
                "moex_news": [{"id": 1, "title": "Trading update", "date": "2025-03-13", "url": "u"}],
                "telegram_news": {"markettwits": {"content": "line one\nline two"}, "silent": null}
            }"#,
        )
        .unwrap();
        let text = dashboard(Some(&Identity::new("bob")), &data, &["SBER".to_string()]);

        assert!(text.starts_with("Welcome, bob"));
        assert!(text.contains("2025-03-13 close 3255.50 (from 3200.00 on 2025-03-12, 2 candles)"));
        assert!(text.contains("[2025-03-13] Trading update"));
        assert!(text.contains("@markettwits: line one line two"));
        assert!(!text.contains("silent"));
        assert!(text.ends_with("Favorites: SBER"));
    }

    #[test]
    fn test_dashboard_without_data() {
        let text = dashboard(None, &DashboardInit::default(), &[]);
        assert_eq!(text, "\nIMOEX index\n  No chart data");
    }

    #[test]
    fn test_forecast_view() {
        let analysis: Analysis = serde_json::from_str(
            r#"{
                "ohlc": [{"date": "2025-03-13", "open": 100.0, "high": 101.0, "low": 99.0, "close": 100.0}],
                "forecast": {"date": "2025-03-20", "value": 110.0, "deviation": 5.0, "last_close": 100.0},
                "factors": {"financial": {"pe": 4.0, "roe": null}},
                "metrics": {"regression": {"mae": 2.5}}
            }"#,
        )
        .unwrap();
        let query = ForecastQuery { ticker: "SBER".to_string(), days: 7 };
        let text = forecast(&query, &analysis);

        assert!(text.starts_with("SBER forecast, 7 days"));
        assert!(text.contains("Last close: 100.00"));
        assert!(text.contains("2025-03-20: 110.00 [105.00 .. 115.00] (+10.00%)"));
        assert!(text.contains("Financial: pe=4.00, roe=n/a"));
        assert!(text.contains("Model: mae=2.500"));
        assert!(!text.contains("Technical"));
    }

    #[test]
    fn test_preview_elides_long_text() {
        let long = "x".repeat(MESSAGE_PREVIEW_CHARS + 10);
        let shown = preview(&long);
        assert!(shown.ends_with("..."));
        assert_eq!(shown.chars().count(), MESSAGE_PREVIEW_CHARS + 3);
    }
}
