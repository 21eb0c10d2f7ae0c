//! Shell command parsing.

use moexdash_core::forms::DEFAULT_FORECAST_DAYS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FavoritesAction {
    List,
    Add(String),
    Remove(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Help,
    Status,
    Login,
    Register,
    Logout,
    Dashboard,
    /// Unparseable day counts become 0 and are rejected by form validation
    Forecast { ticker: String, days: u32 },
    Favorites(FavoritesAction),
    /// Navigate by path, e.g. `open /dashboard`
    Open(String),
    Quit,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Command::Empty;
        };
        let args: Vec<&str> = words.collect();

        match name.to_lowercase().as_str() {
            "help" | "?" => Command::Help,
            "status" | "whoami" => Command::Status,
            "login" => Command::Login,
            "register" => Command::Register,
            "logout" => Command::Logout,
            "dashboard" => Command::Dashboard,
            "forecast" => Command::Forecast {
                ticker: args.first().copied().unwrap_or_default().to_string(),
                days: args
                    .get(1)
                    .map(|raw| raw.parse().unwrap_or(0))
                    .unwrap_or(DEFAULT_FORECAST_DAYS),
            },
            "favorites" | "fav" => Command::Favorites(match (args.first(), args.get(1)) {
                (Some(&"add"), Some(ticker)) => FavoritesAction::Add(ticker.to_string()),
                (Some(&"remove"), Some(ticker)) => FavoritesAction::Remove(ticker.to_string()),
                (None, _) => FavoritesAction::List,
                _ => return Command::Unknown(line.trim().to_string()),
            }),
            "open" => match args.first() {
                Some(path) => Command::Open(path.to_string()),
                None => Command::Unknown(line.trim().to_string()),
            },
            "quit" | "exit" => Command::Quit,
            _ => Command::Unknown(line.trim().to_string()),
        }
    }
}

pub const HELP: &str = "\
Commands:
  status                        Show who is signed in
  login                         Sign in
  register                      Create an account
  logout                        Sign out
  dashboard                     Index chart and news
  forecast <TICKER> [DAYS]      Forecast for a ticker (default 7 days)
  favorites [add|remove <T>]    List or edit favorite tickers
  open <PATH>                   Navigate to a route, e.g. /dashboard
  help                          Show this help
  quit                          Exit";
