//! Interactive shell state and command handling.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use moexdash_core::api::{ApiClient, Dispatcher, HttpTransport, Transport};
use moexdash_core::auth::{
    login_view_redirect, CredentialStore, Decision, KeyringCredentialStore, Router, SessionError,
    SessionHandle,
};
use moexdash_core::favorites::FavoritesStore;
use moexdash_core::forms::{
    registration_failure_message, ForecastForm, LoginForm, RegistrationForm,
};
use moexdash_core::navigation::{Navigation, NavigationKind, NavigationReceiver, Navigator, Route};
use moexdash_core::Config;

use crate::commands::{Command, FavoritesAction, HELP};
use crate::views;

const PROMPT: &str = "moexdash> ";

/// Whether the shell should keep reading commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// How the shell reacts to a navigation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationStep {
    /// Forced reload; the session has already ended
    Expired(Route),
    /// Land on the login view without prompting for credentials
    AwaitLogin,
    Show(Route),
}

impl NavigationStep {
    pub fn for_navigation(navigation: &Navigation) -> Self {
        match navigation.kind {
            NavigationKind::Hard => NavigationStep::Expired(navigation.route),
            NavigationKind::Push | NavigationKind::Replace if navigation.route == Route::Login => {
                NavigationStep::AwaitLogin
            }
            NavigationKind::Push | NavigationKind::Replace => NavigationStep::Show(navigation.route),
        }
    }
}

pub struct App {
    config: Config,
    session: SessionHandle,
    router: Router,
    navigation: NavigationReceiver,
    favorites: Option<FavoritesStore>,
    current: Route,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let transport = HttpTransport::new(&config.api_base_url, config.request_timeout())
            .context("Failed to build HTTP client")?;

        let favorites = match config.data_dir().and_then(|dir| FavoritesStore::open(&dir)) {
            Ok(store) => Some(store),
            Err(e) => {
                warn!(error = %e, "Favorites unavailable");
                None
            }
        };

        Ok(Self::with_backend(
            config,
            Arc::new(transport),
            Arc::new(KeyringCredentialStore::new()),
            favorites,
        ))
    }

    pub fn with_backend(
        config: Config,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
        favorites: Option<FavoritesStore>,
    ) -> Self {
        let (navigator, navigation) = Navigator::channel();
        let dispatcher = Dispatcher::new(transport, credentials, navigator.clone());
        let session = SessionHandle::new(ApiClient::new(dispatcher), navigator);
        let router = Router::new(session.clone());

        Self {
            config,
            session,
            router,
            navigation,
            favorites,
            current: Route::Root,
        }
    }

    /// Run the startup auth check. Must complete before any view is resolved.
    pub async fn boot(&mut self) -> Result<()> {
        info!(api = %self.config.api_base_url, "Checking session");
        let state = self.session.start().await?;
        debug!(?state, "Session started");
        Ok(())
    }

    /// Read commands from stdin until `quit` or end of input.
    pub async fn run(&mut self) -> Result<()> {
        println!("{}", views::status(&self.session.state()));
        println!("Type `help` for commands.");

        let stdin = io::stdin();
        loop {
            print!("{}", PROMPT);
            io::stdout().flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                println!();
                return Ok(());
            }

            if self.execute(Command::parse(&line)).await? == Flow::Quit {
                return Ok(());
            }
        }
    }

    pub async fn execute(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Empty => {}
            Command::Help => println!("{}", HELP),
            Command::Status => {
                println!("{}", views::status(&self.session.state()));
                println!("View: {}", self.current.path());
            }
            Command::Login => self.show(Route::Login).await?,
            Command::Register => self.show(Route::Register).await?,
            Command::Logout => self.logout().await,
            Command::Dashboard => self.show(Route::Dashboard).await?,
            Command::Forecast { ticker, days } => self.forecast(ForecastForm { ticker, days }).await?,
            Command::Favorites(action) => self.favorites(action),
            Command::Open(path) => self.show(Route::from_path(&path)).await?,
            Command::Quit => return Ok(Flow::Quit),
            Command::Unknown(input) => println!("Unknown command: {} (try `help`)", input),
        }

        self.follow_navigation().await?;
        Ok(Flow::Continue)
    }

    /// Act on navigations requested by the session and the dispatcher.
    async fn follow_navigation(&mut self) -> Result<()> {
        while let Ok(navigation) = self.navigation.try_recv() {
            debug!(route = ?navigation.route, kind = ?navigation.kind, "Navigation");
            match NavigationStep::for_navigation(&navigation) {
                NavigationStep::Expired(route) => {
                    println!("Your session has expired. Please sign in again.");
                    self.current = route;
                }
                NavigationStep::AwaitLogin => {
                    self.current = Route::Login;
                    println!("Run `login` to sign in.");
                }
                NavigationStep::Show(route) => self.show(route).await?,
            }
        }
        Ok(())
    }

    async fn show(&mut self, route: Route) -> Result<()> {
        let decision = self.router.resolve(route)?;
        debug!(?route, ?decision, "Resolved route");

        match decision {
            Decision::ShowLoading => println!("Loading..."),
            Decision::RedirectToLogin => {
                self.current = Route::Login;
                println!("Please sign in first (`login`).");
            }
            Decision::Render(page) => {
                self.current = page;
                match page {
                    Route::Root | Route::Dashboard => self.dashboard().await,
                    Route::Login => self.login_view().await?,
                    Route::Register => self.register_view().await?,
                    Route::ConfirmEmail => {
                        println!("Check your inbox and follow the link to confirm your email, then `login`.")
                    }
                    Route::NotFound => println!("Page not found."),
                }
            }
        }
        Ok(())
    }

    async fn login_view(&mut self) -> Result<()> {
        if let Some(target) = login_view_redirect(&self.session.session()) {
            println!("Already signed in.");
            return Box::pin(self.show(target)).await;
        }

        let login = prompt_with_default("Login", self.config.last_login.as_deref())?;
        let password = rpassword::prompt_password("Password: ")?;
        let form = LoginForm { login, password };

        let request = match form.validate() {
            Ok(request) => request,
            Err(errors) => {
                println!("{}", views::validation_errors(&errors));
                return Ok(());
            }
        };

        match self.session.login(&request).await {
            Ok(identity) => {
                println!("Signed in as {}.", identity.login);
                if let Err(e) = remember_login(&identity.login) {
                    warn!(error = %e, "Failed to save config");
                }
                self.config.last_login = Some(identity.login);
            }
            Err(SessionError::Request(_)) => {
                let message = self
                    .session
                    .last_error()
                    .unwrap_or_else(|| "Login failed".to_string());
                println!("{}", message);
            }
            Err(e) => println!("{}", e),
        }
        Ok(())
    }

    async fn register_view(&mut self) -> Result<()> {
        let form = RegistrationForm {
            login: prompt("Login")?,
            email: prompt("Email")?,
            password: rpassword::prompt_password("Password: ")?,
            confirm_password: rpassword::prompt_password("Confirm password: ")?,
        };

        let request = match form.validate() {
            Ok(request) => request,
            Err(errors) => {
                println!("{}", views::validation_errors(&errors));
                return Ok(());
            }
        };

        match self.session.api().register(&request).await {
            Ok(()) => {
                info!(login = %request.login, "Registered");
                Box::pin(self.show(Route::ConfirmEmail)).await?;
            }
            Err(e) => println!("{}", registration_failure_message(&e)),
        }
        Ok(())
    }

    async fn logout(&mut self) {
        match self.session.logout().await {
            Ok(()) => println!("Signed out."),
            Err(e) => println!("{}", e),
        }
    }

    async fn dashboard(&mut self) {
        match self.session.api().init_dashboard().await {
            Ok(data) => {
                let state = self.session.state();
                let favorites = self.favorites.as_ref().map(|f| f.list()).unwrap_or_default();
                println!("{}", views::dashboard(state.identity(), &data, favorites));
            }
            Err(e) => println!("Failed to load dashboard: {}", e.user_message()),
        }
    }

    async fn forecast(&mut self, form: ForecastForm) -> Result<()> {
        // Forecasts live on the dashboard page
        match self.router.resolve(Route::Dashboard)? {
            Decision::Render(_) => {}
            Decision::ShowLoading => {
                println!("Loading...");
                return Ok(());
            }
            Decision::RedirectToLogin => {
                self.current = Route::Login;
                println!("Please sign in first (`login`).");
                return Ok(());
            }
        }

        let query = match form.validate() {
            Ok(query) => query,
            Err(errors) => {
                println!("{}", views::validation_errors(&errors));
                return Ok(());
            }
        };

        match self.session.api().forecast(&query.ticker, query.days).await {
            Ok(analysis) => println!("{}", views::forecast(&query, &analysis)),
            Err(e) => println!("Failed to load forecast: {}", e.user_message()),
        }
        Ok(())
    }

    fn favorites(&mut self, action: FavoritesAction) {
        let Some(store) = self.favorites.as_mut() else {
            println!("Favorites are unavailable (no data directory).");
            return;
        };

        let result = match action {
            FavoritesAction::List => {
                if store.list().is_empty() {
                    println!("No favorites yet.");
                } else {
                    println!("{}", store.list().join(", "));
                }
                Ok(())
            }
            FavoritesAction::Add(ticker) => store.add(&ticker).map(|added| {
                let ticker = ticker.to_uppercase();
                if added {
                    println!("Added {}.", ticker);
                } else {
                    println!("{} is already a favorite.", ticker);
                }
            }),
            FavoritesAction::Remove(ticker) => store.remove(&ticker).map(|removed| {
                let ticker = ticker.to_uppercase();
                if removed {
                    println!("Removed {}.", ticker);
                } else {
                    println!("{} is not a favorite.", ticker);
                }
            }),
        };

        if let Err(e) = result {
            warn!(error = %e, "Failed to save favorites");
            println!("Failed to save favorites: {}", e);
        }
    }
}

/// Saves to the on-disk config, leaving environment overrides out of it.
fn remember_login(login: &str) -> Result<()> {
    let mut stored = Config::load()?;
    stored.last_login = Some(login.to_string());
    stored.save()
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_with_default(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(default) => {
            let input = prompt(&format!("{} [{}]", label, default))?;
            if input.is_empty() {
                Ok(default.to_string())
            } else {
                Ok(input)
            }
        }
        None => prompt(label),
    }
}
