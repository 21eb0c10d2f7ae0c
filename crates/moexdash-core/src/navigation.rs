//! Routes and navigation requests.
//!
//! Components never switch views themselves; they send a [`Navigation`]
//! through the injected [`Navigator`] and the host (terminal shell, GUI)
//! decides how to act on it.

use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Root,
    Dashboard,
    Login,
    Register,
    ConfirmEmail,
    NotFound,
}

impl Route {
    pub fn from_path(path: &str) -> Self {
        match path.trim_end_matches('/') {
            "" => Route::Root,
            "/dashboard" => Route::Dashboard,
            "/login" => Route::Login,
            "/register" => Route::Register,
            "/confirm-email" => Route::ConfirmEmail,
            _ => Route::NotFound,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Root => "/",
            Route::Dashboard => "/dashboard",
            Route::Login => "/login",
            Route::Register => "/register",
            Route::ConfirmEmail => "/confirm-email",
            Route::NotFound => "*",
        }
    }

    /// Pages that require an authenticated session
    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Root | Route::Dashboard)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    Push,
    /// Replaces the current history entry
    Replace,
    /// Discards all in-memory view state before showing the route
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigation {
    pub route: Route,
    pub kind: NavigationKind,
}

pub type NavigationReceiver = mpsc::UnboundedReceiver<Navigation>;

#[derive(Debug, Clone)]
pub struct Navigator {
    tx: mpsc::UnboundedSender<Navigation>,
}

impl Navigator {
    pub fn channel() -> (Self, NavigationReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn push(&self, route: Route) {
        self.send(Navigation { route, kind: NavigationKind::Push });
    }

    pub fn replace(&self, route: Route) {
        self.send(Navigation { route, kind: NavigationKind::Replace });
    }

    pub fn hard(&self, route: Route) {
        self.send(Navigation { route, kind: NavigationKind::Hard });
    }

    fn send(&self, navigation: Navigation) {
        if self.tx.send(navigation).is_err() {
            // Host is gone; nothing left to navigate
            debug!(route = navigation.route.path(), "Navigation dropped, receiver closed");
        }
    }
}
