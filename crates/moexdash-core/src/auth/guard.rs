//! Route gating on session state.

use thiserror::Error;

use crate::navigation::Route;

use super::session::{AuthState, Session, SessionHandle};

/// What to show for a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Render(Route),
    ShowLoading,
    RedirectToLogin,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("Session has not been started - run the auth check before routing")]
    SessionNotStarted,
}

/// Gate for a protected page.
pub fn decide(session: &Session, page: Route) -> Decision {
    if session.loading {
        Decision::ShowLoading
    } else if session.identity.is_some() {
        Decision::Render(page)
    } else {
        Decision::RedirectToLogin
    }
}

/// Route table: protected pages go through [`decide`], public pages always
/// render, anything unknown goes to login.
pub fn resolve(route: Route, session: &Session) -> Decision {
    match route {
        Route::NotFound => Decision::RedirectToLogin,
        page if page.is_protected() => decide(session, page),
        page => Decision::Render(page),
    }
}

/// The login view leaves for the dashboard as soon as someone is signed in.
pub fn login_view_redirect(session: &Session) -> Option<Route> {
    if !session.loading && session.identity.is_some() {
        Some(Route::Dashboard)
    } else {
        None
    }
}

/// Resolves navigations against an injected session.
#[derive(Clone)]
pub struct Router {
    session: SessionHandle,
}

impl Router {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Fails fast when nobody ran the startup auth check; otherwise the
    /// guard would show the loading view forever.
    pub fn resolve(&self, route: Route) -> Result<Decision, RouteError> {
        let state = self.session.state();
        if state == AuthState::Unknown {
            return Err(RouteError::SessionNotStarted);
        }
        Ok(resolve(route, &state.session()))
    }

    pub fn resolve_path(&self, path: &str) -> Result<Decision, RouteError> {
        self.resolve(Route::from_path(path))
    }

    /// Completes with the dashboard route once the session becomes
    /// authenticated while the login view is displayed. `None` if the
    /// session was dropped.
    pub async fn login_view_effect(&self) -> Option<Route> {
        let mut rx = self.session.subscribe();
        let state = rx.wait_for(|state| state.is_authenticated()).await.ok()?;
        login_view_redirect(&state.session())
    }
}
