//! Route selection from session state.

use tokio::sync::watch;

use crate::session::SessionState;

pub const HOME_PATH: &str = "/";
pub const SIGN_IN_PATH: &str = "/login";
pub const SIGN_UP_PATH: &str = "/signup";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Session still loading; nothing routed is mounted.
    Placeholder,
    SignIn,
    SignUp,
    Home,
}

/// Pure routing rule: loading → placeholder, identity → home, otherwise the
/// requested unauthenticated view (sign-in unless sign-up was asked for).
pub fn resolve_route(state: &SessionState, requested_path: &str) -> Route {
    match state {
        SessionState::Unknown => Route::Placeholder,
        SessionState::Authenticated(_) => Route::Home,
        SessionState::Unauthenticated => {
            if requested_path == SIGN_UP_PATH {
                Route::SignUp
            } else {
                Route::SignIn
            }
        }
    }
}

pub struct RoutingShell {
    session: watch::Receiver<SessionState>,
    requested_path: String,
    was_authenticated: bool,
}

impl RoutingShell {
    pub fn new(session: watch::Receiver<SessionState>) -> Self {
        Self {
            session,
            requested_path: HOME_PATH.to_string(),
            was_authenticated: false,
        }
    }

    pub fn navigate(&mut self, path: impl Into<String>) -> Route {
        self.requested_path = path.into();
        self.current()
    }

    pub fn requested_path(&self) -> &str {
        &self.requested_path
    }

    /// Current route. Losing the identity always lands on sign-in, whatever
    /// path was requested before.
    pub fn current(&mut self) -> Route {
        let state = self.session.borrow_and_update().clone();
        match &state {
            SessionState::Authenticated(_) => self.was_authenticated = true,
            SessionState::Unauthenticated if self.was_authenticated => {
                self.was_authenticated = false;
                self.requested_path = SIGN_IN_PATH.to_string();
            }
            _ => {}
        }
        resolve_route(&state, &self.requested_path)
    }

    /// Waits for the next session change and returns the new route. Returns
    /// `None` once the session store is gone.
    pub async fn changed(&mut self) -> Option<Route> {
        self.session.changed().await.ok()?;
        Some(self.current())
    }
}

#[cfg(test)]
#[path = "tests/routing_tests.rs"]
mod tests;
