//! Routes, the route guard and the navigation bar.
//!
//! Every route carries an explicit [`RouteClass`]. The guard only acts on `Protected` routes,
//! so a redirect to the login route (a `Terminal` route) can never trigger another redirect.

use crate::session::{Session, SessionHandle, SessionState};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    About,
    Contact,
    Login,
    Signup,
    ResetPassword,
    Dashboard,
    Upload,
    Timeline,
}

/// How the guard treats a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Reachable by anyone; not guarded.
    Public,
    /// Entry points of the auth flow. Never redirected away from.
    Terminal,
    /// Requires a signed-in session.
    Protected,
}

impl Route {
    pub const ALL: [Route; 9] = [
        Route::Home,
        Route::About,
        Route::Contact,
        Route::Login,
        Route::Signup,
        Route::ResetPassword,
        Route::Dashboard,
        Route::Upload,
        Route::Timeline,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::About => "/about",
            Route::Contact => "/contact",
            Route::Login => "/login",
            Route::Signup => "/signup",
            Route::ResetPassword => "/reset-password",
            Route::Dashboard => "/dashboard",
            Route::Upload => "/upload",
            Route::Timeline => "/timeline",
        }
    }

    pub fn class(&self) -> RouteClass {
        match self {
            Route::Home | Route::About | Route::Contact => RouteClass::Public,
            Route::Login | Route::Signup | Route::ResetPassword => RouteClass::Terminal,
            Route::Dashboard | Route::Upload | Route::Timeline => RouteClass::Protected,
        }
    }

    /// Looks a route up by its path.
    pub fn from_path(path: &str) -> Option<Route> {
        Route::ALL.into_iter().find(|r| r.path() == path)
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Where unauthenticated users are sent.
pub const LOGIN_ROUTE: Route = Route::Login;

/// Performs navigation on behalf of the page flows.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Navigator that records every navigation, in order.
#[derive(Debug, Default)]
pub struct HistoryNavigator {
    history: Mutex<Vec<Route>>,
}

impl HistoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<Route> {
        match self.history.lock() {
            Ok(history) => history.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn last(&self) -> Option<Route> {
        self.history().last().copied()
    }
}

impl Navigator for HistoryNavigator {
    fn navigate(&self, route: Route) {
        tracing::debug!(route = %route, "navigate");
        match self.history.lock() {
            Ok(mut history) => history.push(route),
            Err(poisoned) => poisoned.into_inner().push(route),
        }
    }
}

/// What the guarded subtree should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardView {
    /// Non-interactive spinner while the session is loading.
    Placeholder,
    /// Nothing at all; a redirect has been issued.
    Nothing,
    /// The wrapped content.
    Content,
}

/// Gate in front of one route's content.
#[derive(Debug)]
pub struct RouteGuard {
    route: Route,
    redirected: bool,
}

impl RouteGuard {
    pub fn new(route: Route) -> Self {
        Self {
            route,
            redirected: false,
        }
    }

    pub fn route(&self) -> Route {
        self.route
    }

    /// Re-evaluates the guard for a session snapshot.
    ///
    /// At most one redirect is issued per transition into the unauthenticated state; calling
    /// this again with the same unauthenticated session does not navigate again.
    pub fn evaluate(&mut self, session: &Session, navigator: &dyn Navigator) -> GuardView {
        if self.route.class() != RouteClass::Protected {
            return GuardView::Content;
        }

        match session.state() {
            SessionState::Loading => GuardView::Placeholder,
            SessionState::Unauthenticated => {
                if !self.redirected {
                    tracing::info!(from = %self.route, "redirecting unauthenticated user to login");
                    navigator.navigate(LOGIN_ROUTE);
                    self.redirected = true;
                }
                GuardView::Nothing
            }
            SessionState::Authenticated(_) => {
                self.redirected = false;
                GuardView::Content
            }
        }
    }

    /// Waits for the session to settle, then evaluates the guard once.
    pub async fn resolve(
        &mut self,
        session: &mut SessionHandle,
        navigator: &dyn Navigator,
    ) -> GuardView {
        let settled = session.wait_until_loaded().await;
        self.evaluate(&settled, navigator)
    }

    /// Keeps the guard in step with the session until the session store shuts down.
    ///
    /// `on_view` receives the view for the current snapshot, then again after every change. A
    /// sign-out while on a protected route therefore redirects to the login route, once.
    pub async fn follow(
        &mut self,
        mut session: SessionHandle,
        navigator: &dyn Navigator,
        mut on_view: impl FnMut(GuardView),
    ) {
        on_view(self.evaluate(&session.current(), navigator));
        while let Some(next) = session.changed().await {
            on_view(self.evaluate(&next, navigator));
        }
        tracing::debug!(route = %self.route, "session closed; guard stopped");
    }
}

/// One entry of the navigation bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavLink {
    pub route: Route,
    pub label: &'static str,
    pub active: bool,
}

/// Links shown in the navigation bar for this session, with the current route marked.
pub fn nav_links(session: &Session, current: Route) -> Vec<NavLink> {
    let entries: &[(Route, &'static str)] = match session.identity() {
        Some(_) => &[
            (Route::Dashboard, "Dashboard"),
            (Route::Upload, "Upload"),
            (Route::Timeline, "Timeline"),
        ],
        None => &[(Route::About, "About"), (Route::Contact, "Contact")],
    };

    entries
        .iter()
        .map(|&(route, label)| NavLink {
            route,
            label,
            active: route == current,
        })
        .collect()
}
