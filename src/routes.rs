/// A screen the app can show; navigation only ever moves between these two
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Home,
}

impl Route {
    /// Canonical path of the route
    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Home => "/home",
        }
    }
}

/// Outcome of resolving a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Page(Route),
    /// Temporary redirect to another route
    Redirect(Route),
    NotFound,
}

/// Resolve a path, ignoring query, fragment and trailing slashes
pub fn resolve(path: &str) -> Resolution {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');

    match trimmed {
        "" => Resolution::Redirect(Route::Login),
        "/login" | "/pages/PageLogin" => Resolution::Page(Route::Login),
        "/home" | "/pages/PageHome" => Resolution::Page(Route::Home),
        _ => Resolution::NotFound,
    }
}
