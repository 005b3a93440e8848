// src/router.rs
use serde::Serialize;
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum View {
    Home,
    Login,
    Register,
    Invest,
    Wallet,
    Portfolio,
}

/// The page table. `:name` segments capture one path segment.
pub const ROUTES: [(&str, View); 6] = [
    ("/", View::Home),
    ("/login", View::Login),
    ("/register", View::Register),
    ("/invest/:coinName", View::Invest),
    ("/wallet", View::Wallet),
    ("/portfolio", View::Portfolio),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Register,
    Invest { coin_name: String },
    Wallet,
    Portfolio,
}

impl Route {
    /// Matches `path` against [`ROUTES`]. There is no fallback entry, so
    /// unknown paths give `None`.
    pub fn resolve(path: &str) -> Option<Route> {
        ROUTES.iter().find_map(|(pattern, view)| {
            let params = match_pattern(pattern, path)?;
            Some(match view {
                View::Home => Route::Home,
                View::Login => Route::Login,
                View::Register => Route::Register,
                View::Invest => Route::Invest {
                    coin_name: params.into_iter().next()?,
                },
                View::Wallet => Route::Wallet,
                View::Portfolio => Route::Portfolio,
            })
        })
    }

    pub fn view(&self) -> View {
        match self {
            Route::Home => View::Home,
            Route::Login => View::Login,
            Route::Register => View::Register,
            Route::Invest { .. } => View::Invest,
            Route::Wallet => View::Wallet,
            Route::Portfolio => View::Portfolio,
        }
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn match_pattern(pattern: &str, path: &str) -> Option<Vec<String>> {
    let mut wanted = segments(pattern);
    let mut given = segments(path);
    let mut params = Vec::new();

    loop {
        match (wanted.next(), given.next()) {
            (None, None) => return Some(params),
            (Some(w), Some(g)) if w.starts_with(':') => params.push(decode_segment(g)?),
            (Some(w), Some(g)) if w == g => {}
            _ => return None,
        }
    }
}

/// Decodes one captured path segment. Invalid UTF-8 after decoding fails.
pub(crate) fn decode_segment(segment: &str) -> Option<String> {
    urlencoding::decode(segment).ok().map(Cow::into_owned)
}
