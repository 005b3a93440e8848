// src/main.rs
mod api;
mod auth;
mod coin_service;
mod config;
mod db;
mod error;
mod login;
mod models;
mod router;
mod store;
mod wallet;

use crate::api::{AppState, PortfolioLocks};
use crate::auth::TokenIssuer;
use crate::coin_service::CoinService;
use crate::config::Config;
use crate::db::ScyllaStore;
use crate::login::LoginService;
use crate::store::{CoinStore, RefreshOutcome};
use env_logger::{Builder, Env};
use log::{error, info, warn};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tokio::time;

async fn refresher(store: Arc<CoinStore>, every: Duration) {
    let mut ticker = time::interval(every);
    loop {
        ticker.tick().await;
        match store.fetch_coins().await {
            RefreshOutcome::Updated { snapshot } => {
                info!("Background refresh cached {} coins.", snapshot.coins.len())
            }
            RefreshOutcome::Stale { last_known, error } => warn!(
                "Background refresh failed ({}); serving {} cached coins.",
                error,
                last_known.coins.len()
            ),
            RefreshOutcome::Superseded { .. } => {}
        }
    }
}

#[tokio::main]
async fn main() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };

    let session = match db::init(&config.scylla_node).await {
        Ok(session) => Arc::new(session),
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return;
        }
    };
    info!("Connected to database...");

    let client = match Client::builder().user_agent("coin_tracker").build() {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return;
        }
    };
    let coin_service = CoinService::new(
        client,
        config.coincap_base_url.clone(),
        config.coincap_api_key.clone(),
    );
    let coins = Arc::new(CoinStore::new(Arc::new(coin_service)));

    task::spawn(refresher(coins.clone(), config.refresh_interval));

    let store = Arc::new(ScyllaStore::new(session));
    let state = AppState {
        coins,
        login: LoginService::new(store.clone()),
        portfolios: store,
        tokens: TokenIssuer::new(&config.jwt_secret, config.token_ttl),
        portfolio_locks: PortfolioLocks::default(),
    };

    info!("Server running on http://{}", config.bind_addr);
    warp::serve(api::app(state)).run(config.bind_addr).await;
}
