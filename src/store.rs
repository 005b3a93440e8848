// src/store.rs
use crate::coin_service::PriceSource;
use crate::models::Asset;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

pub const TOP_N: usize = 50;

/// What the cache currently holds.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinSnapshot {
    pub coins: Vec<Asset>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl CoinSnapshot {
    pub fn find(&self, coin_name: &str) -> Option<&Asset> {
        self.coins.iter().find(|a| a.matches(coin_name))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RefreshOutcome {
    Updated {
        snapshot: CoinSnapshot,
    },
    #[serde(rename_all = "camelCase")]
    Stale {
        last_known: CoinSnapshot,
        error: String,
    },
    #[serde(rename_all = "camelCase")]
    Superseded {
        last_known: CoinSnapshot,
    },
}

/// In-memory top-50 price cache.
///
/// Refreshes are numbered as they are issued. Only the response belonging
/// to the most recently issued refresh is allowed to overwrite the cache.
pub struct CoinStore {
    source: Arc<dyn PriceSource>,
    snapshot: RwLock<CoinSnapshot>,
    issued: AtomicU64,
}

impl CoinStore {
    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self {
            source,
            snapshot: RwLock::new(CoinSnapshot::default()),
            issued: AtomicU64::new(0),
        }
    }

    pub async fn coin_data_top50(&self) -> CoinSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn fetch_coins(&self) -> RefreshOutcome {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;

        match self.source.fetch_assets().await {
            Ok(mut assets) => {
                assets.truncate(TOP_N);
                let mut current = self.snapshot.write().await;
                // Checked under the write lock so two responses cannot both pass.
                if self.issued.load(Ordering::SeqCst) != seq {
                    info!("Discarding coin refresh #{} in favour of a newer one.", seq);
                    return RefreshOutcome::Superseded {
                        last_known: current.clone(),
                    };
                }
                *current = CoinSnapshot {
                    coins: assets,
                    fetched_at: Some(Utc::now()),
                };
                info!("Coin cache refreshed with {} entries.", current.coins.len());
                RefreshOutcome::Updated {
                    snapshot: current.clone(),
                }
            }
            Err(e) => {
                warn!("Error fetching coins: {}", e);
                RefreshOutcome::Stale {
                    last_known: self.coin_data_top50().await,
                    error: e.to_string(),
                }
            }
        }
    }
}
