// src/coin_service.rs
use crate::models::{Asset, AssetsResponse};
use async_trait::async_trait;
use log::info;
use reqwest::Client;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider answered HTTP {0}")]
    Status(reqwest::StatusCode),
}

/// Anything that can hand back the current asset listing.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_assets(&self) -> Result<Vec<Asset>, FetchError>;
}

/// Thin client over the CoinCap REST API.
#[derive(Clone)]
pub struct CoinService {
    client: Client,
    base_url: String,
    api_key: String,
}

impl CoinService {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn assets_url(&self) -> String {
        format!("{}/v3/assets", self.base_url)
    }

    /// One `GET /v3/assets`. The whole listing comes back; slicing is the
    /// caller's business.
    pub async fn get_coins(&self) -> Result<AssetsResponse, FetchError> {
        let response = self
            .client
            .get(self.assets_url())
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        let body = response.json::<AssetsResponse>().await?;
        info!(
            "Fetched {} assets from provider (timestamp {:?}).",
            body.data.len(),
            body.timestamp
        );
        Ok(body)
    }
}

#[async_trait]
impl PriceSource for CoinService {
    async fn fetch_assets(&self) -> Result<Vec<Asset>, FetchError> {
        Ok(self.get_coins().await?.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use warp::Filter;

    #[test]
    fn assets_url_joins_base_and_path() {
        let service = CoinService::new(Client::new(), "https://rest.coincap.io", "secret");
        assert_eq!(service.assets_url(), "https://rest.coincap.io/v3/assets");
    }

    #[test]
    fn provider_payload_decodes() {
        let body = r#"{
            "data": [
                {"id": "bitcoin", "rank": "1", "symbol": "BTC", "name": "Bitcoin", "priceUsd": "64000.1"},
                {"id": "ethereum", "rank": "2", "symbol": "ETH", "name": "Ethereum", "priceUsd": "3100.5"}
            ],
            "timestamp": 1718000000000
        }"#;

        let response: AssetsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.data.len(), 2);
        assert_eq!(response.data[1].symbol().as_deref(), Some("ETH"));
        assert_eq!(response.timestamp, Some(serde_json::json!(1718000000000u64)));
    }

    /// Serves `/v3/assets` on an ephemeral port, answering with `status`
    /// and recording the `apiKey` query value it was called with.
    async fn stub_provider(
        status: warp::http::StatusCode,
    ) -> (String, Arc<Mutex<Option<String>>>) {
        let seen = Arc::new(Mutex::new(None));
        let recorder = seen.clone();
        let route = warp::path!("v3" / "assets")
            .and(warp::query::<HashMap<String, String>>())
            .map(move |query: HashMap<String, String>| {
                *recorder.lock().unwrap() = query.get("apiKey").cloned();
                let body = json!({
                    "data": [
                        {"id": "bitcoin", "rank": "1", "symbol": "BTC", "priceUsd": "64000.1"},
                        {"id": "ethereum", "rank": 2, "symbol": "ETH"}
                    ],
                    "timestamp": 1718000000000u64
                });
                warp::reply::with_status(warp::reply::json(&body), status)
            });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        (format!("http://{}", addr), seen)
    }

    #[tokio::test]
    async fn sends_api_key_and_decodes_listing() {
        let (base_url, seen) = stub_provider(warp::http::StatusCode::OK).await;
        let service = CoinService::new(Client::new(), base_url, "secret key");

        let response = service.get_coins().await.unwrap();

        assert_eq!(seen.lock().unwrap().as_deref(), Some("secret key"));
        assert_eq!(response.data.len(), 2);
        assert_eq!(response.data[0].id().as_deref(), Some("bitcoin"));
        assert_eq!(response.data[1].symbol().as_deref(), Some("ETH"));
    }

    #[tokio::test]
    async fn non_success_status_surfaces_as_status_error() {
        let (base_url, seen) = stub_provider(warp::http::StatusCode::TOO_MANY_REQUESTS).await;
        let service = CoinService::new(Client::new(), base_url, "secret");

        let err = service.fetch_assets().await.unwrap_err();

        assert!(matches!(err, FetchError::Status(s) if s == reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert_eq!(seen.lock().unwrap().as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn unreachable_provider_surfaces_transport_error() {
        let service = CoinService::new(Client::new(), "http://127.0.0.1:1", "secret");
        let err = service.get_coins().await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }
}
