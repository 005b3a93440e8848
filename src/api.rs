// src/api.rs
use crate::auth::TokenIssuer;
use crate::db::PortfolioStore;
use crate::error::{handle_rejection, reject, CustomError};
use crate::login::{LoginService, RegisterError};
use crate::models::{Holding, InvestRequest, LoginRequest, LoginResult, NewUser, Portfolio};
use crate::router::{decode_segment, Route};
use crate::store::CoinStore;
use crate::wallet::valuate;
use log::{error, info};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use warp::http::StatusCode;
use warp::path::FullPath;
use warp::{Filter, Rejection, Reply};

const JSON_BODY_LIMIT: u64 = 16 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub coins: Arc<CoinStore>,
    pub login: LoginService,
    pub portfolios: Arc<dyn PortfolioStore>,
    pub tokens: TokenIssuer,
    pub portfolio_locks: PortfolioLocks,
}

/// One async lock per user. Held across a portfolio read-modify-write so
/// concurrent updates for the same user apply one after the other.
#[derive(Clone, Default)]
pub struct PortfolioLocks(Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>);

impl PortfolioLocks {
    pub async fn lock(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.0.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(user_id.to_string()).or_default().clone()
        };
        slot.lock_owned().await
    }
}

#[derive(Serialize)]
struct LoginResponse {
    #[serde(flatten)]
    result: LoginResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
}

/// Every route, with rejections rendered as JSON.
pub fn app(state: AppState) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    routes(state).recover(handle_rejection)
}

pub fn routes(state: AppState) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let login = warp::path!("api" / "login")
        .and(warp::post())
        .and(json_body::<LoginRequest>())
        .and(with_state(state.clone()))
        .and_then(login_handler);

    let register = warp::path!("api" / "register")
        .and(warp::post())
        .and(json_body::<NewUser>())
        .and(with_state(state.clone()))
        .and_then(register_handler);

    let refresh = warp::path!("api" / "coins" / "refresh")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and_then(refresh_handler);

    let invest = warp::path!("api" / "invest" / String)
        .and(warp::post())
        .and(with_user(state.tokens.clone()))
        .and(json_body::<InvestRequest>())
        .and(with_state(state.clone()))
        .and_then(invest_handler);

    let delete = warp::path!("api" / "portfolio")
        .and(warp::delete())
        .and(with_user(state.tokens.clone()))
        .and(with_state(state.clone()))
        .and_then(delete_portfolio_handler);

    let pages = warp::get()
        .and(warp::path::full())
        .and(warp::header::optional::<String>("authorization"))
        .and(with_state(state))
        .and_then(page_handler);

    login
        .or(register)
        .or(refresh)
        .or(invest)
        .or(delete)
        .or(pages)
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(JSON_BODY_LIMIT).and(warp::body::json())
}

fn with_user(tokens: TokenIssuer) -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::header::<String>("authorization").and_then(move |header: String| {
        let tokens = tokens.clone();
        async move { authenticate(&tokens, &header).map_err(reject) }
    })
}

fn authenticate(tokens: &TokenIssuer, header: &str) -> Result<String, CustomError> {
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| CustomError::unauthorized("Expected a bearer token"))?;
    tokens
        .verify_token(token.trim())
        .map_err(|_| CustomError::unauthorized("Invalid or expired token"))
}

async fn login_handler(body: LoginRequest, state: AppState) -> Result<impl Reply, Rejection> {
    let result = state.login.login_user(&body.identifier, &body.password).await;
    let token = match result.user() {
        Some(user) => Some(state.tokens.create_token(&user.id).map_err(|e| {
            error!("Failed to issue token: {}", e);
            reject(CustomError::internal(e))
        })?),
        None => None,
    };
    let status = if result.is_success() {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    };
    Ok(warp::reply::with_status(
        warp::reply::json(&LoginResponse { result, token }),
        status,
    ))
}

async fn register_handler(body: NewUser, state: AppState) -> Result<impl Reply, Rejection> {
    match state.login.register_user(body).await {
        Ok(profile) => Ok(warp::reply::with_status(
            warp::reply::json(&profile),
            StatusCode::CREATED,
        )),
        Err(e) => {
            let status = match e {
                RegisterError::Missing(_) => StatusCode::BAD_REQUEST,
                RegisterError::Taken(_) => StatusCode::CONFLICT,
                RegisterError::Db(_) | RegisterError::Auth(_) => {
                    error!("Failed to register user: {}", e);
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            Err(reject(CustomError::new(status, e.to_string())))
        }
    }
}

async fn refresh_handler(state: AppState) -> Result<impl Reply, Rejection> {
    let outcome = state.coins.fetch_coins().await;
    Ok(warp::reply::json(&outcome))
}

async fn load_portfolio(state: &AppState, user_id: &str) -> Result<Portfolio, Rejection> {
    match state.portfolios.get_portfolio(user_id).await {
        Ok(found) => Ok(found.unwrap_or_else(|| Portfolio::empty(user_id))),
        Err(e) => {
            error!("Failed to retrieve portfolio: {}", e);
            Err(reject(CustomError::internal(e)))
        }
    }
}

async fn invest_handler(
    coin_name: String,
    user_id: String,
    body: InvestRequest,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    if !(body.quantity.is_finite() && body.quantity > 0.0) {
        return Err(reject(CustomError::new(
            StatusCode::BAD_REQUEST,
            "quantity must be a positive number",
        )));
    }
    let coin_name = decode_segment(&coin_name).unwrap_or(coin_name);

    let snapshot = state.coins.coin_data_top50().await;
    let asset = snapshot
        .find(&coin_name)
        .ok_or_else(|| reject(CustomError::not_found("Coin not found")))?;
    let unpriced = || {
        reject(CustomError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "No price available for this coin",
        ))
    };
    let coin_id = asset.id().ok_or_else(unpriced)?;
    let price = asset.price().ok_or_else(unpriced)?;

    let _guard = state.portfolio_locks.lock(&user_id).await;
    let mut portfolio = load_portfolio(&state, &user_id).await?;
    portfolio.holdings.push(Holding {
        coin_id: coin_id.clone(),
        symbol: asset.symbol(),
        quantity: body.quantity,
        buy_price: price,
    });

    match state.portfolios.save_portfolio(&portfolio).await {
        Ok(_) => {
            info!("User {} invested in {}.", user_id, coin_id);
            Ok(warp::reply::with_status(
                warp::reply::json(&portfolio),
                StatusCode::CREATED,
            ))
        }
        Err(e) => {
            error!("Failed to save portfolio: {}", e);
            Err(reject(CustomError::internal(e)))
        }
    }
}

async fn delete_portfolio_handler(
    user_id: String,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let _guard = state.portfolio_locks.lock(&user_id).await;
    match state.portfolios.delete_portfolio(&user_id).await {
        Ok(_) => {
            info!("Portfolio deleted for {}.", user_id);
            Ok(warp::reply::with_status("Portfolio deleted", StatusCode::OK))
        }
        Err(e) => {
            error!("Failed to delete portfolio: {}", e);
            Err(reject(CustomError::internal(e)))
        }
    }
}

fn require_user(state: &AppState, header: Option<String>) -> Result<String, Rejection> {
    let header = header.ok_or_else(|| reject(CustomError::unauthorized("Login required")))?;
    authenticate(&state.tokens, &header).map_err(reject)
}

/// Renders the page table entries as JSON view models.
async fn page_handler(
    path: FullPath,
    authorization: Option<String>,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let route = Route::resolve(path.as_str()).ok_or_else(warp::reject::not_found)?;
    let view = route.view();

    let body = match route {
        Route::Home => json!({
            "view": view,
            "coins": state.coins.coin_data_top50().await,
        }),
        Route::Login => json!({
            "view": view,
            "fields": ["identifier", "password"],
        }),
        Route::Register => json!({
            "view": view,
            "fields": ["fullName", "username", "email", "password"],
        }),
        Route::Invest { coin_name } => {
            let snapshot = state.coins.coin_data_top50().await;
            let coin = snapshot
                .find(&coin_name)
                .ok_or_else(|| reject(CustomError::not_found("Coin not found")))?;
            json!({ "view": view, "coin": coin })
        }
        Route::Wallet => {
            let user_id = require_user(&state, authorization)?;
            let portfolio = load_portfolio(&state, &user_id).await?;
            let snapshot = state.coins.coin_data_top50().await;
            json!({ "view": view, "wallet": valuate(&portfolio, &snapshot.coins) })
        }
        Route::Portfolio => {
            let user_id = require_user(&state, authorization)?;
            let portfolio = load_portfolio(&state, &user_id).await?;
            json!({ "view": view, "portfolio": portfolio })
        }
    };

    Ok(warp::reply::json(&body))
}
