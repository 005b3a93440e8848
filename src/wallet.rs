// src/wallet.rs
use crate::models::{Asset, Holding, Portfolio};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletLine {
    pub coin_id: String,
    pub symbol: Option<String>,
    pub quantity: f64,
    pub buy_price: f64,
    pub cost_basis: f64,
    pub current_price: Option<f64>,
    pub market_value: Option<f64>,
    pub profit_loss: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub user_id: String,
    pub lines: Vec<WalletLine>,
    pub total_cost: f64,
    /// Sum over the lines that have a cached price.
    pub total_market_value: f64,
    pub unpriced: usize,
}

fn line(holding: &Holding, prices: &[Asset]) -> WalletLine {
    let cost_basis = holding.quantity * holding.buy_price;
    let current_price = prices
        .iter()
        .find(|a| a.id().as_deref() == Some(holding.coin_id.as_str()))
        .and_then(Asset::price);
    let market_value = current_price.map(|p| p * holding.quantity);

    WalletLine {
        coin_id: holding.coin_id.clone(),
        symbol: holding.symbol.clone(),
        quantity: holding.quantity,
        buy_price: holding.buy_price,
        cost_basis,
        current_price,
        market_value,
        profit_loss: market_value.map(|v| v - cost_basis),
    }
}

/// Values a portfolio against the cached prices.
pub fn valuate(portfolio: &Portfolio, prices: &[Asset]) -> Wallet {
    let lines: Vec<WalletLine> = portfolio.holdings.iter().map(|h| line(h, prices)).collect();

    Wallet {
        user_id: portfolio.user_id.clone(),
        total_cost: lines.iter().map(|l| l.cost_basis).sum(),
        total_market_value: lines.iter().filter_map(|l| l.market_value).sum(),
        unpriced: lines.iter().filter(|l| l.current_price.is_none()).count(),
        lines,
    }
}
