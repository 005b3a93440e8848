// src/models.rs
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// One entry of the CoinCap `/v3/assets` listing, kept exactly as the
/// provider sent it. Fields are read through lenient accessors, so a record
/// with an odd shape is still cached and served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Asset(Value);

impl Asset {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    /// String fields come back as-is; numbers are rendered as text.
    fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<String> {
        self.text("id")
    }

    pub fn symbol(&self) -> Option<String> {
        self.text("symbol")
    }

    pub fn name(&self) -> Option<String> {
        self.text("name")
    }

    pub fn price(&self) -> Option<f64> {
        match self.0.get("priceUsd")? {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Matches a route parameter against the asset id or display name.
    pub fn matches(&self, coin_name: &str) -> bool {
        [self.id(), self.name()]
            .iter()
            .flatten()
            .any(|v| v.eq_ignore_ascii_case(coin_name))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetsResponse {
    pub data: Vec<Asset>,
    #[serde(default)]
    pub timestamp: Option<Value>,
}

/// Stored user document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub username: String,
    pub full_name: String,
    pub password_hash: String,
}

/// The part of a user that is safe to hand back after login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub full_name: String,
    pub username: String,
    pub email: String,
}

impl From<&UserRecord> for UserProfile {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id.clone(),
            full_name: record.full_name.clone(),
            username: record.username.clone(),
            email: record.email.clone(),
        }
    }
}

pub const INCORRECT_PASSWORD: &str = "Incorrect password";
pub const USER_NOT_FOUND: &str = "User not found";

/// Outcome of a login attempt. Serializes as
/// `{"success": true, "user": ...}` or `{"success": false, "message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginResult {
    Success(UserProfile),
    Failure(String),
}

impl LoginResult {
    pub fn success(user: UserProfile) -> Self {
        LoginResult::Success(user)
    }

    pub fn failure(message: &str) -> Self {
        LoginResult::Failure(message.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, LoginResult::Success(_))
    }

    pub fn user(&self) -> Option<&UserProfile> {
        match self {
            LoginResult::Success(user) => Some(user),
            LoginResult::Failure(_) => None,
        }
    }
}

impl Serialize for LoginResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("LoginResult", 2)?;
        state.serialize_field("success", &self.is_success())?;
        match self {
            LoginResult::Success(user) => state.serialize_field("user", user)?,
            LoginResult::Failure(message) => state.serialize_field("message", message)?,
        }
        state.end()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvestRequest {
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub coin_id: String,
    pub symbol: Option<String>,
    pub quantity: f64,
    pub buy_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub user_id: String,
    pub holdings: Vec<Holding>,
}

impl Portfolio {
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            holdings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn asset_keeps_unknown_provider_fields() {
        let raw = json!({
            "id": "bitcoin",
            "rank": "1",
            "symbol": "BTC",
            "name": "Bitcoin",
            "priceUsd": "64000.12",
            "marketCapUsd": "1250000000000",
            "explorer": "https://blockchain.info/"
        });

        let asset: Asset = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(asset.price(), Some(64000.12));
        assert_eq!(serde_json::to_value(&asset).unwrap(), raw);
    }

    #[test]
    fn asset_matches_id_or_name_ignoring_case() {
        let asset: Asset =
            serde_json::from_value(json!({"id": "usd-coin", "name": "USDC"})).unwrap();
        assert!(asset.matches("USD-COIN"));
        assert!(asset.matches("usdc"));
        assert!(!asset.matches("tether"));
    }

    #[test]
    fn odd_records_do_not_spoil_the_listing() {
        let body = r#"{
            "data": [
                {"id": "bitcoin", "rank": "1", "priceUsd": "64000.1"},
                {"id": "ethereum", "rank": 2, "priceUsd": 3100.5},
                {"symbol": "???", "rank": null},
                {"id": 7, "name": "Seven"}
            ],
            "timestamp": 1718000000000.5
        }"#;

        let response: AssetsResponse = serde_json::from_str(body).unwrap();

        assert_eq!(response.data.len(), 4);
        assert_eq!(response.data[1].price(), Some(3100.5));
        assert_eq!(response.data[2].id(), None);
        assert_eq!(response.data[2].symbol().as_deref(), Some("???"));
        assert_eq!(response.data[3].id().as_deref(), Some("7"));
        assert!(response.data[3].matches("seven"));
        assert_eq!(
            serde_json::to_value(&response.data[2]).unwrap(),
            json!({"symbol": "???", "rank": null})
        );
    }

    #[test]
    fn non_object_record_is_kept_verbatim() {
        let asset: Asset = serde_json::from_value(json!("delisted")).unwrap();
        assert_eq!(asset.raw(), &json!("delisted"));
        assert_eq!(asset.id(), None);
        assert!(!asset.matches("delisted"));
    }

    #[test]
    fn success_flag_follows_the_variant() {
        let err = LoginResult::failure(INCORRECT_PASSWORD);
        assert!(!err.is_success());
        assert_eq!(serde_json::to_value(&err).unwrap()["success"], false);
    }

    #[test]
    fn login_results_serialize_to_the_documented_shapes() {
        let ok = LoginResult::success(UserProfile {
            id: "u1".into(),
            full_name: "Alice Liddell".into(),
            username: "alice".into(),
            email: "alice@example.com".into(),
        });
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({
                "success": true,
                "user": {
                    "id": "u1",
                    "fullName": "Alice Liddell",
                    "username": "alice",
                    "email": "alice@example.com"
                }
            })
        );

        let err = LoginResult::failure(USER_NOT_FOUND);
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"success": false, "message": "User not found"})
        );
    }
}
