// src/db.rs
use crate::models::{Portfolio, UserRecord};
use async_trait::async_trait;
use log::info;
use scylla::frame::response::result::Row;
use scylla::query::Query;
use scylla::transport::errors::{NewSessionError, QueryError};
use scylla::{Session, SessionBuilder};
use std::sync::Arc;
use thiserror::Error;

const USER_COLUMNS: &str = "id, email, username, full_name, password_hash";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("could not connect to ScyllaDB: {0}")]
    Connect(#[from] NewSessionError),
    #[error("query failed: {0}")]
    Query(#[from] QueryError),
    #[error("malformed row: {0}")]
    Malformed(String),
    #[error("could not (de)serialize holdings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Equality lookups over the `users` collection.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, DbError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, DbError>;
    async fn insert_user(&self, user: &UserRecord) -> Result<(), DbError>;
}

#[async_trait]
pub trait PortfolioStore: Send + Sync {
    async fn get_portfolio(&self, user_id: &str) -> Result<Option<Portfolio>, DbError>;
    async fn save_portfolio(&self, portfolio: &Portfolio) -> Result<(), DbError>;
    async fn delete_portfolio(&self, user_id: &str) -> Result<(), DbError>;
}

pub async fn init(node: &str) -> Result<Session, DbError> {
    let session = SessionBuilder::new().known_node(node).build().await?;

    session.query("CREATE KEYSPACE IF NOT EXISTS coin_tracker WITH REPLICATION = {'class': 'SimpleStrategy', 'replication_factor': 1}", &[]).await?;
    session.query("CREATE TABLE IF NOT EXISTS coin_tracker.users (id TEXT PRIMARY KEY, email TEXT, username TEXT, full_name TEXT, password_hash TEXT)", &[]).await?;
    session
        .query(
            "CREATE INDEX IF NOT EXISTS users_email_idx ON coin_tracker.users (email)",
            &[],
        )
        .await?;
    session
        .query(
            "CREATE INDEX IF NOT EXISTS users_username_idx ON coin_tracker.users (username)",
            &[],
        )
        .await?;
    session.query("CREATE TABLE IF NOT EXISTS coin_tracker.portfolios (user_id TEXT PRIMARY KEY, holdings TEXT)", &[]).await?;

    info!("Successfully connected to ScyllaDB at {}.", node);
    Ok(session)
}

#[derive(Clone)]
pub struct ScyllaStore {
    session: Arc<Session>,
}

impl ScyllaStore {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    async fn find_user_where(
        &self,
        column: &str,
        value: &str,
    ) -> Result<Option<UserRecord>, DbError> {
        let query = Query::new(format!(
            "SELECT {} FROM coin_tracker.users WHERE {} = ?",
            USER_COLUMNS, column
        ));
        let result = self.session.query(query, (value,)).await?;
        match result.rows.and_then(|rows| rows.into_iter().next()) {
            Some(row) => Ok(Some(user_from_row(&row)?)),
            None => Ok(None),
        }
    }
}

fn text_column(row: &Row, index: usize, name: &str) -> Result<String, DbError> {
    row.columns
        .get(index)
        .and_then(|column| column.as_ref())
        .and_then(|value| value.as_text())
        .cloned()
        .ok_or_else(|| DbError::Malformed(format!("missing text column {}", name)))
}

fn user_from_row(row: &Row) -> Result<UserRecord, DbError> {
    Ok(UserRecord {
        id: text_column(row, 0, "id")?,
        email: text_column(row, 1, "email")?,
        username: text_column(row, 2, "username")?,
        full_name: text_column(row, 3, "full_name")?,
        password_hash: text_column(row, 4, "password_hash")?,
    })
}

#[async_trait]
impl UserStore for ScyllaStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, DbError> {
        self.find_user_where("email", email).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, DbError> {
        self.find_user_where("username", username).await
    }

    async fn insert_user(&self, user: &UserRecord) -> Result<(), DbError> {
        let query = Query::new(
            "INSERT INTO coin_tracker.users (id, email, username, full_name, password_hash) VALUES (?, ?, ?, ?, ?)",
        );
        self.session
            .query(
                query,
                (
                    user.id.as_str(),
                    user.email.as_str(),
                    user.username.as_str(),
                    user.full_name.as_str(),
                    user.password_hash.as_str(),
                ),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PortfolioStore for ScyllaStore {
    async fn get_portfolio(&self, user_id: &str) -> Result<Option<Portfolio>, DbError> {
        let query = Query::new("SELECT holdings FROM coin_tracker.portfolios WHERE user_id = ?");
        let result = self.session.query(query, (user_id,)).await?;
        match result.rows.and_then(|rows| rows.into_iter().next()) {
            Some(row) => {
                let holdings_json = text_column(&row, 0, "holdings")?;
                Ok(Some(Portfolio {
                    user_id: user_id.to_string(),
                    holdings: serde_json::from_str(&holdings_json)?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn save_portfolio(&self, portfolio: &Portfolio) -> Result<(), DbError> {
        let holdings_json = serde_json::to_string(&portfolio.holdings)?;
        let query =
            Query::new("INSERT INTO coin_tracker.portfolios (user_id, holdings) VALUES (?, ?)");
        self.session
            .query(query, (portfolio.user_id.as_str(), holdings_json))
            .await?;
        Ok(())
    }

    async fn delete_portfolio(&self, user_id: &str) -> Result<(), DbError> {
        let query = Query::new("DELETE FROM coin_tracker.portfolios WHERE user_id = ?");
        self.session.query(query, (user_id,)).await?;
        Ok(())
    }
}

#[cfg(test)]
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-process stand-in for the ScyllaDB tables.
    #[derive(Default)]
    pub struct MemoryStore {
        users: Mutex<Vec<UserRecord>>,
        portfolios: Mutex<HashMap<String, Portfolio>>,
        fail_lookups: bool,
    }

    impl MemoryStore {
        /// Every user lookup errors, as if the cluster were unreachable.
        pub fn failing() -> Self {
            Self {
                fail_lookups: true,
                ..Self::default()
            }
        }

        fn lookup(
            &self,
            pred: impl Fn(&UserRecord) -> bool,
        ) -> Result<Option<UserRecord>, DbError> {
            if self.fail_lookups {
                return Err(DbError::Malformed("lookup disabled".into()));
            }
            Ok(self.users.lock().unwrap().iter().find(|u| pred(u)).cloned())
        }
    }

    #[async_trait]
    impl UserStore for MemoryStore {
        async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, DbError> {
            self.lookup(|u| u.email == email)
        }

        async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, DbError> {
            self.lookup(|u| u.username == username)
        }

        async fn insert_user(&self, user: &UserRecord) -> Result<(), DbError> {
            self.users.lock().unwrap().push(user.clone());
            Ok(())
        }
    }

    #[async_trait]
    impl PortfolioStore for MemoryStore {
        async fn get_portfolio(&self, user_id: &str) -> Result<Option<Portfolio>, DbError> {
            Ok(self.portfolios.lock().unwrap().get(user_id).cloned())
        }

        async fn save_portfolio(&self, portfolio: &Portfolio) -> Result<(), DbError> {
            self.portfolios
                .lock()
                .unwrap()
                .insert(portfolio.user_id.clone(), portfolio.clone());
            Ok(())
        }

        async fn delete_portfolio(&self, user_id: &str) -> Result<(), DbError> {
            self.portfolios.lock().unwrap().remove(user_id);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scylla::frame::response::result::CqlValue;

    fn row(values: &[Option<&str>]) -> Row {
        Row {
            columns: values
                .iter()
                .map(|v| v.map(|s| CqlValue::Text(s.to_string())))
                .collect(),
        }
    }

    #[test]
    fn user_row_maps_columns_in_select_order() {
        let user = user_from_row(&row(&[
            Some("u1"),
            Some("alice@example.com"),
            Some("alice"),
            Some("Alice Liddell"),
            Some("$argon2id$..."),
        ]))
        .unwrap();

        assert_eq!(user.id, "u1");
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.username, "alice");
        assert_eq!(user.full_name, "Alice Liddell");
    }

    #[test]
    fn null_column_is_reported_not_panicked() {
        let err = user_from_row(&row(&[Some("u1"), None])).unwrap_err();
        assert!(matches!(err, DbError::Malformed(msg) if msg.contains("email")));
    }
}
