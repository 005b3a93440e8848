// src/login.rs
use crate::auth::{hash_password, verify_password, AuthError};
use crate::db::{DbError, UserStore};
use crate::models::{
    LoginResult, NewUser, UserProfile, UserRecord, INCORRECT_PASSWORD, USER_NOT_FOUND,
};
use log::{error, info};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{0} is already taken")]
    Taken(&'static str),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[derive(Clone)]
pub struct LoginService {
    users: Arc<dyn UserStore>,
}

impl LoginService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Email first, then username. The username lookup only runs when the
    /// email lookup found nothing. Lookup errors count as "no match".
    /// The identifier is trimmed the same way registration trims it.
    pub async fn login_user(&self, identifier: &str, password: &str) -> LoginResult {
        let identifier = identifier.trim();
        let mut found = self.users.find_by_email(identifier).await.unwrap_or_else(|e| {
            error!("User lookup by email failed: {}", e);
            None
        });

        if found.is_none() {
            found = self
                .users
                .find_by_username(identifier)
                .await
                .unwrap_or_else(|e| {
                    error!("User lookup by username failed: {}", e);
                    None
                });
        }

        match found {
            Some(user) if verify_password(password, &user.password_hash) => {
                info!("User {} logged in.", user.id);
                LoginResult::success(UserProfile::from(&user))
            }
            Some(_) => LoginResult::failure(INCORRECT_PASSWORD),
            None => LoginResult::failure(USER_NOT_FOUND),
        }
    }

    /// Emails and usernames share one namespace: neither may collide with
    /// an existing email or username.
    pub async fn register_user(&self, new_user: NewUser) -> Result<UserProfile, RegisterError> {
        let full_name = required(&new_user.full_name, "fullName")?;
        let username = required(&new_user.username, "username")?;
        let email = required(&new_user.email, "email")?;
        if new_user.password.is_empty() {
            return Err(RegisterError::Missing("password"));
        }

        for (value, field) in [(email, "email"), (username, "username")] {
            if self.users.find_by_email(value).await?.is_some()
                || self.users.find_by_username(value).await?.is_some()
            {
                return Err(RegisterError::Taken(field));
            }
        }

        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            username: username.to_string(),
            full_name: full_name.to_string(),
            password_hash: hash_password(&new_user.password)?,
        };
        self.users.insert_user(&record).await?;
        info!("Registered user {}.", record.id);
        Ok(UserProfile::from(&record))
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, RegisterError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(RegisterError::Missing(field))
    } else {
        Ok(trimmed)
    }
}
