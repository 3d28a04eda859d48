//! Account registration, login, and credential management.
//!
//! The service holds the password hasher and token issuer; persistence goes
//! through a [`CredentialStore`]. Uniqueness of username and email is
//! pre-checked here for a fast, well-named failure, but the store's unique
//! indexes remain the authoritative guarantor under concurrency: a
//! commit-time conflict surfaces as the same [`ServiceError::Conflict`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{AuthSession, NewUser, User, UserProfile};
use crate::errors::ServiceError;
use crate::password::PasswordHasher;
use crate::store::{CredentialStore, UniqueField};
use crate::token::{Claims, TokenIssuer};
use crate::validation::{validate_password, validate_registration};

pub struct IdentityService<S: CredentialStore> {
    store: Arc<S>,
    hasher: PasswordHasher,
    tokens: TokenIssuer,
}

impl<S: CredentialStore> IdentityService<S> {
    pub fn new(store: Arc<S>, hasher: PasswordHasher, tokens: TokenIssuer) -> Self {
        Self { store, hasher, tokens }
    }

    #[instrument(skip_all, fields(username = %input.username, email = %input.email))]
    pub async fn register(
        &self,
        input: NewUser,
        cancel: &CancellationToken,
    ) -> Result<UserProfile, ServiceError> {
        validate_registration(&input)?;

        if self.store.find_by_username(&input.username, cancel).await?.is_some() {
            return Err(ServiceError::Conflict { field: UniqueField::Username });
        }
        if self.store.find_by_email(&input.email, cancel).await?.is_some() {
            return Err(ServiceError::Conflict { field: UniqueField::Email });
        }

        let password_hash = self.hasher.hash(&input.password)?;
        let user = User {
            id: Uuid::new_v4(),
            username: input.username,
            email: input.email,
            password_hash,
            first_name: input.first_name,
            last_name: input.last_name,
            created_at: Utc::now(),
        };

        let mut tx = self.store.begin(cancel).await?;
        match self.store.add(&mut tx, &user, cancel).await {
            Ok(()) => {
                self.store.commit(tx).await?;
                info!(user_id = %user.id, "user registered");
                Ok(user.profile())
            }
            Err(e) => {
                if let Err(rb) = self.store.rollback(tx).await {
                    warn!(error = %rb, "rollback failed after registration error");
                }
                Err(e.into())
            }
        }
    }

    /// Authenticate and mint a bearer token. Unknown email and wrong
    /// password are indistinguishable to the caller.
    #[instrument(skip_all, fields(email = %email))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<AuthSession, ServiceError> {
        if email.trim().is_empty() {
            return Err(ServiceError::validation("email", "email is required"));
        }
        if password.is_empty() {
            return Err(ServiceError::validation("password", "password is required"));
        }

        let user = self
            .store
            .find_by_email(email, cancel)
            .await?
            .ok_or(ServiceError::Unauthorized)?;
        if !self.hasher.verify(password, &user.password_hash) {
            return Err(ServiceError::Unauthorized);
        }

        let issued = self.tokens.issue(&user.profile(), Utc::now())?;
        info!(user_id = %user.id, "login succeeded");
        Ok(AuthSession {
            token: issued.token,
            username: user.username,
            email: user.email,
            expires_at: issued.expires_at,
        })
    }

    /// Re-hash under a new password after proving knowledge of the current
    /// one. The new password passes the same policy as registration.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current: &str,
        new: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, ServiceError> {
        let mut user = self
            .store
            .get_by_id(user_id, cancel)
            .await?
            .ok_or(ServiceError::NotFound("user"))?;
        if !self.hasher.verify(current, &user.password_hash) {
            return Err(ServiceError::Unauthorized);
        }
        validate_password(new)?;

        user.password_hash = self.hasher.hash(new)?;

        let mut tx = self.store.begin(cancel).await?;
        match self.store.update(&mut tx, &user, cancel).await {
            Ok(()) => {
                self.store.commit(tx).await?;
                info!("password changed");
                Ok(true)
            }
            Err(e) => {
                if let Err(rb) = self.store.rollback(tx).await {
                    warn!(error = %rb, "rollback failed after password change error");
                }
                Err(e.into())
            }
        }
    }

    /// True iff the pair matches a stored account. Never errors on bad
    /// input; blank or unknown credentials are simply `false`.
    pub async fn validate_credentials(
        &self,
        email: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, ServiceError> {
        if email.trim().is_empty() || password.is_empty() {
            return Ok(false);
        }
        match self.store.find_by_email(email, cancel).await? {
            Some(user) => Ok(self.hasher.verify(password, &user.password_hash)),
            None => Ok(false),
        }
    }

    pub async fn get_user_by_id(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Option<UserProfile>, ServiceError> {
        Ok(self.store.get_by_id(id, cancel).await?.map(|u| u.profile()))
    }

    pub async fn get_user_by_email(
        &self,
        email: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<UserProfile>, ServiceError> {
        if email.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.store.find_by_email(email, cancel).await?.map(|u| u.profile()))
    }

    pub async fn get_user_by_username(
        &self,
        username: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<UserProfile>, ServiceError> {
        if username.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.store.find_by_username(username, cancel).await?.map(|u| u.profile()))
    }

    /// Check a bearer token against the issuer's key and clock `now`.
    pub fn validate_token(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, ServiceError> {
        Ok(self.tokens.validate(token, now)?)
    }
}
