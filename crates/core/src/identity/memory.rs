//! In-process identity provider.
//!
//! Accounts are keyed by normalised email and hold a bcrypt hash, never the password. The
//! provider models a single client session: one current identity, published to subscribers
//! on every transition.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use femcare_types::{EmailAddress, NonEmptyText};
use tokio::sync::{watch, Mutex, RwLock};

use super::crypto::{generate_uid, hash_password, verify_password};
use super::{AuthResult, IdentityProvider};
use crate::config::CoreConfig;
use crate::constants::{DEFAULT_BCRYPT_COST, DEFAULT_MAX_FAILED_SIGN_INS, MIN_PASSWORD_LEN};
use crate::error::AuthError;
use crate::models::Identity;

/// Tunables for [`InMemoryIdentityProvider`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProviderSettings {
    pub bcrypt_cost: u32,
    /// Consecutive wrong passwords after which sign-in is refused with `TooManyRequests`.
    pub max_failed_sign_ins: u32,
    pub sign_up_enabled: bool,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            max_failed_sign_ins: DEFAULT_MAX_FAILED_SIGN_INS,
            sign_up_enabled: true,
        }
    }
}

impl ProviderSettings {
    pub fn from_config(cfg: &CoreConfig) -> Self {
        Self {
            bcrypt_cost: cfg.bcrypt_cost(),
            max_failed_sign_ins: cfg.max_failed_sign_ins(),
            sign_up_enabled: true,
        }
    }
}

/// A password reset request recorded instead of sending mail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordResetNotice {
    pub uid: String,
    pub email: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
struct Account {
    uid: String,
    email: EmailAddress,
    password_hash: String,
    display_name: Option<String>,
    disabled: bool,
    failed_sign_ins: u32,
}

impl Account {
    fn identity(&self) -> Identity {
        Identity {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

#[derive(Debug)]
pub struct InMemoryIdentityProvider {
    settings: ProviderSettings,
    accounts: RwLock<HashMap<String, Account>>,
    current: watch::Sender<Option<Identity>>,
    reset_outbox: Mutex<Vec<PasswordResetNotice>>,
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new(ProviderSettings::default())
    }
}

impl InMemoryIdentityProvider {
    pub fn new(settings: ProviderSettings) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            settings,
            accounts: RwLock::new(HashMap::new()),
            current,
            reset_outbox: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(cfg: &CoreConfig) -> Self {
        Self::new(ProviderSettings::from_config(cfg))
    }

    pub fn settings(&self) -> ProviderSettings {
        self.settings
    }

    /// Disable an account. A disabled account that is currently signed in is signed out.
    pub async fn disable_account(&self, email: &str) -> AuthResult<()> {
        let email = parse_email(email)?;
        let uid = {
            let mut accounts = self.accounts.write().await;
            let account = accounts
                .get_mut(email.as_str())
                .ok_or(AuthError::UserNotFound)?;
            account.disabled = true;
            account.uid.clone()
        };

        self.current.send_if_modified(|current| {
            if current.as_ref().is_some_and(|id| id.uid == uid) {
                *current = None;
                true
            } else {
                false
            }
        });

        tracing::info!(uid = %uid, "account disabled");
        Ok(())
    }

    /// Password reset notices recorded so far, oldest first.
    pub async fn reset_outbox(&self) -> Vec<PasswordResetNotice> {
        self.reset_outbox.lock().await.clone()
    }

    fn publish(&self, identity: Option<Identity>) {
        self.current.send_replace(identity);
    }
}

fn parse_email(raw: &str) -> AuthResult<EmailAddress> {
    EmailAddress::parse(raw).map_err(|_| AuthError::InvalidEmail)
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Identity> {
        let email = parse_email(email)?;

        let account = self
            .accounts
            .read()
            .await
            .get(email.as_str())
            .cloned()
            .ok_or(AuthError::UserNotFound)?;

        if account.disabled {
            return Err(AuthError::UserDisabled);
        }
        if account.failed_sign_ins >= self.settings.max_failed_sign_ins {
            tracing::warn!(uid = %account.uid, "sign-in refused after repeated failures");
            return Err(AuthError::TooManyRequests);
        }

        let verified = verify_password(password, &account.password_hash).await?;

        let mut accounts = self.accounts.write().await;
        let Some(stored) = accounts.get_mut(email.as_str()) else {
            return Err(AuthError::UserNotFound);
        };

        if !verified {
            stored.failed_sign_ins = stored.failed_sign_ins.saturating_add(1);
            tracing::warn!(
                uid = %stored.uid,
                failed_sign_ins = stored.failed_sign_ins,
                "wrong password"
            );
            return Err(AuthError::WrongPassword);
        }

        stored.failed_sign_ins = 0;
        let identity = stored.identity();
        drop(accounts);

        tracing::info!(uid = %identity.uid, "signed in");
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> AuthResult<Identity> {
        let email = parse_email(email)?;

        if !self.settings.sign_up_enabled {
            return Err(AuthError::OperationNotAllowed);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }
        if self.accounts.read().await.contains_key(email.as_str()) {
            return Err(AuthError::EmailAlreadyInUse);
        }

        let password_hash = hash_password(password, self.settings.bcrypt_cost).await?;

        let account = Account {
            uid: generate_uid(),
            email: email.clone(),
            password_hash,
            display_name: display_name
                .and_then(|name| NonEmptyText::new(name).ok())
                .map(NonEmptyText::into_string),
            disabled: false,
            failed_sign_ins: 0,
        };
        let identity = account.identity();

        {
            let mut accounts = self.accounts.write().await;
            if accounts.contains_key(email.as_str()) {
                return Err(AuthError::EmailAlreadyInUse);
            }
            accounts.insert(email.as_str().to_owned(), account);
        }

        tracing::info!(uid = %identity.uid, "account registered");
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let previous = self.current.send_replace(None);
        if let Some(identity) = previous {
            tracing::info!(uid = %identity.uid, "signed out");
        }
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> AuthResult<()> {
        let email = parse_email(email)?;

        let uid = self
            .accounts
            .read()
            .await
            .get(email.as_str())
            .map(|account| account.uid.clone())
            .ok_or(AuthError::UserNotFound)?;

        self.reset_outbox.lock().await.push(PasswordResetNotice {
            uid: uid.clone(),
            email: email.as_str().to_owned(),
            requested_at: Utc::now(),
        });

        tracing::info!(uid = %uid, "password reset requested");
        Ok(())
    }

    fn current(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }
}
