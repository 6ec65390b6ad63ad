//! Identity provider seam.
//!
//! The provider issues [`Identity`] values, holds the current session and publishes every
//! transition (sign-in, sign-out, registration) on a watch channel. Profile documents are not
//! its concern; the reconciler owns those.

mod crypto;
mod memory;

pub use memory::{InMemoryIdentityProvider, PasswordResetNotice, ProviderSettings};

use crate::error::AuthError;
use crate::models::Identity;
use async_trait::async_trait;
use tokio::sync::watch;

pub type AuthResult<T> = std::result::Result<T, AuthError>;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authenticate and make the account the current identity.
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Identity>;

    /// Create an account and sign it in.
    async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> AuthResult<Identity>;

    /// Clear the current identity. Signing out while signed out is a no-op.
    async fn sign_out(&self) -> AuthResult<()>;

    async fn send_password_reset(&self, email: &str) -> AuthResult<()>;

    /// The identity currently signed in, if any.
    fn current(&self) -> Option<Identity>;

    /// Receiver of identity transitions. The initial value is the current identity.
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;
}
