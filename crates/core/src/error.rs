use std::sync::Arc;

/// Failures reported by a [`DocumentStore`](crate::store::DocumentStore).
///
/// Cloneable so that one reconciliation outcome can be handed to every caller waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("invalid document key: {0}")]
    InvalidKey(String),
    #[error("document store I/O failed: {0}")]
    Io(#[source] Arc<std::io::Error>),
    #[error("failed to serialize document: {0}")]
    Serialization(#[source] Arc<serde_json::Error>),
    #[error("failed to deserialize document {path}: {source}")]
    Deserialization {
        path: String,
        #[source]
        source: Arc<serde_json::Error>,
    },
    #[error("stored document {0} is not a JSON object")]
    NotAnObject(String),
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(Arc::new(err))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures reported by an [`IdentityProvider`](crate::identity::IdentityProvider).
///
/// The variants are the closed set of credential errors the UI knows how to phrase.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("no account exists for this email")]
    UserNotFound,
    #[error("wrong password")]
    WrongPassword,
    #[error("malformed email address")]
    InvalidEmail,
    #[error("account is disabled")]
    UserDisabled,
    #[error("too many failed sign-in attempts")]
    TooManyRequests,
    #[error("email already registered")]
    EmailAlreadyInUse,
    #[error("email/password sign-up is disabled")]
    OperationNotAllowed,
    #[error("password is too weak")]
    WeakPassword,
    #[error("identity provider failure: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable error code in the `auth/<kind>` form used by hosted identity services.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::UserNotFound => "auth/user-not-found",
            AuthError::WrongPassword => "auth/wrong-password",
            AuthError::InvalidEmail => "auth/invalid-email",
            AuthError::UserDisabled => "auth/user-disabled",
            AuthError::TooManyRequests => "auth/too-many-requests",
            AuthError::EmailAlreadyInUse => "auth/email-already-in-use",
            AuthError::OperationNotAllowed => "auth/operation-not-allowed",
            AuthError::WeakPassword => "auth/weak-password",
            AuthError::Internal(_) => "auth/internal-error",
        }
    }

    /// Message shown on the login screen.
    pub fn login_message(&self) -> &'static str {
        match self {
            AuthError::UserNotFound => "No account found with this email. Please register first.",
            AuthError::WrongPassword => "Incorrect password. Please try again.",
            AuthError::InvalidEmail => "Invalid email address.",
            AuthError::UserDisabled => "This account has been disabled. Please contact support.",
            AuthError::TooManyRequests => "Too many failed attempts. Please try again later.",
            _ => LOGIN_FALLBACK_MESSAGE,
        }
    }

    /// Message shown on the registration screen.
    pub fn registration_message(&self) -> &'static str {
        match self {
            AuthError::EmailAlreadyInUse => {
                "This email is already registered. Please use a different email or try logging in."
            }
            AuthError::InvalidEmail => "Please enter a valid email address.",
            AuthError::OperationNotAllowed => {
                "Email/Password sign up is not enabled. Please contact support."
            }
            AuthError::WeakPassword => "Password should be at least 6 characters long.",
            _ => REGISTRATION_FALLBACK_MESSAGE,
        }
    }
}

pub const LOGIN_FALLBACK_MESSAGE: &str = "An error occurred during login. Please try again.";
pub const REGISTRATION_FALLBACK_MESSAGE: &str =
    "An error occurred during registration. Please try again.";

/// Reconciliation failure. Writes committed before the failure are not rolled back.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProfileError {
    #[error("profile reconciliation failed: {0}")]
    Store(#[from] StoreError),
}

pub type ProfileResult<T> = std::result::Result<T, ProfileError>;

/// Terminal display states of the patient dashboard other than "ready".
#[derive(Debug, Clone, thiserror::Error)]
pub enum DashboardError {
    #[error("No patient data found")]
    NoPatientData,
    #[error("Unauthorized access")]
    Unauthorized,
    #[error("Error fetching patient data")]
    Fetch(#[source] StoreError),
}

/// Account flow failures, each carrying the message the caller should display.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AccountError {
    #[error("sign-in failed: {0}")]
    SignIn(#[source] AuthError),
    #[error("registration failed: {0}")]
    Registration(#[source] AuthError),
    #[error("password reset failed: {0}")]
    PasswordReset(#[source] AuthError),
    #[error("profile setup failed after sign-in: {0}")]
    LoginProfile(#[source] ProfileError),
    #[error("profile setup failed after registration: {0}")]
    RegistrationProfile(#[source] ProfileError),
}

impl AccountError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AccountError::SignIn(e) | AccountError::PasswordReset(e) => e.login_message(),
            AccountError::Registration(e) => e.registration_message(),
            AccountError::LoginProfile(_) => LOGIN_FALLBACK_MESSAGE,
            AccountError::RegistrationProfile(_) => REGISTRATION_FALLBACK_MESSAGE,
        }
    }
}

/// Startup configuration problems.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
