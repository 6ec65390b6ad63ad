//! Login, registration, sign-out and password reset.
//!
//! These flows sit in front of the identity provider and make sure profile documents exist
//! before a caller is sent to a dashboard.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::constants::{fields, PATIENTS_COLLECTION, USERS_COLLECTION};
use crate::error::{AccountError, ProfileError};
use crate::identity::{AuthResult, IdentityProvider};
use crate::models::{Role, UserView};
use crate::reconcile::ProfileReconciler;
use crate::store::{DocumentStore, FieldValue, Fields, SetOptions, WriteBatch};

/// Where a caller goes after signing in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Destination {
    PatientDashboard,
    DoctorDashboard,
}

impl Destination {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Doctor => Destination::DoctorDashboard,
            Role::Patient => Destination::PatientDashboard,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Destination::PatientDashboard => "/patient-dashboard",
            Destination::DoctorDashboard => "/doctor-dashboard",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoginOutcome {
    pub user: UserView,
    pub destination: Destination,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub date_of_birth: String,
    #[serde(default)]
    pub phone_number: Option<String>,
}

pub struct AccountService {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
    reconciler: Arc<ProfileReconciler>,
}

impl AccountService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        reconciler: Arc<ProfileReconciler>,
    ) -> Self {
        Self {
            identity,
            store,
            reconciler,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AccountError> {
        let identity = self.identity.sign_in(email, password).await.map_err(|e| {
            tracing::warn!(code = e.code(), "sign-in rejected");
            AccountError::SignIn(e)
        })?;

        let user = self.reconciler.reconcile(&identity).await.map_err(|e| {
            tracing::error!(uid = %identity.uid, error = %e, "profile setup failed after sign-in");
            AccountError::LoginProfile(e)
        })?;

        let destination = Destination::for_role(user.role);
        tracing::info!(uid = %user.uid, destination = destination.path(), "login complete");
        Ok(LoginOutcome { user, destination })
    }

    /// Create an account and its profile documents from the registration form.
    ///
    /// The new account is signed in, so the session observer may reconcile it at the same
    /// time. Reconciling here joins that run; the form values are merge-written only after
    /// it, and later reconciliations never overwrite present fields.
    pub async fn register(&self, form: &RegistrationForm) -> Result<UserView, AccountError> {
        let full_name = form.full_name.trim();
        let phone_number = form.phone_number.as_deref().map(str::trim).unwrap_or_default();
        let date_of_birth = form.date_of_birth.trim();

        let identity = self
            .identity
            .register(&form.email, &form.password, Some(full_name))
            .await
            .map_err(|e| {
                tracing::warn!(code = e.code(), "registration rejected");
                AccountError::Registration(e)
            })?;
        let uid = identity.uid.as_str();

        let profile_failed = |e: ProfileError| {
            tracing::error!(uid, error = %e, "profile setup failed after registration");
            AccountError::RegistrationProfile(e)
        };

        let mut user = self
            .reconciler
            .reconcile(&identity)
            .await
            .map_err(profile_failed)?;

        let mut form_fields = Fields::new();
        form_fields.insert(fields::FULL_NAME.into(), full_name.into());
        form_fields.insert(fields::PHONE_NUMBER.into(), phone_number.into());
        form_fields.insert(fields::DATE_OF_BIRTH.into(), date_of_birth.into());
        form_fields.insert(fields::UPDATED_AT.into(), FieldValue::ServerTimestamp);

        let mut batch = WriteBatch::new();
        batch
            .set(USERS_COLLECTION, uid, form_fields.clone(), SetOptions::MERGE)
            .set(PATIENTS_COLLECTION, uid, form_fields, SetOptions::MERGE);
        self.store
            .commit(batch)
            .await
            .map_err(|e| profile_failed(e.into()))?;

        user.full_name = full_name.to_owned();
        user.phone_number = phone_number.to_owned();

        tracing::info!(uid, "registration complete");
        Ok(user)
    }

    pub async fn sign_out(&self) -> AuthResult<()> {
        self.identity.sign_out().await
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), AccountError> {
        self.identity
            .send_password_reset(email)
            .await
            .map_err(AccountError::PasswordReset)
    }
}
