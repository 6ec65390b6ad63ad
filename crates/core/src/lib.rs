//! # FemCare Core
//!
//! Profile reconciliation for the FemCare patient portal.
//!
//! This crate contains all behaviour:
//! - The [`DocumentStore`] and [`IdentityProvider`] seams with in-memory and file-backed
//!   implementations
//! - One canonical normaliser for `users` and `patients` documents
//! - The [`ProfileReconciler`] (single-flight per identity id)
//! - The [`SessionObserver`], sole writer of the shared session state
//! - The [`DashboardLoader`], account flows and the orphan repair pass
//!
//! **No transport concerns**: HTTP routing and the CLI live in `api-rest` and `femcare-cli`.

pub mod account;
pub mod config;
pub mod constants;
pub mod dashboard;
pub mod error;
pub mod identity;
pub mod models;
pub mod normalize;
pub mod reconcile;
pub mod repair;
pub mod services;
pub mod session;
pub mod store;
pub mod validation;

#[cfg(test)]
mod testing;

pub use account::{AccountService, Destination, LoginOutcome, RegistrationForm};
pub use config::{CoreConfig, StoreBackend};
pub use constants::{DEFAULT_DATA_DIR, PATIENTS_COLLECTION, USERS_COLLECTION};
pub use dashboard::{DashboardLoader, DashboardPolicy};
pub use error::{
    AccountError, AuthError, ConfigError, DashboardError, ProfileError, StoreError,
};
pub use identity::{IdentityProvider, InMemoryIdentityProvider, ProviderSettings};
pub use models::{Appointment, Identity, PatientRecord, Role, UserView};
pub use reconcile::ProfileReconciler;
pub use repair::{RepairReport, RepairService};
pub use services::CoreServices;
pub use session::{SessionHandle, SessionObserver, SessionState};
pub use store::{DocumentStore, FileDocumentStore, InMemoryDocumentStore};
