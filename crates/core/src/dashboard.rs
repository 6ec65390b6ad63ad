//! Patient dashboard data.
//!
//! Reads the patient record of a reconciled user, checks that the record belongs to that
//! user, fills display defaults through [`crate::normalize`] and merge-writes any gaps back.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::constants::PATIENTS_COLLECTION;
use crate::error::DashboardError;
use crate::models::{PatientRecord, PatientSeed, Role, UserView};
use crate::normalize::{new_patient_record, normalize_patient, stored_owner};
use crate::store::{Document, DocumentStore, SetOptions, StoreError};

/// What the loader does when a user has no patient record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DashboardPolicy {
    /// Report [`DashboardError::NoPatientData`] and write nothing.
    #[default]
    ReadOnly,
    /// Create the record with the same defaults the reconciler uses, then show it.
    SelfHeal,
}

impl DashboardPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            DashboardPolicy::ReadOnly => "read-only",
            DashboardPolicy::SelfHeal => "self-heal",
        }
    }
}

impl fmt::Display for DashboardPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DashboardPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read-only" => Ok(DashboardPolicy::ReadOnly),
            "self-heal" => Ok(DashboardPolicy::SelfHeal),
            other => Err(format!("expected 'read-only' or 'self-heal', got '{other}'")),
        }
    }
}

pub struct DashboardLoader {
    store: Arc<dyn DocumentStore>,
    policy: DashboardPolicy,
}

impl DashboardLoader {
    pub fn new(store: Arc<dyn DocumentStore>, policy: DashboardPolicy) -> Self {
        Self { store, policy }
    }

    /// Load the display-ready patient record for `user`.
    ///
    /// A record whose owner field does not match `user` yields
    /// [`DashboardError::Unauthorized`]; its contents are never returned. Store failures
    /// collapse into [`DashboardError::Fetch`] without retry. Self-heal only ever creates a
    /// record for a patient-role user.
    pub async fn load(&self, user: &UserView) -> Result<PatientRecord, DashboardError> {
        let uid = user.uid.as_str();

        let stored = match self.fetch(uid).await? {
            Some(stored) => stored,
            None if self.policy == DashboardPolicy::SelfHeal && user.role == Role::Patient => {
                self.store
                    .set(
                        PATIENTS_COLLECTION,
                        uid,
                        new_patient_record(uid, &user.email, &PatientSeed::from_user(user)),
                        SetOptions::REPLACE,
                    )
                    .await
                    .map_err(|e| fetch_failed(uid, e))?;
                tracing::info!(uid, "created missing patient record for dashboard");

                self.fetch(uid).await?.ok_or(DashboardError::NoPatientData)?
            }
            None => {
                tracing::info!(uid, "no patient record");
                return Err(DashboardError::NoPatientData);
            }
        };

        if stored_owner(&stored) != Some(uid) {
            tracing::warn!(uid, "patient record owner mismatch");
            return Err(DashboardError::Unauthorized);
        }

        let normalized = normalize_patient(&stored, &PatientSeed::from_user(user));
        if let Some(write) = normalized.merge_write() {
            self.store
                .set(PATIENTS_COLLECTION, uid, write, SetOptions::MERGE)
                .await
                .map_err(|e| fetch_failed(uid, e))?;
            tracing::info!(uid, "healed patient record");
        }

        Ok(normalized.view)
    }

    async fn fetch(&self, uid: &str) -> Result<Option<Document>, DashboardError> {
        self.store
            .get(PATIENTS_COLLECTION, uid)
            .await
            .map_err(|e| fetch_failed(uid, e))
    }
}

fn fetch_failed(uid: &str, err: StoreError) -> DashboardError {
    tracing::error!(uid, error = %err, "error fetching patient data");
    DashboardError::Fetch(err)
}
