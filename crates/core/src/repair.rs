//! Orphan repair.
//!
//! A patient-role user record without a patient record can be left behind when a multi-file
//! write is interrupted. The repair pass finds such users and creates the missing record with
//! the same defaults the reconciler uses.

use std::sync::Arc;

use serde::Serialize;

use crate::constants::{fields, PATIENTS_COLLECTION, USERS_COLLECTION};
use crate::error::StoreResult;
use crate::models::Role;
use crate::normalize::{new_patient_record, seed_from_user_document, stored_role};
use crate::store::{DocumentStore, SetOptions};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    /// User records examined.
    pub scanned: usize,
    /// Ids whose patient record was created.
    pub repaired: Vec<String>,
    pub skipped_doctors: usize,
}

pub struct RepairService {
    store: Arc<dyn DocumentStore>,
}

impl RepairService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create missing patient records for every patient-role user. Stops at the first store
    /// failure; records repaired before it stay repaired.
    pub async fn repair_orphans(&self) -> StoreResult<RepairReport> {
        let mut report = RepairReport::default();

        for uid in self.store.list_ids(USERS_COLLECTION).await? {
            let Some(user) = self.store.get(USERS_COLLECTION, &uid).await? else {
                continue;
            };
            report.scanned += 1;

            if stored_role(&user) == Role::Doctor {
                report.skipped_doctors += 1;
                continue;
            }

            if self.store.get(PATIENTS_COLLECTION, &uid).await?.is_some() {
                continue;
            }

            let email = user
                .get(fields::EMAIL)
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let seed = seed_from_user_document(&user);

            self.store
                .set(
                    PATIENTS_COLLECTION,
                    &uid,
                    new_patient_record(&uid, email, &seed),
                    SetOptions::REPLACE,
                )
                .await?;
            tracing::info!(uid = %uid, "repaired orphaned user record");
            report.repaired.push(uid);
        }

        tracing::info!(
            scanned = report.scanned,
            repaired = report.repaired.len(),
            skipped_doctors = report.skipped_doctors,
            "repair pass finished"
        );
        Ok(report)
    }
}
