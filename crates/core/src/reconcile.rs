//! Profile reconciliation.
//!
//! Given an [`Identity`], make sure a `users` document exists and carries the minimum field
//! set, and that a patient-role user also has a `patients` document. Missing fields are filled
//! through [`crate::normalize`]; present fields are never overwritten.
//!
//! At most one reconciliation runs per identity id. Concurrent callers for the same id wait
//! for the leader's result instead of interleaving their own reads and writes. A failure part
//! way through does not roll back writes that were already applied.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::constants::{PATIENTS_COLLECTION, USERS_COLLECTION};
use crate::error::ProfileResult;
use crate::models::{Identity, PatientSeed, Role, UserView};
use crate::normalize::{new_patient_record, new_user_record, normalize_user};
use crate::store::{Document, DocumentStore, SetOptions, WriteBatch};

type Outcome = Option<ProfileResult<UserView>>;

struct Flight {
    token: u64,
    outcome: watch::Receiver<Outcome>,
}

/// Held by the caller running a reconciliation. Dropping it (normally or on cancellation)
/// unregisters the flight before the result channel closes.
struct Leader<'a> {
    reconciler: &'a ProfileReconciler,
    uid: String,
    token: u64,
    outcome: watch::Sender<Outcome>,
}

impl Drop for Leader<'_> {
    fn drop(&mut self) {
        let mut inflight = self
            .reconciler
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if inflight
            .get(&self.uid)
            .is_some_and(|flight| flight.token == self.token)
        {
            inflight.remove(&self.uid);
        }
    }
}

enum Turn<'a> {
    Lead(Leader<'a>),
    Follow(watch::Receiver<Outcome>),
}

pub struct ProfileReconciler {
    store: Arc<dyn DocumentStore>,
    inflight: Mutex<HashMap<String, Flight>>,
    next_token: AtomicU64,
}

impl ProfileReconciler {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            inflight: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Reconcile the profile documents of `identity` and return the normalised user view.
    pub async fn reconcile(&self, identity: &Identity) -> ProfileResult<UserView> {
        loop {
            match self.take_turn(&identity.uid) {
                Turn::Lead(leader) => {
                    let result = self.run(identity).await;
                    leader.outcome.send_replace(Some(result.clone()));
                    return result;
                }
                Turn::Follow(mut outcome) => {
                    let settled = outcome
                        .wait_for(Option::is_some)
                        .await
                        .map(|outcome| outcome.clone());
                    match settled {
                        Ok(Some(result)) => {
                            // The shared view carries the leader's display name.
                            return result.map(|mut view| {
                                view.display_name = identity.display_name.clone();
                                view
                            });
                        }
                        // The leader was cancelled before finishing; try again.
                        _ => {
                            tracing::debug!(uid = %identity.uid, "in-flight reconciliation abandoned");
                            continue;
                        }
                    }
                }
            }
        }
    }

    /// Number of reconciliations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn take_turn(&self, uid: &str) -> Turn<'_> {
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(flight) = inflight.get(uid) {
            return Turn::Follow(flight.outcome.clone());
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        inflight.insert(uid.to_owned(), Flight { token, outcome: rx });

        Turn::Lead(Leader {
            reconciler: self,
            uid: uid.to_owned(),
            token,
            outcome: tx,
        })
    }

    async fn run(&self, identity: &Identity) -> ProfileResult<UserView> {
        match self.store.get(USERS_COLLECTION, &identity.uid).await? {
            None => self.create(identity).await,
            Some(stored) => self.heal(identity, &stored).await,
        }
    }

    /// First sighting of an identity: create both records in one batch.
    async fn create(&self, identity: &Identity) -> ProfileResult<UserView> {
        let uid = identity.uid.as_str();
        let full_name = identity.display_name.as_deref().unwrap_or_default();

        let view = UserView {
            uid: uid.to_owned(),
            email: identity.email.as_str().to_owned(),
            display_name: identity.display_name.clone(),
            role: Role::Patient,
            full_name: full_name.to_owned(),
            phone_number: String::new(),
        };

        let mut batch = WriteBatch::new();
        batch.set(
            USERS_COLLECTION,
            uid,
            new_user_record(identity, full_name, ""),
            SetOptions::REPLACE,
        );

        // A patient document without a user document is kept rather than reset.
        if self.store.get(PATIENTS_COLLECTION, uid).await?.is_none() {
            batch.set(
                PATIENTS_COLLECTION,
                uid,
                new_patient_record(uid, &view.email, &PatientSeed::from_user(&view)),
                SetOptions::REPLACE,
            );
        } else {
            tracing::warn!(uid, "patient record found without a user record");
        }

        let documents = batch.len();
        self.store.commit(batch).await?;
        tracing::info!(uid, documents, "created profile records");

        Ok(view)
    }

    /// Known identity: fill gaps in the user record, then make sure a patient has a patient
    /// record.
    async fn heal(&self, identity: &Identity, stored: &Document) -> ProfileResult<UserView> {
        let uid = identity.uid.as_str();
        let normalized = normalize_user(stored, identity);

        if let Some(write) = normalized.merge_write() {
            let healed: Vec<&str> = normalized.delta.keys().map(String::as_str).collect();
            self.store
                .set(USERS_COLLECTION, uid, write, SetOptions::MERGE)
                .await?;
            tracing::info!(uid, fields = ?healed, "healed user record");
        }

        let view = normalized.view;

        if view.role == Role::Patient
            && self.store.get(PATIENTS_COLLECTION, uid).await?.is_none()
        {
            self.store
                .set(
                    PATIENTS_COLLECTION,
                    uid,
                    new_patient_record(uid, &view.email, &PatientSeed::from_user(&view)),
                    SetOptions::REPLACE,
                )
                .await?;
            tracing::info!(uid, "created missing patient record");
        }

        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProfileError;
    use crate::testing::{identity, CountingStore};
    use serde_json::json;
    use std::future::Future;
    use std::pin::Pin;
    use std::task::Poll;

    fn setup() -> (Arc<CountingStore>, ProfileReconciler) {
        let store = Arc::new(CountingStore::new());
        let reconciler = ProfileReconciler::new(store.clone());
        (store, reconciler)
    }

    #[tokio::test]
    async fn test_first_sighting_creates_both_records() {
        let (store, reconciler) = setup();
        let id = identity("u1", "a@x.com", Some(""));

        let view = reconciler.reconcile(&id).await.expect("reconcile should succeed");

        assert_eq!(view.uid, "u1");
        assert_eq!(view.email, "a@x.com");
        assert_eq!(view.role, Role::Patient);
        assert_eq!(view.full_name, "");
        assert_eq!(view.phone_number, "");
        assert_eq!(store.writes(), 2);

        let user = store.peek("users", "u1").await.expect("user record");
        assert_eq!(user["uid"], "u1");
        assert_eq!(user["email"], "a@x.com");
        assert_eq!(user["userType"], "patient");
        assert_eq!(user["fullName"], "");
        assert_eq!(user["phoneNumber"], "");
        assert!(user["createdAt"].is_string());

        let patient = store.peek("patients", "u1").await.expect("patient record");
        assert_eq!(patient["uid"], "u1");
        assert_eq!(patient["email"], "a@x.com");
        assert_eq!(patient["dateOfBirth"], "");
        assert_eq!(patient["medicalHistory"], "");
        assert_eq!(patient["appointments"], json!([]));
    }

    #[tokio::test]
    async fn test_display_name_seeds_full_name() {
        let (store, reconciler) = setup();
        let view = reconciler
            .reconcile(&identity("u1", "a@x.com", Some("Ada")))
            .await
            .unwrap();

        assert_eq!(view.full_name, "Ada");
        let patient = store.peek("patients", "u1").await.unwrap();
        assert_eq!(patient["fullName"], "Ada");
    }

    #[tokio::test]
    async fn test_missing_phone_number_is_merged() {
        let (store, reconciler) = setup();
        store
            .seed(
                "users",
                "u1",
                json!({
                    "uid": "u1",
                    "email": "a@x.com",
                    "userType": "patient",
                    "fullName": "Ada",
                    "createdAt": "2024-01-01T00:00:00.000Z",
                }),
            )
            .await;
        store.seed("patients", "u1", json!({ "uid": "u1" })).await;

        let view = reconciler
            .reconcile(&identity("u1", "other@x.com", None))
            .await
            .unwrap();

        assert_eq!(view.phone_number, "");
        assert_eq!(view.email, "a@x.com");
        assert_eq!(store.writes(), 1);

        let user = store.peek("users", "u1").await.unwrap();
        assert_eq!(user["phoneNumber"], "");
        assert_eq!(user["email"], "a@x.com");
        assert_eq!(user["userType"], "patient");
        assert_eq!(user["fullName"], "Ada");
        assert_eq!(user["createdAt"], "2024-01-01T00:00:00.000Z");
        assert!(user["updatedAt"].is_string());
    }

    #[tokio::test]
    async fn test_second_reconcile_writes_nothing() {
        let (store, reconciler) = setup();
        let id = identity("u1", "a@x.com", Some("Ada"));

        let first = reconciler.reconcile(&id).await.unwrap();
        let writes = store.writes();
        let second = reconciler.reconcile(&id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.writes(), writes);
    }

    #[tokio::test]
    async fn test_doctor_never_gets_patient_record() {
        let (store, reconciler) = setup();
        store
            .seed(
                "users",
                "u2",
                json!({
                    "uid": "u2",
                    "email": "doc@x.com",
                    "userType": "doctor",
                    "fullName": "Dr Who",
                    "phoneNumber": "555",
                }),
            )
            .await;

        let view = reconciler
            .reconcile(&identity("u2", "doc@x.com", None))
            .await
            .unwrap();

        assert_eq!(view.role, Role::Doctor);
        assert!(store.peek("patients", "u2").await.is_none());
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_patient_without_patient_record_is_healed() {
        let (store, reconciler) = setup();
        store
            .seed(
                "users",
                "u1",
                json!({
                    "uid": "u1",
                    "email": "a@x.com",
                    "userType": "patient",
                    "fullName": "Ada",
                    "phoneNumber": "555",
                }),
            )
            .await;

        reconciler
            .reconcile(&identity("u1", "a@x.com", None))
            .await
            .unwrap();

        let patient = store.peek("patients", "u1").await.expect("patient record");
        assert_eq!(patient["fullName"], "Ada");
        assert_eq!(patient["phoneNumber"], "555");
        assert_eq!(patient["dateOfBirth"], "");
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_existing_patient_record_survives_user_creation() {
        let (store, reconciler) = setup();
        store
            .seed(
                "patients",
                "u1",
                json!({ "uid": "u1", "medicalHistory": "asthma" }),
            )
            .await;

        reconciler
            .reconcile(&identity("u1", "a@x.com", None))
            .await
            .unwrap();

        let patient = store.peek("patients", "u1").await.unwrap();
        assert_eq!(patient["medicalHistory"], "asthma");
        assert!(store.peek("users", "u1").await.is_some());
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_as_profile_error() {
        let (store, reconciler) = setup();
        store.fail_writes(true);

        let err = reconciler
            .reconcile(&identity("u1", "a@x.com", None))
            .await
            .expect_err("write failure should fail reconciliation");
        assert!(matches!(err, ProfileError::Store(_)));
        assert_eq!(reconciler.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_reconciliation() {
        let (store, reconciler) = setup();
        let id = identity("u1", "a@x.com", None);
        store.hold_reads();

        let release = async {
            while store.reads() == 0 {
                tokio::task::yield_now().await;
            }
            store.release_reads();
        };

        let (a, b, c, ()) = tokio::join!(
            reconciler.reconcile(&id),
            reconciler.reconcile(&id),
            reconciler.reconcile(&id),
            release,
        );

        let a = a.unwrap();
        assert_eq!(a, b.unwrap());
        assert_eq!(a, c.unwrap());
        // One user read plus one patient existence check, one batch of two documents.
        assert_eq!(store.reads(), 2);
        assert_eq!(store.writes(), 2);
        assert_eq!(reconciler.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_follower_keeps_its_own_display_name() {
        let (store, reconciler) = setup();
        let first = identity("u1", "a@x.com", Some("Ada"));
        let second = identity("u1", "a@x.com", Some("Ada L."));
        store.hold_reads();

        let release = async {
            while store.reads() == 0 {
                tokio::task::yield_now().await;
            }
            store.release_reads();
        };

        let (a, b, ()) = tokio::join!(
            reconciler.reconcile(&first),
            reconciler.reconcile(&second),
            release,
        );

        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.display_name.as_deref(), Some("Ada"));
        assert_eq!(b.display_name.as_deref(), Some("Ada L."));
        assert_eq!(a.full_name, b.full_name);
        assert_eq!(store.writes(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_leader_hands_over_to_follower() {
        let (store, reconciler) = setup();
        let id = identity("u1", "a@x.com", None);
        store.hold_reads();

        {
            let leader = reconciler.reconcile(&id);
            tokio::pin!(leader);
            // Poll once so the leader registers and blocks on its first read.
            assert!(poll_once(leader.as_mut()).await.is_none());
            assert_eq!(reconciler.in_flight(), 1);
        }
        assert_eq!(reconciler.in_flight(), 0);

        store.release_reads();
        let view = reconciler.reconcile(&id).await.unwrap();
        assert_eq!(view.uid, "u1");
    }

    async fn poll_once<F: Future + Unpin>(mut fut: F) -> Option<F::Output> {
        std::future::poll_fn(move |cx| {
            Poll::Ready(match Pin::new(&mut fut).poll(cx) {
                Poll::Ready(out) => Some(out),
                Poll::Pending => None,
            })
        })
        .await
    }
}
