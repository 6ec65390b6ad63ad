//! Session state and the observer that keeps it in step with the identity provider.
//!
//! [`SessionObserver`] is the only writer of [`SessionState`]. Consumers hold a
//! [`SessionHandle`] and read snapshots or wait for changes.
//!
//! Every identity transition gets a generation number. A reconciliation result is applied
//! only while its generation is still the latest; results of superseded transitions are
//! dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::identity::IdentityProvider;
use crate::models::{Identity, UserView};
use crate::reconcile::ProfileReconciler;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub user: Option<UserView>,
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for SessionState {
    /// Nothing observed yet.
    fn default() -> Self {
        Self {
            user: None,
            loading: true,
            error: None,
        }
    }
}

/// Read-only view of the session state.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Wait until the state satisfies `predicate` and return it.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&SessionState) -> bool,
    ) -> Option<SessionState> {
        self.state
            .wait_for(predicate)
            .await
            .ok()
            .map(|state| state.clone())
    }

    /// Wait until no transition is being processed.
    pub async fn settled(&mut self) -> Option<SessionState> {
        self.wait_for(|state| !state.loading).await
    }
}

pub struct SessionObserver {
    identity: Arc<dyn IdentityProvider>,
    reconciler: Arc<ProfileReconciler>,
    state: watch::Sender<SessionState>,
    generation: AtomicU64,
}

impl SessionObserver {
    pub fn new(identity: Arc<dyn IdentityProvider>, reconciler: Arc<ProfileReconciler>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            identity,
            reconciler,
            state,
            generation: AtomicU64::new(0),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            state: self.state.subscribe(),
        }
    }

    /// Follow the identity provider until its channel closes.
    ///
    /// The current identity is handled first. Each transition is processed on its own task so
    /// a slow reconciliation never delays a newer transition; generations are assigned in
    /// arrival order before the task is spawned.
    pub async fn run(self: Arc<Self>) {
        let mut transitions = self.identity.subscribe();
        let mut next = transitions.borrow_and_update().clone();

        loop {
            let generation = self.next_generation();
            let observer = Arc::clone(&self);
            tokio::spawn(async move { observer.apply(generation, next).await });

            if transitions.changed().await.is_err() {
                tracing::info!("identity provider closed; session observer stopping");
                return;
            }
            next = transitions.borrow_and_update().clone();
        }
    }

    /// Apply one identity transition as the newest one.
    pub async fn observe(&self, identity: Option<Identity>) {
        let generation = self.next_generation();
        self.apply(generation, identity).await;
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Modify the state only if `generation` is still the latest transition.
    fn update_if_current(
        &self,
        generation: u64,
        modify: impl FnOnce(&mut SessionState),
    ) -> bool {
        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            modify(state);
            true
        })
    }

    async fn apply(&self, generation: u64, identity: Option<Identity>) {
        let Some(identity) = identity else {
            if self.update_if_current(generation, |state| {
                state.user = None;
                state.error = None;
                state.loading = false;
            }) {
                tracing::info!(generation, "session cleared");
            }
            return;
        };

        let uid = identity.uid.clone();
        let current = self.update_if_current(generation, |state| {
            state.loading = true;
            if state.user.as_ref().is_some_and(|user| user.uid != uid) {
                state.user = None;
            }
        });
        if !current {
            tracing::debug!(uid = %uid, generation, "transition superseded before reconciliation");
            return;
        }

        let result = self.reconciler.reconcile(&identity).await;
        if let Err(e) = &result {
            tracing::error!(uid = %uid, error = %e, "profile reconciliation failed");
        }

        let applied = self.update_if_current(generation, |state| {
            match result {
                Ok(view) => {
                    state.user = Some(view);
                    state.error = None;
                }
                Err(e) => {
                    state.user = None;
                    state.error = Some(e.to_string());
                }
            }
            state.loading = false;
        });

        if applied {
            tracing::info!(uid = %uid, generation, "session updated");
        } else {
            tracing::warn!(uid = %uid, generation, "discarded stale reconciliation result");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MIN_BCRYPT_COST;
    use crate::identity::{InMemoryIdentityProvider, ProviderSettings};
    use crate::models::Role;
    use crate::testing::{identity, CountingStore};

    fn setup() -> (
        Arc<CountingStore>,
        Arc<InMemoryIdentityProvider>,
        Arc<SessionObserver>,
    ) {
        let store = Arc::new(CountingStore::new());
        let idp = Arc::new(InMemoryIdentityProvider::new(ProviderSettings {
            bcrypt_cost: MIN_BCRYPT_COST,
            ..ProviderSettings::default()
        }));
        let reconciler = Arc::new(ProfileReconciler::new(store.clone()));
        let observer = Arc::new(SessionObserver::new(idp.clone(), reconciler));
        (store, idp, observer)
    }

    #[tokio::test]
    async fn test_initial_state_is_loading() {
        let (_, _, observer) = setup();
        let state = observer.handle().snapshot();
        assert!(state.loading);
        assert!(state.user.is_none());
    }

    #[tokio::test]
    async fn test_absence_clears_state() {
        let (_, _, observer) = setup();
        observer.observe(None).await;

        assert_eq!(
            observer.handle().snapshot(),
            SessionState {
                user: None,
                loading: false,
                error: None,
            }
        );
    }

    #[tokio::test]
    async fn test_presence_sets_reconciled_user() {
        let (store, _, observer) = setup();
        observer
            .observe(Some(identity("u1", "a@x.com", Some("Ada"))))
            .await;

        let state = observer.handle().snapshot();
        let user = state.user.expect("user is set");
        assert_eq!(user.uid, "u1");
        assert_eq!(user.full_name, "Ada");
        assert_eq!(user.role, Role::Patient);
        assert!(!state.loading);
        assert!(store.peek("patients", "u1").await.is_some());
    }

    #[tokio::test]
    async fn test_reconciliation_failure_is_recorded() {
        let (store, _, observer) = setup();
        store.fail_reads(true);

        observer
            .observe(Some(identity("u1", "a@x.com", None)))
            .await;

        let state = observer.handle().snapshot();
        assert!(state.user.is_none());
        assert!(!state.loading);
        assert!(state.error.is_some());
    }

    #[tokio::test]
    async fn test_stale_result_is_discarded() {
        let (store, _, observer) = setup();
        store.hold_reads();

        let release = async {
            while store.reads() == 0 {
                tokio::task::yield_now().await;
            }
            // Sign-out arrives while the sign-in reconciliation is still pending.
            observer.observe(None).await;
            store.release_reads();
        };

        tokio::join!(
            observer.observe(Some(identity("u1", "a@x.com", None))),
            release,
        );

        let state = observer.handle().snapshot();
        assert!(state.user.is_none(), "stale sign-in must not resurrect the user");
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_run_settles_when_nobody_is_signed_in() {
        let (store, _, observer) = setup();
        let mut handle = observer.handle();
        let task = tokio::spawn(observer.clone().run());

        let state = handle.settled().await.expect("observer alive");
        assert!(state.user.is_none());
        assert!(state.error.is_none());
        assert_eq!(store.reads(), 0);

        task.abort();
    }

    #[tokio::test]
    async fn test_run_follows_provider_transitions() {
        let (_, idp, observer) = setup();
        let mut handle = observer.handle();
        let task = tokio::spawn(observer.clone().run());

        let registered = idp
            .register("a@x.com", "secret1", Some("Ada"))
            .await
            .unwrap();
        let state = handle
            .wait_for(|s| s.user.is_some() && !s.loading)
            .await
            .expect("observer alive");
        assert_eq!(state.user.map(|u| u.uid), Some(registered.uid));

        idp.sign_out().await.unwrap();
        let state = handle
            .wait_for(|s| s.user.is_none() && !s.loading)
            .await
            .expect("observer alive");
        assert!(state.error.is_none());

        task.abort();
    }
}
