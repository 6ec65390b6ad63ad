//! Service wiring.
//!
//! Builds every core service over one document store and one identity provider, so binaries
//! and tests share the same object graph.

use std::sync::Arc;

use crate::account::AccountService;
use crate::config::CoreConfig;
use crate::dashboard::DashboardLoader;
use crate::identity::{IdentityProvider, InMemoryIdentityProvider};
use crate::reconcile::ProfileReconciler;
use crate::repair::RepairService;
use crate::session::SessionObserver;
use crate::store::{document_store_from_config, DocumentStore};

#[derive(Clone)]
pub struct CoreServices {
    pub cfg: Arc<CoreConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub reconciler: Arc<ProfileReconciler>,
    pub session: Arc<SessionObserver>,
    pub dashboard: Arc<DashboardLoader>,
    pub accounts: Arc<AccountService>,
    pub repair: Arc<RepairService>,
}

impl CoreServices {
    /// Build services over the backends selected by `cfg`.
    pub fn build(cfg: Arc<CoreConfig>) -> Self {
        let store = document_store_from_config(&cfg);
        let identity: Arc<dyn IdentityProvider> =
            Arc::new(InMemoryIdentityProvider::from_config(&cfg));
        Self::with_backends(cfg, store, identity)
    }

    pub fn with_backends(
        cfg: Arc<CoreConfig>,
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let reconciler = Arc::new(ProfileReconciler::new(store.clone()));
        let session = Arc::new(SessionObserver::new(identity.clone(), reconciler.clone()));
        let dashboard = Arc::new(DashboardLoader::new(store.clone(), cfg.dashboard_policy()));
        let accounts = Arc::new(AccountService::new(
            identity.clone(),
            store.clone(),
            reconciler.clone(),
        ));
        let repair = Arc::new(RepairService::new(store.clone()));

        tracing::debug!(
            store = ?cfg.store_backend(),
            dashboard_policy = %cfg.dashboard_policy(),
            "core services built"
        );

        Self {
            cfg,
            store,
            identity,
            reconciler,
            session,
            dashboard,
            accounts,
            repair,
        }
    }
}
