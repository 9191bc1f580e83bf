pub mod doctor;
pub mod list;
pub mod onboard;
pub mod run;
pub mod status;

use std::sync::Arc;
use std::time::Duration;

use dossier_config::AppConfig;
use dossier_store::KnowledgeStore;

/// The store configured in `config`.
pub fn open_store(config: &AppConfig) -> Arc<KnowledgeStore> {
    Arc::new(KnowledgeStore::new(
        config.store.root.clone(),
        Duration::from_millis(config.store.lock_wait_ms),
    ))
}
