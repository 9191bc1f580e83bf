//! Shared generation state.
//!
//! The generator mutates state through [`ProgressHandle::update`]; observers
//! (status queries, the on-disk persister) subscribe to changes.

use std::sync::Arc;

use dossier_core::GenerationState;
use tokio::sync::watch;

#[derive(Clone)]
pub struct ProgressHandle {
    tx: Arc<watch::Sender<GenerationState>>,
}

impl ProgressHandle {
    pub fn new(state: GenerationState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self { tx: Arc::new(tx) }
    }

    /// Apply `f` and notify subscribers.
    pub fn update(&self, f: impl FnOnce(&mut GenerationState)) {
        self.tx.send_modify(|state| {
            f(state);
            state.updated_at = chrono::Utc::now();
        });
    }

    pub fn snapshot(&self) -> GenerationState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GenerationState> {
        self.tx.subscribe()
    }
}
