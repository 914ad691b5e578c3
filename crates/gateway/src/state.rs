use crate::dispatch::DispatchHandle;
use crate::status::StatusStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Shared application state handed to every handler. The dispatch
/// handle is the only path to the engine; session state itself never
/// lives here.
#[derive(Clone)]
pub struct AppState {
    pub dispatch: DispatchHandle,
    pub status: StatusStore,
    pub pacing_interval: Duration,
    session_counter: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(dispatch: DispatchHandle, pacing_interval: Duration) -> Self {
        Self {
            dispatch,
            status: StatusStore::new(),
            pacing_interval,
            session_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Process-unique id for a connection or one-shot request, used in
    /// logs and dispatch accounting.
    pub fn next_session_id(&self) -> u64 {
        self.session_counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}
