//! Process-wide serialization of automation sequences.
//!
//! The target window is a single shared surface: two interleaved automation
//! sequences would corrupt both. One [`SessionLock`] instance is shared by
//! every orchestrator; it is held from activation through extraction or
//! command completion, and released on every exit path by guard drop.

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Default)]
pub struct SessionLock {
    inner: Mutex<()>,
}

pub struct SessionGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl SessionLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock, queueing behind any sequence already in flight.
    /// Callers block until released; they never fail fast, because
    /// automation is inherently sequential from the target application's
    /// point of view.
    pub async fn acquire(&self) -> SessionGuard<'_> {
        let guard = self.inner.lock().await;
        debug!("session lock acquired");
        SessionGuard { _guard: guard }
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        debug!("session lock released");
    }
}
