//! Control discovery with bounded retry.
//!
//! The target application renders asynchronously and rebuilds its control
//! tree between frames, so a single failed lookup means nothing. Every
//! discovery call retries under a [`RetryPolicy`] and only reports
//! [`AutomationError::ElementNotFound`] once the attempts are exhausted;
//! callers treat that as an operation abort, not a crash.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::errors::AutomationError;
use crate::platforms::UiBackend;
use crate::types::{ControlId, ControlRef, RetryPolicy, WindowQuery, WindowRef};

#[derive(Clone)]
pub struct ControlLocator {
    backend: Arc<dyn UiBackend>,
}

impl ControlLocator {
    pub fn new(backend: Arc<dyn UiBackend>) -> Self {
        Self { backend }
    }

    /// Find a top-level window. Backend errors during an attempt count as a
    /// miss; the last one is carried into the final error.
    #[instrument(level = "debug", skip(self))]
    pub async fn find_window(
        &self,
        query: &WindowQuery,
        policy: &RetryPolicy,
    ) -> Result<WindowRef, AutomationError> {
        let mut last_err: Option<AutomationError> = None;
        for attempt in 1..=policy.attempts() {
            match self.backend.find_window(query) {
                Ok(Some(window)) => {
                    debug!(?query, attempt, "window found");
                    return Ok(window);
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(?query, attempt, error = %e, "window lookup errored");
                    last_err = Some(e);
                }
            }
            if attempt < policy.attempts() {
                tokio::time::sleep(policy.delay()).await;
            }
        }
        Err(AutomationError::ElementNotFound(match last_err {
            Some(e) => format!(
                "window {query:?} not found after {} attempts, last error: {e}",
                policy.attempts()
            ),
            None => format!(
                "window {query:?} not found after {} attempts",
                policy.attempts()
            ),
        }))
    }

    /// Find one descendant control by its fixed identifier.
    #[instrument(level = "debug", skip(self))]
    pub async fn find_control(
        &self,
        window: WindowRef,
        id: &ControlId,
        policy: &RetryPolicy,
    ) -> Result<ControlRef, AutomationError> {
        for attempt in 1..=policy.attempts() {
            if let Some(control) = self.backend.find_control(window, id)? {
                debug!(%id, attempt, "control found");
                return Ok(control);
            }
            if attempt < policy.attempts() {
                tokio::time::sleep(policy.delay()).await;
            }
        }
        Err(AutomationError::ElementNotFound(format!(
            "control {id} not found after {} attempts",
            policy.attempts()
        )))
    }

    /// Single lookup with no retries; `Ok(None)` is an answer, not a fault.
    /// The captcha detector uses this, where absence means "no challenge".
    pub fn peek_control(
        &self,
        window: WindowRef,
        id: &ControlId,
    ) -> Result<Option<ControlRef>, AutomationError> {
        self.backend.find_control(window, id)
    }

    /// Batch lookup: one descendant-tree scan per attempt, early return once
    /// every id is found. After the attempts are exhausted the partial set is
    /// returned; callers decide whether missing entries are fatal.
    #[instrument(level = "debug", skip(self, ids))]
    pub async fn find_controls(
        &self,
        window: WindowRef,
        ids: &[ControlId],
        policy: &RetryPolicy,
    ) -> Result<Vec<ControlRef>, AutomationError> {
        let mut found = Vec::new();
        for attempt in 1..=policy.attempts() {
            found = self.backend.find_controls(window, ids)?;
            if found.len() == ids.len() {
                return Ok(found);
            }
            debug!(
                attempt,
                found = found.len(),
                wanted = ids.len(),
                "batch lookup incomplete"
            );
            if attempt < policy.attempts() {
                tokio::time::sleep(policy.delay()).await;
            }
        }
        Ok(found)
    }

    /// Walk a named path (for example a navigation tree) under a root
    /// control id.
    #[instrument(level = "debug", skip(self))]
    pub async fn find_control_by_path(
        &self,
        window: WindowRef,
        root: &ControlId,
        path: &[String],
        policy: &RetryPolicy,
    ) -> Result<ControlRef, AutomationError> {
        for attempt in 1..=policy.attempts() {
            if let Some(control) = self.backend.find_control_by_path(window, root, path)? {
                debug!(?path, attempt, "path leaf found");
                return Ok(control);
            }
            if attempt < policy.attempts() {
                tokio::time::sleep(policy.delay()).await;
            }
        }
        Err(AutomationError::ElementNotFound(format!(
            "no control at path {path:?} under {root} after {} attempts",
            policy.attempts()
        )))
    }
}
