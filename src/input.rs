//! Synthetic input sequencing.
//!
//! The driver lowers parsed key sequences to virtual-key events and forwards
//! clicks, re-resolving controls before each click attempt because the target
//! application can rebuild its control tree between frames.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::errors::AutomationError;
use crate::keys::{KeyAction, KeySequence};
use crate::locator::ControlLocator;
use crate::platforms::UiBackend;
use crate::types::{ControlId, RetryPolicy, WindowRef};

#[derive(Clone)]
pub struct InputDriver {
    backend: Arc<dyn UiBackend>,
    locator: ControlLocator,
}

impl InputDriver {
    pub fn new(backend: Arc<dyn UiBackend>) -> Self {
        let locator = ControlLocator::new(backend.clone());
        Self { backend, locator }
    }

    /// Emit a parsed key sequence, honoring its embedded delays. The
    /// sequence runs to completion or to the first backend error; there is
    /// no mid-sequence cancellation, which would leave the target window in
    /// an inconsistent input state.
    #[instrument(level = "debug", skip(self, sequence))]
    pub async fn send_keys(&self, sequence: &KeySequence) -> Result<(), AutomationError> {
        for action in sequence.actions() {
            match action {
                KeyAction::Press(vk) => self.backend.key_event(vk, true)?,
                KeyAction::Release(vk) => self.backend.key_event(vk, false)?,
                KeyAction::Delay(d) => tokio::time::sleep(d).await,
            }
        }
        Ok(())
    }

    /// Parse and send a sequence string in one go.
    pub async fn send_key_string(&self, sequence: &str) -> Result<(), AutomationError> {
        self.send_keys(&KeySequence::parse(sequence)?).await
    }

    /// Click the window surface itself. Required before any shortcut: the
    /// terminal ignores function keys unless it holds input focus.
    pub async fn click_window(&self, window: WindowRef) -> Result<(), AutomationError> {
        self.backend.click_window(window)
    }

    /// Click a control by id. Each attempt re-resolves the control first,
    /// then clicks; either step failing consumes the attempt.
    #[instrument(level = "debug", skip(self))]
    pub async fn click_control(
        &self,
        window: WindowRef,
        id: &ControlId,
        policy: &RetryPolicy,
    ) -> Result<(), AutomationError> {
        let single = RetryPolicy::new(1, policy.delay());
        let mut last_err = None;
        for attempt in 1..=policy.attempts() {
            let result = match self.locator.find_control(window, id, &single).await {
                Ok(control) => self.backend.click_control(&control),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => {
                    debug!(%id, attempt, "control clicked");
                    return Ok(());
                }
                Err(e) => {
                    debug!(%id, attempt, error = %e, "click attempt failed");
                    last_err = Some(e);
                }
            }
            if attempt < policy.attempts() {
                tokio::time::sleep(policy.delay()).await;
            }
        }
        Err(last_err.unwrap_or_else(|| {
            AutomationError::ElementNotFound(format!("control {id} could not be clicked"))
        }))
    }

    /// Resolve an input control, focus it and type `text`.
    #[instrument(level = "debug", skip(self, text))]
    pub async fn type_text(
        &self,
        window: WindowRef,
        id: &ControlId,
        text: &str,
        policy: &RetryPolicy,
    ) -> Result<(), AutomationError> {
        let control = self.locator.find_control(window, id, policy).await?;
        self.backend.type_text(&control, text)
    }
}
