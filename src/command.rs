//! The command orchestrator: write-side operations.
//!
//! Cancel-order commands run the same activation/focus/refresh preamble as
//! queries, open the cancel panel and click the category button. The
//! terminal gives no machine-readable confirmation, so success is defined as
//! every step completing without a raised error. Failures are always
//! reported, never retried beyond the locator/click-level bounded retries.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument};

use crate::config::DeskConfig;
use crate::controls::CancelScope;
use crate::errors::AutomationError;
use crate::input::InputDriver;
use crate::locator::ControlLocator;
use crate::platforms::UiBackend;
use crate::session::SessionLock;
use crate::types::{RetryPolicy, WindowQuery, WindowRef};

const SETTLE: Duration = Duration::from_millis(300);
const PANEL_SETTLE: Duration = Duration::from_millis(100);

pub struct CommandOrchestrator {
    backend: Arc<dyn UiBackend>,
    locator: ControlLocator,
    input: InputDriver,
    session: Arc<SessionLock>,
    config: DeskConfig,
    policy: RetryPolicy,
}

impl CommandOrchestrator {
    pub fn new(
        backend: Arc<dyn UiBackend>,
        session: Arc<SessionLock>,
        config: DeskConfig,
    ) -> Self {
        let locator = ControlLocator::new(backend.clone());
        let input = InputDriver::new(backend.clone());
        Self {
            backend,
            locator,
            input,
            session,
            config,
            policy: RetryPolicy::default(),
        }
    }

    /// Cancel open orders in the given scope.
    #[instrument(skip(self))]
    pub async fn cancel_orders(&self, scope: CancelScope) -> Result<(), AutomationError> {
        let _session = self.session.acquire().await;
        match self.cancel_locked(scope).await {
            Ok(()) => {
                info!(?scope, "cancel command complete");
                Ok(())
            }
            Err(e) => {
                error!(?scope, error = %e, "cancel command failed");
                Err(e)
            }
        }
    }

    async fn cancel_locked(&self, scope: CancelScope) -> Result<(), AutomationError> {
        let window = self.activate_and_focus().await?;

        // Refresh so the cancel panel reflects the live order book.
        self.input.send_key_string("F5").await?;
        tokio::time::sleep(SETTLE).await;

        // F3 opens the order-cancel panel.
        self.input.send_key_string("F3").await?;
        tokio::time::sleep(PANEL_SETTLE).await;

        self.input
            .click_control(window, &scope.control_id(), &self.policy)
            .await
    }

    async fn activate_and_focus(&self) -> Result<WindowRef, AutomationError> {
        let exe = self.config.trading_executable();
        self.backend.activate_window(&exe).map_err(|e| {
            AutomationError::ActivationError(format!(
                "could not activate {}: {e}; check that the order-entry program is running \
                 and has not been switched to its simplified UI mode",
                exe.display()
            ))
        })?;

        let query = WindowQuery::Title(self.config.trading_window_title.clone());
        let window = self.locator.find_window(&query, &self.policy).await?;

        self.input.click_window(window).await?;
        tokio::time::sleep(SETTLE).await;
        Ok(window)
    }
}
