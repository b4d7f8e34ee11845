//! The verified query orchestrator.
//!
//! Read operations walk a fixed state machine against the externally
//! rendered terminal: activate, focus, refresh, dispatch the view shortcut,
//! check for a captcha challenge, then extract the clipboard table. The
//! terminal emits no events, so the sequence leans on settle delays and the
//! bounded retries embedded in the locator and input driver.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use crate::captcha::CaptchaResolver;
use crate::config::DeskConfig;
use crate::controls::{self, ids};
use crate::errors::AutomationError;
use crate::input::InputDriver;
use crate::locator::ControlLocator;
use crate::platforms::UiBackend;
use crate::session::SessionLock;
use crate::table::{self, TableRecord};
use crate::types::{ControlId, RetryPolicy, WindowQuery, WindowRef};

/// Settle delay after focusing or refreshing; the terminal needs a beat to
/// re-render before it honors the next shortcut.
const SETTLE: Duration = Duration::from_millis(300);
/// Shorter settle between dispatch sub-steps.
const SHORT_SETTLE: Duration = Duration::from_millis(100);

/// Progress of one verified query. `Failed` is reachable from every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Activating,
    Focused,
    Refreshed,
    Dispatched,
    ChallengeCheck,
    NoChallenge,
    ChallengePending,
    Extracting,
    Done,
    Failed,
}

/// The read operations the terminal supports through this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Current positions (the default view behind F4).
    Positions,
    /// Fills of the day, reached through the navigation tree.
    TodayTrades,
}

pub struct QueryOrchestrator {
    backend: Arc<dyn UiBackend>,
    locator: ControlLocator,
    input: InputDriver,
    captcha: CaptchaResolver,
    session: Arc<SessionLock>,
    config: DeskConfig,
    policy: RetryPolicy,
}

impl QueryOrchestrator {
    pub fn new(
        backend: Arc<dyn UiBackend>,
        captcha: CaptchaResolver,
        session: Arc<SessionLock>,
        config: DeskConfig,
    ) -> Self {
        let locator = ControlLocator::new(backend.clone());
        let input = InputDriver::new(backend.clone());
        Self {
            backend,
            locator,
            input,
            captcha,
            session,
            config,
            policy: RetryPolicy::default(),
        }
    }

    /// Run one verified query end to end under the session lock and return
    /// the decoded clipboard records.
    #[instrument(skip(self))]
    pub async fn fetch(&self, kind: QueryKind) -> Result<Vec<TableRecord>, AutomationError> {
        let _session = self.session.acquire().await;
        let mut state = QueryState::Activating;
        match self.run_locked(kind, &mut state).await {
            Ok(records) => {
                info!(?kind, rows = records.len(), "query complete");
                Ok(records)
            }
            Err(e) => {
                let from = state;
                advance(&mut state, QueryState::Failed);
                error!(?kind, failed_from = ?from, error = %e, "query failed");
                Err(e)
            }
        }
    }

    async fn run_locked(
        &self,
        kind: QueryKind,
        state: &mut QueryState,
    ) -> Result<Vec<TableRecord>, AutomationError> {
        let window = self.activate_and_focus(state).await?;

        advance(state, QueryState::Refreshed);
        self.input.send_key_string("F5").await?;
        tokio::time::sleep(SETTLE).await;

        advance(state, QueryState::Dispatched);
        self.dispatch(kind, window).await?;
        self.input
            .click_control(window, &ControlId::Num(ids::CONTENT_PANE), &self.policy)
            .await?;
        self.input.send_key_string("{CTRL+C}").await?;

        advance(state, QueryState::ChallengeCheck);
        match self.captcha.detect(window).await? {
            None => advance(state, QueryState::NoChallenge),
            Some(challenge) => {
                advance(state, QueryState::ChallengePending);
                let digits = self.captcha.solve(&challenge).await?;
                self.captcha
                    .submit_and_verify(window, &challenge, &digits)
                    .await?;
            }
        }

        advance(state, QueryState::Extracting);
        let raw = self.read_clipboard().await?;
        let records = table::decode(&raw);
        advance(state, QueryState::Done);
        Ok(records)
    }

    /// The parallel scalar path: balance figures read straight off labeled
    /// controls on the funds view. No clipboard, no captcha.
    #[instrument(skip(self))]
    pub async fn balances(&self) -> Result<TableRecord, AutomationError> {
        let _session = self.session.acquire().await;
        let mut state = QueryState::Activating;
        let result = self.balances_locked(&mut state).await;
        if let Err(e) = &result {
            let from = state;
            advance(&mut state, QueryState::Failed);
            error!(failed_from = ?from, error = %e, "balance query failed");
        }
        result
    }

    async fn balances_locked(
        &self,
        state: &mut QueryState,
    ) -> Result<TableRecord, AutomationError> {
        let window = self.activate_and_focus(state).await?;

        advance(state, QueryState::Refreshed);
        self.input.send_key_string("F5").await?;
        tokio::time::sleep(SETTLE).await;
        self.input.send_key_string("F4").await?;

        advance(state, QueryState::Extracting);
        let ids: Vec<ControlId> = controls::BALANCE_FIELDS
            .iter()
            .map(|(_, id)| ControlId::Num(*id))
            .collect();
        let found = self.locator.find_controls(window, &ids, &self.policy).await?;

        let mut record = TableRecord::new();
        for (label, id) in controls::BALANCE_FIELDS {
            let control = found.iter().find(|c| c.id == ControlId::Num(*id));
            match control {
                Some(control) => record.push(*label, self.backend.control_text(control)?),
                None => {
                    warn!(field = label, id, "balance control not found");
                    record.push_missing(*label);
                }
            }
        }
        advance(state, QueryState::Done);
        info!(fields = record.len(), "balances read");
        Ok(record)
    }

    /// Shared front of both paths: re-resolve the trading window by its
    /// companion executable, then click it so the shortcuts that follow are
    /// not ignored.
    async fn activate_and_focus(
        &self,
        state: &mut QueryState,
    ) -> Result<WindowRef, AutomationError> {
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

        advance(state, QueryState::Focused);
        self.input.click_window(window).await?;
        tokio::time::sleep(SETTLE).await;
        Ok(window)
    }

    async fn dispatch(&self, kind: QueryKind, window: WindowRef) -> Result<(), AutomationError> {
        match kind {
            QueryKind::Positions => {
                self.input.send_key_string("F4").await?;
            }
            QueryKind::TodayTrades => {
                self.input.send_key_string("F4").await?;
                tokio::time::sleep(SHORT_SETTLE).await;
                let path: Vec<String> = controls::TODAY_TRADES_PATH
                    .iter()
                    .map(|s| s.to_string())
                    .collect();
                let leaf = self
                    .locator
                    .find_control_by_path(
                        window,
                        &ControlId::Num(ids::NAV_TREE),
                        &path,
                        &self.policy,
                    )
                    .await?;
                self.backend.click_control(&leaf)?;
                debug!("navigation leaf clicked");
                tokio::time::sleep(SETTLE).await;
            }
        }
        Ok(())
    }

    /// The terminal writes the clipboard asynchronously after the copy
    /// chord; a read can race it, so transient failures are retried briefly.
    async fn read_clipboard(&self) -> Result<String, AutomationError> {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let mut last_err = None;
        for attempt in 1..=policy.attempts() {
            match self.backend.clipboard_text() {
                Ok(text) => return Ok(text),
                Err(e) => {
                    debug!(attempt, error = %e, "clipboard read failed");
                    last_err = Some(e);
                }
            }
            if attempt < policy.attempts() {
                tokio::time::sleep(policy.delay()).await;
            }
        }
        Err(last_err.unwrap_or_else(|| {
            AutomationError::PlatformError("clipboard unavailable".to_string())
        }))
    }
}

fn advance(state: &mut QueryState, next: QueryState) {
    debug!(from = ?*state, to = ?next, "state transition");
    *state = next;
}
