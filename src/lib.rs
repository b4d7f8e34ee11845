//! UI automation for a GUI-only securities-trading terminal.
//!
//! The terminal exposes no API: it is driven by locating its windows and
//! controls through accessibility identifiers, sending synthetic keyboard and
//! mouse input, and reading results back through the clipboard. A subset of
//! queries are gated behind an image captcha; this crate detects the
//! challenge, solves it with digit-constrained OCR and verifies acceptance
//! before trusting extracted data.
//!
//! [`TradingDesk`] is the entry point. All operations serialize on one
//! process-wide session lock, because two automation sequences interleaving
//! input into the same foreground window would corrupt both.

use std::sync::Arc;

pub mod captcha;
pub mod command;
pub mod config;
pub mod controls;
pub mod errors;
pub mod input;
pub mod keys;
pub mod locator;
pub mod platforms;
pub mod query;
pub mod session;
pub mod table;
#[cfg(test)]
mod tests;
pub mod types;

pub use captcha::{CaptchaChallenge, CaptchaResolver, OcrEngine, TesseractOcr};
pub use command::CommandOrchestrator;
pub use config::DeskConfig;
pub use controls::CancelScope;
pub use errors::AutomationError;
pub use input::InputDriver;
pub use keys::{KeyAction, KeySequence};
pub use locator::ControlLocator;
pub use platforms::UiBackend;
pub use query::{QueryKind, QueryOrchestrator, QueryState};
pub use session::SessionLock;
pub use table::TableRecord;
pub use types::{ControlId, ControlRef, RetryPolicy, ScreenshotResult, WindowQuery, WindowRef};

/// The main entry point: owns the platform backend and both orchestrators.
pub struct TradingDesk {
    query: QueryOrchestrator,
    command: CommandOrchestrator,
}

impl TradingDesk {
    /// Build a desk on the current platform's backend. Spawns the OCR
    /// warm-up in the background so the first captcha solve is not penalized
    /// by model-load latency.
    pub fn new(config: DeskConfig) -> Result<Self, AutomationError> {
        let backend = platforms::create_backend()?;
        let ocr = TesseractOcr::new(&config.ocr_dir);
        ocr.spawn_warmup();
        Ok(Self::with_backend(backend, Arc::new(ocr), config))
    }

    /// Build a desk over an explicit backend and OCR engine. This is the
    /// seam the tests use; it also allows embedding a non-default backend.
    pub fn with_backend(
        backend: Arc<dyn UiBackend>,
        ocr: Arc<dyn OcrEngine>,
        config: DeskConfig,
    ) -> Self {
        let session = Arc::new(SessionLock::new());
        let captcha = CaptchaResolver::new(backend.clone(), ocr, config.captcha_image_path());
        let query = QueryOrchestrator::new(backend.clone(), captcha, session.clone(), config.clone());
        let command = CommandOrchestrator::new(backend, session, config);
        Self { query, command }
    }

    /// Current positions, captcha-verified.
    pub async fn positions(&self) -> Result<Vec<TableRecord>, AutomationError> {
        self.query.fetch(QueryKind::Positions).await
    }

    /// Fills of the day, captcha-verified.
    pub async fn today_trades(&self) -> Result<Vec<TableRecord>, AutomationError> {
        self.query.fetch(QueryKind::TodayTrades).await
    }

    /// Balance figures read directly from the funds view.
    pub async fn balances(&self) -> Result<TableRecord, AutomationError> {
        self.query.balances().await
    }

    /// Cancel open orders in the given scope.
    pub async fn cancel_orders(&self, scope: CancelScope) -> Result<(), AutomationError> {
        self.command.cancel_orders(scope).await
    }
}
