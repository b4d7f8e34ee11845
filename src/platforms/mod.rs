//! Platform backends.
//!
//! Everything the engine does to the screen goes through [`UiBackend`], a
//! narrow trait over the OS accessibility/input APIs. The orchestrators never
//! see native handles; they hold [`WindowRef`]/[`ControlRef`] tokens that
//! index a table owned by the backend and scoped to one activation attempt.

use std::path::Path;
use std::sync::Arc;

use crate::errors::AutomationError;
use crate::types::{ControlId, ControlRef, ScreenshotResult, WindowQuery, WindowRef};

#[cfg(target_os = "windows")]
pub mod windows;

/// The fixed set of interactions the target application requires. This is
/// deliberately not a general-purpose automation surface.
pub trait UiBackend: Send + Sync {
    /// Bring the top-level window owned by the process at `exe_path` to the
    /// foreground, restoring it first if minimized. One enumeration pass.
    fn activate_window(&self, exe_path: &Path) -> Result<(), AutomationError>;

    /// One enumeration pass for a top-level window. `Ok(None)` means nothing
    /// matched this pass; the locator layers bounded retry on top.
    fn find_window(&self, query: &WindowQuery) -> Result<Option<WindowRef>, AutomationError>;

    /// One scan of `window`'s descendant tree for a control.
    fn find_control(
        &self,
        window: WindowRef,
        id: &ControlId,
    ) -> Result<Option<ControlRef>, AutomationError>;

    /// One scan of the descendant tree for several controls at once,
    /// returning as soon as all requested ids are found. Missing ids are
    /// simply absent from the result.
    fn find_controls(
        &self,
        window: WindowRef,
        ids: &[ControlId],
    ) -> Result<Vec<ControlRef>, AutomationError>;

    /// Walk a named path under the control `root`: at each hop match the
    /// displayed text against direct children first, then any descendant.
    fn find_control_by_path(
        &self,
        window: WindowRef,
        root: &ControlId,
        path: &[String],
    ) -> Result<Option<ControlRef>, AutomationError>;

    /// Synthetic click on the window surface itself (focus acquisition).
    fn click_window(&self, window: WindowRef) -> Result<(), AutomationError>;

    /// Synthetic click on a previously resolved control.
    fn click_control(&self, control: &ControlRef) -> Result<(), AutomationError>;

    /// The control's displayed text.
    fn control_text(&self, control: &ControlRef) -> Result<String, AutomationError>;

    /// Focus the control and type `text` into it.
    fn type_text(&self, control: &ControlRef, text: &str) -> Result<(), AutomationError>;

    /// Capture the control's rendered surface.
    fn capture_control(&self, control: &ControlRef) -> Result<ScreenshotResult, AutomationError>;

    /// Emit one virtual-key transition. Sequencing and delays are the input
    /// driver's job.
    fn key_event(&self, vk: u16, down: bool) -> Result<(), AutomationError>;

    /// Current clipboard text.
    fn clipboard_text(&self) -> Result<String, AutomationError>;
}

/// Create the backend for the current platform.
pub fn create_backend() -> Result<Arc<dyn UiBackend>, AutomationError> {
    #[cfg(target_os = "windows")]
    {
        Ok(Arc::new(windows::WindowsBackend::new()?))
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(AutomationError::UnsupportedPlatform(
            "the trading terminal only runs on Windows; no backend is available on this platform"
                .to_string(),
        ))
    }
}
