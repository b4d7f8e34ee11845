//! Scripted in-memory backend and OCR engine for driving the orchestrators
//! without a real desktop.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::captcha::OcrEngine;
use crate::controls::ids;
use crate::errors::AutomationError;
use crate::platforms::UiBackend;
use crate::types::{ControlId, ControlRef, ScreenshotResult, WindowQuery, WindowRef};

/// Backend whose observable side effects go into one append-only event log.
/// Pure lookups are counted but not logged, so interleaving assertions see
/// only what would actually reach the target window.
pub struct MockBackend {
    events: Mutex<Vec<String>>,
    window_attempts: AtomicU32,
    control_attempts: AtomicU32,
    /// `find_window` succeeds from this attempt on; `u32::MAX` = never.
    window_found_on_attempt: u32,
    /// Controls that do not exist in the scripted window.
    missing_controls: HashSet<u32>,
    /// Whether the terminal renders the captcha dialog for this query.
    captcha_present: bool,
    /// Whether the terminal accepts the submitted answer (the rejection
    /// indicator stays absent after confirm).
    captcha_accepts: bool,
    confirmed: Mutex<bool>,
    clipboard: String,
    next_handle: AtomicU32,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            window_attempts: AtomicU32::new(0),
            control_attempts: AtomicU32::new(0),
            window_found_on_attempt: 1,
            missing_controls: HashSet::new(),
            captcha_present: false,
            captcha_accepts: true,
            confirmed: Mutex::new(false),
            clipboard: String::new(),
            next_handle: AtomicU32::new(1),
        }
    }
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_clipboard(clipboard: &str) -> Arc<Self> {
        Arc::new(Self {
            clipboard: clipboard.to_string(),
            ..Self::default()
        })
    }

    pub fn window_never_found() -> Arc<Self> {
        Arc::new(Self {
            window_found_on_attempt: u32::MAX,
            ..Self::default()
        })
    }

    pub fn window_found_on_attempt(attempt: u32) -> Arc<Self> {
        Arc::new(Self {
            window_found_on_attempt: attempt,
            ..Self::default()
        })
    }

    pub fn with_captcha(accepts: bool, clipboard: &str) -> Arc<Self> {
        Arc::new(Self {
            captcha_present: true,
            captcha_accepts: accepts,
            clipboard: clipboard.to_string(),
            ..Self::default()
        })
    }

    pub fn without_controls(ids: &[u32]) -> Arc<Self> {
        Arc::new(Self {
            missing_controls: ids.iter().copied().collect(),
            ..Self::default()
        })
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn window_attempts(&self) -> u32 {
        self.window_attempts.load(Ordering::SeqCst)
    }

    pub fn control_attempts(&self) -> u32 {
        self.control_attempts.load(Ordering::SeqCst)
    }

    fn log(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    fn control_present(&self, id: &ControlId) -> bool {
        match id {
            ControlId::Num(n) => {
                if self.missing_controls.contains(n) {
                    return false;
                }
                match *n {
                    ids::CAPTCHA_IMAGE | ids::CAPTCHA_INPUT => self.captcha_present,
                    // Rejection indicator: rendered once a wrong answer has
                    // been confirmed.
                    ids::CAPTCHA_VERIFY => {
                        self.captcha_present
                            && !self.captcha_accepts
                            && *self.confirmed.lock().unwrap()
                    }
                    _ => true,
                }
            }
            ControlId::Name(_) => true,
        }
    }

    fn make_control(&self, window: WindowRef, id: &ControlId) -> ControlRef {
        ControlRef {
            window,
            id: id.clone(),
            handle: self.next_handle.fetch_add(1, Ordering::SeqCst) as u64,
        }
    }
}

impl UiBackend for MockBackend {
    fn activate_window(&self, exe_path: &Path) -> Result<(), AutomationError> {
        let name = exe_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.log(format!("activate:{name}"));
        Ok(())
    }

    fn find_window(&self, _query: &WindowQuery) -> Result<Option<WindowRef>, AutomationError> {
        let attempt = self.window_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt >= self.window_found_on_attempt {
            Ok(Some(WindowRef(1)))
        } else {
            Ok(None)
        }
    }

    fn find_control(
        &self,
        window: WindowRef,
        id: &ControlId,
    ) -> Result<Option<ControlRef>, AutomationError> {
        self.control_attempts.fetch_add(1, Ordering::SeqCst);
        if self.control_present(id) {
            Ok(Some(self.make_control(window, id)))
        } else {
            Ok(None)
        }
    }

    fn find_controls(
        &self,
        window: WindowRef,
        ids: &[ControlId],
    ) -> Result<Vec<ControlRef>, AutomationError> {
        Ok(ids
            .iter()
            .filter(|id| self.control_present(id))
            .map(|id| self.make_control(window, id))
            .collect())
    }

    fn find_control_by_path(
        &self,
        window: WindowRef,
        root: &ControlId,
        path: &[String],
    ) -> Result<Option<ControlRef>, AutomationError> {
        let leaf = path.last().cloned().unwrap_or_default();
        self.log(format!("nav:{root}/{}", path.join("/")));
        Ok(Some(self.make_control(window, &ControlId::Name(leaf))))
    }

    fn click_window(&self, _window: WindowRef) -> Result<(), AutomationError> {
        self.log("click_window");
        Ok(())
    }

    fn click_control(&self, control: &ControlRef) -> Result<(), AutomationError> {
        self.log(format!("click:{}", control.id));
        if control.id == ControlId::Num(ids::CAPTCHA_CONFIRM) {
            *self.confirmed.lock().unwrap() = true;
        }
        Ok(())
    }

    fn control_text(&self, control: &ControlRef) -> Result<String, AutomationError> {
        Ok(format!("text-{}", control.id))
    }

    fn type_text(&self, control: &ControlRef, text: &str) -> Result<(), AutomationError> {
        self.log(format!("type:{}:{text}", control.id));
        Ok(())
    }

    fn capture_control(&self, control: &ControlRef) -> Result<ScreenshotResult, AutomationError> {
        self.log(format!("capture:{}", control.id));
        Ok(ScreenshotResult {
            image_data: vec![255; 10 * 10 * 4],
            width: 10,
            height: 10,
        })
    }

    fn key_event(&self, vk: u16, down: bool) -> Result<(), AutomationError> {
        let dir = if down { "down" } else { "up" };
        self.log(format!("key:{dir}:{vk:04X}"));
        Ok(())
    }

    fn clipboard_text(&self) -> Result<String, AutomationError> {
        self.log("clipboard");
        Ok(self.clipboard.clone())
    }
}

/// Build a desk over a scripted backend, with the captcha image routed into
/// a fresh temp directory. The tempdir must outlive the desk.
pub fn test_desk(
    backend: Arc<MockBackend>,
    ocr: Arc<FakeOcr>,
) -> (crate::TradingDesk, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = crate::DeskConfig {
        app_path: "/opt/broker/hexin.exe".into(),
        cache_dir: dir.path().join("cache"),
        ..crate::DeskConfig::default()
    };
    (crate::TradingDesk::with_backend(backend, ocr, config), dir)
}

/// OCR engine returning a scripted answer and counting invocations.
pub struct FakeOcr {
    result: String,
    calls: AtomicU32,
}

impl FakeOcr {
    pub fn new(result: &str) -> Arc<Self> {
        Arc::new(Self {
            result: result.to_string(),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrEngine for FakeOcr {
    async fn recognize_digits(&self, _image: &Path) -> Result<String, AutomationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }
}
