//! Windows backend built on UI Automation, Win32 input and screen capture.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use sysinfo::System;
use tracing::{debug, warn};
use uiautomation::UIAutomation;
use windows::Win32::Foundation::{BOOL, HWND, LPARAM};
use windows::Win32::System::Threading::GetWindowThreadProcessId;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYEVENTF_KEYUP, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, IsIconic, IsWindowVisible, SetForegroundWindow, ShowWindow, SW_RESTORE,
};

use super::UiBackend;
use crate::errors::AutomationError;
use crate::types::{ControlId, ControlRef, ScreenshotResult, WindowQuery, WindowRef};

/// UIA elements are COM pointers; the underlying interfaces are callable from
/// any thread in MTA mode.
struct ThreadSafeElement(Arc<uiautomation::UIElement>);
unsafe impl Send for ThreadSafeElement {}
unsafe impl Sync for ThreadSafeElement {}

/// Backend state: the ephemeral token tables. Tokens handed to callers index
/// these maps; both maps are cleared whenever a new top-level window is
/// resolved, which bounds their lifetime to one activation attempt.
pub struct WindowsBackend {
    next_token: AtomicU64,
    windows: Mutex<HashMap<u64, ThreadSafeElement>>,
    controls: Mutex<HashMap<u64, ThreadSafeElement>>,
}

impl WindowsBackend {
    pub fn new() -> Result<Self, AutomationError> {
        // Probe UIA availability once up front so construction fails loudly
        // instead of the first query.
        UIAutomation::new().map_err(|e| {
            AutomationError::PlatformError(format!("failed to initialize UI Automation: {e}"))
        })?;
        Ok(Self {
            next_token: AtomicU64::new(1),
            windows: Mutex::new(HashMap::new()),
            controls: Mutex::new(HashMap::new()),
        })
    }

    fn automation(&self) -> Result<UIAutomation, AutomationError> {
        UIAutomation::new()
            .map_err(|e| AutomationError::PlatformError(format!("UI Automation error: {e}")))
    }

    fn window_element(
        &self,
        window: WindowRef,
    ) -> Result<Arc<uiautomation::UIElement>, AutomationError> {
        let windows = self.windows.lock().expect("window table poisoned");
        windows.get(&window.0).map(|e| e.0.clone()).ok_or_else(|| {
            AutomationError::ElementNotFound(format!(
                "window token {} is stale; re-acquire the window",
                window.0
            ))
        })
    }

    fn control_element(
        &self,
        control: &ControlRef,
    ) -> Result<Arc<uiautomation::UIElement>, AutomationError> {
        let controls = self.controls.lock().expect("control table poisoned");
        controls
            .get(&control.handle)
            .map(|e| e.0.clone())
            .ok_or_else(|| {
                AutomationError::ElementNotFound(format!(
                    "control {} token is stale; re-resolve the control",
                    control.id
                ))
            })
    }

    fn store_window(&self, element: uiautomation::UIElement) -> WindowRef {
        // A fresh top-level window invalidates every earlier token.
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let mut windows = self.windows.lock().expect("window table poisoned");
        windows.clear();
        self.controls
            .lock()
            .expect("control table poisoned")
            .clear();
        windows.insert(token, ThreadSafeElement(Arc::new(element)));
        WindowRef(token)
    }

    fn store_control(
        &self,
        window: WindowRef,
        id: &ControlId,
        element: uiautomation::UIElement,
    ) -> ControlRef {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.controls
            .lock()
            .expect("control table poisoned")
            .insert(token, ThreadSafeElement(Arc::new(element)));
        ControlRef {
            window,
            id: id.clone(),
            handle: token,
        }
    }

    /// Enumerate visible top-level windows owned by the process whose image
    /// path equals `exe_path` (case-insensitive).
    fn hwnd_for_process(&self, exe_path: &Path) -> Result<Option<HWND>, AutomationError> {
        let mut hwnds: Vec<HWND> = Vec::new();

        unsafe extern "system" fn enum_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
            let hwnds = unsafe { &mut *(lparam.0 as *mut Vec<HWND>) };
            if unsafe { IsWindowVisible(hwnd) }.as_bool() {
                hwnds.push(hwnd);
            }
            BOOL(1)
        }

        unsafe {
            EnumWindows(Some(enum_proc), LPARAM(&mut hwnds as *mut _ as isize))
                .map_err(|e| AutomationError::PlatformError(format!("EnumWindows failed: {e}")))?;
        }

        let wanted = exe_path.to_string_lossy().to_lowercase();
        let mut system = System::new();
        system.refresh_processes(sysinfo::ProcessesToUpdate::All, true);

        for hwnd in hwnds {
            let mut pid: u32 = 0;
            unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };
            if pid == 0 {
                continue;
            }
            let Some(process) = system.process(sysinfo::Pid::from_u32(pid)) else {
                continue;
            };
            let Some(exe) = process.exe() else { continue };
            if exe.to_string_lossy().to_lowercase() == wanted {
                return Ok(Some(hwnd));
            }
        }
        Ok(None)
    }
}

impl UiBackend for WindowsBackend {
    fn activate_window(&self, exe_path: &Path) -> Result<(), AutomationError> {
        let hwnd = self.hwnd_for_process(exe_path)?.ok_or_else(|| {
            AutomationError::ActivationError(format!(
                "no visible window owned by {}",
                exe_path.display()
            ))
        })?;

        unsafe {
            if IsIconic(hwnd).as_bool() {
                let _ = ShowWindow(hwnd, SW_RESTORE);
            }
            if !SetForegroundWindow(hwnd).as_bool() {
                // Foreground-lock restrictions can reject the Win32 call;
                // UIA focus is the usual way around them.
                warn!("SetForegroundWindow rejected, falling back to UIA focus");
                let automation = self.automation()?;
                let element = automation.element_from_handle(hwnd.into()).map_err(|e| {
                    AutomationError::ActivationError(format!(
                        "window of {} unreachable: {e}",
                        exe_path.display()
                    ))
                })?;
                element.set_focus().map_err(|e| {
                    AutomationError::ActivationError(format!(
                        "failed to focus window of {}: {e}",
                        exe_path.display()
                    ))
                })?;
            }
        }
        debug!(exe = %exe_path.display(), "window activated");
        Ok(())
    }

    fn find_window(&self, query: &WindowQuery) -> Result<Option<WindowRef>, AutomationError> {
        let automation = self.automation()?;
        let element = match query {
            WindowQuery::Title(title) => {
                let matcher = automation
                    .create_matcher()
                    .depth(2)
                    .timeout(0)
                    .name(title.clone());
                matcher.find_first().ok()
            }
            WindowQuery::ClassName(class) => {
                let class = class.clone();
                let matcher = automation
                    .create_matcher()
                    .depth(2)
                    .timeout(0)
                    .filter_fn(Box::new(move |e: &uiautomation::UIElement| {
                        Ok(e.get_classname()? == class)
                    }));
                matcher.find_first().ok()
            }
            WindowQuery::ProcessPath(path) => match self.hwnd_for_process(path)? {
                Some(hwnd) => automation.element_from_handle(hwnd.into()).ok(),
                None => None,
            },
        };
        Ok(element.map(|e| self.store_window(e)))
    }

    fn find_control(
        &self,
        window: WindowRef,
        id: &ControlId,
    ) -> Result<Option<ControlRef>, AutomationError> {
        Ok(self
            .find_controls(window, std::slice::from_ref(id))?
            .into_iter()
            .next())
    }

    fn find_controls(
        &self,
        window: WindowRef,
        ids: &[ControlId],
    ) -> Result<Vec<ControlRef>, AutomationError> {
        let root = self.window_element(window)?;
        let automation = self.automation()?;

        // One walk over the descendant tree for the whole batch, stopping as
        // soon as every requested id has been seen.
        let walker = automation
            .get_control_view_walker()
            .map_err(|e| AutomationError::PlatformError(format!("failed to get tree walker: {e}")))?;
        let mut found: Vec<ControlRef> = Vec::new();
        let mut stack: Vec<uiautomation::UIElement> = Vec::new();
        if let Ok(child) = walker.get_first_child(&root) {
            stack.push(child);
        }
        while let Some(element) = stack.pop() {
            if let Some(id) = ids.iter().find(|id| element_matches(&element, id)) {
                if !found.iter().any(|c| &c.id == id) {
                    found.push(self.store_control(window, id, element.clone()));
                    if found.len() == ids.len() {
                        break;
                    }
                }
            }
            if let Ok(sibling) = walker.get_next_sibling(&element) {
                stack.push(sibling);
            }
            if let Ok(child) = walker.get_first_child(&element) {
                stack.push(child);
            }
        }
        Ok(found)
    }

    fn find_control_by_path(
        &self,
        window: WindowRef,
        root: &ControlId,
        path: &[String],
    ) -> Result<Option<ControlRef>, AutomationError> {
        let Some(root_ref) = self.find_control(window, root)? else {
            return Ok(None);
        };
        let automation = self.automation()?;
        let mut current = self.control_element(&root_ref)?.as_ref().clone();

        for name in path {
            let wanted = name.clone();
            let matcher = automation
                .create_matcher()
                .from(current.clone())
                .timeout(0)
                .filter_fn(Box::new(move |e: &uiautomation::UIElement| {
                    Ok(e.get_name()? == wanted)
                }));
            match matcher.find_first() {
                Ok(next) => current = next,
                Err(_) => {
                    debug!(name = %name, "path hop not found under current node");
                    return Ok(None);
                }
            }
        }
        let id = ControlId::Name(path.last().cloned().unwrap_or_default());
        Ok(Some(self.store_control(window, &id, current)))
    }

    fn click_window(&self, window: WindowRef) -> Result<(), AutomationError> {
        let element = self.window_element(window)?;
        element
            .click()
            .map_err(|e| AutomationError::PlatformError(format!("window click failed: {e}")))
    }

    fn click_control(&self, control: &ControlRef) -> Result<(), AutomationError> {
        let element = self.control_element(control)?;
        element.click().map_err(|e| {
            AutomationError::PlatformError(format!("click on control {} failed: {e}", control.id))
        })
    }

    fn control_text(&self, control: &ControlRef) -> Result<String, AutomationError> {
        let element = self.control_element(control)?;
        element.get_name().map_err(|e| {
            AutomationError::PlatformError(format!(
                "failed to read text of control {}: {e}",
                control.id
            ))
        })
    }

    fn type_text(&self, control: &ControlRef, text: &str) -> Result<(), AutomationError> {
        let element = self.control_element(control)?;
        element.set_focus().map_err(|e| {
            AutomationError::PlatformError(format!("failed to focus control {}: {e}", control.id))
        })?;
        element.send_text(text, 10).map_err(|e| {
            AutomationError::PlatformError(format!(
                "failed to type into control {}: {e}",
                control.id
            ))
        })
    }

    fn capture_control(&self, control: &ControlRef) -> Result<ScreenshotResult, AutomationError> {
        let element = self.control_element(control)?;
        let rect = element.get_bounding_rectangle().map_err(|e| {
            AutomationError::PlatformError(format!("failed to get bounding rectangle: {e}"))
        })?;

        let monitors = xcap::Monitor::all()
            .map_err(|e| AutomationError::PlatformError(format!("failed to get monitors: {e}")))?;
        let monitor = monitors
            .into_iter()
            .find(|m| {
                let (Ok(mx), Ok(my), Ok(mw), Ok(mh)) = (m.x(), m.y(), m.width(), m.height())
                else {
                    return false;
                };
                rect.get_left() < mx + mw as i32
                    && rect.get_left() + rect.get_width() > mx
                    && rect.get_top() < my + mh as i32
                    && rect.get_top() + rect.get_height() > my
            })
            .ok_or_else(|| {
                AutomationError::PlatformError("control is not visible on any monitor".to_string())
            })?;

        let monitor_x = monitor
            .x()
            .map_err(|e| AutomationError::PlatformError(format!("monitor x: {e}")))?;
        let monitor_y = monitor
            .y()
            .map_err(|e| AutomationError::PlatformError(format!("monitor y: {e}")))?;
        let rel_x = (rect.get_left() - monitor_x).max(0) as u32;
        let rel_y = (rect.get_top() - monitor_y).max(0) as u32;
        let width = rect.get_width().max(0) as u32;
        let height = rect.get_height().max(0) as u32;

        let capture = monitor
            .capture_region(rel_x, rel_y, width, height)
            .map_err(|e| AutomationError::PlatformError(format!("failed to capture region: {e}")))?;

        Ok(ScreenshotResult {
            image_data: capture.to_vec(),
            width,
            height,
        })
    }

    fn key_event(&self, vk: u16, down: bool) -> Result<(), AutomationError> {
        let input = INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(vk),
                    wScan: 0,
                    dwFlags: if down {
                        Default::default()
                    } else {
                        KEYEVENTF_KEYUP
                    },
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        };
        let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
        if sent != 1 {
            return Err(AutomationError::PlatformError(format!(
                "SendInput rejected key event vk={vk:#04x} down={down}"
            )));
        }
        Ok(())
    }

    fn clipboard_text(&self) -> Result<String, AutomationError> {
        uiautomation::clipboards::Clipboard::get_text()
            .map_err(|e| AutomationError::PlatformError(format!("clipboard read failed: {e}")))
    }
}

/// Control identity as exposed through UIA: numeric dialog ids surface as the
/// automation id string, named controls match on it directly.
fn element_matches(element: &uiautomation::UIElement, id: &ControlId) -> bool {
    let Ok(automation_id) = element.get_automation_id() else {
        return false;
    };
    match id {
        ControlId::Num(n) => automation_id.parse::<u32>().is_ok_and(|v| v == *n),
        ControlId::Name(name) => automation_id == *name,
    }
}
