//! Common types shared by the locator, input driver and orchestrators.

use std::path::PathBuf;
use std::time::Duration;

/// Opaque reference to a top-level window, handed out by the backend's
/// discovery calls. It indexes an ephemeral, backend-owned table and is only
/// valid for the activation attempt that produced it; orchestrators re-acquire
/// it on every invocation because the external process may have restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowRef(pub(crate) u64);

impl WindowRef {
    pub fn token(&self) -> u64 {
        self.0
    }
}

/// Identifier of an interactive element inside a window. The numeric ids are
/// fixed by the target application's own dialog resources and are treated as
/// an external contract (see `controls`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ControlId {
    Num(u32),
    Name(String),
}

impl std::fmt::Display for ControlId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlId::Num(n) => write!(f, "{n}"),
            ControlId::Name(s) => write!(f, "{s}"),
        }
    }
}

impl From<u32> for ControlId {
    fn from(n: u32) -> Self {
        ControlId::Num(n)
    }
}

impl From<&str> for ControlId {
    fn from(s: &str) -> Self {
        ControlId::Name(s.to_string())
    }
}

/// A `(window, identifier)` pair naming one resolved control. The `handle`
/// indexes the backend's control table and shares the window's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRef {
    pub window: WindowRef,
    pub id: ControlId,
    pub(crate) handle: u64,
}

/// Criteria for locating a top-level window. Title/class matching is exact;
/// process-path matching compares the owning process image path
/// case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowQuery {
    Title(String),
    ClassName(String),
    ProcessPath(PathBuf),
}

/// Bounded-retry parameters attached to every locator/input operation.
/// Timeouts in this engine are retry counts with fixed inter-attempt delays,
/// never wall-clock deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// `attempts` is clamped to at least one; a policy that never tries is
    /// meaningless.
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Raw RGBA capture of a control's rendered surface.
#[derive(Debug, Clone)]
pub struct ScreenshotResult {
    /// Raw image data (RGBA)
    pub image_data: Vec<u8>,
    /// Width of the image
    pub width: u32,
    /// Height of the image
    pub height: u32,
}
