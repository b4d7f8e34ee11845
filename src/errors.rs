use thiserror::Error;

/// Crate-wide error type. Every component boundary returns
/// `Result<T, AutomationError>` so retry/abort decisions stay visible in the
/// type instead of being inferred from catch-all handling.
#[derive(Error, Debug)]
pub enum AutomationError {
    /// Window or control still absent after the bounded retries. Recoverable
    /// by a caller-level retry or operator intervention.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Malformed key token in a key sequence. A programming/config error,
    /// never retried.
    #[error("Invalid key token: {0}")]
    InvalidKey(String),

    /// OCR produced no digits for the captcha image. Aborts the current
    /// query only; the engine never resubmits blindly.
    #[error("OCR failure: {0}")]
    OcrFailure(String),

    /// The target application rejected the submitted captcha answer.
    #[error("Captcha challenge rejected: {0}")]
    ChallengeRejected(String),

    /// The trading application is not running or its window could not be
    /// brought to the foreground.
    #[error("Activation failed: {0}")]
    ActivationError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Platform error: {0}")]
    PlatformError(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
}
