//! Captcha challenge detection, optical solving and acceptance verification.
//!
//! Some queries make the terminal interpose an image captcha before it will
//! populate the clipboard. Detection is presence-of-control only: the
//! terminal gives no machine-readable challenge state. The engine runs one
//! OCR pass per query and never resubmits blindly; a rejected answer cancels
//! the dialog and surfaces to the caller.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use tracing::{debug, info, instrument, warn};

use crate::controls::ids;
use crate::errors::AutomationError;
use crate::input::InputDriver;
use crate::locator::ControlLocator;
use crate::platforms::UiBackend;
use crate::types::{ControlId, ControlRef, RetryPolicy, WindowRef};

/// The rendered challenge: image control plus answer input box. Exists only
/// while the terminal displays the dialog; lifetime is one query attempt.
#[derive(Debug, Clone)]
pub struct CaptchaChallenge {
    pub image: ControlRef,
    pub input: ControlRef,
}

/// Digit recognition over a saved image file.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize_digits(&self, image: &Path) -> Result<String, AutomationError>;
}

/// OCR via the external Tesseract binary, invoked the way the vendor ships
/// it: `<ocr-dir>/tesseract <image> stdout --psm 6 digits`.
pub struct TesseractOcr {
    binary_dir: PathBuf,
}

static WARMUP_DONE: AtomicBool = AtomicBool::new(false);
static WARMUP_LOCK: Mutex<()> = Mutex::new(());

impl TesseractOcr {
    pub fn new(binary_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary_dir: binary_dir.into(),
        }
    }

    /// Run a throwaway recognition against a blank image on a background
    /// thread, once per process, so the first real solve does not pay the
    /// model-load latency. Warm-up failure is logged and never fatal; the
    /// next real call simply pays the cost instead.
    pub fn spawn_warmup(&self) {
        if WARMUP_DONE.load(Ordering::Acquire) {
            return;
        }
        let binary_dir = self.binary_dir.clone();
        std::thread::spawn(move || {
            let _guard = WARMUP_LOCK.lock().expect("warmup lock poisoned");
            if WARMUP_DONE.load(Ordering::Acquire) {
                return;
            }
            info!("warming up OCR engine");
            match warmup_once(&binary_dir) {
                Ok(()) => {
                    WARMUP_DONE.store(true, Ordering::Release);
                    info!("OCR engine warm-up complete");
                }
                Err(e) => warn!(error = %e, "OCR warm-up failed"),
            }
        });
    }
}

fn warmup_once(binary_dir: &Path) -> Result<(), AutomationError> {
    let blank = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
    let file = tempfile::Builder::new()
        .prefix("ocr-warmup-")
        .suffix(".png")
        .tempfile()
        .map_err(|e| AutomationError::PlatformError(format!("warm-up temp file: {e}")))?;
    blank
        .save(file.path())
        .map_err(|e| AutomationError::PlatformError(format!("warm-up image write: {e}")))?;
    run_tesseract(binary_dir, file.path()).map(|_| ())
}

/// Blocking Tesseract invocation; the async trait method hops it onto the
/// blocking pool.
fn run_tesseract(binary_dir: &Path, image: &Path) -> Result<String, AutomationError> {
    let binary = binary_dir.join("tesseract");
    let output = std::process::Command::new(&binary)
        .arg(image)
        .arg("stdout")
        .args(["--psm", "6", "digits"])
        .output()
        .map_err(|e| {
            AutomationError::PlatformError(format!("failed to run {}: {e}", binary.display()))
        })?;
    if !output.status.success() {
        return Err(AutomationError::OcrFailure(format!(
            "tesseract exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize_digits(&self, image: &Path) -> Result<String, AutomationError> {
        let binary_dir = self.binary_dir.clone();
        let image = image.to_path_buf();
        tokio::task::spawn_blocking(move || run_tesseract(&binary_dir, &image))
            .await
            .map_err(|e| AutomationError::PlatformError(format!("OCR task join error: {e}")))?
    }
}

pub struct CaptchaResolver {
    backend: std::sync::Arc<dyn UiBackend>,
    locator: ControlLocator,
    input: InputDriver,
    ocr: std::sync::Arc<dyn OcrEngine>,
    image_path: PathBuf,
    policy: RetryPolicy,
}

impl CaptchaResolver {
    pub fn new(
        backend: std::sync::Arc<dyn UiBackend>,
        ocr: std::sync::Arc<dyn OcrEngine>,
        image_path: PathBuf,
    ) -> Self {
        let locator = ControlLocator::new(backend.clone());
        let input = InputDriver::new(backend.clone());
        Self {
            backend,
            locator,
            input,
            ocr,
            image_path,
            policy: RetryPolicy::default(),
        }
    }

    /// Look for the challenge. Absence of the image control means "no
    /// challenge for this query" and the caller proceeds straight to
    /// extraction; presence with a missing input box is a malformed dialog
    /// and an error.
    #[instrument(level = "debug", skip(self))]
    pub async fn detect(
        &self,
        window: WindowRef,
    ) -> Result<Option<CaptchaChallenge>, AutomationError> {
        let image_id = ControlId::Num(ids::CAPTCHA_IMAGE);
        let Some(image) = self.locator.peek_control(window, &image_id)? else {
            debug!("no captcha challenge present");
            return Ok(None);
        };
        let input = self
            .locator
            .find_control(window, &ControlId::Num(ids::CAPTCHA_INPUT), &self.policy)
            .await?;
        info!("captcha challenge detected");
        Ok(Some(CaptchaChallenge { image, input }))
    }

    /// Capture the challenge image, OCR it and clean the result down to
    /// digits. An empty recognition is a solve failure; the query aborts
    /// rather than submitting a blind guess.
    #[instrument(level = "debug", skip(self, challenge))]
    pub async fn solve(&self, challenge: &CaptchaChallenge) -> Result<String, AutomationError> {
        if let Some(dir) = self.image_path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                AutomationError::PlatformError(format!(
                    "failed to create cache dir {}: {e}",
                    dir.display()
                ))
            })?;
        }

        let shot = self.backend.capture_control(&challenge.image)?;
        let image = RgbaImage::from_raw(shot.width, shot.height, shot.image_data)
            .ok_or_else(|| {
                AutomationError::PlatformError("captured image has inconsistent dimensions".into())
            })?;
        image.save(&self.image_path).map_err(|e| {
            AutomationError::PlatformError(format!(
                "failed to save captcha image to {}: {e}",
                self.image_path.display()
            ))
        })?;
        info!(path = %self.image_path.display(), "captcha image saved");

        let raw = self.ocr.recognize_digits(&self.image_path).await?;
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        info!(digits = %digits, "OCR result");
        if digits.is_empty() {
            return Err(AutomationError::OcrFailure(
                "recognition produced no digits".to_string(),
            ));
        }
        Ok(digits)
    }

    /// Submit the cleaned digits, confirm, and verify acceptance by probing
    /// the dialog's rejection indicator: still present means the terminal
    /// refused the answer, in which case the dialog is cancelled exactly
    /// once and the query aborts. No automatic re-OCR; one pass per query.
    #[instrument(level = "debug", skip(self, challenge, digits))]
    pub async fn submit_and_verify(
        &self,
        window: WindowRef,
        challenge: &CaptchaChallenge,
        digits: &str,
    ) -> Result<(), AutomationError> {
        self.input
            .type_text(window, &challenge.input.id, digits, &self.policy)
            .await?;
        self.input
            .click_control(window, &ControlId::Num(ids::CAPTCHA_CONFIRM), &self.policy)
            .await?;

        let verify_id = ControlId::Num(ids::CAPTCHA_VERIFY);
        if self.locator.peek_control(window, &verify_id)?.is_some() {
            warn!("captcha answer rejected, cancelling dialog");
            if let Some(cancel) = self
                .locator
                .peek_control(window, &ControlId::Num(ids::CAPTCHA_CANCEL))?
            {
                if let Err(e) = self.backend.click_control(&cancel) {
                    warn!(error = %e, "failed to click captcha cancel button");
                }
            }
            return Err(AutomationError::ChallengeRejected(
                "rejection indicator still present after confirmation".to_string(),
            ));
        }
        debug!("captcha accepted");
        Ok(())
    }
}
