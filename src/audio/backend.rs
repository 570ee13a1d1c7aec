use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Capture session category (what the input is used for)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureCategory {
    /// Input only
    Record,
    /// Simultaneous input and output
    PlayAndRecord,
}

/// Capture session mode (tuning hint for the input path)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMode {
    Default,
    /// Minimal system processing, for signal analysis
    Measurement,
}

/// Configuration for a capture backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Capture session category
    pub category: CaptureCategory,
    /// Capture session mode
    pub mode: CaptureMode,
    /// Lower other audio output while capturing
    pub duck_others: bool,
    /// Frames per tap buffer delivered to the tap receiver
    pub tap_buffer_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            category: CaptureCategory::Record,
            mode: CaptureMode::Measurement,
            duck_others: true,
            tap_buffer_size: 1024,
        }
    }
}

/// Audio capture backend trait
///
/// Wraps a platform capture capability. The lifecycle mirrors the platform
/// services this crate binds to: `configure` + `activate` set up the capture
/// session, `install_tap` hands out a stream of captured frames, `prepare` +
/// `start` begin delivery, and `stop`/`remove_tap` tear down. `stop` and
/// `remove_tap` must be no-ops when nothing is active, so the controller's
/// idempotent teardown can call them unconditionally.
#[async_trait::async_trait]
pub trait AudioCaptureBackend: Send + Sync {
    /// Configure the capture session (category, mode, options)
    async fn configure(&mut self, config: &CaptureConfig) -> Result<()>;

    /// Activate the audio input resource
    async fn activate(&mut self) -> Result<()>;

    /// Install a tap on the input
    ///
    /// Returns a channel receiver that will receive captured audio frames
    /// once the backend is started. The receiver is the input/tap handle;
    /// dropping it detaches the consumer side.
    async fn install_tap(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Remove the installed tap, if any
    async fn remove_tap(&mut self) -> Result<()>;

    /// Pre-allocate resources ahead of `start`
    fn prepare(&mut self);

    /// Start delivering captured frames to the tap
    async fn start(&mut self) -> Result<()>;

    /// Stop capturing audio
    async fn stop(&mut self) -> Result<()>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
