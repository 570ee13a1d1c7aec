use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::audio::AudioFrame;

/// Per-request recognition options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Deliver partial (interim) results as they form
    pub report_partial_results: bool,
    /// Refuse to start unless recognition runs fully on-device
    pub require_on_device: bool,
    /// Force a specific locale instead of the system default
    pub locale: Option<String>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            report_partial_results: true,
            require_on_device: false,
            locale: None,
        }
    }
}

/// A single recognition hypothesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    /// Best transcription so far
    pub text: String,
    /// No further updates follow for this request when set
    pub is_final: bool,
}

/// Events delivered for a submitted recognition request
#[derive(Debug, Clone)]
pub enum RecognitionEvent {
    Result(RecognitionResult),
    Error(String),
}

impl RecognitionEvent {
    /// Whether this event ends the stream (error or final result)
    pub fn is_terminal(&self) -> bool {
        match self {
            RecognitionEvent::Result(result) => result.is_final,
            RecognitionEvent::Error(_) => true,
        }
    }
}

/// Streaming recognition request
///
/// Captured audio is appended chunk by chunk; the recognizer takes over the
/// audio side on submission. Dropping the request ends the audio stream.
pub struct RecognitionRequest {
    config: RequestConfig,
    audio_tx: mpsc::Sender<AudioFrame>,
    audio_rx: Option<mpsc::Receiver<AudioFrame>>,
}

impl RecognitionRequest {
    pub fn new(config: RequestConfig) -> Self {
        let (audio_tx, audio_rx) = mpsc::channel(100);
        Self {
            config,
            audio_tx,
            audio_rx: Some(audio_rx),
        }
    }

    /// Append a captured audio chunk. Silently discarded once the consuming
    /// task is gone.
    pub async fn append(&self, frame: AudioFrame) {
        let _ = self.audio_tx.send(frame).await;
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Take the audio stream. Yields `None` after the first submission.
    pub fn take_audio(&mut self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.audio_rx.take()
    }
}

/// Handle to an in-flight recognition task
pub struct RecognitionTask {
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl RecognitionTask {
    pub fn new(cancelled: Arc<AtomicBool>, handle: JoinHandle<()>) -> Self {
        Self { cancelled, handle }
    }

    /// Cancel the task; no further events are delivered after this returns.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.handle.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A submitted request: the event stream plus its cancellable task
pub struct RecognitionStream {
    /// Recognition events in emission order; the last one is terminal
    pub events: mpsc::Receiver<RecognitionEvent>,
    pub task: RecognitionTask,
}

/// Speech recognition service trait
///
/// Wraps an external recognition capability. Implementations own voice
/// activity detection, buffering and model selection; this crate only
/// sequences requests into them.
#[async_trait::async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Whether the capability can currently serve requests
    fn is_available(&self) -> bool;

    /// Whether recognition can run without leaving the device
    fn supports_on_device_recognition(&self) -> bool;

    /// Submit a streaming request, taking over its audio side
    async fn submit(&self, request: &mut RecognitionRequest) -> Result<RecognitionStream>;

    /// Subscribe to availability changes
    fn subscribe_availability(&self) -> watch::Receiver<bool>;
}
