// Shared test support: a scripted capture backend with inspectable state and
// a recognizer that answers a submission with a fixed event sequence.
#![allow(dead_code)]

use anyhow::{bail, Context, Result};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tap_dictate::{
    AudioCaptureBackend, AudioFrame, CaptureConfig, RecognitionEvent, RecognitionRequest,
    RecognitionStream, RecognitionTask, SpeechRecognizer,
};
use tokio::sync::{mpsc, watch};

#[derive(Default)]
struct Inner {
    configured: Option<CaptureConfig>,
    activated: bool,
    tap_installed: bool,
    capturing: bool,
    frame_tx: Option<mpsc::Sender<AudioFrame>>,
    configure_calls: usize,
    start_calls: usize,
    stop_calls: usize,
    remove_tap_calls: usize,
    name_calls: usize,
}

/// Inspectable state shared between a `MockCaptureBackend` (owned by the
/// controller) and the test body.
#[derive(Default)]
pub struct MockCaptureState {
    inner: Mutex<Inner>,
}

impl MockCaptureState {
    pub fn tap_installed(&self) -> bool {
        self.inner.lock().unwrap().tap_installed
    }

    pub fn is_capturing(&self) -> bool {
        self.inner.lock().unwrap().capturing
    }

    pub fn configured(&self) -> Option<CaptureConfig> {
        self.inner.lock().unwrap().configured.clone()
    }

    pub fn configure_calls(&self) -> usize {
        self.inner.lock().unwrap().configure_calls
    }

    pub fn start_calls(&self) -> usize {
        self.inner.lock().unwrap().start_calls
    }

    pub fn stop_calls(&self) -> usize {
        self.inner.lock().unwrap().stop_calls
    }

    pub fn remove_tap_calls(&self) -> usize {
        self.inner.lock().unwrap().remove_tap_calls
    }

    pub fn name_calls(&self) -> usize {
        self.inner.lock().unwrap().name_calls
    }

    /// Push one captured frame through the installed tap.
    ///
    /// Returns false when no tap is installed or the receiver is gone.
    pub async fn send_frame(&self) -> bool {
        let tx = self.inner.lock().unwrap().frame_tx.clone();
        match tx {
            Some(tx) => tx.send(test_frame()).await.is_ok(),
            None => false,
        }
    }
}

/// Capture backend double driven entirely by the test body.
pub struct MockCaptureBackend {
    state: Arc<MockCaptureState>,
    fail_configure: bool,
    fail_start: bool,
}

impl MockCaptureBackend {
    pub fn new() -> (Self, Arc<MockCaptureState>) {
        let state = Arc::new(MockCaptureState::default());
        (
            Self {
                state: Arc::clone(&state),
                fail_configure: false,
                fail_start: false,
            },
            state,
        )
    }

    /// Backend whose `configure` fails (capture still works otherwise).
    pub fn failing_configure() -> (Self, Arc<MockCaptureState>) {
        let (mut backend, state) = Self::new();
        backend.fail_configure = true;
        (backend, state)
    }

    /// Backend whose `start` fails after the tap is installed.
    pub fn failing_start() -> (Self, Arc<MockCaptureState>) {
        let (mut backend, state) = Self::new();
        backend.fail_start = true;
        (backend, state)
    }
}

#[async_trait::async_trait]
impl AudioCaptureBackend for MockCaptureBackend {
    async fn configure(&mut self, config: &CaptureConfig) -> Result<()> {
        let mut inner = self.state.inner.lock().unwrap();
        inner.configure_calls += 1;
        if self.fail_configure {
            bail!("configure failed");
        }
        inner.configured = Some(config.clone());
        Ok(())
    }

    async fn activate(&mut self) -> Result<()> {
        self.state.inner.lock().unwrap().activated = true;
        Ok(())
    }

    async fn install_tap(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let mut inner = self.state.inner.lock().unwrap();
        if inner.tap_installed {
            bail!("Tap already installed");
        }

        let (tx, rx) = mpsc::channel(100);
        inner.frame_tx = Some(tx);
        inner.tap_installed = true;
        Ok(rx)
    }

    async fn remove_tap(&mut self) -> Result<()> {
        let mut inner = self.state.inner.lock().unwrap();
        inner.remove_tap_calls += 1;
        inner.tap_installed = false;
        inner.frame_tx = None;
        Ok(())
    }

    fn prepare(&mut self) {}

    async fn start(&mut self) -> Result<()> {
        let mut inner = self.state.inner.lock().unwrap();
        inner.start_calls += 1;
        if self.fail_start {
            bail!("engine start failed");
        }
        inner.capturing = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        let mut inner = self.state.inner.lock().unwrap();
        inner.stop_calls += 1;
        inner.capturing = false;
        Ok(())
    }

    fn name(&self) -> &str {
        self.state.inner.lock().unwrap().name_calls += 1;
        "mock capture"
    }
}

/// Recognizer double that delivers a fixed event sequence as soon as a
/// request is submitted, independent of the audio fed into it.
///
/// Unlike `ScriptedRecognizer` it keeps emitting past a terminal event, so
/// tests can queue events behind the one that tears the session down.
pub struct PreloadedRecognizer {
    events: Mutex<Vec<RecognitionEvent>>,
    availability_tx: watch::Sender<bool>,
}

impl PreloadedRecognizer {
    pub fn new(events: Vec<RecognitionEvent>) -> Self {
        let (availability_tx, _) = watch::channel(true);
        Self {
            events: Mutex::new(events),
            availability_tx,
        }
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for PreloadedRecognizer {
    fn is_available(&self) -> bool {
        true
    }

    fn supports_on_device_recognition(&self) -> bool {
        true
    }

    async fn submit(&self, request: &mut RecognitionRequest) -> Result<RecognitionStream> {
        let mut audio = request
            .take_audio()
            .context("Request was already submitted")?;

        let events = std::mem::take(&mut *self.events.lock().unwrap());
        let (event_tx, event_rx) = mpsc::channel(100);
        for event in events {
            let _ = event_tx.try_send(event);
        }

        // Drain appended audio; ends when the request is dropped
        let handle = tokio::spawn(async move {
            while audio.recv().await.is_some() {}
        });

        Ok(RecognitionStream {
            events: event_rx,
            task: RecognitionTask::new(Arc::new(AtomicBool::new(false)), handle),
        })
    }

    fn subscribe_availability(&self) -> watch::Receiver<bool> {
        self.availability_tx.subscribe()
    }
}

/// 100ms of silence at 16kHz mono.
pub fn test_frame() -> AudioFrame {
    AudioFrame {
        samples: vec![0i16; 1600],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms: 0,
    }
}
