use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::SessionConfig;
use super::stats::SessionStats;
use crate::audio::AudioCaptureBackend;
use crate::recognizer::{RecognitionEvent, RecognitionRequest, RecognitionTask, SpeechRecognizer};

/// Transcript published when the recognizer goes away mid-session.
pub const UNAVAILABLE_MESSAGE: &str = "Text recognition unavailable. Sorry!";

enum Command {
    Start,
    Stop,
    Toggle,
    Stats(oneshot::Sender<SessionStats>),
    Shutdown,
}

/// Everything the actor reacts to, merged into a single queue so that all
/// state mutation is serialized no matter which task delivered the
/// underlying notification.
enum SessionEvent {
    Command(Command),
    Recognition {
        session_id: String,
        event: RecognitionEvent,
    },
    AvailabilityChanged(bool),
}

enum SessionState {
    Idle,
    Active(ActiveSession),
}

/// Handles for one start-to-stop cycle. The whole value is dropped on
/// teardown, so handles are either all present or all absent.
struct ActiveSession {
    session_id: String,
    started_at: DateTime<Utc>,
    /// Streaming request; the tap pump holds a clone and appends into it
    request: Arc<RecognitionRequest>,
    task: RecognitionTask,
    /// Forwards captured frames into the request
    pump: JoinHandle<()>,
    /// Forwards recognition events into the controller queue
    relay: JoinHandle<()>,
    transcript_updates: u64,
}

/// Handle to the session controller actor
///
/// The controller owns the recording/recognition lifecycle: it configures the
/// capture backend, opens a streaming request to the recognizer, and tears
/// everything down on completion, error, or cancellation. Commands never
/// block; effects become observable through the published `transcript` and
/// `processing` fields.
pub struct SessionController {
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    transcript_rx: watch::Receiver<Option<String>>,
    processing_rx: watch::Receiver<bool>,
    actor: JoinHandle<()>,
    availability_relay: JoinHandle<()>,
}

impl SessionController {
    /// Spawn the controller actor with its external collaborators.
    pub fn spawn(
        config: SessionConfig,
        capture: Box<dyn AudioCaptureBackend>,
        recognizer: Arc<dyn SpeechRecognizer>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (transcript_tx, transcript_rx) = watch::channel(None);
        let (processing_tx, processing_rx) = watch::channel(false);

        // Availability notifications join the same queue as everything else
        let mut availability = recognizer.subscribe_availability();
        let availability_tx = event_tx.clone();
        let availability_relay = tokio::spawn(async move {
            while availability.changed().await.is_ok() {
                let available = *availability.borrow();
                let forwarded = SessionEvent::AvailabilityChanged(available);
                if availability_tx.send(forwarded).is_err() {
                    break;
                }
            }
        });

        let actor = Actor {
            config,
            capture,
            recognizer,
            state: SessionState::Idle,
            transcript_tx,
            processing_tx,
            event_tx: event_tx.clone(),
        };
        let actor = tokio::spawn(actor.run(event_rx));

        Self {
            event_tx,
            transcript_rx,
            processing_rx,
            actor,
            availability_relay,
        }
    }

    /// Begin a session. Ignored (with a warning) when one is already active.
    pub fn start(&self) {
        self.send(Command::Start);
    }

    /// Tear the active session down. Safe to call when idle.
    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    /// `stop` if processing, otherwise `start`.
    pub fn toggle(&self) {
        self.send(Command::Toggle);
    }

    /// Subscribe to the published transcript.
    pub fn transcript(&self) -> watch::Receiver<Option<String>> {
        self.transcript_rx.clone()
    }

    /// Latest published transcript.
    pub fn current_transcript(&self) -> Option<String> {
        self.transcript_rx.borrow().clone()
    }

    /// Subscribe to the published processing flag.
    pub fn processing(&self) -> watch::Receiver<bool> {
        self.processing_rx.clone()
    }

    pub fn is_processing(&self) -> bool {
        *self.processing_rx.borrow()
    }

    /// Snapshot of the controller state.
    ///
    /// Commands are handled in order, so a stats round-trip also confirms
    /// every previously issued command has been processed.
    pub async fn stats(&self) -> SessionStats {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Stats(reply_tx));
        reply_rx.await.unwrap_or_default()
    }

    /// Stop any active session and terminate the actor.
    pub async fn shutdown(self) {
        self.send(Command::Shutdown);
        self.availability_relay.abort();
        if let Err(e) = self.actor.await {
            if !e.is_cancelled() {
                error!("Controller actor panicked: {}", e);
            }
        }
    }

    fn send(&self, command: Command) {
        // Ignore send errors (actor already shut down)
        let _ = self.event_tx.send(SessionEvent::Command(command));
    }
}

struct Actor {
    config: SessionConfig,
    capture: Box<dyn AudioCaptureBackend>,
    recognizer: Arc<dyn SpeechRecognizer>,
    state: SessionState,
    transcript_tx: watch::Sender<Option<String>>,
    processing_tx: watch::Sender<bool>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
}

impl Actor {
    async fn run(mut self, mut event_rx: mpsc::UnboundedReceiver<SessionEvent>) {
        while let Some(event) = event_rx.recv().await {
            match event {
                SessionEvent::Command(Command::Start) => self.handle_start().await,
                SessionEvent::Command(Command::Stop) => self.stop_session().await,
                SessionEvent::Command(Command::Toggle) => {
                    if *self.processing_tx.borrow() {
                        self.stop_session().await;
                    } else {
                        self.handle_start().await;
                    }
                }
                SessionEvent::Command(Command::Stats(reply)) => {
                    let _ = reply.send(self.stats());
                }
                SessionEvent::Command(Command::Shutdown) => {
                    self.stop_session().await;
                    break;
                }
                SessionEvent::Recognition { session_id, event } => {
                    self.handle_recognition(session_id, event).await;
                }
                SessionEvent::AvailabilityChanged(true) => {
                    info!("Speech recognizer is available");
                }
                SessionEvent::AvailabilityChanged(false) => {
                    warn!("Speech recognizer became unavailable");
                    self.transcript_tx
                        .send_replace(Some(UNAVAILABLE_MESSAGE.to_string()));
                    self.stop_session().await;
                }
            }
        }

        debug!("Controller actor exited");
    }

    async fn handle_start(&mut self) {
        if let Err(e) = self.start_session().await {
            error!("Failed to start recognition session: {:#}", e);
            // Converge on idle; every teardown step tolerates absent handles
            self.stop_session().await;
        }
    }

    async fn start_session(&mut self) -> Result<()> {
        if let SessionState::Active(active) = &self.state {
            warn!(
                "Session {} already active, ignoring start",
                active.session_id
            );
            return Ok(());
        }

        let session_id = format!("session-{}", Uuid::new_v4());
        let backend = self.capture.name();
        info!("Starting recognition session {} on {}", session_id, backend);

        // Capture session setup failures are logged but do not block the
        // start; capture may still run with previously applied settings
        if let Err(e) = self.capture.configure(&self.config.capture).await {
            error!("Couldn't configure the capture session properly: {:#}", e);
        }
        if let Err(e) = self.capture.activate().await {
            error!("Couldn't activate the capture session: {:#}", e);
        }

        if !self.recognizer.is_available() {
            bail!("Speech recognizer is unavailable");
        }

        let on_device = self.recognizer.supports_on_device_recognition();
        info!("Supports on-device recognition: {}", on_device);
        if self.config.recognition.require_on_device && !on_device {
            bail!("On-device recognition required but not supported");
        }

        let mut frames = self
            .capture
            .install_tap()
            .await
            .context("Failed to install audio tap")?;

        let mut request = RecognitionRequest::new(self.config.recognition.clone());
        let stream = self
            .recognizer
            .submit(&mut request)
            .await
            .context("Failed to submit recognition request")?;
        let request = Arc::new(request);

        // Tap pump: every captured chunk is appended to the request
        let pump_request = Arc::clone(&request);
        let pump = tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                pump_request.append(frame).await;
            }
        });

        // Relay recognition events into the controller queue, tagged with
        // the session id so leftovers from a torn-down session are dropped
        let mut events = stream.events;
        let relay_tx = self.event_tx.clone();
        let relay_session_id = session_id.clone();
        let relay = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let forwarded = SessionEvent::Recognition {
                    session_id: relay_session_id.clone(),
                    event,
                };
                if relay_tx.send(forwarded).is_err() {
                    break;
                }
            }
        });

        // Commit before starting the engine so a start failure is torn down
        // through the regular stop path
        self.state = SessionState::Active(ActiveSession {
            session_id: session_id.clone(),
            started_at: Utc::now(),
            request,
            task: stream.task,
            pump,
            relay,
            transcript_updates: 0,
        });

        self.capture.prepare();
        self.capture
            .start()
            .await
            .context("Failed to start audio capture")?;

        self.processing_tx.send_replace(true);
        info!("Recognition session started: {}", session_id);

        Ok(())
    }

    /// Idempotent teardown: every step is a no-op on whatever is absent.
    async fn stop_session(&mut self) {
        let state = std::mem::replace(&mut self.state, SessionState::Idle);

        if let SessionState::Active(active) = state {
            let ActiveSession {
                session_id,
                task,
                pump,
                relay,
                request,
                ..
            } = active;

            info!("Stopping recognition session: {}", session_id);

            task.cancel();
            pump.abort();
            relay.abort();
            // Ends the audio stream for recognizers still draining it
            drop(request);
        }

        if let Err(e) = self.capture.stop().await {
            error!("Failed to stop audio capture: {:#}", e);
        }
        if let Err(e) = self.capture.remove_tap().await {
            error!("Failed to remove audio tap: {:#}", e);
        }

        self.processing_tx.send_replace(false);
    }

    async fn handle_recognition(&mut self, session_id: String, event: RecognitionEvent) {
        match &mut self.state {
            SessionState::Active(active) if active.session_id == session_id => {}
            _ => {
                debug!("Dropping stale recognition event for {}", session_id);
                return;
            }
        }

        match event {
            RecognitionEvent::Result(result) => {
                if let SessionState::Active(active) = &mut self.state {
                    active.transcript_updates += 1;
                }
                self.transcript_tx.send_replace(Some(result.text.clone()));

                if result.is_final {
                    info!("Final result for {}: {:?}", session_id, result.text);
                    self.stop_session().await;
                }
            }
            RecognitionEvent::Error(message) => {
                error!("Recognition error in {}: {}", session_id, message);
                self.stop_session().await;
            }
        }
    }

    fn stats(&self) -> SessionStats {
        match &self.state {
            SessionState::Idle => SessionStats {
                is_processing: *self.processing_tx.borrow(),
                ..Default::default()
            },
            SessionState::Active(active) => SessionStats {
                is_processing: *self.processing_tx.borrow(),
                session_id: Some(active.session_id.clone()),
                started_at: Some(active.started_at),
                duration_secs: (Utc::now() - active.started_at).num_milliseconds() as f64
                    / 1000.0,
                transcript_updates: active.transcript_updates,
            },
        }
    }
}
