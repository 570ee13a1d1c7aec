// Deterministic stand-in recognizer for demos and tests

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::debug;

use super::service::{
    RecognitionEvent, RecognitionRequest, RecognitionResult, RecognitionStream, RecognitionTask,
    SpeechRecognizer,
};

/// Scripted recognizer
///
/// Plays back a fixed sequence of recognition events, one step per N received
/// audio chunks. Deterministic by construction, so demos and tests can drive
/// the full session lifecycle without a platform speech service.
pub struct ScriptedRecognizer {
    script: Arc<Mutex<VecDeque<RecognitionEvent>>>,
    availability_tx: watch::Sender<bool>,
    on_device: bool,
    /// Audio chunks consumed per emitted script step
    frames_per_step: usize,
}

impl ScriptedRecognizer {
    pub fn new(script: Vec<RecognitionEvent>) -> Self {
        Self::with_frames_per_step(script, 1)
    }

    pub fn with_frames_per_step(script: Vec<RecognitionEvent>, frames_per_step: usize) -> Self {
        let (availability_tx, _) = watch::channel(true);
        Self {
            script: Arc::new(Mutex::new(script.into())),
            availability_tx,
            on_device: true,
            frames_per_step: frames_per_step.max(1),
        }
    }

    /// Build a script of cumulative partial results for each word prefix of
    /// `phrase`, ending with the full phrase as the final result.
    pub fn from_phrase(phrase: &str, frames_per_step: usize) -> Self {
        let words: Vec<&str> = phrase.split_whitespace().collect();
        let mut script = Vec::new();

        for prefix_len in 1..words.len() {
            script.push(RecognitionEvent::Result(RecognitionResult {
                text: words[..prefix_len].join(" "),
                is_final: false,
            }));
        }
        script.push(RecognitionEvent::Result(RecognitionResult {
            text: words.join(" "),
            is_final: true,
        }));

        Self::with_frames_per_step(script, frames_per_step)
    }

    /// Flip availability, notifying subscribers.
    pub fn set_available(&self, available: bool) {
        self.availability_tx.send_replace(available);
    }

    pub fn set_on_device(&mut self, on_device: bool) {
        self.on_device = on_device;
    }

    /// Script steps not yet played back.
    pub async fn remaining_steps(&self) -> usize {
        self.script.lock().await.len()
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    fn is_available(&self) -> bool {
        *self.availability_tx.borrow()
    }

    fn supports_on_device_recognition(&self) -> bool {
        self.on_device
    }

    async fn submit(&self, request: &mut RecognitionRequest) -> Result<RecognitionStream> {
        let mut audio = request
            .take_audio()
            .context("Request was already submitted")?;
        let report_partials = request.config().report_partial_results;
        let script = Arc::clone(&self.script);
        let frames_per_step = self.frames_per_step;

        let (event_tx, event_rx) = mpsc::channel(100);
        let cancelled = Arc::new(AtomicBool::new(false));
        let cancel_flag = Arc::clone(&cancelled);

        let handle = tokio::spawn(async move {
            let mut frames_since_step = 0;

            while let Some(_chunk) = audio.recv().await {
                if cancel_flag.load(Ordering::SeqCst) {
                    break;
                }

                frames_since_step += 1;
                if frames_since_step < frames_per_step {
                    continue;
                }
                frames_since_step = 0;

                // Pop steps until one is deliverable; partials may be
                // suppressed by the request configuration
                loop {
                    let step = script.lock().await.pop_front();
                    let Some(event) = step else { break };

                    let is_partial = matches!(
                        &event,
                        RecognitionEvent::Result(result) if !result.is_final
                    );
                    if is_partial && !report_partials {
                        debug!("Suppressing partial result");
                        continue;
                    }

                    let terminal = event.is_terminal();
                    if event_tx.send(event).await.is_err() || terminal {
                        return;
                    }
                    break;
                }
            }

            debug!("Audio stream ended before the script finished");
        });

        Ok(RecognitionStream {
            events: event_rx,
            task: RecognitionTask::new(cancelled, handle),
        })
    }

    fn subscribe_availability(&self) -> watch::Receiver<bool> {
        self.availability_tx.subscribe()
    }
}
