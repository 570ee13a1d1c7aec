// Microphone capture backend using cpal (default input device)

use anyhow::{bail, Context, Result};
use std::sync::mpsc as std_mpsc;
use std::thread;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use super::backend::{AudioCaptureBackend, AudioFrame, CaptureConfig};

/// Commands marshalled to the stream-owning thread.
///
/// cpal streams are not `Send`, so the stream lives on a dedicated thread and
/// the async side talks to it over channels.
enum WorkerCommand {
    Start(oneshot::Sender<Result<()>>),
    Stop(oneshot::Sender<Result<()>>),
    Shutdown,
}

struct Worker {
    cmd_tx: std_mpsc::Sender<WorkerCommand>,
    handle: thread::JoinHandle<()>,
}

/// Microphone backend
///
/// Captures from the default input device. The capture category/mode settings
/// are advisory here; cpal exposes no session-level equivalent, so they are
/// recorded and logged only.
pub struct MicrophoneBackend {
    config: CaptureConfig,
    worker: Option<Worker>,
    capturing: bool,
}

impl MicrophoneBackend {
    pub fn new() -> Self {
        Self {
            config: CaptureConfig::default(),
            worker: None,
            capturing: false,
        }
    }
}

impl Default for MicrophoneBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AudioCaptureBackend for MicrophoneBackend {
    async fn configure(&mut self, config: &CaptureConfig) -> Result<()> {
        if config.tap_buffer_size == 0 {
            bail!("Tap buffer size must be non-zero");
        }

        info!(
            "Microphone backend configured ({:?}/{:?}, duck_others={}, tap_buffer_size={})",
            config.category, config.mode, config.duck_others, config.tap_buffer_size
        );

        self.config = config.clone();
        Ok(())
    }

    async fn activate(&mut self) -> Result<()> {
        use cpal::traits::HostTrait;

        // Verify an input device exists before the tap thread claims it
        let host = cpal::default_host();
        host.default_input_device()
            .context("No input device available")?;

        debug!("Audio input activated");
        Ok(())
    }

    async fn install_tap(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.worker.is_some() {
            bail!("Tap already installed");
        }

        let (cmd_tx, cmd_rx) = std_mpsc::channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (frame_tx, frame_rx) = mpsc::channel(100);
        let tap_buffer_size = self.config.tap_buffer_size;

        let handle = thread::spawn(move || {
            worker_loop(cmd_rx, ready_tx, frame_tx, tap_buffer_size);
        });

        ready_rx
            .await
            .context("Capture worker exited before reporting readiness")?
            .context("Failed to open input stream")?;

        self.worker = Some(Worker { cmd_tx, handle });

        info!("Tap installed on default input device");

        Ok(frame_rx)
    }

    async fn remove_tap(&mut self) -> Result<()> {
        if let Some(worker) = self.worker.take() {
            let _ = worker.cmd_tx.send(WorkerCommand::Shutdown);
            // Joining is cheap: the worker exits as soon as it sees Shutdown
            let _ = tokio::task::spawn_blocking(move || worker.handle.join()).await;
            info!("Tap removed");
        }
        Ok(())
    }

    fn prepare(&mut self) {
        // The stream is already built when the tap is installed
        debug!("Microphone backend prepared");
    }

    async fn start(&mut self) -> Result<()> {
        let worker = self
            .worker
            .as_ref()
            .context("No tap installed")?;

        let (reply_tx, reply_rx) = oneshot::channel();
        worker
            .cmd_tx
            .send(WorkerCommand::Start(reply_tx))
            .context("Capture worker is gone")?;
        reply_rx.await.context("Capture worker dropped the reply")??;

        self.capturing = true;
        info!("Microphone capture started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.capturing {
            return Ok(());
        }

        if let Some(worker) = self.worker.as_ref() {
            let (reply_tx, reply_rx) = oneshot::channel();
            if worker.cmd_tx.send(WorkerCommand::Stop(reply_tx)).is_ok() {
                if let Ok(Err(e)) = reply_rx.await {
                    error!("Failed to pause input stream: {:#}", e);
                }
            }
        }

        self.capturing = false;
        info!("Microphone capture stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        "cpal microphone"
    }
}

impl Drop for MicrophoneBackend {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.cmd_tx.send(WorkerCommand::Shutdown);
        }
    }
}

/// Accumulates converted samples and ships full tap buffers to the receiver.
struct TapWriter {
    tx: mpsc::Sender<AudioFrame>,
    pending: Vec<i16>,
    sample_rate: u32,
    channels: u16,
    /// Samples per shipped frame (tap buffer size in frames, all channels)
    threshold: usize,
    frames_shipped: u64,
}

impl TapWriter {
    fn new(
        tx: mpsc::Sender<AudioFrame>,
        sample_rate: u32,
        channels: u16,
        tap_buffer_size: usize,
    ) -> Self {
        Self {
            tx,
            pending: Vec::new(),
            sample_rate,
            channels,
            threshold: tap_buffer_size * channels as usize,
            frames_shipped: 0,
        }
    }

    fn push(&mut self, samples: impl Iterator<Item = i16>) {
        self.pending.extend(samples);

        while self.pending.len() >= self.threshold {
            let chunk: Vec<i16> = self.pending.drain(..self.threshold).collect();
            let timestamp_ms = self.frames_shipped * 1000 / self.sample_rate as u64;
            self.frames_shipped += (self.threshold / self.channels as usize) as u64;

            let frame = AudioFrame {
                samples: chunk,
                sample_rate: self.sample_rate,
                channels: self.channels,
                timestamp_ms,
            };

            // Never block the audio callback; drop the frame on backpressure
            let _ = self.tx.try_send(frame);
        }
    }
}

fn stream_err(err: cpal::StreamError) {
    error!("Audio stream error: {}", err);
}

fn worker_loop(
    cmd_rx: std_mpsc::Receiver<WorkerCommand>,
    ready_tx: oneshot::Sender<Result<()>>,
    frame_tx: mpsc::Sender<AudioFrame>,
    tap_buffer_size: usize,
) {
    use cpal::traits::StreamTrait;

    let stream = match build_input_stream(frame_tx, tap_buffer_size) {
        Ok(stream) => {
            let _ = ready_tx.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            WorkerCommand::Start(reply) => {
                let result = stream.play().context("Failed to start input stream");
                let _ = reply.send(result);
            }
            WorkerCommand::Stop(reply) => {
                let result = stream.pause().context("Failed to pause input stream");
                let _ = reply.send(result);
            }
            WorkerCommand::Shutdown => break,
        }
    }

    drop(stream);
    debug!("Capture worker exited");
}

fn build_input_stream(
    frame_tx: mpsc::Sender<AudioFrame>,
    tap_buffer_size: usize,
) -> Result<cpal::Stream> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .context("No input device available")?;

    let config = device
        .default_input_config()
        .context("Failed to get default input config")?;

    let sample_rate = config.sample_rate();
    let channels = config.channels();
    let mut writer = TapWriter::new(frame_tx, sample_rate, channels, tap_buffer_size);

    info!(
        "Input device opened ({}Hz, {} channels, {:?})",
        sample_rate,
        channels,
        config.sample_format()
    );

    let stream = match config.sample_format() {
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config.into(),
            move |data: &[i16], _| {
                writer.push(data.iter().copied());
            },
            stream_err,
            None,
        ),
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config.into(),
            move |data: &[f32], _| {
                writer.push(
                    data.iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
                );
            },
            stream_err,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_input_stream(
            &config.into(),
            move |data: &[u16], _| {
                writer.push(data.iter().map(|&s| (s as i32 - 32768) as i16));
            },
            stream_err,
            None,
        ),
        format => bail!("Unsupported sample format: {:?}", format),
    }
    .context("Failed to build input stream")?;

    Ok(stream)
}
