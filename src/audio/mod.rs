pub mod backend;
pub mod microphone;

pub use backend::{AudioCaptureBackend, AudioFrame, CaptureCategory, CaptureConfig, CaptureMode};
pub use microphone::MicrophoneBackend;
