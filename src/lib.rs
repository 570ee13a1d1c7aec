pub mod audio;
pub mod config;
pub mod recognizer;
pub mod session;

pub use audio::{
    AudioCaptureBackend, AudioFrame, CaptureCategory, CaptureConfig, CaptureMode,
    MicrophoneBackend,
};
pub use config::Config;
pub use recognizer::{
    RecognitionEvent, RecognitionRequest, RecognitionResult, RecognitionStream, RecognitionTask,
    RequestConfig, ScriptedRecognizer, SpeechRecognizer,
};
pub use session::{SessionConfig, SessionController, SessionStats, UNAVAILABLE_MESSAGE};
