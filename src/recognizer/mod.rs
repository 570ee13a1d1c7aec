//! Speech recognition service seam
//!
//! This module defines the interface the session controller consumes:
//! - `SpeechRecognizer`: the external recognition capability
//! - `RecognitionRequest`: a streaming request audio is appended into
//! - `RecognitionStream` / `RecognitionTask`: events plus cancellation
//! - `ScriptedRecognizer`: a deterministic stand-in implementation

mod scripted;
mod service;

pub use scripted::ScriptedRecognizer;
pub use service::{
    RecognitionEvent, RecognitionRequest, RecognitionResult, RecognitionStream, RecognitionTask,
    RequestConfig, SpeechRecognizer,
};
