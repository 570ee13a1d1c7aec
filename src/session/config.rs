use serde::{Deserialize, Serialize};

use crate::audio::CaptureConfig;
use crate::recognizer::RequestConfig;

/// Configuration for recognition sessions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Capture session settings applied at every start
    pub capture: CaptureConfig,

    /// Options attached to every streaming recognition request
    pub recognition: RequestConfig,
}
