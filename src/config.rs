use anyhow::Result;
use serde::Deserialize;

use crate::audio::CaptureConfig;
use crate::recognizer::RequestConfig;
use crate::session::SessionConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub recognizer: RequestConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Session configuration derived from the file settings
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            capture: self.capture.clone(),
            recognition: self.recognizer.clone(),
        }
    }
}
