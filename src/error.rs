use thiserror::Error;

use crate::actions::ActionError;
use crate::audio_capture::AudioCaptureError;
use crate::config::ConfigError;
use crate::lock::LockError;
use crate::recognizer::RecognizerError;

pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioCaptureError),

    #[error("Recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    #[error("Instance lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Input closed")]
    InputClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
