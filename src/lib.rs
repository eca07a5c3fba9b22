pub mod actions;
pub mod audio_capture;
pub mod catalog;
pub mod config;
pub mod confirm;
pub mod cues;
pub mod dispatch;
pub mod display;
pub mod error;
pub mod listener;
pub mod lock;
pub mod matcher;
pub mod network;
pub mod phrases;
pub mod prompts;
pub mod recognizer;
pub mod session;
pub mod speech;
pub mod transcript;
pub mod wake;

pub use error::{AssistantError, Result};
