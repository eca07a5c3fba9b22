pub mod refresh;

#[cfg(feature = "vosk")]
pub mod vosk;

use thiserror::Error;

use crate::audio_capture::{AudioFrame, Mailbox};

pub use refresh::RecognizerRefresher;

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("Speech model not found at {0}")]
    ModelNotFound(String),
    #[error("Failed to load speech model: {0}")]
    ModelLoad(String),
    #[error("Failed to create recognizer: {0}")]
    Create(String),
    #[error("Speech recognition not compiled in (enable the `vosk` feature)")]
    Unsupported,
}

/// One recognizer output; only final results move the pipeline forward
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    pub transcript: String,
    pub is_final: bool,
}

impl RecognitionResult {
    pub fn final_text(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: true,
        }
    }

    pub fn partial(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: false,
        }
    }
}

/// Speech-to-text engine fed with audio frames
pub trait SpeechRecognizer: Send {
    /// Feed a frame; true when a final result is ready
    fn accept(&mut self, frame: &AudioFrame) -> bool;

    /// The final result after `accept` returned true, otherwise the current
    /// partial hypothesis
    fn result(&mut self) -> RecognitionResult;
}

/// How the recognizer vocabulary is constrained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grammar {
    /// Free-text recognition
    Open,
    /// Only these phrases can be recognized
    Phrases(Vec<String>),
}

/// Builds recognizers; shared between the refresh task and the prompts
pub trait RecognizerFactory: Send + Sync {
    fn build(&self, grammar: Grammar) -> Result<Box<dyn SpeechRecognizer>, RecognizerError>;
}

/// Hand-off slot for freshly built recognizers. The refresh task posts, the
/// recognition loop swaps in whatever is there before reading audio.
pub type RecognizerSlot = Mailbox<Box<dyn SpeechRecognizer>>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl SpeechRecognizer for Echo {
        fn accept(&mut self, frame: &AudioFrame) -> bool {
            !frame.samples.is_empty()
        }

        fn result(&mut self) -> RecognitionResult {
            RecognitionResult::final_text("echo")
        }
    }

    #[test]
    fn test_slot_hands_over_latest_recognizer() {
        let slot = RecognizerSlot::new();
        slot.post(Box::new(Echo));
        slot.post(Box::new(Echo));
        let mut recognizer = slot.take().expect("recognizer posted");
        assert!(slot.take().is_none());
        assert!(recognizer.accept(&AudioFrame::new(vec![1], 16_000)));
        assert_eq!(recognizer.result(), RecognitionResult::final_text("echo"));
    }

    #[test]
    fn test_partial_constructor() {
        let partial = RecognitionResult::partial("lock sy");
        assert!(!partial.is_final);
    }
}
