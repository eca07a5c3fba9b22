use std::path::Path;
use std::sync::Arc;
use vosk::{DecodingState, Model, Recognizer};

use super::{Grammar, RecognitionResult, RecognizerError, RecognizerFactory, SpeechRecognizer};
use crate::audio_capture::AudioFrame;

/// Recognizers backed by one shared Vosk model
pub struct VoskFactory {
    model: Arc<Model>,
    sample_rate: f32,
}

impl VoskFactory {
    pub fn load(model_path: &Path, sample_rate: u32, quiet: bool) -> Result<Self, RecognizerError> {
        if !model_path.exists() {
            return Err(RecognizerError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        vosk::set_log_level(if quiet {
            vosk::LogLevel::Error
        } else {
            vosk::LogLevel::Info
        });

        log::info!("Loading Vosk model from: {}", model_path.display());
        let path = model_path.to_str().ok_or_else(|| {
            RecognizerError::ModelLoad(format!(
                "model path is not valid UTF-8: {}",
                model_path.display()
            ))
        })?;
        let model = Model::new(path)
            .ok_or_else(|| RecognizerError::ModelLoad(model_path.display().to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            sample_rate: sample_rate as f32,
        })
    }
}

impl RecognizerFactory for VoskFactory {
    fn build(&self, grammar: Grammar) -> Result<Box<dyn SpeechRecognizer>, RecognizerError> {
        let recognizer = match &grammar {
            Grammar::Open => Recognizer::new(&self.model, self.sample_rate),
            Grammar::Phrases(phrases) => {
                log::debug!("⚙️ Using grammar ({} phrases)", phrases.len());
                Recognizer::new_with_grammar(&self.model, self.sample_rate, phrases)
            }
        }
        .ok_or_else(|| RecognizerError::Create(format!("{:?} grammar rejected", grammar)))?;

        Ok(Box::new(VoskRecognizer {
            recognizer,
            finalized: false,
        }))
    }
}

struct VoskRecognizer {
    recognizer: Recognizer,
    finalized: bool,
}

impl SpeechRecognizer for VoskRecognizer {
    fn accept(&mut self, frame: &AudioFrame) -> bool {
        self.finalized = match self.recognizer.accept_waveform(&frame.samples) {
            DecodingState::Finalized => true,
            DecodingState::Running => false,
            DecodingState::Failed => {
                log::debug!("Decoding failed for this frame");
                false
            }
        };
        self.finalized
    }

    fn result(&mut self) -> RecognitionResult {
        if !self.finalized {
            return RecognitionResult::partial(self.recognizer.partial_result().partial);
        }
        self.finalized = false;
        let text = self
            .recognizer
            .result()
            .single()
            .map(|single| single.text.trim().to_string())
            .unwrap_or_default();
        RecognitionResult::final_text(text)
    }
}
