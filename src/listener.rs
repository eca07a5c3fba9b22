use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::audio_capture::{AudioFrame, Mailbox};
use crate::error::{AssistantError, Result};
use crate::recognizer::{Grammar, RecognizerFactory, RecognizerRefresher, RecognizerSlot, SpeechRecognizer};

/// Where transcripts come from: the microphone through a recognizer, or
/// lines typed on stdin.
///
/// Commands and prompt answers are read separately because a voice prompt
/// uses its own recognizer without the command grammar.
pub trait Listener: Send {
    /// Wait up to `wait` for the next final command transcript
    fn next_command(&mut self, wait: Duration) -> Result<Option<String>>;

    /// Get ready for a prompt answer: drop pending input and build a fresh
    /// prompt recognizer
    fn start_prompt(&mut self) -> Result<()>;

    /// Wait up to `wait` for the next final prompt answer
    fn next_answer(&mut self, wait: Duration) -> Result<Option<String>>;

    /// Drop any audio or text that arrived but was not read yet
    fn clear(&mut self);

    /// Typed input requires exact command phrases
    fn is_typed(&self) -> bool;
}

/// Microphone listener fed by the capture mailbox
pub struct VoiceListener {
    frames: Arc<Mailbox<AudioFrame>>,
    slot: Arc<RecognizerSlot>,
    command: Option<Box<dyn SpeechRecognizer>>,
    prompt: Option<Box<dyn SpeechRecognizer>>,
    factory: Arc<dyn RecognizerFactory>,
    refresher: Arc<RecognizerRefresher>,
}

impl VoiceListener {
    pub fn new(
        frames: Arc<Mailbox<AudioFrame>>,
        slot: Arc<RecognizerSlot>,
        factory: Arc<dyn RecognizerFactory>,
        refresher: Arc<RecognizerRefresher>,
    ) -> Self {
        Self {
            frames,
            slot,
            command: None,
            prompt: None,
            factory,
            refresher,
        }
    }

    /// Feed the newest frame, if any, to `recognizer`
    fn poll(
        frames: &Mailbox<AudioFrame>,
        recognizer: &mut dyn SpeechRecognizer,
        wait: Duration,
    ) -> Option<String> {
        // Older frames were overwritten in the mailbox; this is the latest
        let frame = frames.take_timeout(wait)?;
        if !recognizer.accept(&frame) {
            return None;
        }
        let result = recognizer.result();
        result.is_final.then_some(result.transcript)
    }
}

impl Listener for VoiceListener {
    fn next_command(&mut self, wait: Duration) -> Result<Option<String>> {
        if let Some(fresh) = self.slot.take() {
            log::trace!("Swapped in refreshed recognizer");
            self.command = Some(fresh);
        }
        let Some(recognizer) = self.command.as_deref_mut() else {
            thread::sleep(wait);
            return Ok(None);
        };
        Ok(Self::poll(&self.frames, recognizer, wait))
    }

    fn start_prompt(&mut self) -> Result<()> {
        let grammar = self.refresher.phrases().prompt_grammar();
        self.prompt = Some(self.factory.build(Grammar::Phrases(grammar))?);
        self.frames.clear();
        Ok(())
    }

    fn next_answer(&mut self, wait: Duration) -> Result<Option<String>> {
        if self.prompt.is_none() {
            self.start_prompt()?;
        }
        let Some(recognizer) = self.prompt.as_deref_mut() else {
            return Ok(None);
        };
        Ok(Self::poll(&self.frames, recognizer, wait))
    }

    fn clear(&mut self) {
        self.frames.clear();
    }

    fn is_typed(&self) -> bool {
        false
    }
}

/// Typed mode: lines read from stdin on a background thread
pub struct TypedListener {
    lines: Receiver<String>,
}

impl TypedListener {
    pub fn stdin() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("stdin-reader".into())
            .spawn(move || {
                for line in io::stdin().lock().lines() {
                    match line {
                        Ok(line) => {
                            if tx.send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            log::error!("❌ Failed to read stdin: {}", e);
                            break;
                        }
                    }
                }
                log::debug!("stdin closed");
            })
            .map(|_| ())
            .unwrap_or_else(|e| log::error!("❌ Could not start stdin reader: {}", e));
        Self { lines: rx }
    }

    /// Read lines from an existing channel
    pub fn from_channel(lines: Receiver<String>) -> Self {
        Self { lines }
    }

    fn recv(&mut self, wait: Duration) -> Result<Option<String>> {
        match self.lines.recv_timeout(wait) {
            Ok(line) => Ok(Some(line)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(AssistantError::InputClosed),
        }
    }
}

impl Listener for TypedListener {
    fn next_command(&mut self, wait: Duration) -> Result<Option<String>> {
        self.recv(wait)
    }

    fn start_prompt(&mut self) -> Result<()> {
        println!("(type your answer)");
        Ok(())
    }

    fn next_answer(&mut self, wait: Duration) -> Result<Option<String>> {
        self.recv(wait)
    }

    fn clear(&mut self) {
        while self.lines.try_recv().is_ok() {}
    }

    fn is_typed(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSource;
    use crate::config::ConfigStore;
    use crate::recognizer::{RecognitionResult, RecognizerError};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Finalizes every frame as the given text
    struct Fixed(&'static str);

    impl SpeechRecognizer for Fixed {
        fn accept(&mut self, _frame: &AudioFrame) -> bool {
            true
        }

        fn result(&mut self) -> RecognitionResult {
            RecognitionResult::final_text(self.0)
        }
    }

    #[derive(Default)]
    struct PromptFactory {
        grammars: Mutex<Vec<Grammar>>,
    }

    impl RecognizerFactory for PromptFactory {
        fn build(&self, grammar: Grammar) -> std::result::Result<Box<dyn SpeechRecognizer>, RecognizerError> {
            self.grammars.lock().unwrap().push(grammar);
            Ok(Box::new(Fixed("confirm")))
        }
    }

    fn voice(dir: &TempDir) -> (Arc<Mailbox<AudioFrame>>, Arc<RecognizerSlot>, Arc<PromptFactory>, VoiceListener) {
        let frames = Arc::new(Mailbox::new());
        let slot = Arc::new(RecognizerSlot::new());
        let factory = Arc::new(PromptFactory::default());
        let refresher = Arc::new(RecognizerRefresher::new(
            ConfigStore::in_dir(dir.path()),
            CatalogSource::new(dir.path().join("commands.json")),
            factory.clone(),
            slot.clone(),
        ));
        let listener = VoiceListener::new(frames.clone(), slot.clone(), factory.clone(), refresher);
        (frames, slot, factory, listener)
    }

    #[test]
    fn test_voice_listener_uses_latest_recognizer() {
        let dir = TempDir::new().unwrap();
        let (frames, slot, _factory, mut listener) = voice(&dir);

        // No recognizer yet: nothing is recognized
        frames.post(AudioFrame::new(vec![0; 16], 16_000));
        assert_eq!(listener.next_command(Duration::from_millis(1)).unwrap(), None);

        slot.post(Box::new(Fixed("lock system")));
        frames.post(AudioFrame::new(vec![0; 16], 16_000));
        assert_eq!(
            listener.next_command(Duration::from_millis(50)).unwrap().as_deref(),
            Some("lock system")
        );

        slot.post(Box::new(Fixed("sleep system")));
        frames.post(AudioFrame::new(vec![0; 16], 16_000));
        assert_eq!(
            listener.next_command(Duration::from_millis(50)).unwrap().as_deref(),
            Some("sleep system")
        );
    }

    #[test]
    fn test_voice_prompt_uses_prompt_grammar() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("commands.json"),
            r#"{"commands": {"lock system": null}}"#,
        )
        .unwrap();
        let (frames, _slot, factory, mut listener) = voice(&dir);

        listener.start_prompt().unwrap();
        frames.post(AudioFrame::new(vec![0; 16], 16_000));
        assert_eq!(
            listener.next_answer(Duration::from_millis(50)).unwrap().as_deref(),
            Some("confirm")
        );

        let grammars = factory.grammars.lock().unwrap();
        let Grammar::Phrases(phrases) = &grammars[0] else {
            panic!("prompt recognizer must be grammar constrained");
        };
        assert!(phrases.contains(&"decline".to_string()));
        assert!(!phrases.contains(&"lock system".to_string()));
    }

    #[test]
    fn test_typed_listener_reads_lines() {
        let (tx, rx) = mpsc::channel();
        let mut listener = TypedListener::from_channel(rx);
        tx.send("lock system".to_string()).unwrap();
        tx.send("stale".to_string()).unwrap();

        assert_eq!(
            listener.next_command(Duration::from_millis(10)).unwrap().as_deref(),
            Some("lock system")
        );
        listener.clear();
        assert_eq!(listener.next_answer(Duration::from_millis(10)).unwrap(), None);

        drop(tx);
        assert!(matches!(
            listener.next_command(Duration::from_millis(10)),
            Err(AssistantError::InputClosed)
        ));
        assert!(listener.is_typed());
    }
}
