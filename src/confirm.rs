use std::time::{Duration, Instant};

use crate::config::ConfirmationSettings;
use crate::error::Result;
use crate::listener::Listener;
use crate::matcher::FuzzyMatcher;
use crate::speech::Speaker;
use crate::transcript::normalize;

/// Upper bound for one listener read, keeps deadlines accurate
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Confirmed,
    Declined,
}

/// Read prompt answers until one arrives or `deadline` passes.
/// Blank answers are skipped.
pub fn next_answer_before(listener: &mut dyn Listener, deadline: Instant) -> Result<Option<String>> {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(None);
        }
        if let Some(text) = listener.next_answer(remaining.min(POLL_INTERVAL))? {
            let text = normalize(&text);
            if !text.is_empty() {
                return Ok(Some(text));
            }
        }
    }
}

/// Ask for the confirm or decline word.
///
/// Up to `settings.attempts` rounds of `settings.timeout` each; answers are
/// fuzzy matched against the two words only. Running out of attempts counts
/// as a decline.
pub fn wait_for_confirmation(
    listener: &mut dyn Listener,
    speaker: &dyn Speaker,
    settings: &ConfirmationSettings,
    echo: bool,
) -> Result<bool> {
    let matcher = FuzzyMatcher::new(settings.strictness);
    let words = [settings.confirm.as_str(), settings.decline.as_str()];
    let verb = if listener.is_typed() { "type" } else { "say" };
    listener.start_prompt()?;

    for attempt in 1..=settings.attempts {
        listener.clear();
        println!("[Waiting for response] Attempt {}/{}", attempt, settings.attempts);
        println!("{} {} or {}:", verb, settings.confirm, settings.decline);

        let deadline = Instant::now() + settings.timeout;
        while let Some(text) = next_answer_before(listener, deadline)? {
            if echo {
                println!("{}", text);
            }
            match matcher.find(&text, words).map(|w| classify(&w, settings)) {
                Some(Answer::Confirmed) => {
                    println!("[CONFIRM] → confirmed");
                    return Ok(true);
                }
                Some(Answer::Declined) => {
                    println!("[CONFIRM] → declined");
                    return Ok(false);
                }
                None => log::debug!("Ignoring '{}' while waiting for confirmation", text),
            }
        }

        if attempt < settings.attempts {
            speaker.speak(&format!(
                "Sorry, I did not understand. Please {} {} or {}.",
                verb, settings.confirm, settings.decline
            ));
        } else {
            println!("Invalid choice\nPlease use {} or {}", settings.confirm, settings.decline);
        }
    }

    listener.clear();
    Ok(false)
}

fn classify(word: &str, settings: &ConfirmationSettings) -> Answer {
    if word == settings.confirm {
        Answer::Confirmed
    } else {
        Answer::Declined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::TypedListener;
    use std::sync::mpsc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Transcript(Mutex<Vec<String>>);

    impl Speaker for Transcript {
        fn speak(&self, text: &str) {
            self.0.lock().unwrap().push(text.to_string());
        }
    }

    fn settings() -> ConfirmationSettings {
        ConfirmationSettings {
            timeout: Duration::from_millis(30),
            ..Default::default()
        }
    }

    /// Typed listener that receives `line` shortly after the prompt starts
    fn answering_later(line: &'static str) -> (std::thread::JoinHandle<mpsc::Sender<String>>, TypedListener) {
        let (tx, rx) = mpsc::channel();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            tx.send(line.to_string()).unwrap();
            tx
        });
        (handle, TypedListener::from_channel(rx))
    }

    fn patient() -> ConfirmationSettings {
        ConfirmationSettings {
            timeout: Duration::from_secs(2),
            ..Default::default()
        }
    }

    #[test]
    fn test_confirmed() {
        let speaker = Transcript::default();
        let (sender, mut listener) = answering_later("Confirm");
        assert!(wait_for_confirmation(&mut listener, &speaker, &patient(), false).unwrap());
        drop(sender.join().unwrap());
        assert!(speaker.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fuzzy_decline() {
        let speaker = Transcript::default();
        let (sender, mut listener) = answering_later("declin");
        assert!(!wait_for_confirmation(&mut listener, &speaker, &patient(), true).unwrap());
        drop(sender.join().unwrap());
    }

    #[test]
    fn test_unrelated_answer_keeps_listening() {
        let speaker = Transcript::default();
        let (tx, rx) = mpsc::channel();
        let mut listener = TypedListener::from_channel(rx);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            tx.send("lock system".to_string()).unwrap();
            tx.send("confirm".to_string()).unwrap();
            tx
        });
        assert!(wait_for_confirmation(&mut listener, &speaker, &patient(), false).unwrap());
        drop(handle.join().unwrap());
    }

    #[test]
    fn test_exhausted_attempts_decline() {
        let speaker = Transcript::default();
        let (_tx, rx) = mpsc::channel::<String>();
        let mut listener = TypedListener::from_channel(rx);

        let started = Instant::now();
        let confirmed = wait_for_confirmation(&mut listener, &speaker, &settings(), false).unwrap();

        assert!(!confirmed);
        assert!(started.elapsed() >= Duration::from_millis(90));
        let spoken = speaker.0.lock().unwrap();
        assert_eq!(spoken.len(), 2);
        assert_eq!(spoken[0], "Sorry, I did not understand. Please type confirm or decline.");
        println!("✅ Three silent attempts yield a decline");
    }
}
