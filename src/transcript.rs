use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::RecognitionSettings;

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));

pub const FILLER_WORDS: &[&str] = &["um", "uh", "hmm", "okay", "like", "the", "that", "you know"];

/// Trim, lowercase and strip punctuation
pub fn normalize(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    PUNCTUATION.replace_all(&lowered, "").trim().to_string()
}

/// Why a transcript was dropped before matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    TooShort,
    TooLong,
    Filler,
}

/// Word-count and filler filter applied before fuzzy matching
#[derive(Debug, Clone)]
pub struct TranscriptFilter {
    min_words: usize,
    max_words: usize,
    fillers: Vec<String>,
}

impl TranscriptFilter {
    pub fn new(min_words: usize, max_words: usize) -> Self {
        Self {
            min_words,
            max_words,
            fillers: FILLER_WORDS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn from_settings(settings: &RecognitionSettings) -> Self {
        Self::new(settings.min_words, settings.max_words)
    }

    fn is_filler(&self, text: &str) -> bool {
        if self.fillers.iter().any(|f| f == text) {
            return true;
        }
        let mut words = text.split_whitespace().peekable();
        words.peek().is_some() && words.all(|w| self.fillers.iter().any(|f| f == w))
    }

    /// Checks an already-normalized transcript
    pub fn check(&self, text: &str) -> Result<(), Rejection> {
        let count = text.split_whitespace().count();
        if count < self.min_words {
            Err(Rejection::TooShort)
        } else if count > self.max_words {
            Err(Rejection::TooLong)
        } else if self.is_filler(text) {
            Err(Rejection::Filler)
        } else {
            Ok(())
        }
    }

    pub fn accepts(&self, text: &str) -> bool {
        self.check(text).is_ok()
    }
}

impl Default for TranscriptFilter {
    fn default() -> Self {
        Self::new(2, 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Lock System!  "), "lock system");
        assert_eq!(normalize("What's today's weather?"), "whats todays weather");
        assert_eq!(normalize("..."), "");
        assert_eq!(normalize("Hey, Assistant."), "hey assistant");
    }

    #[test]
    fn test_word_count_bounds() {
        let filter = TranscriptFilter::new(2, 4);
        assert_eq!(filter.check("lock"), Err(Rejection::TooShort));
        assert_eq!(filter.check(""), Err(Rejection::TooShort));
        assert!(filter.accepts("lock system"));
        assert!(filter.accepts("what is the weather"));
        assert_eq!(
            filter.check("please lock the system right now"),
            Err(Rejection::TooLong)
        );
    }

    #[test]
    fn test_fillers() {
        let filter = TranscriptFilter::new(1, 4);
        assert_eq!(filter.check("um uh"), Err(Rejection::Filler));
        assert_eq!(filter.check("you know"), Err(Rejection::Filler));
        assert_eq!(filter.check("like the"), Err(Rejection::Filler));
        assert!(filter.accepts("the lights"));
    }
}
