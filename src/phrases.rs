use indexmap::IndexSet;

use crate::catalog::CommandCatalog;
use crate::config::{self, ConfigStore, ConfirmationSettings, RecognitionSettings};

/// Spoken numbers the recognizer must know for volume prompts
pub const NUMBER_WORDS: &[&str] = &[
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
    "hundred",
];

/// Everything the recognizer grammar should contain, split into command
/// phrases and the vocabulary used by prompts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhraseSet {
    commands: IndexSet<String>,
    vocabulary: IndexSet<String>,
}

impl PhraseSet {
    pub fn build(store: &ConfigStore, catalog: &CommandCatalog) -> Self {
        let recognition = RecognitionSettings::load(store);
        let confirmation = ConfirmationSettings::load(store);

        let vocabulary = NUMBER_WORDS
            .iter()
            .map(|s| s.to_string())
            .chain(config::crypto_names(store))
            .chain([confirmation.confirm, confirmation.decline, recognition.wake_word])
            .chain(config::city_names(store))
            .chain(config::applications(store).into_keys());

        Self::from_parts(catalog.phrases().map(str::to_string), vocabulary)
    }

    pub fn from_parts<C, V>(commands: C, vocabulary: V) -> Self
    where
        C: IntoIterator<Item = String>,
        V: IntoIterator<Item = String>,
    {
        let commands: IndexSet<String> = commands.into_iter().filter_map(clean).collect();
        let vocabulary = vocabulary
            .into_iter()
            .filter_map(clean)
            .filter(|p| !commands.contains(p))
            .collect();
        Self {
            commands,
            vocabulary,
        }
    }

    /// Full grammar: commands plus prompt vocabulary
    pub fn all(&self) -> Vec<String> {
        self.commands
            .iter()
            .chain(&self.vocabulary)
            .cloned()
            .collect()
    }

    /// Grammar for confirm/decline and entry prompts, without command phrases
    pub fn prompt_grammar(&self) -> Vec<String> {
        self.vocabulary.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len() + self.vocabulary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lowercase, drop blanks and anything outside ASCII
fn clean(phrase: String) -> Option<String> {
    let phrase = phrase.trim().to_lowercase();
    (!phrase.is_empty() && phrase.is_ascii()).then_some(phrase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_from_parts_filters_and_dedupes() {
        let set = PhraseSet::from_parts(
            vec!["Lock System".to_string(), "café au lait".to_string()],
            vec![
                "confirm".to_string(),
                "lock system".to_string(),
                "  ".to_string(),
                "tokyo".to_string(),
            ],
        );
        assert_eq!(set.all(), vec!["lock system", "confirm", "tokyo"]);
        assert_eq!(set.prompt_grammar(), vec!["confirm", "tokyo"]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_build_from_config() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::in_dir(dir.path());
        let data = json!({
            "vosk": {"wake_word": "hey computer"},
            "behavior": {"confirm": "yes", "decline": "no"},
            "city_names": ["paris", "münchen"],
            "applications": {"telegram": "/opt/telegram"}
        });
        store.save(data.as_object().unwrap()).unwrap();

        let catalog = CommandCatalog::default().with_command("lock system", None);
        let set = PhraseSet::build(&store, &catalog);
        let all = set.all();

        assert_eq!(all[0], "lock system");
        for expected in ["hundred", "bitcoin", "yes", "no", "hey computer", "paris", "telegram"] {
            assert!(all.iter().any(|p| p == expected), "missing {}", expected);
        }
        assert!(!all.iter().any(|p| p == "münchen"));
        assert!(!set.prompt_grammar().iter().any(|p| p == "lock system"));
    }

    #[test]
    fn test_equal_inputs_compare_equal() {
        let a = PhraseSet::from_parts(vec!["a b".to_string()], vec!["c".to_string()]);
        let b = PhraseSet::from_parts(vec!["a b".to_string()], vec!["c".to_string()]);
        assert_eq!(a, b);
    }
}
