use once_cell::sync::Lazy;
use regex::Regex;
use std::time::{Duration, Instant};

use crate::actions::{ActionContext, ActionError};
use crate::config::{ConfirmationSettings, RecognitionSettings};
use crate::confirm::next_answer_before;
use crate::display;
use crate::listener::Listener;
use crate::matcher::FuzzyMatcher;

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{1,3}").expect("valid regex"));

/// One prompt answer heard within `timeout`
pub fn listen_once(listener: &mut dyn Listener, timeout: Duration) -> Result<Option<String>, ActionError> {
    listener.start_prompt()?;
    Ok(next_answer_before(listener, Instant::now() + timeout)?)
}

/// Pick one entry out of `entries` by voice or typing.
///
/// A single entry is returned without asking. The answer is fuzzy matched
/// with `vosk.strictness`; the matched entry (not the raw answer) is returned.
pub fn ask_single_entry(
    ctx: &mut ActionContext<'_>,
    entries: Vec<String>,
    nickname: &str,
    online: bool,
) -> Result<Option<String>, ActionError> {
    if online && !ctx.network.is_online() {
        ctx.speak("There is no internet connection, command cannot be performed!");
        return Ok(None);
    }

    let entries: Vec<String> = entries.into_iter().map(|e| e.to_lowercase()).collect();
    match entries.as_slice() {
        [] => {
            ctx.speak(&format!("No {} names are configured.", nickname));
            return Ok(None);
        }
        [only] => {
            println!("[{}] → {}", nickname, only);
            return Ok(Some(only.clone()));
        }
        _ => {}
    }

    let recognition = RecognitionSettings::load(ctx.store);
    let timeout = ConfirmationSettings::load(ctx.store).timeout;

    ctx.speak(&format!("Which {} would you like?", nickname));
    display::print_grid(nickname, &entries);

    let heard = listen_once(ctx.listener, timeout)?;
    if recognition.print_input || recognition.print_all {
        println!("{}", heard.as_deref().unwrap_or(""));
    }

    let matched = heard.and_then(|answer| {
        FuzzyMatcher::new(recognition.strictness).find(&answer, entries.iter().map(String::as_str))
    });

    match matched {
        Some(entry) => {
            println!("[{}] → {}", nickname, entry);
            Ok(Some(entry))
        }
        None => {
            ctx.speak(&format!(
                "I couldn't hear or recognize any {} name. Is there anything else I can assist you with?",
                nickname
            ));
            Ok(None)
        }
    }
}

/// Ask for a volume level, 0 to 100
pub fn ask_volume(ctx: &mut ActionContext<'_>) -> Result<Option<u8>, ActionError> {
    let timeout = ConfirmationSettings::load(ctx.store).timeout;
    println!("Specify volume, 0 to 100:");

    let heard = listen_once(ctx.listener, timeout)?;
    if let Some(text) = &heard {
        println!("[VOLUME] → {}", text);
    }
    Ok(heard.as_deref().and_then(parse_volume))
}

/// "seventy five", "75" or "volume 120" (clamped to 100)
pub fn parse_volume(text: &str) -> Option<u8> {
    let value = words_to_number(text).or_else(|| {
        DIGITS
            .find(text)
            .and_then(|m| m.as_str().parse::<u32>().ok())
    })?;
    Some(value.min(100) as u8)
}

fn word_value(word: &str) -> Option<u32> {
    let value = match word {
        "zero" => 0,
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "thirteen" => 13,
        "fourteen" => 14,
        "fifteen" => 15,
        "sixteen" => 16,
        "seventeen" => 17,
        "eighteen" => 18,
        "nineteen" => 19,
        "twenty" => 20,
        "thirty" => 30,
        "forty" => 40,
        "fifty" => 50,
        "sixty" => 60,
        "seventy" => 70,
        "eighty" => 80,
        "ninety" => 90,
        _ => return None,
    };
    Some(value)
}

/// Sum of number words; "hundred" multiplies what came before it.
/// Non-number words are skipped, None when no number word is present.
pub fn words_to_number(text: &str) -> Option<u32> {
    let mut total = 0u32;
    let mut found = false;
    for word in text.split(|c: char| c.is_whitespace() || c == '-') {
        let word = word.trim().to_lowercase();
        if word == "hundred" {
            total = total.max(1) * 100;
            found = true;
        } else if let Some(value) = word_value(&word) {
            total += value;
            found = true;
        }
    }
    found.then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::Harness;

    #[test]
    fn test_words_to_number() {
        assert_eq!(words_to_number("seventy five"), Some(75));
        assert_eq!(words_to_number("forty-two"), Some(42));
        assert_eq!(words_to_number("one hundred"), Some(100));
        assert_eq!(words_to_number("hundred"), Some(100));
        assert_eq!(words_to_number("zero"), Some(0));
        assert_eq!(words_to_number("loud"), None);
    }

    #[test]
    fn test_parse_volume() {
        assert_eq!(parse_volume("set it to sixty"), Some(60));
        assert_eq!(parse_volume("75"), Some(75));
        assert_eq!(parse_volume("volume 250"), Some(100));
        assert_eq!(parse_volume("quiet please"), None);
    }

    #[test]
    fn test_single_entry_returned_without_asking() {
        let mut harness = Harness::new();
        let entry = ask_single_entry(
            &mut harness.context("launch application"),
            vec!["Browser".to_string()],
            "application",
            false,
        )
        .unwrap();
        assert_eq!(entry.as_deref(), Some("browser"));
        assert!(harness.spoken().is_empty());
    }

    #[test]
    fn test_entry_is_fuzzy_matched() {
        let mut harness = Harness::new();
        harness.type_line("etherium");
        let entry = ask_single_entry(
            &mut harness.context("current crypto price"),
            vec!["bitcoin".to_string(), "ethereum".to_string()],
            "crypto currency",
            true,
        )
        .unwrap();
        assert_eq!(entry.as_deref(), Some("ethereum"));
        assert_eq!(harness.spoken(), vec!["Which crypto currency would you like?"]);
    }

    #[test]
    fn test_offline_entry_prompt_aborts() {
        let mut harness = Harness::new();
        harness.network.0 = false;
        let entry = ask_single_entry(
            &mut harness.context("whats todays weather"),
            vec!["tokyo".to_string(), "london".to_string()],
            "city",
            true,
        )
        .unwrap();
        assert_eq!(entry, None);
        assert_eq!(
            harness.spoken(),
            vec!["There is no internet connection, command cannot be performed!"]
        );
    }

    #[test]
    fn test_ask_volume_typed() {
        let mut harness = Harness::new();
        harness.type_line("eighty");
        assert_eq!(ask_volume(&mut harness.context("set system volume")).unwrap(), Some(80));
    }
}
