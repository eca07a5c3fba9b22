use std::process::Command;

use crate::config::ConfigStore;

/// Spoken feedback; blocks until the text has been spoken
pub trait Speaker: Send + Sync {
    fn speak(&self, text: &str);
}

#[derive(Debug, Clone)]
pub struct VoiceSettings {
    pub text_only: bool,
    /// Words per minute
    pub rate: u32,
    /// 0.0 - 1.0
    pub volume: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            text_only: false,
            rate: 170,
            volume: 1.0,
        }
    }
}

impl VoiceSettings {
    pub fn load(store: &ConfigStore) -> Self {
        let d = Self::default();
        Self {
            text_only: store.get_entry("voices", "dontspeak", d.text_only),
            rate: store.get_entry("voices", "speedrate", d.rate),
            volume: store.get_entry("voices", "volumelevel", d.volume).clamp(0.0, 1.0),
        }
    }
}

/// Speaks through the platform's text-to-speech command.
///
/// Settings are re-read on every call so `voices.*` edits apply at once.
#[derive(Debug, Clone)]
pub struct SystemSpeaker {
    store: ConfigStore,
}

impl SystemSpeaker {
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }

    fn command(text: &str, settings: &VoiceSettings) -> Command {
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("say");
            cmd.arg("-r").arg(settings.rate.to_string()).arg(text);
            cmd
        } else if cfg!(target_os = "windows") {
            let script = format!(
                "Add-Type -AssemblyName System.Speech; \
                 $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
                 $s.Volume = {}; $s.Speak('{}')",
                (settings.volume * 100.0).round() as u32,
                text.replace('\'', "''")
            );
            let mut cmd = Command::new("powershell");
            cmd.args(["-NoProfile", "-Command", &script]);
            cmd
        } else {
            // espeak amplitude runs 0-200, 100 is normal
            let amplitude = (settings.volume * 100.0).round() as u32;
            let mut cmd = Command::new("espeak-ng");
            cmd.arg("-s")
                .arg(settings.rate.to_string())
                .arg("-a")
                .arg(amplitude.to_string())
                .arg(text);
            cmd
        }
    }
}

impl Speaker for SystemSpeaker {
    fn speak(&self, text: &str) {
        let settings = VoiceSettings::load(&self.store);
        if settings.text_only {
            println!("[Text Only] {}", text);
            return;
        }

        println!("[Assistant] -> {}", text);
        match Self::command(text, &settings).status() {
            Ok(status) if status.success() => {}
            Ok(status) => log::warn!("⚠️ Text-to-speech exited with {}", status),
            Err(e) if cfg!(target_os = "linux") => {
                log::debug!("espeak-ng unavailable ({}), trying espeak", e);
                let fallback = Command::new("espeak")
                    .arg("-s")
                    .arg(settings.rate.to_string())
                    .arg(text)
                    .status();
                if let Err(e) = fallback {
                    log::error!("❌ No text-to-speech command available: {}", e);
                }
            }
            Err(e) => log::error!("❌ Text-to-speech failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_voice_settings_defaults_and_overrides() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::in_dir(dir.path());
        let settings = VoiceSettings::load(&store);
        assert!(!settings.text_only);
        assert_eq!(settings.rate, 170);

        std::fs::write(
            store.path(),
            r#"{"voices": {"dontspeak": "yes", "speedrate": 200, "volumelevel": 3}}"#,
        )
        .unwrap();
        let settings = VoiceSettings::load(&store);
        assert!(settings.text_only);
        assert_eq!(settings.rate, 200);
        assert_eq!(settings.volume, 1.0);
    }

    #[test]
    fn test_text_only_mode_does_not_spawn() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::in_dir(dir.path());
        std::fs::write(store.path(), r#"{"voices": {"dontspeak": true}}"#).unwrap();
        SystemSpeaker::new(store).speak("hello");
        println!("✅ Text only mode prints without a TTS process");
    }
}
