use indexmap::IndexMap;
use secrecy::{ExposeSecret, SecretBox};
use serde_json::{Map, Value};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const APP_NAME: &str = "ARKsAssistant";
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_CRYPTO_NAMES: &[&str] = &[
    "bitcoin", "ethereum", "dogecoin", "solana", "litecoin", "cardano", "tron", "ripple",
];
pub const DEFAULT_CITY_NAMES: &[&str] = &["tokyo", "london", "chicago", "istanbul", "tehran"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No configuration directory available on this platform")]
    NoConfigDir,
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Missing API key for {service}: set apis.{key} or {env_var}")]
    MissingApiKey {
        service: String,
        key: String,
        env_var: String,
    },
}

/// Conversion from a raw JSON config value with the lenient coercion rules
/// of the config file: `None` means "fall back to the default".
pub trait ConfigValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl ConfigValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|n| n != 0),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl ConfigValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }
}

impl ConfigValue for u64 {
    fn from_value(value: &Value) -> Option<Self> {
        i64::from_value(value).and_then(|n| u64::try_from(n).ok())
    }
}

impl ConfigValue for u32 {
    fn from_value(value: &Value) -> Option<Self> {
        i64::from_value(value).and_then(|n| u32::try_from(n).ok())
    }
}

impl ConfigValue for usize {
    fn from_value(value: &Value) -> Option<Self> {
        i64::from_value(value).and_then(|n| usize::try_from(n).ok())
    }
}

impl ConfigValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl ConfigValue for f32 {
    fn from_value(value: &Value) -> Option<Self> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl ConfigValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl ConfigValue for Vec<String> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) if !items.is_empty() => {
                Some(items.iter().filter_map(String::from_value).collect())
            }
            _ => None,
        }
    }
}

impl ConfigValue for IndexMap<String, String> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) if !map.is_empty() => Some(
                map.iter()
                    .map(|(k, v)| (k.clone(), String::from_value(v).unwrap_or_default()))
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// File-backed JSON configuration store.
///
/// Every read goes back to disk so edits made while the assistant runs are
/// picked up on the next command without a restart.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
    path: PathBuf,
}

impl ConfigStore {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let path = dir.join(CONFIG_FILE);
        Self { dir, path }
    }

    /// Store in the per-user config directory, created if missing
    pub fn default_location() -> Result<Self, ConfigError> {
        let dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join(APP_NAME);
        fs::create_dir_all(&dir).map_err(|source| ConfigError::Write {
            path: dir.clone(),
            source,
        })?;
        Ok(Self::in_dir(dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole document. A missing file is an empty config; an
    /// unreadable or malformed file is logged and treated the same way.
    pub fn load(&self) -> Map<String, Value> {
        match self.try_load() {
            Ok(map) => map,
            Err(e) => {
                log::warn!("⚠️ Using default configuration: {}", e);
                Map::new()
            }
        }
    }

    fn try_load(&self) -> Result<Map<String, Value>, ConfigError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        let value: Value = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        Ok(match value {
            Value::Object(map) => map,
            _ => Map::new(),
        })
    }

    pub fn save(&self, data: &Map<String, Value>) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.dir).map_err(|source| ConfigError::Write {
            path: self.dir.clone(),
            source,
        })?;
        let content = serde_json::to_string_pretty(data).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, content).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// Typed lookup of `section.key`, falling back to `default` when the
    /// value is missing, blank or cannot be coerced.
    pub fn get_entry<T: ConfigValue>(&self, section: &str, key: &str, default: T) -> T {
        let config = self.load();
        let value = config.get(section).and_then(|s| s.get(key));
        coerce(value, default)
    }

    /// Typed lookup of a whole top-level section (lists and maps)
    pub fn get_section<T: ConfigValue>(&self, section: &str, default: T) -> T {
        let config = self.load();
        coerce(config.get(section), default)
    }

    pub fn set_entry(&self, section: &str, key: &str, value: Value) -> Result<(), ConfigError> {
        let mut config = self.load();
        let entry = config
            .entry(section.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(section_map) = entry {
            section_map.insert(key.to_string(), value);
        }
        self.save(&config)
    }
}

fn coerce<T: ConfigValue>(value: Option<&Value>, default: T) -> T {
    match value {
        None | Some(Value::Null) => default,
        Some(Value::String(s)) if s.trim().is_empty() => default,
        Some(v) => T::from_value(v).unwrap_or(default),
    }
}

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Settings read at the start of every recognition loop
#[derive(Debug, Clone)]
pub struct RecognitionSettings {
    pub min_words: usize,
    pub max_words: usize,
    pub print_input: bool,
    pub print_all: bool,
    pub strictness: f64,
    pub wake_word: String,
    pub use_wake_word: bool,
    pub wake_timeout: Duration,
    pub disable_vosk: bool,
    pub dictionary: bool,
    pub cooldown: Duration,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            min_words: 2,
            max_words: 4,
            print_input: false,
            print_all: false,
            strictness: 0.8,
            wake_word: "hey assistant".to_string(),
            use_wake_word: true,
            wake_timeout: Duration::from_secs(6),
            disable_vosk: false,
            dictionary: true,
            cooldown: Duration::from_millis(500),
        }
    }
}

impl RecognitionSettings {
    pub fn load(store: &ConfigStore) -> Self {
        let d = Self::default();
        let cooldown = store.get_entry("behavior", "command_cooldown", d.cooldown.as_secs_f64());
        Self {
            min_words: store.get_entry("vosk", "minwords", d.min_words),
            max_words: store.get_entry("vosk", "maxwords", d.max_words),
            print_input: store.get_entry("vosk", "printinput", d.print_input),
            print_all: store.get_entry("vosk", "printall", d.print_all),
            strictness: store.get_entry("vosk", "strictness", d.strictness),
            wake_word: store.get_entry("vosk", "wake_word", d.wake_word),
            use_wake_word: store.get_entry("vosk", "use_wake_word", d.use_wake_word),
            wake_timeout: Duration::from_secs(store.get_entry(
                "vosk",
                "wake_timeout",
                d.wake_timeout.as_secs(),
            )),
            disable_vosk: store.get_entry("vosk", "disablevosk", d.disable_vosk),
            dictionary: store.get_entry("vosk", "dictionary", d.dictionary),
            cooldown: Duration::try_from_secs_f64(cooldown).unwrap_or(d.cooldown),
        }
    }
}

/// Confirm/decline prompt settings
#[derive(Debug, Clone)]
pub struct ConfirmationSettings {
    pub confirm: String,
    pub decline: String,
    pub attempts: u32,
    pub timeout: Duration,
    pub strictness: f64,
}

impl Default for ConfirmationSettings {
    fn default() -> Self {
        Self {
            confirm: "confirm".to_string(),
            decline: "decline".to_string(),
            attempts: 3,
            timeout: Duration::from_secs(5),
            strictness: 0.8,
        }
    }
}

impl ConfirmationSettings {
    pub fn load(store: &ConfigStore) -> Self {
        let d = Self::default();
        Self {
            confirm: store.get_entry("behavior", "confirm", d.confirm).to_lowercase(),
            decline: store.get_entry("behavior", "decline", d.decline).to_lowercase(),
            attempts: store.get_entry("behavior", "repeatition", d.attempts),
            timeout: Duration::from_secs(store.get_entry(
                "behavior",
                "timeout",
                d.timeout.as_secs(),
            )),
            strictness: store.get_entry("vosk", "strictness", d.strictness),
        }
    }
}

/// Startup and shutdown behaviour
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub play_startup: bool,
    pub do_welcome: bool,
    pub welcome_message: String,
    pub print_commands: bool,
    pub do_goodbye: bool,
    pub shutdown_message: String,
    pub play_shutdown: bool,
}

impl LaunchSettings {
    pub fn load(store: &ConfigStore) -> Self {
        Self {
            play_startup: store.get_entry("launchreq", "playstartup", true),
            do_welcome: store.get_entry("launchreq", "dowelcome", true),
            welcome_message: store.get_entry(
                "launchreq",
                "welcomemessage",
                "Hello! I am at your service! call me if you need anything.".to_string(),
            ),
            print_commands: store.get_entry("launchreq", "printcommands", true),
            do_goodbye: store.get_entry("launchreq", "dogoodby", true),
            shutdown_message: store.get_entry("launchreq", "shutdownmessage", "bye bye!".to_string()),
            play_shutdown: store.get_entry("launchreq", "playshutdown", true),
        }
    }
}

/// Recognizer refresh cycle
#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub enabled: bool,
    pub interval: Duration,
}

impl RefreshSettings {
    pub fn load(store: &ConfigStore) -> Self {
        Self {
            enabled: store.get_entry("vosk", "refresh", true),
            interval: Duration::from_secs(store.get_entry("vosk", "refreshrate", 10u64).max(1)),
        }
    }
}

/// Microphone selection
#[derive(Debug, Clone)]
pub struct AudioSettings {
    /// Device name or index; `None` selects the system default
    pub input_device: Option<String>,
    pub sample_rate: u32,
}

impl AudioSettings {
    pub fn load(store: &ConfigStore) -> Self {
        let device: String = store.get_entry("audio", "inputdevice", String::new());
        Self {
            input_device: (!device.is_empty()).then_some(device),
            sample_rate: store.get_entry("audio", "inputsamplerate", 16_000u32),
        }
    }
}

/// Configured name lists used for phrases and entry prompts
pub fn crypto_names(store: &ConfigStore) -> Vec<String> {
    store.get_section("crypto_names", owned(DEFAULT_CRYPTO_NAMES))
}

pub fn city_names(store: &ConfigStore) -> Vec<String> {
    store.get_section("city_names", owned(DEFAULT_CITY_NAMES))
}

pub fn applications(store: &ConfigStore) -> IndexMap<String, String> {
    store.get_section("applications", IndexMap::new())
}

/// API keys for the web actions
#[derive(Debug)]
pub struct ApiKey {
    service: &'static str,
    key: SecretBox<String>,
}

impl ApiKey {
    /// Load a key from `apis.<key>` in the config file or from `env_var`
    pub fn load(
        store: &ConfigStore,
        service: &'static str,
        key: &str,
        env_var: &str,
    ) -> Result<Self, ConfigError> {
        // Load .env file if it exists (for development)
        dotenvy::dotenv().ok();

        let from_file: String = store.get_entry("apis", key, String::new());
        let value = if from_file.trim().is_empty() {
            env::var(env_var).unwrap_or_default()
        } else {
            from_file
        };

        if value.trim().is_empty() {
            return Err(ConfigError::MissingApiKey {
                service: service.to_string(),
                key: key.to_string(),
                env_var: env_var.to_string(),
            });
        }

        Ok(Self {
            service,
            key: SecretBox::new(Box::new(value.trim().to_string())),
        })
    }

    pub fn service(&self) -> &str {
        self.service
    }

    /// Use only when making API calls
    pub fn expose(&self) -> &str {
        self.key.expose_secret()
    }
}
