use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AssistantError, Result};

pub const COMMANDS_FILE: &str = "commands.json";

/// Tag sets may be written either as a list of phrases or as an object
/// keyed by phrase; only membership matters.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TagSetRepr {
    List(Vec<String>),
    Map(IndexMap<String, Value>),
}

impl Default for TagSetRepr {
    fn default() -> Self {
        TagSetRepr::List(Vec::new())
    }
}

impl From<TagSetRepr> for IndexSet<String> {
    fn from(repr: TagSetRepr) -> Self {
        match repr {
            TagSetRepr::List(items) => items.into_iter().map(|s| s.to_lowercase()).collect(),
            TagSetRepr::Map(map) => map.into_keys().map(|s| s.to_lowercase()).collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    commands: IndexMap<String, Option<String>>,
    #[serde(default)]
    sensitive_commands: TagSetRepr,
    #[serde(default)]
    online_commands: TagSetRepr,
    #[serde(default)]
    notify_commands: TagSetRepr,
}

/// Preconditions attached to a command by the catalog tag sets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandTags {
    pub needs_confirmation: bool,
    pub needs_network: bool,
    pub needs_notification: bool,
}

/// Recognizable commands with their spoken responses and tag sets.
///
/// Command order follows the file, which keeps fuzzy-match tie-breaks
/// stable between loads.
#[derive(Debug, Clone, Default)]
pub struct CommandCatalog {
    commands: IndexMap<String, Option<String>>,
    sensitive: IndexSet<String>,
    online: IndexSet<String>,
    notify: IndexSet<String>,
}

impl CommandCatalog {
    pub fn from_json(content: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(content)
            .map_err(|e| AssistantError::Catalog(format!("invalid command catalog: {}", e)))?;

        let commands = file
            .commands
            .into_iter()
            .map(|(phrase, response)| {
                let response = response.filter(|r| !r.trim().is_empty());
                (phrase.trim().to_lowercase(), response)
            })
            .collect();

        let catalog = Self {
            commands,
            sensitive: file.sensitive_commands.into(),
            online: file.online_commands.into(),
            notify: file.notify_commands.into(),
        };

        for orphan in catalog.orphan_tags() {
            log::warn!("⚠️ Tagged command '{}' is not in the command list", orphan);
        }

        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            AssistantError::Catalog(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Builder used by tests and by embedders that assemble catalogs in code
    pub fn with_command(mut self, phrase: &str, response: Option<&str>) -> Self {
        self.commands
            .insert(phrase.to_lowercase(), response.map(str::to_string));
        self
    }

    pub fn with_tags(mut self, phrase: &str, tags: CommandTags) -> Self {
        let phrase = phrase.to_lowercase();
        if tags.needs_confirmation {
            self.sensitive.insert(phrase.clone());
        }
        if tags.needs_network {
            self.online.insert(phrase.clone());
        }
        if tags.needs_notification {
            self.notify.insert(phrase);
        }
        self
    }

    pub fn phrases(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn contains(&self, phrase: &str) -> bool {
        self.commands.contains_key(phrase)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Spoken acknowledgment configured for `phrase`, if any
    pub fn response(&self, phrase: &str) -> Option<&str> {
        self.commands.get(phrase).and_then(|r| r.as_deref())
    }

    /// Tags are looked up by membership only; a phrase absent from the
    /// command list still reports whatever tags name it.
    pub fn tags(&self, phrase: &str) -> CommandTags {
        CommandTags {
            needs_confirmation: self.sensitive.contains(phrase),
            needs_network: self.online.contains(phrase),
            needs_notification: self.notify.contains(phrase),
        }
    }

    /// Tagged phrases that do not appear in the command list
    pub fn orphan_tags(&self) -> Vec<&str> {
        let mut orphans: IndexSet<&str> = IndexSet::new();
        for tag in self.sensitive.iter().chain(&self.online).chain(&self.notify) {
            if !self.commands.contains_key(tag) {
                orphans.insert(tag.as_str());
            }
        }
        orphans.into_iter().collect()
    }
}

/// Where the command catalog is read from on every command-handling call
#[derive(Debug, Clone)]
pub struct CatalogSource {
    path: PathBuf,
}

impl CatalogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `commands.json` next to the running executable
    pub fn beside_executable() -> Self {
        let dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(dir.join(COMMANDS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<CommandCatalog> {
        CommandCatalog::load(&self.path)
    }
}
