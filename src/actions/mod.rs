use indexmap::IndexMap;
use std::process::Command;
use std::sync::atomic::AtomicBool;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::catalog::{CommandCatalog, CommandTags};
use crate::config::{ConfigError, ConfigStore};
use crate::cues::CuePlayer;
use crate::error::AssistantError;
use crate::listener::Listener;
use crate::network::Connectivity;
use crate::speech::Speaker;

pub mod apps;
pub mod media;
pub mod power;
pub mod system;
pub mod web;

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Action execution failed: {0}")]
    ExecutionFailed(String),
    #[error("Command '{program}' failed: {reason}")]
    Command { program: String, reason: String },
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected response: {0}")]
    Response(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Not supported on this platform: {0}")]
    Unsupported(String),
    #[error("Input closed")]
    InputClosed,
}

impl From<AssistantError> for ActionError {
    fn from(err: AssistantError) -> Self {
        match err {
            AssistantError::InputClosed => ActionError::InputClosed,
            AssistantError::Action(inner) => inner,
            other => ActionError::ExecutionFailed(other.to_string()),
        }
    }
}

/// Some(msg) = speak it, None = silent
pub type ActionResult = Result<Option<String>, ActionError>;

/// Everything a handler may use while it runs. The listener is borrowed
/// from the recognition loop, so prompts block it like confirmation does.
pub struct ActionContext<'a> {
    pub command: &'a str,
    pub tags: CommandTags,
    pub store: &'a ConfigStore,
    pub catalog: &'a CommandCatalog,
    pub listener: &'a mut dyn Listener,
    pub speaker: &'a dyn Speaker,
    pub cues: &'a dyn CuePlayer,
    pub network: &'a dyn Connectivity,
    /// Cancel to stop the assistant
    pub shutdown: &'a CancellationToken,
    /// Set before cancelling to relaunch after shutdown
    pub restart: &'a AtomicBool,
}

impl ActionContext<'_> {
    pub fn speak(&self, text: &str) {
        self.speaker.speak(text);
    }
}

/// A named action run when its command is dispatched
pub trait CommandHandler: Send + Sync {
    fn execute(&self, ctx: &mut ActionContext<'_>) -> ActionResult;
}

impl<F> CommandHandler for F
where
    F: Fn(&mut ActionContext<'_>) -> ActionResult + Send + Sync,
{
    fn execute(&self, ctx: &mut ActionContext<'_>) -> ActionResult {
        self(ctx)
    }
}

/// Command name to handler lookup table
pub struct ActionRegistry {
    handlers: IndexMap<String, Box<dyn CommandHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: IndexMap::new(),
        }
    }

    /// Registry with every built-in action
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        power::register(&mut registry);
        system::register(&mut registry);
        media::register(&mut registry);
        web::register(&mut registry);
        apps::register(&mut registry);
        registry
    }

    /// Add or replace the handler for `name`
    pub fn register(&mut self, name: &str, handler: impl CommandHandler + 'static) {
        let name = name.trim().to_lowercase();
        if self.handlers.insert(name.clone(), Box::new(handler)).is_some() {
            log::debug!("Replaced handler for '{}'", name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler for `ctx.command`.
    ///
    /// Handler failures are logged and never reach the caller, except a
    /// closed input which ends the session.
    pub fn perform(&self, ctx: &mut ActionContext<'_>) -> crate::error::Result<()> {
        let Some(handler) = self.handlers.get(ctx.command) else {
            log::warn!("⚠️ No action registered for '{}'", ctx.command);
            return Ok(());
        };

        log::debug!("Performing '{}' ({:?})", ctx.command, ctx.tags);
        match handler.execute(ctx) {
            Ok(Some(reply)) => ctx.speak(&reply),
            Ok(None) => {}
            Err(ActionError::InputClosed) => return Err(AssistantError::InputClosed),
            Err(e @ ActionError::Http(_)) => {
                log::error!("❌ '{}' failed: {}", ctx.command, e);
                ctx.speak("There was an error connecting to the service.");
            }
            Err(e) => log::error!("❌ '{}' failed: {}", ctx.command, e),
        }
        Ok(())
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a program to completion, returning its stdout
pub(crate) fn run_program(program: &str, args: &[&str]) -> Result<String, ActionError> {
    log::debug!("Running: {} {}", program, args.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| ActionError::Command {
            program: program.to_string(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ActionError::Command {
            program: program.to_string(),
            reason: format!("{}: {}", output.status, stderr.trim()),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Collaborator fakes shared by the action tests

    use super::*;
    use crate::cues::SilentCues;
    use std::sync::mpsc;
    use std::sync::Mutex;

    use crate::listener::TypedListener;

    #[derive(Default)]
    pub struct Recorder(pub Mutex<Vec<String>>);

    impl Speaker for Recorder {
        fn speak(&self, text: &str) {
            self.0.lock().unwrap().push(text.to_string());
        }
    }

    pub struct Online(pub bool);

    impl Connectivity for Online {
        fn is_online(&self) -> bool {
            self.0
        }
    }

    /// Owns the collaborators an `ActionContext` borrows
    pub struct Harness {
        pub dir: tempfile::TempDir,
        pub store: ConfigStore,
        pub catalog: CommandCatalog,
        pub listener: TypedListener,
        pub input: mpsc::Sender<String>,
        pub speaker: Recorder,
        pub cues: SilentCues,
        pub network: Online,
        pub shutdown: CancellationToken,
        pub restart: AtomicBool,
    }

    impl Harness {
        pub fn new() -> Self {
            let dir = tempfile::TempDir::new().unwrap();
            let store = ConfigStore::in_dir(dir.path());
            let (input, rx) = mpsc::channel();
            Self {
                dir,
                store,
                catalog: CommandCatalog::default(),
                listener: TypedListener::from_channel(rx),
                input,
                speaker: Recorder::default(),
                cues: SilentCues,
                network: Online(true),
                shutdown: CancellationToken::new(),
                restart: AtomicBool::new(false),
            }
        }

        pub fn config(&self, json: &str) {
            std::fs::write(self.store.path(), json).unwrap();
        }

        pub fn type_line(&self, line: &str) {
            self.input.send(line.to_string()).unwrap();
        }

        pub fn spoken(&self) -> Vec<String> {
            self.speaker.0.lock().unwrap().clone()
        }

        pub fn context<'a>(&'a mut self, command: &'a str) -> ActionContext<'a> {
            ActionContext {
                command,
                tags: self.catalog.tags(command),
                store: &self.store,
                catalog: &self.catalog,
                listener: &mut self.listener,
                speaker: &self.speaker,
                cues: &self.cues,
                network: &self.network,
                shutdown: &self.shutdown,
                restart: &self.restart,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Harness;
    use super::*;

    #[test]
    fn test_registry_runs_registered_handler() {
        let mut registry = ActionRegistry::new();
        fn hello(_ctx: &mut ActionContext<'_>) -> ActionResult {
            Ok(Some("hello".to_string()))
        }
        registry.register("Say Hello", hello);
        assert!(registry.contains("say hello"));

        let mut harness = Harness::new();
        registry.perform(&mut harness.context("say hello")).unwrap();
        assert_eq!(harness.spoken(), vec!["hello"]);
    }

    #[test]
    fn test_unknown_command_is_a_no_op() {
        let registry = ActionRegistry::new();
        let mut harness = Harness::new();
        registry.perform(&mut harness.context("open the pod bay doors")).unwrap();
        assert!(harness.spoken().is_empty());
    }

    #[test]
    fn test_failures_are_swallowed_but_closed_input_is_not() {
        let mut registry = ActionRegistry::new();
        fn broken(_ctx: &mut ActionContext<'_>) -> ActionResult {
            Err(ActionError::ExecutionFailed("boom".into()))
        }
        fn closed(_ctx: &mut ActionContext<'_>) -> ActionResult {
            Err(ActionError::InputClosed)
        }
        registry.register("broken", broken);
        registry.register("closed", closed);

        let mut harness = Harness::new();
        assert!(registry.perform(&mut harness.context("broken")).is_ok());
        assert!(matches!(
            registry.perform(&mut harness.context("closed")),
            Err(AssistantError::InputClosed)
        ));
    }

    #[test]
    fn test_builtins_cover_default_commands() {
        let registry = ActionRegistry::with_builtins();
        for name in [
            "lock system",
            "shutdown system",
            "check system status",
            "list active commands",
            "toggle media",
            "next music track",
            "set system volume",
            "current crypto price",
            "whats todays weather",
            "tell me a joke",
            "todays my last day",
            "launch application",
            "close application",
            "what time is it",
            "terminate assistant program",
            "restart assistant program",
            "take screen shot",
        ] {
            assert!(registry.contains(name), "missing handler for {}", name);
        }
        println!("✅ {} built-in actions registered", registry.len());
    }
}
