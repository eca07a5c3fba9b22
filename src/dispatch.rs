use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::actions::{ActionContext, ActionRegistry};
use crate::catalog::CommandCatalog;
use crate::config::{ConfigStore, ConfirmationSettings, RecognitionSettings};
use crate::confirm::wait_for_confirmation;
use crate::cues::{CuePlayer, SoundCue};
use crate::error::{AssistantError, Result};
use crate::listener::Listener;
use crate::network::Connectivity;
use crate::speech::Speaker;

pub const OFFLINE_APOLOGY: &str = "Sorry! There is no internet connection! Command cannot be performed!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The action ran (its own failures are logged by the registry)
    Performed,
    /// Confirmation was declined, timed out or could not be asked
    Declined,
    /// Network required but unreachable
    Offline,
    /// No action registered under the command name
    Unknown,
}

/// Enforces a command's preconditions, then runs its action
pub struct CommandDispatcher {
    store: ConfigStore,
    registry: ActionRegistry,
    speaker: Arc<dyn Speaker>,
    cues: Arc<dyn CuePlayer>,
    network: Arc<dyn Connectivity>,
    restart: Arc<AtomicBool>,
}

impl CommandDispatcher {
    pub fn new(
        store: ConfigStore,
        registry: ActionRegistry,
        speaker: Arc<dyn Speaker>,
        cues: Arc<dyn CuePlayer>,
        network: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            store,
            registry,
            speaker,
            cues,
            network,
            restart: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Register extra handlers at runtime
    pub fn registry_mut(&mut self) -> &mut ActionRegistry {
        &mut self.registry
    }

    pub fn speaker(&self) -> &dyn Speaker {
        self.speaker.as_ref()
    }

    pub fn cues(&self) -> &dyn CuePlayer {
        self.cues.as_ref()
    }

    pub fn network(&self) -> &dyn Connectivity {
        self.network.as_ref()
    }

    /// Raised by the restart action; read once the session has ended
    pub fn restart_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.restart)
    }

    pub fn restart_requested(&self) -> bool {
        self.restart.load(Ordering::SeqCst)
    }

    /// Dispatch a catalog-validated command.
    ///
    /// The configured response is spoken before any precondition runs, so
    /// the user hears an acknowledgement even when the command is aborted.
    pub fn dispatch(
        &self,
        command: &str,
        catalog: &CommandCatalog,
        listener: &mut dyn Listener,
        shutdown: &CancellationToken,
    ) -> Result<DispatchOutcome> {
        let tags = catalog.tags(command);

        if let Some(response) = catalog.response(command) {
            self.speaker.speak(response);
        }

        if tags.needs_confirmation {
            println!("⚠️ Confirmation required for: {}", command);
            let settings = ConfirmationSettings::load(&self.store);
            let echo = {
                let recognition = RecognitionSettings::load(&self.store);
                recognition.print_input || recognition.print_all
            };
            let confirmed = match wait_for_confirmation(listener, self.speaker.as_ref(), &settings, echo) {
                Ok(confirmed) => confirmed,
                Err(AssistantError::InputClosed) => return Err(AssistantError::InputClosed),
                Err(e) => {
                    log::error!("❌ Confirmation for '{}' failed: {}", command, e);
                    false
                }
            };
            if !confirmed {
                self.speaker.speak("Command Cancelled.");
                return Ok(DispatchOutcome::Declined);
            }
            self.speaker.speak("Command Confirmed.");
        }

        if tags.needs_network {
            if !self.network.is_online() {
                self.speaker.speak(OFFLINE_APOLOGY);
                return Ok(DispatchOutcome::Offline);
            }
            println!("Performing command...");
        }

        if tags.needs_notification {
            // Fire and forget; the cue thread finishes on its own
            drop(self.cues.play(SoundCue::Notification, false));
        }

        if !self.registry.contains(command) {
            log::warn!("⚠️ '{}' matched the catalog but has no action", command);
            return Ok(DispatchOutcome::Unknown);
        }

        let mut ctx = ActionContext {
            command,
            tags,
            store: &self.store,
            catalog,
            listener,
            speaker: self.speaker.as_ref(),
            cues: self.cues.as_ref(),
            network: self.network.as_ref(),
            shutdown,
            restart: &self.restart,
        };
        self.registry.perform(&mut ctx)?;
        Ok(DispatchOutcome::Performed)
    }
}
