use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::catalog::CatalogSource;
use crate::config::{ConfigStore, RecognitionSettings};
use crate::cues::SoundCue;
use crate::dispatch::{CommandDispatcher, DispatchOutcome};
use crate::error::{AssistantError, Result};
use crate::listener::Listener;
use crate::matcher::FuzzyMatcher;
use crate::transcript::{normalize, TranscriptFilter};
use crate::wake::{GateDecision, WakeGate};

/// How long one loop iteration waits for input before re-checking the
/// wake timeout and the shutdown token
pub const POLL_WAIT: Duration = Duration::from_millis(20);

/// Why a listening pass returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassEnd {
    Dispatched(DispatchOutcome),
    Cancelled,
}

/// Foreground recognition loop.
///
/// Owns all mutable pipeline state: the wake gate lives for one listening
/// pass, the last trigger time for the whole session.
pub struct Session {
    store: ConfigStore,
    catalog: CatalogSource,
    dispatcher: CommandDispatcher,
    listener: Box<dyn Listener>,
    shutdown: CancellationToken,
    last_trigger: Option<Instant>,
}

impl Session {
    pub fn new(
        store: ConfigStore,
        catalog: CatalogSource,
        dispatcher: CommandDispatcher,
        listener: Box<dyn Listener>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            catalog,
            dispatcher,
            listener,
            shutdown,
            last_trigger: None,
        }
    }

    pub fn last_trigger(&self) -> Option<Instant> {
        self.last_trigger
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Run until the shutdown token is cancelled or input closes
    pub fn run(&mut self) -> Result<()> {
        log::info!("🎧 Recognition loop started");
        while !self.shutdown.is_cancelled() {
            match self.listen_for_command() {
                Ok(PassEnd::Dispatched(outcome)) => {
                    log::debug!("Dispatch finished: {:?}", outcome);
                }
                Ok(PassEnd::Cancelled) => break,
                Err(AssistantError::InputClosed) => {
                    log::info!("📭 Input closed, leaving recognition loop");
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        log::info!("🛑 Recognition loop stopped");
        Ok(())
    }

    /// One listening pass: settings are re-read and the wake gate starts
    /// DORMANT. Returns after a single dispatch.
    fn listen_for_command(&mut self) -> Result<PassEnd> {
        let settings = RecognitionSettings::load(&self.store);
        let typed = self.listener.is_typed();
        // Typed input is deliberate, so the wake word only gates the microphone
        let mut gate = WakeGate::new(
            settings.use_wake_word && !typed,
            &settings.wake_word,
            settings.wake_timeout,
        );
        let filter = TranscriptFilter::from_settings(&settings);
        let matcher = FuzzyMatcher::new(settings.strictness);

        if gate.is_enabled() {
            println!("Say '{}' to wake me up.", gate.wake_word());
        } else if typed {
            println!("Type a command:");
        } else {
            println!("Listening for commands...");
        }

        loop {
            if self.shutdown.is_cancelled() {
                return Ok(PassEnd::Cancelled);
            }

            if gate.check_timeout(Instant::now()) {
                println!("Wake word timed out.");
                log::debug!("Wake gate back to dormant");
                drop(self.dispatcher.cues().play(SoundCue::Click, false));
                continue;
            }

            let Some(raw) = self.listener.next_command(POLL_WAIT)? else {
                continue;
            };
            let text = normalize(&raw);
            if text.is_empty() {
                continue;
            }
            if settings.print_all {
                println!("Heard: {}", text);
            }

            match gate.observe(&text, Instant::now()) {
                GateDecision::Woke => {
                    println!("Wake word detected. Listening...");
                    drop(self.dispatcher.cues().play(SoundCue::Notification, false));
                    continue;
                }
                GateDecision::Ignored => continue,
                GateDecision::Evaluate => {}
            }

            if let Err(rejection) = filter.check(&text) {
                log::debug!("Dropped '{}': {:?}", text, rejection);
                if typed {
                    println!("Invalid Command!");
                }
                continue;
            }

            let catalog = match self.catalog.load() {
                Ok(catalog) => catalog,
                Err(e) => {
                    log::error!("❌ {}", e);
                    continue;
                }
            };

            let matched = if typed {
                catalog.contains(&text).then(|| text.clone())
            } else {
                matcher.find(&text, catalog.phrases())
            };
            let Some(command) = matched else {
                if typed {
                    println!("Invalid Command!");
                }
                continue;
            };

            if let Some(last) = self.last_trigger {
                if last.elapsed() < settings.cooldown {
                    log::debug!("Ignoring '{}' inside the command cooldown", command);
                    continue;
                }
            }

            if settings.print_input || settings.print_all {
                println!("Command: {}", command);
            }
            log::info!("🎯 Matched command '{}'", command);

            let outcome =
                self.dispatcher
                    .dispatch(&command, &catalog, self.listener.as_mut(), &self.shutdown)?;
            self.last_trigger = Some(Instant::now());

            // Drop whatever was heard while the command ran, including its echo
            self.listener.clear();
            gate.command_dispatched();
            return Ok(PassEnd::Dispatched(outcome));
        }
    }
}
