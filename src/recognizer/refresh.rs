use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{Grammar, RecognizerFactory, RecognizerSlot};
use crate::catalog::{CatalogSource, CommandCatalog};
use crate::config::{ConfigStore, RecognitionSettings, RefreshSettings};
use crate::error::Result;
use crate::phrases::PhraseSet;

/// Periodically rebuilds the command recognizer from the current
/// configuration and catalog, handing it to the recognition loop through
/// the shared slot.
pub struct RecognizerRefresher {
    store: ConfigStore,
    catalog: CatalogSource,
    factory: Arc<dyn RecognizerFactory>,
    slot: Arc<RecognizerSlot>,
    last: Mutex<Option<PhraseSet>>,
}

impl RecognizerRefresher {
    pub fn new(
        store: ConfigStore,
        catalog: CatalogSource,
        factory: Arc<dyn RecognizerFactory>,
        slot: Arc<RecognizerSlot>,
    ) -> Self {
        Self {
            store,
            catalog,
            factory,
            slot,
            last: Mutex::new(None),
        }
    }

    /// Current phrase set; a broken catalog contributes no command phrases
    pub fn phrases(&self) -> PhraseSet {
        let catalog = self.catalog.load().unwrap_or_else(|e| {
            log::warn!("⚠️ Could not load command catalog: {}", e);
            CommandCatalog::default()
        });
        PhraseSet::build(&self.store, &catalog)
    }

    /// Build one recognizer and post it. Returns whether the phrase set
    /// differs from the previous cycle.
    pub fn refresh_once(&self) -> Result<bool> {
        let phrases = self.phrases();
        let dictionary = RecognitionSettings::load(&self.store).dictionary;

        let grammar = if dictionary {
            Grammar::Phrases(phrases.all())
        } else {
            Grammar::Open
        };
        let recognizer = self.factory.build(grammar)?;
        self.slot.post(recognizer);

        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        let changed = last.as_ref() != Some(&phrases);
        if changed {
            log::info!("🔄 Phrase set changed ({} phrases)", phrases.len());
        } else {
            log::trace!("Recognizer rebuilt, phrase set unchanged");
        }
        *last = Some(phrases);
        Ok(changed)
    }

    /// Time until the next rebuild, read from the configuration each cycle
    pub fn next_interval(&self) -> Duration {
        RefreshSettings::load(&self.store).interval
    }

    /// Rebuild until cancelled, waiting `vosk.refreshrate` between cycles.
    /// The first rebuild happens one interval after start; startup does its
    /// own synchronous build.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        log::info!("🔄 Recognizer refresh every {:?}", self.next_interval());
        loop {
            let interval = self.next_interval();
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::debug!("Recognizer refresh stopped");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    let refresher = Arc::clone(&self);
                    match tokio::task::spawn_blocking(move || refresher.refresh_once()).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => log::error!("❌ Recognizer refresh failed: {}", e),
                        Err(e) => log::error!("❌ Recognizer refresh task panicked: {}", e),
                    }
                }
            }
        }
    }
}
