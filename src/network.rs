use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::ConfigStore;

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(5);

/// Network reachability check used before online-tagged commands
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;

    /// True when `behavior.forceofflinemode` is set
    fn forced_offline(&self) -> bool {
        false
    }
}

/// Direct outbound TCP connect to a well-known host (8.8.8.8:53 by default)
#[derive(Debug, Clone)]
pub struct TcpProbe {
    store: ConfigStore,
    address: SocketAddr,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(store: ConfigStore) -> Self {
        Self {
            store,
            address: SocketAddr::from(([8, 8, 8, 8], 53)),
            timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_target(mut self, address: SocketAddr, timeout: Duration) -> Self {
        self.address = address;
        self.timeout = timeout;
        self
    }
}

impl Connectivity for TcpProbe {
    fn is_online(&self) -> bool {
        if self.forced_offline() {
            return false;
        }
        match TcpStream::connect_timeout(&self.address, self.timeout) {
            Ok(_) => true,
            Err(e) => {
                log::trace!("Connectivity probe to {} failed: {}", self.address, e);
                false
            }
        }
    }

    fn forced_offline(&self) -> bool {
        self.store.get_entry("behavior", "forceofflinemode", false)
    }
}

/// Log connectivity transitions until cancelled
pub async fn monitor(probe: Arc<dyn Connectivity>, interval: Duration, cancel: CancellationToken) {
    let mut last: Option<bool> = None;
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let probe = Arc::clone(&probe);
                let online = match tokio::task::spawn_blocking(move || probe.is_online()).await {
                    Ok(online) => online,
                    Err(e) => {
                        log::error!("❌ Connectivity probe panicked: {}", e);
                        continue;
                    }
                };
                match (last, online) {
                    (Some(false), true) => log::info!("🌐 Internet connection available."),
                    (Some(true), false) => log::warn!("⚠️ Internet connection lost."),
                    _ => {}
                }
                last = Some(online);
            }
        }
    }
    log::debug!("Connectivity monitor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use tempfile::TempDir;

    #[test]
    fn test_probe_reaches_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let dir = TempDir::new().unwrap();
        let probe = TcpProbe::new(ConfigStore::in_dir(dir.path()))
            .with_target(listener.local_addr().unwrap(), Duration::from_millis(500));
        assert!(probe.is_online());
    }

    #[test]
    fn test_force_offline() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::in_dir(dir.path());
        std::fs::write(store.path(), r#"{"behavior": {"forceofflinemode": true}}"#).unwrap();

        let probe = TcpProbe::new(store)
            .with_target(listener.local_addr().unwrap(), Duration::from_millis(500));
        assert!(probe.forced_offline());
        assert!(!probe.is_online());
    }

    #[test]
    fn test_closed_port_is_offline() {
        let address = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let dir = TempDir::new().unwrap();
        let probe = TcpProbe::new(ConfigStore::in_dir(dir.path()))
            .with_target(address, Duration::from_millis(200));
        assert!(!probe.is_online());
    }

    #[tokio::test]
    async fn test_monitor_stops_on_cancel() {
        struct Flapping(std::sync::atomic::AtomicBool);
        impl Connectivity for Flapping {
            fn is_online(&self) -> bool {
                !self.0.fetch_xor(true, std::sync::atomic::Ordering::SeqCst)
            }
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(monitor(
            Arc::new(Flapping(Default::default())),
            Duration::from_millis(5),
            cancel.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
        task.await.unwrap();
    }
}
