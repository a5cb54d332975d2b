//! Runtime listener configuration and its change events.
//!
//! [`ConfigStore`] holds the live `{host, port}` pair. Every setter that
//! actually changes a value publishes one [`ConfigChange`] on a broadcast
//! channel; setting a field to its current value publishes nothing.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

const CHANGE_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerConfig {
    pub host: String,
    pub port: u16,
}

impl ListenerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ListenerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigField {
    Host,
    Port,
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Host => "host",
            Self::Port => "port",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigChange {
    pub field: ConfigField,
    pub old: String,
    pub new: String,
}

#[derive(Clone)]
pub struct ConfigStore {
    current: Arc<RwLock<ListenerConfig>>,
    changes: broadcast::Sender<ConfigChange>,
}

impl ConfigStore {
    pub fn new(initial: ListenerConfig) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            current: Arc::new(RwLock::new(initial)),
            changes,
        }
    }

    pub fn host(&self) -> String {
        self.current.read().host.clone()
    }

    pub fn port(&self) -> u16 {
        self.current.read().port
    }

    pub fn listener_config(&self) -> ListenerConfig {
        self.current.read().clone()
    }

    /// Register for change events. Only events sent after this call are seen.
    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChange> {
        self.changes.subscribe()
    }

    pub fn set_host(&self, host: impl Into<String>) -> Option<ConfigChange> {
        let host = host.into();
        let change = {
            let mut current = self.current.write();
            if current.host == host {
                return None;
            }
            let old = std::mem::replace(&mut current.host, host.clone());
            ConfigChange {
                field: ConfigField::Host,
                old,
                new: host,
            }
        };
        self.publish(&change);
        Some(change)
    }

    pub fn set_port(&self, port: u16) -> Option<ConfigChange> {
        let change = {
            let mut current = self.current.write();
            if current.port == port {
                return None;
            }
            let old = std::mem::replace(&mut current.port, port);
            ConfigChange {
                field: ConfigField::Port,
                old: old.to_string(),
                new: port.to_string(),
            }
        };
        self.publish(&change);
        Some(change)
    }

    /// Apply a whole config, publishing one event per field that changed.
    pub fn apply(&self, config: &ListenerConfig) -> Vec<ConfigChange> {
        self.set_host(config.host.clone())
            .into_iter()
            .chain(self.set_port(config.port))
            .collect()
    }

    fn publish(&self, change: &ConfigChange) {
        // No subscribers is fine: nothing is listening yet.
        if self.changes.send(change.clone()).is_err() {
            debug!(field = %change.field, "config change published with no subscribers");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_change_events_carry_old_and_new() {
        let store = ConfigStore::new(ListenerConfig::new("127.0.0.1", 8080));
        let mut rx = store.subscribe();

        store.set_port(8090).unwrap();
        let change = rx.try_recv().unwrap();
        assert_eq!(change.field, ConfigField::Port);
        assert_eq!(change.old, "8080");
        assert_eq!(change.new, "8090");
        assert_eq!(store.port(), 8090);
    }

    #[test]
    fn test_unchanged_value_publishes_nothing() {
        let store = ConfigStore::new(ListenerConfig::new("127.0.0.1", 8080));
        let mut rx = store.subscribe();
        assert!(store.set_port(8080).is_none());
        assert!(store.set_host("127.0.0.1").is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_apply_publishes_each_changed_field() {
        let store = ConfigStore::new(ListenerConfig::new("127.0.0.1", 8080));
        let mut rx = store.subscribe();
        let changes = store.apply(&ListenerConfig::new("0.0.0.0", 9000));
        assert_eq!(changes.len(), 2);
        assert_eq!(rx.try_recv().unwrap().field, ConfigField::Host);
        assert_eq!(rx.try_recv().unwrap().field, ConfigField::Port);
        assert_eq!(store.listener_config().to_string(), "0.0.0.0:9000");
    }
}
