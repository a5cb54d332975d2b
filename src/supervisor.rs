//! Lifecycle of the network listener.
//!
//! The supervisor owns at most one bound [`Listener`] and moves it through
//! `Stopped → Starting → Running → Stopping → Stopped`. Lifecycle operations
//! are serialized by an async mutex. Restart requests that arrive while a
//! restart is running are absorbed: the running restart picks up the latest
//! configuration and goes around once more.
//!
//! Nothing here touches command bindings. A restart replaces the listener
//! only, so every incarnation serves the same `AppState`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigChange, ConfigStore, ListenerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Lifecycle notifications, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    Started { addr: SocketAddr },
    Stopped { addr: SocketAddr },
    BindFailed { config: ListenerConfig, reason: String },
}

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {config}: {source}")]
    Bind {
        config: ListenerConfig,
        #[source]
        source: std::io::Error,
    },
    #[error("listener failed: {0}")]
    Serve(String),
}

/// A bound, serving listener.
#[async_trait]
pub trait Listener: Send + Sync {
    fn local_addr(&self) -> SocketAddr;

    /// Stop accepting connections and let in-flight requests complete.
    async fn shutdown(self: Box<Self>) -> Result<(), ListenerError>;
}

/// Binds listeners for a configuration.
#[async_trait]
pub trait ListenerFactory: Send + Sync {
    async fn bind(&self, config: &ListenerConfig) -> Result<Box<dyn Listener>, ListenerError>;
}

pub struct ListenerSupervisor {
    factory: Arc<dyn ListenerFactory>,
    restart_delay: Duration,
    active: Mutex<Option<Box<dyn Listener>>>,
    state: parking_lot::Mutex<ListenerState>,
    local_addr: parking_lot::Mutex<Option<SocketAddr>>,
    pending: parking_lot::Mutex<Option<ListenerConfig>>,
    restarting: AtomicBool,
    events: broadcast::Sender<ListenerEvent>,
}

impl ListenerSupervisor {
    pub fn new(factory: Arc<dyn ListenerFactory>, restart_delay: Duration) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            factory,
            restart_delay,
            active: Mutex::new(None),
            state: parking_lot::Mutex::new(ListenerState::Stopped),
            local_addr: parking_lot::Mutex::new(None),
            pending: parking_lot::Mutex::new(None),
            restarting: AtomicBool::new(false),
            events,
        }
    }

    pub fn state(&self) -> ListenerState {
        *self.state.lock()
    }

    /// Address of the running listener, if any.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ListenerEvent> {
        self.events.subscribe()
    }

    /// Bind and serve. A no-op returning the current address when running.
    pub async fn start(&self, config: &ListenerConfig) -> Result<SocketAddr, ListenerError> {
        let mut active = self.active.lock().await;
        self.start_locked(&mut active, config).await
    }

    /// Release the listener. A no-op when stopped.
    pub async fn stop(&self) {
        let mut active = self.active.lock().await;
        self.stop_locked(&mut active).await;
    }

    /// Stop, wait out the quiescence delay, start with `config`.
    pub async fn restart(&self, config: &ListenerConfig) -> Result<SocketAddr, ListenerError> {
        let mut active = self.active.lock().await;
        info!(%config, "Restarting listener");
        self.stop_locked(&mut active).await;
        tokio::time::sleep(self.restart_delay).await;
        self.start_locked(&mut active, config).await
    }

    /// Restart with `config`, coalescing with any restart already running.
    ///
    /// If a restart is in progress the request only records `config` and
    /// returns; the running restart applies it afterwards.
    pub async fn request_restart(&self, config: ListenerConfig) -> Result<(), ListenerError> {
        *self.pending.lock() = Some(config);
        loop {
            if self
                .restarting
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                debug!("Restart already in progress, request coalesced");
                return Ok(());
            }

            let result = self.drain_pending().await;
            self.restarting.store(false, Ordering::SeqCst);
            result?;

            // A request may have landed between the drain and the flag reset.
            if self.pending.lock().is_none() {
                return Ok(());
            }
        }
    }

    async fn drain_pending(&self) -> Result<(), ListenerError> {
        loop {
            let next = self.pending.lock().take();
            let Some(config) = next else {
                return Ok(());
            };
            self.restart(&config).await?;
        }
    }

    /// Restart whenever the listener configuration changes. Runs until the
    /// config store is dropped.
    pub fn watch_config(
        self: Arc<Self>,
        mut changes: broadcast::Receiver<ConfigChange>,
        store: ConfigStore,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        info!(
                            field = %change.field,
                            old = %change.old,
                            new = %change.new,
                            "Listener configuration changed"
                        );
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed configuration changes, restarting with current values");
                    }
                    Err(RecvError::Closed) => break,
                }

                // A host and port edit arrive as two events; one restart covers both.
                loop {
                    match changes.try_recv() {
                        Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                        Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                    }
                }

                if let Err(e) = self.request_restart(store.listener_config()).await {
                    error!(error = %e, "Listener restart failed");
                }
            }
            debug!("Configuration watcher finished");
        })
    }

    async fn start_locked(
        &self,
        active: &mut Option<Box<dyn Listener>>,
        config: &ListenerConfig,
    ) -> Result<SocketAddr, ListenerError> {
        if let Some(listener) = active.as_ref() {
            return Ok(listener.local_addr());
        }

        self.set_state(ListenerState::Starting);
        match self.factory.bind(config).await {
            Ok(listener) => {
                let addr = listener.local_addr();
                *active = Some(listener);
                *self.local_addr.lock() = Some(addr);
                self.set_state(ListenerState::Running);
                info!(%addr, "Listener started");
                self.emit(ListenerEvent::Started { addr });
                Ok(addr)
            }
            Err(e) => {
                self.set_state(ListenerState::Stopped);
                error!(%config, error = %e, "Listener failed to start");
                self.emit(ListenerEvent::BindFailed {
                    config: config.clone(),
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn stop_locked(&self, active: &mut Option<Box<dyn Listener>>) {
        let Some(listener) = active.take() else {
            return;
        };
        let addr = listener.local_addr();
        self.set_state(ListenerState::Stopping);
        if let Err(e) = listener.shutdown().await {
            warn!(%addr, error = %e, "Listener did not shut down cleanly");
        }
        *self.local_addr.lock() = None;
        self.set_state(ListenerState::Stopped);
        info!(%addr, "Listener stopped");
        self.emit(ListenerEvent::Stopped { addr });
    }

    fn set_state(&self, state: ListenerState) {
        *self.state.lock() = state;
    }

    fn emit(&self, event: ListenerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
