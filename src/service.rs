//! Music monitor service
//!
//! Owns the session tracker and the refresh worker for as long as the host
//! keeps the notification listener connected.

use anyhow::Result;
use log::{debug, error, info, warn};
use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::CoverCache;
use crate::resources::ResourceBundle;
use crate::session::{ActiveSessionsListener, SessionId, SessionManager, SessionTracker};
use crate::widget::{WidgetHost, WidgetStateStore, WidgetUpdater};
use crate::worker::{CoverRefresher, RefreshQueue};

pub struct MusicMonitor {
    tracker: Arc<SessionTracker>,
    listener: Arc<dyn ActiveSessionsListener>,
    manager: Option<Arc<dyn SessionManager>>,
    queue: RefreshQueue,
}

impl MusicMonitor {
    /// Start the refresh worker around `refresher`.
    pub fn new(refresher: CoverRefresher) -> Result<Self> {
        let queue = RefreshQueue::spawn(refresher)?;
        let tracker = Arc::new(SessionTracker::new(queue.dispatcher()));
        let listener: Arc<dyn ActiveSessionsListener> = tracker.clone();

        Ok(Self {
            tracker,
            listener,
            manager: None,
            queue,
        })
    }

    /// Build the full stack from `config`: cache slot, widget store, bundled resources.
    pub fn from_config(config: &Config, host: Arc<dyn WidgetHost>) -> Result<Self> {
        let cache_dir = config.resolve_cache_dir()?;
        let state_dir = config.resolve_state_dir()?;
        info!(
            "Using cache {} and widget state {} ({})",
            cache_dir.display(),
            state_dir.display(),
            crate::platform::name()
        );

        let store = WidgetStateStore::open(state_dir)?;
        let refresher = CoverRefresher::new(
            ResourceBundle::builtin(),
            config.cover.clone(),
            CoverCache::with_config(cache_dir, &config.cover),
            Box::new(WidgetUpdater::new(store, host)),
        );

        Self::new(refresher)
    }

    pub fn tracker(&self) -> &Arc<SessionTracker> {
        &self.tracker
    }

    pub fn current_session_id(&self) -> Option<SessionId> {
        self.tracker.current_session_id()
    }

    /// Whether the session manager accepted our listener
    pub fn is_active(&self) -> bool {
        self.manager.is_some()
    }

    /// Subscribe to active-session changes and adopt the initial session.
    ///
    /// A permission failure leaves the monitor inactive until the next
    /// connect; it is logged, never retried.
    pub fn on_listener_connected(&mut self, manager: Arc<dyn SessionManager>) -> bool {
        info!("Listener connected");

        if self.manager.is_some() {
            debug!("Already subscribed, reconnecting");
            self.on_listener_disconnected();
        }

        if let Err(e) = manager.add_sessions_listener(Arc::clone(&self.listener)) {
            error!("Cannot watch media sessions: {e}");
            return false;
        }

        match manager.active_sessions() {
            Ok(sessions) => self.tracker.update_sessions(&sessions),
            Err(e) => error!("Cannot read active media sessions: {e}"),
        }

        self.manager = Some(manager);
        true
    }

    /// Drop the session-list subscription and release the current session.
    pub fn on_listener_disconnected(&mut self) {
        info!("Listener disconnected");

        match self.manager.take() {
            Some(manager) => manager.remove_sessions_listener(&self.listener),
            None => warn!("Disconnect without an active subscription"),
        }

        self.tracker.teardown();
    }

    /// Disconnect and stop the refresh worker.
    pub fn shutdown(mut self) {
        if self.manager.is_some() {
            self.on_listener_disconnected();
        } else {
            self.tracker.teardown();
        }
        self.queue.shutdown();
    }
}
