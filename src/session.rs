//! Active media session tracking
//!
//! The host platform reports the set of active media sessions and, for the
//! session we subscribe to, every metadata change. [`SessionTracker`] keeps
//! exactly one "current" session, moves its callback subscription when the
//! current session changes, and forwards refresh requests to the background
//! worker without doing any work on the callback thread.
//!
//! # Selection
//!
//! The first session in the reported list wins. Hosts usually order the
//! list most-recently-active first, but that is not guaranteed.

use log::{debug, info};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use crate::worker::RefreshDispatcher;
use crate::{PlaybackState, TrackMetadata};

/// Identifier of a media-playback endpoint. Sessions compare by this alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap the host's opaque session token.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("session service unavailable: {0}")]
    Unavailable(String),
}

/// Receives change notifications from one media session
pub trait MediaCallback: Send + Sync {
    fn on_metadata_changed(&self, metadata: Option<TrackMetadata>, state: PlaybackState);
}

/// A media session as exposed by the host
///
/// Implementations may call back into the [`SessionTracker`] from any of
/// these methods; the tracker never holds its lock across them.
pub trait MediaSession: Send + Sync {
    fn id(&self) -> SessionId;

    /// Owning application, for logging
    fn package_name(&self) -> String;

    /// Current track, if the player published one
    fn metadata(&self) -> Option<TrackMetadata>;

    fn playback_state(&self) -> PlaybackState;

    /// Subscribe `callback` to metadata changes of this session.
    fn register_callback(&self, callback: Arc<dyn MediaCallback>);

    fn unregister_callback(&self, callback: &Arc<dyn MediaCallback>);
}

/// Receives the active session list whenever it changes
pub trait ActiveSessionsListener: Send + Sync {
    fn on_active_sessions_changed(&self, sessions: Vec<Arc<dyn MediaSession>>);
}

/// Host-side session discovery
pub trait SessionManager {
    fn add_sessions_listener(
        &self,
        listener: Arc<dyn ActiveSessionsListener>,
    ) -> Result<(), SessionError>;

    fn remove_sessions_listener(&self, listener: &Arc<dyn ActiveSessionsListener>);

    fn active_sessions(&self) -> Result<Vec<Arc<dyn MediaSession>>, SessionError>;
}

/// Callback object registered on the current session.
///
/// Holds only the dispatcher, so sessions can keep it alive without keeping
/// the tracker alive.
struct MetadataForwarder {
    dispatcher: RefreshDispatcher,
}

impl MediaCallback for MetadataForwarder {
    fn on_metadata_changed(&self, metadata: Option<TrackMetadata>, state: PlaybackState) {
        debug!("Metadata changed");
        log_now_playing(metadata.as_ref(), state);
        self.dispatcher.dispatch(metadata, state);
    }
}

/// Keeps the single current session and its callback subscription
pub struct SessionTracker {
    current: Mutex<Option<Arc<dyn MediaSession>>>,
    callback: Arc<dyn MediaCallback>,
    dispatcher: RefreshDispatcher,
}

impl SessionTracker {
    /// Tracker with no current session, forwarding refreshes to `dispatcher`.
    pub fn new(dispatcher: RefreshDispatcher) -> Self {
        let callback: Arc<dyn MediaCallback> = Arc::new(MetadataForwarder {
            dispatcher: dispatcher.clone(),
        });
        Self {
            current: Mutex::new(None),
            callback,
            dispatcher,
        }
    }

    fn current(&self) -> MutexGuard<'_, Option<Arc<dyn MediaSession>>> {
        // The slot is only ever swapped whole, so a poisoned lock is still consistent.
        self.current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn current_session_id(&self) -> Option<SessionId> {
        self.current().as_ref().map(|session| session.id())
    }

    /// Adopt the first reported session if it differs from the current one.
    pub fn update_sessions(&self, sessions: &[Arc<dyn MediaSession>]) {
        let Some(session) = sessions.first() else {
            return;
        };

        let id = session.id();
        let previous = {
            let mut current = self.current();
            if current.as_ref().is_some_and(|c| c.id() == id) {
                return;
            }
            current.replace(Arc::clone(session))
        };

        info!("Switching to player {} ({})", session.package_name(), id);

        if let Some(previous) = previous {
            previous.unregister_callback(&self.callback);
        }
        session.register_callback(Arc::clone(&self.callback));

        let metadata = session.metadata();
        let state = session.playback_state();
        log_now_playing(metadata.as_ref(), state);
        self.dispatcher.dispatch(metadata, state);
    }

    /// Metadata change on the current session.
    pub fn on_metadata_changed(&self, metadata: Option<TrackMetadata>, state: PlaybackState) {
        self.callback.on_metadata_changed(metadata, state);
    }

    /// Unsubscribe from the current session and forget it.
    pub fn teardown(&self) {
        let previous = self.current().take();
        if let Some(previous) = previous {
            debug!("Releasing player {}", previous.id());
            previous.unregister_callback(&self.callback);
        }
    }
}

impl ActiveSessionsListener for SessionTracker {
    fn on_active_sessions_changed(&self, sessions: Vec<Arc<dyn MediaSession>>) {
        debug!("Active players changed, found {}", sessions.len());
        self.update_sessions(&sessions);
    }
}

fn log_now_playing(metadata: Option<&TrackMetadata>, state: PlaybackState) {
    let Some(metadata) = metadata else {
        return;
    };
    debug!(
        "Now playing: {} - {} / playing: {}",
        metadata.display_title(),
        metadata.display_artist(),
        state.is_playing()
    );
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory session used by unit and integration-style tests.

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Event {
        Registered(SessionId),
        Unregistered(SessionId),
    }

    pub struct FakeSession {
        pub id: SessionId,
        pub metadata: Mutex<Option<TrackMetadata>>,
        pub state: PlaybackState,
        pub callbacks: Mutex<Vec<Arc<dyn MediaCallback>>>,
        pub log: Arc<Mutex<Vec<Event>>>,
    }

    impl FakeSession {
        pub fn new(id: &str, log: &Arc<Mutex<Vec<Event>>>) -> Arc<Self> {
            Arc::new(Self {
                id: SessionId::new(id),
                metadata: Mutex::new(Some(TrackMetadata::new(Some(id), Some("Artist")))),
                state: PlaybackState::Playing,
                callbacks: Mutex::new(Vec::new()),
                log: Arc::clone(log),
            })
        }

        pub fn callback_count(&self) -> usize {
            self.callbacks.lock().unwrap().len()
        }

        /// Deliver a metadata change to every registered callback.
        pub fn emit(&self, metadata: TrackMetadata) {
            *self.metadata.lock().unwrap() = Some(metadata.clone());
            for callback in self.callbacks.lock().unwrap().iter() {
                callback.on_metadata_changed(Some(metadata.clone()), self.state);
            }
        }
    }

    impl MediaSession for FakeSession {
        fn id(&self) -> SessionId {
            self.id.clone()
        }

        fn package_name(&self) -> String {
            format!("fake.{}", self.id)
        }

        fn metadata(&self) -> Option<TrackMetadata> {
            self.metadata.lock().unwrap().clone()
        }

        fn playback_state(&self) -> PlaybackState {
            self.state
        }

        fn register_callback(&self, callback: Arc<dyn MediaCallback>) {
            self.log.lock().unwrap().push(Event::Registered(self.id.clone()));
            self.callbacks.lock().unwrap().push(callback);
        }

        fn unregister_callback(&self, callback: &Arc<dyn MediaCallback>) {
            self.log.lock().unwrap().push(Event::Unregistered(self.id.clone()));
            self.callbacks
                .lock()
                .unwrap()
                .retain(|c| !Arc::ptr_eq(c, callback));
        }
    }

    pub fn as_sessions(sessions: &[&Arc<FakeSession>]) -> Vec<Arc<dyn MediaSession>> {
        sessions
            .iter()
            .map(|s| Arc::clone(*s) as Arc<dyn MediaSession>)
            .collect()
    }
}
