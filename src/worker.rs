//! Background refresh worker
//!
//! Metadata-refresh cycles (artwork scaling and rounding, the PNG write and
//! the display-state update) run on one dedicated thread fed by a channel.
//! Platform callbacks only build a [`RefreshJob`] and send it.
//!
//! Jobs run in dispatch order. Before starting a job the worker drains the
//! channel and keeps only the newest one, so the last dispatched update is
//! always the one left on screen.

use anyhow::{Context, Result};
use image::DynamicImage;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use crate::config::CoverConfig;
use crate::pipeline::{CoverCache, ImagePipeline};
use crate::resources::ResourceBundle;
use crate::widget::{DisplaySink, DisplayState};
use crate::{PlaybackState, TrackMetadata};

/// Immutable snapshot handed from the callback thread to the worker
#[derive(Debug, Clone)]
pub struct RefreshJob {
    pub title: String,
    pub artist: String,
    pub artwork: Option<DynamicImage>,
    pub state: PlaybackState,
}

impl RefreshJob {
    /// Apply the display defaults to `metadata`.
    pub fn from_metadata(metadata: Option<TrackMetadata>, state: PlaybackState) -> Self {
        let metadata = metadata.unwrap_or_default();
        Self {
            title: metadata.display_title().to_string(),
            artist: metadata.display_artist().to_string(),
            artwork: metadata.artwork,
            state,
        }
    }
}

pub(crate) enum Message {
    Refresh(RefreshJob),
    Shutdown,
}

/// Sending half of the refresh queue. Cheap to clone, never blocks.
#[derive(Debug, Clone)]
pub struct RefreshDispatcher {
    tx: Sender<Message>,
}

impl RefreshDispatcher {
    pub(crate) fn channel() -> (Self, Receiver<Message>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }

    pub fn dispatch(&self, metadata: Option<TrackMetadata>, state: PlaybackState) {
        self.send(RefreshJob::from_metadata(metadata, state));
    }

    pub fn send(&self, job: RefreshJob) {
        if self.tx.send(Message::Refresh(job)).is_err() {
            warn!("Refresh worker has stopped, dropping update");
        }
    }
}

/// Runs one refresh cycle: artwork -> cache slot -> display sink
pub struct CoverRefresher {
    resources: ResourceBundle,
    cover: CoverConfig,
    cache: CoverCache,
    sink: Box<dyn DisplaySink>,
}

impl CoverRefresher {
    pub fn new(
        resources: ResourceBundle,
        cover: CoverConfig,
        cache: CoverCache,
        sink: Box<dyn DisplaySink>,
    ) -> Self {
        Self {
            resources,
            cover,
            cache,
            sink,
        }
    }

    pub fn refresh(&self, job: RefreshJob) {
        let cover_path = job
            .artwork
            .and_then(|artwork| self.create_cover_path(artwork));

        let state = DisplayState {
            title: Some(job.title),
            artist: Some(job.artist),
            cover_path,
        };

        if let Err(e) = self.sink.push(&state) {
            warn!("Failed to update widget display state: {e:#}");
        }
    }

    fn create_cover_path(&self, artwork: DynamicImage) -> Option<PathBuf> {
        let processed = ImagePipeline::new(&self.resources)
            .from_image(artwork)
            .widget_cover(&self.cover)
            .process();

        match processed {
            Ok(image) => self.cache.save_to_cache(&image),
            Err(e) => {
                warn!("Failed to process cover art: {e}");
                None
            }
        }
    }
}

/// The worker thread and its dispatcher
pub struct RefreshQueue {
    dispatcher: RefreshDispatcher,
    handle: Option<JoinHandle<()>>,
}

impl RefreshQueue {
    pub fn spawn(refresher: CoverRefresher) -> Result<Self> {
        let (dispatcher, rx) = RefreshDispatcher::channel();

        let handle = thread::Builder::new()
            .name("cover-refresh".to_string())
            .spawn(move || run_worker(&rx, &refresher))
            .context("Failed to spawn refresh worker")?;

        Ok(Self {
            dispatcher,
            handle: Some(handle),
        })
    }

    pub fn dispatcher(&self) -> RefreshDispatcher {
        self.dispatcher.clone()
    }

    /// Stop the worker after the job in hand (if any) and wait for it.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.dispatcher.tx.send(Message::Shutdown);
        if handle.join().is_err() {
            warn!("Refresh worker panicked");
        }
    }
}

impl Drop for RefreshQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(rx: &Receiver<Message>, refresher: &CoverRefresher) {
    info!("Refresh worker started");

    while let Ok(Message::Refresh(job)) = rx.recv() {
        let (job, stop) = newest_pending(rx, job);
        debug!(
            "Refreshing widget: {} - {} ({:?})",
            job.title, job.artist, job.state
        );
        refresher.refresh(job);
        if stop {
            break;
        }
    }

    info!("Refresh worker stopped");
}

/// Replace `job` with any newer queued job. Also reports a queued shutdown.
fn newest_pending(rx: &Receiver<Message>, mut job: RefreshJob) -> (RefreshJob, bool) {
    loop {
        match rx.try_recv() {
            Ok(Message::Refresh(newer)) => {
                debug!("Skipping superseded update: {}", job.title);
                job = newer;
            }
            Ok(Message::Shutdown) => return (job, true),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => return (job, false),
        }
    }
}
