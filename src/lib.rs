//! Now-playing widget core
//!
//! This crate mirrors the currently playing media track into a home-screen
//! widget. It follows the host's active media sessions, turns the track's
//! album art into a rounded, fixed-size PNG in the cache directory and
//! writes a small display record for every placed widget.
//!
//! The host platform is reached only through the traits in [`session`] and
//! [`widget`]; [`MusicMonitor`] wires everything together.

use image::DynamicImage;

pub mod config;
pub mod pipeline;
pub mod platform;
pub mod resources;
pub mod service;
pub mod session;
pub mod widget;
pub mod worker;

pub use config::Config;
pub use service::MusicMonitor;

/// Shown when a track carries no title
pub const UNKNOWN_TITLE: &str = "Unknown title";

/// Shown when a track carries no artist
pub const UNKNOWN_ARTIST: &str = "Unknown artist";

/// Track-level metadata reported by a media session.
///
/// Every update replaces the previous metadata wholesale.
#[derive(Debug, Clone, Default)]
pub struct TrackMetadata {
    pub title: Option<String>,

    pub artist: Option<String>,

    pub album: Option<String>,

    /// Decoded album art, if the player provides one
    pub artwork: Option<DynamicImage>,
}

impl TrackMetadata {
    pub fn new(title: Option<&str>, artist: Option<&str>) -> Self {
        Self {
            title: title.map(str::to_string),
            artist: artist.map(str::to_string),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_artwork(mut self, artwork: DynamicImage) -> Self {
        self.artwork = Some(artwork);
        self
    }

    /// Title, or [`UNKNOWN_TITLE`]
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(UNKNOWN_TITLE)
    }

    /// Artist, or [`UNKNOWN_ARTIST`]
    pub fn display_artist(&self) -> &str {
        self.artist.as_deref().unwrap_or(UNKNOWN_ARTIST)
    }
}

/// Playback state of a session at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
    Buffering,
    #[default]
    Unknown,
}

impl PlaybackState {
    pub fn is_playing(self) -> bool {
        self == PlaybackState::Playing
    }
}
