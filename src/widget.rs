//! Widget display state
//!
//! Each placed widget instance owns one small record with three string
//! slots (`track_title`, `track_artist`, `cover_image_path`). The refresh
//! worker writes them through [`WidgetUpdater`]; the rendering surface reads
//! them back and resolves the picture with [`WidgetView::resolve`].

use anyhow::{Context, Result};
use image::DynamicImage;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::{ImagePipeline, PipelineError};
use crate::resources::{ResourceBundle, ResourceId};

const RECORD_PREFIX: &str = "widget_";
const RECORD_SUFFIX: &str = ".json";

/// Host-assigned identifier of a widget instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WidgetId(pub u32);

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What one widget instance shows. A missing key means "never set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayState {
    #[serde(rename = "track_title", default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(rename = "track_artist", default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,

    /// Absent whenever the current track had no usable artwork
    #[serde(rename = "cover_image_path", default, skip_serializing_if = "Option::is_none")]
    pub cover_path: Option<PathBuf>,
}

/// Destination of finished refresh cycles
pub trait DisplaySink: Send {
    fn push(&self, state: &DisplayState) -> Result<()>;
}

/// The rendering surface, told to redraw after its record changed
pub trait WidgetHost: Send + Sync {
    fn request_update(&self, id: WidgetId);
}

/// Host that only logs redraw requests
#[derive(Debug, Default)]
pub struct LogHost;

impl WidgetHost for LogHost {
    fn request_update(&self, id: WidgetId) {
        info!("Widget {id} needs redraw");
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Directory of per-widget JSON records
#[derive(Debug, Clone)]
pub struct WidgetStateStore {
    dir: PathBuf,
}

impl WidgetStateStore {
    /// Open (and create if needed) the record directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create widget state directory: {dir:?}"))?;
        Ok(Self { dir })
    }

    /// Directory holding the records
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: WidgetId) -> PathBuf {
        self.dir.join(format!("{RECORD_PREFIX}{id}{RECORD_SUFFIX}"))
    }

    /// Start tracking a widget instance with an empty record.
    pub fn register(&self, id: WidgetId) -> Result<()> {
        if self.record_path(id).exists() {
            return Ok(());
        }
        self.write(id, &DisplayState::default())
    }

    /// Forget a widget instance. Unknown ids are fine.
    pub fn unregister(&self, id: WidgetId) -> Result<()> {
        match fs::remove_file(self.record_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove widget {id}")),
        }
    }

    /// Registered widget ids in ascending order.
    pub fn widget_ids(&self) -> Result<Vec<WidgetId>> {
        let mut ids = Vec::new();

        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read widget state directory: {:?}", self.dir))?
        {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(parse_record_name) {
                ids.push(id);
            }
        }

        ids.sort_unstable();
        Ok(ids)
    }

    /// Read a record; unknown widgets read as empty.
    pub fn load(&self, id: WidgetId) -> Result<DisplayState> {
        let path = self.record_path(id);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(DisplayState::default()),
            Err(e) => return Err(e).with_context(|| format!("Failed to read {path:?}")),
        };

        serde_json::from_str(&data).with_context(|| format!("Failed to parse {path:?}"))
    }

    /// Replace one record with `state`; whatever was on disk is not read.
    pub fn save(&self, id: WidgetId, state: &DisplayState) -> Result<()> {
        self.write(id, state)
    }

    fn write(&self, id: WidgetId, state: &DisplayState) -> Result<()> {
        let path = self.record_path(id);
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(state)?;

        fs::write(&tmp, data).with_context(|| format!("Failed to write {tmp:?}"))?;
        fs::rename(&tmp, &path).with_context(|| format!("Failed to replace {path:?}"))?;
        Ok(())
    }
}

fn parse_record_name(name: &str) -> Option<WidgetId> {
    name.strip_prefix(RECORD_PREFIX)?
        .strip_suffix(RECORD_SUFFIX)?
        .parse()
        .ok()
        .map(WidgetId)
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Writes refresh results into every placed widget and asks the host to redraw
pub struct WidgetUpdater {
    store: WidgetStateStore,
    host: Arc<dyn WidgetHost>,
}

impl WidgetUpdater {
    /// Writer over every widget registered in `store`.
    pub fn new(store: WidgetStateStore, host: Arc<dyn WidgetHost>) -> Self {
        Self { store, host }
    }
}

impl DisplaySink for WidgetUpdater {
    fn push(&self, state: &DisplayState) -> Result<()> {
        let ids = self.store.widget_ids()?;
        if ids.is_empty() {
            debug!("No widgets placed, nothing to update");
        }

        for id in ids {
            if let Err(e) = self.store.save(id, state) {
                warn!("Failed to update widget {id}: {e:#}");
                continue;
            }
            self.host.request_update(id);
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Read path
// ---------------------------------------------------------------------------

/// Everything the rendering surface needs for one widget
#[derive(Debug, Clone)]
pub struct WidgetView {
    pub title: String,
    pub artist: String,
    pub cover: DynamicImage,
}

impl WidgetView {
    /// Fill unset slots from the idle strings and load the cover.
    pub fn resolve(
        state: &DisplayState,
        resources: &ResourceBundle,
        config: &Config,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            title: state
                .title
                .clone()
                .unwrap_or_else(|| config.idle_title.clone()),
            artist: state
                .artist
                .clone()
                .unwrap_or_else(|| config.idle_artist.clone()),
            cover: resolve_cover(state, resources, config)?,
        })
    }
}

/// The cached cover if it loads, otherwise the rounded placeholder.
pub fn resolve_cover(
    state: &DisplayState,
    resources: &ResourceBundle,
    config: &Config,
) -> Result<DynamicImage, PipelineError> {
    if let Some(path) = &state.cover_path {
        match image::open(path) {
            Ok(image) => return Ok(image),
            Err(e) => warn!("Cached cover unreadable at {}: {e}", path.display()),
        }
    }

    ImagePipeline::new(resources)
        .from_resource(ResourceId::PLACEHOLDER)
        .widget_cover(&config.cover)
        .process()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingHost {
        redraws: Mutex<Vec<WidgetId>>,
    }

    impl WidgetHost for RecordingHost {
        fn request_update(&self, id: WidgetId) {
            self.redraws.lock().unwrap().push(id);
        }
    }

    fn song(cover: Option<&Path>) -> DisplayState {
        DisplayState {
            title: Some("Song".to_string()),
            artist: Some("Band".to_string()),
            cover_path: cover.map(Path::to_path_buf),
        }
    }

    #[test]
    fn test_record_uses_preference_keys() {
        let json = serde_json::to_value(song(Some(Path::new("/c/cover.png")))).unwrap();
        assert_eq!(json["track_title"], "Song");
        assert_eq!(json["track_artist"], "Band");
        assert_eq!(json["cover_image_path"], "/c/cover.png");

        let json = serde_json::to_value(song(None)).unwrap();
        assert!(json.get("cover_image_path").is_none());
    }

    #[test]
    fn test_parse_record_name() {
        assert_eq!(parse_record_name("widget_12.json"), Some(WidgetId(12)));
        assert_eq!(parse_record_name("widget_12.json.tmp"), None);
        assert_eq!(parse_record_name("widget_x.json"), None);
        assert_eq!(parse_record_name("other.json"), None);
    }

    #[test]
    fn test_register_and_list() {
        let dir = TempDir::new().unwrap();
        let store = WidgetStateStore::open(dir.path()).unwrap();

        store.register(WidgetId(7)).unwrap();
        store.register(WidgetId(3)).unwrap();
        store.register(WidgetId(7)).unwrap();

        assert_eq!(store.widget_ids().unwrap(), vec![WidgetId(3), WidgetId(7)]);
        assert_eq!(store.load(WidgetId(3)).unwrap(), DisplayState::default());

        store.unregister(WidgetId(3)).unwrap();
        store.unregister(WidgetId(3)).unwrap();
        assert_eq!(store.widget_ids().unwrap(), vec![WidgetId(7)]);
    }

    #[test]
    fn test_load_unknown_widget_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = WidgetStateStore::open(dir.path()).unwrap();
        assert_eq!(store.load(WidgetId(99)).unwrap(), DisplayState::default());
    }

    #[test]
    fn test_load_corrupt_record_fails() {
        let dir = TempDir::new().unwrap();
        let store = WidgetStateStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("widget_1.json"), "{not json").unwrap();
        assert!(store.load(WidgetId(1)).is_err());
    }

    #[test]
    fn test_updater_writes_all_widgets_and_clears_stale_cover() {
        let dir = TempDir::new().unwrap();
        let store = WidgetStateStore::open(dir.path()).unwrap();
        store.register(WidgetId(1)).unwrap();
        store.register(WidgetId(2)).unwrap();

        let host = Arc::new(RecordingHost::default());
        let updater = WidgetUpdater::new(store.clone(), host.clone());

        updater.push(&song(Some(Path::new("/c/cover.png")))).unwrap();
        assert_eq!(
            store.load(WidgetId(2)).unwrap().cover_path,
            Some(PathBuf::from("/c/cover.png"))
        );

        updater.push(&song(None)).unwrap();
        for id in [WidgetId(1), WidgetId(2)] {
            assert_eq!(store.load(id).unwrap(), song(None));
        }

        let raw = fs::read_to_string(dir.path().join("widget_1.json")).unwrap();
        assert!(!raw.contains("cover_image_path"));

        assert_eq!(
            *host.redraws.lock().unwrap(),
            vec![WidgetId(1), WidgetId(2), WidgetId(1), WidgetId(2)]
        );
    }

    #[test]
    fn test_updater_repairs_corrupt_record() {
        let dir = TempDir::new().unwrap();
        let store = WidgetStateStore::open(dir.path()).unwrap();
        store.register(WidgetId(1)).unwrap();
        store.register(WidgetId(2)).unwrap();
        fs::write(dir.path().join("widget_1.json"), "{trunc").unwrap();
        assert!(store.load(WidgetId(1)).is_err());

        let host = Arc::new(RecordingHost::default());
        WidgetUpdater::new(store.clone(), host.clone())
            .push(&song(None))
            .unwrap();

        assert_eq!(store.load(WidgetId(1)).unwrap(), song(None));
        assert_eq!(store.load(WidgetId(2)).unwrap(), song(None));
        assert_eq!(*host.redraws.lock().unwrap(), vec![WidgetId(1), WidgetId(2)]);
    }

    #[test]
    fn test_updater_skips_unwritable_widget() {
        let dir = TempDir::new().unwrap();
        let store = WidgetStateStore::open(dir.path()).unwrap();
        store.register(WidgetId(2)).unwrap();
        // A directory in place of the temp file makes widget 1 unwritable
        fs::create_dir(dir.path().join("widget_1.json")).unwrap();
        fs::create_dir(dir.path().join("widget_1.json.tmp")).unwrap();

        let host = Arc::new(RecordingHost::default());
        WidgetUpdater::new(store.clone(), host.clone())
            .push(&song(None))
            .unwrap();

        assert_eq!(store.load(WidgetId(2)).unwrap(), song(None));
        assert_eq!(*host.redraws.lock().unwrap(), vec![WidgetId(2)]);
    }

    #[test]
    fn test_updater_without_widgets() {
        let dir = TempDir::new().unwrap();
        let store = WidgetStateStore::open(dir.path()).unwrap();
        let host = Arc::new(RecordingHost::default());
        WidgetUpdater::new(store, host.clone())
            .push(&song(None))
            .unwrap();
        assert!(host.redraws.lock().unwrap().is_empty());
    }

    #[test]
    fn test_view_falls_back_to_placeholder() {
        let config = Config::default();
        let view =
            WidgetView::resolve(&DisplayState::default(), &ResourceBundle::builtin(), &config)
                .unwrap();

        assert_eq!(view.title, config.idle_title);
        assert_eq!(view.artist, config.idle_artist);
        assert_eq!((view.cover.width(), view.cover.height()), (512, 512));
        assert_eq!(view.cover.to_rgba8().get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn test_missing_cover_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone.png");
        let state = song(Some(missing.as_path()));
        let cover = resolve_cover(&state, &ResourceBundle::builtin(), &Config::default()).unwrap();
        assert_eq!(cover.width(), 512);
    }

    #[test]
    fn test_cached_cover_loaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cover.png");
        image::RgbaImage::new(20, 20).save(&path).unwrap();

        let cover =
            resolve_cover(&song(Some(path.as_path())), &ResourceBundle::empty(), &Config::default())
                .unwrap();
        assert_eq!(cover.width(), 20);
    }
}
