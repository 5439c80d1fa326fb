//! Media widget debug tool
//!
//! Feeds one image file through the same refresh path a metadata change
//! takes, then prints the resulting widget records.
//!
//! ```text
//! media-widget-debug <image> [title] [artist]
//! ```

use anyhow::{Context, Result};
use log::info;
use media_widget::widget::{LogHost, WidgetId, WidgetStateStore, WidgetView};
use media_widget::{Config, MusicMonitor, PlaybackState, TrackMetadata};
use std::sync::Arc;

/// Widget id used when no widget has been placed yet
const DEBUG_WIDGET: WidgetId = WidgetId(1);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(image_path) = args.next() else {
        eprintln!("usage: media-widget-debug <image> [title] [artist]");
        std::process::exit(2);
    };
    let title = args.next();
    let artist = args.next();

    let config = Config::from_env()?;
    let store = WidgetStateStore::open(config.resolve_state_dir()?)?;
    if store.widget_ids()?.is_empty() {
        info!("No widgets placed, registering widget {DEBUG_WIDGET}");
        store.register(DEBUG_WIDGET)?;
    }

    let artwork = image::open(&image_path)
        .with_context(|| format!("Failed to decode {image_path}"))?;
    println!(
        "Input:  {image_path} ({}x{})",
        artwork.width(),
        artwork.height()
    );

    let metadata = TrackMetadata::new(title.as_deref(), artist.as_deref()).with_artwork(artwork);

    let monitor = MusicMonitor::from_config(&config, Arc::new(LogHost))?;
    monitor
        .tracker()
        .on_metadata_changed(Some(metadata), PlaybackState::Playing);
    monitor.shutdown();

    println!("\nWidget records in {}:", store.dir().display());
    let resources = media_widget::resources::ResourceBundle::builtin();
    for id in store.widget_ids()? {
        let state = store.load(id)?;
        let view = WidgetView::resolve(&state, &resources, &config)?;
        println!("  [{id}] {} - {}", view.title, view.artist);
        match &state.cover_path {
            Some(path) => println!("       cover: {}", path.display()),
            None => println!("       cover: (placeholder)"),
        }
        println!(
            "       rendered: {}x{}",
            view.cover.width(),
            view.cover.height()
        );
    }

    Ok(())
}
