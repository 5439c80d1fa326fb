//! Cover art pipeline
//!
//! Turns a decoded album-art image (or a bundled placeholder) into the
//! square, rounded-corner picture the widget shows, and stores it in the
//! single cache slot.
//!
//! # Usage
//!
//! ```no_run
//! use media_widget::pipeline::{CoverCache, ImagePipeline};
//! use media_widget::resources::{ResourceBundle, ResourceId};
//!
//! let resources = ResourceBundle::builtin();
//! let cover = ImagePipeline::new(&resources)
//!     .from_resource(ResourceId::PLACEHOLDER)
//!     .scale_default()
//!     .round_corners_default()
//!     .process()?;
//!
//! let cache = CoverCache::new("/tmp/media-widget", "widget_cover_art.png");
//! let path = cache.save_to_cache(&cover);
//! # Ok::<(), media_widget::pipeline::PipelineError>(())
//! ```

use anyhow::Context;
use image::{DynamicImage, ImageFormat, RgbaImage};
use log::{debug, warn};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::{CoverConfig, DEFAULT_CORNER_RADIUS, DEFAULT_COVER_SIZE};
use crate::resources::{ResourceBundle, ResourceId};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("image source was not specified, call from_image() or from_resource() first")]
    MissingSource,

    #[error("resource {0} is not bundled")]
    UnknownResource(ResourceId),

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Where the pipeline takes its first image from
#[derive(Debug, Clone)]
enum Source {
    Image(DynamicImage),
    Resource(ResourceId),
}

/// One transformation, replayed in registration order by [`ImagePipeline::process`]
#[derive(Debug, Clone, Copy)]
enum Step {
    /// Stretch to exactly `width` x `height`
    Scale { width: u32, height: u32 },
    /// Clear everything outside a rounded rectangle of `radius`
    RoundCorners { radius: f32 },
}

impl Step {
    fn apply(self, image: DynamicImage) -> DynamicImage {
        match self {
            Step::Scale { width, height } => scale(image, width, height),
            Step::RoundCorners { radius } => DynamicImage::ImageRgba8(round_corners(&image, radius)),
        }
    }
}

/// Single-use builder: set a source, add steps, then [`process`](Self::process).
#[derive(Debug, Clone)]
pub struct ImagePipeline<'r> {
    resources: &'r ResourceBundle,
    source: Option<Source>,
    steps: Vec<Step>,
}

impl<'r> ImagePipeline<'r> {
    /// Empty pipeline; `resources` backs [`from_resource`](Self::from_resource).
    pub fn new(resources: &'r ResourceBundle) -> Self {
        Self {
            resources,
            source: None,
            steps: Vec::new(),
        }
    }

    /// Use a bundled resource as the source.
    #[must_use]
    pub fn from_resource(mut self, id: ResourceId) -> Self {
        self.source = Some(Source::Resource(id));
        self
    }

    /// Use an already decoded image as the source.
    #[must_use]
    pub fn from_image(mut self, image: DynamicImage) -> Self {
        self.source = Some(Source::Image(image));
        self
    }

    /// Stretch to `width` x `height`, ignoring aspect ratio.
    #[must_use]
    pub fn scale(mut self, width: u32, height: u32) -> Self {
        self.steps.push(Step::Scale { width, height });
        self
    }

    /// Scale to the square widget slot (512x512).
    #[must_use]
    pub fn scale_default(self) -> Self {
        self.scale(DEFAULT_COVER_SIZE, DEFAULT_COVER_SIZE)
    }

    /// Clip to a rounded rectangle; see [`round_corners`](fn@round_corners).
    #[must_use]
    pub fn round_corners(mut self, radius: f32) -> Self {
        self.steps.push(Step::RoundCorners { radius });
        self
    }

    #[must_use]
    pub fn round_corners_default(self) -> Self {
        self.round_corners(DEFAULT_CORNER_RADIUS)
    }

    /// Scale + round using the configured widget geometry.
    #[must_use]
    pub fn widget_cover(self, cover: &CoverConfig) -> Self {
        self.scale(cover.size, cover.size)
            .round_corners(cover.corner_radius)
    }

    /// Run every registered step over the source image, left to right.
    pub fn process(self) -> Result<DynamicImage, PipelineError> {
        let source = match self.source {
            Some(Source::Image(image)) => image,
            Some(Source::Resource(id)) => self.resources.decode(id)?,
            None => return Err(PipelineError::MissingSource),
        };

        debug!(
            "Processing {}x{} image through {} step(s)",
            source.width(),
            source.height(),
            self.steps.len()
        );

        Ok(self
            .steps
            .into_iter()
            .fold(source, |image, step| step.apply(image)))
    }
}

// ---------------------------------------------------------------------------
// Transformations
// ---------------------------------------------------------------------------

/// Stretch `image` to `width` x `height`; returned untouched when already that size.
pub fn scale(image: DynamicImage, width: u32, height: u32) -> DynamicImage {
    let (width, height) = (width.max(1), height.max(1));
    if image.width() == width && image.height() == height {
        return image;
    }
    image.resize_exact(width, height, image::imageops::FilterType::Triangle)
}

/// Rounded-rectangle mask composited source-in.
///
/// The mask is the anti-aliased coverage of a rounded rectangle spanning the
/// whole image; the source alpha is multiplied by it. Pixels with full
/// coverage are copied unchanged.
///
/// Coverage is sampled at pixel centers, so the outermost corner pixel is
/// only fully cleared from a radius of 3px up. Smaller radii leave it
/// partially transparent.
pub fn round_corners(image: &DynamicImage, radius: f32) -> RgbaImage {
    let mut output = image.to_rgba8();
    let (width, height) = output.dimensions();
    let radius = radius.clamp(0.0, width.min(height) as f32 / 2.0);

    if radius <= 0.0 {
        return output;
    }

    for (x, y, pixel) in output.enumerate_pixels_mut() {
        let coverage = corner_coverage(x, y, width, height, radius);
        if coverage >= 1.0 {
            continue;
        }
        if coverage <= 0.0 {
            pixel.0 = [0, 0, 0, 0];
        } else {
            pixel.0[3] = (f32::from(pixel.0[3]) * coverage).round() as u8;
        }
    }

    output
}

/// Fraction of pixel (`x`, `y`) covered by the rounded rectangle.
fn corner_coverage(x: u32, y: u32, width: u32, height: u32, radius: f32) -> f32 {
    let px = x as f32 + 0.5;
    let py = y as f32 + 0.5;
    let right = width as f32 - radius;
    let bottom = height as f32 - radius;

    let cx = if px < radius {
        radius
    } else if px > right {
        right
    } else {
        return 1.0;
    };
    let cy = if py < radius {
        radius
    } else if py > bottom {
        bottom
    } else {
        return 1.0;
    };

    let distance = ((px - cx).powi(2) + (py - cy).powi(2)).sqrt();
    (radius - distance + 0.5).clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Cache slot
// ---------------------------------------------------------------------------

/// The single on-disk slot holding the latest processed cover
#[derive(Debug, Clone)]
pub struct CoverCache {
    dir: PathBuf,
    file_name: String,
}

impl CoverCache {
    /// Slot `file_name` inside `dir`. Nothing is touched until the first save.
    pub fn new(dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file_name: file_name.into(),
        }
    }

    /// Slot named by the configured cover file name
    pub fn with_config(dir: impl Into<PathBuf>, cover: &CoverConfig) -> Self {
        Self::new(dir, cover.file_name.clone())
    }

    /// Where [`save_to_cache`](Self::save_to_cache) writes, possibly relative
    pub fn cover_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// Encode `image` as PNG into the cache slot, replacing what was there.
    ///
    /// Returns the absolute path, or `None` when anything goes wrong on the
    /// way to disk. Callers treat `None` as "no artwork".
    pub fn save_to_cache(&self, image: &DynamicImage) -> Option<PathBuf> {
        match self.write_png(image) {
            Ok(path) => {
                debug!("Cover art cached at {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Failed to cache cover art: {e:#}");
                None
            }
        }
    }

    fn write_png(&self, image: &DynamicImage) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache directory: {:?}", self.dir))?;

        let path = std::path::absolute(self.cover_path())
            .context("Failed to resolve cover path")?;

        image
            .save_with_format(&path, ImageFormat::Png)
            .with_context(|| format!("Failed to write cover art: {path:?}"))?;

        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
