//! Bundled image resources
//!
//! Resources are kept encoded and decoded on demand, so a pipeline that
//! never touches the placeholder pays nothing for it.

use image::DynamicImage;
use std::collections::HashMap;
use std::fmt;

use crate::pipeline::PipelineError;

/// Placeholder artwork shown while nothing is playing
const PLACEHOLDER_PNG: &[u8] = include_bytes!("../assets/placeholder.png");

/// Name of a bundled image resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(&'static str);

impl ResourceId {
    pub const PLACEHOLDER: ResourceId = ResourceId("image_placeholder");

    /// Id for a resource added with [`ResourceBundle::insert`].
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Encoded image resources addressable by [`ResourceId`]
#[derive(Debug, Clone, Default)]
pub struct ResourceBundle {
    entries: HashMap<ResourceId, &'static [u8]>,
}

impl ResourceBundle {
    /// An empty bundle
    pub fn empty() -> Self {
        Self::default()
    }

    /// The bundle shipped with the crate (placeholder artwork only)
    pub fn builtin() -> Self {
        let mut bundle = Self::empty();
        bundle.insert(ResourceId::PLACEHOLDER, PLACEHOLDER_PNG);
        bundle
    }

    /// Add or replace an encoded resource.
    pub fn insert(&mut self, id: ResourceId, bytes: &'static [u8]) {
        self.entries.insert(id, bytes);
    }

    /// Whether `id` is bundled; decoding may still fail.
    pub fn contains(&self, id: ResourceId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Decode a resource into an image.
    pub fn decode(&self, id: ResourceId) -> Result<DynamicImage, PipelineError> {
        let bytes = self
            .entries
            .get(&id)
            .ok_or(PipelineError::UnknownResource(id))?;

        Ok(image::load_from_memory(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_placeholder_decodes() {
        let bundle = ResourceBundle::builtin();
        assert!(bundle.contains(ResourceId::PLACEHOLDER));

        let image = bundle.decode(ResourceId::PLACEHOLDER).unwrap();
        assert!(image.width() > 0);
        assert!(image.height() > 0);
    }

    #[test]
    fn test_unknown_resource() {
        let bundle = ResourceBundle::empty();
        let err = bundle.decode(ResourceId::PLACEHOLDER).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownResource(id) if id == ResourceId::PLACEHOLDER));
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let mut bundle = ResourceBundle::empty();
        let id = ResourceId::new("broken");
        bundle.insert(id, b"not an image");
        assert!(matches!(bundle.decode(id), Err(PipelineError::Decode(_))));
    }
}
