use std::path::Path;

use crate::error::ResourceError;

/// The closed set of resource types the loader knows how to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// glTF scene (`.glb`, `.gltf`)
    Model,
    /// Decoded image (`.png`, `.jpg`, `.jpeg`)
    Texture,
    /// Plain text, usually shader source (`.glsl`, `.vert`, `.frag`)
    Text,
}

const EXTENSIONS: [(ResourceKind, &[&str]); 3] = [
    (ResourceKind::Model, &["glb", "gltf"]),
    (ResourceKind::Texture, &["png", "jpg", "jpeg"]),
    (ResourceKind::Text, &["glsl", "vert", "frag"]),
];

impl ResourceKind {
    /// Infer the kind from the file extension of `location`.
    pub fn from_location(location: &str) -> Result<Self, ResourceError> {
        let extension = Path::new(location)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        extension
            .and_then(|ext| {
                EXTENSIONS
                    .iter()
                    .find(|(_, exts)| exts.contains(&ext.as_str()))
                    .map(|(kind, _)| *kind)
            })
            .ok_or_else(|| ResourceError::UnrecognizedType {
                location: location.to_string(),
            })
    }
}

/// Observable lifecycle of a registered resource. Transitions only move
/// forward: `Registered -> Loading -> Loaded -> Transformed`, or to `Failed`
/// from any of them when the batch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResourcePhase {
    Registered,
    Loading,
    Loaded,
    Transformed,
    Failed,
}
