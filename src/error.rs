use thiserror::Error;

use crate::model::ResourceKind;

/// Failures while fetching the raw bytes behind a resource location.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http status {status}")]
    Http { status: u16 },

    #[error("javascript error: {0}")]
    Js(String),

    #[error("no bundled bytes for this location")]
    Missing,

    #[error("fetch worker vanished before replying")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("unrecognized resource type: {location}")]
    UnrecognizedType { location: String },

    #[error("attempted to get() {location} before it was loaded")]
    NotLoaded { location: String },

    #[error("cannot register {location}: loading has already started")]
    RegistrationClosed { location: String },

    #[error("failed to fetch {location}: {source}")]
    Fetch {
        location: String,
        #[source]
        source: FetchError,
    },

    #[error("failed to decode {location}: {reason}")]
    Decode { location: String, reason: String },

    #[error("{location} is a {found:?} resource, expected {expected:?}")]
    KindMismatch {
        location: String,
        expected: ResourceKind,
        found: ResourceKind,
    },

    #[error("transform of {location} failed: {source}")]
    Transform {
        location: String,
        #[source]
        source: Box<TransformError>,
    },
}

impl ResourceError {
    /// Location of the resource the error is about.
    pub fn location(&self) -> &str {
        match self {
            Self::UnrecognizedType { location }
            | Self::NotLoaded { location }
            | Self::RegistrationClosed { location }
            | Self::Fetch { location, .. }
            | Self::Decode { location, .. }
            | Self::KindMismatch { location, .. }
            | Self::Transform { location, .. } => location,
        }
    }
}

/// Failures raised by a post-load transform. The loader attaches the
/// location of the resource being transformed.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("expected a {expected:?} asset, found {found:?}")]
    KindMismatch {
        expected: ResourceKind,
        found: ResourceKind,
    },

    #[error("dependency unavailable: {0}")]
    Dependency(#[from] ResourceError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("could not create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("could not open device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("surface reports no supported formats")]
    NoSurfaceFormat,

    #[error("could not acquire frame: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

/// Top-level failure of a viewer run.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error("platform error: {0}")]
    Platform(String),
}
