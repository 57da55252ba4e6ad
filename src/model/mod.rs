// MODEL: camera pose, resource metadata and decoded assets
pub mod asset;
pub mod camera;
pub mod resource;

pub use asset::{Asset, MeshSummary, ModelData, ModelNode, PrimitiveSummary};
pub use camera::{Camera, Viewport};
pub use resource::{ResourceKind, ResourcePhase};
