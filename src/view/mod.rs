// VIEW: GPU setup and the per-frame render pass
pub mod gpu_init;
pub mod render;

pub use gpu_init::GpuContext;
pub use render::RenderState;
