// CONTROLLER: input tracking, camera motion models and the per-frame update
pub mod camera_controller;
pub mod frame_loop;
pub mod inertial;
pub mod input;
pub mod thrust;

pub use camera_controller::{Basis, CameraController};
pub use frame_loop::{CameraUniform, FrameLoopContext};
pub use inertial::InertialController;
pub use input::{InputEvent, InputState, NavKey, PointerSource};
pub use thrust::ThrustController;
