use std::f32::consts::PI;

use glam::Vec3;

use crate::config::{ControlScheme, ViewerConfig};
use crate::controller::input::{InputState, NavKey};
use crate::controller::{InertialController, ThrustController};
use crate::model::{Camera, Viewport};

/// Camera-local axes derived from the yaw -> pitch -> roll orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Basis {
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

impl Basis {
    pub fn of(camera: &Camera) -> Self {
        let orientation = camera.orientation();
        Self {
            forward: orientation * Vec3::NEG_Z,
            right: orientation * Vec3::X,
            up: orientation * Vec3::Y,
        }
    }

    pub fn direction(&self, key: NavKey) -> Vec3 {
        match key {
            NavKey::Forward => self.forward,
            NavKey::Back => -self.forward,
            NavKey::Left => -self.right,
            NavKey::Right => self.right,
            NavKey::Up => self.up,
            NavKey::Down => -self.up,
        }
    }
}

/// Convert a horizontal drag in pixels to a yaw delta in radians, where
/// dragging across `width` pixels turns by `degrees_across` degrees.
pub fn drag_yaw(dx: f32, width: f32, degrees_across: f32) -> f32 {
    let pixels_per_degree = width / degrees_across;
    (dx / pixels_per_degree) * PI / 180.0
}

/// A camera motion model. The frame driver calls [`update`] exactly once
/// per frame; the controller consumes whatever input accumulated since the
/// previous frame and moves the camera in place.
///
/// [`update`]: CameraController::update
pub trait CameraController {
    fn name(&self) -> &'static str;

    fn update(&mut self, input: &mut InputState, camera: &mut Camera, viewport: Viewport);

    /// Drop any carried motion (thrust, inertia).
    fn reset(&mut self);
}

/// Build the controller selected in the config.
pub fn build(config: &ViewerConfig) -> Box<dyn CameraController> {
    match config.controls.scheme {
        ControlScheme::Thrust => Box::new(ThrustController::new(config.thrust.clone())),
        ControlScheme::Inertial => Box::new(InertialController::new(config.inertial.clone())),
    }
}
