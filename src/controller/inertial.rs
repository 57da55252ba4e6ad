use std::f32::consts::PI;

use glam::Vec2;

use crate::config::InertialSettings;
use crate::controller::camera_controller::{Basis, CameraController};
use crate::controller::input::InputState;
use crate::model::{Camera, Viewport};

/// Drag-only control with "flick to spin" inertia. Keys are ignored.
///
/// While dragging, the horizontal pixel delta turns the camera and the
/// vertical delta moves it along its forward axis; the per-frame result is
/// remembered as the inertia vector `(yaw, translate)`. After release the
/// inertia keeps being applied and decays geometrically until it is
/// snapped to zero.
#[derive(Debug, Clone)]
pub struct InertialController {
    settings: InertialSettings,
    inertia: Vec2,
}

impl InertialController {
    pub fn new(settings: InertialSettings) -> Self {
        Self {
            settings,
            inertia: Vec2::ZERO,
        }
    }

    pub fn inertia(&self) -> Vec2 {
        self.inertia
    }

    /// Horizontal field of view in degrees for the viewport's aspect ratio,
    /// widened by the configured offset.
    pub fn horizontal_fov_deg(&self, viewport: Viewport) -> f32 {
        let half_vertical = self.settings.vertical_fov_deg.to_radians() / 2.0;
        let horizontal = 2.0 * (half_vertical.tan() * viewport.aspect()).atan();
        horizontal.to_degrees() + self.settings.fov_offset_deg
    }

    /// Per-frame `(yaw, translate)` for a pixel delta.
    pub fn drag_motion(&self, delta: Vec2, viewport: Viewport) -> Vec2 {
        let pixels_per_degree = viewport.width / self.horizontal_fov_deg(viewport);
        let yaw = (delta.x / pixels_per_degree) * PI / 180.0;
        let translate = delta.y * self.settings.translate_scale / viewport.aspect();
        Vec2::new(yaw, translate)
    }

    fn apply(camera: &mut Camera, motion: Vec2) {
        let basis = Basis::of(camera);
        camera.yaw += motion.x;
        camera.position += basis.forward * motion.y;
    }
}

impl CameraController for InertialController {
    fn name(&self) -> &'static str {
        "inertial"
    }

    fn update(&mut self, input: &mut InputState, camera: &mut Camera, viewport: Viewport) {
        let delta = input.take_drag_delta();

        if input.is_dragging() || delta != Vec2::ZERO {
            self.inertia = self.drag_motion(delta, viewport);
            Self::apply(camera, self.inertia);
        } else if self.inertia != Vec2::ZERO {
            Self::apply(camera, self.inertia);
            self.inertia *= self.settings.decay;
        }

        if self.inertia.length() < self.settings.epsilon {
            self.inertia = Vec2::ZERO;
        }
    }

    fn reset(&mut self) {
        self.inertia = Vec2::ZERO;
    }
}
