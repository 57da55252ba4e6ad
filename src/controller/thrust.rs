use glam::{Vec2, Vec3};

use crate::config::ThrustSettings;
use crate::controller::camera_controller::{drag_yaw, Basis, CameraController};
use crate::controller::input::InputState;
use crate::model::{Camera, Viewport};

/// Keyboard flight: held keys push a damped velocity, dragging turns the
/// camera and moves it along its forward axis.
#[derive(Debug, Clone)]
pub struct ThrustController {
    settings: ThrustSettings,
    velocity: Vec3,
}

impl ThrustController {
    pub fn new(settings: ThrustSettings) -> Self {
        Self {
            settings,
            velocity: Vec3::ZERO,
        }
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn settings(&self) -> &ThrustSettings {
        &self.settings
    }

    fn step_velocity(&mut self, input: &InputState, basis: &Basis) {
        let s = &self.settings;
        for key in input.keys().held() {
            self.velocity += basis.direction(key) * s.thrust;
        }
        self.velocity *= s.damping;
        self.velocity = self.velocity.clamp_length_max(s.max_speed);
        if self.velocity.length() < s.snap_threshold {
            self.velocity = Vec3::ZERO;
        }
    }
}

impl CameraController for ThrustController {
    fn name(&self) -> &'static str {
        "thrust"
    }

    fn update(&mut self, input: &mut InputState, camera: &mut Camera, viewport: Viewport) {
        let basis = Basis::of(camera);

        self.step_velocity(input, &basis);
        camera.position += self.velocity;

        let drag = input.take_drag_delta();
        if drag != Vec2::ZERO {
            camera.position += basis.forward * (drag.y * self.settings.drag_translate_scale);
            // Vertical drag does not pitch; only yaw follows the pointer.
            camera.yaw += drag_yaw(drag.x, viewport.width, self.settings.degrees_per_width);
        }
    }

    fn reset(&mut self) {
        self.velocity = Vec3::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;
    use crate::controller::input::{InputEvent, NavKey};

    fn setup() -> (ThrustController, InputState, Camera, Viewport) {
        let mut camera = Camera::new(1800, 900);
        camera.position = Vec3::ZERO;
        (
            ThrustController::new(ThrustSettings::default()),
            InputState::new(),
            camera,
            Viewport::new(1800, 900),
        )
    }

    fn key(down: bool, name: &str) -> InputEvent {
        if down {
            InputEvent::KeyDown(name.to_string())
        } else {
            InputEvent::KeyUp(name.to_string())
        }
    }

    #[test]
    fn holding_forward_accelerates_then_release_decays_to_zero() {
        let (mut ctl, mut input, mut camera, viewport) = setup();
        let forward = camera.forward();

        input.process_event(&key(true, "w"));
        let mut steps = Vec::new();
        for _ in 0..10 {
            let before = camera.position;
            ctl.update(&mut input, &mut camera, viewport);
            steps.push(camera.position - before);
        }

        for step in &steps {
            // Motion stays on the forward axis.
            assert!(step.cross(forward).length() < 1e-6);
            assert!(step.dot(forward) > 0.0);
            assert!(step.length() <= 0.06 + 1e-6);
        }
        for pair in steps.windows(2) {
            assert!(pair[1].length() > pair[0].length());
        }

        input.process_event(&key(false, "w"));
        let mut lengths = Vec::new();
        for _ in 0..30 {
            let before = camera.position;
            ctl.update(&mut input, &mut camera, viewport);
            lengths.push((camera.position - before).length());
        }
        for pair in lengths.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
        assert_eq!(*lengths.last().unwrap(), 0.0);
        assert_eq!(ctl.velocity(), Vec3::ZERO);
    }

    #[test]
    fn velocity_never_exceeds_max_speed() {
        let (mut ctl, mut input, mut camera, viewport) = setup();
        camera.pitch = 0.4;
        camera.yaw = 1.3;
        let keys = ["w", "s", "a", "d", "e", "q"];

        for mask in 0u32..64 {
            ctl.reset();
            input.clear_keys();
            for (bit, name) in keys.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    input.process_event(&key(true, name));
                }
            }
            for _ in 0..50 {
                ctl.update(&mut input, &mut camera, viewport);
                assert!(ctl.velocity().length() <= 0.06 + 1e-6, "mask {mask:06b}");
            }
        }
    }

    #[test]
    fn tighter_max_speed_is_enforced() {
        let settings = ThrustSettings {
            thrust: 0.05,
            max_speed: 0.02,
            ..ThrustSettings::default()
        };
        let mut ctl = ThrustController::new(settings);
        let (_, mut input, mut camera, viewport) = setup();
        input.process_event(&key(true, "d"));
        input.process_event(&key(true, "e"));
        for _ in 0..20 {
            ctl.update(&mut input, &mut camera, viewport);
        }
        assert!((ctl.velocity().length() - 0.02).abs() < 1e-6);
    }

    #[test]
    fn decay_snaps_to_zero_within_bounded_frames() {
        let (mut ctl, mut input, mut camera, viewport) = setup();
        input.process_event(&key(true, "w"));
        input.process_event(&key(true, "d"));
        for _ in 0..40 {
            ctl.update(&mut input, &mut camera, viewport);
        }
        assert!(ctl.velocity().length() > 0.05);

        input.clear_keys();
        // 0.06 * 0.85^14 < 0.007
        for _ in 0..14 {
            ctl.update(&mut input, &mut camera, viewport);
        }
        assert_eq!(ctl.velocity(), Vec3::ZERO);
    }

    #[test]
    fn opposing_keys_cancel() {
        let (mut ctl, mut input, mut camera, viewport) = setup();
        input.process_event(&key(true, "a"));
        input.process_event(&key(true, "d"));
        ctl.update(&mut input, &mut camera, viewport);
        assert_eq!(ctl.velocity(), Vec3::ZERO);
        assert_eq!(camera.position, Vec3::ZERO);
    }

    #[test]
    fn horizontal_drag_turns_by_viewport_scaled_yaw() {
        let (mut ctl, mut input, mut camera, viewport) = setup();
        camera.yaw = 0.0;
        input.process_event(&InputEvent::PointerDown { x: 200.0, y: 300.0 });
        input.process_event(&InputEvent::PointerMove { x: 300.0, y: 300.0 });

        ctl.update(&mut input, &mut camera, viewport);

        let expected = 100.0_f32 / (1800.0_f32 / 180.0) * PI / 180.0;
        assert_eq!(camera.yaw, expected);
        assert_eq!(camera.pitch, 0.0);
        assert_eq!(camera.position, Vec3::ZERO);
    }

    #[test]
    fn vertical_drag_moves_along_forward_without_pitch() {
        let (mut ctl, mut input, mut camera, viewport) = setup();
        input.process_event(&InputEvent::PointerDown { x: 0.0, y: 0.0 });
        input.process_event(&InputEvent::PointerMove { x: 0.0, y: 50.0 });

        ctl.update(&mut input, &mut camera, viewport);

        assert_eq!(camera.pitch, 0.0);
        assert!(camera.position.abs_diff_eq(Vec3::NEG_Z * 0.5, 1e-6));
    }

    #[test]
    fn drag_scale_follows_live_viewport_width() {
        let (mut ctl, mut input, mut camera, _) = setup();
        input.process_event(&InputEvent::PointerDown { x: 0.0, y: 0.0 });
        input.process_event(&InputEvent::PointerMove { x: 100.0, y: 0.0 });
        ctl.update(&mut input, &mut camera, Viewport::new(900, 900));
        assert!((camera.yaw - PI / 9.0).abs() < 1e-6);
        assert!(!input.is_key_pressed(NavKey::Forward));
    }
}
