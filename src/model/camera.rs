use glam::{EulerRot, Mat4, Quat, Vec3};

use crate::config::CameraSettings;

/// Size of the drawing surface in pixels. Drag scaling reads this every
/// frame so a resize takes effect immediately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1) as f32,
            height: height.max(1) as f32,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }
}

/// Camera pose plus projection parameters.
///
/// Orientation is stored as yaw/pitch/roll and always composed yaw first,
/// then pitch, then roll (intrinsic Y-X-Z).
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    pub fov_y: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            position: Vec3::new(3.0, 8.0, 10.0),
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            fov_y: 75f32.to_radians(),
            aspect: Viewport::new(width, height).aspect(),
            z_near: 0.1,
            z_far: 100.0,
        }
    }

    pub fn from_settings(settings: &CameraSettings, viewport: Viewport) -> Self {
        Self {
            position: Vec3::from_array(settings.position),
            fov_y: settings.fov_y_deg.to_radians(),
            aspect: viewport.aspect(),
            z_near: settings.z_near,
            z_far: settings.z_far,
            ..Self::new(1, 1)
        }
    }

    pub fn orientation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, self.roll)
    }

    pub fn forward(&self) -> Vec3 {
        self.orientation() * Vec3::NEG_Z
    }

    pub fn right(&self) -> Vec3 {
        self.orientation() * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.orientation() * Vec3::Y
    }

    pub fn set_aspect(&mut self, viewport: Viewport) {
        self.aspect = viewport.aspect();
    }

    pub fn view(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation(), self.position).inverse()
    }

    pub fn view_proj(&self) -> Mat4 {
        let proj = Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far);
        proj * self.view()
    }
}
