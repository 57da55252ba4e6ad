use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::controller::camera_controller::CameraController;
use crate::controller::input::InputState;
use crate::model::{Camera, Viewport};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub position: [f32; 4],
}

impl CameraUniform {
    pub fn from_camera(camera: &Camera) -> Self {
        Self {
            view_proj: camera.view_proj().to_cols_array_2d(),
            position: camera.position.extend(1.0).to_array(),
        }
    }
}

/// Per-frame state shared between the event listeners and the frame driver.
///
/// Listeners only write into `input_state` and `viewport`; the frame driver
/// calls [`FrameLoopContext::update`] once per display refresh, which is the
/// only place the camera moves.
pub struct FrameLoopContext {
    pub cam: Rc<RefCell<Camera>>,
    pub input_state: Rc<RefCell<InputState>>,
    pub viewport: Rc<Cell<Viewport>>,
    pub camera_controller: Box<dyn CameraController>,
    pub cam_buf_data: CameraUniform,
    frame: u64,
}

impl FrameLoopContext {
    pub fn new(
        cam: Rc<RefCell<Camera>>,
        input_state: Rc<RefCell<InputState>>,
        viewport: Rc<Cell<Viewport>>,
        camera_controller: Box<dyn CameraController>,
    ) -> Self {
        let cam_buf_data = CameraUniform::from_camera(&cam.borrow());
        Self {
            cam,
            input_state,
            viewport,
            camera_controller,
            cam_buf_data,
            frame: 0,
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Advance one frame and return the camera uniform to upload.
    pub fn update(&mut self) -> CameraUniform {
        let viewport = self.viewport.get();
        let mut cam = self.cam.borrow_mut();
        cam.set_aspect(viewport);
        self.camera_controller
            .update(&mut self.input_state.borrow_mut(), &mut cam, viewport);

        self.frame += 1;
        if self.frame % 600 == 0 {
            tracing::trace!(
                frame = self.frame,
                controller = self.camera_controller.name(),
                position = ?cam.position,
                yaw = cam.yaw,
                "camera pose"
            );
        }

        self.cam_buf_data = CameraUniform::from_camera(&cam);
        self.cam_buf_data
    }
}
