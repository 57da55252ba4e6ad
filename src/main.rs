use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use glam::Vec2;
use tracing::{error, info};
use winit::{
    event::*,
    event_loop::EventLoop,
    keyboard::Key,
    window::Window,
};

use roomview::{
    config::ViewerConfig,
    controller::{camera_controller, FrameLoopContext, InputEvent, InputState},
    error::{GpuError, ViewerError},
    logging,
    model::{Camera, Viewport},
    resources::{FileFetcher, Resources},
    scene::{Scene, SceneResources},
    view::{GpuContext, RenderState},
};

struct App {
    gpu: GpuContext,
    window: Arc<Window>,
    render_state: RenderState,
    frame_ctx: FrameLoopContext,
    cursor: Vec2,
    touch_id: Option<u64>,
}

impl App {
    async fn new(window: Arc<Window>, config: &ViewerConfig, scene: &Scene) -> Result<Self, ViewerError> {
        let size = window.inner_size();
        let gpu = GpuContext::new_native(window.clone(), size.width, size.height).await?;
        let render_state = RenderState::new(gpu.device.as_ref(), &gpu.config, &scene.environment);

        let viewport = Rc::new(Cell::new(Viewport::new(size.width, size.height)));
        let camera = Rc::new(RefCell::new(Camera::from_settings(&config.camera, viewport.get())));
        let input_state = Rc::new(RefCell::new(InputState::new()));
        input_state.borrow_mut().enabled = config.controls.enabled;

        let controller = camera_controller::build(config);
        info!(controller = controller.name(), "controls ready");

        Ok(Self {
            gpu,
            window,
            render_state,
            frame_ctx: FrameLoopContext::new(camera, input_state, viewport, controller),
            cursor: Vec2::ZERO,
            touch_id: None,
        })
    }

    fn push(&self, event: InputEvent) {
        self.frame_ctx.input_state.borrow_mut().process_event(&event);
    }

    /// Translate window events into viewer input. Returns true if consumed.
    fn input(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput {
                event: KeyEvent { state, logical_key, .. },
                ..
            } => {
                if let Key::Character(text) = logical_key {
                    let key = text.to_string();
                    self.push(match state {
                        ElementState::Pressed => InputEvent::KeyDown(key),
                        ElementState::Released => InputEvent::KeyUp(key),
                    });
                }
                true
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.push(match state {
                    ElementState::Pressed => InputEvent::PointerDown {
                        x: self.cursor.x,
                        y: self.cursor.y,
                    },
                    ElementState::Released => InputEvent::PointerUp,
                });
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Vec2::new(position.x as f32, position.y as f32);
                self.push(InputEvent::PointerMove {
                    x: self.cursor.x,
                    y: self.cursor.y,
                });
                true
            }
            WindowEvent::Touch(touch) => {
                let pos = Vec2::new(touch.location.x as f32, touch.location.y as f32);
                match touch.phase {
                    TouchPhase::Started => {
                        self.touch_id = Some(touch.id);
                        self.push(InputEvent::TouchStart { first: Some(pos) });
                    }
                    TouchPhase::Moved if self.touch_id == Some(touch.id) => {
                        self.push(InputEvent::TouchMove { first: Some(pos) });
                    }
                    TouchPhase::Ended | TouchPhase::Cancelled if self.touch_id == Some(touch.id) => {
                        self.touch_id = None;
                        self.push(InputEvent::TouchEnd);
                    }
                    _ => {}
                }
                true
            }
            WindowEvent::Focused(false) => {
                self.push(InputEvent::FocusLost);
                true
            }
            WindowEvent::Occluded(occluded) => {
                self.push(InputEvent::VisibilityChanged { visible: !occluded });
                true
            }
            _ => false,
        }
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.frame_ctx
                .viewport
                .set(Viewport::new(new_size.width, new_size.height));
            self.render_state
                .resize(&self.gpu.device, &self.gpu.surface, new_size.width, new_size.height);
        }
    }

    fn render(&mut self) -> Result<(), GpuError> {
        let uniform = self.frame_ctx.update();
        self.render_state.write_camera(&self.gpu.queue, &uniform);
        self.render_state
            .draw_frame(&self.gpu.device, &self.gpu.queue, &self.gpu.surface)
    }
}

fn load_scene(config: &ViewerConfig) -> Result<Scene, ViewerError> {
    let mut resources = Resources::new();
    let handles = SceneResources::declare(&mut resources, &config.assets)?;
    let fetcher = FileFetcher::new(&config.assets.root).map_err(|e| ViewerError::Platform(e.to_string()))?;
    pollster::block_on(resources.load_all(&fetcher))?;
    Ok(handles.assemble()?)
}

fn run() -> Result<(), ViewerError> {
    let config = ViewerConfig::from_args_or_env()?;
    let scene = load_scene(&config)?;

    let event_loop = EventLoop::new().map_err(|e| ViewerError::Platform(e.to_string()))?;
    let window_attributes = Window::default_attributes()
        .with_title(config.window.title.clone())
        .with_inner_size(winit::dpi::LogicalSize::new(config.window.width, config.window.height));
    let window = event_loop
        .create_window(window_attributes)
        .map_err(|e| ViewerError::Platform(e.to_string()))?;
    let window = Arc::new(window);

    let mut app = pollster::block_on(App::new(window.clone(), &config, &scene))?;

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { ref event, window_id } if window_id == app.window.id() => {
                if !app.input(event) {
                    match event {
                        WindowEvent::CloseRequested => elwt.exit(),
                        WindowEvent::Resized(physical_size) => app.resize(*physical_size),
                        WindowEvent::RedrawRequested => match app.render() {
                            Ok(()) => {}
                            Err(GpuError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                                error!("GPU out of memory");
                                elwt.exit();
                            }
                            Err(e) => error!("frame dropped: {e}"),
                        },
                        _ => {}
                    }
                }
            }
            Event::AboutToWait => app.window.request_redraw(),
            _ => {}
        })
        .map_err(|e| ViewerError::Platform(e.to_string()))
}

fn main() {
    logging::init();
    if let Err(e) = run() {
        error!("{e}");
        std::process::exit(1);
    }
}
