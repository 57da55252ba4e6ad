use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{error, info, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Event, HtmlCanvasElement, KeyboardEvent, MouseEvent, TouchEvent, Window};

use crate::config::ViewerConfig;
use crate::controller::input::wasm as dom;
use crate::controller::{camera_controller, FrameLoopContext, InputEvent, InputState};
use crate::model::{Camera, Viewport};
use crate::resources::{HttpFetcher, Resources};
use crate::scene::SceneResources;
use crate::view::{GpuContext, RenderState};

/// Boot the viewer in the page: canvas, listeners, asset loading, GPU and
/// the requestAnimationFrame loop.
pub async fn run(config: ViewerConfig) -> Result<(), JsValue> {
    let (window, document, canvas) = init_canvas()?;
    let viewport = Rc::new(Cell::new(Viewport::new(canvas.width(), canvas.height())));

    let input_state = Rc::new(RefCell::new(InputState::new()));
    input_state.borrow_mut().enabled = config.controls.enabled;
    setup_input_listeners(&document, &window, &canvas, input_state.clone(), viewport.clone())?;

    let mut resources = Resources::new();
    let handles = SceneResources::declare(&mut resources, &config.assets).map_err(js_error)?;
    resources
        .load_all(&HttpFetcher::new(config.assets.root.clone()))
        .await
        .map_err(js_error)?;
    let scene = handles.assemble().map_err(js_error)?;

    let gpu = GpuContext::new(&canvas, canvas.width(), canvas.height())
        .await
        .map_err(js_error)?;
    let mut render_state = RenderState::new(gpu.device.as_ref(), &gpu.config, &scene.environment);

    let cam = Rc::new(RefCell::new(Camera::from_settings(&config.camera, viewport.get())));
    let controller = camera_controller::build(&config);
    info!(controller = controller.name(), "controls ready");
    let mut frame_ctx = FrameLoopContext::new(cam, input_state, viewport, controller);

    let f = RcCellCallback::new(window.clone(), move || {
        let uniform = frame_ctx.update();

        let vp = frame_ctx.viewport.get();
        render_state.resize(gpu.device.as_ref(), &gpu.surface, vp.width as u32, vp.height as u32);
        render_state.write_camera(gpu.queue.as_ref(), &uniform);
        if let Err(e) = render_state.draw_frame(gpu.device.as_ref(), gpu.queue.as_ref(), &gpu.surface) {
            error!("frame dropped: {e}");
        }
    });
    f.start()
}

/// Document-level move listeners that exist only while a drag is active.
/// Dropping the guard detaches them, so release paths can drop it freely.
struct DragListeners {
    document: Document,
    mousemove: Closure<dyn FnMut(MouseEvent)>,
    touchmove: Closure<dyn FnMut(TouchEvent)>,
}

impl DragListeners {
    fn attach(document: &Document, input_state: Rc<RefCell<InputState>>) -> Result<Self, JsValue> {
        let mousemove = {
            let input_state = input_state.clone();
            Closure::wrap(Box::new(move |e: MouseEvent| {
                input_state.borrow_mut().process_event(&dom::mouse_move_to_input(&e));
            }) as Box<dyn FnMut(MouseEvent)>)
        };
        let touchmove = Closure::wrap(Box::new(move |e: TouchEvent| {
            input_state.borrow_mut().process_event(&dom::touch_move_to_input(&e));
        }) as Box<dyn FnMut(TouchEvent)>);

        document.add_event_listener_with_callback("mousemove", mousemove.as_ref().unchecked_ref())?;
        document.add_event_listener_with_callback("touchmove", touchmove.as_ref().unchecked_ref())?;

        Ok(Self {
            document: document.clone(),
            mousemove,
            touchmove,
        })
    }
}

impl Drop for DragListeners {
    fn drop(&mut self) {
        let removed = self
            .document
            .remove_event_listener_with_callback("mousemove", self.mousemove.as_ref().unchecked_ref())
            .and_then(|_| {
                self.document
                    .remove_event_listener_with_callback("touchmove", self.touchmove.as_ref().unchecked_ref())
            });
        if let Err(e) = removed {
            warn!("failed to detach drag listeners: {e:?}");
        }
    }
}

type DragSlot = Rc<RefCell<Option<DragListeners>>>;

fn begin_drag(slot: &DragSlot, document: &Document, input_state: &Rc<RefCell<InputState>>, event: InputEvent) {
    if !input_state.borrow().enabled {
        return;
    }
    input_state.borrow_mut().process_event(&event);
    // Replacing the guard detaches the previous session's listeners.
    match DragListeners::attach(document, input_state.clone()) {
        Ok(listeners) => *slot.borrow_mut() = Some(listeners),
        Err(e) => {
            error!("failed to attach drag listeners: {e:?}");
            slot.borrow_mut().take();
        }
    }
}

fn end_drag(slot: &DragSlot, input_state: &Rc<RefCell<InputState>>, event: InputEvent) {
    input_state.borrow_mut().process_event(&event);
    slot.borrow_mut().take();
}

fn setup_input_listeners(
    document: &Document,
    window: &Window,
    canvas: &HtmlCanvasElement,
    input_state: Rc<RefCell<InputState>>,
    viewport: Rc<Cell<Viewport>>,
) -> Result<(), JsValue> {
    let drag: DragSlot = Rc::new(RefCell::new(None));

    // Keyboard
    for (name, is_down) in [("keydown", true), ("keyup", false)] {
        let input_state = input_state.clone();
        let listener = Closure::wrap(Box::new(move |e: KeyboardEvent| {
            input_state
                .borrow_mut()
                .process_event(&dom::keyboard_event_to_input(&e, is_down));
        }) as Box<dyn FnMut(KeyboardEvent)>);
        document.add_event_listener_with_callback(name, listener.as_ref().unchecked_ref())?;
        listener.forget();
    }

    // Drag start on the canvas
    {
        let drag = drag.clone();
        let document_for_drag = document.clone();
        let input_state = input_state.clone();
        let mousedown = Closure::wrap(Box::new(move |e: MouseEvent| {
            begin_drag(&drag, &document_for_drag, &input_state, dom::mouse_down_to_input(&e));
            e.prevent_default();
        }) as Box<dyn FnMut(MouseEvent)>);
        canvas.add_event_listener_with_callback("mousedown", mousedown.as_ref().unchecked_ref())?;
        mousedown.forget();
    }
    {
        let drag = drag.clone();
        let document_for_drag = document.clone();
        let input_state = input_state.clone();
        let touchstart = Closure::wrap(Box::new(move |e: TouchEvent| {
            begin_drag(&drag, &document_for_drag, &input_state, dom::touch_start_to_input(&e));
        }) as Box<dyn FnMut(TouchEvent)>);
        canvas.add_event_listener_with_callback("touchstart", touchstart.as_ref().unchecked_ref())?;
        touchstart.forget();
    }

    // Drag end anywhere in the document
    {
        let drag = drag.clone();
        let input_state = input_state.clone();
        let mouseup = Closure::wrap(Box::new(move |_e: MouseEvent| {
            end_drag(&drag, &input_state, InputEvent::PointerUp);
        }) as Box<dyn FnMut(MouseEvent)>);
        document.add_event_listener_with_callback("mouseup", mouseup.as_ref().unchecked_ref())?;
        mouseup.forget();
    }
    {
        let drag = drag.clone();
        let input_state = input_state.clone();
        let touchend = Closure::wrap(Box::new(move |_e: TouchEvent| {
            end_drag(&drag, &input_state, InputEvent::TouchEnd);
        }) as Box<dyn FnMut(TouchEvent)>);
        document.add_event_listener_with_callback("touchend", touchend.as_ref().unchecked_ref())?;
        document.add_event_listener_with_callback("touchcancel", touchend.as_ref().unchecked_ref())?;
        touchend.forget();
    }

    // Focus loss - clear keys and any open drag
    {
        let drag = drag.clone();
        let input_state = input_state.clone();
        let blur = Closure::wrap(Box::new(move |_e: Event| {
            end_drag(&drag, &input_state, InputEvent::FocusLost);
        }) as Box<dyn FnMut(Event)>);
        window.add_event_listener_with_callback("blur", blur.as_ref().unchecked_ref())?;
        blur.forget();
    }
    {
        let drag = drag.clone();
        let input_state = input_state.clone();
        let document_for_visibility = document.clone();
        let visibility = Closure::wrap(Box::new(move |_e: Event| {
            let visible = !document_for_visibility.hidden();
            end_drag(&drag, &input_state, InputEvent::VisibilityChanged { visible });
        }) as Box<dyn FnMut(Event)>);
        document.add_event_listener_with_callback("visibilitychange", visibility.as_ref().unchecked_ref())?;
        visibility.forget();
    }

    // Resize - the canvas follows the window, the viewport follows the canvas
    {
        let window_for_resize = window.clone();
        let canvas = canvas.clone();
        let resize = Closure::wrap(Box::new(move |_e: Event| {
            let (w, h) = window_size(&window_for_resize);
            canvas.set_width(w);
            canvas.set_height(h);
            viewport.set(Viewport::new(w, h));
        }) as Box<dyn FnMut(Event)>);
        window.add_event_listener_with_callback("resize", resize.as_ref().unchecked_ref())?;
        resize.forget();
    }

    // Context menu prevention
    {
        let contextmenu = Closure::wrap(Box::new(move |e: MouseEvent| {
            e.prevent_default();
        }) as Box<dyn FnMut(MouseEvent)>);
        canvas.add_event_listener_with_callback("contextmenu", contextmenu.as_ref().unchecked_ref())?;
        contextmenu.forget();
    }

    Ok(())
}

fn window_size(window: &Window) -> (u32, u32) {
    let w = window.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(800.0);
    let h = window.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(600.0);
    (w.max(1.0) as u32, h.max(1.0) as u32)
}

fn init_canvas() -> Result<(Window, Document, HtmlCanvasElement), JsValue> {
    let window = web_sys::window().ok_or(js_error("no global `window`"))?;
    let document = window.document().ok_or(js_error("no document on window"))?;
    let body = document.body().ok_or(js_error("no body on document"))?;
    let canvas_el = document
        .create_element("canvas")?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| js_error("failed to create canvas"))?;
    let (width, height) = window_size(&window);
    canvas_el.set_width(width);
    canvas_el.set_height(height);
    canvas_el.set_attribute("style", "display: block; touch-action: none")?;
    body.append_child(&canvas_el)?;
    Ok((window, document, canvas_el))
}

fn js_error(msg: impl ToString) -> JsValue {
    JsValue::from_str(&msg.to_string())
}

/// Self-rescheduling requestAnimationFrame callback.
struct RcCellCallback {
    inner: Rc<RefCell<Box<dyn FnMut()>>>,
    window: Window,
}

impl RcCellCallback {
    fn new(window: Window, f: impl FnMut() + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Box::new(f))),
            window,
        }
    }

    fn start(self) -> Result<(), JsValue> {
        let inner = self.inner.clone();
        let window = self.window.clone();

        let callback = Rc::new(RefCell::new(None::<Closure<dyn FnMut()>>));
        let callback_clone = callback.clone();

        *callback.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            inner.borrow_mut().as_mut()();

            let cb_ref = callback_clone.borrow();
            if let Some(cb) = cb_ref.as_ref() {
                if let Err(e) = window.request_animation_frame(cb.as_ref().unchecked_ref()) {
                    error!("requestAnimationFrame failed, frame loop stopped: {e:?}");
                }
            }
        }) as Box<dyn FnMut()>));

        if let Some(cb) = callback.borrow().as_ref() {
            self.window.request_animation_frame(cb.as_ref().unchecked_ref())?;
        }

        // The loop lives for the lifetime of the page.
        std::mem::forget(callback);
        Ok(())
    }
}
