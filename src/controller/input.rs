/// Platform-agnostic input handling system
use glam::Vec2;
use tracing::{debug, error};

/// Platform-independent input events
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    // Keyboard events
    KeyDown(String),
    KeyUp(String),

    // Mouse events
    PointerDown { x: f32, y: f32 },
    PointerMove { x: f32, y: f32 },
    PointerUp,

    // Touch events carry the first touch point, if the event had any
    TouchStart { first: Option<Vec2> },
    TouchMove { first: Option<Vec2> },
    TouchEnd,

    // Window events
    FocusLost,
    VisibilityChanged { visible: bool },
}

/// Logical navigation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavKey {
    Forward,
    Back,
    Left,
    Right,
    Up,
    Down,
}

impl NavKey {
    pub const ALL: [NavKey; 6] = [
        NavKey::Forward,
        NavKey::Back,
        NavKey::Left,
        NavKey::Right,
        NavKey::Up,
        NavKey::Down,
    ];

    /// Map a key name (as reported by the browser or winit) to a navigation
    /// key. Matching is case-insensitive; anything else is unmapped.
    pub fn from_key(key: &str) -> Option<Self> {
        let mut chars = key.chars();
        let c = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        match c.to_ascii_lowercase() {
            'w' => Some(NavKey::Forward),
            's' => Some(NavKey::Back),
            'a' => Some(NavKey::Left),
            'd' => Some(NavKey::Right),
            'e' => Some(NavKey::Up),
            'q' => Some(NavKey::Down),
            _ => None,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Pressed/released flag for every [`NavKey`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyState {
    pressed: [bool; 6],
}

impl KeyState {
    pub fn set(&mut self, key: NavKey, pressed: bool) {
        self.pressed[key.index()] = pressed;
    }

    pub fn is_pressed(&self, key: NavKey) -> bool {
        self.pressed[key.index()]
    }

    pub fn any(&self) -> bool {
        self.pressed.iter().any(|p| *p)
    }

    pub fn held(&self) -> impl Iterator<Item = NavKey> + '_ {
        NavKey::ALL.into_iter().filter(|key| self.is_pressed(*key))
    }

    pub fn clear(&mut self) {
        self.pressed = [false; 6];
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerSource {
    Mouse,
    Touch,
}

/// One pointer-down .. pointer-up interval.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    id: u64,
    source: PointerSource,
    last: Option<Vec2>,
}

impl DragSession {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn source(&self) -> PointerSource {
        self.source
    }

    pub fn last(&self) -> Option<Vec2> {
        self.last
    }

    /// Record a new pointer position and return the delta from the previous
    /// one. The first known position yields no delta.
    fn advance(&mut self, pos: Vec2) -> Option<Vec2> {
        let delta = self.last.map(|last| pos - last);
        self.last = Some(pos);
        delta
    }
}

/// Current key and drag state, fed by raw device events and read once per
/// frame by the camera controller.
#[derive(Debug, Clone)]
pub struct InputState {
    pub enabled: bool,
    keys: KeyState,
    drag: Option<DragSession>,
    drag_delta: Vec2,
    next_session: u64,
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

impl InputState {
    pub fn new() -> Self {
        Self {
            enabled: true,
            keys: KeyState::default(),
            drag: None,
            drag_delta: Vec2::ZERO,
            next_session: 0,
        }
    }

    /// Process an input event and update state
    pub fn process_event(&mut self, event: &InputEvent) {
        if !self.enabled {
            return;
        }
        match event {
            InputEvent::KeyDown(key) => {
                if let Some(nav) = NavKey::from_key(key) {
                    self.keys.set(nav, true);
                }
            }
            InputEvent::KeyUp(key) => {
                if let Some(nav) = NavKey::from_key(key) {
                    self.keys.set(nav, false);
                }
            }
            InputEvent::PointerDown { x, y } => {
                self.begin_drag(PointerSource::Mouse, Some(Vec2::new(*x, *y)));
            }
            InputEvent::PointerMove { x, y } => {
                self.drag_to(Vec2::new(*x, *y));
            }
            InputEvent::TouchStart { first } => {
                if first.is_none() {
                    error!("touchstart without touch points; drag starts without coordinates");
                }
                self.begin_drag(PointerSource::Touch, *first);
            }
            InputEvent::TouchMove { first } => match first {
                Some(pos) => self.drag_to(*pos),
                None => error!("touchmove without touch points; event ignored"),
            },
            InputEvent::PointerUp | InputEvent::TouchEnd => {
                self.end_drag();
            }
            InputEvent::FocusLost | InputEvent::VisibilityChanged { .. } => {
                self.clear_keys();
                self.end_drag();
            }
        }
    }

    pub fn keys(&self) -> &KeyState {
        &self.keys
    }

    pub fn is_key_pressed(&self, key: NavKey) -> bool {
        self.keys.is_pressed(key)
    }

    pub fn clear_keys(&mut self) {
        self.keys.clear();
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn drag_session(&self) -> Option<&DragSession> {
        self.drag.as_ref()
    }

    /// Start a drag session. A session still open (e.g. touch followed by
    /// the browser's synthesized mouse events) is closed first.
    pub fn begin_drag(&mut self, source: PointerSource, pos: Option<Vec2>) -> u64 {
        if let Some(previous) = self.end_drag() {
            debug!(session = previous.id, "drag session replaced by a new one");
        }
        let id = self.next_session;
        self.next_session += 1;
        self.drag = Some(DragSession { id, source, last: pos });
        debug!(session = id, ?source, "drag session started");
        id
    }

    /// Feed a pointer position into the active session. Deltas are
    /// incremental and accumulate until the next frame consumes them.
    pub fn drag_to(&mut self, pos: Vec2) {
        if let Some(session) = self.drag.as_mut() {
            if let Some(delta) = session.advance(pos) {
                self.drag_delta += delta;
            }
        }
    }

    /// End the active session, if any. Safe to call repeatedly; only the
    /// first call after a `begin_drag` returns the session.
    pub fn end_drag(&mut self) -> Option<DragSession> {
        let session = self.drag.take();
        if let Some(session) = &session {
            debug!(session = session.id, "drag session ended");
        }
        session
    }

    /// Drag movement accumulated since the previous call.
    pub fn take_drag_delta(&mut self) -> Vec2 {
        std::mem::take(&mut self.drag_delta)
    }
}

#[cfg(target_arch = "wasm32")]
pub mod wasm {
    use super::*;
    use web_sys::{KeyboardEvent, MouseEvent, TouchEvent};

    pub fn keyboard_event_to_input(e: &KeyboardEvent, is_down: bool) -> InputEvent {
        let key = e.key();
        if is_down {
            InputEvent::KeyDown(key)
        } else {
            InputEvent::KeyUp(key)
        }
    }

    pub fn mouse_down_to_input(e: &MouseEvent) -> InputEvent {
        InputEvent::PointerDown {
            x: e.client_x() as f32,
            y: e.client_y() as f32,
        }
    }

    pub fn mouse_move_to_input(e: &MouseEvent) -> InputEvent {
        InputEvent::PointerMove {
            x: e.client_x() as f32,
            y: e.client_y() as f32,
        }
    }

    fn first_touch(e: &TouchEvent) -> Option<Vec2> {
        e.touches()
            .get(0)
            .map(|touch| Vec2::new(touch.client_x() as f32, touch.client_y() as f32))
    }

    pub fn touch_start_to_input(e: &TouchEvent) -> InputEvent {
        InputEvent::TouchStart { first: first_touch(e) }
    }

    pub fn touch_move_to_input(e: &TouchEvent) -> InputEvent {
        InputEvent::TouchMove { first: first_touch(e) }
    }
}
