use crate::error::{EngineError, EngineResult};
use crate::event::{ButtonState, Event, EventQueue, Key, MouseButton};
use std::collections::VecDeque;
use std::time::Duration;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::ControlFlow::Poll;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key as LogicalKey, NamedKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::raw_window_handle::{
    HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle,
};
use winit::window::{Window, WindowAttributes, WindowId};

// The window is created from within the first `resumed` callback, which desktop
// platforms deliver on the first pump. Give slow compositors a few more rounds.
const CREATE_ATTEMPTS: usize = 16;

#[derive(Clone, Debug)]
pub struct WindowDesc {
    pub name: String,
    pub title: String,
    pub visible: bool,
    pub resizable: bool,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowDesc {
    fn default() -> Self {
        Self {
            name: "The schengine application.".to_owned(),
            title: "Schengine App".to_owned(),
            visible: true,
            resizable: false,
            width: 1280,
            height: 720,
        }
    }
}

/// Platform display and window handles a backend creates its surface from.
#[derive(Copy, Clone, Debug)]
pub struct NativeWindow {
    pub display: RawDisplayHandle,
    pub window: RawWindowHandle,
}

/// The window side of the frame loop: an event source plus the few window
/// operations the loop needs.
pub trait WindowHost {
    /// Moves every event that happened since the last call into `queue`, in order.
    fn update(&mut self, queue: &mut EventQueue);

    fn window_size(&self) -> (u32, u32);

    fn close(&mut self);

    fn native_handle(&self) -> EngineResult<NativeWindow>;
}

pub struct WinitWindow {
    // the window has to go before the event loop it was created on
    handler: WindowHandler,
    event_loop: EventLoop<()>,
}

impl WinitWindow {
    pub fn create(desc: &WindowDesc) -> EngineResult<Self> {
        log::debug!("Creating window '{}' ({}x{})", desc.name, desc.width, desc.height);
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(Poll);

        let mut window = Self {
            handler: WindowHandler::new(desc),
            event_loop,
        };

        for _ in 0..CREATE_ATTEMPTS {
            let status = window
                .event_loop
                .pump_app_events(Some(Duration::ZERO), &mut window.handler);

            if let Some(err) = window.handler.creation_error.take() {
                return Err(EngineError::WindowCreation(err));
            }
            if window.handler.window.is_some() {
                return Ok(window);
            }
            if let PumpStatus::Exit(code) = status {
                return Err(EngineError::WindowCreation(format!(
                    "event loop exited with code {code} before the window was created"
                )));
            }
        }

        Err(EngineError::WindowCreation(
            "the platform never resumed the application".to_owned(),
        ))
    }
}

impl WindowHost for WinitWindow {
    fn update(&mut self, queue: &mut EventQueue) {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.handler);

        if let PumpStatus::Exit(code) = status {
            if !self.handler.closed {
                log::debug!("Event loop exited with code {code}");
                self.handler.pending.push_back(Event::Close);
            }
        }

        queue.extend(self.handler.pending.drain(..));
    }

    fn window_size(&self) -> (u32, u32) {
        self.handler
            .window
            .as_ref()
            .map(|window| window.inner_size().into())
            .unwrap_or((0, 0))
    }

    fn close(&mut self) {
        // The native window stays alive until teardown, the surface still references it.
        if let Some(window) = self.handler.window.as_ref() {
            window.set_visible(false);
        }
        self.handler.closed = true;
    }

    fn native_handle(&self) -> EngineResult<NativeWindow> {
        let window = self
            .handler
            .window
            .as_ref()
            .ok_or_else(|| EngineError::WindowCreation("window does not exist".to_owned()))?;

        Ok(NativeWindow {
            display: window.display_handle()?.as_raw(),
            window: window.window_handle()?.as_raw(),
        })
    }
}

struct WindowHandler {
    attributes: WindowAttributes,
    window: Option<Window>,
    creation_error: Option<String>,
    pending: VecDeque<Event>,
    closed: bool,
}

impl WindowHandler {
    fn new(desc: &WindowDesc) -> Self {
        let attributes = Window::default_attributes()
            .with_title(desc.title.clone())
            .with_inner_size(PhysicalSize::new(desc.width, desc.height))
            .with_resizable(desc.resizable)
            .with_visible(desc.visible);

        Self {
            attributes,
            window: None,
            creation_error: None,
            pending: VecDeque::new(),
            closed: false,
        }
    }
}

impl ApplicationHandler for WindowHandler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        match event_loop.create_window(self.attributes.clone()) {
            Ok(window) => self.window = Some(window),
            Err(err) => self.creation_error = Some(err.to_string()),
        }
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.closed {
            return;
        }

        if let Some(event) = translate(event) {
            log::trace!("{event:?}");
            self.pending.push_back(event);
        }
    }
}

fn translate(event: WindowEvent) -> Option<Event> {
    let event = match event {
        WindowEvent::CloseRequested => Event::Close,
        WindowEvent::Resized(size) => Event::resize(size.width, size.height),
        WindowEvent::ScaleFactorChanged { scale_factor, .. } => Event::Dpi {
            scale: scale_factor,
        },
        WindowEvent::KeyboardInput { event, .. } => Event::Keyboard {
            key: key_from_logical(&event.logical_key),
            state: button_state(event.state),
        },
        WindowEvent::Focused(focused) => Event::Focus(focused),
        WindowEvent::RedrawRequested => Event::Paint,
        WindowEvent::CursorMoved { position, .. } => Event::MouseMove {
            x: position.x,
            y: position.y,
        },
        WindowEvent::MouseInput { state, button, .. } => Event::MouseInput {
            button: match button {
                winit::event::MouseButton::Left => MouseButton::Left,
                winit::event::MouseButton::Right => MouseButton::Right,
                winit::event::MouseButton::Middle => MouseButton::Middle,
                winit::event::MouseButton::Back => MouseButton::Other(3),
                winit::event::MouseButton::Forward => MouseButton::Other(4),
                winit::event::MouseButton::Other(id) => MouseButton::Other(id),
            },
            state: button_state(state),
        },
        WindowEvent::MouseWheel { delta, .. } => Event::MouseWheel {
            delta: match delta {
                MouseScrollDelta::LineDelta(_, lines) => lines,
                MouseScrollDelta::PixelDelta(position) => position.y as f32,
            },
        },
        _ => return None,
    };
    Some(event)
}

fn button_state(state: ElementState) -> ButtonState {
    match state {
        ElementState::Pressed => ButtonState::Pressed,
        ElementState::Released => ButtonState::Released,
    }
}

fn key_from_logical(key: &LogicalKey) -> Key {
    match key {
        LogicalKey::Named(NamedKey::Escape) => Key::Escape,
        LogicalKey::Named(NamedKey::Enter) => Key::Enter,
        LogicalKey::Named(NamedKey::Space) => Key::Space,
        LogicalKey::Named(NamedKey::Tab) => Key::Tab,
        LogicalKey::Named(NamedKey::Backspace) => Key::Backspace,
        LogicalKey::Named(NamedKey::ArrowUp) => Key::ArrowUp,
        LogicalKey::Named(NamedKey::ArrowDown) => Key::ArrowDown,
        LogicalKey::Named(NamedKey::ArrowLeft) => Key::ArrowLeft,
        LogicalKey::Named(NamedKey::ArrowRight) => Key::ArrowRight,
        LogicalKey::Character(text) => text
            .chars()
            .next()
            .map(|c| Key::Char(c.to_ascii_uppercase()))
            .unwrap_or(Key::Unidentified),
        _ => Key::Unidentified,
    }
}
