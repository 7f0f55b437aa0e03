use std::sync::Arc;
use std::time::Duration;

use glam::Vec2;
use hearth_demo::GpuSurface;
use hearth_input::{Key, KeyboardState, MouseState};
use hearth_kernel::{DisplayError, DisplaySurface, EngineConfig};
use hearth_render::GpuDevice;
use hearth_render_wgpu::WgpuDevice;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

/// How long `init` waits per pump for the platform to resume the app.
const RESUME_WAIT: Duration = Duration::from_millis(10);

/// A winit window presenting through a [`WgpuDevice`].
///
/// The event loop is pumped from the game loop instead of owning the thread,
/// so the engine keeps control of frame pacing.
pub struct WinitDisplay {
    event_loop: Option<EventLoop<()>>,
    state: WindowState,
}

impl WinitDisplay {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            event_loop: None,
            state: WindowState {
                title: config.title.clone(),
                size: (config.width, config.height),
                vsync: config.vsync,
                window: None,
                device: None,
                error: None,
                resized: false,
                close: false,
                keyboard: KeyboardState::new(),
                mouse: MouseState::new(),
            },
        }
    }
}

struct WindowState {
    title: String,
    size: (u32, u32),
    vsync: bool,
    window: Option<Arc<Window>>,
    device: Option<WgpuDevice>,
    error: Option<DisplayError>,
    resized: bool,
    close: bool,
    keyboard: KeyboardState,
    mouse: MouseState,
}

impl WindowState {
    fn open(&mut self, event_loop: &ActiveEventLoop) -> Result<(), DisplayError> {
        let attrs = Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(PhysicalSize::new(self.size.0, self.size.1));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .map_err(|e| DisplayError::Creation(e.to_string()))?,
        );

        let size = window.inner_size();
        self.size = (size.width, size.height);
        let device = WgpuDevice::new(Arc::clone(&window), size.width, size.height, self.vsync)
            .map_err(|e| DisplayError::Backend(e.to_string()))?;

        tracing::info!(
            width = size.width,
            height = size.height,
            vsync = self.vsync,
            "window opened"
        );
        self.device = Some(device);
        self.window = Some(window);
        Ok(())
    }

    fn key(&mut self, code: KeyCode, pressed: bool) {
        let Some(key) = map_key(code) else {
            return;
        };
        self.keyboard.set(key, pressed);
        if key == Key::Escape && !pressed {
            self.close = true;
        }
    }
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.open(event_loop) {
            self.error = Some(err);
        }
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                self.close = true;
            }
            WindowEvent::Resized(new_size) => {
                self.size = (new_size.width, new_size.height);
                self.resized = true;
            }
            WindowEvent::Focused(false) => {
                self.keyboard.clear();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => {
                self.key(code, state == ElementState::Pressed);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse
                    .cursor_moved(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::CursorEntered { .. } => {
                self.mouse.set_in_surface(true);
            }
            WindowEvent::CursorLeft { .. } => {
                self.mouse.set_in_surface(false);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Right,
                ..
            } => {
                self.mouse.right_pressed = state == ElementState::Pressed;
            }
            _ => {}
        }
    }
}

fn map_key(code: KeyCode) -> Option<Key> {
    Some(match code {
        KeyCode::KeyW => Key::W,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyD => Key::D,
        KeyCode::KeyN => Key::N,
        KeyCode::KeyM => Key::M,
        KeyCode::Space => Key::Space,
        KeyCode::Tab => Key::Tab,
        KeyCode::Escape => Key::Escape,
        _ => return None,
    })
}

impl DisplaySurface for WinitDisplay {
    fn init(&mut self) -> Result<(), DisplayError> {
        let event_loop = EventLoop::new().map_err(|e| DisplayError::Creation(e.to_string()))?;
        event_loop.set_control_flow(ControlFlow::Poll);
        let event_loop = self.event_loop.insert(event_loop);

        while self.state.window.is_none() {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(RESUME_WAIT), &mut self.state)
            {
                return Err(DisplayError::Creation(format!(
                    "event loop exited with code {code} before a window opened"
                )));
            }
            if let Some(err) = self.state.error.take() {
                return Err(err);
            }
        }
        Ok(())
    }

    fn destroy(&mut self) {
        // The device holds a surface on the window, so it goes first.
        self.state.device = None;
        self.state.window = None;
        tracing::debug!("window closed");
    }

    fn should_close(&self) -> bool {
        self.state.close
    }

    fn request_close(&mut self) {
        self.state.close = true;
    }

    fn size(&self) -> (u32, u32) {
        self.state.size
    }

    fn take_resized(&mut self) -> bool {
        std::mem::replace(&mut self.state.resized, false)
    }

    fn swap_buffers(&mut self) {
        // The device presents when the frame is finished.
    }

    fn poll_events(&mut self) {
        let Some(event_loop) = self.event_loop.as_mut() else {
            return;
        };
        if let PumpStatus::Exit(code) = event_loop.pump_app_events(Some(Duration::ZERO), &mut self.state)
        {
            tracing::debug!(code, "event loop exited");
            self.state.close = true;
        }
        if let Some(err) = self.state.error.take() {
            tracing::error!(error = %err, "display error");
            self.state.close = true;
        }
    }

    fn keyboard(&self) -> &KeyboardState {
        &self.state.keyboard
    }

    fn mouse(&self) -> &MouseState {
        &self.state.mouse
    }

    fn take_mouse_displacement(&mut self) -> Vec2 {
        self.state.mouse.take_displacement()
    }
}

impl GpuSurface for WinitDisplay {
    fn gpu(&mut self) -> Option<&mut dyn GpuDevice> {
        self.state
            .device
            .as_mut()
            .map(|device| device as &mut dyn GpuDevice)
    }
}
