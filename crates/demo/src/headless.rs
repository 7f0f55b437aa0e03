use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;
use hearth_input::{Key, KeyboardState, MouseState};
use hearth_kernel::{DisplayError, DisplaySurface};
use hearth_render::{GpuDevice, HeadlessDevice};

use crate::GpuSurface;

/// Where a [`HeadlessSurface`] leaves its device when it is destroyed, so
/// the recorded commands can be inspected after the engine consumed the
/// surface.
pub type RetainedDevice = Rc<RefCell<Option<HeadlessDevice>>>;

/// A windowless display backed by a [`HeadlessDevice`].
///
/// Input is scripted through [`keyboard_mut`](Self::keyboard_mut) and
/// [`mouse_mut`](Self::mouse_mut); the surface closes itself after a fixed
/// number of presented frames when [`close_after`](Self::close_after) is set.
pub struct HeadlessSurface {
    device: HeadlessDevice,
    size: (u32, u32),
    resized: bool,
    frames_left: Option<u64>,
    presented: u64,
    initialized: bool,
    closed: bool,
    keyboard: KeyboardState,
    mouse: MouseState,
    retained: RetainedDevice,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            device: HeadlessDevice::new(),
            size: (width, height),
            resized: false,
            frames_left: None,
            presented: 0,
            initialized: false,
            closed: false,
            keyboard: KeyboardState::new(),
            mouse: MouseState::new(),
            retained: Rc::new(RefCell::new(None)),
        }
    }

    /// Request close once `frames` frames have been presented.
    pub fn close_after(mut self, frames: u64) -> Self {
        self.frames_left = Some(frames);
        if frames == 0 {
            self.closed = true;
        }
        self
    }

    /// Handle that receives the device on [`DisplaySurface::destroy`].
    pub fn retained(&self) -> RetainedDevice {
        Rc::clone(&self.retained)
    }

    pub fn device(&self) -> &HeadlessDevice {
        &self.device
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.resized = true;
    }

    pub fn press(&mut self, key: Key) {
        self.keyboard.set(key, true);
    }

    pub fn keyboard_mut(&mut self) -> &mut KeyboardState {
        &mut self.keyboard
    }

    pub fn mouse_mut(&mut self) -> &mut MouseState {
        &mut self.mouse
    }
}

impl DisplaySurface for HeadlessSurface {
    fn init(&mut self) -> Result<(), DisplayError> {
        if self.size.0 == 0 || self.size.1 == 0 {
            return Err(DisplayError::Creation(format!(
                "headless surface of {}x{}",
                self.size.0, self.size.1
            )));
        }
        self.initialized = true;
        tracing::info!(width = self.size.0, height = self.size.1, "headless surface ready");
        Ok(())
    }

    fn destroy(&mut self) {
        self.initialized = false;
        let device = std::mem::take(&mut self.device);
        tracing::debug!(
            frames = device.frames(),
            live_handles = device.live_handles(),
            "headless surface destroyed"
        );
        *self.retained.borrow_mut() = Some(device);
    }

    fn should_close(&self) -> bool {
        self.closed
    }

    fn request_close(&mut self) {
        self.closed = true;
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn take_resized(&mut self) -> bool {
        std::mem::replace(&mut self.resized, false)
    }

    fn swap_buffers(&mut self) {
        self.presented += 1;
        if let Some(left) = self.frames_left.as_mut() {
            *left = left.saturating_sub(1);
            if *left == 0 {
                self.closed = true;
            }
        }
    }

    fn poll_events(&mut self) {}

    fn keyboard(&self) -> &KeyboardState {
        &self.keyboard
    }

    fn mouse(&self) -> &MouseState {
        &self.mouse
    }

    fn take_mouse_displacement(&mut self) -> Vec2 {
        self.mouse.take_displacement()
    }
}

impl GpuSurface for HeadlessSurface {
    fn gpu(&mut self) -> Option<&mut dyn GpuDevice> {
        if self.initialized {
            Some(&mut self.device)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closes_after_the_requested_frames() {
        let mut surface = HeadlessSurface::new(64, 64).close_after(2);
        surface.init().unwrap();
        surface.swap_buffers();
        assert!(!surface.should_close());
        surface.swap_buffers();
        assert!(surface.should_close());
        assert_eq!(surface.presented(), 2);
    }

    #[test]
    fn device_is_only_available_while_initialized() {
        let mut surface = HeadlessSurface::new(64, 64);
        assert!(surface.gpu().is_none());
        surface.init().unwrap();
        assert!(surface.gpu().is_some());
        surface.destroy();
        assert!(surface.gpu().is_none());
    }

    #[test]
    fn destroy_hands_the_device_over() {
        let mut surface = HeadlessSurface::new(64, 64);
        let retained = surface.retained();
        surface.init().unwrap();
        surface.gpu().unwrap().set_viewport(64, 64);
        surface.destroy();
        let device = retained.borrow_mut().take().unwrap();
        assert_eq!(device.viewport(), (64, 64));
    }

    #[test]
    fn zero_size_fails_to_initialize() {
        let mut surface = HeadlessSurface::new(0, 480);
        assert!(matches!(surface.init(), Err(DisplayError::Creation(_))));
    }

    #[test]
    fn resize_is_reported_once() {
        let mut surface = HeadlessSurface::new(64, 64);
        surface.resize(128, 32);
        assert!(surface.take_resized());
        assert!(!surface.take_resized());
        assert_eq!(surface.size(), (128, 32));
    }
}
