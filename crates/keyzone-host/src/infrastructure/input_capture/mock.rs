//! Mock capture backend for unit and integration testing.
//!
//! Allows tests to inject synthetic [`NativeInput`]s without a native window
//! or a running message loop.  Clones share state, so a test can keep one
//! handle while the other is boxed into an [`InputCapture`](super::InputCapture).

use std::sync::{Arc, Mutex, PoisonError};

use super::{CaptureBackend, CaptureError, EventFanout, NativeInput, WindowHandle};

#[derive(Default)]
struct MockState {
    sink: Option<Arc<EventFanout>>,
    window: Option<WindowHandle>,
    attach_calls: u32,
    detach_calls: u32,
    fail_next_attach: bool,
}

/// A mock implementation of [`CaptureBackend`] that allows tests to inject input.
#[derive(Clone, Default)]
pub struct MockCaptureBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockCaptureBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `attach` fail, as if the OS refused the subscription.
    pub fn fail_next_attach(&self) {
        self.lock().fail_next_attach = true;
    }

    /// Injects native input, as if decoded from a window message.
    ///
    /// Returns `false` (and delivers nothing) while detached.
    pub fn inject(&self, input: NativeInput) -> bool {
        // Clone the sink out so listeners run without the mock lock held.
        let sink = self.lock().sink.clone();
        match sink {
            Some(sink) => {
                sink.deliver(input);
                true
            }
            None => false,
        }
    }

    pub fn attached_window(&self) -> Option<WindowHandle> {
        self.lock().window
    }

    pub fn attach_calls(&self) -> u32 {
        self.lock().attach_calls
    }

    pub fn detach_calls(&self) -> u32 {
        self.lock().detach_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CaptureBackend for MockCaptureBackend {
    fn attach(&mut self, window: WindowHandle, sink: Arc<EventFanout>) -> Result<(), CaptureError> {
        let mut state = self.lock();
        state.attach_calls += 1;
        if std::mem::take(&mut state.fail_next_attach) {
            return Err(CaptureError::RegistrationFailed(
                "injected registration failure".to_string(),
            ));
        }
        state.sink = Some(sink);
        state.window = Some(window);
        Ok(())
    }

    fn detach(&mut self) {
        let mut state = self.lock();
        state.detach_calls += 1;
        state.sink = None;
        state.window = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::input_capture::{InputCapture, InputListener};
    use keyzone_core::{DeviceId, KeyCode};

    #[derive(Default)]
    struct Counter(Mutex<Vec<KeyCode>>);

    impl InputListener for Counter {
        fn on_key(&self, _device: DeviceId, code: KeyCode, _is_down: bool) {
            self.0.lock().unwrap().push(code);
        }
    }

    fn key(code: KeyCode) -> NativeInput {
        NativeInput::Key {
            device: DeviceId(1),
            code,
            is_down: true,
        }
    }

    #[test]
    fn test_initialize_attaches_once() {
        // Arrange
        let backend = MockCaptureBackend::new();
        let mut capture = InputCapture::new(Box::new(backend.clone()));

        // Act
        capture.initialize(WindowHandle(42)).unwrap();
        capture.initialize(WindowHandle(43)).unwrap();

        // Assert
        assert!(capture.is_initialized());
        assert_eq!(backend.attach_calls(), 1);
        assert_eq!(backend.attached_window(), Some(WindowHandle(42)));
    }

    #[test]
    fn test_initialize_with_null_handle_is_noop() {
        let backend = MockCaptureBackend::new();
        let mut capture = InputCapture::new(Box::new(backend.clone()));

        capture.initialize(WindowHandle(0)).unwrap();

        assert!(!capture.is_initialized());
        assert_eq!(backend.attach_calls(), 0);
    }

    #[test]
    fn test_failed_registration_leaves_capture_disabled_and_retryable() {
        // Arrange
        let backend = MockCaptureBackend::new();
        backend.fail_next_attach();
        let mut capture = InputCapture::new(Box::new(backend.clone()));

        // Act
        let first = capture.initialize(WindowHandle(42));
        let second = capture.initialize(WindowHandle(42));

        // Assert
        assert!(matches!(first, Err(CaptureError::RegistrationFailed(_))));
        assert!(second.is_ok());
        assert!(capture.is_initialized());
    }

    #[test]
    fn test_shutdown_when_not_initialized_is_noop() {
        let backend = MockCaptureBackend::new();
        let mut capture = InputCapture::new(Box::new(backend.clone()));

        capture.shutdown();

        assert_eq!(backend.detach_calls(), 0);
    }

    #[test]
    fn test_drop_detaches() {
        let backend = MockCaptureBackend::new();
        {
            let mut capture = InputCapture::new(Box::new(backend.clone()));
            capture.initialize(WindowHandle(42)).unwrap();
        }
        assert_eq!(backend.detach_calls(), 1);
        assert!(!backend.inject(key(0x41)));
    }

    #[test]
    fn test_injected_input_reaches_listeners_only_while_attached() {
        // Arrange
        let backend = MockCaptureBackend::new();
        let mut capture = InputCapture::new(Box::new(backend.clone()));
        let counter = Arc::new(Counter::default());
        capture.add_listener(&(Arc::clone(&counter) as Arc<dyn InputListener>));

        // Act
        let before = backend.inject(key(1));
        capture.initialize(WindowHandle(42)).unwrap();
        let during = backend.inject(key(2));
        capture.shutdown();
        let after = backend.inject(key(3));

        // Assert
        assert_eq!((before, during, after), (false, true, false));
        assert_eq!(*counter.0.lock().unwrap(), vec![2]);
    }
}
