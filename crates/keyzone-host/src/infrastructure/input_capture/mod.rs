//! Raw input capture for one target window.
//!
//! A [`CaptureBackend`] owns the OS subscription (on Windows: Raw Input
//! registration plus a subclass of the target window procedure) and hands
//! every native message to an [`EventFanout`] as a [`NativeInput`].  The
//! fan-out normalizes those into the two event shapes listeners see:
//!
//! - key/button: `(device, code, is_down)`
//! - axis: `(device, axis, value in [0, 1])`
//!
//! # Threading
//!
//! Delivery happens synchronously on the thread that pumps the target window's
//! messages.  Listener callbacks run inside the window procedure and must not
//! block.
//!
//! # Listener lifetime
//!
//! The fan-out keeps only weak handles.  A listener that is dropped simply
//! stops receiving events; a listener may also remove itself (or any other
//! listener) from inside its own callback.  Dispatch iterates a snapshot of the
//! subscriber list, so removal never corrupts the pass in progress.
//!
//! # Testability
//!
//! [`mock::MockCaptureBackend`] injects synthetic native input without a
//! window or a message loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use keyzone_core::keymap::{KeyCode, SCROLL_DOWN, SCROLL_UP};
use keyzone_core::DeviceId;
use tracing::{debug, info, trace, warn};

pub mod mock;

/// Wheel delta of one detent (`WHEEL_DELTA` on Windows).
pub const WHEEL_DELTA: i32 = 120;

#[cfg(target_os = "windows")]
pub mod windows;

// ── Event shapes ──────────────────────────────────────────────────────────────

/// Opaque native window handle (an `HWND` on Windows).  Zero is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

impl WindowHandle {
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Continuous pointer axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerAxis {
    X,
    Y,
}

/// Input as decoded from a native message, before normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeInput {
    /// Keyboard key or mouse button edge.
    Key {
        device: DeviceId,
        code: KeyCode,
        is_down: bool,
    },
    /// Vertical wheel motion in units of [`WHEEL_DELTA`]; positive is away from the user.
    Wheel { device: DeviceId, delta: i16 },
    /// Cursor position in client-area pixels plus the current client extent.
    Pointer {
        device: DeviceId,
        x: i32,
        y: i32,
        client_width: i32,
        client_height: i32,
    },
}

/// Receiver of normalized input events.
///
/// Callbacks run on the window thread while the OS waits for the message to
/// be handled; implementations must return quickly.
pub trait InputListener: Send + Sync {
    fn on_key(&self, device: DeviceId, code: KeyCode, is_down: bool);

    /// Normalized pointer position; ignored unless overridden.
    fn on_axis(&self, _device: DeviceId, _axis: PointerAxis, _value: f32) {}
}

/// Handle returned by [`EventFanout::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Error type for input capture operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to register raw input devices: {0}")]
    RegistrationFailed(String),
    #[error("failed to hook window procedure: {0}")]
    HookFailed(String),
    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),
}

// ── Fan-out ───────────────────────────────────────────────────────────────────

struct Subscriber {
    id: ListenerId,
    listener: Weak<dyn InputListener>,
}

impl Subscriber {
    fn same_target(&self, other: &Arc<dyn InputListener>) -> bool {
        std::ptr::eq(
            self.listener.as_ptr() as *const (),
            Arc::as_ptr(other) as *const (),
        )
    }
}

/// Ordered set of weak listener handles plus native-input normalization.
#[derive(Default)]
pub struct EventFanout {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl EventFanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener`.  Adding the same listener twice returns the
    /// existing handle instead of registering it again.
    pub fn add_listener(&self, listener: &Arc<dyn InputListener>) -> ListenerId {
        let mut subscribers = self.lock();
        subscribers.retain(|s| s.listener.strong_count() > 0);
        if let Some(existing) = subscribers.iter().find(|s| s.same_target(listener)) {
            return existing.id;
        }
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        subscribers.push(Subscriber {
            id,
            listener: Arc::downgrade(listener),
        });
        debug!(listener = id.0, "input listener added");
        id
    }

    /// Unregisters a listener.  Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        let removed = subscribers.len() != before;
        if removed {
            debug!(listener = id.0, "input listener removed");
        }
        removed
    }

    pub fn is_registered(&self, id: ListenerId) -> bool {
        self.lock().iter().any(|s| s.id == id)
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|s| s.listener.strong_count() > 0)
            .count()
    }

    /// Normalizes one native input and delivers the resulting events.
    pub fn deliver(&self, input: NativeInput) {
        match input {
            NativeInput::Key {
                device,
                code,
                is_down,
            } => self.dispatch_key(device, code, is_down),
            NativeInput::Wheel { device, delta } => {
                let code = match delta {
                    d if d > 0 => SCROLL_UP,
                    d if d < 0 => SCROLL_DOWN,
                    _ => return,
                };
                // One pair per full notch; a partial notch from a smooth wheel still counts once.
                let notches = (i32::from(delta).abs() / WHEEL_DELTA).max(1);
                for _ in 0..notches {
                    // A wheel tick has no hold state: press and release back to back.
                    self.dispatch_key(device, code, true);
                    self.dispatch_key(device, code, false);
                }
            }
            NativeInput::Pointer {
                device,
                x,
                y,
                client_width,
                client_height,
            } => {
                if client_width <= 0 || client_height <= 0 {
                    return;
                }
                let nx = (x as f32 / client_width as f32).clamp(0.0, 1.0);
                let ny = (y as f32 / client_height as f32).clamp(0.0, 1.0);
                self.dispatch_axis(device, PointerAxis::X, nx);
                self.dispatch_axis(device, PointerAxis::Y, ny);
            }
        }
    }

    fn dispatch_key(&self, device: DeviceId, code: KeyCode, is_down: bool) {
        trace!(%device, code, is_down, "key event");
        for (id, listener) in self.snapshot() {
            // Skip listeners removed earlier in this same pass.
            if self.is_registered(id) {
                listener.on_key(device, code, is_down);
            }
        }
    }

    fn dispatch_axis(&self, device: DeviceId, axis: PointerAxis, value: f32) {
        for (id, listener) in self.snapshot() {
            if self.is_registered(id) {
                listener.on_axis(device, axis, value);
            }
        }
    }

    fn snapshot(&self) -> Vec<(ListenerId, Arc<dyn InputListener>)> {
        self.lock()
            .iter()
            .filter_map(|s| s.listener.upgrade().map(|l| (s.id, l)))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Backend + owner ───────────────────────────────────────────────────────────

/// OS-specific subscription to raw keyboard and mouse input.
pub trait CaptureBackend: Send {
    /// Subscribes to raw input for `window` and starts feeding `sink`.
    fn attach(&mut self, window: WindowHandle, sink: Arc<EventFanout>) -> Result<(), CaptureError>;

    /// Restores the window's previous message handling and unsubscribes.
    fn detach(&mut self);
}

/// Capture context for exactly one target window.
///
/// Owned by whatever controls the window; there is no process-wide instance.
pub struct InputCapture {
    backend: Box<dyn CaptureBackend>,
    fanout: Arc<EventFanout>,
    window: Option<WindowHandle>,
}

impl InputCapture {
    pub fn new(backend: Box<dyn CaptureBackend>) -> Self {
        Self::with_fanout(backend, Arc::new(EventFanout::new()))
    }

    /// Uses an existing fan-out, so listeners can be registered before the
    /// capture context exists (e.g. on another thread).
    pub fn with_fanout(backend: Box<dyn CaptureBackend>, fanout: Arc<EventFanout>) -> Self {
        Self {
            backend,
            fanout,
            window: None,
        }
    }

    /// Starts capturing for `window`.
    ///
    /// A null handle, or a second call while initialized, is a no-op.  On
    /// failure capture stays disabled and the caller may retry later.
    ///
    /// # Errors
    ///
    /// Returns the backend's [`CaptureError`] when the OS refuses the
    /// subscription.
    pub fn initialize(&mut self, window: WindowHandle) -> Result<(), CaptureError> {
        if self.window.is_some() {
            return Ok(());
        }
        if window.is_null() {
            debug!("capture initialize skipped: no window handle yet");
            return Ok(());
        }
        match self.backend.attach(window, Arc::clone(&self.fanout)) {
            Ok(()) => {
                info!(window = window.0, "raw input capture initialized");
                self.window = Some(window);
                Ok(())
            }
            Err(e) => {
                warn!("raw input capture disabled: {e}");
                Err(e)
            }
        }
    }

    /// Stops capturing.  Safe to call when not initialized.
    pub fn shutdown(&mut self) {
        if let Some(window) = self.window.take() {
            self.backend.detach();
            info!(window = window.0, "raw input capture shut down");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.window.is_some()
    }

    pub fn add_listener(&self, listener: &Arc<dyn InputListener>) -> ListenerId {
        self.fanout.add_listener(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.fanout.remove_listener(id)
    }

    /// Shared fan-out, for listeners that need to detach themselves.
    pub fn fanout(&self) -> Arc<EventFanout> {
        Arc::clone(&self.fanout)
    }
}

impl Drop for InputCapture {
    fn drop(&mut self) {
        self.shutdown();
    }
}
