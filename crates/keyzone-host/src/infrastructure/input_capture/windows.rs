//! Windows Raw Input capture backend.
//!
//! [`RawInputBackend`] registers the generic-desktop keyboard and mouse usages
//! with `RIDEV_INPUTSINK` (input arrives even when the target window is not
//! focused) and subclasses the target window with `SetWindowSubclass`, so the
//! `WM_INPUT` messages are decoded before the window's own procedure sees them.
//!
//! The fan-out pointer travels through the subclass reference data rather than
//! a global, so several capture contexts could coexist in one process.
//!
//! [`HostWindow`] provides a hidden window plus message loop on a dedicated
//! thread for headless use.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use std::ffi::c_void;
use std::mem::size_of;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use keyzone_core::DeviceId;
use tracing::{debug, info, warn};
use windows::core::w;
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, POINT, RECT, WPARAM};
use windows::Win32::Graphics::Gdi::ScreenToClient;
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::{
    GetRawInputData, RegisterRawInputDevices, HRAWINPUT, RAWINPUT, RAWINPUTDEVICE, RAWINPUTHEADER,
    RIDEV_INPUTSINK, RIDEV_REMOVE, RID_INPUT, RIM_TYPEKEYBOARD, RIM_TYPEMOUSE,
};
use windows::Win32::UI::Shell::{DefSubclassProc, RemoveWindowSubclass, SetWindowSubclass};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetClientRect, GetCursorPos,
    GetMessageW, GetSystemMetrics, PostThreadMessageW, RegisterClassW, TranslateMessage, MSG,
    SM_CXSCREEN, SM_CYSCREEN, WINDOW_EX_STYLE, WM_INPUT, WM_QUIT, WNDCLASSW, WS_POPUP,
};

use super::{CaptureBackend, CaptureError, EventFanout, InputCapture, NativeInput, WindowHandle};

const USAGE_PAGE_GENERIC_DESKTOP: u16 = 0x01;
const USAGE_MOUSE: u16 = 0x02;
const USAGE_KEYBOARD: u16 = 0x06;

/// Identifies our subclass on the target window.
const SUBCLASS_ID: usize = 0x4B5A;

// RAWKEYBOARD / RAWMOUSE flag bits, kept local as `u16` to match the struct fields.
const RI_KEY_BREAK: u16 = 0x0001;
const RI_MOUSE_WHEEL: u16 = 0x0400;
const MOUSE_BUTTONS: [(u16, u16, u16); 5] = [
    // (down flag, up flag, VK code)
    (0x0001, 0x0002, 0x01), // left
    (0x0004, 0x0008, 0x02), // right
    (0x0010, 0x0020, 0x04), // middle
    (0x0040, 0x0080, 0x05), // X1
    (0x0100, 0x0200, 0x06), // X2
];

/// VKey value Windows uses for fake keys that are part of an escaped sequence.
const VK_FAKE: u16 = 0xFF;

/// Raw Input backend for one target window.
#[derive(Default)]
pub struct RawInputBackend {
    /// `(hwnd, Arc<EventFanout> raw pointer)` while attached.
    attached: Option<(isize, usize)>,
}

impl RawInputBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaptureBackend for RawInputBackend {
    fn attach(&mut self, window: WindowHandle, sink: Arc<EventFanout>) -> Result<(), CaptureError> {
        let hwnd = HWND(window.0 as *mut c_void);

        register_devices(hwnd).map_err(CaptureError::RegistrationFailed)?;

        let ref_data = Arc::into_raw(sink) as usize;
        // SAFETY: `hwnd` belongs to the calling thread (the caller pumps its
        // messages).  `ref_data` stays valid until `detach` reclaims it.
        let hooked = unsafe { SetWindowSubclass(hwnd, Some(subclass_proc), SUBCLASS_ID, ref_data) };
        if !hooked.as_bool() {
            // SAFETY: reclaims the strong count leaked just above; the subclass was not installed.
            unsafe { drop(Arc::from_raw(ref_data as *const EventFanout)) };
            unregister_devices();
            return Err(CaptureError::HookFailed(format!(
                "SetWindowSubclass refused window {:#x}",
                window.0
            )));
        }

        self.attached = Some((window.0, ref_data));
        Ok(())
    }

    fn detach(&mut self) {
        let Some((raw_hwnd, ref_data)) = self.attached.take() else {
            return;
        };
        let hwnd = HWND(raw_hwnd as *mut c_void);
        // SAFETY: same window and subclass id as installed in `attach`.
        let removed = unsafe { RemoveWindowSubclass(hwnd, Some(subclass_proc), SUBCLASS_ID) };
        if !removed.as_bool() {
            warn!(window = raw_hwnd, "RemoveWindowSubclass failed; window may already be destroyed");
        }
        unregister_devices();
        // SAFETY: the subclass is gone, so no further callback can observe `ref_data`.
        unsafe { drop(Arc::from_raw(ref_data as *const EventFanout)) };
    }
}

impl Drop for RawInputBackend {
    fn drop(&mut self) {
        self.detach();
    }
}

fn register_devices(hwnd: HWND) -> Result<(), String> {
    let devices = [
        RAWINPUTDEVICE {
            usUsagePage: USAGE_PAGE_GENERIC_DESKTOP,
            usUsage: USAGE_KEYBOARD,
            dwFlags: RIDEV_INPUTSINK,
            hwndTarget: hwnd,
        },
        RAWINPUTDEVICE {
            usUsagePage: USAGE_PAGE_GENERIC_DESKTOP,
            usUsage: USAGE_MOUSE,
            dwFlags: RIDEV_INPUTSINK,
            hwndTarget: hwnd,
        },
    ];
    // SAFETY: `devices` is a valid, correctly sized array for the duration of the call.
    unsafe { RegisterRawInputDevices(&devices, size_of::<RAWINPUTDEVICE>() as u32) }
        .map_err(|e| e.to_string())
}

fn unregister_devices() {
    let devices = [USAGE_KEYBOARD, USAGE_MOUSE].map(|usage| RAWINPUTDEVICE {
        usUsagePage: USAGE_PAGE_GENERIC_DESKTOP,
        usUsage: usage,
        dwFlags: RIDEV_REMOVE,
        hwndTarget: HWND::default(),
    });
    // SAFETY: as in `register_devices`; RIDEV_REMOVE requires a null target.
    if let Err(e) = unsafe { RegisterRawInputDevices(&devices, size_of::<RAWINPUTDEVICE>() as u32) } {
        debug!("raw input unregister failed: {e}");
    }
}

/// Subclass procedure installed on the target window.
///
/// # Safety
///
/// Called by Windows on the window's thread.  `ref_data` is the
/// `Arc<EventFanout>` pointer leaked in [`RawInputBackend::attach`].
unsafe extern "system" fn subclass_proc(
    hwnd: HWND,
    msg: u32,
    w_param: WPARAM,
    l_param: LPARAM,
    _subclass_id: usize,
    ref_data: usize,
) -> LRESULT {
    if msg == WM_INPUT && ref_data != 0 {
        // SAFETY: see the function-level contract.
        let sink = &*(ref_data as *const EventFanout);
        for input in read_raw_input(hwnd, HRAWINPUT(l_param.0 as _)) {
            sink.deliver(input);
        }
    }
    // SAFETY: forwards to the previous window procedure in the chain.
    DefSubclassProc(hwnd, msg, w_param, l_param)
}

/// Decodes one `WM_INPUT` payload into zero or more native inputs.
///
/// # Safety
///
/// `handle` must be the `lParam` of a `WM_INPUT` message being processed.
unsafe fn read_raw_input(hwnd: HWND, handle: HRAWINPUT) -> Vec<NativeInput> {
    let header_size = size_of::<RAWINPUTHEADER>() as u32;
    let mut size = 0u32;
    GetRawInputData(handle, RID_INPUT, None, &mut size, header_size);
    if size == 0 {
        return Vec::new();
    }

    // u64 storage keeps the RAWINPUT view 8-byte aligned.
    let mut buffer = vec![0u64; (size as usize).div_ceil(8)];
    let copied = GetRawInputData(
        handle,
        RID_INPUT,
        Some(buffer.as_mut_ptr() as *mut c_void),
        &mut size,
        header_size,
    );
    if copied != size {
        return Vec::new();
    }

    let raw = &*(buffer.as_ptr() as *const RAWINPUT);
    let device = DeviceId(raw.header.hDevice.0 as usize as u64);
    let mut out = Vec::new();

    if raw.header.dwType == RIM_TYPEKEYBOARD.0 {
        let keyboard = &raw.data.keyboard;
        if keyboard.VKey != VK_FAKE {
            out.push(NativeInput::Key {
                device,
                code: keyboard.VKey,
                is_down: keyboard.Flags & RI_KEY_BREAK == 0,
            });
        }
    } else if raw.header.dwType == RIM_TYPEMOUSE.0 {
        let mouse = &raw.data.mouse;
        let flags = mouse.Anonymous.Anonymous.usButtonFlags;
        let data = mouse.Anonymous.Anonymous.usButtonData;

        for (down, up, vk) in MOUSE_BUTTONS {
            if flags & down != 0 {
                out.push(NativeInput::Key { device, code: vk, is_down: true });
            }
            if flags & up != 0 {
                out.push(NativeInput::Key { device, code: vk, is_down: false });
            }
        }
        if flags & RI_MOUSE_WHEEL != 0 {
            out.push(NativeInput::Wheel { device, delta: data as i16 });
        }
        if mouse.lLastX != 0 || mouse.lLastY != 0 {
            if let Some(pointer) = pointer_in_client(hwnd, device) {
                out.push(pointer);
            }
        }
    }

    out
}

/// Current cursor position relative to `hwnd`'s client area.
fn pointer_in_client(hwnd: HWND, device: DeviceId) -> Option<NativeInput> {
    let mut point = POINT::default();
    let mut rect = RECT::default();
    // SAFETY: out-pointers are valid locals; `hwnd` is the window being serviced.
    unsafe {
        GetCursorPos(&mut point).ok()?;
        if !ScreenToClient(hwnd, &mut point).as_bool() {
            return None;
        }
        GetClientRect(hwnd, &mut rect).ok()?;
    }
    Some(NativeInput::Pointer {
        device,
        x: point.x,
        y: point.y,
        client_width: rect.right - rect.left,
        client_height: rect.bottom - rect.top,
    })
}

// ── Headless host window ──────────────────────────────────────────────────────

/// Hidden popup window covering the primary screen, pumped on its own thread.
///
/// The window is never shown; its client area gives pointer axes a screen-sized
/// reference rectangle.
pub struct HostWindow {
    thread_id: u32,
    join: Option<JoinHandle<()>>,
}

impl HostWindow {
    /// Creates the window, initializes capture against it and starts pumping.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::HookFailed`] if the window or its thread cannot
    /// be created.  Capture registration failures are logged by
    /// [`InputCapture::initialize`] and leave the window running uncaptured.
    pub fn spawn(fanout: Arc<EventFanout>) -> Result<Self, CaptureError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, String>>();

        let join = thread::Builder::new()
            .name("keyzone-input".to_string())
            .spawn(move || run_host_window(fanout, ready_tx))
            .map_err(|e| CaptureError::HookFailed(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => Ok(Self {
                thread_id,
                join: Some(join),
            }),
            Ok(Err(e)) => Err(CaptureError::HookFailed(e)),
            Err(_) => Err(CaptureError::HookFailed("input thread exited early".to_string())),
        }
    }

    /// Posts `WM_QUIT` and waits for the input thread to shut capture down.
    pub fn stop(mut self) {
        self.stop_inner();
    }

    fn stop_inner(&mut self) {
        let Some(join) = self.join.take() else {
            return;
        };
        // SAFETY: plain message post to a thread id obtained from that thread.
        if let Err(e) = unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
            warn!("failed to post WM_QUIT to input thread: {e}");
            return;
        }
        if join.join().is_err() {
            warn!("input thread panicked");
        }
    }
}

impl Drop for HostWindow {
    fn drop(&mut self) {
        self.stop_inner();
    }
}

fn run_host_window(fanout: Arc<EventFanout>, ready: mpsc::Sender<Result<u32, String>>) {
    // SAFETY: standard Win32 window creation and message loop on this thread.
    unsafe {
        let hwnd = match create_host_window() {
            Ok(hwnd) => hwnd,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };

        let mut capture = InputCapture::with_fanout(Box::new(RawInputBackend::new()), fanout);
        // Failure is already logged; the loop still runs so `stop` works.
        let _ = capture.initialize(WindowHandle(hwnd.0 as isize));

        let _ = ready.send(Ok(GetCurrentThreadId()));
        info!("input thread running");

        let mut msg = MSG::default();
        while GetMessageW(&mut msg, None, 0, 0).0 > 0 {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }

        capture.shutdown();
        let _ = DestroyWindow(hwnd);
        info!("input thread stopped");
    }
}

/// # Safety
///
/// Must be called on the thread that will pump the window's messages.
unsafe fn create_host_window() -> Result<HWND, String> {
    let class_name = w!("KeyZoneCaptureHost");
    let module = GetModuleHandleW(None).map_err(|e| e.to_string())?;
    let instance = HINSTANCE(module.0);

    let wc = WNDCLASSW {
        lpfnWndProc: Some(host_window_proc),
        hInstance: instance,
        lpszClassName: class_name,
        ..Default::default()
    };
    // A zero atom usually means the class already exists; CreateWindowExW reports real failures.
    if RegisterClassW(&wc) == 0 {
        debug!("host window class already registered");
    }

    CreateWindowExW(
        WINDOW_EX_STYLE(0),
        class_name,
        w!("KeyZone"),
        WS_POPUP,
        0,
        0,
        GetSystemMetrics(SM_CXSCREEN),
        GetSystemMetrics(SM_CYSCREEN),
        None,
        None,
        Some(instance),
        None,
    )
    .map_err(|e| format!("failed to create host window: {e}"))
}

unsafe extern "system" fn host_window_proc(
    hwnd: HWND,
    msg: u32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    DefWindowProcW(hwnd, msg, w_param, l_param)
}
