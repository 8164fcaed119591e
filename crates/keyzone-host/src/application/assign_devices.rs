//! DeviceAssignmentSession: the "press a key on each device" setup wizard.
//!
//! Device ids change whenever a device is reconnected, so at the start of a
//! session the user walks through their aliases once: the wizard shows
//! "press any key on *Left Pad*", the next key-down binds the device it came
//! from to that alias, and the wizard moves on to the next alias.
//!
//! # Lifecycle (for beginners)
//!
//! ```text
//! start() ──► registered on the capture fan-out
//!    │
//!    ├── key-down on device D ──► bind D to targets[i], publish Advanced, i += 1
//!    │
//!    └── last target bound ──► removes itself from the fan-out, publish Completed
//! ```
//!
//! The session removes itself from inside its own callback.  The fan-out
//! iterates a snapshot, so other listeners in the same dispatch still see the
//! event exactly once.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use keyzone_core::{is_wildcard_name, DeviceId, KeyCode};
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::manage_aliases::DeviceAliasRegistry;
use crate::infrastructure::input_capture::{EventFanout, InputListener, ListenerId};

const EVENT_CAPACITY: usize = 16;

/// Progress notifications for the wizard UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentProgress {
    /// `alias` was bound to `device`; `next` is the alias now waiting, if any.
    Advanced {
        alias: String,
        device: DeviceId,
        next: Option<String>,
    },
    Completed,
    Cancelled,
}

struct SessionState {
    targets: Vec<String>,
    position: usize,
    listener: Option<ListenerId>,
}

/// A transient input listener that binds devices to aliases in order.
pub struct DeviceAssignmentSession {
    registry: Arc<RwLock<DeviceAliasRegistry>>,
    fanout: Arc<EventFanout>,
    state: Mutex<SessionState>,
    events: broadcast::Sender<AssignmentProgress>,
}

impl DeviceAssignmentSession {
    /// Starts a session over `targets` and registers it on `fanout`.
    ///
    /// Wildcard names are skipped.  With nothing left to assign the session is
    /// complete immediately and never registers.  The caller must keep the
    /// returned `Arc` alive; the fan-out only holds a weak handle.
    pub fn start(
        targets: Vec<String>,
        registry: Arc<RwLock<DeviceAliasRegistry>>,
        fanout: &Arc<EventFanout>,
    ) -> Arc<Self> {
        let targets: Vec<String> = targets
            .into_iter()
            .filter(|name| !is_wildcard_name(name))
            .collect();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let session = Arc::new(Self {
            registry,
            fanout: Arc::clone(fanout),
            state: Mutex::new(SessionState {
                targets,
                position: 0,
                listener: None,
            }),
            events,
        });

        if session.lock().targets.is_empty() {
            return session;
        }
        let listener: Arc<dyn InputListener> = Arc::clone(&session) as Arc<dyn InputListener>;
        let id = fanout.add_listener(&listener);
        session.lock().listener = Some(id);
        info!(targets = ?session.lock().targets, "device assignment started");
        session
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AssignmentProgress> {
        self.events.subscribe()
    }

    /// Alias waiting for a key press, or `None` once finished.
    pub fn current_target(&self) -> Option<String> {
        let state = self.lock();
        state.targets.get(state.position).cloned()
    }

    pub fn is_complete(&self) -> bool {
        let state = self.lock();
        state.position >= state.targets.len()
    }

    /// Stops the session early.  Bindings made so far are kept.
    pub fn cancel(&self) {
        let listener = {
            let mut state = self.lock();
            if state.position >= state.targets.len() {
                return;
            }
            state.position = state.targets.len();
            state.listener.take()
        };
        if let Some(id) = listener {
            self.fanout.remove_listener(id);
        }
        info!("device assignment cancelled");
        let _ = self.events.send(AssignmentProgress::Cancelled);
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InputListener for DeviceAssignmentSession {
    fn on_key(&self, device: DeviceId, _code: KeyCode, is_down: bool) {
        if !is_down {
            return;
        }

        let (alias, next, finished) = {
            let mut state = self.lock();
            let Some(alias) = state.targets.get(state.position).cloned() else {
                return;
            };
            state.position += 1;
            let next = state.targets.get(state.position).cloned();
            let finished = if next.is_none() {
                state.listener.take()
            } else {
                None
            };
            (alias, next, finished)
        };

        let assigned = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .assign_hardware(&alias, device);
        if let Err(e) = assigned {
            warn!("device assignment skipped: {e}");
        }

        let _ = self.events.send(AssignmentProgress::Advanced {
            alias,
            device,
            next: next.clone(),
        });

        if next.is_none() {
            if let Some(id) = finished {
                self.fanout.remove_listener(id);
            }
            info!("device assignment completed");
            let _ = self.events.send(AssignmentProgress::Completed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::input_capture::NativeInput;

    fn registry(names: &[&str]) -> Arc<RwLock<DeviceAliasRegistry>> {
        Arc::new(RwLock::new(DeviceAliasRegistry::with_aliases(
            names.iter().copied(),
        )))
    }

    fn press(fanout: &EventFanout, device: u64) {
        fanout.deliver(NativeInput::Key {
            device: DeviceId(device),
            code: 0x41,
            is_down: true,
        });
        fanout.deliver(NativeInput::Key {
            device: DeviceId(device),
            code: 0x41,
            is_down: false,
        });
    }

    #[test]
    fn test_each_key_down_binds_next_alias() {
        // Arrange
        let registry = registry(&["Left", "Right"]);
        let fanout = Arc::new(EventFanout::new());
        let session = DeviceAssignmentSession::start(
            vec!["Left".to_string(), "Right".to_string()],
            Arc::clone(&registry),
            &fanout,
        );

        // Act
        press(&fanout, 10);
        let after_first = session.current_target();
        press(&fanout, 20);

        // Assert
        assert_eq!(after_first.as_deref(), Some("Right"));
        let registry = registry.read().unwrap();
        assert_eq!(registry.alias_for_device(DeviceId(10)), Some("Left"));
        assert_eq!(registry.alias_for_device(DeviceId(20)), Some("Right"));
        assert!(session.is_complete());
    }

    #[test]
    fn test_completed_session_detaches_itself() {
        let registry = registry(&["Only"]);
        let fanout = Arc::new(EventFanout::new());
        let session =
            DeviceAssignmentSession::start(vec!["Only".to_string()], registry, &fanout);
        assert_eq!(fanout.listener_count(), 1);

        press(&fanout, 1);

        assert_eq!(fanout.listener_count(), 0);
        assert!(session.is_complete());
    }

    #[test]
    fn test_progress_events_in_order() {
        // Arrange
        let registry = registry(&["A", "B"]);
        let fanout = Arc::new(EventFanout::new());
        let session = DeviceAssignmentSession::start(
            vec!["A".to_string(), "B".to_string()],
            registry,
            &fanout,
        );
        let mut rx = session.subscribe();

        // Act
        press(&fanout, 1);
        press(&fanout, 2);

        // Assert
        assert_eq!(
            rx.try_recv().unwrap(),
            AssignmentProgress::Advanced {
                alias: "A".to_string(),
                device: DeviceId(1),
                next: Some("B".to_string()),
            }
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            AssignmentProgress::Advanced { next: None, .. }
        ));
        assert_eq!(rx.try_recv().unwrap(), AssignmentProgress::Completed);
    }

    #[test]
    fn test_wildcard_targets_are_skipped() {
        let registry = registry(&[]);
        let fanout = Arc::new(EventFanout::new());

        let session = DeviceAssignmentSession::start(
            vec![keyzone_core::ANY_ALIAS.to_string()],
            registry,
            &fanout,
        );

        assert!(session.is_complete());
        assert_eq!(fanout.listener_count(), 0);
    }

    #[test]
    fn test_cancel_keeps_earlier_bindings() {
        let registry = registry(&["A", "B"]);
        let fanout = Arc::new(EventFanout::new());
        let session = DeviceAssignmentSession::start(
            vec!["A".to_string(), "B".to_string()],
            Arc::clone(&registry),
            &fanout,
        );
        press(&fanout, 1);

        session.cancel();
        press(&fanout, 2);

        assert_eq!(registry.read().unwrap().alias_for_device(DeviceId(1)), Some("A"));
        assert_eq!(registry.read().unwrap().alias_for_device(DeviceId(2)), None);
        assert_eq!(fanout.listener_count(), 0);
    }
}
