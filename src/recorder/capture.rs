use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::listener::{RawInputEvent, RawInputListener};
use super::machine::ShortcutRecorder;
use crate::bindings::{SharedBindings, Shortcut};
use crate::controller::ControllerButton;

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureStatus {
    Idle,
    Recording {
        target: ControllerButton,
    },
    Resolved {
        target: ControllerButton,
        shortcut: Shortcut,
    },
    Cancelled {
        target: ControllerButton,
    },
    /// No listener could be installed or kept alive.
    Unavailable {
        target: ControllerButton,
        reason: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("No input listener available: {0}")]
    Unavailable(String),
}

struct CaptureShared {
    recording: watch::Sender<bool>,
    status: watch::Sender<CaptureStatus>,
    current: Mutex<Option<u64>>,
}

impl CaptureShared {
    /// End `session` if it is still the live one. Exactly one caller wins.
    fn conclude(&self, session: u64, listener: &dyn RawInputListener, next: CaptureStatus) -> bool {
        let Ok(mut current) = self.current.lock() else {
            error!("Capture state poisoned");
            return false;
        };
        if *current != Some(session) {
            return false;
        }
        *current = None;

        listener.remove();
        self.recording.send_replace(false);
        self.status.send_replace(next);
        true
    }
}

struct ActiveCapture {
    id: u64,
    target: ControllerButton,
    listener: Arc<dyn RawInputListener>,
    cancel: CancellationToken,
}

/// Records one chord for a controller input and writes it into the binding
/// table.
///
/// While a capture runs the `recording` flag is set, which makes the engine
/// release held output and ignore button edges.
pub struct ShortcutCapture {
    listeners: Vec<Arc<dyn RawInputListener>>,
    bindings: SharedBindings,
    shared: Arc<CaptureShared>,
    next_id: u64,
    session: Option<ActiveCapture>,
}

impl ShortcutCapture {
    /// `listeners` are tried in order when a capture starts.
    pub fn new(listeners: Vec<Arc<dyn RawInputListener>>, bindings: SharedBindings) -> Self {
        let (recording, _) = watch::channel(false);
        let (status, _) = watch::channel(CaptureStatus::Idle);
        Self {
            listeners,
            bindings,
            shared: Arc::new(CaptureShared {
                recording,
                status,
                current: Mutex::new(None),
            }),
            next_id: 0,
            session: None,
        }
    }

    pub fn recording(&self) -> watch::Receiver<bool> {
        self.shared.recording.subscribe()
    }

    pub fn status(&self) -> watch::Receiver<CaptureStatus> {
        self.shared.status.subscribe()
    }

    pub fn is_active(&self) -> bool {
        *self.shared.recording.borrow()
    }

    /// Begin recording a chord for `target`, ending any capture in progress.
    pub fn start(&mut self, target: ControllerButton) -> Result<(), RecorderError> {
        self.cancel();

        let (tx, rx) = mpsc::unbounded_channel();
        let mut installed = None;
        let mut last_error = None;
        for listener in &self.listeners {
            match listener.install(tx.clone()) {
                Ok(()) => {
                    debug!("Installed input listener '{}'", listener.name());
                    installed = Some(listener.clone());
                    break;
                }
                Err(e) => {
                    warn!("Input listener '{}' unavailable: {}", listener.name(), e);
                    last_error = Some(e);
                }
            }
        }
        drop(tx);

        let Some(listener) = installed else {
            let reason = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no listener configured".to_string());
            error!("Cannot record shortcut for {}: {}", target, reason);
            self.shared.status.send_replace(CaptureStatus::Unavailable {
                target,
                reason: reason.clone(),
            });
            return Err(RecorderError::Unavailable(reason));
        };

        self.next_id += 1;
        let id = self.next_id;
        if let Ok(mut current) = self.shared.current.lock() {
            *current = Some(id);
        }
        self.shared.recording.send_replace(true);
        self.shared.status.send_replace(CaptureStatus::Recording {
            target: target.clone(),
        });
        info!("Recording shortcut for {}", target);

        let cancel = CancellationToken::new();
        let session = CaptureSession {
            id,
            target: target.clone(),
            listener: listener.clone(),
            bindings: self.bindings.clone(),
            shared: self.shared.clone(),
        };
        tokio::spawn(session.run(rx, cancel.clone()));

        self.session = Some(ActiveCapture {
            id,
            target,
            listener,
            cancel,
        });
        Ok(())
    }

    /// Stop the capture in progress. Returns `true` if one was running.
    pub fn cancel(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        session.cancel.cancel();
        let cancelled = self.shared.conclude(
            session.id,
            session.listener.as_ref(),
            CaptureStatus::Cancelled {
                target: session.target.clone(),
            },
        );
        if cancelled {
            info!("Shortcut capture for {} cancelled", session.target);
        }
        cancelled
    }
}

impl Drop for ShortcutCapture {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct CaptureSession {
    id: u64,
    target: ControllerButton,
    listener: Arc<dyn RawInputListener>,
    bindings: SharedBindings,
    shared: Arc<CaptureShared>,
}

impl CaptureSession {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<RawInputEvent>, cancel: CancellationToken) {
        let mut recorder = ShortcutRecorder::new();
        recorder.begin();

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => return,
                event = rx.recv() => event,
            };

            let Some(event) = event else {
                self.finish(CaptureStatus::Unavailable {
                    target: self.target.clone(),
                    reason: format!("listener '{}' stopped delivering events", self.listener.name()),
                });
                return;
            };

            if let RawInputEvent::ListenerDisabled { reason } = event {
                warn!("Input listener disabled by host ({:?}), re-arming", reason);
                if let Err(e) = self.listener.rearm() {
                    error!("{}", e);
                    self.finish(CaptureStatus::Unavailable {
                        target: self.target.clone(),
                        reason: e.to_string(),
                    });
                    return;
                }
                continue;
            }

            if let Some(shortcut) = recorder.handle(&event) {
                // Conclude while holding the write lock; a capture that lost
                // to cancel must not write.
                let mut bindings = self.bindings.write().await;
                let resolved = self.finish(CaptureStatus::Resolved {
                    target: self.target.clone(),
                    shortcut: shortcut.clone(),
                });
                if !resolved {
                    debug!("Capture for {} ended before {} was bound", self.target, shortcut);
                    return;
                }
                bindings.set(self.target.clone(), Some(shortcut.clone()));
                info!("Bound {} to {}", self.target, shortcut);
                return;
            }
        }
    }

    fn finish(&self, status: CaptureStatus) -> bool {
        self.shared.conclude(self.id, self.listener.as_ref(), status)
    }
}
