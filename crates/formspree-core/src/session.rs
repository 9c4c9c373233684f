//! Page-load-scoped behavioral telemetry.
//!
//! A [`Session`] counts pointer-move and key-press events delivered by the
//! host's [`EventSource`] and reports them, together with automation
//! heuristics, as a [`SessionSnapshot`]. The snapshot is an anti-abuse signal,
//! not a security boundary.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::utils::now;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    MouseMove,
    KeyDown,
}

/// Handle returned by [`EventSource::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Host event bus (a browser window, a terminal UI, a test harness).
pub trait EventSource: Send + Sync {
    fn add_listener(&self, kind: ActivityKind, listener: Listener) -> ListenerId;

    /// Removing an unknown id is a no-op.
    fn remove_listener(&self, id: ListenerId);
}

/// In-process [`EventSource`]. Hosts call [`ActivityHub::emit`] from their
/// input handlers.
#[derive(Default)]
pub struct ActivityHub {
    next_id: AtomicU64,
    listeners: DashMap<ListenerId, (ActivityKind, Listener)>,
}

impl ActivityHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one event to every listener registered for `kind`.
    pub fn emit(&self, kind: ActivityKind) {
        // Collect first so listeners run without holding shard locks.
        let targets: Vec<Listener> = self
            .listeners
            .iter()
            .filter(|entry| entry.value().0 == kind)
            .map(|entry| entry.value().1.clone())
            .collect();
        for listener in targets {
            listener();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl EventSource for ActivityHub {
    fn add_listener(&self, kind: ActivityKind, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.insert(id, (kind, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(&id);
    }
}

/// Automation markers reported by the host environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutomationSignals {
    /// `navigator.webdriver`
    pub navigator_webdriver: bool,
    /// `webdriver` attribute on the document element
    pub document_webdriver: bool,
    /// `callPhantom` / `_phantom` globals
    pub headless_global: bool,
}

impl AutomationSignals {
    pub fn any(&self) -> bool {
        self.navigator_webdriver || self.document_webdriver || self.headless_global
    }
}

/// What a client needs to track a browser session.
#[derive(Clone)]
pub struct BrowserContext {
    pub events: Arc<dyn EventSource>,
    pub automation: AutomationSignals,
}

impl BrowserContext {
    pub fn new(events: Arc<dyn EventSource>) -> Self {
        Self {
            events,
            automation: AutomationSignals::default(),
        }
    }

    pub fn with_automation(mut self, automation: AutomationSignals) -> Self {
        self.automation = automation;
        self
    }
}

/// Point-in-time copy of the session counters. Timestamps are epoch millis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub loaded_at: i64,
    pub mousemove_count: u64,
    pub keydown_count: u64,
    pub possible_automation: bool,
    pub submitted_at: i64,
}

#[derive(Default)]
struct Counters {
    mousemove: AtomicU64,
    keydown: AtomicU64,
}

enum State {
    Idle,
    Listening {
        mousemove: ListenerId,
        keydown: ListenerId,
    },
    TornDown,
}

pub struct Session {
    context: BrowserContext,
    loaded_at: i64,
    counters: Arc<Counters>,
    state: Mutex<State>,
}

impl Session {
    pub fn new(context: BrowserContext) -> Self {
        Self {
            context,
            loaded_at: now(),
            counters: Arc::new(Counters::default()),
            state: Mutex::new(State::Idle),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("session state mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Register the pointer and key listeners. Calling it again while
    /// listening does nothing.
    pub fn start(&self) -> Result<(), ClientError> {
        let mut state = self.state();
        match *state {
            State::Listening { .. } => return Ok(()),
            State::TornDown => return Err(ClientError::SessionTornDown),
            State::Idle => {}
        }

        let counters = self.counters.clone();
        let mousemove = self.context.events.add_listener(
            ActivityKind::MouseMove,
            Arc::new(move || {
                counters.mousemove.fetch_add(1, Ordering::Relaxed);
            }),
        );
        let counters = self.counters.clone();
        let keydown = self.context.events.add_listener(
            ActivityKind::KeyDown,
            Arc::new(move || {
                counters.keydown.fetch_add(1, Ordering::Relaxed);
            }),
        );
        *state = State::Listening { mousemove, keydown };
        tracing::debug!("browser session started");
        Ok(())
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, ClientError> {
        if matches!(*self.state(), State::TornDown) {
            return Err(ClientError::SessionTornDown);
        }
        Ok(SessionSnapshot {
            loaded_at: self.loaded_at,
            mousemove_count: self.counters.mousemove.load(Ordering::Relaxed),
            keydown_count: self.counters.keydown.load(Ordering::Relaxed),
            possible_automation: self.context.automation.any(),
            submitted_at: now(),
        })
    }

    /// Deregister the listeners. Safe before `start` and safe to repeat.
    /// The session cannot be read or restarted afterwards.
    pub fn stop(&self) {
        let mut state = self.state();
        if let State::Listening { mousemove, keydown } = *state {
            self.context.events.remove_listener(mousemove);
            self.context.events.remove_listener(keydown);
            tracing::debug!("browser session stopped");
        }
        *state = State::TornDown;
    }

    pub fn is_torn_down(&self) -> bool {
        matches!(*self.state(), State::TornDown)
    }
}
