//! Process-wide session state and transition broadcasting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use daily_dish_core::{AccountId, Email};

/// How the current session was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionProvider {
    /// Local email + password login.
    Password,
    /// External identity provider.
    External,
}

/// The currently authenticated account.
///
/// A weak reference to the account: collaborators look the account up by
/// `account_id` and never own its lifetime. At most one session exists
/// per process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The authenticated account.
    pub account_id: AccountId,
    /// Account email, for display and review attribution.
    pub email: Email,
    /// Account display name.
    pub display_name: String,
    /// How the session was established.
    pub provider: SessionProvider,
    /// When the session was established.
    pub established_at: DateTime<Utc>,
}

/// A session state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTransition {
    /// A session was established (login).
    Established(Session),
    /// The session was destroyed (logout or unrecoverable auth error).
    Destroyed(Session),
}

type Listener = Box<dyn Fn(&SessionTransition) + Send>;

/// Holds the current session and notifies subscribers of transitions.
///
/// Listeners run synchronously, in subscription order, on the caller that
/// produced the transition; delivery is at-most-once per transition and
/// late subscribers see no replay. A listener must not subscribe or drive
/// a transition from inside its callback, and a slow listener delays all
/// subsequent ones.
#[derive(Default)]
pub struct SessionBroadcaster {
    current: Mutex<Option<Session>>,
    listeners: Mutex<Vec<Listener>>,
}

impl SessionBroadcaster {
    /// Create a broadcaster with no session and no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for every future transition.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&SessionTransition) + Send + 'static,
    {
        self.lock_listeners().push(Box::new(listener));
    }

    /// Point-in-time read of the current session.
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.lock_current().clone()
    }

    /// Install a new session, emitting `Destroyed` for any session it
    /// replaces and then `Established` for the new one.
    pub(crate) fn establish(&self, session: Session) {
        let previous = self.lock_current().replace(session.clone());

        if let Some(previous) = previous {
            tracing::debug!(account_id = %previous.account_id, "replacing existing session");
            self.emit(&SessionTransition::Destroyed(previous));
        }
        tracing::info!(account_id = %session.account_id, provider = ?session.provider, "session established");
        self.emit(&SessionTransition::Established(session));
    }

    /// Destroy the current session, if any, and return it.
    pub(crate) fn clear(&self) -> Option<Session> {
        let destroyed = self.lock_current().take();

        if let Some(session) = &destroyed {
            tracing::info!(account_id = %session.account_id, "session destroyed");
            self.emit(&SessionTransition::Destroyed(session.clone()));
        }
        destroyed
    }

    fn emit(&self, transition: &SessionTransition) {
        for listener in self.lock_listeners().iter() {
            listener(transition);
        }
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<Listener>> {
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
