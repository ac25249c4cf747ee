//! Daily Dish engine - account identity and personalization state.
//!
//! This crate is the stateful heart of the Daily Dish application:
//! everything behind the rendering layer that has invariants worth
//! protecting.
//!
//! # Components
//!
//! - [`challenge`] - one-time passcode challenges gating registration and
//!   password reset
//! - [`store`] - the dual remote/local document store the engine persists
//!   through
//! - [`services::identity`] - registration, login, logout, password reset
//! - [`services::collections`] - favorites, shopping list, and reviews
//! - [`session`] - process-wide session state and transition broadcasting
//! - [`notify`] - the outbound passcode delivery capability
//!
//! # Construction
//!
//! There are no ambient globals: every service is constructed explicitly
//! and handed its collaborators. [`Engine`] wires the production graph
//! from an [`config::EngineConfig`]; tests assemble the same graph from
//! in-memory doubles.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod challenge;
pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod services;
pub mod session;
pub mod store;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use crate::challenge::ChallengeStore;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::notify::{NotificationSender, SmtpNotificationSender};
use crate::services::collections::PersonalizationService;
use crate::services::identity::IdentityService;
use crate::session::SessionBroadcaster;
use crate::store::dual::DualStore;
use crate::store::local::LocalStore;
use crate::store::remote::{HttpRemoteStore, RemoteStore};

/// The fully wired engine.
///
/// Owns one instance of every component and shares the store, challenge
/// store, and session broadcaster between the two services. UI layers keep
/// one `Engine` per process.
pub struct Engine<R, N>
where
    R: RemoteStore,
    N: NotificationSender,
{
    /// Registration, login, password reset.
    pub identity: IdentityService<R, N>,
    /// Favorites, shopping list, reviews.
    pub personalization: PersonalizationService<R>,
    /// Session read surface and transition subscriptions.
    pub sessions: Arc<SessionBroadcaster>,
    /// Direct store access, mostly for maintenance (resync, degraded flag).
    pub store: Arc<DualStore<R>>,
    /// Challenge store, exposed for expiry sweeps.
    pub challenges: Arc<ChallengeStore>,
}

impl<R, N> Engine<R, N>
where
    R: RemoteStore,
    N: NotificationSender,
{
    /// Wire an engine from already-constructed collaborators.
    ///
    /// This is the seam tests use: pass an in-memory remote store double
    /// and a recording sender instead of the production implementations.
    #[must_use]
    pub fn new(remote: R, local: LocalStore, sender: N, challenge_ttl: Duration) -> Self {
        let local = Arc::new(local);
        let store = Arc::new(DualStore::new(remote, Arc::clone(&local)));
        let challenges = Arc::new(ChallengeStore::new(Arc::clone(&local), challenge_ttl));
        let sessions = Arc::new(SessionBroadcaster::new());

        let identity = IdentityService::new(
            Arc::clone(&store),
            Arc::clone(&challenges),
            Arc::clone(&sessions),
            sender,
        );
        let personalization =
            PersonalizationService::new(Arc::clone(&store), Arc::clone(&sessions));

        Self {
            identity,
            personalization,
            sessions,
            store,
            challenges,
        }
    }
}

impl Engine<HttpRemoteStore, SmtpNotificationSender> {
    /// Wire the production engine from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store file cannot be opened or the
    /// SMTP relay cannot be constructed.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let remote = HttpRemoteStore::new(&config.remote);
        let local = LocalStore::open(&config.local.path, config.local.quota_bytes)?;
        let sender = SmtpNotificationSender::new(&config.smtp)?;

        Ok(Self::new(remote, local, sender, config.challenge_ttl))
    }
}
