//! Background session liveness polling.

use crate::{client::BackOfficeClient, config::ClientSettings, core::user::SessionUser};
use std::time::Duration;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

/// Latest known state of the client's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Not polled yet
    Pending,
    /// The server accepted the token on the last poll
    Active(SessionUser),
    /// The server rejected the token; the client has been logged out
    Expired,
}

/// Polls `GET /session` on an interval and publishes the outcome.
///
/// Advisory only: an expired session is also reported by the next real request. On
/// `Unauthorized` the client's token is cleared, [`SessionEvent::Expired`] is published and
/// polling stops. Transport errors are logged and polling continues. The task is aborted
/// when the watch is dropped.
#[derive(Debug)]
pub struct SessionWatch {
    events: watch::Receiver<SessionEvent>,
    handle: JoinHandle<()>,
}

impl SessionWatch {
    /// Starts polling every `period`. The first poll happens immediately.
    #[must_use]
    pub fn spawn(client: BackOfficeClient, period: Duration) -> Self {
        let (tx, events) = watch::channel(SessionEvent::Pending);
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match client.session().await {
                    Ok(user) => {
                        debug!("Session of '{}' is alive", user.username);
                        let next = SessionEvent::Active(user);
                        tx.send_if_modified(|current| {
                            if *current == next {
                                false
                            } else {
                                *current = next;
                                true
                            }
                        });
                    }
                    Err(e) if e.is_unauthorized() => {
                        info!("Session expired, logging out: {e}");
                        client.clear_session().await;
                        tx.send_replace(SessionEvent::Expired);
                        break;
                    }
                    Err(e) => warn!("Session poll failed: {e}"),
                }
            }
        });
        Self { events, handle }
    }

    /// Starts polling at the configured client interval.
    #[must_use]
    pub fn from_settings(client: BackOfficeClient, settings: &ClientSettings) -> Self {
        Self::spawn(client, settings.poll_interval())
    }

    /// A receiver that wakes on every session state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionEvent> {
        self.events.clone()
    }

    /// The latest published state.
    #[must_use]
    pub fn current(&self) -> SessionEvent {
        self.events.borrow().clone()
    }

    /// True once the poller has stopped (after expiry or [`SessionWatch::stop`]).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops polling.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for SessionWatch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
