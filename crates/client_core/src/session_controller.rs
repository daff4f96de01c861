//! Root of the app: mirrors the remote client's session and decides which
//! screen is shown.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use shared::domain::Session;
use tokio::{runtime::Handle, sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{auth_events::SubscriptionHandle, profile_screen::SignOutCallback, RemoteClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootView {
    /// Empty placeholder until the first session read completes.
    Loading,
    Profile,
    Authentication,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub loading: bool,
    pub session: Option<Session>,
}

impl SessionState {
    fn initial() -> Self {
        Self {
            loading: true,
            session: None,
        }
    }

    pub fn route(&self) -> RootView {
        match (self.loading, &self.session) {
            (true, _) => RootView::Loading,
            (false, Some(_)) => RootView::Profile,
            (false, None) => RootView::Authentication,
        }
    }
}

pub struct SessionController {
    state: Arc<watch::Sender<SessionState>>,
    subscription: Option<SubscriptionHandle>,
    tasks: Vec<JoinHandle<()>>,
}

impl SessionController {
    /// Mounts on the current tokio runtime.
    pub fn mount(remote: Arc<dyn RemoteClient>) -> Self {
        Self::mount_on(&Handle::current(), remote)
    }

    pub fn mount_on(runtime: &Handle, remote: Arc<dyn RemoteClient>) -> Self {
        let (state, _) = watch::channel(SessionState::initial());
        let state = Arc::new(state);
        // Set once any auth change is applied; a slower initial read must
        // not overwrite it.
        let changed_by_subscription = Arc::new(AtomicBool::new(false));

        let (subscription, mut events) = remote.on_auth_state_change().split();
        debug!(subscription_id = subscription.id(), "session controller subscribed");

        let listener = runtime.spawn({
            let state = Arc::clone(&state);
            let changed_by_subscription = Arc::clone(&changed_by_subscription);
            async move {
                while let Some(change) = events.recv().await {
                    changed_by_subscription.store(true, Ordering::SeqCst);
                    let applied = state.send_if_modified(|current| {
                        replace_session(current, change.session.clone())
                    });
                    debug!(event = ?change.event, applied, "auth change mirrored");
                }
                debug!("auth change stream closed");
            }
        });

        let initial_fetch = runtime.spawn({
            let state = Arc::clone(&state);
            async move {
                let fetched = match remote.get_session().await {
                    Ok(session) => Some(session),
                    Err(err) => {
                        warn!(code = ?err.code, "initial session fetch failed: {err}");
                        None
                    }
                };
                state.send_modify(|current| {
                    if let Some(session) = fetched {
                        if changed_by_subscription.load(Ordering::SeqCst) {
                            debug!("initial session read superseded by an auth change");
                        } else {
                            current.session = session;
                        }
                    }
                    current.loading = false;
                });
                info!(
                    signed_in = state.borrow().session.is_some(),
                    "initial session resolved"
                );
            }
        });

        Self {
            state,
            subscription: Some(subscription),
            tasks: vec![listener, initial_fetch],
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn route(&self) -> RootView {
        self.state.borrow().route()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Resolves once the initial session read has completed.
    pub async fn ready(&self) -> SessionState {
        let mut rx = self.state.subscribe();
        let resolved = match rx.wait_for(|state| !state.loading).await {
            Ok(state) => Some((*state).clone()),
            Err(_) => None,
        };
        resolved.unwrap_or_else(|| self.state())
    }

    /// Drops the mirrored session right away. Returns whether anything
    /// changed; clearing an already empty session is a no-op.
    pub fn clear_session(&self) -> bool {
        clear_session(&self.state)
    }

    /// Callback handed to the profile screen for local sign-out.
    pub fn sign_out_callback(&self) -> SignOutCallback {
        let state = Arc::downgrade(&self.state);
        Arc::new(move || {
            if let Some(state) = state.upgrade() {
                clear_session(&state);
            }
        })
    }

    /// Success callback for the authentication screen. The new session
    /// arrives through the standing subscription instead.
    pub fn on_auth_success(&self, _session: Option<&Session>) {
        debug!("authentication succeeded; waiting for auth change");
    }

    pub fn unmount(self) {
        drop(self);
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            debug!(subscription_id = subscription.id(), "session controller unsubscribing");
            subscription.unsubscribe();
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

fn replace_session(current: &mut SessionState, session: Option<Session>) -> bool {
    if current.session == session {
        return false;
    }
    current.session = session;
    true
}

fn clear_session(state: &watch::Sender<SessionState>) -> bool {
    let cleared = state.send_if_modified(|current| replace_session(current, None));
    debug!(cleared, "local sign-out applied");
    cleared
}

#[cfg(test)]
#[path = "tests/session_controller_tests.rs"]
mod tests;
