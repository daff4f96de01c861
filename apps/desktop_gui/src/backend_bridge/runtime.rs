//! Runtime bridge between UI command queue and backend event intake.

use std::{sync::Arc, thread};

use client_core::{Notification, Notifier, ProfileScreen, RemoteClient, SaveOutcome};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use tokio::runtime::Handle;

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiError, UiErrorContext, UiEvent};

pub struct BackendServices {
    pub remote: Arc<dyn RemoteClient>,
    pub profile: Arc<ProfileScreen>,
}

/// Forwards profile screen notifications to the UI thread as alerts.
pub struct ChannelNotifier {
    ui_tx: Sender<UiEvent>,
}

impl ChannelNotifier {
    pub fn new(ui_tx: Sender<UiEvent>) -> Self {
        Self { ui_tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        match self.ui_tx.try_send(UiEvent::Notification(notification)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => tracing::warn!("ui event queue full; alert dropped"),
            Err(TrySendError::Disconnected(_)) => tracing::debug!("ui gone; alert dropped"),
        }
    }
}

pub fn validate_credentials(
    context: UiErrorContext,
    email: &str,
    password: &str,
) -> Result<(String, String), UiError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(UiError::validation(
            context,
            "Email and password are required",
        ));
    }
    Ok((email.to_string(), password.to_string()))
}

/// Drains the command queue on a dedicated thread, running each command as
/// its own task so a slow save never blocks a sign-out.
pub fn launch(
    runtime: Handle,
    services: BackendServices,
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
) {
    let services = Arc::new(services);
    thread::spawn(move || {
        for cmd in cmd_rx.iter() {
            tracing::debug!(command = cmd.name(), "backend command received");
            let services = Arc::clone(&services);
            let ui_tx = ui_tx.clone();
            runtime.spawn(async move { run_command(&services, cmd, &ui_tx).await });
        }
        tracing::info!("backend command queue closed");
    });
}

async fn run_command(services: &BackendServices, cmd: BackendCommand, ui_tx: &Sender<UiEvent>) {
    match cmd {
        BackendCommand::SignIn { email, password } => {
            let (email, password) =
                match validate_credentials(UiErrorContext::SignIn, &email, &password) {
                    Ok(credentials) => credentials,
                    Err(err) => {
                        let _ = ui_tx.try_send(UiEvent::Error(err));
                        return;
                    }
                };
            match services.remote.sign_in_with_password(&email, &password).await {
                Ok(_) => {
                    let _ = ui_tx.try_send(UiEvent::AuthSucceeded);
                }
                Err(err) => {
                    tracing::warn!(code = ?err.code, "sign in failed: {err}");
                    let _ = ui_tx.try_send(UiEvent::Error(UiError::from_remote(
                        UiErrorContext::SignIn,
                        &err,
                    )));
                }
            }
        }
        BackendCommand::SignUp { email, password } => {
            let (email, password) =
                match validate_credentials(UiErrorContext::SignUp, &email, &password) {
                    Ok(credentials) => credentials,
                    Err(err) => {
                        let _ = ui_tx.try_send(UiEvent::Error(err));
                        return;
                    }
                };
            match services.remote.sign_up(&email, &password).await {
                Ok(Some(_)) => {
                    let _ = ui_tx.try_send(UiEvent::AuthSucceeded);
                }
                Ok(None) => {
                    let _ = ui_tx.try_send(UiEvent::SignUpPending { email });
                }
                Err(err) => {
                    tracing::warn!(code = ?err.code, "sign up failed: {err}");
                    let _ = ui_tx.try_send(UiEvent::Error(UiError::from_remote(
                        UiErrorContext::SignUp,
                        &err,
                    )));
                }
            }
        }
        BackendCommand::MountProfile { generation } => services.profile.load(generation).await,
        BackendCommand::SaveProfile => {
            let outcome = services.profile.save().await;
            if outcome != SaveOutcome::Saved {
                tracing::debug!(?outcome, "profile save finished without saving");
            }
        }
        BackendCommand::SignOut => {
            // Failures are already raised as alerts by the screen.
            if services.profile.sign_out().await.is_ok() {
                tracing::info!("signed out from profile screen");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::events::UiErrorCategory;
    use client_core::NotificationKind;
    use crossbeam_channel::bounded;

    #[test]
    fn blank_credentials_are_rejected_before_any_request() {
        let err = validate_credentials(UiErrorContext::SignIn, "  ", "secret")
            .expect_err("blank email");
        assert_eq!(err.message(), "Email and password are required");
        assert_eq!(err.category(), UiErrorCategory::Validation);

        let (email, password) =
            validate_credentials(UiErrorContext::SignIn, " a@b.com ", "secret").expect("valid");
        assert_eq!(email, "a@b.com");
        assert_eq!(password, "secret");
    }

    #[test]
    fn notifier_forwards_alerts_to_the_ui_queue() {
        let (tx, rx) = bounded(4);
        let notifier = ChannelNotifier::new(tx);
        notifier.notify(Notification::error("network down"));

        match rx.try_recv() {
            Ok(UiEvent::Notification(notification)) => {
                assert_eq!(notification.kind, NotificationKind::Error);
                assert_eq!(notification.message, "network down");
            }
            _ => panic!("expected a notification event"),
        }
    }
}
