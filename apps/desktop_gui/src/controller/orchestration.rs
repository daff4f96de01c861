//! Command orchestration helpers from UI actions to backend command queue.

use std::collections::VecDeque;

use client_core::Notification;
use crossbeam_channel::{Sender, TrySendError};

use crate::backend_bridge::commands::BackendCommand;
use crate::ui::auth_screen::AuthForm;

/// Queues `cmd`, or returns the text to show when the queue refused it.
pub fn dispatch_backend_command(
    cmd_tx: &Sender<BackendCommand>,
    cmd: BackendCommand,
) -> Result<(), String> {
    let cmd_name = cmd.name();
    match cmd_tx.try_send(cmd) {
        Ok(()) => {
            tracing::debug!(command = cmd_name, "queued ui->backend command");
            Ok(())
        }
        Err(TrySendError::Full(_)) => {
            tracing::warn!(command = cmd_name, "ui command queue full");
            Err("UI command queue is full; please retry".to_string())
        }
        Err(TrySendError::Disconnected(_)) => {
            tracing::error!(command = cmd_name, "backend command processor gone");
            Err(
                "Backend command processor disconnected (possible startup/runtime failure); restart the app"
                    .to_string(),
            )
        }
    }
}

/// Auth commands report a refused dispatch on the auth form; profile
/// commands raise an alert, since the auth form is not on screen then.
pub fn queue_command(
    cmd_tx: &Sender<BackendCommand>,
    cmd: BackendCommand,
    auth: &mut AuthForm,
    alerts: &mut VecDeque<Notification>,
) {
    let from_auth_screen = cmd.from_auth_screen();
    if let Err(status) = dispatch_backend_command(cmd_tx, cmd) {
        if from_auth_screen {
            auth.finish(status);
        } else {
            alerts.push_back(Notification::error(status));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_core::NotificationKind;
    use crossbeam_channel::bounded;

    #[test]
    fn full_queue_reports_retry() {
        let (tx, _rx) = bounded(1);
        assert!(dispatch_backend_command(&tx, BackendCommand::MountProfile { generation: 1 }).is_ok());
        assert_eq!(
            dispatch_backend_command(&tx, BackendCommand::SaveProfile),
            Err("UI command queue is full; please retry".to_string())
        );
    }

    #[test]
    fn closed_queue_reports_disconnect() {
        let (tx, rx) = bounded(1);
        drop(rx);
        let status = dispatch_backend_command(&tx, BackendCommand::SignOut).expect_err("closed");
        assert!(status.starts_with("Backend command processor disconnected"));
    }

    #[test]
    fn refused_profile_commands_raise_an_alert() {
        let (tx, rx) = bounded(1);
        drop(rx);
        let mut auth = AuthForm::default();
        let mut alerts = VecDeque::new();

        queue_command(&tx, BackendCommand::SaveProfile, &mut auth, &mut alerts);
        queue_command(&tx, BackendCommand::SignOut, &mut auth, &mut alerts);

        assert!(auth.status.is_empty());
        assert_eq!(alerts.len(), 2);
        let alert = &alerts[0];
        assert_eq!(alert.kind, NotificationKind::Error);
        assert!(alert.message.starts_with("Backend command processor disconnected"));
    }

    #[test]
    fn refused_sign_in_is_reported_on_the_auth_form() {
        let (tx, rx) = bounded(1);
        drop(rx);
        let mut auth = AuthForm::default();
        auth.busy = true;
        let mut alerts = VecDeque::new();

        queue_command(
            &tx,
            BackendCommand::SignIn {
                email: "a@b.com".to_string(),
                password: "secret".to_string(),
            },
            &mut auth,
            &mut alerts,
        );

        assert!(alerts.is_empty());
        assert!(!auth.busy);
        assert!(auth.status.starts_with("Backend command processor disconnected"));
    }
}
