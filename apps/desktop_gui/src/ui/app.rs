//! App shell: root view switch, blocking alerts, and UI event intake.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use client_core::{Notification, ProfileScreen, RootView, SessionController};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::{events::UiEvent, orchestration::queue_command};
use crate::ui::{
    auth_screen::{self, AuthAction, AuthForm},
    profile_panel::{self, ProfileAction},
};

pub const LAST_EMAIL_STORAGE_KEY: &str = "profile_sync.last_email";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MountTransition {
    Mount,
    Unmount,
    Keep,
}

fn mount_transition(route: RootView, mounted: bool) -> MountTransition {
    match (route == RootView::Profile, mounted) {
        (true, false) => MountTransition::Mount,
        (false, true) => MountTransition::Unmount,
        _ => MountTransition::Keep,
    }
}

pub struct ProfileSyncApp {
    controller: SessionController,
    profile: Arc<ProfileScreen>,
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    auth: AuthForm,
    alerts: VecDeque<Notification>,
    profile_mounted: bool,
}

impl ProfileSyncApp {
    pub fn new(
        controller: SessionController,
        profile: Arc<ProfileScreen>,
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
        last_email: Option<String>,
    ) -> Self {
        Self {
            controller,
            profile,
            cmd_tx,
            ui_rx,
            auth: AuthForm::with_email(last_email),
            alerts: VecDeque::new(),
            profile_mounted: false,
        }
    }

    fn queue(&mut self, cmd: BackendCommand) {
        queue_command(&self.cmd_tx, cmd, &mut self.auth, &mut self.alerts);
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::Notification(notification) => self.alerts.push_back(notification),
                UiEvent::AuthSucceeded => {
                    self.controller.on_auth_success(None);
                    self.auth.password.clear();
                    self.auth.finish("");
                }
                UiEvent::SignUpPending { email } => {
                    self.auth.finish("");
                    self.alerts.push_back(Notification::info(
                        "Check your email",
                        format!("Confirm {email} to finish signing up, then sign in."),
                    ));
                }
                UiEvent::Error(err) => {
                    tracing::debug!(category = ?err.category(), context = ?err.context(), "ui error");
                    self.auth.finish(err.user_facing());
                }
            }
        }
    }

    fn sync_profile_mount(&mut self, route: RootView) {
        match mount_transition(route, self.profile_mounted) {
            MountTransition::Mount => {
                self.profile_mounted = true;
                // Claimed on the UI thread: an unmount on a later frame
                // invalidates the load even before the worker runs it.
                let generation = self.profile.begin_mount();
                self.queue(BackendCommand::MountProfile { generation });
            }
            MountTransition::Unmount => {
                self.profile_mounted = false;
                self.profile.unmount();
            }
            MountTransition::Keep => {}
        }
    }

    fn show_alert(&mut self, ctx: &egui::Context) {
        let Some(alert) = self.alerts.front() else {
            return;
        };
        let mut dismissed = false;
        egui::Window::new(alert.title.clone())
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label(&alert.message);
                ui.add_space(8.0);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.alerts.pop_front();
        }
    }
}

impl eframe::App for ProfileSyncApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();

        let route = self.controller.route();
        self.sync_profile_mount(route);

        let blocked = !self.alerts.is_empty();
        let mut auth_action = None;
        let mut profile_action = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_enabled_ui(!blocked, |ui| match route {
                RootView::Loading => {}
                RootView::Authentication => {
                    auth_action = auth_screen::show(ui, &mut self.auth);
                }
                RootView::Profile => {
                    profile_action = profile_panel::show(ui, &self.profile);
                }
            });
        });

        if let Some(action) = auth_action {
            self.auth.begin(action);
            let email = self.auth.email.clone();
            let password = self.auth.password.clone();
            self.queue(match action {
                AuthAction::SignIn => BackendCommand::SignIn { email, password },
                AuthAction::SignUp => BackendCommand::SignUp { email, password },
            });
        }
        match profile_action {
            Some(ProfileAction::Save) => self.queue(BackendCommand::SaveProfile),
            Some(ProfileAction::SignOut) => self.queue(BackendCommand::SignOut),
            None => {}
        }

        self.show_alert(ctx);
        ctx.request_repaint_after(Duration::from_millis(100));
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        storage.set_string(LAST_EMAIL_STORAGE_KEY, self.auth.email.trim().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_screen_follows_the_route() {
        assert_eq!(mount_transition(RootView::Loading, false), MountTransition::Keep);
        assert_eq!(mount_transition(RootView::Profile, false), MountTransition::Mount);
        assert_eq!(mount_transition(RootView::Profile, true), MountTransition::Keep);
        assert_eq!(
            mount_transition(RootView::Authentication, true),
            MountTransition::Unmount
        );
        assert_eq!(
            mount_transition(RootView::Authentication, false),
            MountTransition::Keep
        );
    }
}
