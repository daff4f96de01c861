//! Profile form bound to the shared [`ProfileScreen`] view-model.

use client_core::{ProfilePhase, ProfileScreen, ProfileView};
use eframe::egui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileAction {
    Save,
    SignOut,
}

pub fn show(ui: &mut egui::Ui, screen: &ProfileScreen) -> Option<ProfileAction> {
    let view = screen.view();
    let mut action = None;
    let card_width = ui.available_width().clamp(320.0, 480.0);

    ui.add_space(24.0);
    ui.vertical_centered(|ui| {
        ui.set_width(card_width);
        ui.heading("Profile");
        if let Some(status) = phase_status(&view) {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.weak(status);
            });
        }
        ui.add_space(8.0);

        ui.label("Email");
        let mut email = view.email.clone().unwrap_or_default();
        ui.add_enabled(
            false,
            egui::TextEdit::singleline(&mut email).desired_width(f32::INFINITY),
        );

        ui.label("Full Name");
        let mut full_name = view.full_name.clone();
        let response = ui.add(
            egui::TextEdit::singleline(&mut full_name)
                .hint_text("Enter your full name")
                .desired_width(f32::INFINITY),
        );
        if response.changed() {
            screen.set_full_name(full_name);
        }

        ui.label("Device Info");
        let mut device_info = view.device_info.clone();
        let response = ui.add(
            egui::TextEdit::singleline(&mut device_info)
                .hint_text("e.g. iPhone 15, Pixel 8")
                .desired_width(f32::INFINITY),
        );
        if response.changed() {
            screen.set_device_info(device_info);
        }

        ui.add_space(8.0);
        if ui
            .add_enabled(view.save_enabled(), egui::Button::new(view.save_label()))
            .clicked()
        {
            action = Some(ProfileAction::Save);
        }

        if let Some(account) = &view.account {
            ui.add_space(12.0);
            ui.separator();
            ui.strong("Account Information");
            ui.label(format!("User ID: {}", account.user_id));
            if let Some(created) = &account.created {
                ui.label(format!("Created: {created}"));
            }
        }

        ui.add_space(12.0);
        if ui.button("Sign Out").clicked() {
            action = Some(ProfileAction::SignOut);
        }
    });

    action
}

fn phase_status(view: &ProfileView) -> Option<&'static str> {
    match view.phase {
        ProfilePhase::Idle | ProfilePhase::Loading => Some("Loading profile..."),
        ProfilePhase::CreatingDefault => Some("Setting up your profile..."),
        ProfilePhase::Loaded => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(phase: ProfilePhase) -> ProfileView {
        ProfileView {
            phase,
            email: None,
            full_name: String::new(),
            device_info: String::new(),
            saving: false,
            account: None,
        }
    }

    #[test]
    fn spinner_only_while_loading_or_creating() {
        assert_eq!(phase_status(&view(ProfilePhase::Loading)), Some("Loading profile..."));
        assert_eq!(
            phase_status(&view(ProfilePhase::CreatingDefault)),
            Some("Setting up your profile...")
        );
        assert_eq!(phase_status(&view(ProfilePhase::Loaded)), None);
    }
}
