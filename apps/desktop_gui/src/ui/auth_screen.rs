//! Email/password sign-in and sign-up card.

use eframe::egui;

#[derive(Debug, Default)]
pub struct AuthForm {
    pub email: String,
    pub password: String,
    pub busy: bool,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    SignIn,
    SignUp,
}

impl AuthForm {
    pub fn with_email(email: Option<String>) -> Self {
        Self {
            email: email.unwrap_or_default(),
            ..Self::default()
        }
    }

    pub fn can_submit(&self) -> bool {
        !self.busy && !self.email.trim().is_empty() && !self.password.is_empty()
    }

    pub fn begin(&mut self, action: AuthAction) {
        self.busy = true;
        self.status = match action {
            AuthAction::SignIn => "Signing in...".to_string(),
            AuthAction::SignUp => "Creating account...".to_string(),
        };
    }

    pub fn finish(&mut self, status: impl Into<String>) {
        self.busy = false;
        self.status = status.into();
    }
}

pub fn show(ui: &mut egui::Ui, form: &mut AuthForm) -> Option<AuthAction> {
    let mut action = None;
    let card_width = ui.available_width().clamp(320.0, 420.0);

    ui.add_space(40.0);
    ui.vertical_centered(|ui| {
        ui.set_width(card_width);
        ui.heading("Profile Sync");
        ui.weak("Sign in or create an account.");
        ui.add_space(12.0);

        ui.add_enabled_ui(!form.busy, |ui| {
            ui.label("Email");
            ui.add(
                egui::TextEdit::singleline(&mut form.email)
                    .hint_text("you@example.com")
                    .desired_width(f32::INFINITY),
            );
            ui.label("Password");
            let password = ui.add(
                egui::TextEdit::singleline(&mut form.password)
                    .password(true)
                    .desired_width(f32::INFINITY),
            );
            let submitted =
                password.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));

            ui.add_space(8.0);
            ui.horizontal(|ui| {
                let enabled = form.can_submit();
                if ui.add_enabled(enabled, egui::Button::new("Sign In")).clicked()
                    || (enabled && submitted)
                {
                    action = Some(AuthAction::SignIn);
                }
                if ui.add_enabled(enabled, egui::Button::new("Sign Up")).clicked() {
                    action = Some(AuthAction::SignUp);
                }
            });
        });

        if form.busy {
            ui.spinner();
        }
        if !form.status.is_empty() {
            ui.add_space(6.0);
            ui.small(&form.status);
        }
    });

    action
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_needs_both_fields_and_no_request_in_flight() {
        let mut form = AuthForm::with_email(Some("a@b.com".to_string()));
        assert!(!form.can_submit());

        form.password = "secret".to_string();
        assert!(form.can_submit());

        form.begin(AuthAction::SignIn);
        assert!(!form.can_submit());
        assert_eq!(form.status, "Signing in...");

        form.finish("Invalid login credentials");
        assert!(form.can_submit());
    }
}
