use eframe::egui;

use crate::common::Identity;

/// Shown instead of the chat while the identity is missing or unverified.
pub fn render(ui: &mut egui::Ui, identity: Option<&Identity>) -> bool {
    let mut sign_out = false;
    ui.vertical_centered(|ui| {
        ui.add_space(80.0);
        match identity {
            Some(identity) => {
                ui.heading("Verify your email");
                ui.label(format!(
                    "We sent a verification link to {}. Chat unlocks once it is confirmed.",
                    identity.email
                ));
                if ui.button("Sign out").clicked() {
                    sign_out = true;
                }
            }
            None => {
                ui.heading("Not signed in");
                ui.label("Start the client with --user-id and --email, or set `identity` in the config file.");
            }
        }
    });
    sign_out
}
