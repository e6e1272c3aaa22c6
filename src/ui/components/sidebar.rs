use crate::common::User;
use crate::ui::state::AppState;
use eframe::egui;

#[derive(Default)]
pub struct SidebarActions {
    pub selected: Option<User>,
    pub refresh: bool,
    pub sign_out: bool,
}

pub fn render(ui: &mut egui::Ui, state: &AppState) -> SidebarActions {
    let mut actions = SidebarActions::default();

    ui.horizontal(|ui| {
        ui.heading("Chats");
        if ui.button("⟳").on_hover_text("Reload users").clicked() {
            actions.refresh = true;
        }
        if ui.button("Sign out").clicked() {
            actions.sign_out = true;
        }
    });
    if let Some(identity) = &state.identity {
        ui.label(egui::RichText::new(&identity.email).weak());
    }
    ui.separator();

    if state.users.is_empty() {
        ui.label("No other users yet");
        return actions;
    }

    egui::ScrollArea::vertical().show(ui, |ui| {
        for user in &state.users {
            let is_selected = state
                .selected
                .as_ref()
                .is_some_and(|selected| selected.id == user.id);

            ui.horizontal(|ui| {
                ui.colored_label(egui::Color32::LIGHT_BLUE, user.initial());
                if ui.selectable_label(is_selected, user.label()).clicked() {
                    actions.selected = Some(user.clone());
                }
                if user.display_name.is_some() {
                    ui.label(egui::RichText::new(&user.email).weak().small());
                }
            });
        }
    });

    actions
}
