use eframe::egui;

use crate::sync::SyncState;
use crate::ui::state::AppState;

pub fn render(ui: &mut egui::Ui, state: &AppState) {
    ui.heading("Sync Info");
    ui.separator();

    ui.horizontal(|ui| {
        ui.label("Subscription:");
        let (color, label) = match state.sync_state {
            SyncState::Active => (egui::Color32::GREEN, "active"),
            SyncState::Subscribing => (egui::Color32::YELLOW, "subscribing"),
            SyncState::Unsubscribed => (egui::Color32::GRAY, "none"),
        };
        ui.colored_label(color, label);
    });
    ui.horizontal(|ui| {
        ui.label("Messages in view:");
        ui.label(format!("{}", state.messages.len()));
    });

    ui.separator();

    ui.label("Recent Events:");
    egui::ScrollArea::vertical()
        .max_height(300.0)
        .show(ui, |ui| {
            for event in state.debug_events.iter().rev().take(20) {
                let time_str = event.timestamp.format("%H:%M:%S");
                let color = match event.event_type.as_str() {
                    "FAULT" => egui::Color32::RED,
                    "SEND_SKIPPED" => egui::Color32::YELLOW,
                    "SYNC_STATE" => egui::Color32::LIGHT_BLUE,
                    _ => egui::Color32::WHITE,
                };

                ui.horizontal(|ui| {
                    ui.colored_label(color, format!("[{}]", time_str));
                    ui.label(&event.message);
                });
            }
        });
}
