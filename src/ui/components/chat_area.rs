use chrono::{DateTime, Local};
use eframe::egui;

use crate::common::{Message, User};
use crate::ui::state::AppState;

pub fn render_header(ui: &mut egui::Ui, peer: &User) {
    ui.horizontal(|ui| {
        ui.colored_label(egui::Color32::LIGHT_BLUE, peer.initial());
        ui.vertical(|ui| {
            ui.heading(peer.label());
            if peer.display_name.is_some() {
                ui.label(egui::RichText::new(&peer.email).weak());
            }
        });
    });
}

pub fn render(ui: &mut egui::Ui, state: &AppState) {
    egui::ScrollArea::vertical()
        .stick_to_bottom(true)
        .auto_shrink([false, false])
        .show(ui, |ui| {
            for message in &state.messages {
                render_message(ui, message, state.is_own(message));
            }
        });
}

fn render_message(ui: &mut egui::Ui, message: &Message, own: bool) {
    let layout = if own {
        egui::Layout::right_to_left(egui::Align::TOP)
    } else {
        egui::Layout::left_to_right(egui::Align::TOP)
    };
    let color = if own {
        egui::Color32::from_rgb(37, 99, 235)
    } else {
        egui::Color32::from_gray(40)
    };

    ui.with_layout(layout, |ui| {
        egui::Frame::new()
            .fill(color)
            .inner_margin(8.0)
            .corner_radius(6.0)
            .show(ui, |ui| {
                ui.vertical(|ui| {
                    ui.label(egui::RichText::new(&message.text).color(egui::Color32::WHITE));
                    ui.label(egui::RichText::new(time_label(message.timestamp)).small().weak());
                });
            });
    });
}

/// Local HH:MM for a store timestamp in milliseconds.
pub fn time_label(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|utc| utc.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string())
}
