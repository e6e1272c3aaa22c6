use eframe::egui;
use tokio::sync::mpsc;

use crate::common::{ChatCommand, ChatEvent};

use super::components::{
    chat_area, debug_panel, input_bar,
    sidebar::{self, SidebarActions},
    verification,
};
use super::state::AppState;

pub struct ChatApp {
    state: AppState,
    command_sender: mpsc::Sender<ChatCommand>,
    event_receiver: mpsc::Receiver<ChatEvent>,
}

impl ChatApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        command_sender: mpsc::Sender<ChatCommand>,
        event_receiver: mpsc::Receiver<ChatEvent>,
    ) -> Self {
        Self {
            state: AppState::new(),
            command_sender,
            event_receiver,
        }
    }

    fn handle_chat_events(&mut self) {
        while let Ok(event) = self.event_receiver.try_recv() {
            match event {
                ChatEvent::IdentityChanged(identity) => self.state.set_identity(identity),
                ChatEvent::UsersLoaded(users) => self.state.set_users(users),
                ChatEvent::ConversationUpdated { peer_id, messages } => {
                    self.state.replace_conversation(&peer_id, messages)
                }
                ChatEvent::SyncStateChanged(sync_state) => self.state.set_sync_state(sync_state),
                ChatEvent::SendSkipped(reason) => self.state.record_skip(reason),
                ChatEvent::Fault(fault) => self.state.record_fault(fault),
            }
        }
    }

    fn send_command(&mut self, command: ChatCommand) {
        if let Err(err) = self.command_sender.try_send(command) {
            log::warn!("Failed to send command to chat client: {err}");
        }
    }

    fn apply_sidebar_actions(&mut self, actions: SidebarActions) {
        if let Some(user) = actions.selected {
            if self.state.select_user(user.clone()) {
                self.send_command(ChatCommand::SelectPeer(user));
            }
        }
        if actions.refresh {
            self.send_command(ChatCommand::RefreshUsers);
        }
        if actions.sign_out {
            self.send_command(ChatCommand::SignOut);
        }
    }
}

impl eframe::App for ChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_chat_events();

        if !self.state.is_verified() {
            let mut sign_out = false;
            egui::CentralPanel::default().show(ctx, |ui| {
                sign_out = verification::render(ui, self.state.identity.as_ref());
            });
            if sign_out {
                self.send_command(ChatCommand::SignOut);
            }
            ctx.request_repaint();
            return;
        }

        egui::SidePanel::left("user_sidebar")
            .resizable(true)
            .default_width(240.0)
            .show(ctx, |ui| {
                let actions = sidebar::render(ui, &self.state);
                self.apply_sidebar_actions(actions);
            });

        egui::SidePanel::right("debug_panel")
            .resizable(true)
            .default_width(260.0)
            .show(ctx, |ui| {
                debug_panel::render(ui, &self.state);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(peer) = self.state.selected.clone() else {
                ui.centered_and_justified(|ui| {
                    ui.label("Select a chat to start messaging");
                });
                return;
            };

            chat_area::render_header(ui, &peer);
            ui.separator();

            egui::TopBottomPanel::bottom("input_bar").show_inside(ui, |ui| {
                if let Some(text) = input_bar::render(ui, &mut self.state.input_text) {
                    self.send_command(ChatCommand::SendMessage(text));
                }
            });
            chat_area::render(ui, &self.state);
        });

        ctx.request_repaint();
    }
}
