//! Confirmation dialog for destructive actions

use std::sync::Arc;

use egui::{Context, Key};

use crate::ui::dialogs::DialogState;
use crate::ui::theme::Theme;

/// A pending yes/no question
#[derive(Clone)]
pub struct ConfirmRequest {
    pub title: String,
    pub message: String,
    /// Text on the confirming button, e.g. "Delete"
    pub action_label: String,
    pub on_confirm: Arc<dyn Fn() + Send + Sync>,
}

impl ConfirmRequest {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        action_label: impl Into<String>,
        on_confirm: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            action_label: action_label.into(),
            on_confirm: Arc::new(on_confirm),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Pending,
    Confirmed,
    Cancelled,
}

/// Closing the window or pressing Escape counts as cancel
fn outcome(confirmed: bool, cancelled: bool, escape: bool, open: bool) -> Outcome {
    if confirmed {
        Outcome::Confirmed
    } else if cancelled || escape || !open {
        Outcome::Cancelled
    } else {
        Outcome::Pending
    }
}

pub fn render(ctx: &Context, request: &ConfirmRequest, dialog: &mut DialogState) {
    let mut open = true;
    let mut confirmed = false;
    let mut cancelled = false;

    egui::Window::new(&request.title)
        .open(&mut open)
        .collapsible(false)
        .resizable(false)
        .default_width(350.0)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.label(&request.message);
            ui.add_space(16.0);

            ui.horizontal(|ui| {
                confirmed = ui
                    .add(
                        egui::Button::new(
                            egui::RichText::new(&request.action_label)
                                .color(egui::Color32::WHITE),
                        )
                        .fill(Theme::ERROR),
                    )
                    .clicked();
                cancelled = ui.button("Cancel").clicked();
            });
        });

    let escape = ctx.input(|i| i.key_pressed(Key::Escape));
    match outcome(confirmed, cancelled, escape, open) {
        Outcome::Pending => {}
        Outcome::Confirmed => {
            (request.on_confirm)();
            *dialog = DialogState::None;
        }
        Outcome::Cancelled => *dialog = DialogState::None,
    }
}
