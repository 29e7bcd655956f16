//! Example details dialog - Ranked results of one gallery entry

use egui::Context;

use crate::core::settings::default_data_directory;
use crate::core::{AppState, ExampleId, RankedOutput};
use crate::ui::app::{Notification, NotificationLevel};
use crate::ui::components::ScoreBar;
use crate::ui::dialogs::{ConfirmRequest, DialogState};
use crate::ui::theme::{Icons, Theme};

pub fn render(
    ctx: &Context,
    id: ExampleId,
    state: &AppState,
    dialog: &mut DialogState,
    notifications: &mut Vec<Notification>,
) {
    let Some(stored) = state.example(id) else {
        *dialog = DialogState::None;
        return;
    };
    let example = &stored.example;
    let mut open = true;

    egui::Window::new("Run Details")
        .open(&mut open)
        .collapsible(false)
        .resizable(true)
        .default_width(560.0)
        .default_height(520.0)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.label(egui::RichText::new(&example.prompt).size(18.0).strong());
            ui.label(
                egui::RichText::new(format!(
                    "{} of {} variants ranked · {}",
                    example.results.len(),
                    example.variants,
                    stored.created_at.format("%Y-%m-%d %H:%M")
                ))
                .small()
                .color(Theme::TEXT_MUTED),
            );

            ui.add_space(8.0);

            ui.horizontal(|ui| {
                if ui.button(format!("{} Export", Icons::EXPORT)).clicked() {
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter("JSON", &["json"])
                        .set_directory(default_data_directory())
                        .set_file_name("run.json")
                        .save_file()
                    {
                        match state.export_report(id, &path) {
                            Ok(()) => notifications.push(Notification::new(
                                format!("Saved {}", path.display()),
                                NotificationLevel::Success,
                            )),
                            Err(e) => notifications.push(Notification::new(
                                format!("Export failed: {}", e),
                                NotificationLevel::Error,
                            )),
                        }
                    }
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui
                        .button(egui::RichText::new(format!("{} Delete", Icons::TRASH)).color(Theme::ERROR))
                        .clicked()
                    {
                        let state = state.clone();
                        *dialog = DialogState::Confirm(ConfirmRequest::new(
                            "Delete Run",
                            "Remove this run from the gallery?",
                            "Delete",
                            move || {
                                if let Err(e) = state.delete_example(id) {
                                    tracing::error!("Failed to delete example: {}", e);
                                }
                            },
                        ));
                    }
                });
            });

            ui.separator();

            egui::ScrollArea::vertical().show(ui, |ui| {
                if example.results.is_empty() {
                    ui.label(egui::RichText::new("No results recorded").color(Theme::TEXT_MUTED));
                }
                for (rank, result) in example.results.iter().enumerate() {
                    ui.push_id(rank, |ui| render_result(ui, rank, result));
                    ui.add_space(6.0);
                }

                ui.collapsing("Criteria template", |ui| {
                    ui.label(egui::RichText::new(&example.template).monospace());
                });
            });
        });

    if !open {
        *dialog = DialogState::None;
    }
}

fn render_result(ui: &mut egui::Ui, rank: usize, result: &RankedOutput) {
    egui::Frame::none()
        .fill(Theme::BG_TERTIARY)
        .rounding(egui::Rounding::same(6.0))
        .inner_margin(egui::Margin::same(10.0))
        .show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new(format!("#{}", rank + 1)).strong());
                ui.label(
                    egui::RichText::new(format!("variant {}", result.index + 1))
                        .small()
                        .color(Theme::TEXT_MUTED),
                );
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(
                        egui::RichText::new(format!("{:.3}", result.logprob))
                            .color(Theme::score_color(result.logprob)),
                    );
                    ScoreBar::mini(ui, result.logprob);
                });
            });

            ui.label(&result.output);

            if let Some(scores) = &result.attribute_scores {
                ui.add_space(4.0);
                ui.horizontal_wrapped(|ui| {
                    for attr in scores {
                        ScoreBar::horizontal(ui, attr.score, &attr.name, 150.0)
                            .on_hover_text(if attr.explanation.is_empty() {
                                attr.name.as_str()
                            } else {
                                attr.explanation.as_str()
                            });
                    }
                });
            }

            if let Some(raw) = &result.raw_evaluation {
                ui.collapsing("Raw evaluation", |ui| {
                    ui.label(egui::RichText::new(raw).monospace().small());
                });
            }
        });
}
