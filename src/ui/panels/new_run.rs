//! New run panel - Edit a prompt and ranker settings, then rank in the background

use std::collections::BTreeMap;

use egui::{Context, Ui};

use crate::core::evaluation::extract_template_attributes;
use crate::core::{AppState, RankerConfig, RunId};
use crate::ui::app::{Notification, NotificationLevel};
use crate::ui::components::ScoreBar;
use crate::ui::theme::{Icons, Theme};

/// Form state kept between frames
#[derive(Debug, Clone)]
pub struct NewRunForm {
    pub prompt: String,
    pub config: RankerConfig,
}

impl NewRunForm {
    pub fn new(config: RankerConfig) -> Self {
        Self {
            prompt: String::new(),
            config,
        }
    }

    /// Why the form cannot be submitted, if anything
    pub fn problem(&self) -> Option<String> {
        if self.prompt.trim().is_empty() {
            return Some("Enter a prompt".to_string());
        }
        if let Err(e) = self.config.validate() {
            return Some(e.to_string());
        }
        extract_template_attributes(&self.config.template)
            .err()
            .map(|e| e.to_string())
    }
}

/// Scores reported so far for each run in flight
pub type RunProgress = BTreeMap<RunId, Vec<(usize, f64)>>;

pub fn render(
    ui: &mut Ui,
    ctx: &Context,
    state: &AppState,
    form: &mut NewRunForm,
    progress: &RunProgress,
    notifications: &mut Vec<Notification>,
) {
    egui::ScrollArea::vertical().show(ui, |ui| {
        ui.label(egui::RichText::new("Prompt").strong());
        ui.add(
            egui::TextEdit::multiline(&mut form.prompt)
                .hint_text("Write a haiku about cats...")
                .desired_rows(4)
                .desired_width(f32::INFINITY),
        );

        ui.add_space(12.0);

        egui::Grid::new("run_config")
            .num_columns(2)
            .spacing([16.0, 8.0])
            .show(ui, |ui| {
                ui.label("Variants");
                ui.add(egui::DragValue::new(&mut form.config.num_variants).range(1..=50));
                ui.end_row();

                ui.label("Concurrency");
                ui.add(egui::DragValue::new(&mut form.config.thread_count).range(1..=16));
                ui.end_row();

                ui.label("Temperature");
                ui.add(egui::Slider::new(&mut form.config.temperature, 0.0..=2.0));
                ui.end_row();

                ui.label("Top p");
                ui.add(egui::Slider::new(&mut form.config.top_p, 0.0..=1.0));
                ui.end_row();

                ui.label("Max tokens");
                ui.add(egui::DragValue::new(&mut form.config.max_tokens).range(1..=32000));
                ui.end_row();
            });

        ui.add_space(12.0);

        ui.label(egui::RichText::new("Criteria template").strong());
        ui.label(
            egui::RichText::new("Mark each criterion with LOGPROB_TRUE")
                .small()
                .color(Theme::TEXT_MUTED),
        );
        ui.add(
            egui::TextEdit::multiline(&mut form.config.template)
                .code_editor()
                .desired_rows(6)
                .desired_width(f32::INFINITY),
        );

        ui.collapsing("Prompts", |ui| {
            ui.label("System prompt");
            ui.add(
                egui::TextEdit::multiline(&mut form.config.system_prompt)
                    .desired_rows(2)
                    .desired_width(f32::INFINITY),
            );
            ui.label("Evaluation prompt");
            ui.add(
                egui::TextEdit::multiline(&mut form.config.evaluation_prompt)
                    .desired_rows(3)
                    .desired_width(f32::INFINITY),
            );
        });

        ui.add_space(12.0);

        let problem = form.problem();
        ui.horizontal(|ui| {
            let run_btn = egui::Button::new(
                egui::RichText::new(format!("{} Rank", Icons::PLAY)).color(egui::Color32::WHITE),
            )
            .fill(Theme::PRIMARY)
            .min_size(egui::vec2(110.0, 34.0));

            if ui.add_enabled(problem.is_none(), run_btn).clicked() {
                let repaint = ctx.clone();
                match state.start_run(form.prompt.clone(), form.config.clone(), move || {
                    repaint.request_repaint()
                }) {
                    Ok(run) => notifications.push(Notification::new(
                        format!("Run {} started", run),
                        NotificationLevel::Info,
                    )),
                    Err(e) => notifications.push(Notification::new(
                        format!("Could not start run: {}", e),
                        NotificationLevel::Error,
                    )),
                }
            }

            if let Some(problem) = &problem {
                ui.label(egui::RichText::new(problem).small().color(Theme::WARNING));
            }
        });

        if !progress.is_empty() {
            ui.add_space(16.0);
            ui.label(egui::RichText::new("In progress").strong());
            for (run, scores) in progress {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(format!("Run {}: {} variants scored", run, scores.len()));
                    for (_, score) in scores {
                        ScoreBar::mini(ui, *score);
                    }
                });
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_prompt_blocks_submission() {
        let form = NewRunForm::new(RankerConfig::default());
        assert_eq!(form.problem().as_deref(), Some("Enter a prompt"));
    }

    #[test]
    fn template_without_criteria_blocks_submission() {
        let mut form = NewRunForm::new(RankerConfig::default());
        form.prompt = "Cats".into();
        form.config.template = "{}".into();
        assert!(form.problem().unwrap().contains("template"));
    }

    #[test]
    fn valid_form_has_no_problem() {
        let mut form = NewRunForm::new(RankerConfig::default());
        form.prompt = "Cats".into();
        assert!(form.problem().is_none());
    }
}
