//! Settings panel

use egui::{Color32, Context, Ui};

use crate::core::settings::Theme as SettingsTheme;
use crate::core::{AppState, Settings};
use crate::llm::Provider;
use crate::ui::app::{Notification, NotificationLevel};
use crate::ui::theme::Theme;

/// Helper to render a styled section header
fn section_header(ui: &mut Ui, title: &str) {
    ui.add_space(8.0);
    ui.label(
        egui::RichText::new(title)
            .size(17.0)
            .strong()
            .color(Theme::PRIMARY_LIGHT),
    );
    ui.add_space(8.0);
}

/// Helper to render a setting row with label, description, and custom widget
fn setting_row(ui: &mut Ui, label: &str, description: &str, add_widget: impl FnOnce(&mut Ui)) {
    ui.horizontal(|ui| {
        ui.vertical(|ui| {
            ui.label(egui::RichText::new(label).size(14.0).color(Color32::WHITE));
            ui.label(
                egui::RichText::new(description)
                    .size(12.0)
                    .color(Theme::TEXT_SECONDARY),
            );
        });
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), add_widget);
    });
    ui.add_space(10.0);
}

/// Apply the configured theme to the context
pub fn apply_theme(ctx: &Context, theme: SettingsTheme) {
    match theme {
        SettingsTheme::Dark => Theme::apply_dark(ctx),
        SettingsTheme::Light => Theme::apply_light(ctx),
    }
}

/// `draft` holds unsaved edits across frames
pub fn render(
    ui: &mut Ui,
    ctx: &Context,
    state: &AppState,
    draft: &mut Settings,
    notifications: &mut Vec<Notification>,
) {
    egui::ScrollArea::vertical().show(ui, |ui| {
        ui.set_max_width(640.0);

        section_header(ui, "Model");

        setting_row(ui, "Provider", "Chat completion API to call", |ui| {
            egui::ComboBox::from_id_salt("provider")
                .selected_text(draft.provider.label())
                .show_ui(ui, |ui| {
                    for provider in Provider::all() {
                        ui.selectable_value(&mut draft.provider, *provider, provider.label());
                    }
                });
        });

        setting_row(
            ui,
            "Model",
            "OpenRouter short names like gpt-4 are expanded",
            |ui| {
                ui.add(egui::TextEdit::singleline(&mut draft.model).desired_width(220.0));
            },
        );

        setting_row(ui, "API base URL", "Leave empty for the provider default", |ui| {
            let mut base = draft.api_base.clone().unwrap_or_default();
            ui.add(
                egui::TextEdit::singleline(&mut base)
                    .hint_text(draft.provider.base_url())
                    .desired_width(220.0),
            );
            draft.api_base = if base.trim().is_empty() { None } else { Some(base) };
        });

        setting_row(ui, "Request timeout", "Seconds before a request is abandoned", |ui| {
            ui.add(
                egui::DragValue::new(&mut draft.request_timeout_secs)
                    .range(5..=600)
                    .suffix(" s"),
            );
        });

        ui.label(
            egui::RichText::new(format!(
                "API key is read from {}",
                draft.provider.api_key_env()
            ))
            .small()
            .color(Theme::TEXT_MUTED),
        );

        section_header(ui, "Run Defaults");

        setting_row(ui, "Variants", "Outputs generated per run", |ui| {
            ui.add(egui::DragValue::new(&mut draft.ranker.num_variants).range(1..=50));
        });

        setting_row(ui, "Concurrency", "Variants evaluated at the same time", |ui| {
            ui.add(egui::DragValue::new(&mut draft.ranker.thread_count).range(1..=16));
        });

        setting_row(ui, "Temperature", "Sampling temperature for generation", |ui| {
            ui.add(egui::Slider::new(&mut draft.ranker.temperature, 0.0..=2.0));
        });

        section_header(ui, "Appearance");

        setting_row(ui, "Theme", "Color scheme", |ui| {
            egui::ComboBox::from_id_salt("theme")
                .selected_text(draft.theme.label())
                .show_ui(ui, |ui| {
                    for theme in SettingsTheme::all() {
                        ui.selectable_value(&mut draft.theme, *theme, theme.label());
                    }
                });
        });

        ui.add_space(16.0);

        ui.horizontal(|ui| {
            let changed = *draft != state.settings();

            if ui
                .add_enabled(changed, egui::Button::new("Save").fill(Theme::PRIMARY))
                .clicked()
            {
                match state.update_settings(draft.clone()) {
                    Ok(()) => {
                        *draft = state.settings();
                        apply_theme(ctx, draft.theme);
                        notifications.push(Notification::new(
                            "Settings saved",
                            NotificationLevel::Success,
                        ));
                    }
                    Err(e) => notifications.push(Notification::new(
                        format!("Failed to save settings: {}", e),
                        NotificationLevel::Error,
                    )),
                }
            }

            if ui.add_enabled(changed, egui::Button::new("Revert")).clicked() {
                *draft = state.settings();
            }

            if ui.button("Restore Defaults").clicked() {
                *draft = Settings::default();
            }
        });
    });
}
