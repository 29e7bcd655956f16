//! Gallery panel - Past runs as example cards

use egui::Ui;

use crate::core::{AppState, StoredExample};
use crate::ui::app::{Notification, NotificationLevel};
use crate::ui::components::ExampleCard;
use crate::ui::dialogs::DialogState;
use crate::ui::theme::{Icons, Theme};

/// Case-insensitive match against prompt and template
fn matches_query(stored: &StoredExample, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let query = query.to_lowercase();
    stored.example.prompt.to_lowercase().contains(&query)
        || stored.example.template.to_lowercase().contains(&query)
}

pub fn render(
    ui: &mut Ui,
    state: &AppState,
    search_query: &str,
    dialog: &mut DialogState,
    notifications: &mut Vec<Notification>,
) {
    // Clone so the lock is not held while cards run callbacks
    let examples: Vec<StoredExample> = state
        .examples
        .read()
        .map(|all| {
            all.iter()
                .filter(|e| matches_query(e, search_query))
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    ui.horizontal(|ui| {
        ui.label(
            egui::RichText::new(format!("{} runs", examples.len())).color(Theme::TEXT_SECONDARY),
        );

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.button(format!("{} Import Report", Icons::IMPORT)).clicked() {
                import_report(state, notifications);
            }
        });
    });

    ui.add_space(8.0);

    if examples.is_empty() {
        render_empty_state(ui, search_query.is_empty());
        return;
    }

    egui::ScrollArea::vertical().show(ui, |ui| {
        ui.horizontal_wrapped(|ui| {
            for stored in &examples {
                ui.push_id(stored.id.0, |ui| {
                    ExampleCard::show(ui, &stored.example, |_| {
                        *dialog = DialogState::ExampleDetails(stored.id);
                    })
                    .on_hover_text(hover_summary(stored));
                });
            }
        });
    });
}

/// Result count, best score and creation date
fn hover_summary(stored: &StoredExample) -> String {
    let created = stored.created_at.format("%Y-%m-%d %H:%M");
    match stored.example.best() {
        Some(best) => format!(
            "{} results · best {:.3} · {}",
            stored.example.results.len(),
            best.logprob,
            created
        ),
        None => format!("No results · {}", created),
    }
}

fn import_report(state: &AppState, notifications: &mut Vec<Notification>) {
    let Some(path) = rfd::FileDialog::new()
        .add_filter("JSON", &["json"])
        .pick_file()
    else {
        return;
    };

    match state.import_report(&path) {
        Ok(_) => notifications.push(Notification::new(
            format!("Imported {}", path.display()),
            NotificationLevel::Success,
        )),
        Err(e) => {
            tracing::error!("Import failed: {:#}", e);
            notifications.push(Notification::new(
                format!("Import failed: {}", e),
                NotificationLevel::Error,
            ));
        }
    }
}

fn render_empty_state(ui: &mut Ui, no_examples: bool) {
    egui::Frame::none()
        .fill(Theme::BG_SECONDARY)
        .rounding(egui::Rounding::same(8.0))
        .inner_margin(egui::Margin::same(32.0))
        .show(ui, |ui| {
            ui.vertical_centered(|ui| {
                ui.label(egui::RichText::new(Icons::GALLERY).size(48.0));
                ui.add_space(16.0);

                if no_examples {
                    ui.label(
                        egui::RichText::new("No runs yet")
                            .size(16.0)
                            .color(Theme::TEXT_SECONDARY),
                    );
                    ui.add_space(8.0);
                    ui.label(
                        egui::RichText::new("Start a run from New Run or import a saved report")
                            .color(Theme::TEXT_MUTED),
                    );
                } else {
                    ui.label(
                        egui::RichText::new("No runs match your search")
                            .size(16.0)
                            .color(Theme::TEXT_SECONDARY),
                    );
                }
            });
        });
}
