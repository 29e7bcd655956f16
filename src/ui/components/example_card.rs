//! Example card component
//!
//! Renders one [`Example`] as a clickable card: the prompt as a heading, the
//! variant count, and the template in a preformatted block. Results are not
//! shown here; the details window lists them.

use egui::{Response, Ui};

use crate::core::Example;
use crate::ui::theme::Theme;

/// Fixed card width so cards line up in a wrapped grid
pub const CARD_WIDTH: f32 = 280.0;

/// Max height of the template block before it scrolls
const TEMPLATE_MAX_HEIGHT: f32 = 140.0;

pub struct ExampleCard;

impl ExampleCard {
    /// Text line showing the number of requested variants
    pub fn variants_label(example: &Example) -> String {
        format!("VARIANTS: {}", example.variants)
    }

    /// Render the card. `on_click` runs once per click with the example
    /// that was passed in.
    pub fn show(ui: &mut Ui, example: &Example, mut on_click: impl FnMut(&Example)) -> Response {
        let frame = egui::Frame::none()
            .fill(Theme::BG_SECONDARY)
            .rounding(egui::Rounding::same(8.0))
            .stroke(egui::Stroke::new(1.0, Theme::BORDER_LIGHT))
            .inner_margin(egui::Margin::same(12.0))
            .show(ui, |ui| {
                ui.set_width(CARD_WIDTH);

                ui.add(
                    egui::Label::new(
                        egui::RichText::new(&example.prompt)
                            .size(16.0)
                            .strong()
                            .color(Theme::PRIMARY_LIGHT),
                    )
                    .selectable(false),
                );

                ui.add_space(4.0);

                ui.add(
                    egui::Label::new(
                        egui::RichText::new(Self::variants_label(example))
                            .small()
                            .color(Theme::TEXT_MUTED),
                    )
                    .selectable(false),
                );

                ui.add_space(8.0);

                egui::Frame::none()
                    .fill(Theme::BG_TERTIARY)
                    .rounding(egui::Rounding::same(6.0))
                    .inner_margin(egui::Margin::same(8.0))
                    .show(ui, |ui| {
                        ui.set_width(ui.available_width());
                        ui.push_id("template", |ui| {
                            egui::ScrollArea::both()
                                .max_height(TEMPLATE_MAX_HEIGHT)
                                .drag_to_scroll(false)
                                .auto_shrink([false, true])
                                .show(ui, |ui| {
                                    ui.add(
                                        egui::Label::new(
                                            egui::RichText::new(&example.template)
                                                .monospace()
                                                .color(Theme::TEXT_SECONDARY),
                                        )
                                        .wrap_mode(egui::TextWrapMode::Extend)
                                        .selectable(false),
                                    );
                                });
                        });
                    });
            });

        let response = frame.response.interact(egui::Sense::click());

        if response.hovered() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
        }

        if response.clicked() {
            on_click(example);
        }

        response
    }
}
