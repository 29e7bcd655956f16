//! Score bar component

use egui::{Rect, Response, Rounding, Ui, Vec2};

use crate::ui::theme::Theme;

pub struct ScoreBar;

impl ScoreBar {
    /// Render a horizontal bar for a 0.0 - 1.0 score with a label
    pub fn horizontal(ui: &mut Ui, score: f64, label: &str, width: f32) -> Response {
        let height = 20.0;
        let (rect, response) =
            ui.allocate_exact_size(Vec2::new(width, height), egui::Sense::hover());

        if ui.is_rect_visible(rect) {
            let painter = ui.painter();
            let clamped = score.clamp(0.0, 1.0);

            painter.rect_filled(rect, Rounding::same(5.0), Theme::BG_TERTIARY);
            painter.rect_stroke(
                rect,
                Rounding::same(5.0),
                egui::Stroke::new(1.0, Theme::BORDER_LIGHT),
            );

            let fill_width = rect.width() * clamped as f32;
            if fill_width > 0.0 {
                let fill_rect = Rect::from_min_size(rect.min, Vec2::new(fill_width, height));
                painter.rect_filled(
                    fill_rect,
                    Rounding::same(5.0),
                    Theme::score_color(clamped).linear_multiply(0.8),
                );
            }

            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                format!("{}: {:.0}%", label, clamped * 100.0),
                egui::FontId::proportional(11.0),
                Theme::TEXT_PRIMARY,
            );
        }

        response
    }

    /// Render a small inline bar without text
    pub fn mini(ui: &mut Ui, score: f64) -> Response {
        let (rect, response) = ui.allocate_exact_size(Vec2::new(48.0, 8.0), egui::Sense::hover());

        if ui.is_rect_visible(rect) {
            let painter = ui.painter();
            let clamped = score.clamp(0.0, 1.0);

            painter.rect_filled(rect, Rounding::same(3.0), Theme::BG_TERTIARY);

            let fill_width = rect.width() * clamped as f32;
            if fill_width > 0.0 {
                let fill_rect = Rect::from_min_size(rect.min, Vec2::new(fill_width, rect.height()));
                painter.rect_filled(fill_rect, Rounding::same(3.0), Theme::score_color(clamped));
            }
        }

        response.on_hover_text(format!("{:.3}", score))
    }
}
