//! Theme and styling for the UI

use egui::{Color32, FontFamily, FontId, Rounding, Stroke, Style, TextStyle, Visuals};

/// Application color palette
pub struct Theme;

impl Theme {
    // Accent - teal
    pub const PRIMARY: Color32 = Color32::from_rgb(20, 184, 166); // Teal-500
    pub const PRIMARY_LIGHT: Color32 = Color32::from_rgb(94, 234, 212); // Teal-300
    pub const PRIMARY_DARK: Color32 = Color32::from_rgb(15, 118, 110); // Teal-700

    // Feedback
    pub const SUCCESS: Color32 = Color32::from_rgb(34, 197, 94); // Green-500
    pub const WARNING: Color32 = Color32::from_rgb(234, 179, 8); // Yellow-500
    pub const ERROR: Color32 = Color32::from_rgb(239, 68, 68); // Red-500
    pub const INFO: Color32 = Color32::from_rgb(56, 189, 248); // Sky-400

    // Surfaces (dark)
    pub const BG_PRIMARY: Color32 = Color32::from_rgb(15, 18, 24);
    pub const BG_SECONDARY: Color32 = Color32::from_rgb(22, 26, 34); // Cards
    pub const BG_TERTIARY: Color32 = Color32::from_rgb(32, 37, 48); // Code blocks, inputs
    pub const BG_HOVER: Color32 = Color32::from_rgb(42, 48, 62);
    pub const BG_ELEVATED: Color32 = Color32::from_rgb(28, 32, 42); // Windows, toasts

    // Text
    pub const TEXT_PRIMARY: Color32 = Color32::from_rgb(241, 245, 249);
    pub const TEXT_SECONDARY: Color32 = Color32::from_rgb(148, 163, 184);
    pub const TEXT_MUTED: Color32 = Color32::from_rgb(100, 116, 139);

    // Borders
    pub const BORDER: Color32 = Color32::from_rgb(51, 60, 77);
    pub const BORDER_LIGHT: Color32 = Color32::from_rgb(38, 45, 58);

    /// Apply dark theme to egui
    pub fn apply_dark(ctx: &egui::Context) {
        let mut style = (*ctx.style()).clone();
        let mut visuals = Visuals::dark();

        visuals.panel_fill = Self::BG_PRIMARY;
        visuals.window_fill = Self::BG_ELEVATED;
        visuals.extreme_bg_color = Self::BG_PRIMARY;
        visuals.faint_bg_color = Self::BG_TERTIARY;

        visuals.widgets.noninteractive.bg_fill = Self::BG_SECONDARY;
        visuals.widgets.noninteractive.fg_stroke = Stroke::new(1.0, Self::TEXT_PRIMARY);
        visuals.widgets.noninteractive.bg_stroke = Stroke::new(0.5, Self::BORDER_LIGHT);

        visuals.widgets.inactive.bg_fill = Self::BG_TERTIARY;
        visuals.widgets.inactive.fg_stroke = Stroke::new(1.0, Self::TEXT_SECONDARY);
        visuals.widgets.inactive.bg_stroke = Stroke::new(0.5, Self::BORDER);

        visuals.widgets.hovered.bg_fill = Self::BG_HOVER;
        visuals.widgets.hovered.fg_stroke = Stroke::new(1.0, Self::TEXT_PRIMARY);
        visuals.widgets.hovered.bg_stroke = Stroke::new(1.0, Self::PRIMARY.linear_multiply(0.6));

        visuals.widgets.active.bg_fill = Self::PRIMARY;
        visuals.widgets.active.fg_stroke = Stroke::new(1.0, Color32::WHITE);
        visuals.widgets.active.bg_stroke = Stroke::new(1.0, Self::PRIMARY_DARK);

        visuals.selection.bg_fill = Self::PRIMARY.linear_multiply(0.25);
        visuals.selection.stroke = Stroke::new(1.0, Self::PRIMARY);
        visuals.window_stroke = Stroke::new(0.5, Self::BORDER);

        style.visuals = visuals;
        Self::apply_common(&mut style);
        ctx.set_style(style);
    }

    /// Apply light theme to egui
    pub fn apply_light(ctx: &egui::Context) {
        let mut style = (*ctx.style()).clone();
        let mut visuals = Visuals::light();

        let bg_secondary = Color32::from_rgb(241, 245, 249); // Slate-100
        let bg_tertiary = Color32::from_rgb(226, 232, 240); // Slate-200
        let text_primary = Color32::from_rgb(15, 23, 42); // Slate-900
        let border = Color32::from_rgb(203, 213, 225); // Slate-300

        visuals.panel_fill = Color32::from_rgb(248, 250, 252);
        visuals.window_fill = Color32::WHITE;
        visuals.faint_bg_color = bg_secondary;

        visuals.widgets.noninteractive.bg_fill = bg_secondary;
        visuals.widgets.noninteractive.fg_stroke = Stroke::new(1.0, text_primary);
        visuals.widgets.noninteractive.bg_stroke = Stroke::new(0.5, border);
        visuals.widgets.inactive.bg_fill = bg_tertiary;
        visuals.widgets.active.bg_fill = Self::PRIMARY;
        visuals.widgets.active.fg_stroke = Stroke::new(1.0, Color32::WHITE);

        visuals.selection.bg_fill = Self::PRIMARY.linear_multiply(0.15);
        visuals.selection.stroke = Stroke::new(1.0, Self::PRIMARY);
        visuals.window_stroke = Stroke::new(0.5, border);

        style.visuals = visuals;
        Self::apply_common(&mut style);
        ctx.set_style(style);
    }

    /// Text styles, spacing and rounding shared by both themes
    fn apply_common(style: &mut Style) {
        style.text_styles = [
            (TextStyle::Small, FontId::new(12.0, FontFamily::Proportional)),
            (TextStyle::Body, FontId::new(14.0, FontFamily::Proportional)),
            (TextStyle::Button, FontId::new(14.0, FontFamily::Proportional)),
            (TextStyle::Heading, FontId::new(20.0, FontFamily::Proportional)),
            (TextStyle::Monospace, FontId::new(13.0, FontFamily::Monospace)),
        ]
        .into();

        let widgets = &mut style.visuals.widgets;
        for w in [
            &mut widgets.noninteractive,
            &mut widgets.inactive,
            &mut widgets.hovered,
            &mut widgets.active,
            &mut widgets.open,
        ] {
            w.rounding = Rounding::same(6.0);
        }
        style.visuals.window_rounding = Rounding::same(10.0);

        style.spacing.item_spacing = egui::vec2(8.0, 8.0);
        style.spacing.window_margin = egui::Margin::same(16.0);
        style.spacing.button_padding = egui::vec2(14.0, 8.0);
        style.spacing.slider_width = 180.0;
        style.interaction.tooltip_delay = 0.3;
    }

    /// Color for a 0.0 - 1.0 score
    pub fn score_color(score: f64) -> Color32 {
        if score >= 0.75 {
            Self::SUCCESS
        } else if score >= 0.4 {
            Self::WARNING
        } else {
            Self::ERROR
        }
    }
}

/// Icon characters (using Unicode symbols)
pub struct Icons;

impl Icons {
    pub const PLAY: &'static str = "▶";
    pub const GALLERY: &'static str = "▦";
    pub const SETTINGS: &'static str = "⚙";
    pub const INFO: &'static str = "ℹ";
    pub const SUCCESS: &'static str = "✓";
    pub const ERROR: &'static str = "✕";
    pub const TRASH: &'static str = "🗑";
    pub const EXPORT: &'static str = "📤";
    pub const IMPORT: &'static str = "📥";
}
