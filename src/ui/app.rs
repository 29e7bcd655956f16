//! Main application UI

use std::time::{Duration, Instant};

use egui::{CentralPanel, Context, SidePanel, TopBottomPanel};
use tracing::{error, info};

use super::dialogs::{self, DialogState};
use super::panels::{self, new_run::NewRunForm, new_run::RunProgress};
use super::theme::{Icons, Theme};
use crate::core::{AppState, RunEvent, Settings};

/// How long a notification stays on screen
const NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Active view/tab in the main panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveView {
    #[default]
    Gallery,
    NewRun,
    Settings,
}

impl ActiveView {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Gallery => "Gallery",
            Self::NewRun => "New Run",
            Self::Settings => "Settings",
        }
    }
}

/// Main application struct
pub struct RankerApp {
    /// Application state
    state: AppState,
    /// Current active view
    active_view: ActiveView,
    /// Dialog state
    dialog: DialogState,
    /// Search filter text
    search_query: String,
    /// New run form being edited
    new_run: NewRunForm,
    /// Scores received from runs in flight
    progress: RunProgress,
    /// Unsaved settings edits
    settings_draft: Settings,
    /// Notifications queue
    notifications: Vec<Notification>,
    /// First frame flag
    first_frame: bool,
}

/// Notification message
#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    pub created_at: Instant,
}

impl Notification {
    pub fn new(message: impl Into<String>, level: NotificationLevel) -> Self {
        Self {
            message: message.into(),
            level,
            created_at: Instant::now(),
        }
    }

    fn expired(&self) -> bool {
        self.created_at.elapsed() >= NOTIFICATION_TIMEOUT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

impl RankerApp {
    pub fn new(cc: &eframe::CreationContext<'_>, state: AppState) -> Self {
        let settings = state.settings();
        panels::settings::apply_theme(&cc.egui_ctx, settings.theme);

        Self {
            new_run: NewRunForm::new(settings.ranker.clone()),
            settings_draft: settings,
            state,
            active_view: ActiveView::Gallery,
            dialog: DialogState::None,
            search_query: String::new(),
            progress: RunProgress::new(),
            notifications: Vec::new(),
            first_frame: true,
        }
    }

    /// Add a notification
    pub fn notify(&mut self, message: impl Into<String>, level: NotificationLevel) {
        self.notifications.push(Notification::new(message, level));
    }

    /// Fold background run events into progress and notifications
    fn handle_run_events(&mut self) {
        for event in self.state.poll_events() {
            match event {
                RunEvent::Progress { run, index, score } => {
                    self.progress.entry(run).or_default().push((index, score));
                }
                RunEvent::Finished { run, id } => {
                    self.progress.remove(&run);
                    let prompt = self
                        .state
                        .example(id)
                        .map(|e| e.example.prompt)
                        .unwrap_or_default();
                    self.notify(
                        format!("Run {} finished: {}", run, prompt),
                        NotificationLevel::Success,
                    );
                }
                RunEvent::Failed { run, message } => {
                    self.progress.remove(&run);
                    self.notify(
                        format!("Run {} failed: {}", run, message),
                        NotificationLevel::Error,
                    );
                }
            }
        }
    }

    /// Render the sidebar navigation
    fn render_sidebar(&mut self, ctx: &Context) {
        SidePanel::left("sidebar")
            .resizable(false)
            .default_width(220.0)
            .frame(
                egui::Frame::none()
                    .fill(Theme::BG_SECONDARY)
                    .stroke(egui::Stroke::new(1.0, Theme::BORDER_LIGHT)),
            )
            .show(ctx, |ui| {
                ui.add_space(20.0);

                ui.horizontal(|ui| {
                    ui.add_space(16.0);
                    ui.label(egui::RichText::new("◆").size(24.0).color(Theme::PRIMARY));
                    ui.add_space(8.0);
                    ui.label(
                        egui::RichText::new("LogProb Ranker")
                            .size(18.0)
                            .strong()
                            .color(Theme::TEXT_PRIMARY),
                    );
                });

                ui.add_space(24.0);

                let views = [
                    (ActiveView::Gallery, Icons::GALLERY),
                    (ActiveView::NewRun, Icons::PLAY),
                    (ActiveView::Settings, Icons::SETTINGS),
                ];

                ui.add_space(4.0);
                for (view, icon) in views {
                    let selected = self.active_view == view;

                    let bg_color = if selected {
                        Theme::PRIMARY.linear_multiply(0.15)
                    } else {
                        egui::Color32::TRANSPARENT
                    };

                    let text_color = if selected {
                        Theme::PRIMARY_LIGHT
                    } else {
                        Theme::TEXT_SECONDARY
                    };

                    let response = egui::Frame::none()
                        .fill(bg_color)
                        .rounding(egui::Rounding::same(8.0))
                        .inner_margin(egui::Margin::symmetric(16.0, 12.0))
                        .show(ui, |ui| {
                            ui.set_width(ui.available_width() - 16.0);
                            ui.horizontal(|ui| {
                                ui.label(egui::RichText::new(icon).size(16.0).color(text_color));
                                ui.add_space(12.0);
                                ui.label(
                                    egui::RichText::new(view.label())
                                        .size(14.0)
                                        .color(text_color),
                                );
                            });
                        })
                        .response
                        .interact(egui::Sense::click());

                    if response.clicked() {
                        self.active_view = view;
                    }
                    if response.hovered() && !selected {
                        ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
                    }

                    ui.add_space(2.0);
                }

                ui.add_space(20.0);

                ui.horizontal(|ui| {
                    ui.add_space(16.0);
                    ui.label(
                        egui::RichText::new("QUICK STATS")
                            .small()
                            .color(Theme::TEXT_MUTED),
                    );
                });
                ui.add_space(12.0);

                let examples = self.state.example_count();
                let running = self.state.active_run_count();

                egui::Frame::none()
                    .fill(Theme::BG_TERTIARY.linear_multiply(0.5))
                    .rounding(egui::Rounding::same(8.0))
                    .inner_margin(egui::Margin::same(12.0))
                    .outer_margin(egui::Margin::symmetric(16.0, 0.0))
                    .show(ui, |ui| {
                        ui.horizontal(|ui| {
                            for (value, label, color) in [
                                (examples, "Examples", Theme::INFO),
                                (running, "Running", Theme::SUCCESS),
                            ] {
                                ui.vertical(|ui| {
                                    ui.label(
                                        egui::RichText::new(value.to_string())
                                            .size(20.0)
                                            .strong()
                                            .color(color),
                                    );
                                    ui.label(
                                        egui::RichText::new(label)
                                            .small()
                                            .color(Theme::TEXT_MUTED),
                                    );
                                });
                                ui.add_space(24.0);
                            }
                        });
                    });

                ui.with_layout(egui::Layout::bottom_up(egui::Align::LEFT), |ui| {
                    ui.add_space(16.0);
                    ui.horizontal(|ui| {
                        ui.add_space(16.0);
                        ui.label(
                            egui::RichText::new(format!("v{}", crate::APP_VERSION))
                                .small()
                                .color(Theme::TEXT_MUTED),
                        );
                    });
                    ui.add_space(8.0);
                });
            });
    }

    /// Render the top bar with actions
    fn render_top_bar(&mut self, ctx: &Context) {
        TopBottomPanel::top("top_bar")
            .frame(
                egui::Frame::none()
                    .fill(Theme::BG_PRIMARY)
                    .stroke(egui::Stroke::new(1.0, Theme::BORDER_LIGHT))
                    .inner_margin(egui::Margin::symmetric(20.0, 12.0)),
            )
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        egui::RichText::new(self.active_view.label())
                            .size(24.0)
                            .strong()
                            .color(Theme::TEXT_PRIMARY),
                    );

                    ui.add_space(24.0);

                    if self.active_view == ActiveView::Gallery {
                        egui::Frame::none()
                            .fill(Theme::BG_SECONDARY)
                            .rounding(egui::Rounding::same(8.0))
                            .stroke(egui::Stroke::new(1.0, Theme::BORDER_LIGHT))
                            .inner_margin(egui::Margin::symmetric(12.0, 8.0))
                            .show(ui, |ui| {
                                ui.horizontal(|ui| {
                                    ui.label(
                                        egui::RichText::new("⌕")
                                            .size(14.0)
                                            .color(Theme::TEXT_MUTED),
                                    );
                                    ui.add_space(8.0);
                                    ui.add(
                                        egui::TextEdit::singleline(&mut self.search_query)
                                            .hint_text("Search examples...")
                                            .desired_width(180.0)
                                            .frame(false),
                                    );
                                });
                            });
                    }

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if self.active_view != ActiveView::NewRun {
                            let new_btn = egui::Button::new(
                                egui::RichText::new("+ New Run").color(egui::Color32::WHITE),
                            )
                            .fill(Theme::PRIMARY)
                            .rounding(egui::Rounding::same(8.0))
                            .min_size(egui::vec2(110.0, 36.0));

                            if ui.add(new_btn).clicked() {
                                self.active_view = ActiveView::NewRun;
                            }
                        }
                    });
                });
            });
    }

    /// Render the main content area
    fn render_main_content(&mut self, ctx: &Context) {
        CentralPanel::default().show(ctx, |ui| match self.active_view {
            ActiveView::Gallery => {
                panels::gallery::render(
                    ui,
                    &self.state,
                    &self.search_query,
                    &mut self.dialog,
                    &mut self.notifications,
                );
            }
            ActiveView::NewRun => {
                panels::new_run::render(
                    ui,
                    ctx,
                    &self.state,
                    &mut self.new_run,
                    &self.progress,
                    &mut self.notifications,
                );
            }
            ActiveView::Settings => {
                panels::settings::render(
                    ui,
                    ctx,
                    &self.state,
                    &mut self.settings_draft,
                    &mut self.notifications,
                );
            }
        });
    }

    /// Render notifications
    fn render_notifications(&mut self, ctx: &Context) {
        if self.notifications.is_empty() {
            return;
        }

        egui::Area::new(egui::Id::new("notifications"))
            .fixed_pos(egui::pos2(ctx.screen_rect().width() - 360.0, 80.0))
            .show(ctx, |ui| {
                for notification in &self.notifications {
                    let (icon, accent) = match notification.level {
                        NotificationLevel::Info => (Icons::INFO, Theme::INFO),
                        NotificationLevel::Success => (Icons::SUCCESS, Theme::SUCCESS),
                        NotificationLevel::Error => (Icons::ERROR, Theme::ERROR),
                    };

                    egui::Frame::none()
                        .fill(Theme::BG_ELEVATED)
                        .rounding(egui::Rounding::same(10.0))
                        .stroke(egui::Stroke::new(1.0, accent.linear_multiply(0.5)))
                        .shadow(egui::Shadow {
                            offset: egui::vec2(0.0, 4.0),
                            blur: 12.0,
                            spread: 2.0,
                            color: egui::Color32::from_black_alpha(60),
                        })
                        .inner_margin(egui::Margin::same(16.0))
                        .show(ui, |ui| {
                            ui.set_width(320.0);
                            ui.horizontal(|ui| {
                                egui::Frame::none()
                                    .fill(accent.linear_multiply(0.2))
                                    .rounding(egui::Rounding::same(6.0))
                                    .inner_margin(egui::Margin::same(6.0))
                                    .show(ui, |ui| {
                                        ui.label(
                                            egui::RichText::new(icon).size(14.0).color(accent),
                                        );
                                    });
                                ui.add_space(12.0);
                                ui.add(
                                    egui::Label::new(
                                        egui::RichText::new(&notification.message)
                                            .size(13.0)
                                            .color(Theme::TEXT_PRIMARY),
                                    )
                                    .wrap(),
                                );
                            });
                        });

                    ui.add_space(10.0);
                }
            });
    }

    /// Render dialogs
    fn render_dialogs(&mut self, ctx: &Context) {
        match &self.dialog {
            DialogState::None => {}
            DialogState::ExampleDetails(id) => {
                let id = *id;
                dialogs::example_details::render(
                    ctx,
                    id,
                    &self.state,
                    &mut self.dialog,
                    &mut self.notifications,
                );
            }
            DialogState::Confirm(request) => {
                let request = request.clone();
                dialogs::confirm::render(ctx, &request, &mut self.dialog);
            }
        }
    }
}

impl eframe::App for RankerApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        if self.first_frame {
            self.first_frame = false;
            info!("First frame rendered");
        }

        self.handle_run_events();
        self.notifications.retain(|n| !n.expired());

        // Keep ticking while toasts need to expire or runs are in flight
        if !self.notifications.is_empty() || self.state.active_run_count() > 0 {
            ctx.request_repaint_after(Duration::from_millis(250));
        }

        self.render_sidebar(ctx);
        self.render_top_bar(ctx);
        self.render_main_content(ctx);
        self.render_notifications(ctx);
        self.render_dialogs(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Err(e) = self.state.save_settings() {
            error!("Failed to save settings: {}", e);
        }

        info!("Application exiting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_notification_is_not_expired() {
        let n = Notification::new("hello", NotificationLevel::Info);
        assert_eq!(n.message, "hello");
        assert!(!n.expired());
    }

    #[test]
    fn old_notification_expires() {
        let mut n = Notification::new("old", NotificationLevel::Error);
        n.created_at = Instant::now() - NOTIFICATION_TIMEOUT - Duration::from_millis(1);
        assert!(n.expired());
    }

    #[test]
    fn gallery_is_the_default_view() {
        assert_eq!(ActiveView::default(), ActiveView::Gallery);
        assert_eq!(ActiveView::NewRun.label(), "New Run");
    }
}
