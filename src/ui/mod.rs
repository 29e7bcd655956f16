//! User interface module - egui gallery of ranked runs

mod app;
mod components;
mod dialogs;
mod panels;
mod theme;

pub use app::RankerApp;
