//! Main content panels

pub mod gallery;
pub mod new_run;
pub mod settings;
