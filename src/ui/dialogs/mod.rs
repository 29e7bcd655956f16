//! Dialog windows

pub mod confirm;
pub mod example_details;

use crate::core::ExampleId;

pub use confirm::ConfirmRequest;

/// Which dialog window is open
#[derive(Default, Clone)]
pub enum DialogState {
    #[default]
    None,
    ExampleDetails(ExampleId),
    Confirm(ConfirmRequest),
}
