//! Reusable UI components

pub mod example_card;
mod score_bar;

pub use example_card::ExampleCard;
pub use score_bar::ScoreBar;
