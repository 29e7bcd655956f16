//! Core module - Ranking engine, data model and application state

mod app_state;
pub mod config;
pub mod error;
pub mod evaluation;
mod example;
pub mod ranker;
pub mod settings;

pub use app_state::{AppState, RunEvent, RunId};
pub use config::RankerConfig;
pub use example::{Example, ExampleId, RankedOutput, RunReport, StoredExample};
pub use ranker::LogProbRanker;
pub use settings::Settings;
