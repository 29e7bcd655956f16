//! Application state - Central state management for the gallery and background runs

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use super::config::RankerConfig;
use super::example::{Example, ExampleId, RunReport, StoredExample};
use super::ranker::LogProbRanker;
use super::settings::Settings;
use crate::llm::{ChatBackend, OpenAiClient};
use crate::persistence::{report, Database};

/// Identifier for a ranking run started from the UI
pub type RunId = u64;

/// Progress reported by background runs
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// One variant finished evaluation
    Progress { run: RunId, index: usize, score: f64 },
    /// Run finished and was added to the gallery
    Finished { run: RunId, id: ExampleId },
    /// Run failed as a whole
    Failed { run: RunId, message: String },
}

/// Central application state
#[derive(Clone)]
pub struct AppState {
    /// Application settings
    pub settings: Arc<RwLock<Settings>>,
    /// Database connection
    pub database: Arc<Database>,
    /// Gallery entries, newest first
    pub examples: Arc<RwLock<Vec<StoredExample>>>,
    /// Runs still in flight
    pub active_runs: Arc<RwLock<Vec<RunId>>>,
    runtime: Arc<tokio::runtime::Runtime>,
    events_tx: Sender<RunEvent>,
    events_rx: Arc<Mutex<Receiver<RunEvent>>>,
    next_run: Arc<AtomicU64>,
}

impl AppState {
    /// Create a new application state
    pub fn new(database: Database) -> Result<Self> {
        // Load settings from database
        let settings = database.load_settings()?.unwrap_or_default();
        let examples = database.load_examples()?;
        info!("Loaded {} examples", examples.len());

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;
        let (events_tx, events_rx) = mpsc::channel();

        Ok(Self {
            settings: Arc::new(RwLock::new(settings)),
            database: Arc::new(database),
            examples: Arc::new(RwLock::new(examples)),
            active_runs: Arc::new(RwLock::new(Vec::new())),
            runtime: Arc::new(runtime),
            events_tx,
            events_rx: Arc::new(Mutex::new(events_rx)),
            next_run: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Snapshot of the current settings
    pub fn settings(&self) -> Settings {
        self.settings
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Replace settings and persist them
    pub fn update_settings(&self, mut settings: Settings) -> Result<()> {
        settings.validate();
        self.database.save_settings(&settings)?;
        *self
            .settings
            .write()
            .map_err(|e| anyhow::anyhow!("Settings lock poisoned: {}", e))? = settings;
        Ok(())
    }

    /// Save settings to database
    pub fn save_settings(&self) -> Result<()> {
        self.database.save_settings(&self.settings())
    }

    pub fn example_count(&self) -> usize {
        self.examples.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn active_run_count(&self) -> usize {
        self.active_runs.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Look up a gallery entry
    pub fn example(&self, id: ExampleId) -> Option<StoredExample> {
        self.examples
            .read()
            .ok()?
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    /// Store an example and put it at the front of the gallery
    pub fn add_example(&self, example: Example) -> Result<ExampleId> {
        store_example(&self.database, &self.examples, example)
    }

    /// Remove an example from the gallery and the database
    pub fn delete_example(&self, id: ExampleId) -> Result<()> {
        self.database.delete_example(id)?;
        self.examples
            .write()
            .map_err(|e| anyhow::anyhow!("Examples lock poisoned: {}", e))?
            .retain(|e| e.id != id);
        info!("Example {} deleted", id);
        Ok(())
    }

    /// Import a report file written by `rank --output`
    pub fn import_report(&self, path: &Path) -> Result<ExampleId> {
        let report = report::load_report(path)
            .with_context(|| format!("Failed to read report {:?}", path))?;
        self.add_example(report.into())
    }

    /// Export a gallery entry as a report file
    pub fn export_report(&self, id: ExampleId, path: &Path) -> Result<()> {
        let stored = self
            .example(id)
            .with_context(|| format!("Example {} not found", id))?;
        let config = RankerConfig {
            num_variants: stored.example.variants,
            template: stored.example.template.clone(),
            ..self.settings().ranker
        };
        let report = RunReport::new(stored.example.prompt, stored.example.results, &config);
        report::save_report(path, &report)?;
        Ok(())
    }

    /// Start a ranking run with the configured provider.
    ///
    /// `notify` is called after each event is queued so the UI can wake up.
    pub fn start_run(
        &self,
        prompt: String,
        config: RankerConfig,
        notify: impl Fn() + Send + Sync + 'static,
    ) -> Result<RunId> {
        let client = OpenAiClient::from_settings(&self.settings(), None)?;
        self.start_run_with(client, prompt, config, notify)
    }

    /// Start a ranking run against an explicit backend
    pub fn start_run_with<B: ChatBackend>(
        &self,
        backend: B,
        prompt: String,
        config: RankerConfig,
        notify: impl Fn() + Send + Sync + 'static,
    ) -> Result<RunId> {
        let run = self.next_run.fetch_add(1, Ordering::SeqCst);
        let notify = Arc::new(notify);

        let progress_tx = self.events_tx.clone();
        let progress_notify = Arc::clone(&notify);
        let ranker = LogProbRanker::new(backend, config)?.with_callback(move |output| {
            progress_tx.send(RunEvent::Progress {
                run,
                index: output.index,
                score: output.logprob,
            })?;
            progress_notify();
            Ok(())
        });

        self.active_runs
            .write()
            .map_err(|e| anyhow::anyhow!("Runs lock poisoned: {}", e))?
            .push(run);

        let database = Arc::clone(&self.database);
        let examples = Arc::clone(&self.examples);
        let active_runs = Arc::clone(&self.active_runs);
        let events_tx = self.events_tx.clone();
        self.runtime.spawn(async move {
            let event = match ranker.rank_outputs(&prompt).await {
                Ok(results) => {
                    let example = Example::new(
                        prompt,
                        ranker.config().num_variants,
                        ranker.config().template.clone(),
                        results,
                    );
                    match store_example(&database, &examples, example) {
                        Ok(id) => RunEvent::Finished { run, id },
                        Err(e) => RunEvent::Failed {
                            run,
                            message: format!("Failed to save run: {}", e),
                        },
                    }
                }
                Err(e) => RunEvent::Failed {
                    run,
                    message: e.to_string(),
                },
            };

            if let RunEvent::Failed { message, .. } = &event {
                error!("Run {} failed: {}", run, message);
            }
            if let Ok(mut runs) = active_runs.write() {
                runs.retain(|r| *r != run);
            }
            if events_tx.send(event).is_err() {
                warn!("Run {} finished after the UI closed", run);
            }
            notify();
        });

        info!("Run {} started", run);
        Ok(run)
    }

    /// Drain events queued by background runs
    pub fn poll_events(&self) -> Vec<RunEvent> {
        match self.events_rx.lock() {
            Ok(rx) => rx.try_iter().collect(),
            Err(e) => {
                error!("Event channel lock poisoned: {}", e);
                Vec::new()
            }
        }
    }
}

fn store_example(
    database: &Database,
    examples: &RwLock<Vec<StoredExample>>,
    example: Example,
) -> Result<ExampleId> {
    let stored = StoredExample::new(example);
    let id = stored.id;
    database.save_example(&stored)?;
    examples
        .write()
        .map_err(|e| anyhow::anyhow!("Examples lock poisoned: {}", e))?
        .insert(0, stored);
    info!("Example {} added to gallery", id);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use async_trait::async_trait;

    use super::*;
    use crate::core::error::Result as RankerResult;
    use crate::llm::ChatRequest;

    struct FixedBackend;

    #[async_trait]
    impl ChatBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn chat_completion(&self, request: ChatRequest) -> RankerResult<String> {
            if request.temperature == 0.0 {
                Ok(r#"{"interesting": true, "creative": true, "useful": false}"#.to_string())
            } else {
                Ok("A cat sat.".to_string())
            }
        }
    }

    fn state() -> AppState {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        AppState::new(db).unwrap()
    }

    fn wait_for_finish(state: &AppState) -> Vec<RunEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        while Instant::now() < deadline {
            events.extend(state.poll_events());
            if events
                .iter()
                .any(|e| matches!(e, RunEvent::Finished { .. } | RunEvent::Failed { .. }))
            {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        events
    }

    #[test]
    fn examples_are_added_and_deleted() {
        let state = state();
        let id = state
            .add_example(Example::new("Cats", 3, "A {animal} sat.", vec![]))
            .unwrap();
        assert_eq!(state.example_count(), 1);
        assert_eq!(state.example(id).unwrap().example.prompt, "Cats");

        state.delete_example(id).unwrap();
        assert_eq!(state.example_count(), 0);
        assert!(state.database.load_examples().unwrap().is_empty());
    }

    #[test]
    fn settings_updates_are_persisted() {
        let state = state();
        let mut settings = state.settings();
        settings.model = "gpt-4".into();
        state.update_settings(settings).unwrap();

        let saved = state.database.load_settings().unwrap().unwrap();
        assert_eq!(saved.model, "gpt-4");
    }

    #[test]
    fn export_then_import_keeps_the_example() {
        let state = state();
        let id = state
            .add_example(Example::new("Cats", 0, "", vec![]))
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cats.json");

        state.export_report(id, &path).unwrap();
        let imported = state.import_report(&path).unwrap();

        let original = state.example(id).unwrap().example;
        assert_eq!(state.example(imported).unwrap().example, original);
    }

    #[test]
    fn background_run_lands_in_gallery() {
        let state = state();
        let config = RankerConfig {
            num_variants: 2,
            ..Default::default()
        };
        let run = state
            .start_run_with(FixedBackend, "Cats".to_string(), config, || {})
            .unwrap();

        let events = wait_for_finish(&state);
        let progress = events
            .iter()
            .filter(|e| matches!(e, RunEvent::Progress { run: r, .. } if *r == run))
            .count();
        assert_eq!(progress, 2);

        let id = events
            .iter()
            .find_map(|e| match e {
                RunEvent::Finished { id, .. } => Some(*id),
                _ => None,
            })
            .expect("run should finish");
        let example = state.example(id).unwrap().example;
        assert_eq!(example.variants, 2);
        assert_eq!(example.results.len(), 2);
        assert!((example.results[0].logprob - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(state.active_run_count(), 0);
    }
}
