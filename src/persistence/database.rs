//! SQLite database implementation for persistent storage

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::core::{Example, ExampleId, RankedOutput, Settings, StoredExample};

/// Database wrapper for SQLite operations
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database in the default data directory
    pub fn new() -> Result<Self> {
        Self::open(&Self::get_database_path())
    }

    /// Open (or create) a database file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .context(format!("Failed to open database at {:?}", path))?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        info!("Database opened at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a throwaway in-memory database
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Get the database file path
    fn get_database_path() -> PathBuf {
        crate::core::settings::default_data_directory().join("logprob-ranker.db")
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Database lock poisoned: {}", e))
    }

    /// Initialize database schema
    pub fn initialize(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            -- Settings table
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            -- Ranked runs shown in the gallery
            CREATE TABLE IF NOT EXISTS examples (
                id TEXT PRIMARY KEY,
                prompt TEXT NOT NULL,
                variants INTEGER NOT NULL,
                template TEXT NOT NULL,
                results TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }

    // === Settings ===

    /// Load settings from database
    pub fn load_settings(&self) -> Result<Option<Settings>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT value FROM settings WHERE key = 'app_settings'")?;
        let result: Option<String> = stmt.query_row([], |row| row.get(0)).optional()?;

        match result {
            Some(json) => {
                let mut settings: Settings =
                    serde_json::from_str(&json).context("Failed to deserialize settings")?;
                // Validate and fix any invalid values after deserialization
                settings.validate();
                Ok(Some(settings))
            }
            None => Ok(None),
        }
    }

    /// Save settings to database
    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let conn = self.lock()?;
        let json = serde_json::to_string(settings)?;
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES ('app_settings', ?1)",
            params![json],
        )?;
        debug!("Settings saved");
        Ok(())
    }

    // === Examples ===

    /// Save an example to database
    pub fn save_example(&self, stored: &StoredExample) -> Result<()> {
        let conn = self.lock()?;
        let results_json = serde_json::to_string(&stored.example.results)?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO examples
            (id, prompt, variants, template, results, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                stored.id.to_string(),
                stored.example.prompt,
                stored.example.variants,
                stored.example.template,
                results_json,
                stored.created_at.to_rfc3339(),
            ],
        )?;

        debug!("Example {} saved", stored.id);
        Ok(())
    }

    /// Load all examples, newest first
    pub fn load_examples(&self) -> Result<Vec<StoredExample>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, prompt, variants, template, results, created_at
             FROM examples ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (id, prompt, variants, template, results, created_at) = row?;
            match Self::decode_example(&id, &results, &created_at) {
                Ok((id, results, created_at)) => result.push(StoredExample {
                    id,
                    created_at,
                    example: Example::new(prompt, variants, template, results),
                }),
                Err(e) => error!("Failed to deserialize example {}: {}", id, e),
            }
        }

        Ok(result)
    }

    fn decode_example(
        id: &str,
        results: &str,
        created_at: &str,
    ) -> Result<(ExampleId, Vec<RankedOutput>, DateTime<Utc>)> {
        let id = ExampleId(Uuid::parse_str(id)?);
        let results: Vec<RankedOutput> = serde_json::from_str(results)?;
        let created_at = DateTime::parse_from_rfc3339(created_at)?.with_timezone(&Utc);
        Ok((id, results, created_at))
    }

    /// Delete an example from database
    pub fn delete_example(&self, id: ExampleId) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM examples WHERE id = ?1", params![id.to_string()])?;
        debug!("Example {} deleted", id);
        Ok(())
    }

    /// Number of stored examples
    #[cfg(test)]
    pub fn example_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM examples", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn database() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn stored(prompt: &str, minutes_ago: i64) -> StoredExample {
        let mut stored = StoredExample::new(Example::new(
            prompt,
            2,
            "{\"a\": LOGPROB_TRUE}",
            vec![RankedOutput {
                output: "out".into(),
                logprob: 1.0,
                index: 0,
                attribute_scores: None,
                raw_evaluation: Some("{\"a\": true}".into()),
            }],
        ));
        stored.created_at = Utc::now() - Duration::minutes(minutes_ago);
        stored
    }

    #[test]
    fn settings_round_trip_through_validation() {
        let db = database();
        assert!(db.load_settings().unwrap().is_none());

        let mut settings = Settings::default();
        settings.model = "gpt-4".into();
        settings.ranker.num_variants = 0;
        db.save_settings(&settings).unwrap();

        let loaded = db.load_settings().unwrap().unwrap();
        assert_eq!(loaded.model, "gpt-4");
        assert_eq!(loaded.ranker.num_variants, 1);
    }

    #[test]
    fn examples_are_listed_newest_first() {
        let db = database();
        db.save_example(&stored("old", 10)).unwrap();
        db.save_example(&stored("new", 1)).unwrap();

        let examples = db.load_examples().unwrap();
        let prompts: Vec<_> = examples.iter().map(|e| e.example.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["new", "old"]);
        assert_eq!(examples[0].example.results[0].output, "out");
    }

    #[test]
    fn deleting_removes_only_that_example() {
        let db = database();
        let keep = stored("keep", 2);
        let removed = stored("drop", 1);
        db.save_example(&keep).unwrap();
        db.save_example(&removed).unwrap();

        db.delete_example(removed.id).unwrap();
        let examples = db.load_examples().unwrap();
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].id, keep.id);
        assert_eq!(db.example_count().unwrap(), 1);
    }

    #[test]
    fn opens_database_file_in_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ranker.db");
        let db = Database::open(&path).unwrap();
        db.initialize().unwrap();
        assert!(path.exists());
    }
}
