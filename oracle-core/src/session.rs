//! The oracle command surface.
//!
//! [`OracleSession`] owns the configuration, the loaded table set, the
//! generator and the persister. Front ends call its methods and print the
//! results or the errors.

use crate::config::{ConfigError, OracleConfig};
use crate::conflict::ConflictMap;
use crate::generator::{GenerationError, OracleGenerator, TextGenerator};
use crate::persist::{PersistError, PersistedBundle, ResultPersister};
use crate::sampler::{self, SamplingError};
use crate::tables::{LoadError, TableSet};
use std::path::PathBuf;
use thiserror::Error;

/// Number of elements drawn when a command gives no count.
pub const DEFAULT_CONSULT_COUNT: usize = 4;

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Sampling(#[from] SamplingError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Error saving oracle tables to '{}': {source}", path.display())]
    SaveTables {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The outcome of a full consult, map and persist run.
#[derive(Debug, Clone)]
pub struct OracleRun {
    /// Elements drawn from the tables.
    pub elements: Vec<String>,
    pub map: ConflictMap,
    pub bundle: PersistedBundle,
}

/// An oracle session.
pub struct OracleSession {
    config: OracleConfig,
    tables: Option<TableSet>,
    generator: Option<OracleGenerator>,
    persister: ResultPersister,
}

impl OracleSession {
    /// Create a session. Tables load on first use; the API key is only
    /// checked when a generation command runs.
    pub fn new(config: OracleConfig) -> Self {
        let generator = config
            .client()
            .ok()
            .map(|client| OracleGenerator::new(client, config.generator_config()));
        let persister = ResultPersister::new(config.output_dir.clone());

        Self {
            config,
            tables: None,
            generator,
            persister,
        }
    }

    /// Replace the text generator, e.g. with a mock in tests.
    pub fn with_generator(mut self, generator: impl TextGenerator + 'static) -> Self {
        self.generator = Some(OracleGenerator::new(
            generator,
            self.config.generator_config(),
        ));
        self
    }

    /// Use an already loaded table set instead of reading the table file.
    pub fn with_tables(mut self, tables: TableSet) -> Self {
        self.tables = Some(tables);
        self
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    pub fn persister(&self) -> &ResultPersister {
        &self.persister
    }

    /// The table set, loading it on first use.
    pub async fn tables(&mut self) -> Result<&TableSet, SessionError> {
        let tables = match self.tables.take() {
            Some(tables) => tables,
            None => TableSet::load(&self.config.table_path).await?,
        };
        Ok(self.tables.insert(tables))
    }

    /// Discard the cached table set and read the table file again.
    ///
    /// On failure the previous tables stay cached.
    pub async fn reload(&mut self) -> Result<&TableSet, SessionError> {
        let tables = TableSet::load(&self.config.table_path).await?;
        Ok(self.tables.insert(tables))
    }

    /// Draw up to `count` distinct elements.
    pub async fn consult(&mut self, count: usize) -> Result<Vec<String>, SessionError> {
        let tables = self.tables().await?;
        Ok(sampler::sample(tables, count)?)
    }

    /// Build a conflict map from `elements`.
    pub async fn generate_conflict_map(
        &self,
        elements: &[String],
    ) -> Result<ConflictMap, SessionError> {
        Ok(self.generator()?.generate_conflict_map(elements).await?)
    }

    /// Generate new oracle tables, save them to the table path and use them
    /// from now on. A blank or missing tone falls back to the configured one.
    pub async fn write_oracle(&mut self, tone: Option<&str>) -> Result<&TableSet, SessionError> {
        let tone = tone
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.config.tone);

        let tables = self.generator()?.generate_tables(tone).await?;

        let path = &self.config.table_path;
        tables
            .save(path)
            .await
            .map_err(|source| SessionError::SaveTables {
                path: path.clone(),
                source,
            })?;

        Ok(self.tables.insert(tables))
    }

    /// Consult the oracle, map the draw into conflicts and persist the result.
    pub async fn run(&mut self, count: usize) -> Result<OracleRun, SessionError> {
        let elements = self.consult(count).await?;
        tracing::info!(elements = ?elements, "consulted oracle");

        let map = self.generate_conflict_map(&elements).await?;
        let bundle = self.persister.persist_map(&map).await?;

        Ok(OracleRun {
            elements,
            map,
            bundle,
        })
    }

    fn generator(&self) -> Result<&OracleGenerator, ConfigError> {
        self.generator.as_ref().ok_or(ConfigError::MissingApiKey {
            var: self.config.provider.api_key_var(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_tables_json, MockGenerator, MockResponse};
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> OracleConfig {
        OracleConfig::default()
            .with_table_path(dir.path().join("oracle.json"))
            .with_output_dir(dir.path().join("out"))
    }

    #[tokio::test]
    async fn test_missing_table_file() {
        let dir = TempDir::new().unwrap();
        let mut session = OracleSession::new(config(&dir));
        let err = session.consult(4).await.unwrap_err();
        assert!(matches!(err, SessionError::Load(LoadError::NotFound { .. })));
        assert!(err.to_string().contains("oracle.json"));
    }

    #[tokio::test]
    async fn test_consult_loads_once() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("oracle.json"), sample_tables_json()).unwrap();
        let mut session = OracleSession::new(config(&dir));

        assert_eq!(session.consult(4).await.unwrap().len(), 4);

        // Cached; the file is no longer needed
        std::fs::remove_file(dir.path().join("oracle.json")).unwrap();
        assert_eq!(session.consult(60).await.unwrap().len(), 52);
        assert!(session.reload().await.is_err());
        assert_eq!(session.consult(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generation_without_key() {
        let dir = TempDir::new().unwrap();
        let session = OracleSession::new(config(&dir));
        let err = session
            .generate_conflict_map(&["a".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Config(ConfigError::MissingApiKey {
                var: "OPENAI_API_KEY"
            })
        ));
    }

    #[tokio::test]
    async fn test_write_oracle_saves_and_replaces_tables() {
        let dir = TempDir::new().unwrap();
        let mock = MockGenerator::new(vec![MockResponse::text(
            r#"{"Oracle of Salt": ["s1", "s2"], "Oracle of Rust": ["r1", "r2"]}"#,
        )]);
        let mut session = OracleSession::new(config(&dir).with_tone("grim"))
            .with_generator(mock.clone());

        let tables = session.write_oracle(None).await.unwrap();
        assert_eq!(tables.total_combinations(), 4);
        assert!(mock.last_request().unwrap().prompt.contains("grim"));

        let saved = TableSet::load(dir.path().join("oracle.json")).await.unwrap();
        assert_eq!(
            saved.table_names().collect::<Vec<_>>(),
            vec!["Oracle of Salt", "Oracle of Rust"]
        );

        let elements = session.consult(4).await.unwrap();
        assert!(elements.iter().all(|e| e.starts_with('s') || e.starts_with('r')));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_old_tables() {
        let dir = TempDir::new().unwrap();
        let old = TableSet::from_json_str(r#"{"A": ["x"]}"#, "test").unwrap();
        let mock = MockGenerator::new(vec![MockResponse::text("no tables here")]);
        let mut session = OracleSession::new(config(&dir))
            .with_generator(mock)
            .with_tables(old.clone());

        assert!(session.write_oracle(Some("grim")).await.is_err());
        assert_eq!(session.tables().await.unwrap(), &old);
        assert!(!dir.path().join("oracle.json").exists());
    }
}
