//! Story oracle sampling and structured generation.
//!
//! This crate provides:
//! - Oracle tables loaded from JSON and sampled without repeats
//! - Conflict-map and table generation through a generative text service
//! - Tolerant extraction of JSON from generated text
//! - Timestamped persistence of results
//!
//! # Quick Start
//!
//! ```ignore
//! use oracle_core::{OracleConfig, OracleSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = OracleSession::new(OracleConfig::from_env()?);
//!
//!     let run = session.run(4).await?;
//!     for name in run.map.character_names() {
//!         println!("{name}");
//!     }
//!     println!("{}", run.bundle);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod conflict;
pub mod extract;
pub mod generator;
pub mod persist;
pub mod prompts;
pub mod sampler;
pub mod session;
pub mod tables;
pub mod testing;

// Primary public API
pub use config::{ConfigError, OracleConfig};
pub use conflict::{check_schema, AnimosityType, Character, ConflictMap, Die, SchemaWarning};
pub use extract::{extract, DecodeError};
pub use generator::{
    FailureReason, GenerationError, GeneratorConfig, OracleGenerator, TextGenerator,
};
pub use persist::{Artifact, LoadedBundle, PersistError, PersistedBundle, ResultPersister};
pub use sampler::{sample, Combination, Draw, SamplingError};
pub use session::{OracleRun, OracleSession, SessionError, DEFAULT_CONSULT_COUNT};
pub use tables::{LoadError, Table, TableSet};
pub use testing::{MockGenerator, MockResponse};
