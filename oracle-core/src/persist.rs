//! Writing generation results to disk.
//!
//! A run is saved as a bundle of three pretty-printed JSON files sharing one
//! prefix:
//!
//! ```text
//! oracle/oracle_results_20240314_201502_elements.json
//! oracle/oracle_results_20240314_201502_characters.json
//! oracle/oracle_results_20240314_201502_conflicts.json
//! ```
//!
//! Bundles are never modified or deleted once written.

use crate::conflict::ConflictMap;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Every bundle prefix starts with this.
pub const BUNDLE_PREFIX: &str = "oracle_results";

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// One of the three files in a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Elements,
    Characters,
    Conflicts,
}

impl Artifact {
    pub const ALL: [Artifact; 3] = [Artifact::Elements, Artifact::Characters, Artifact::Conflicts];

    pub fn as_str(&self) -> &'static str {
        match self {
            Artifact::Elements => "elements",
            Artifact::Characters => "characters",
            Artifact::Conflicts => "conflicts",
        }
    }

    fn file_name(&self, prefix: &str) -> String {
        format!("{prefix}_{}.json", self.as_str())
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from saving or reading bundles.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Error creating output directory '{}': {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error serializing {artifact}: {source}")]
    Serialize {
        artifact: Artifact,
        #[source]
        source: serde_json::Error,
    },

    #[error("Error writing {artifact} to '{}': {source}", path.display())]
    Write {
        artifact: Artifact,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error reading '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error decoding '{}': {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Paths of a bundle that was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedBundle {
    pub prefix: String,
    pub elements: PathBuf,
    pub characters: PathBuf,
    pub conflicts: PathBuf,
}

impl fmt::Display for PersistedBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Results saved to {}, {}, and {}",
            self.elements.display(),
            self.characters.display(),
            self.conflicts.display()
        )
    }
}

/// The contents of a bundle read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedBundle {
    pub prefix: String,
    pub elements: Value,
    pub characters: Value,
    pub conflicts: Value,
}

impl LoadedBundle {
    /// View the bundle as a conflict map, with the usual leniency.
    pub fn to_conflict_map(&self) -> ConflictMap {
        let mut object = serde_json::Map::with_capacity(3);
        object.insert(Artifact::Elements.to_string(), self.elements.clone());
        object.insert(Artifact::Characters.to_string(), self.characters.clone());
        object.insert(Artifact::Conflicts.to_string(), self.conflicts.clone());
        ConflictMap::from_value(Value::Object(object))
    }
}

/// Saves result bundles into one output directory.
#[derive(Debug, Clone)]
pub struct ResultPersister {
    output_dir: PathBuf,
}

impl ResultPersister {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Prefix for a bundle written now, at one-second resolution.
    pub fn timestamp_prefix() -> String {
        format!(
            "{BUNDLE_PREFIX}_{}",
            chrono::Local::now().format(TIMESTAMP_FORMAT)
        )
    }

    /// Write the three groups under a fresh timestamped prefix.
    ///
    /// A run in the same second as an existing bundle gets a numbered prefix
    /// (`oracle_results_<timestamp>_2`, `_3`, ...) instead of replacing it.
    pub async fn persist<E, C, F>(
        &self,
        elements: &E,
        characters: &C,
        conflicts: &F,
    ) -> Result<PersistedBundle, PersistError>
    where
        E: Serialize + ?Sized,
        C: Serialize + ?Sized,
        F: Serialize + ?Sized,
    {
        let prefix = self.unused_prefix(&Self::timestamp_prefix()).await;
        self.persist_with_prefix(&prefix, elements, characters, conflicts)
            .await
    }

    /// Write a conflict map as a bundle.
    pub async fn persist_map(&self, map: &ConflictMap) -> Result<PersistedBundle, PersistError> {
        self.persist(&map.elements, &map.characters, &map.conflicts)
            .await
    }

    /// Write the three groups under `prefix`.
    ///
    /// All three are serialized before anything touches the disk. Files are
    /// then written in order; if one fails, the ones before it stay. Existing
    /// files are never overwritten: a taken name is a [`PersistError::Write`]
    /// with [`ErrorKind::AlreadyExists`].
    pub async fn persist_with_prefix<E, C, F>(
        &self,
        prefix: &str,
        elements: &E,
        characters: &C,
        conflicts: &F,
    ) -> Result<PersistedBundle, PersistError>
    where
        E: Serialize + ?Sized,
        C: Serialize + ?Sized,
        F: Serialize + ?Sized,
    {
        let contents = [
            (Artifact::Elements, to_pretty(Artifact::Elements, elements)?),
            (Artifact::Characters, to_pretty(Artifact::Characters, characters)?),
            (Artifact::Conflicts, to_pretty(Artifact::Conflicts, conflicts)?),
        ];

        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| PersistError::CreateDir {
                path: self.output_dir.clone(),
                source,
            })?;

        for (artifact, content) in &contents {
            let path = self.path_for(prefix, *artifact);
            write_new(&path, content)
                .await
                .map_err(|source| PersistError::Write {
                    artifact: *artifact,
                    path: path.clone(),
                    source,
                })?;
            tracing::debug!(path = %path.display(), %artifact, "wrote artifact");
        }

        let bundle = PersistedBundle {
            prefix: prefix.to_string(),
            elements: self.path_for(prefix, Artifact::Elements),
            characters: self.path_for(prefix, Artifact::Characters),
            conflicts: self.path_for(prefix, Artifact::Conflicts),
        };
        tracing::info!(prefix, dir = %self.output_dir.display(), "persisted result bundle");
        Ok(bundle)
    }

    /// Prefixes of bundles in the output directory, newest first.
    ///
    /// A missing directory has no bundles. A bundle is listed when its
    /// elements file exists.
    pub async fn list_bundles(&self) -> Result<Vec<String>, PersistError> {
        let read_err = |source| PersistError::Read {
            path: self.output_dir.clone(),
            source,
        };

        let mut entries = match fs::read_dir(&self.output_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(read_err(e)),
        };

        let suffix = format!("_{}.json", Artifact::Elements);
        let mut prefixes = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(prefix) = name.strip_suffix(&suffix) {
                if prefix.starts_with(BUNDLE_PREFIX) {
                    prefixes.push(prefix.to_string());
                }
            }
        }

        prefixes.sort_by(|a, b| bundle_order(b).cmp(&bundle_order(a)));
        Ok(prefixes)
    }

    /// Read the bundle written under `prefix`.
    pub async fn load_bundle(&self, prefix: &str) -> Result<LoadedBundle, PersistError> {
        Ok(LoadedBundle {
            prefix: prefix.to_string(),
            elements: self.read_artifact(prefix, Artifact::Elements).await?,
            characters: self.read_artifact(prefix, Artifact::Characters).await?,
            conflicts: self.read_artifact(prefix, Artifact::Conflicts).await?,
        })
    }

    /// The newest bundle, if any.
    pub async fn latest_bundle(&self) -> Result<Option<LoadedBundle>, PersistError> {
        match self.list_bundles().await?.first() {
            Some(prefix) => Ok(Some(self.load_bundle(prefix).await?)),
            None => Ok(None),
        }
    }

    /// `base`, or the first `base_N` (N >= 2) with no artifact on disk.
    async fn unused_prefix(&self, base: &str) -> String {
        let mut n = 1u32;
        loop {
            let candidate = match n {
                1 => base.to_string(),
                n => format!("{base}_{n}"),
            };

            let mut taken = false;
            for artifact in Artifact::ALL {
                let path = self.path_for(&candidate, artifact);
                // An unreadable path is left for the write to report
                if fs::try_exists(&path).await.unwrap_or(false) {
                    taken = true;
                    break;
                }
            }
            if !taken {
                return candidate;
            }
            n += 1;
        }
    }

    fn path_for(&self, prefix: &str, artifact: Artifact) -> PathBuf {
        self.output_dir.join(artifact.file_name(prefix))
    }

    async fn read_artifact(&self, prefix: &str, artifact: Artifact) -> Result<Value, PersistError> {
        let path = self.path_for(prefix, artifact);
        let content = fs::read_to_string(&path)
            .await
            .map_err(|source| PersistError::Read {
                path: path.clone(),
                source,
            })?;
        serde_json::from_str(&content).map_err(|source| PersistError::Decode { path, source })
    }
}

/// Create `path` and write `content`, failing if the file already exists.
async fn write_new(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await
}

/// Sort key for bundle prefixes: the timestamped base, then the collision
/// number (1 for an unnumbered prefix). Timestamps sort lexicographically.
fn bundle_order(prefix: &str) -> (&str, u32) {
    let base_len = BUNDLE_PREFIX.len() + 1 + "20240101_000000".len();
    match (prefix.get(..base_len), prefix.get(base_len..)) {
        (Some(base), Some(rest)) => match rest.strip_prefix('_').map(str::parse) {
            Some(Ok(n)) => (base, n),
            _ if rest.is_empty() => (base, 1),
            _ => (prefix, 1),
        },
        _ => (prefix, 1),
    }
}

fn to_pretty<T: Serialize + ?Sized>(artifact: Artifact, value: &T) -> Result<String, PersistError> {
    serde_json::to_string_pretty(value).map_err(|source| PersistError::Serialize { artifact, source })
}
