use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use scout_logging::{scout_info, scout_warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tagscout_core::{same_server, CrawlState, SelfIdentity};
use tempfile::NamedTempFile;
use thiserror::Error;

const CRAWL_FILENAME: &str = "crawl_state.ron";
const IDENTITY_FILENAME: &str = "identity.ron";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state directory missing or not writable: {0}")]
    StateDir(String),
    #[error("could not encode state: {0}")]
    Encode(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// The cached own identity, tied to the instance it was read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedIdentity {
    instance: String,
    me: SelfIdentity,
}

/// RON files in one directory: the last crawl and the caller's identity.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Last saved crawl. Missing or unreadable files yield `None`.
    pub fn load_crawl(&self) -> Option<CrawlState> {
        self.load(CRAWL_FILENAME)
    }

    pub fn save_crawl(&self, state: &CrawlState) -> Result<PathBuf, PersistError> {
        self.save(CRAWL_FILENAME, state)
    }

    /// Cached identity for `instance`; one cached for another instance is ignored.
    pub fn load_identity(&self, instance: &str) -> Option<SelfIdentity> {
        let persisted: PersistedIdentity = self.load(IDENTITY_FILENAME)?;
        if same_server(&persisted.instance, instance) {
            Some(persisted.me)
        } else {
            scout_info!(
                "cached identity belongs to {}, not {}",
                persisted.instance,
                instance
            );
            None
        }
    }

    pub fn save_identity(&self, instance: &str, me: &SelfIdentity) -> Result<PathBuf, PersistError> {
        let persisted = PersistedIdentity {
            instance: instance.to_string(),
            me: me.clone(),
        };
        self.save(IDENTITY_FILENAME, &persisted)
    }

    fn load<T: DeserializeOwned>(&self, filename: &str) -> Option<T> {
        let path = self.dir.join(filename);
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                scout_warn!("Failed to read {:?}: {}", path, err);
                return None;
            }
        };

        match ron::from_str(&content) {
            Ok(value) => Some(value),
            Err(err) => {
                scout_warn!("Failed to parse {:?}: {}", path, err);
                None
            }
        }
    }

    fn save<T: Serialize>(&self, filename: &str, value: &T) -> Result<PathBuf, PersistError> {
        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(value, pretty)
            .map_err(|err| PersistError::Encode(err.to_string()))?;
        write_atomic(&self.dir, filename, &content)
    }
}

fn ensure_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::StateDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::StateDir("path is not a directory".into()));
        }
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| PersistError::StateDir(e.to_string()))
}

/// Writes `{dir}/{filename}` through a temp file in the same directory and a rename.
fn write_atomic(dir: &Path, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
    ensure_dir(dir)?;

    let target = dir.join(filename);
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
    Ok(target)
}
