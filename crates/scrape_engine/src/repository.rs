//! Storage behind the job store: a JSON flat file in production, memory in tests.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use scrape_core::ScrapeJob;
use serde::{Deserialize, Serialize};

use crate::persist::{AtomicFileWriter, PersistError};

/// Every write replaces the whole list; callers read immediately before
/// writing and accept last-write-wins.
pub trait JobRepository: Send + Sync {
    fn load(&self) -> Result<Vec<ScrapeJob>, PersistError>;
    fn save(&self, jobs: &[ScrapeJob]) -> Result<(), PersistError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct JobDatabase {
    #[serde(default)]
    scrapes: Vec<ScrapeJob>,
    /// Unrelated top-level keys, written back untouched.
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// JSON document `{"scrapes": [...]}` rewritten wholesale on each save.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
    file_name: String,
    writer: AtomicFileWriter,
}

impl JsonFileRepository {
    /// Opens `path`, creating an empty database when the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| PersistError::OutputDir(format!("{:?} is not a file path", path)))?;
        let repository = Self {
            writer: AtomicFileWriter::for_file(&path),
            path,
            file_name,
        };
        if !repository.path.exists() {
            repository.write_document(&JobDatabase::default())?;
        }
        Ok(repository)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<JobDatabase, PersistError> {
        let text = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn write_document(&self, document: &JobDatabase) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(document)?;
        self.writer.write(&self.file_name, &content)?;
        Ok(())
    }
}

impl JobRepository for JsonFileRepository {
    fn load(&self) -> Result<Vec<ScrapeJob>, PersistError> {
        Ok(self.read_document()?.scrapes)
    }

    fn save(&self, jobs: &[ScrapeJob]) -> Result<(), PersistError> {
        let mut document = match self.read_document() {
            Ok(document) => document,
            Err(PersistError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                JobDatabase::default()
            }
            Err(err) => return Err(err),
        };
        document.scrapes = jobs.to_vec();
        self.write_document(&document)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    jobs: Mutex<Vec<ScrapeJob>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jobs(jobs: Vec<ScrapeJob>) -> Self {
        Self {
            jobs: Mutex::new(jobs),
        }
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, Vec<ScrapeJob>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl JobRepository for InMemoryRepository {
    fn load(&self) -> Result<Vec<ScrapeJob>, PersistError> {
        Ok(self.guard().clone())
    }

    fn save(&self, jobs: &[ScrapeJob]) -> Result<(), PersistError> {
        *self.guard() = jobs.to_vec();
        Ok(())
    }
}
