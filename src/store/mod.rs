//! Flat JSON document store.
//!
//! The whole dataset is one JSON object held in memory and rewritten to disk
//! after every successful mutation. Mutations are applied to a draft copy
//! under a single lock, so a failed write leaves both memory and disk as they
//! were.

pub mod document;
pub mod ids;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::StoreError;
use crate::models::collections;

pub use document::{Document, Records, RecordsMut};
pub use ids::IdGenerator;

pub struct JsonStore {
    path: Option<PathBuf>,
    document: Mutex<Document>,
    ids: IdGenerator,
}

impl JsonStore {
    /// Loads the document at `path`, creating it with empty collections when
    /// the file does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let document = match tokio::fs::read(&path).await {
            Ok(bytes) => Document::from_value(serde_json::from_slice(&bytes)?)?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "document not found; starting empty");
                Document::default()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        }
        .with_default_collections();

        persist(&path, &document).await?;

        info!(
            path = %path.display(),
            collections = document.root().len(),
            "document store loaded"
        );

        Ok(Self::from_parts(Some(path), document))
    }

    /// A store that never touches the filesystem.
    pub fn in_memory(value: Value) -> Result<Self, StoreError> {
        let document = Document::from_value(value)?.with_default_collections();
        Ok(Self::from_parts(None, document))
    }

    fn from_parts(path: Option<PathBuf>, document: Document) -> Self {
        let floor = document
            .max_numeric_id(collections::POINTS_HISTORY)
            .unwrap_or(0);

        Self {
            path,
            document: Mutex::new(document),
            ids: IdGenerator::new(floor),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn read<R>(&self, inspect: impl FnOnce(&Document) -> R) -> R {
        let guard = self.document.lock().await;
        inspect(&guard)
    }

    pub async fn snapshot(&self) -> Document {
        self.document.lock().await.clone()
    }

    /// Applies `apply` to a draft of the document and commits it (memory and
    /// disk) only when the closure succeeds.
    pub async fn write<R, E>(
        &self,
        apply: impl FnOnce(&mut Document, &IdGenerator) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        self.write_and_then(apply, |_| ()).await
    }

    /// Like [`write`](Self::write), but runs `on_commit` once the draft has
    /// been persisted and before the lock is released. State kept beside the
    /// document moves only when the document does.
    pub async fn write_and_then<R, E>(
        &self,
        apply: impl FnOnce(&mut Document, &IdGenerator) -> Result<R, E>,
        on_commit: impl FnOnce(&R),
    ) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let mut guard = self.document.lock().await;
        let mut draft = guard.clone();

        let result = apply(&mut draft, &self.ids)?;

        if let Some(path) = &self.path {
            persist(path, &draft).await?;
        }
        *guard = draft;
        on_commit(&result);

        Ok(result)
    }
}

async fn persist(path: &Path, document: &Document) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(document.root())?;
    let staging = path.with_extension("json.tmp");

    tokio::fs::write(&staging, &bytes)
        .await
        .map_err(|source| StoreError::Io {
            path: staging.clone(),
            source,
        })?;
    tokio::fs::rename(&staging, path)
        .await
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(())
}
