//! Response store persisted to disk
//!
//! Each generation is a directory under the cache root and each record is a
//! JSON file named after the SHA-256 of its request identity. Records are
//! written to a temporary file and renamed into place, so readers never see a
//! torn write and the last rename wins.

use async_trait::async_trait;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

use super::request::{RequestIdentity, StoredResponse};
use super::store::{ResponseStore, StoreError};

/// On-disk envelope for a record
#[derive(Debug, Serialize, Deserialize)]
struct RecordFile {
    identity: RequestIdentity,
    response: StoredResponse,
}

/// Stores generations as directories below an XDG-compliant cache directory
///
/// Uses `~/.cache/fortune-cache/responses/` on Linux, or the equivalent
/// platform path elsewhere.
#[derive(Debug)]
pub struct DiskStore {
    root: PathBuf,
    tmp_seq: AtomicU64,
}

impl DiskStore {
    /// Creates a store in the platform cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "fortune-cache")?;
        Some(Self::with_dir(project_dirs.cache_dir().join("responses")))
    }

    /// Creates a store rooted at a custom directory
    pub fn with_dir(root: PathBuf) -> Self {
        Self {
            root,
            tmp_seq: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for a generation, rejecting names that would escape the root
    fn generation_dir(&self, generation: &str) -> Result<PathBuf, StoreError> {
        let valid = !generation.is_empty()
            && generation != "."
            && generation != ".."
            && !generation.contains(['/', '\\']);
        if !valid {
            return Err(StoreError::InvalidGeneration(generation.to_string()));
        }
        Ok(self.root.join(generation))
    }

    fn record_name(identity: &RequestIdentity) -> String {
        let digest = Sha256::digest(identity.as_str().as_bytes());
        format!("{}.json", hex::encode(digest))
    }

    fn tmp_name(&self, record_name: &str) -> String {
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        format!("{}.{}.{}.tmp", record_name, std::process::id(), seq)
    }
}

#[async_trait]
impl ResponseStore for DiskStore {
    async fn open(&self, generation: &str) -> Result<(), StoreError> {
        fs::create_dir_all(self.generation_dir(generation)?).await?;
        Ok(())
    }

    async fn get(
        &self,
        generation: &str,
        identity: &RequestIdentity,
    ) -> Result<Option<StoredResponse>, StoreError> {
        let path = self.generation_dir(generation)?.join(Self::record_name(identity));
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: RecordFile = serde_json::from_slice(&content)?;
        // Hash collisions are not expected, but never serve another request's body
        if &record.identity != identity {
            return Ok(None);
        }
        Ok(Some(record.response))
    }

    async fn put(
        &self,
        generation: &str,
        identity: &RequestIdentity,
        response: &StoredResponse,
    ) -> Result<(), StoreError> {
        let dir = self.generation_dir(generation)?;
        let missing = |e: std::io::Error| match e.kind() {
            ErrorKind::NotFound => StoreError::MissingGeneration(generation.to_string()),
            _ => StoreError::Io(e),
        };

        let record = RecordFile {
            identity: identity.clone(),
            response: response.clone(),
        };
        let json = serde_json::to_vec(&record)?;

        let name = Self::record_name(identity);
        let tmp = dir.join(self.tmp_name(&name));
        // Writing into the directory fails if the generation was never opened
        // or was deleted, so a late write cannot bring it back
        fs::write(&tmp, json).await.map_err(missing)?;
        if let Err(e) = fs::rename(&tmp, dir.join(&name)).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(missing(e));
        }
        Ok(())
    }

    async fn generations(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete_generation(&self, generation: &str) -> Result<bool, StoreError> {
        match fs::remove_dir_all(self.generation_dir(generation)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn len(&self, generation: &str) -> Result<usize, StoreError> {
        let mut entries = match fs::read_dir(self.generation_dir(generation)?).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().is_some_and(|ext| ext == "json") {
                count += 1;
            }
        }
        Ok(count)
    }
}
