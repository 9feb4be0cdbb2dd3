//! Durable attachment storage and the local cache.
//!
//! The folder list is written as a base64-encoded attachment through the
//! host's upload service, which hands back a pointer (a URL or file name) for
//! later fetches. A small synchronous key/value cache keeps that pointer plus a
//! plaintext copy of the last saved document for when the remote fetch fails.

use crate::{CharfolioError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// The host's file-attachment service.
#[async_trait]
pub trait AttachmentStorage: Send + Sync {
    /// Stores `base64_content` under `name` and returns a pointer for [`fetch`](Self::fetch).
    async fn upload(&self, name: &str, base64_content: &str) -> Result<String>;

    /// Returns the decoded text content behind `url`.
    async fn fetch(&self, url: &str) -> Result<String>;

    /// Deletes the attachment behind `url`. Every save uploads a fresh
    /// attachment, so the store calls this on the one it superseded.
    async fn remove(&self, url: &str) -> Result<()>;
}

/// Browser-style local storage: small string values under string keys.
pub trait LocalCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

fn decode_upload(base64_content: &str) -> Result<String> {
    let bytes = BASE64
        .decode(base64_content)
        .map_err(|e| CharfolioError::Storage(format!("attachment is not valid base64: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| CharfolioError::Storage(format!("attachment is not UTF-8: {e}")))
}

/// Attachment storage kept entirely in memory. Pointers look like `memory://<n>/<name>`.
#[derive(Debug, Default)]
pub struct MemoryAttachmentStorage {
    files: Mutex<HashMap<String, String>>,
    uploads: AtomicUsize,
}

impl MemoryAttachmentStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attachments currently stored.
    pub fn len(&self) -> usize {
        self.files.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrites the content behind an existing pointer.
    pub fn replace(&self, url: &str, content: &str) -> Result<()> {
        let mut files = self
            .files
            .lock()
            .map_err(|_| CharfolioError::Storage("attachment store poisoned".to_string()))?;
        files.insert(url.to_string(), content.to_string());
        Ok(())
    }
}

#[async_trait]
impl AttachmentStorage for MemoryAttachmentStorage {
    async fn upload(&self, name: &str, base64_content: &str) -> Result<String> {
        let content = decode_upload(base64_content)?;
        let mut files = self
            .files
            .lock()
            .map_err(|_| CharfolioError::Storage("attachment store poisoned".to_string()))?;
        let n = self.uploads.fetch_add(1, Ordering::Relaxed);
        let url = format!("memory://{n}/{name}");
        files.insert(url.clone(), content);
        Ok(url)
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let files = self
            .files
            .lock()
            .map_err(|_| CharfolioError::Storage("attachment store poisoned".to_string()))?;
        files
            .get(url)
            .cloned()
            .ok_or_else(|| CharfolioError::Storage(format!("no attachment at {url}")))
    }

    async fn remove(&self, url: &str) -> Result<()> {
        let mut files = self
            .files
            .lock()
            .map_err(|_| CharfolioError::Storage("attachment store poisoned".to_string()))?;
        files.remove(url);
        Ok(())
    }
}

/// Attachment storage backed by a directory; the pointer is the file name.
#[derive(Debug, Clone)]
pub struct DirectoryAttachmentStorage {
    dir: PathBuf,
}

impl DirectoryAttachmentStorage {
    /// Uses `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CharfolioError::Io`] if the directory cannot be created.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    fn resolve(&self, url: &str) -> Result<PathBuf> {
        let name = Path::new(url)
            .file_name()
            .ok_or_else(|| CharfolioError::Storage(format!("bad attachment pointer: {url}")))?;
        Ok(self.dir.join(name))
    }
}

#[async_trait]
impl AttachmentStorage for DirectoryAttachmentStorage {
    async fn upload(&self, name: &str, base64_content: &str) -> Result<String> {
        let content = decode_upload(base64_content)?;
        let path = self.resolve(name)?;
        fs::write(&path, content)?;
        Ok(name.to_string())
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let path = self.resolve(url)?;
        fs::read_to_string(&path)
            .map_err(|e| CharfolioError::Storage(format!("failed to read {}: {e}", path.display())))
    }

    async fn remove(&self, url: &str) -> Result<()> {
        let path = self.resolve(url)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Local cache held in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| CharfolioError::Storage("cache poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CharfolioError::Storage("cache poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CharfolioError::Storage("cache poisoned".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

/// Local cache persisted as a single JSON object on disk.
///
/// The file is re-read on every access so that two caches opened on the same
/// path observe each other's writes.
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn read_all(&self) -> Result<HashMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(HashMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

impl LocalCache for FileCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};

    #[tokio::test]
    async fn test_memory_attachment_decodes_base64() {
        let storage = MemoryAttachmentStorage::new();
        let url = storage
            .upload("folders.json", &BASE64.encode("[1,2]"))
            .await
            .unwrap();
        assert_eq!(storage.fetch(&url).await.unwrap(), "[1,2]");
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_attachment_rejects_bad_base64() {
        let storage = MemoryAttachmentStorage::new();
        let result = storage.upload("folders.json", "%%% not base64").await;
        assert!(matches!(result, Err(CharfolioError::Storage(_))));
    }

    #[tokio::test]
    async fn test_memory_attachment_missing_url() {
        let storage = MemoryAttachmentStorage::new();
        assert!(storage.fetch("memory://9/none").await.is_err());
    }

    #[tokio::test]
    async fn test_directory_attachment_writes_file() {
        let dir = TempDir::new().unwrap();
        let storage = DirectoryAttachmentStorage::open(dir.path()).unwrap();
        let url = storage
            .upload("folders-1.json", &BASE64.encode("{\"a\":1}"))
            .await
            .unwrap();
        assert_eq!(url, "folders-1.json");
        let on_disk = fs::read_to_string(dir.path().join("folders-1.json")).unwrap();
        assert_eq!(on_disk, "{\"a\":1}");
        assert_eq!(storage.fetch(&url).await.unwrap(), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_directory_attachment_ignores_path_components() {
        let dir = TempDir::new().unwrap();
        let storage = DirectoryAttachmentStorage::open(dir.path()).unwrap();
        storage
            .upload("../escape.json", &BASE64.encode("x"))
            .await
            .unwrap();
        assert!(dir.path().join("escape.json").exists());
    }

    #[tokio::test]
    async fn test_remove_deletes_attachment() {
        let storage = MemoryAttachmentStorage::new();
        let first = storage.upload("a.json", &BASE64.encode("1")).await.unwrap();
        storage.remove(&first).await.unwrap();
        let second = storage.upload("a.json", &BASE64.encode("2")).await.unwrap();
        assert_ne!(first, second);
        assert!(storage.fetch(&first).await.is_err());
        assert_eq!(storage.len(), 1);

        let dir = TempDir::new().unwrap();
        let on_disk = DirectoryAttachmentStorage::open(dir.path()).unwrap();
        let url = on_disk.upload("b.json", &BASE64.encode("x")).await.unwrap();
        on_disk.remove(&url).await.unwrap();
        assert!(!dir.path().join("b.json").exists());
        on_disk.remove(&url).await.unwrap();
    }

    #[test]
    fn test_memory_cache_set_get_remove() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("k").unwrap(), None);
        cache.set("k", "v").unwrap();
        assert_eq!(cache.get("k").unwrap().as_deref(), Some("v"));
        cache.remove("k").unwrap();
        assert_eq!(cache.get("k").unwrap(), None);
    }

    #[test]
    fn test_file_cache_persists_between_instances() {
        let temp = NamedTempFile::new().unwrap();
        FileCache::new(temp.path()).set("k", "v").unwrap();
        let reopened = FileCache::new(temp.path());
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_file_cache_corrupt_file_is_an_error() {
        let temp = NamedTempFile::new().unwrap();
        fs::write(temp.path(), "not json").unwrap();
        assert!(FileCache::new(temp.path()).get("k").is_err());
    }
}
