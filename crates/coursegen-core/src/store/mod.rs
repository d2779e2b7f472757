//! Per-chapter document store on the local filesystem.
//!
//! Layout: `<root>/chapter-NN/<document file>` plus JSON reports in the
//! same directory. File identity derives only from chapter number and
//! document kind.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

use crate::document::DocumentKind;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON error on {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound(path.to_path_buf())
        } else {
            StoreError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Hex-encoded SHA-256 of `content`.
pub fn sha256_hex(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Directory name for a chapter, e.g. `chapter-07`.
pub fn chapter_dir_name(chapter: u32) -> String {
    format!("chapter-{chapter:02}")
}

/// Filesystem store rooted at the output directory.
#[derive(Debug, Clone)]
pub struct ChapterStore {
    root: PathBuf,
}

impl ChapterStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chapter_dir(&self, chapter: u32) -> PathBuf {
        self.root.join(chapter_dir_name(chapter))
    }

    pub fn document_path(&self, chapter: u32, kind: DocumentKind) -> PathBuf {
        self.chapter_dir(chapter).join(kind.file_name())
    }

    pub async fn ensure_chapter_dir(&self, chapter: u32) -> Result<PathBuf, StoreError> {
        let dir = self.chapter_dir(chapter);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;
        Ok(dir)
    }

    pub async fn read_document(
        &self,
        chapter: u32,
        kind: DocumentKind,
    ) -> Result<String, StoreError> {
        let path = self.document_path(chapter, kind);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))
    }

    /// Write a document, replacing any previous version. Returns its path.
    pub async fn write_document(
        &self,
        chapter: u32,
        kind: DocumentKind,
        content: &str,
    ) -> Result<PathBuf, StoreError> {
        self.ensure_chapter_dir(chapter).await?;
        let path = self.document_path(chapter, kind);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        tracing::debug!(chapter, document = %kind, bytes = content.len(), "document written");
        Ok(path)
    }

    pub async fn document_exists(&self, chapter: u32, kind: DocumentKind) -> bool {
        tokio::fs::try_exists(self.document_path(chapter, kind))
            .await
            .unwrap_or(false)
    }

    /// Write `value` as pretty JSON to `<chapter dir>/<name>`.
    pub async fn write_chapter_json<T: Serialize>(
        &self,
        chapter: u32,
        name: &str,
        value: &T,
    ) -> Result<PathBuf, StoreError> {
        let dir = self.ensure_chapter_dir(chapter).await?;
        let path = dir.join(name);
        write_json(&path, value).await?;
        Ok(path)
    }

    pub async fn read_chapter_json<T: DeserializeOwned>(
        &self,
        chapter: u32,
        name: &str,
    ) -> Result<T, StoreError> {
        read_json(&self.chapter_dir(chapter).join(name)).await
    }

    /// Write `value` as pretty JSON directly under the root.
    pub async fn write_root_json<T: Serialize>(
        &self,
        name: &str,
        value: &T,
    ) -> Result<PathBuf, StoreError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StoreError::io(&self.root, e))?;
        let path = self.root.join(name);
        write_json(&path, value).await?;
        Ok(path)
    }

    pub async fn read_root_json<T: DeserializeOwned>(&self, name: &str) -> Result<T, StoreError> {
        read_json(&self.root.join(name)).await
    }

    /// Remove a root-level file; a missing file is not an error.
    pub async fn remove_root_file(&self, name: &str) -> Result<(), StoreError> {
        let path = self.root.join(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| StoreError::io(path, e))
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| StoreError::io(path, e))?;
    serde_json::from_str(&text).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[test]
    fn chapter_dirs_are_zero_padded() {
        assert_eq!(chapter_dir_name(1), "chapter-01");
        assert_eq!(chapter_dir_name(12), "chapter-12");
        assert_eq!(chapter_dir_name(100), "chapter-100");
    }

    #[test]
    fn sha256_of_known_input() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn write_then_read_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChapterStore::new(dir.path());

        let path = store
            .write_document(2, DocumentKind::Quiz, "quiz body")
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("chapter-02").join("quiz.txt"));
        assert!(store.document_exists(2, DocumentKind::Quiz).await);
        assert_eq!(
            store.read_document(2, DocumentKind::Quiz).await.unwrap(),
            "quiz body"
        );
    }

    #[tokio::test]
    async fn missing_document_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChapterStore::new(dir.path());
        let err = store.read_document(1, DocumentKind::Qa).await.unwrap_err();
        assert!(err.is_not_found(), "{err}");
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Report {
        ok: bool,
    }

    #[tokio::test]
    async fn json_round_trip_and_removal() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChapterStore::new(dir.path().join("out"));

        store
            .write_chapter_json(1, "r.json", &Report { ok: true })
            .await
            .unwrap();
        let back: Report = store.read_chapter_json(1, "r.json").await.unwrap();
        assert_eq!(back, Report { ok: true });

        store.write_root_json("s.json", &Report { ok: false }).await.unwrap();
        store.remove_root_file("s.json").await.unwrap();
        store.remove_root_file("s.json").await.unwrap();
        let err = store.read_root_json::<Report>("s.json").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
