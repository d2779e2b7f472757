//! Resume point for sequential runs, kept in `<output>/.checkpoint.json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{ChapterStore, StoreError};

pub const CHECKPOINT_FILE: &str = ".checkpoint.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub last_completed: u32,
    pub total_chapters: u32,
    pub timestamp: DateTime<Utc>,
    pub can_resume: bool,
}

impl Checkpoint {
    pub fn new(last_completed: u32, total_chapters: u32) -> Self {
        Self {
            last_completed,
            total_chapters,
            timestamp: Utc::now(),
            can_resume: last_completed < total_chapters,
        }
    }

    /// Chapters of `chapters` still to run after this checkpoint.
    pub fn remaining(&self, chapters: &[u32]) -> Vec<u32> {
        if !self.can_resume {
            return chapters.to_vec();
        }
        chapters
            .iter()
            .copied()
            .filter(|&n| n > self.last_completed)
            .collect()
    }
}

pub async fn save(store: &ChapterStore, checkpoint: &Checkpoint) -> Result<(), StoreError> {
    store.write_root_json(CHECKPOINT_FILE, checkpoint).await?;
    Ok(())
}

/// Load the checkpoint; `None` when absent or unreadable.
pub async fn load(store: &ChapterStore) -> Option<Checkpoint> {
    match store.read_root_json(CHECKPOINT_FILE).await {
        Ok(cp) => Some(cp),
        Err(e) if e.is_not_found() => None,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable checkpoint");
            None
        }
    }
}

pub async fn clear(store: &ChapterStore) -> Result<(), StoreError> {
    store.remove_root_file(CHECKPOINT_FILE).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_skips_completed_chapters() {
        let cp = Checkpoint::new(3, 6);
        assert!(cp.can_resume);
        assert_eq!(cp.remaining(&[1, 2, 3, 4, 5, 6]), vec![4, 5, 6]);
    }

    #[test]
    fn finished_checkpoint_restarts_from_the_beginning() {
        let cp = Checkpoint::new(6, 6);
        assert!(!cp.can_resume);
        assert_eq!(cp.remaining(&[1, 2]), vec![1, 2]);
    }

    #[tokio::test]
    async fn save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChapterStore::new(dir.path());
        assert!(load(&store).await.is_none());

        save(&store, &Checkpoint::new(2, 5)).await.unwrap();
        let raw = std::fs::read_to_string(dir.path().join(CHECKPOINT_FILE)).unwrap();
        assert!(raw.contains("\"lastCompleted\": 2"));
        assert_eq!(load(&store).await.unwrap().last_completed, 2);

        clear(&store).await.unwrap();
        assert!(load(&store).await.is_none());
        clear(&store).await.unwrap();
    }
}
