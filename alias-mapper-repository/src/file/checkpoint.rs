//! Append-only checkpoint file: one completed group id per line.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::StoreError;
use crate::interfaces::CheckpointStore;
use alias_mapper_shared::GroupId;

/// Checkpoint store persisted as a plain text file.
///
/// The whole file is read once on open; afterwards lookups are served from
/// memory and every new mark is appended and synced before it becomes
/// visible.
pub struct FileCheckpointStore {
    path: PathBuf,
    completed: RwLock<HashSet<GroupId>>,
    append: Mutex<()>,
}

impl FileCheckpointStore {
    /// Open the checkpoint file, creating nothing until the first mark.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let completed = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => parse_checkpoints(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => return Err(e.into()),
        };

        info!(
            path = %path.display(),
            completed = completed.len(),
            "Opened checkpoint file"
        );

        Ok(Self {
            path,
            completed: RwLock::new(completed),
            append: Mutex::new(()),
        })
    }

    fn contains(&self, group_id: &GroupId) -> Result<bool, StoreError> {
        self.completed
            .read()
            .map(|set| set.contains(group_id))
            .map_err(|_| StoreError::IoError("checkpoint set poisoned".to_string()))
    }
}

fn parse_checkpoints(contents: &str) -> HashSet<GroupId> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(GroupId::from)
        .collect()
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn is_group_complete(&self, group_id: &GroupId) -> Result<bool, StoreError> {
        self.contains(group_id)
    }

    async fn mark_group_complete(&self, group_id: &GroupId) -> Result<(), StoreError> {
        let _guard = self.append.lock().await;
        if self.contains(group_id)? {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{}\n", group_id).as_bytes()).await?;
        file.sync_data().await?;

        self.completed
            .write()
            .map_err(|_| StoreError::IoError("checkpoint set poisoned".to_string()))?
            .insert(group_id.clone());

        debug!(group_id = %group_id, "Checkpoint appended");
        Ok(())
    }

    async fn completed_groups(&self) -> Result<Vec<GroupId>, StoreError> {
        let set = self
            .completed
            .read()
            .map_err(|_| StoreError::IoError("checkpoint set poisoned".to_string()))?;
        let mut groups: Vec<GroupId> = set.iter().cloned().collect();
        groups.sort();
        Ok(groups)
    }
}
