use crate::domain::model::{NotifiedEntry, NotifiedSet, Snapshot};
use crate::domain::ports::SnapshotStore;
use crate::utils::error::{Result, WatchError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

const STATE_VERSION: u32 = 1;

#[derive(Serialize)]
struct StateFileRef<'a> {
    version: u32,
    saved_at: DateTime<Utc>,
    notified: Vec<NotifiedEntry>,
    /// 只供除錯，不會讀回來比對
    last_snapshot: &'a Snapshot,
}

#[derive(Deserialize)]
struct StateFile {
    version: u32,
    notified: Vec<NotifiedEntry>,
}

/// JSON 檔案保存已通知集合；先寫暫存檔再 rename，寫入不會只寫一半
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn persistence_error(&self, action: &str, e: impl std::fmt::Display) -> WatchError {
        WatchError::PersistenceError {
            message: format!("failed to {} {}: {}", action, self.path.display(), e),
        }
    }
}

impl SnapshotStore for JsonFileStore {
    async fn load(&self) -> Result<NotifiedSet> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No state file at {}, starting fresh", self.path.display());
                return Ok(NotifiedSet::new());
            }
            Err(e) => return Err(self.persistence_error("read", e)),
        };

        let state: StateFile =
            serde_json::from_slice(&data).map_err(|e| self.persistence_error("parse", e))?;
        if state.version > STATE_VERSION {
            return Err(self.persistence_error(
                "load",
                format!("unsupported state version {}", state.version),
            ));
        }

        Ok(NotifiedSet::from_entries(state.notified))
    }

    async fn save(&self, notified: &NotifiedSet, last_snapshot: &Snapshot) -> Result<()> {
        let state = StateFileRef {
            version: STATE_VERSION,
            saved_at: Utc::now(),
            notified: notified.entries(),
            last_snapshot,
        };
        let json = serde_json::to_vec_pretty(&state)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.persistence_error("create directory for", e))?;
            }
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, &json)
            .await
            .map_err(|e| self.persistence_error("write", e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.persistence_error("replace", e))?;

        tracing::debug!(
            "Saved {} notified slots to {}",
            notified.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    notified: Option<NotifiedSet>,
    last_snapshot: Option<Snapshot>,
    saves: usize,
}

/// 只存在記憶體，重啟後就沒了（--ephemeral 與測試用）
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notified(notified: NotifiedSet) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                notified: Some(notified),
                ..MemoryState::default()
            })),
        }
    }

    pub async fn notified(&self) -> Option<NotifiedSet> {
        self.state.lock().await.notified.clone()
    }

    pub async fn last_snapshot(&self) -> Option<Snapshot> {
        self.state.lock().await.last_snapshot.clone()
    }

    pub async fn save_count(&self) -> usize {
        self.state.lock().await.saves
    }
}

impl SnapshotStore for MemoryStore {
    async fn load(&self) -> Result<NotifiedSet> {
        Ok(self.state.lock().await.notified.clone().unwrap_or_default())
    }

    async fn save(&self, notified: &NotifiedSet, last_snapshot: &Snapshot) -> Result<()> {
        let mut state = self.state.lock().await;
        state.notified = Some(notified.clone());
        state.last_snapshot = Some(last_snapshot.clone());
        state.saves += 1;
        Ok(())
    }
}
