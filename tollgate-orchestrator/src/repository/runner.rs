//! Runner repository
//!
//! Source of the runner records available to a project: every shared
//! (instance) runner plus the group and project runners assigned to it.

use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;
use tollgate_core::dto::runner::RunnerRecord;
use uuid::Uuid;

use super::{RepositoryError, Result};

/// Repository trait for loading the runner fleet of a project
#[async_trait]
pub trait RunnerSnapshotProvider: Send + Sync {
    /// Returns every runner record available to the project
    ///
    /// Records are returned as stored, including paused and offline
    /// runners; the admission service filters them.
    async fn runners_for_project(&self, project_id: Uuid) -> Result<Vec<RunnerRecord>>;
}

struct Entry {
    record: RunnerRecord,
    /// `None` for shared runners
    projects: Option<HashSet<Uuid>>,
}

/// In-memory implementation of RunnerSnapshotProvider
#[derive(Default)]
pub struct InMemoryRunnerRepository {
    entries: RwLock<Vec<Entry>>,
    outage: RwLock<Option<String>>,
}

impl InMemoryRunnerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a runner available to every project
    pub async fn add_shared(&self, record: RunnerRecord) {
        self.entries.write().await.push(Entry {
            record,
            projects: None,
        });
    }

    /// Registers a runner available to the given projects only
    pub async fn add_for_projects(
        &self,
        record: RunnerRecord,
        project_ids: impl IntoIterator<Item = Uuid>,
    ) {
        self.entries.write().await.push(Entry {
            record,
            projects: Some(project_ids.into_iter().collect()),
        });
    }

    /// Makes every subsequent read fail with `Unavailable`
    pub async fn set_outage(&self, message: Option<String>) {
        *self.outage.write().await = message;
    }
}

#[async_trait]
impl RunnerSnapshotProvider for InMemoryRunnerRepository {
    async fn runners_for_project(&self, project_id: Uuid) -> Result<Vec<RunnerRecord>> {
        if let Some(message) = self.outage.read().await.as_ref() {
            return Err(RepositoryError::Unavailable(message.clone()));
        }

        let entries = self.entries.read().await;
        let records = entries
            .iter()
            .filter(|entry| {
                entry
                    .projects
                    .as_ref()
                    .is_none_or(|projects| projects.contains(&project_id))
            })
            .map(|entry| entry.record.clone())
            .collect();

        Ok(records)
    }
}
