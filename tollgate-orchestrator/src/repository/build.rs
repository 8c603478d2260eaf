//! Build repository
//!
//! Source of a pipeline's builds and sink for drop decisions.

use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;
use tollgate_core::domain::admission::DropReason;
use tollgate_core::domain::build::BuildStatus;
use tollgate_core::dto::build::BuildRecord;
use uuid::Uuid;

use super::{RepositoryError, Result};

/// Repository trait for loading the builds of a pipeline
#[async_trait]
pub trait BuildSnapshotProvider: Send + Sync {
    /// Returns every entry of the pipeline, bridges included
    async fn builds_for_pipeline(&self, pipeline_id: Uuid) -> Result<Vec<BuildRecord>>;
}

/// Repository trait for persisting drop decisions
#[async_trait]
pub trait DropRecorder: Send + Sync {
    /// Marks a build as failed with the given reason
    ///
    /// Atomic per build. Implementations must refuse builds that already
    /// left the created state.
    async fn drop_build(&self, build_id: Uuid, reason: DropReason) -> Result<()>;
}

/// In-memory implementation of BuildSnapshotProvider and DropRecorder
#[derive(Default)]
pub struct InMemoryBuildRepository {
    builds: RwLock<Vec<BuildRecord>>,
    drops: RwLock<Vec<(Uuid, DropReason)>>,
    unavailable: RwLock<HashSet<Uuid>>,
}

impl InMemoryBuildRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: BuildRecord) {
        self.builds.write().await.push(record);
    }

    pub async fn find_by_id(&self, build_id: Uuid) -> Option<BuildRecord> {
        self.builds
            .read()
            .await
            .iter()
            .find(|b| b.id == build_id)
            .cloned()
    }

    /// Drops recorded so far, in the order they were written
    pub async fn drops(&self) -> Vec<(Uuid, DropReason)> {
        self.drops.read().await.clone()
    }

    /// Makes drops of the given build fail with `Unavailable`
    pub async fn fail_drops_for(&self, build_id: Uuid) {
        self.unavailable.write().await.insert(build_id);
    }
}

#[async_trait]
impl BuildSnapshotProvider for InMemoryBuildRepository {
    async fn builds_for_pipeline(&self, pipeline_id: Uuid) -> Result<Vec<BuildRecord>> {
        let builds = self.builds.read().await;
        Ok(builds
            .iter()
            .filter(|b| b.pipeline_id == pipeline_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DropRecorder for InMemoryBuildRepository {
    async fn drop_build(&self, build_id: Uuid, reason: DropReason) -> Result<()> {
        if self.unavailable.read().await.contains(&build_id) {
            return Err(RepositoryError::Unavailable(format!(
                "write of build {} failed",
                build_id
            )));
        }

        let mut builds = self.builds.write().await;
        let build = builds
            .iter_mut()
            .find(|b| b.id == build_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("build {}", build_id)))?;

        if !build.status.is_droppable() {
            return Err(RepositoryError::Conflict(format!(
                "build {} is {:?}, not created",
                build_id, build.status
            )));
        }

        build.status = BuildStatus::Failed;
        self.drops.write().await.push((build_id, reason));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_core::domain::build::{BuildKind, Visibility};

    fn record(pipeline_id: Uuid, status: BuildStatus) -> BuildRecord {
        BuildRecord {
            id: Uuid::new_v4(),
            pipeline_id,
            project_id: Uuid::new_v4(),
            name: "build".to_string(),
            kind: BuildKind::Build,
            status,
            protected: false,
            tag_list: Vec::new(),
            visibility: Visibility::Private,
        }
    }

    #[tokio::test]
    async fn test_builds_for_pipeline() {
        let repo = InMemoryBuildRepository::new();
        let pipeline = Uuid::new_v4();

        repo.insert(record(pipeline, BuildStatus::Created)).await;
        repo.insert(record(Uuid::new_v4(), BuildStatus::Created)).await;

        assert_eq!(repo.builds_for_pipeline(pipeline).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_drop_build_marks_failed() {
        let repo = InMemoryBuildRepository::new();
        let build = record(Uuid::new_v4(), BuildStatus::Created);
        let id = build.id;
        repo.insert(build).await;

        repo.drop_build(id, DropReason::NoMatchingRunner)
            .await
            .unwrap();

        assert_eq!(
            repo.find_by_id(id).await.unwrap().status,
            BuildStatus::Failed
        );
        assert_eq!(repo.drops().await, vec![(id, DropReason::NoMatchingRunner)]);
    }

    #[tokio::test]
    async fn test_drop_build_refuses_started_build() {
        let repo = InMemoryBuildRepository::new();
        let build = record(Uuid::new_v4(), BuildStatus::Running);
        let id = build.id;
        repo.insert(build).await;

        let result = repo.drop_build(id, DropReason::CiQuotaExceeded).await;

        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
        assert!(repo.drops().await.is_empty());
    }

    #[tokio::test]
    async fn test_drop_unknown_build() {
        let repo = InMemoryBuildRepository::new();
        let result = repo
            .drop_build(Uuid::new_v4(), DropReason::NoMatchingRunner)
            .await;

        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }
}
