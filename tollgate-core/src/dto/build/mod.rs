//! Build DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::build::{BuildKind, BuildStatus, Visibility};

/// A persisted pipeline entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRecord {
    pub id: Uuid,
    pub pipeline_id: Uuid,

    /// Project owning the pipeline, whose quota pays for shared runners
    pub project_id: Uuid,

    pub name: String,
    pub kind: BuildKind,
    pub status: BuildStatus,

    /// Whether the build's ref is protected
    pub protected: bool,

    #[serde(default)]
    pub tag_list: Vec<String>,

    pub visibility: Visibility,
}

impl BuildRecord {
    /// Whether the admission pass should evaluate this entry
    ///
    /// Bridges never run on a runner and builds past creation are already
    /// on their way.
    pub fn needs_admission(&self) -> bool {
        self.kind == BuildKind::Build && self.status.is_droppable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: BuildKind, status: BuildStatus) -> BuildRecord {
        BuildRecord {
            id: Uuid::new_v4(),
            pipeline_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: "rspec".to_string(),
            kind,
            status,
            protected: false,
            tag_list: Vec::new(),
            visibility: Visibility::Internal,
        }
    }

    #[test]
    fn test_needs_admission() {
        assert!(record(BuildKind::Build, BuildStatus::Created).needs_admission());
        assert!(!record(BuildKind::Bridge, BuildStatus::Created).needs_admission());
        assert!(!record(BuildKind::Build, BuildStatus::Pending).needs_admission());
    }
}
