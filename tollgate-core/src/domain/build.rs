//! Build domain types
//!
//! A build (job) is one unit of pipeline work that needs a runner. The
//! admission engine only ever looks at its [`BuildMatcher`] snapshot.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::dto::build::BuildRecord;

/// Visibility of the project owning a build
///
/// Selects which runner cost factor applies to the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Internal,
    Private,
}

/// Kind of pipeline entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildKind {
    /// Regular job, executed by a runner
    Build,

    /// Trigger for a downstream pipeline, never executed by a runner
    Bridge,
}

/// Lifecycle status of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Created,
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
    Skipped,
    Manual,
}

impl BuildStatus {
    /// Whether a build in this status can still be dropped by admission
    pub fn is_droppable(&self) -> bool {
        matches!(self, BuildStatus::Created)
    }
}

/// Matching snapshot of one or more builds
///
/// Builds of a pipeline that share every matching attribute are evaluated
/// once; the classification applies to each id in `build_ids`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildMatcher {
    build_ids: Vec<Uuid>,
    project_id: Uuid,
    protected: bool,
    tag_list: BTreeSet<String>,
    visibility: Visibility,
}

impl BuildMatcher {
    pub fn new<I, S>(
        build_id: Uuid,
        project_id: Uuid,
        protected: bool,
        tags: I,
        visibility: Visibility,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            build_ids: vec![build_id],
            project_id,
            protected,
            tag_list: tags.into_iter().map(Into::into).collect(),
            visibility,
        }
    }

    /// Groups builds with identical matching attributes into one matcher each
    ///
    /// Matchers come out in the order their first build was seen.
    pub fn group<'a>(records: impl IntoIterator<Item = &'a BuildRecord>) -> Vec<BuildMatcher> {
        let mut index: HashMap<(Uuid, bool, BTreeSet<String>, Visibility), usize> = HashMap::new();
        let mut matchers: Vec<BuildMatcher> = Vec::new();

        for record in records {
            let matcher = BuildMatcher::from(record);
            let key = (
                matcher.project_id,
                matcher.protected,
                matcher.tag_list.clone(),
                matcher.visibility,
            );

            match index.get(&key) {
                Some(&slot) => matchers[slot].build_ids.push(record.id),
                None => {
                    index.insert(key, matchers.len());
                    matchers.push(matcher);
                }
            }
        }

        matchers
    }

    pub fn build_ids(&self) -> &[Uuid] {
        &self.build_ids
    }

    pub fn project_id(&self) -> Uuid {
        self.project_id
    }

    /// True if the build's ref requires a protected runner
    pub fn protected(&self) -> bool {
        self.protected
    }

    pub fn tag_list(&self) -> &BTreeSet<String> {
        &self.tag_list
    }

    pub fn has_tags(&self) -> bool {
        !self.tag_list.is_empty()
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }
}

impl From<&BuildRecord> for BuildMatcher {
    fn from(record: &BuildRecord) -> Self {
        BuildMatcher::new(
            record.id,
            record.project_id,
            record.protected,
            record.tag_list.iter().cloned(),
            record.visibility,
        )
    }
}
