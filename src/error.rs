use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("unknown issue field `{0}`")]
    UnknownField(String),

    #[error("cycle {cycle_id} not found in project {project_id} of workspace `{workspace_slug}`")]
    CycleNotFound {
        workspace_slug: String,
        project_id: Uuid,
        cycle_id: Uuid,
    },

    #[error("cycle {cycle_id} has no {field}")]
    MissingCycleDate { cycle_id: Uuid, field: &'static str },

    #[error("project {project_id} already belongs to a workspace other than `{workspace_slug}`")]
    ProjectWorkspaceMismatch {
        project_id: Uuid,
        workspace_slug: String,
    },

    #[error("cycle {cycle_id} already belongs to a project other than {project_id}")]
    CycleProjectMismatch { cycle_id: Uuid, project_id: Uuid },
}
