use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use codecollab_core::{
    AppError, StorageContext,
    models::{NewProject, Project, ProjectId, ProjectStatus},
};
use codecollab_github::AnalyticsSnapshot;
use serde::{Deserialize, Serialize};

use crate::{AppState, handlers::common::JsonBody};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    #[serde(default)]
    user_email: Option<String>,
    #[serde(default)]
    repo_link: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

fn parse_id(id: &str) -> Result<ProjectId, AppError> {
    id.parse().map_err(|_| AppError::validation("Invalid project ID"))
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Project>>, AppError> {
    let projects = state.db.get_projects().await.or_storage("Failed to fetch projects")?;
    Ok(Json(projects))
}

pub async fn create(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateProjectRequest>,
) -> Result<Response, AppError> {
    let new_project =
        NewProject::new(request.user_email.as_deref(), request.repo_link.as_deref())
            .map_err(|e| AppError::validation(e.to_string()))?;
    let project =
        state.db.create_project(&new_project).await.or_storage("Failed to add project")?;
    tracing::info!("Added project {} ({})", project.id, project.repo_link);
    Ok((StatusCode::CREATED, Json(project)).into_response())
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<UpdateStatusRequest>,
) -> Result<Json<Project>, AppError> {
    let status = request
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::validation("Status is required"))?;
    let id = parse_id(&id)?;
    let status = status.parse::<ProjectStatus>().map_err(|_| {
        tracing::debug!(
            "Rejected status {:?}, expected one of {:?}",
            status,
            ProjectStatus::variants()
        );
        AppError::validation("Invalid status")
    })?;
    let project = state
        .db
        .update_project_status(&id, status)
        .await
        .or_storage("Failed to update project")?
        .ok_or_else(|| AppError::not_found("Project not found"))?;
    tracing::info!("Project {} is now {}", project.id, project.status);
    Ok(Json(project))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_id(&id)?;
    if !state.db.delete_project(&id).await.or_storage("Failed to delete project")? {
        return Err(AppError::not_found("Project not found"));
    }
    tracing::info!("Deleted project {}", id);
    Ok(Json(MessageResponse { message: "Project deleted successfully" }))
}

pub async fn analytics(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AnalyticsSnapshot>, AppError> {
    let id = parse_id(&id)?;
    let project = state
        .db
        .get_project(&id)
        .await
        .or_storage("Failed to fetch project")?
        .ok_or_else(|| AppError::not_found("Project not found"))?;
    Ok(Json(state.github.fetch_analytics(&project.repo_link).await))
}
