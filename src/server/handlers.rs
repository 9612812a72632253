use crate::core::archive::PackedArchive;
use crate::core::naming::project_slug;
use crate::domain::model::{GenerateRequest, ProjectGraph};
use crate::server::error::ApiError;
use crate::server::AppState;
use crate::templates::TemplateInfo;
use crate::utils::error::ScaffoldError;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use bytes::Bytes;
use serde::Serialize;
use tokio::io::AsyncReadExt;

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub timestamp: String,
    pub service: &'static str,
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        timestamp: chrono::Utc::now().to_rfc3339(),
        service: "Kontrol Scaffold API",
    })
}

pub async fn templates(State(state): State<AppState>) -> Json<Vec<TemplateInfo>> {
    Json(state.engine.registry().catalogue())
}

pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let graph = resolve_graph(&state, request).await?;

    let filename = format!("{}.zip", project_slug(&graph.name));
    let archive = state.engine.clone().generate_async(graph).await?;
    tracing::info!("Sending {} ({} bytes)", filename, archive.len());

    let len = archive.len();
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .header(header::CONTENT_LENGTH, len)
        .body(archive_body(archive))
        .map_err(|e| ApiError::Scaffold(ScaffoldError::internal(e.to_string())))
}

async fn resolve_graph(state: &AppState, request: GenerateRequest) -> Result<ProjectGraph, ApiError> {
    let Some(project_id) = request.project_id.clone() else {
        return Ok(request.into_graph());
    };
    if !request.is_reload() {
        tracing::debug!("Generating project {} from the submitted graph", project_id);
        return Ok(request.into_graph());
    }

    let Some(store) = &state.store else {
        tracing::warn!("Project {} requested but no project store is configured", project_id);
        return Err(ScaffoldError::ProjectNotFound { id: project_id }.into());
    };
    let mut graph = store.load_project(&project_id).await?;
    if graph.name.trim().is_empty() {
        graph.name = request.project_name;
    }
    tracing::info!("Loaded project {} ({} services)", project_id, graph.services.len());
    Ok(graph)
}

fn archive_body(archive: PackedArchive) -> Body {
    match archive {
        PackedArchive::Memory(bytes) => Body::from(bytes),
        PackedArchive::Spooled { file, .. } => {
            let file = tokio::fs::File::from_std(file);
            let stream = futures::stream::unfold(Some(file), |file| async move {
                let mut file = file?;
                let mut buf = vec![0u8; CHUNK_SIZE];
                match file.read(&mut buf).await {
                    Ok(0) => None,
                    Ok(n) => {
                        buf.truncate(n);
                        Some((Ok(Bytes::from(buf)), Some(file)))
                    }
                    Err(e) => Some((Err(e), None)),
                }
            });
            Body::from_stream(stream)
        }
    }
}
