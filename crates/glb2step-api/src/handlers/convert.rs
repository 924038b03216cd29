//! GLB upload and conversion handler.

use axum::body::Body;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::Response;
use tokio::io::AsyncWriteExt;
use tracing::info;

use glb2step_core::error::AppError;
use glb2step_pipeline::models::is_glb_file_name;
use glb2step_pipeline::{ArtifactRole, ConversionError, Job};

use crate::error::ApiError;
use crate::state::AppState;

/// POST /convert: multipart upload of a `.glb`, responds with the STEP package
pub async fn convert(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let expose = state.config.conversion.expose_diagnostics;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("").to_string();
        if !is_glb_file_name(&file_name) {
            return Err(AppError::validation("Only .glb files are accepted").into());
        }

        let job = state
            .workspace
            .create_job()
            .await
            .map_err(|e| ConversionError::from(e).into_app_error(expose))?;

        info!(job_id = %job.id(), file_name = %file_name, "Accepted upload");

        let received = match receive_upload(&job, field).await {
            Ok(bytes) => bytes,
            Err(e) => {
                job.release().await;
                return Err(e);
            }
        };

        return run_job(&state, job, received).await;
    }

    Err(AppError::validation("file is required").into())
}

/// Stream the upload into the job's input artifact.
async fn receive_upload(job: &Job, mut field: Field<'_>) -> Result<u64, ApiError> {
    let path = job.artifact_path(ArtifactRole::Input);
    let mut file = tokio::fs::File::create(&path).await?;
    let mut received = 0u64;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::validation(format!("Upload read error: {e}")))?
    {
        file.write_all(&chunk).await?;
        received += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(received)
}

async fn run_job(state: &AppState, job: Job, received: u64) -> Result<Response, ApiError> {
    let expose = state.config.conversion.expose_diagnostics;
    let job_id = job.id();

    let deliverable = match state.pipeline.run(&job).await {
        Ok(d) => d,
        Err(e) => {
            job.release().await;
            return Err(e.into_app_error(expose).into());
        }
    };

    let data = tokio::fs::read(&deliverable.path).await;
    job.release().await;
    let data = data?;

    info!(
        job_id = %job_id,
        uploaded_bytes = received,
        delivered_bytes = data.len(),
        package = deliverable.kind.download_name(),
        "Conversion delivered"
    );

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, deliverable.kind.media_type())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", deliverable.kind.download_name()),
        )
        .header(header::CONTENT_LENGTH, data.len())
        .body(Body::from(data))
        .map_err(|e| AppError::internal(format!("Response build failed: {e}")))?;

    Ok(response)
}
