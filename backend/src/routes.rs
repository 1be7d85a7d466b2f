use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError, web};
use futures::TryStreamExt;
use log::error;
use serde::Deserialize;
use shared::{ActionLabel, ErrorResponse, HealthResponse, PredictionResponse, ServiceInfo};
use std::num::NonZeroUsize;
use std::path::PathBuf;

use crate::inference::InferenceError;
use crate::pipeline::{ActionPipeline, PipelineError};
use crate::storage::{TempUpload, UploadError};
use crate::video::VideoError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("No video file provided. Send it as multipart field 'file'.")]
    MissingFile,
    #[error("Malformed upload: {0}")]
    BadUpload(String),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Error processing video: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Upload(UploadError::InvalidFormat { .. }) => "invalid_format",
            ApiError::Upload(UploadError::TooLarge { .. }) => "payload_too_large",
            ApiError::Upload(UploadError::Io(_)) => "internal",
            ApiError::Pipeline(PipelineError::FrameLimit { .. }) => "invalid_query",
            ApiError::Pipeline(PipelineError::Video(e)) => match e {
                VideoError::InvalidVideo { .. } => "invalid_video",
                VideoError::TooShort { .. } => "too_short",
                VideoError::UnreadableFrameRate(_) => "unreadable_frame_rate",
                VideoError::FrameRead { .. } => "frame_read",
            },
            ApiError::Pipeline(PipelineError::Inference(e)) => match e {
                InferenceError::ModelNotFound(_) => "model_not_found",
                InferenceError::ModelLoad(_) => "model_load",
                InferenceError::NotReady => "not_ready",
                InferenceError::ShapeMismatch { .. } => "shape_mismatch",
                InferenceError::InvalidDistribution(_) => "invalid_distribution",
                InferenceError::Classifier(_) => "internal",
            },
            ApiError::MissingFile => "missing_file",
            ApiError::BadUpload(_) => "invalid_upload",
            ApiError::InvalidQuery(_) => "invalid_query",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            "invalid_format" | "missing_file" | "invalid_upload" | "invalid_query" | "invalid_video"
            | "too_short" | "unreadable_frame_rate" | "frame_read" => StatusCode::BAD_REQUEST,
            "payload_too_large" => StatusCode::PAYLOAD_TOO_LARGE,
            "not_ready" | "model_not_found" | "model_load" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed ({}): {}", self.kind(), self);
        } else {
            log::warn!("Request rejected ({}): {}", self.kind(), self);
        }
        HttpResponse::build(status).json(ErrorResponse::new(self.kind(), self.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_upload_bytes: usize,
    pub upload_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub num_frames: Option<NonZeroUsize>,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::InvalidQuery(err.to_string()).into()),
    )
    .service(web::resource("/").route(web::get().to(index)))
    .service(web::resource("/upload_video").route(web::post().to(upload_video)))
    .service(web::resource("/health").route(web::get().to(health)))
    .service(web::resource("/actions").route(web::get().to(actions)));
}

async fn upload_video(
    pipeline: web::Data<ActionPipeline>,
    limits: web::Data<UploadLimits>,
    query: web::Query<UploadQuery>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let num_frames = pipeline.frame_count(query.num_frames)?;
    let mut upload = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ApiError::BadUpload(e.to_string()))?
    {
        if field.name() != Some("file") {
            while field
                .try_next()
                .await
                .map_err(|e| ApiError::BadUpload(e.to_string()))?
                .is_some()
            {}
            continue;
        }

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string)
            .ok_or(ApiError::MissingFile)?;
        let mut temp = TempUpload::create(&limits.upload_dir, &filename, limits.max_upload_bytes)?;
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| ApiError::BadUpload(e.to_string()))?
        {
            temp.write_chunk(&chunk)?;
        }
        temp.finish()?;
        log::info!("Received upload {} ({} bytes)", filename, temp.len());
        upload = Some(temp);
        break;
    }

    let upload = upload.ok_or(ApiError::MissingFile)?;
    let worker = pipeline.clone();
    // Removed only after the decoder is done with it, even if the client
    // disconnects mid-request.
    let result = web::block(move || {
        let result = worker.recognize(upload.path(), num_frames);
        drop(upload);
        result
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(PredictionResponse::complete(result.label, result.confidence)))
}

async fn health(pipeline: web::Data<ActionPipeline>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        model_loaded: pipeline.service().is_ready(),
    })
}

async fn actions() -> HttpResponse {
    HttpResponse::Ok().json(ActionLabel::ALL)
}

async fn index() -> HttpResponse {
    HttpResponse::Ok().json(ServiceInfo {
        message: "Action Recognition API is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: vec![
            "POST /upload_video".to_string(),
            "GET /health".to_string(),
            "GET /actions".to_string(),
        ],
    })
}
