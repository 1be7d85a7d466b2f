use action_backend::config::ServiceConfig;
use action_backend::inference::InferenceService;
use action_backend::inference::torch::TorchLoader;
use action_backend::pipeline::ActionPipeline;
use action_backend::preprocess::FramePreprocessor;
use action_backend::routes::{UploadLimits, configure_routes};
use action_backend::video::{FfmpegDecoder, FrameSampler};
use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use std::env;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = ServiceConfig::load().map_err(|e| {
        log::error!("Failed to load configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let decoder = Arc::new(FfmpegDecoder::new(&config.decoder.ffmpeg, &config.decoder.ffprobe));
    let sampler = FrameSampler::new(decoder);
    let preprocessor = FramePreprocessor::new(config.sampling.target_height, config.sampling.target_width);

    let service = Arc::new(InferenceService::new(
        &config.model.path,
        Box::new(TorchLoader::new(config.model.apply_softmax)),
    ));
    if let Err(e) = service.load() {
        log::error!("Failed to preload model at startup: {}", e);
        log::warn!("Serving without a model; uploads will be rejected until restart");
    }

    let pipeline = web::Data::new(ActionPipeline::new(
        sampler,
        preprocessor,
        service,
        config.sampling.num_frames,
        config.sampling.max_frames,
    ));

    let upload_dir = config.server.upload_root();
    std::fs::create_dir_all(&upload_dir)?;
    let limits = web::Data::new(UploadLimits {
        max_upload_bytes: config.server.max_upload_bytes,
        upload_dir,
    });

    let bind_address = config.bind_address();
    log::info!(
        "Sampling {} frames (max {}) at {}x{}",
        config.sampling.num_frames,
        config.sampling.max_frames,
        config.sampling.target_width,
        config.sampling.target_height
    );
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(pipeline.clone())
            .app_data(limits.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
