// src/main.rs
use actix_web::{App, HttpServer, middleware, web};
use anyhow::Context;
use log::{info, warn};
use std::sync::Arc;

mod config;
mod errors;
mod handlers;
mod models;
mod services;

use crate::config::AppConfig;
use crate::services::{
    GeminiClient, GenerationService, ImageProcessor, KeyValueStore, MemoryStore, PresetStore,
    RedisStore, WorkspaceRegistry,
};

#[derive(Clone)]
pub struct AppState {
    pub generation: Arc<GenerationService>,
    pub presets: Arc<PresetStore>,
    pub workspaces: Arc<WorkspaceRegistry>,
    pub image_processor: Arc<ImageProcessor>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting Thumbsmith service...");
    let config = AppConfig::from_env().context("loading configuration")?;

    // Initialize services
    let gemini = GeminiClient::new(
        config.api_key.clone(),
        config.base_url.clone(),
        config.request_timeout,
    )?;
    let store: Arc<dyn KeyValueStore> = match &config.redis_url {
        Some(url) => Arc::new(
            RedisStore::new(url)
                .await
                .with_context(|| format!("connecting to Redis at {}", url))?,
        ),
        None => {
            warn!("REDIS_URL not set; presets are kept in memory only");
            Arc::new(MemoryStore::default())
        }
    };

    let app_state = AppState {
        generation: Arc::new(GenerationService::new(Arc::new(gemini))),
        presets: Arc::new(PresetStore::open(store).await?),
        workspaces: Arc::new(WorkspaceRegistry::with_limits(config.workspace_limits)),
        image_processor: Arc::new(ImageProcessor::new(config.max_upload_bytes)),
    };

    // Edit requests carry the image as a base64 data URI.
    let json_limit = config.json_limit();

    info!("Starting HTTP server on {}", config.bind);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().limit(json_limit))
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind(&config.bind)?
    .run()
    .await?;

    Ok(())
}
