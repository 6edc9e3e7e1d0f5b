// src/services/mod.rs
pub mod gemini;
pub mod generation;
pub mod image_processor;
pub mod preset_store;
pub mod prompt_compiler;
pub mod redis_service;
pub mod workspace;

pub use gemini::GeminiClient;
pub use generation::GenerationService;
pub use image_processor::ImageProcessor;
pub use preset_store::{KeyValueStore, MemoryStore, PresetStore};
pub use redis_service::RedisStore;
pub use workspace::WorkspaceRegistry;
