// src/errors.rs
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThumbsmithError {
    #[error("Remote call failed: {0}")]
    RemoteCall(String),

    #[error("Response did not match the expected schema: {0}")]
    MalformedPayload(String),

    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("No image returned by the model")]
    NoImageReturned,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ThumbsmithError {
    /// True for failures of the remote round trip itself or of its payload.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ThumbsmithError::RemoteCall(_)
                | ThumbsmithError::MalformedPayload(_)
                | ThumbsmithError::EmptyResult(_)
                | ThumbsmithError::NoImageReturned
        )
    }

    pub fn during(self, action: Action) -> ActionError {
        ActionError {
            action,
            source: self,
        }
    }
}

impl From<redis::RedisError> for ThumbsmithError {
    fn from(e: redis::RedisError) -> Self {
        ThumbsmithError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for ThumbsmithError {
    fn from(e: serde_json::Error) -> Self {
        ThumbsmithError::Serialization(e.to_string())
    }
}

/// User actions whose failures are reported with a fixed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    GeneratePrompt,
    GenerateImage,
    EditImage,
    AnalyzeImage,
    ImproveConcept,
    RenderRemake,
    SavePreset,
    DeletePreset,
    LoadPreset,
    ReadUpload,
}

impl Action {
    pub fn failure_message(&self) -> &'static str {
        match self {
            Action::GeneratePrompt => "Failed to generate prompt.",
            Action::GenerateImage => "Failed to generate image.",
            Action::EditImage => "Failed to edit image.",
            Action::AnalyzeImage | Action::ImproveConcept => "Analysis failed.",
            Action::RenderRemake => "Generation failed.",
            Action::SavePreset => "Failed to save preset.",
            Action::DeletePreset => "Failed to delete preset.",
            Action::LoadPreset => "Preset not found.",
            Action::ReadUpload => "Could not read the uploaded image.",
        }
    }
}

/// A failure caught at the boundary of a user action.
#[derive(Error, Debug)]
#[error("{} {}", .action.failure_message(), .source)]
pub struct ActionError {
    pub action: Action,
    #[source]
    pub source: ThumbsmithError,
}

impl ResponseError for ActionError {
    fn status_code(&self) -> StatusCode {
        match &self.source {
            e if e.is_remote() => StatusCode::BAD_GATEWAY,
            ThumbsmithError::Validation(_) | ThumbsmithError::ImageProcessing(_) => {
                StatusCode::BAD_REQUEST
            }
            ThumbsmithError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.action.failure_message(),
            "message": self.source.to_string()
        }))
    }
}
