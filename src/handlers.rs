// src/handlers.rs
use crate::errors::{Action, ActionError, ThumbsmithError};
use crate::models::*;
use crate::services::image_processor::to_data_uri;
use crate::services::prompt_compiler::{self, PromptRequest};
use crate::services::gemini::InlineData;
use crate::services::workspace::ActionSlot;
use crate::AppState;
use actix_multipart::Multipart;
use actix_web::{HttpRequest, HttpResponse, web};
use futures_util::TryStreamExt;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

pub const SESSION_HEADER: &str = "X-Session-Id";

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/prompts", web::post().to(generate_prompt))
            .route("/prompts/preview", web::post().to(preview_prompt))
            .route("/images", web::post().to(generate_image))
            .route("/images/edit", web::post().to(edit_image))
            .route("/analyze", web::post().to(analyze_image))
            .route("/remake", web::post().to(improve_concept))
            .route("/remake/render", web::post().to(render_remake))
            .route("/character", web::post().to(analyze_character))
            .route("/styles/suggestions", web::get().to(suggest_styles))
            .route("/workspace", web::get().to(get_workspace))
            .route("/gallery", web::get().to(get_gallery))
            .route("/presets", web::get().to(list_presets))
            .route("/presets", web::post().to(save_preset))
            .route("/presets/{id}", web::get().to(get_preset))
            .route("/presets/{id}", web::delete().to(delete_preset))
            .route("/presets/{id}/load", web::post().to(load_preset)),
    )
    .route("/health", web::get().to(health_check));
}

/// Reads the caller's session id, minting one when the header is missing or invalid.
fn session_of(req: &HttpRequest) -> Uuid {
    req.headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .unwrap_or_else(Uuid::new_v4)
}

fn reply<T: Serialize>(session: Uuid, body: &T) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((SESSION_HEADER, session.to_string()))
        .json(body)
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePromptBody {
    pub topic: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub reference_url: Option<String>,
    #[serde(default = "default_true")]
    pub use_trends: bool,
    #[serde(default)]
    pub elements: Option<CompositionModel>,
}

impl GeneratePromptBody {
    fn into_request(self) -> Result<PromptRequest, ThumbsmithError> {
        if self.topic.trim().is_empty() {
            return Err(ThumbsmithError::Validation("Topic is required".to_string()));
        }
        let topic =
            prompt_compiler::effective_topic(&self.topic, &self.style, &self.category, &self.game_name);

        Ok(PromptRequest {
            topic,
            style: self.style,
            reference_url: self.reference_url,
            use_trends: self.use_trends,
            elements: self.elements,
        })
    }
}

pub async fn generate_prompt(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<GeneratePromptBody>,
) -> Result<HttpResponse, ActionError> {
    let session = session_of(&req);
    let request = body
        .into_inner()
        .into_request()
        .map_err(|e| e.during(Action::GeneratePrompt))?;

    let token = data.workspaces.issue(session, ActionSlot::Prompt);
    let prompt = data
        .generation
        .generate_prompt(&request)
        .await
        .map_err(|e| e.during(Action::GeneratePrompt))?;

    let applied = data.workspaces.apply_if_current(token, |state| {
        state.generated_prompt = Some(prompt.clone());
        state.current_image = None;
    });

    info!("Generated prompt \"{}\" for session {}", prompt.title, session);
    Ok(reply(session, &json!({ "prompt": prompt, "applied": applied })))
}

pub async fn preview_prompt(
    req: HttpRequest,
    body: web::Json<GeneratePromptBody>,
) -> Result<HttpResponse, ActionError> {
    let session = session_of(&req);
    let request = body
        .into_inner()
        .into_request()
        .map_err(|e| e.during(Action::GeneratePrompt))?;
    let compiled = prompt_compiler::compile(&request);

    Ok(reply(
        session,
        &json!({
            "instruction": compiled.instruction(),
            "systemInstruction": compiled.system_instruction,
            "body": compiled.body,
            "schema": compiled.schema,
            "useSearch": compiled.use_search
        }),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateImageBody {
    pub prompt_text: Option<String>,
    pub aspect_ratio: AspectRatio,
    pub resolution: ImageResolution,
    pub negative_prompt: String,
}

pub async fn generate_image(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<GenerateImageBody>,
) -> Result<HttpResponse, ActionError> {
    let session = session_of(&req);
    let body = body.into_inner();

    let prompt_text = body
        .prompt_text
        .filter(|p| !p.trim().is_empty())
        .or_else(|| {
            data.workspaces
                .state(session)
                .generated_prompt
                .map(|p| p.prompt_text)
        })
        .ok_or_else(|| {
            ThumbsmithError::Validation("No prompt to visualize".to_string())
                .during(Action::GenerateImage)
        })?;
    let final_prompt = prompt_compiler::final_image_prompt(&prompt_text, &body.negative_prompt);

    let token = data.workspaces.issue(session, ActionSlot::Image);
    let image_url = data
        .generation
        .generate_image(&final_prompt, body.aspect_ratio, body.resolution)
        .await
        .map_err(|e| e.during(Action::GenerateImage))?;

    data.workspaces
        .record_image(session, &image_url, &final_prompt, body.aspect_ratio);
    let applied = data
        .workspaces
        .apply_if_current(token, |state| state.current_image = Some(image_url.clone()));

    Ok(reply(
        session,
        &json!({ "imageUrl": image_url, "prompt": final_prompt, "applied": applied }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditImageBody {
    pub instruction: String,
    #[serde(default)]
    pub image_data_uri: Option<String>,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
}

pub async fn edit_image(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<EditImageBody>,
) -> Result<HttpResponse, ActionError> {
    let session = session_of(&req);
    let body = body.into_inner();

    if body.instruction.trim().is_empty() {
        return Err(ThumbsmithError::Validation("Edit instruction is required".to_string())
            .during(Action::EditImage));
    }
    let state = data.workspaces.state(session);
    let original = body
        .image_data_uri
        .or(state.current_image)
        .ok_or_else(|| {
            ThumbsmithError::Validation("No image to edit".to_string()).during(Action::EditImage)
        })?;

    let token = data.workspaces.issue(session, ActionSlot::Image);
    // On failure the current image is left as it was.
    let image_url = data
        .generation
        .edit_image(&original, &body.instruction)
        .await
        .map_err(|e| e.during(Action::EditImage))?;

    let prompt = state
        .generated_prompt
        .map(|p| p.prompt_text)
        .unwrap_or_else(|| "Edited Image".to_string());
    data.workspaces
        .record_image(session, &image_url, &prompt, body.aspect_ratio);
    let applied = data
        .workspaces
        .apply_if_current(token, |state| state.current_image = Some(image_url.clone()));

    Ok(reply(session, &json!({ "imageUrl": image_url, "applied": applied })))
}

async fn read_upload(mut payload: Multipart, limit: usize) -> Result<Vec<u8>, ThumbsmithError> {
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ThumbsmithError::Validation(format!("Invalid upload: {}", e)))?
    {
        let mut image_data = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| ThumbsmithError::Validation(format!("Invalid upload: {}", e)))?
        {
            if image_data.len() + chunk.len() > limit {
                return Err(ThumbsmithError::Validation(format!(
                    "Upload exceeds {} bytes",
                    limit
                )));
            }
            image_data.extend_from_slice(&chunk);
        }

        if !image_data.is_empty() {
            return Ok(image_data);
        }
    }

    Err(ThumbsmithError::Validation("No image uploaded".to_string()))
}

async fn prepared_upload(
    data: &AppState,
    payload: Multipart,
) -> Result<InlineImage, ActionError> {
    let bytes = read_upload(payload, data.image_processor.max_upload_bytes())
        .await
        .map_err(|e| e.during(Action::ReadUpload))?;
    data.image_processor
        .prepare_upload(&bytes)
        .map_err(|e| e.during(Action::ReadUpload))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AnalyzeQuery {
    pub focus: FocusMode,
}

pub async fn analyze_image(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<AnalyzeQuery>,
    payload: Multipart,
) -> Result<HttpResponse, ActionError> {
    let session = session_of(&req);
    let image = prepared_upload(&data, payload).await?;

    let token = data.workspaces.issue(session, ActionSlot::Analysis);
    let text = data
        .generation
        .analyze_image(&image, query.focus)
        .await
        .map_err(|e| e.during(Action::AnalyzeImage))?;

    let applied = data
        .workspaces
        .apply_if_current(token, |state| state.analysis = Some(text.clone()));

    Ok(reply(
        session,
        &json!({ "text": text, "focus": query.focus, "applied": applied }),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RemakeQuery {
    pub creativity: CreativityLevel,
}

pub async fn improve_concept(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<RemakeQuery>,
    payload: Multipart,
) -> Result<HttpResponse, ActionError> {
    let session = session_of(&req);
    let image = prepared_upload(&data, payload).await?;

    let token = data.workspaces.issue(session, ActionSlot::Remake);
    let improvement = data
        .generation
        .improve_concept(&image, query.creativity)
        .await
        .map_err(|e| e.during(Action::ImproveConcept))?;

    let applied = data.workspaces.apply_if_current(token, |state| {
        state.improvement = Some(improvement.clone());
        state.remake_image = None;
    });

    Ok(reply(
        session,
        &json!({ "improvement": improvement, "applied": applied }),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderRemakeBody {
    pub improved_prompt: Option<String>,
}

pub async fn render_remake(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: Option<web::Json<RenderRemakeBody>>,
) -> Result<HttpResponse, ActionError> {
    let session = session_of(&req);
    let supplied = body.and_then(|b| b.into_inner().improved_prompt);

    let prompt = supplied
        .filter(|p| !p.trim().is_empty())
        .or_else(|| {
            data.workspaces
                .state(session)
                .improvement
                .map(|i| i.improved_prompt)
        })
        .ok_or_else(|| {
            ThumbsmithError::Validation("No improved prompt to render".to_string())
                .during(Action::RenderRemake)
        })?;

    let aspect_ratio = AspectRatio::Landscape16x9;
    let token = data.workspaces.issue(session, ActionSlot::RemakeImage);
    let image_url = data
        .generation
        .generate_image(&prompt, aspect_ratio, ImageResolution::TwoK)
        .await
        .map_err(|e| e.during(Action::RenderRemake))?;

    data.workspaces
        .record_image(session, &image_url, &prompt, aspect_ratio);
    let applied = data
        .workspaces
        .apply_if_current(token, |state| state.remake_image = Some(image_url.clone()));

    Ok(reply(session, &json!({ "imageUrl": image_url, "applied": applied })))
}

/// A remote failure yields a blank description rather than an error.
pub async fn analyze_character(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ActionError> {
    let session = session_of(&req);
    let image = prepared_upload(&data, payload).await?;
    let character_image = to_data_uri(&InlineData::from(&image));

    let token = data.workspaces.issue(session, ActionSlot::Character);
    let description = data.generation.analyze_character_reference(&image).await;
    if description.is_empty() {
        warn!("No character description for session {}", session);
    }

    let applied = data.workspaces.apply_if_current(token, |state| {
        state.character_description = Some(description.clone())
    });

    Ok(reply(
        session,
        &json!({
            "characterDescription": description,
            "characterImage": character_image,
            "applied": applied
        }),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SuggestionQuery {
    pub topic: String,
}

pub async fn suggest_styles(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<SuggestionQuery>,
) -> HttpResponse {
    let session = session_of(&req);
    let topic = query.topic.trim();
    if topic.is_empty() {
        return reply(session, &json!({ "suggestions": [] }));
    }

    let token = data.workspaces.issue(session, ActionSlot::Suggestions);
    let suggestions = data.generation.suggest_styles(topic).await;
    data.workspaces
        .apply_if_current(token, |state| state.style_suggestions = suggestions.clone());

    reply(session, &json!({ "suggestions": suggestions }))
}

pub async fn get_workspace(req: HttpRequest, data: web::Data<AppState>) -> HttpResponse {
    let session = session_of(&req);
    reply(session, &data.workspaces.state(session))
}

pub async fn get_gallery(req: HttpRequest, data: web::Data<AppState>) -> HttpResponse {
    let session = session_of(&req);
    reply(session, &json!({ "items": data.workspaces.gallery(session) }))
}

pub async fn list_presets(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "presets": data.presets.list().await }))
}

#[derive(Debug, Deserialize)]
pub struct SavePresetBody {
    pub name: String,
    #[serde(flatten)]
    pub snapshot: PresetSnapshot,
}

pub async fn save_preset(
    data: web::Data<AppState>,
    body: web::Json<SavePresetBody>,
) -> Result<HttpResponse, ActionError> {
    let body = body.into_inner();
    let id = data
        .presets
        .save(&body.name, body.snapshot)
        .await
        .map_err(|e| e.during(Action::SavePreset))?;

    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

pub async fn get_preset(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ActionError> {
    let preset = data
        .presets
        .get(&path.into_inner())
        .await
        .map_err(|e| e.during(Action::LoadPreset))?;

    Ok(HttpResponse::Ok().json(&preset))
}

/// Merges the preset into the caller's current form state and returns the result.
pub async fn load_preset(
    data: web::Data<AppState>,
    path: web::Path<String>,
    current: Option<web::Json<PresetSnapshot>>,
) -> Result<HttpResponse, ActionError> {
    let current = current.map(|c| c.into_inner()).unwrap_or_default();
    let snapshot = data
        .presets
        .load(&path.into_inner(), current)
        .await
        .map_err(|e| e.during(Action::LoadPreset))?;

    Ok(HttpResponse::Ok().json(&snapshot))
}

pub async fn delete_preset(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ActionError> {
    data.presets
        .delete(&path.into_inner())
        .await
        .map_err(|e| e.during(Action::DeletePreset))?;

    Ok(HttpResponse::NoContent().finish())
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "thumbsmith",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
