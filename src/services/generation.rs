// src/services/generation.rs
use crate::errors::ThumbsmithError;
use crate::models::*;
use crate::services::gemini::{
    ContentGenerator, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    ImageConfig, InlineData, Part,
};
use crate::services::image_processor::{parse_data_uri, png_data_uri};
use crate::services::prompt_compiler::{self, PromptRequest};
use log::{error, info, warn};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;

pub const PROMPT_MODEL: &str = "gemini-3-pro-preview";
pub const IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
pub const EDIT_MODEL: &str = "gemini-2.5-flash-image";
pub const CHARACTER_MODEL: &str = "gemini-2.5-flash";

const PROMPT_THINKING_BUDGET: u32 = 32768;
const IMPROVE_THINKING_BUDGET: u32 = 16000;

pub const ANALYSIS_FALLBACK: &str = "Could not analyze image.";

const CHARACTER_INSTRUCTION: &str = "Describe this person's physical appearance in detail for an image generation prompt. Focus on: hair color/style, facial features, skin tone, glasses/accessories, and gender. Keep it concise (e.g., 'Young man with short brown messy hair, wearing glasses, light skin tone'). Do not describe clothing or background.";

/// Each operation is a single best-effort round trip; nothing is cached or retried.
pub struct GenerationService {
    backend: Arc<dyn ContentGenerator>,
}

impl GenerationService {
    pub fn new(backend: Arc<dyn ContentGenerator>) -> Self {
        Self { backend }
    }

    async fn call(
        &self,
        model: &str,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ThumbsmithError> {
        let start = Instant::now();
        let response = self.backend.generate_content(model, &request).await;
        info!(
            "{} answered in {}ms (ok={})",
            model,
            start.elapsed().as_millis(),
            response.is_ok()
        );
        response
    }

    pub async fn generate_prompt(
        &self,
        request: &PromptRequest,
    ) -> Result<GeneratedPrompt, ThumbsmithError> {
        let compiled = prompt_compiler::compile(request);

        let mut remote = GenerateContentRequest::new(vec![Part::text(compiled.body)])
            .system_instruction(compiled.system_instruction)
            .config(GenerationConfig::json(compiled.schema).thinking_budget(PROMPT_THINKING_BUDGET));
        if compiled.use_search {
            remote = remote.with_search();
        }

        let response = self.call(PROMPT_MODEL, remote).await?;
        let text = response
            .text()
            .ok_or_else(|| ThumbsmithError::EmptyResult("No text response generated".to_string()))?;

        parse_json(&text).inspect_err(|e| error!("Prompt response rejected: {}", e))
    }

    /// Returns the first generated image as a data URI.
    pub async fn generate_image(
        &self,
        prompt_text: &str,
        aspect_ratio: AspectRatio,
        resolution: ImageResolution,
    ) -> Result<String, ThumbsmithError> {
        let remote = GenerateContentRequest::new(vec![Part::text(prompt_text)]).config(
            GenerationConfig {
                image_config: Some(ImageConfig {
                    aspect_ratio,
                    image_size: resolution,
                }),
                ..GenerationConfig::default()
            },
        );

        let response = self.call(IMAGE_MODEL, remote).await?;
        response
            .first_inline_image()
            .map(png_data_uri)
            .ok_or(ThumbsmithError::NoImageReturned)
    }

    pub async fn edit_image(
        &self,
        image_data_uri: &str,
        instruction: &str,
    ) -> Result<String, ThumbsmithError> {
        let original = parse_data_uri(image_data_uri)?;
        let remote = GenerateContentRequest::new(vec![Part::inline(original), Part::text(instruction)]);

        let response = self.call(EDIT_MODEL, remote).await?;
        response
            .first_inline_image()
            .map(png_data_uri)
            .ok_or(ThumbsmithError::NoImageReturned)
    }

    pub async fn analyze_image(
        &self,
        image: &InlineImage,
        focus_mode: FocusMode,
    ) -> Result<String, ThumbsmithError> {
        let remote = GenerateContentRequest::new(vec![
            Part::inline(InlineData::from(image)),
            Part::text(analysis_instruction(focus_mode)),
        ]);

        let response = self.call(PROMPT_MODEL, remote).await?;
        Ok(response
            .text()
            .unwrap_or_else(|| ANALYSIS_FALLBACK.to_string()))
    }

    /// Never fails: a blank description is a valid outcome.
    pub async fn analyze_character_reference(&self, image: &InlineImage) -> String {
        let remote = GenerateContentRequest::new(vec![
            Part::inline(InlineData::from(image)),
            Part::text(CHARACTER_INSTRUCTION),
        ]);

        match self.call(CHARACTER_MODEL, remote).await {
            Ok(response) => response.text().unwrap_or_default(),
            Err(e) => {
                warn!("Character analysis failed: {}", e);
                String::new()
            }
        }
    }

    pub async fn improve_concept(
        &self,
        image: &InlineImage,
        creativity: CreativityLevel,
    ) -> Result<ConceptImprovement, ThumbsmithError> {
        let remote = GenerateContentRequest::new(vec![
            Part::inline(InlineData::from(image)),
            Part::text(improvement_instruction(creativity)),
        ])
        .config(
            GenerationConfig::json(prompt_compiler::improvement_schema())
                .thinking_budget(IMPROVE_THINKING_BUDGET),
        );

        let response = self.call(PROMPT_MODEL, remote).await?;
        let text = response
            .text()
            .ok_or_else(|| ThumbsmithError::EmptyResult("No response generated".to_string()))?;
        parse_json(&text)
    }

    /// Never fails: an empty list is returned when the lookup does not work out.
    pub async fn suggest_styles(&self, topic: &str) -> Vec<String> {
        let instruction = format!(
            "Find 5 trending visual aesthetic descriptions for \"{}\" on Pinterest. What styles are popular? Output a simple JSON array of strings (e.g. [\"Pastel minimalist with bold typography\", \"Dark mode neon cyber\"]).",
            topic
        );
        let remote = GenerateContentRequest::new(vec![Part::text(instruction)])
            .with_search()
            .config(GenerationConfig::json(prompt_compiler::suggestion_schema()));

        let text = match self.call(PROMPT_MODEL, remote).await {
            Ok(response) => response.text(),
            Err(e) => {
                warn!("Style suggestions failed: {}", e);
                None
            }
        };

        match text.map(|t| parse_json::<Vec<String>>(&t)) {
            Some(Ok(styles)) => styles,
            Some(Err(e)) => {
                warn!("Style suggestions unreadable: {}", e);
                Vec::new()
            }
            None => Vec::new(),
        }
    }
}

fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, ThumbsmithError> {
    serde_json::from_str(text.trim()).map_err(|e| ThumbsmithError::MalformedPayload(e.to_string()))
}

pub fn analysis_instruction(focus_mode: FocusMode) -> &'static str {
    match focus_mode {
        FocusMode::FullPrompt => {
            "Analyze this YouTube thumbnail. Reverse engineer it into a highly detailed AI image generation prompt in English. Describe the subject, lighting, composition, camera angle, and artistic style. Output ONLY the prompt text."
        }
        FocusMode::Composition => {
            "Analyze ONLY the composition, layout, and visual hierarchy of this thumbnail. Describe where elements are placed. Output in English."
        }
        FocusMode::ColorPalette => {
            "Analyze ONLY the color palette, lighting mood, and contrast techniques used in this thumbnail. Output in English."
        }
    }
}

pub fn improvement_instruction(creativity: CreativityLevel) -> String {
    let note = match creativity {
        CreativityLevel::ExtremeMakeover => {
            "NOTE: Be extremely creative. Change the style completely if needed to make it go viral. Suggest a radical new approach while keeping the core topic."
        }
        CreativityLevel::SubtlePolish => {
            "NOTE: Keep the original concept and composition, but improve lighting, quality, and clarity."
        }
    };

    format!(
        "Analyze this YouTube thumbnail image as an expert strategist.\n1. CRITIQUE: Identify specific weak points affecting Click-Through Rate (CTR). 2. IMPROVE: Create a BRAND NEW, highly optimized AI image generation prompt to re-create a BETTER version of this concept. {}\nEnsure the improved prompt is in ENGLISH.\nOutput JSON only.",
        note
    )
}
