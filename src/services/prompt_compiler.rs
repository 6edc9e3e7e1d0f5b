// src/services/prompt_compiler.rs
//! Turns the generator form into the instruction sent to the prompt model.
//!
//! Everything here is pure: the same request always compiles to the same bytes.

use crate::models::*;
use serde::Deserialize;
use serde_json::{Value, json};

const SYSTEM_INSTRUCTION: &str = r#"You are an elite YouTube Thumbnail Strategist and AI Prompt Engineer (Midjourney/DALL-E 3 Expert).
Your goal is to create high-performing, click-worthy thumbnail prompts that look professional, not generic AI art.

CORE PRINCIPLES:
1. **Visual Hierarchy**: Clear focal point, high contrast between subject and background.
2. **Professional Aesthetics**: Use terms like "8k resolution", "unreal engine 5 render", "studio lighting", "octane render", "sharp focus".
3. **Graphical Elements**: Incorporate arrows, circles, speed lines, or emojis as 3D or graphical elements within the scene if relevant to the style.
4. **Face/Faceless**: Respect the user's choice to show a face or be faceless.

CRITICAL OUTPUT RULES:
1. The output JSON must be in English. Even if the topic provided is in another language, translate the logic and visual description into English.
2. If the user requests text in a specific language (e.g. Persian), the instruction in the prompt should say: 'Text in [Language] saying "[Text]"'.
3. Output valid JSON only."#;

const VISUAL_BOILERPLATE: &str = "ADDITIONAL VISUAL INSTRUCTIONS:
- Include graphical elements like arrows, circles, or icons (3D rendered) if they enhance the click-through rate.
- Make it look like a high-budget YouTube thumbnail, not a standard stock photo.
- Ensure lighting is dramatic and cinematic.";

pub const TASK_FOOTER: &str = "Instructions:
1. Analyze the topic and constraints.
2. Create a detailed image generation prompt in ENGLISH.
3. Break down the prompt into semantic segments (Subject, Action, Environment, Lighting, Composition).";

pub const NO_TEXT_DIRECTIVE: &str =
    "- NO TEXT: Do not include any text or words in the image. Focus purely on visuals.";

const TRENDS_DIRECTIVE: &str = "Please search for current trending visual styles for this niche on YouTube in late 2024/2025 and incorporate them.";

/// Inputs of a prompt-generation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptRequest {
    pub topic: String,
    pub style: String,
    pub reference_url: Option<String>,
    pub use_trends: bool,
    pub elements: Option<CompositionModel>,
}

impl PromptRequest {
    fn reference_url(&self) -> Option<&str> {
        self.reference_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPrompt {
    pub system_instruction: String,
    pub body: String,
    pub schema: Value,
    /// Whether the web-search tool should be offered to the model.
    pub use_search: bool,
}

impl CompiledPrompt {
    /// The complete instruction: system framing followed by the body.
    pub fn instruction(&self) -> String {
        format!("{}\n\n{}", self.system_instruction, self.body)
    }
}

pub fn compile(request: &PromptRequest) -> CompiledPrompt {
    let mut sections = vec![format!(
        "Video Topic (Input): {}\nDesired Style: {}",
        request.topic, request.style
    )];

    if let Some(elements) = &request.elements {
        let mut constraints = String::from("Specific Composition Constraints:");
        for line in composition_constraints(elements) {
            constraints.push('\n');
            constraints.push_str(&line);
        }
        sections.push(constraints);
    }

    let mut augmentation = Vec::new();
    if let Some(url) = request.reference_url() {
        augmentation.push(format!(
            "REFERENCE URL: {}\n(If this is a valid URL, use the googleSearch tool to understand the visual style of this page/video and incorporate it).",
            url
        ));
    }
    if request.use_trends {
        augmentation.push(TRENDS_DIRECTIVE.to_string());
    }
    if !augmentation.is_empty() {
        sections.push(augmentation.join("\n"));
    }

    sections.push(VISUAL_BOILERPLATE.to_string());
    sections.push(TASK_FOOTER.to_string());

    CompiledPrompt {
        system_instruction: SYSTEM_INSTRUCTION.to_string(),
        body: sections.join("\n\n"),
        schema: prompt_schema(),
        use_search: request.use_trends || request.reference_url().is_some(),
    }
}

/// One directive per line, in the fixed order the prompt model expects.
pub fn composition_constraints(elements: &CompositionModel) -> Vec<String> {
    let mut lines = Vec::new();

    let faceless = elements.face_visibility == FaceVisibility::Faceless;
    let mut character = if faceless {
        "- CHARACTER MODE: FACELESS. Focus on hands, body language, holding objects, or back view. Do NOT show the face.".to_string()
    } else {
        match non_blank(elements.character_description.as_deref()) {
            Some(description) => format!(
                "- MAIN CHARACTER: {}. Ensure the face is high quality, expressive, and detailed.",
                description
            ),
            None => "- MAIN CHARACTER: Create a generic but expressive character suitable for the topic."
                .to_string(),
        }
    };
    character.push_str(&format!(
        " Position the character on the {} side of the frame.",
        elements.character_position
    ));
    lines.push(character);

    text_constraints(elements, &mut lines);

    if elements.ai_optimize_background {
        lines.push("- BACKGROUND OPTIMIZATION: AI, select the most engaging background that suits the niche (e.g. detailed environment vs solid color) to separate the subject. Add depth.".to_string());
    } else {
        let detail = match elements.background_mode {
            BackgroundMode::Standard => "",
            BackgroundMode::Blurred => " Heavy bokeh/depth of field to isolate subject.",
            BackgroundMode::SolidWhite => " Clean studio white background for professional look.",
            BackgroundMode::GreenScreen => " Solid chroma key green background.",
            BackgroundMode::DetailedEnvironment => {
                " Rich, detailed, immersive environment related to topic."
            }
        };
        lines.push(format!("- BACKGROUND: Mode {}.{}", elements.background_mode, detail));
    }

    if elements.ai_optimize_framing {
        lines.push("- FRAMING OPTIMIZATION: AI, choose the best camera angle (Close-up, Wide, etc.) to tell the story.".to_string());
    } else {
        lines.push(format!("- FRAMING: {}.", elements.shot_type));
    }

    if elements.ai_optimize_lighting {
        lines.push("- LIGHTING/MOOD OPTIMIZATION: AI, choose the lighting and subject expression that triggers the highest emotional response.".to_string());
    } else {
        lines.push(format!("- LIGHTING: {}.", elements.lighting));
        if elements.expression != Expression::Neutral && !faceless {
            lines.push(format!(
                "- EXPRESSION: Subject must show intense {}.",
                elements.expression
            ));
        }
    }

    if elements.high_saturation {
        lines.push(
            "- COLOR: Boost saturation and vibrance to maximum. Use high contrast colors."
                .to_string(),
        );
    }

    if let Some(instructions) = non_blank(Some(elements.custom_instructions.as_str())) {
        lines.push(format!(
            "- SPECIFIC USER INSTRUCTION: {} (Ensure this is integrated seamlessly).",
            instructions
        ));
    }

    lines
}

fn text_constraints(elements: &CompositionModel, lines: &mut Vec<String>) {
    if !elements.add_text {
        lines.push(NO_TEXT_DIRECTIVE.to_string());
        return;
    }

    if elements.ai_optimize_text {
        lines.push(format!(
            "- TEXT OPTIMIZATION: AI, choose the best impactful text (2-5 words), font, color, and position to maximize CTR. Text Language: {}. IMPORTANT: Text must be legible and NOT touching the very edge of the image.",
            elements.text_language
        ));
        return;
    }

    // A custom mode with nothing typed falls back to a generated catchphrase.
    let custom = match elements.text_mode {
        TextMode::Custom => non_blank(Some(elements.custom_text.as_str())),
        TextMode::AiGenerated => None,
    };
    match custom {
        Some(text) => lines.push(format!(
            "- TEXT OVERLAY: The image MUST include the exact text \"{}\". Verify the spelling.",
            text
        )),
        None => lines.push(catchphrase_directive(elements.text_language)),
    }

    if let Some(font) = non_blank(Some(elements.font_style.as_str())) {
        let mut line = format!("- FONT: Use {} typography. Big, Bold, and Impactful.", font);
        if elements.text_language == TextLanguage::Persian {
            line.push_str(" Ensure correct Persian glyph connections and modern styling.");
        }
        lines.push(line);
    }

    if let Some(effect) = non_blank(Some(elements.text_effect.as_str())).filter(|e| *e != "None") {
        lines.push(format!(
            "- TEXT EFFECT: Apply {}. Make it pop off the background.",
            effect
        ));
    }

    lines.push(format!("- TEXT COLOR: {}.", elements.text_color));
    lines.push(format!(
        "- TEXT POSITION: Place text in the {} of the frame. CRITICAL: Leave a 10% safety margin from the edge to avoid cropping.",
        elements.text_position
    ));
}

pub fn catchphrase_directive(language: TextLanguage) -> String {
    format!(
        "- TEXT OVERLAY: Create a short, punchy, viral 2-4 word catchphrase in {} language.",
        language
    )
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Folds the game name into the topic for gaming styles.
pub fn effective_topic(topic: &str, style: &str, category: &str, game_name: &str) -> String {
    let gaming = style.to_lowercase().contains("gaming") || category == "Gaming";
    match non_blank(Some(game_name)) {
        Some(game) if gaming => format!("{} (Game: {})", topic, game),
        _ => topic.to_string(),
    }
}

/// The text actually sent for image generation.
pub fn final_image_prompt(prompt_text: &str, negative_prompt: &str) -> String {
    if negative_prompt.trim().is_empty() {
        prompt_text.to_string()
    } else {
        format!("{}\n\n(Exclude elements: {})", prompt_text, negative_prompt)
    }
}

pub fn prompt_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "promptText": {
                "type": "STRING",
                "description": "The full, cohesive prompt string combining all elements in English."
            },
            "segments": {
                "type": "OBJECT",
                "properties": {
                    "subject": { "type": "STRING" },
                    "action": { "type": "STRING" },
                    "environment": { "type": "STRING" },
                    "lighting": { "type": "STRING" },
                    "composition": { "type": "STRING" }
                },
                "required": ["subject", "action", "environment", "lighting", "composition"]
            },
            "visualStyle": { "type": "STRING" },
            "reasoning": { "type": "STRING" }
        },
        "required": ["title", "promptText", "segments", "visualStyle"]
    })
}

pub fn improvement_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "critique": { "type": "STRING" },
            "improvedPrompt": { "type": "STRING" }
        },
        "required": ["critique", "improvedPrompt"]
    })
}

pub fn suggestion_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": { "type": "STRING" }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(elements: CompositionModel) -> PromptRequest {
        PromptRequest {
            topic: "unboxing a mystery box".to_string(),
            style: "MrBeast Style".to_string(),
            reference_url: None,
            use_trends: false,
            elements: Some(elements),
        }
    }

    #[test]
    fn compilation_is_deterministic() {
        let mut elements = CompositionModel::default();
        elements.add_text = true;
        elements.ai_optimize_text = false;
        elements.custom_instructions = "add a golden trophy".to_string();
        let request = PromptRequest {
            reference_url: Some("https://youtube.com/watch?v=abc".to_string()),
            use_trends: true,
            ..request_with(elements)
        };

        let first = compile(&request);
        let second = compile(&request);

        assert_eq!(first.instruction(), second.instruction());
        assert_eq!(first.schema, second.schema);
    }

    #[test]
    fn disabled_text_suppresses_every_text_field() {
        let elements = CompositionModel {
            add_text: false,
            ai_optimize_text: false,
            text_mode: TextMode::Custom,
            custom_text: "BUY NOW".to_string(),
            font_style: "Lalezar".to_string(),
            text_effect: "Glow".to_string(),
            text_color: TextColor::NeonPink,
            text_position: TextPosition::BottomRight,
            ..CompositionModel::default()
        };

        let instruction = compile(&request_with(elements)).instruction();

        assert!(instruction.contains(NO_TEXT_DIRECTIVE));
        for value in ["BUY NOW", "Lalezar", "Glow", "Neon Pink", "Bottom Right"] {
            assert!(!instruction.contains(value), "leaked {value}");
        }
        for directive in ["TEXT OVERLAY", "FONT:", "TEXT COLOR", "TEXT POSITION", "TEXT EFFECT"] {
            assert!(!instruction.contains(directive), "emitted {directive}");
        }
    }

    #[test]
    fn faceless_suppresses_expression() {
        let elements = CompositionModel {
            face_visibility: FaceVisibility::Faceless,
            expression: Expression::Scared,
            ai_optimize_lighting: false,
            ..CompositionModel::default()
        };

        let instruction = compile(&request_with(elements)).instruction();

        assert!(instruction.contains("CHARACTER MODE: FACELESS"));
        assert!(instruction.contains("- LIGHTING: Studio."));
        assert!(!instruction.contains("Scared"));
        assert!(!instruction.contains("EXPRESSION:"));
    }

    #[test]
    fn expression_is_emitted_for_visible_faces() {
        let elements = CompositionModel {
            expression: Expression::Scared,
            ai_optimize_lighting: false,
            ..CompositionModel::default()
        };

        let instruction = compile(&request_with(elements)).instruction();
        assert!(instruction.contains("- EXPRESSION: Subject must show intense Scared."));
    }

    #[test]
    fn neutral_expression_is_not_emitted() {
        let elements = CompositionModel {
            expression: Expression::Neutral,
            ai_optimize_lighting: false,
            ..CompositionModel::default()
        };

        assert!(!compile(&request_with(elements)).instruction().contains("EXPRESSION:"));
    }

    #[test]
    fn empty_custom_text_falls_back_to_generated_catchphrase() {
        let elements = CompositionModel {
            add_text: true,
            ai_optimize_text: false,
            text_mode: TextMode::Custom,
            custom_text: String::new(),
            ..CompositionModel::default()
        };

        let instruction = compile(&request_with(elements)).instruction();

        assert!(instruction.contains(&catchphrase_directive(TextLanguage::English)));
        assert!(!instruction.contains("MUST include the exact text"));
    }

    #[test]
    fn whitespace_custom_text_counts_as_empty() {
        let elements = CompositionModel {
            add_text: true,
            ai_optimize_text: false,
            text_mode: TextMode::Custom,
            custom_text: "   ".to_string(),
            ..CompositionModel::default()
        };

        let instruction = compile(&request_with(elements)).instruction();
        assert!(instruction.contains("viral 2-4 word catchphrase"));
    }

    #[test]
    fn custom_text_is_quoted_verbatim() {
        let elements = CompositionModel {
            add_text: true,
            ai_optimize_text: false,
            text_mode: TextMode::Custom,
            custom_text: "I QUIT".to_string(),
            text_language: TextLanguage::Persian,
            text_effect: "Drop Shadow".to_string(),
            ..CompositionModel::default()
        };

        let instruction = compile(&request_with(elements)).instruction();

        assert!(instruction.contains("The image MUST include the exact text \"I QUIT\"."));
        assert!(instruction.contains("Ensure correct Persian glyph connections"));
        assert!(instruction.contains("- TEXT EFFECT: Apply Drop Shadow."));
        assert!(instruction.contains("- TEXT COLOR: White."));
        assert!(instruction.contains("Place text in the Center of the frame."));
    }

    #[test]
    fn end_to_end_cooking_pasta() {
        let elements = CompositionModel {
            add_text: true,
            ai_optimize_text: true,
            text_language: TextLanguage::English,
            face_visibility: FaceVisibility::ShowFace,
            character_description: Some(String::new()),
            ..CompositionModel::default()
        };
        let request = PromptRequest {
            topic: "cooking pasta".to_string(),
            style: "High Contrast, Expressive".to_string(),
            reference_url: None,
            use_trends: false,
            elements: Some(elements),
        };

        let compiled = compile(&request);
        let instruction = compiled.instruction();

        assert!(instruction.starts_with("You are an elite YouTube Thumbnail Strategist"));
        assert!(instruction.contains("Desired Style: High Contrast, Expressive"));
        assert!(instruction.contains("Create a generic but expressive character"));
        assert!(instruction.contains("TEXT OPTIMIZATION"));
        assert!(instruction.contains("Text Language: English."));
        assert!(instruction.ends_with(TASK_FOOTER));
        for manual in ["FONT:", "TEXT COLOR", "TEXT POSITION"] {
            assert!(!instruction.contains(manual));
        }
        assert!(!compiled.use_search);
    }

    #[test]
    fn sections_follow_the_fixed_order() {
        let elements = CompositionModel {
            high_saturation: true,
            custom_instructions: "neon outline around the subject".to_string(),
            ..CompositionModel::default()
        };
        let request = PromptRequest {
            reference_url: Some("https://example.com/video".to_string()),
            use_trends: true,
            ..request_with(elements)
        };

        let instruction = compile(&request).instruction();
        let position = |needle: &str| {
            instruction
                .find(needle)
                .unwrap_or_else(|| panic!("missing {needle}"))
        };

        let order = [
            "CRITICAL OUTPUT RULES",
            "Video Topic (Input)",
            "MAIN CHARACTER",
            "NO TEXT",
            "BACKGROUND OPTIMIZATION",
            "FRAMING OPTIMIZATION",
            "LIGHTING/MOOD OPTIMIZATION",
            "- COLOR: Boost saturation",
            "SPECIFIC USER INSTRUCTION: neon outline around the subject",
            "REFERENCE URL: https://example.com/video",
            "trending visual styles",
            "ADDITIONAL VISUAL INSTRUCTIONS",
            "Instructions:\n1. Analyze",
        ];
        for pair in order.windows(2) {
            assert!(position(pair[0]) < position(pair[1]), "{} before {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn search_is_enabled_by_trends_or_reference() {
        let base = request_with(CompositionModel::default());
        assert!(!compile(&base).use_search);

        let trends = PromptRequest { use_trends: true, ..base.clone() };
        assert!(compile(&trends).use_search);

        let reference = PromptRequest {
            reference_url: Some("https://example.com".to_string()),
            ..base.clone()
        };
        assert!(compile(&reference).use_search);

        let blank_reference = PromptRequest {
            reference_url: Some("   ".to_string()),
            ..base
        };
        let compiled = compile(&blank_reference);
        assert!(!compiled.use_search);
        assert!(!compiled.body.contains("REFERENCE URL"));
    }

    #[test]
    fn manual_background_adds_mode_detail() {
        let elements = CompositionModel {
            ai_optimize_background: false,
            background_mode: BackgroundMode::GreenScreen,
            ai_optimize_framing: false,
            shot_type: ShotType::LowAngle,
            ..CompositionModel::default()
        };

        let instruction = compile(&request_with(elements)).instruction();

        assert!(instruction.contains("- BACKGROUND: Mode Green Screen. Solid chroma key green background."));
        assert!(instruction.contains("- FRAMING: Low Angle."));
    }

    #[test]
    fn described_character_and_position() {
        let elements = CompositionModel {
            character_description: Some("Young man with short brown hair".to_string()),
            character_position: CharacterPosition::Left,
            ..CompositionModel::default()
        };

        let instruction = compile(&request_with(elements)).instruction();
        assert!(instruction.contains(
            "- MAIN CHARACTER: Young man with short brown hair. Ensure the face is high quality, expressive, and detailed. Position the character on the Left side of the frame."
        ));
    }

    #[test]
    fn without_elements_there_are_no_constraints() {
        let request = PromptRequest {
            topic: "rust tips".to_string(),
            style: "Tech Review".to_string(),
            ..PromptRequest::default()
        };

        let compiled = compile(&request);
        assert!(!compiled.body.contains("Specific Composition Constraints"));
        assert!(compiled.body.ends_with(TASK_FOOTER));
    }

    #[test]
    fn negative_prompt_is_appended_only_when_present() {
        assert_eq!(
            final_image_prompt("A chef", "blurry, watermark"),
            "A chef\n\n(Exclude elements: blurry, watermark)"
        );
        assert_eq!(final_image_prompt("A chef", ""), "A chef");
        assert_eq!(final_image_prompt("A chef", "   "), "A chef");
    }

    #[test]
    fn game_name_joins_gaming_topics_only() {
        assert_eq!(
            effective_topic("best base", "Gaming: Horror", "Cinematic", "Phasmophobia"),
            "best base (Game: Phasmophobia)"
        );
        assert_eq!(
            effective_topic("speedrun", "Retro Gaming", "Gaming", "Celeste"),
            "speedrun (Game: Celeste)"
        );
        assert_eq!(effective_topic("vlog", "Vlog / Daily Life", "Lifestyle", "Celeste"), "vlog");
        assert_eq!(effective_topic("speedrun", "Retro Gaming", "Gaming", ""), "speedrun");
    }

    #[test]
    fn prompt_schema_requires_all_segments() {
        let schema = prompt_schema();
        assert_eq!(
            schema["required"],
            json!(["title", "promptText", "segments", "visualStyle"])
        );
        assert_eq!(schema["properties"]["segments"]["required"].as_array().unwrap().len(), 5);
    }
}
