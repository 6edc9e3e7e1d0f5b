// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a closed set of options whose wire form is the label shown to the user.
macro_rules! labeled_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident => $label:tt),+ $(,)?
        }
        default $default:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

labeled_enum! {
    AspectRatio {
        Square => "1:1",
        Portrait3x4 => "3:4",
        Landscape4x3 => "4:3",
        Portrait9x16 => "9:16",
        Landscape16x9 => "16:9",
        Wide21x9 => "21:9",
    }
    default Landscape16x9
}

labeled_enum! {
    ImageResolution {
        OneK => "1K",
        TwoK => "2K",
        FourK => "4K",
    }
    default TwoK
}

labeled_enum! {
    TextMode {
        AiGenerated => "AI Generated",
        Custom => "Custom",
    }
    default AiGenerated
}

labeled_enum! {
    TextLanguage {
        English => "English",
        Persian => "Persian",
    }
    default English
}

labeled_enum! {
    TextPosition {
        TopLeft => "Top Left",
        TopCenter => "Top Center",
        TopRight => "Top Right",
        MiddleLeft => "Middle Left",
        Center => "Center",
        MiddleRight => "Middle Right",
        BottomLeft => "Bottom Left",
        BottomCenter => "Bottom Center",
        BottomRight => "Bottom Right",
    }
    default Center
}

labeled_enum! {
    TextColor {
        White => "White",
        Yellow => "Yellow",
        Red => "Red",
        Green => "Green",
        Blue => "Blue",
        Black => "Black",
        NeonPink => "Neon Pink",
        Gold => "Gold",
    }
    default White
}

labeled_enum! {
    BackgroundMode {
        Standard => "Standard",
        Blurred => "Blurred",
        SolidWhite => "Solid White",
        GreenScreen => "Green Screen",
        DetailedEnvironment => "Detailed Environment",
    }
    default Standard
}

labeled_enum! {
    ShotType {
        ExtremeCloseUp => "Extreme Close-Up",
        MediumShot => "Medium Shot",
        WideShot => "Wide Shot",
        LowAngle => "Low Angle",
        SelfieStyle => "Selfie Style",
        Overhead => "Overhead",
    }
    default MediumShot
}

labeled_enum! {
    Expression {
        Surprised => "Surprised",
        Happy => "Happy",
        Serious => "Serious",
        Neutral => "Neutral",
        Scared => "Scared",
        Angry => "Angry",
    }
    default Surprised
}

labeled_enum! {
    Lighting {
        Studio => "Studio",
        Neon => "Neon",
        Natural => "Natural",
        Dramatic => "Dramatic",
        GoldenHour => "Golden Hour",
    }
    default Studio
}

labeled_enum! {
    FaceVisibility {
        ShowFace => "Show Face",
        Faceless => "Faceless",
    }
    default ShowFace
}

labeled_enum! {
    CharacterPosition {
        Left => "Left",
        Center => "Center",
        Right => "Right",
    }
    default Center
}

labeled_enum! {
    /// Which aspect of an uploaded thumbnail the analysis should describe.
    FocusMode {
        FullPrompt => "Full Prompt",
        Composition => "Composition",
        ColorPalette => "Color Palette",
    }
    default FullPrompt
}

labeled_enum! {
    /// How far a remake may drift from the original concept.
    CreativityLevel {
        SubtlePolish => "Subtle Polish",
        ExtremeMakeover => "Extreme Makeover",
    }
    default SubtlePolish
}

/// Desired thumbnail composition. Every field is independent; fields that do
/// not apply in the current mode are kept but ignored when compiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompositionModel {
    pub add_text: bool,
    pub ai_optimize_text: bool,
    pub text_mode: TextMode,
    pub custom_text: String,
    pub text_language: TextLanguage,
    pub font_style: String,
    pub text_effect: String,
    pub text_position: TextPosition,
    pub text_color: TextColor,

    pub background_mode: BackgroundMode,
    pub ai_optimize_background: bool,

    pub shot_type: ShotType,
    pub ai_optimize_framing: bool,

    pub high_saturation: bool,
    pub expression: Expression,
    pub lighting: Lighting,
    pub ai_optimize_lighting: bool,

    pub face_visibility: FaceVisibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_image: Option<String>,
    pub character_description: Option<String>,
    pub character_position: CharacterPosition,

    pub custom_instructions: String,
    pub ai_auto_settings: bool,
}

impl Default for CompositionModel {
    fn default() -> Self {
        Self {
            add_text: false,
            ai_optimize_text: true,
            text_mode: TextMode::AiGenerated,
            custom_text: String::new(),
            text_language: TextLanguage::English,
            font_style: "Modern Sans".to_string(),
            text_effect: "None".to_string(),
            text_position: TextPosition::Center,
            text_color: TextColor::White,
            background_mode: BackgroundMode::Standard,
            ai_optimize_background: true,
            shot_type: ShotType::MediumShot,
            ai_optimize_framing: true,
            high_saturation: false,
            expression: Expression::Surprised,
            lighting: Lighting::Studio,
            ai_optimize_lighting: true,
            face_visibility: FaceVisibility::ShowFace,
            character_image: None,
            character_description: Some(String::new()),
            character_position: CharacterPosition::Center,
            custom_instructions: String::new(),
            ai_auto_settings: false,
        }
    }
}

/// A composition model as found in storage: any field may be missing.
/// Unknown fields are dropped on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialCompositionModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_text: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_optimize_text: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_mode: Option<TextMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_language: Option<TextLanguage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_effect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_position: Option<TextPosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<TextColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_mode: Option<BackgroundMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_optimize_background: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shot_type: Option<ShotType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_optimize_framing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_saturation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lighting: Option<Lighting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_optimize_lighting: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_visibility: Option<FaceVisibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_position: Option<CharacterPosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_auto_settings: Option<bool>,
}

impl From<CompositionModel> for PartialCompositionModel {
    fn from(model: CompositionModel) -> Self {
        Self {
            add_text: Some(model.add_text),
            ai_optimize_text: Some(model.ai_optimize_text),
            text_mode: Some(model.text_mode),
            custom_text: Some(model.custom_text),
            text_language: Some(model.text_language),
            font_style: Some(model.font_style),
            text_effect: Some(model.text_effect),
            text_position: Some(model.text_position),
            text_color: Some(model.text_color),
            background_mode: Some(model.background_mode),
            ai_optimize_background: Some(model.ai_optimize_background),
            shot_type: Some(model.shot_type),
            ai_optimize_framing: Some(model.ai_optimize_framing),
            high_saturation: Some(model.high_saturation),
            expression: Some(model.expression),
            lighting: Some(model.lighting),
            ai_optimize_lighting: Some(model.ai_optimize_lighting),
            face_visibility: Some(model.face_visibility),
            character_image: model.character_image,
            character_description: model.character_description,
            character_position: Some(model.character_position),
            custom_instructions: Some(model.custom_instructions),
            ai_auto_settings: Some(model.ai_auto_settings),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSegments {
    pub subject: String,
    pub action: String,
    pub environment: String,
    pub lighting: String,
    pub composition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPrompt {
    pub title: String,
    pub prompt_text: String,
    pub visual_style: String,
    pub segments: PromptSegments,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptImprovement {
    pub critique: String,
    pub improved_prompt: String,
}

/// Raw image bytes plus their MIME type, ready to be sent inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// Everything the generator form holds, captured by value when a preset is saved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PresetSnapshot {
    pub topic: String,
    pub active_category: String,
    pub style: String,
    pub game_name: String,
    pub reference_url: Option<String>,
    pub aspect_ratio: AspectRatio,
    pub resolution: ImageResolution,
    pub negative_prompt: String,
    pub elements: CompositionModel,
}

/// Stored form of [`PresetSnapshot`]. Presets written by older builds may
/// lack fields; those stay `None` and leave the current value alone on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PresetFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ImageResolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elements: Option<PartialCompositionModel>,
}

impl From<PresetSnapshot> for PresetFields {
    fn from(snapshot: PresetSnapshot) -> Self {
        Self {
            topic: Some(snapshot.topic),
            active_category: Some(snapshot.active_category),
            style: Some(snapshot.style),
            game_name: Some(snapshot.game_name),
            reference_url: snapshot.reference_url,
            aspect_ratio: Some(snapshot.aspect_ratio),
            resolution: Some(snapshot.resolution),
            negative_prompt: Some(snapshot.negative_prompt),
            elements: Some(snapshot.elements.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub fields: PresetFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItem {
    pub id: Uuid,
    pub image_url: String,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub timestamp: DateTime<Utc>,
}
