//! Typed view of the bilingual analysis and the schema the model must follow.
//!
//! The response schema is generated from [`LANGUAGE_VARIANT_SECTIONS`], and the
//! record types below carry the same wire names, so a field added in one place
//! without the other fails the schema tests.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const FULL_PROMPT_KEY: &str = "fullPrompt";
pub const JAPANESE_KEY: &str = "japanese";
pub const ENGLISH_KEY: &str = "english";

pub struct FieldSpec {
    pub key: &'static str,
    pub description: &'static str,
}

pub struct SectionSpec {
    pub key: &'static str,
    pub fields: &'static [FieldSpec],
}

const fn field(key: &'static str, description: &'static str) -> FieldSpec {
    FieldSpec { key, description }
}

pub const LANGUAGE_VARIANT_SECTIONS: &[SectionSpec] = &[
    SectionSpec {
        key: "CORE_IDENTITY",
        fields: &[
            field("Age_Gender", "Apparent age bracket and gender, phrased flatteringly."),
            field("Beauty_Type", "The kind of beauty the subject projects (e.g. cute, elegant, cool)."),
            field("Ethnicity", "Apparent ethnicity."),
            field("Body_Type", "Body type and silhouette."),
        ],
    },
    SectionSpec {
        key: "VISUAL_STYLE",
        fields: &[
            field("Archetype", "Character archetype the subject fits."),
            field("Vibe", "Overall vibe in a few words."),
            field("Artistic_Style", "Photographic or artistic style of the image."),
        ],
    },
    SectionSpec {
        key: "EMOTIONAL_PROFILE",
        fields: &[
            field("Emotion", "Primary emotion, matched to one of the emotional archetypes."),
            field("Mood", "Mood of the scene."),
            field("Expression", "How the emotion shows on the face and body."),
            field("Avoid", "Traits that would contradict this emotion and must be avoided."),
        ],
    },
    SectionSpec {
        key: "FACE_FEATURES",
        fields: &[
            field("Face_Shape", "Face shape."),
            field("Eyes", "Eye shape, size and gaze."),
            field("Eyebrows", "Eyebrow shape and thickness."),
            field("Nose", "Nose shape."),
            field("Lips", "Lip shape and color."),
            field("Makeup", "Makeup style."),
            field("Expression", "Facial expression."),
        ],
    },
    SectionSpec {
        key: "HAIR_STYLE",
        fields: &[
            field("Color", "Hair color."),
            field("Style", "Haircut and styling."),
            field("Bangs", "Bangs, or 'none'."),
        ],
    },
    SectionSpec {
        key: "BODY_FEATURES",
        fields: &[
            field("Skin", "Skin tone and texture."),
            field("Chest", "Chest and bust line as visible through clothing."),
            field("Hands_Limbs", "Hands, arms and legs, including their pose."),
        ],
    },
    SectionSpec {
        key: "FASHION",
        fields: &[
            field("Clothing", "Clothing, including fabric and fit."),
            field("Accessories", "Accessories such as glasses, jewelry or bags, or 'none'."),
        ],
    },
    SectionSpec {
        key: "SCENE",
        fields: &[
            field("Environment", "Literal setting, naming any visible brands, logos or locations."),
            field("Lighting", "Lighting conditions."),
            field("Camera", "Camera angle, shot type and lens feel."),
            field("Orientation", "'vertical', 'horizontal' or 'square'."),
            field("Aspect_Ratio", "Aspect ratio of the image, e.g. '9:16'."),
        ],
    },
];

const FULL_PROMPT_DESCRIPTION: &str =
    "One cohesive paragraph that reproduces the image as a generation prompt, combining every field above.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreIdentity {
    #[serde(rename = "Age_Gender")]
    pub age_gender: String,
    #[serde(rename = "Beauty_Type")]
    pub beauty_type: String,
    #[serde(rename = "Ethnicity")]
    pub ethnicity: String,
    #[serde(rename = "Body_Type")]
    pub body_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualStyle {
    #[serde(rename = "Archetype")]
    pub archetype: String,
    #[serde(rename = "Vibe")]
    pub vibe: String,
    #[serde(rename = "Artistic_Style")]
    pub artistic_style: String,
}

/// All four fields are required together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionalProfile {
    #[serde(rename = "Emotion")]
    pub emotion: String,
    #[serde(rename = "Mood")]
    pub mood: String,
    #[serde(rename = "Expression")]
    pub expression: String,
    #[serde(rename = "Avoid")]
    pub avoid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceFeatures {
    #[serde(rename = "Face_Shape")]
    pub face_shape: String,
    #[serde(rename = "Eyes")]
    pub eyes: String,
    #[serde(rename = "Eyebrows")]
    pub eyebrows: String,
    #[serde(rename = "Nose")]
    pub nose: String,
    #[serde(rename = "Lips")]
    pub lips: String,
    #[serde(rename = "Makeup")]
    pub makeup: String,
    #[serde(rename = "Expression")]
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HairStyle {
    #[serde(rename = "Color")]
    pub color: String,
    #[serde(rename = "Style")]
    pub style: String,
    #[serde(rename = "Bangs")]
    pub bangs: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyFeatures {
    #[serde(rename = "Skin")]
    pub skin: String,
    #[serde(rename = "Chest")]
    pub chest: String,
    #[serde(rename = "Hands_Limbs")]
    pub hands_limbs: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fashion {
    #[serde(rename = "Clothing")]
    pub clothing: String,
    #[serde(rename = "Accessories")]
    pub accessories: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(rename = "Environment")]
    pub environment: String,
    #[serde(rename = "Lighting")]
    pub lighting: String,
    #[serde(rename = "Camera")]
    pub camera: String,
    #[serde(rename = "Orientation")]
    pub orientation: String,
    #[serde(rename = "Aspect_Ratio")]
    pub aspect_ratio: String,
}

/// One language's full description of the analyzed image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageVariant {
    #[serde(rename = "CORE_IDENTITY")]
    pub core_identity: CoreIdentity,
    #[serde(rename = "VISUAL_STYLE")]
    pub visual_style: VisualStyle,
    #[serde(rename = "EMOTIONAL_PROFILE")]
    pub emotional_profile: EmotionalProfile,
    #[serde(rename = "FACE_FEATURES")]
    pub face_features: FaceFeatures,
    #[serde(rename = "HAIR_STYLE")]
    pub hair_style: HairStyle,
    #[serde(rename = "BODY_FEATURES")]
    pub body_features: BodyFeatures,
    #[serde(rename = "FASHION")]
    pub fashion: Fashion,
    #[serde(rename = "SCENE")]
    pub scene: Scene,
    #[serde(rename = "fullPrompt")]
    pub full_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilingualAnalysis {
    pub japanese: LanguageVariant,
    pub english: LanguageVariant,
}

fn string_schema(description: &str) -> Value {
    json!({ "type": "STRING", "description": description })
}

fn object_schema(properties: Map<String, Value>, order: Vec<&str>) -> Value {
    json!({
        "type": "OBJECT",
        "properties": Value::Object(properties),
        "required": order,
        "propertyOrdering": order,
    })
}

pub fn language_variant_schema() -> Value {
    let mut properties = Map::new();
    let mut order = Vec::new();

    for section in LANGUAGE_VARIANT_SECTIONS {
        let mut fields = Map::new();
        let mut field_order = Vec::new();
        for spec in section.fields {
            fields.insert(spec.key.to_string(), string_schema(spec.description));
            field_order.push(spec.key);
        }
        properties.insert(section.key.to_string(), object_schema(fields, field_order));
        order.push(section.key);
    }

    properties.insert(
        FULL_PROMPT_KEY.to_string(),
        string_schema(FULL_PROMPT_DESCRIPTION),
    );
    order.push(FULL_PROMPT_KEY);

    object_schema(properties, order)
}

/// `{ japanese: LanguageVariant, english: LanguageVariant }`, both required.
pub fn bilingual_schema() -> Value {
    let variant = language_variant_schema();
    let mut properties = Map::new();
    properties.insert(JAPANESE_KEY.to_string(), variant.clone());
    properties.insert(ENGLISH_KEY.to_string(), variant);
    object_schema(properties, vec![JAPANESE_KEY, ENGLISH_KEY])
}
