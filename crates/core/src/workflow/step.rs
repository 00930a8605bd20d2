//! Step model: the typed, kind-tagged nodes of a workflow graph.
//!
//! A step is stored as one JSON object carrying its `type` tag, execution
//! state, and the kind-specific `inputs` / `settings` blocks. Input fields are
//! classified into [`InputValue`] once, at the deserialization boundary, so the
//! compiler and the trace reconstructor can match on references exhaustively.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Step kind / status
// ---------------------------------------------------------------------------

/// The eight kinds of step a workflow can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    UserInput,
    GenerateText,
    GenerateImage,
    EditImage,
    GenerateVideo,
    CropImage,
    VirtualTryOn,
    GenerateAudio,
}

impl StepKind {
    pub const ALL: [StepKind; 8] = [
        StepKind::UserInput,
        StepKind::GenerateText,
        StepKind::GenerateImage,
        StepKind::EditImage,
        StepKind::GenerateVideo,
        StepKind::CropImage,
        StepKind::VirtualTryOn,
        StepKind::GenerateAudio,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::UserInput => "user_input",
            StepKind::GenerateText => "generate_text",
            StepKind::GenerateImage => "generate_image",
            StepKind::EditImage => "edit_image",
            StepKind::GenerateVideo => "generate_video",
            StepKind::CropImage => "crop_image",
            StepKind::VirtualTryOn => "virtual_try_on",
            StepKind::GenerateAudio => "generate_audio",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown step type '{s}'")))
    }
}

/// Per-run execution state of a single step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Idle,
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

// ---------------------------------------------------------------------------
// Input values
// ---------------------------------------------------------------------------

/// Pointer from an input field to a named output of another step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutputRef {
    pub step: String,
    pub output: String,
}

/// Link to one media item of a prior generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMediaItemLink {
    pub media_item_id: DbId,
    pub media_index: i64,
    /// Empty when the link leaves the role to the consumer.
    #[serde(default)]
    pub role: String,
}

/// Reference to an existing generation result or an uploaded asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    pub preview_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_asset_id: Option<DbId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_media_item: Option<SourceMediaItemLink>,
}

/// One input field value.
///
/// Classification is purely structural and happens once when a step is
/// deserialized:
///
/// - an array is a [`Sequence`](InputValue::Sequence), classified element-wise;
/// - an object with exactly the string fields `step` and `output` is a
///   [`StepOutput`](InputValue::StepOutput) reference;
/// - an object with a string `previewUrl` plus a `sourceAssetId` or a
///   `sourceMediaItem` link is a [`Media`](InputValue::Media) reference;
/// - everything else, ordinary objects included, is a
///   [`Literal`](InputValue::Literal).
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Literal(Value),
    StepOutput(StepOutputRef),
    Media(MediaRef),
    Sequence(Vec<InputValue>),
}

impl InputValue {
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Array(items) => {
                InputValue::Sequence(items.into_iter().map(InputValue::from_json).collect())
            }
            Value::Object(ref map) => {
                if let Some(reference) = step_output_ref(map) {
                    return InputValue::StepOutput(reference);
                }
                if let Some(media) = media_ref(&value) {
                    return InputValue::Media(media);
                }
                InputValue::Literal(value)
            }
            other => InputValue::Literal(other),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            InputValue::Literal(value) => value.clone(),
            InputValue::StepOutput(reference) => serde_json::json!({
                "step": reference.step,
                "output": reference.output,
            }),
            InputValue::Media(media) => serde_json::to_value(media).unwrap_or(Value::Null),
            InputValue::Sequence(items) => {
                Value::Array(items.iter().map(InputValue::to_json).collect())
            }
        }
    }

    /// Every step-output reference in this value, sequences included.
    pub fn references(&self) -> Vec<&StepOutputRef> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a StepOutputRef>) {
        match self {
            InputValue::StepOutput(reference) => out.push(reference),
            InputValue::Sequence(items) => {
                for item in items {
                    item.collect_references(out);
                }
            }
            InputValue::Literal(_) | InputValue::Media(_) => {}
        }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        InputValue::Literal(value.into())
    }

    pub fn step_output(step: impl Into<String>, output: impl Into<String>) -> Self {
        InputValue::StepOutput(StepOutputRef {
            step: step.into(),
            output: output.into(),
        })
    }
}

fn step_output_ref(map: &serde_json::Map<String, Value>) -> Option<StepOutputRef> {
    if map.len() != 2 {
        return None;
    }
    let step = map.get("step")?.as_str()?;
    let output = map.get("output")?.as_str()?;
    Some(StepOutputRef {
        step: step.to_string(),
        output: output.to_string(),
    })
}

fn media_ref(value: &Value) -> Option<MediaRef> {
    value.get("previewUrl")?.as_str()?;
    let media: MediaRef = serde_json::from_value(value.clone()).ok()?;
    if media.source_asset_id.is_none() && media.source_media_item.is_none() {
        return None;
    }
    Some(media)
}

impl Serialize for InputValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            InputValue::Literal(value) => value.serialize(serializer),
            InputValue::StepOutput(reference) => reference.serialize(serializer),
            InputValue::Media(media) => media.serialize(serializer),
            InputValue::Sequence(items) => items.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for InputValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(InputValue::from_json)
    }
}

// ---------------------------------------------------------------------------
// Per-kind inputs and settings
// ---------------------------------------------------------------------------

/// Inputs / settings block for kinds that declare none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Empty {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateTextInputs {
    pub prompt: InputValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_images: Option<InputValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_videos: Option<InputValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateTextSettings {
    pub model: String,
    pub temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptInputs {
    pub prompt: InputValue,
}

/// Settings shared by image generation and image editing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSettings {
    pub model: String,
    pub brand_guidelines: bool,
    pub aspect_ratio: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditImageInputs {
    pub input_images: InputValue,
    pub prompt: InputValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateVideoInputs {
    pub prompt: InputValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_images: Option<InputValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_frame: Option<InputValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_frame: Option<InputValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateVideoSettings {
    pub model: String,
    pub brand_guidelines: bool,
    pub aspect_ratio: String,
    #[serde(default)]
    pub input_mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropImageInputs {
    pub input_image: InputValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropImageSettings {
    pub crop_aspect_ratio: String,
    pub fill_aspect_ratio: bool,
    pub background_color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualTryOnInputs {
    pub model_image: InputValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_image: Option<InputValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom_image: Option<InputValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dress_image: Option<InputValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shoes_image: Option<InputValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateAudioSettings {
    pub model: String,
    #[serde(default)]
    pub voice_name: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub seed: Option<i64>,
}

/// Accepts a number, a numeric string, `null`, or `""` (treated as absent).
fn empty_string_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    use serde::de::Error;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid seed '{s}'"))),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid seed {n}"))),
        Some(other) => Err(D::Error::custom(format!("invalid seed {other}"))),
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// Kind-specific part of a step, dispatched on the `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepDefinition {
    UserInput {
        #[serde(default)]
        inputs: Empty,
        #[serde(default)]
        settings: Empty,
    },
    GenerateText {
        inputs: GenerateTextInputs,
        settings: GenerateTextSettings,
    },
    GenerateImage {
        inputs: PromptInputs,
        settings: ImageSettings,
    },
    EditImage {
        inputs: EditImageInputs,
        settings: ImageSettings,
    },
    GenerateVideo {
        inputs: GenerateVideoInputs,
        settings: GenerateVideoSettings,
    },
    CropImage {
        inputs: CropImageInputs,
        settings: CropImageSettings,
    },
    VirtualTryOn {
        inputs: VirtualTryOnInputs,
        #[serde(default)]
        settings: Empty,
    },
    GenerateAudio {
        inputs: PromptInputs,
        settings: GenerateAudioSettings,
    },
}

impl StepDefinition {
    pub fn kind(&self) -> StepKind {
        match self {
            StepDefinition::UserInput { .. } => StepKind::UserInput,
            StepDefinition::GenerateText { .. } => StepKind::GenerateText,
            StepDefinition::GenerateImage { .. } => StepKind::GenerateImage,
            StepDefinition::EditImage { .. } => StepKind::EditImage,
            StepDefinition::GenerateVideo { .. } => StepKind::GenerateVideo,
            StepDefinition::CropImage { .. } => StepKind::CropImage,
            StepDefinition::VirtualTryOn { .. } => StepKind::VirtualTryOn,
            StepDefinition::GenerateAudio { .. } => StepKind::GenerateAudio,
        }
    }

    /// Declared input fields in declaration order. Absent optional fields are
    /// omitted.
    pub fn inputs(&self) -> Vec<(&'static str, &InputValue)> {
        fn opt<'a>(
            out: &mut Vec<(&'static str, &'a InputValue)>,
            name: &'static str,
            value: &'a Option<InputValue>,
        ) {
            if let Some(value) = value {
                out.push((name, value));
            }
        }

        let mut out = Vec::new();
        match self {
            StepDefinition::UserInput { .. } => {}
            StepDefinition::GenerateText { inputs, .. } => {
                out.push(("prompt", &inputs.prompt));
                opt(&mut out, "input_images", &inputs.input_images);
                opt(&mut out, "input_videos", &inputs.input_videos);
            }
            StepDefinition::GenerateImage { inputs, .. }
            | StepDefinition::GenerateAudio { inputs, .. } => {
                out.push(("prompt", &inputs.prompt));
            }
            StepDefinition::EditImage { inputs, .. } => {
                out.push(("input_images", &inputs.input_images));
                out.push(("prompt", &inputs.prompt));
            }
            StepDefinition::GenerateVideo { inputs, .. } => {
                out.push(("prompt", &inputs.prompt));
                opt(&mut out, "input_images", &inputs.input_images);
                opt(&mut out, "start_frame", &inputs.start_frame);
                opt(&mut out, "end_frame", &inputs.end_frame);
            }
            StepDefinition::CropImage { inputs, .. } => {
                out.push(("input_image", &inputs.input_image));
            }
            StepDefinition::VirtualTryOn { inputs, .. } => {
                out.push(("model_image", &inputs.model_image));
                opt(&mut out, "top_image", &inputs.top_image);
                opt(&mut out, "bottom_image", &inputs.bottom_image);
                opt(&mut out, "dress_image", &inputs.dress_image);
                opt(&mut out, "shoes_image", &inputs.shoes_image);
            }
        }
        out
    }

    /// The settings block as JSON, as sent to the executor under `config`.
    pub fn settings_json(&self) -> Value {
        let settings = match self {
            StepDefinition::UserInput { settings, .. }
            | StepDefinition::VirtualTryOn { settings, .. } => serde_json::to_value(settings),
            StepDefinition::GenerateText { settings, .. } => serde_json::to_value(settings),
            StepDefinition::GenerateImage { settings, .. }
            | StepDefinition::EditImage { settings, .. } => serde_json::to_value(settings),
            StepDefinition::GenerateVideo { settings, .. } => serde_json::to_value(settings),
            StepDefinition::CropImage { settings, .. } => serde_json::to_value(settings),
            StepDefinition::GenerateAudio { settings, .. } => serde_json::to_value(settings),
        };
        settings.unwrap_or_else(|_| Value::Object(Default::default()))
    }
}

/// One node of a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub step_id: String,

    #[serde(default)]
    pub status: StepStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub started_at: Option<Timestamp>,
    #[serde(default)]
    pub completed_at: Option<Timestamp>,

    /// Produced values by output name. For a `user_input` step the keys are
    /// the workflow's external parameters.
    #[serde(default)]
    pub outputs: IndexMap<String, Value>,

    #[serde(flatten)]
    pub definition: StepDefinition,
}

impl Step {
    pub fn kind(&self) -> StepKind {
        self.definition.kind()
    }

    pub fn is_user_input(&self) -> bool {
        self.kind() == StepKind::UserInput
    }

    pub fn inputs(&self) -> Vec<(&'static str, &InputValue)> {
        self.definition.inputs()
    }
}
