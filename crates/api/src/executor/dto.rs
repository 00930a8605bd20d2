//! Bodies the compiled workflow posts to the executor.
//!
//! Every call carries `{workspace_id, inputs, config}`. Inputs arrive with
//! references already resolved by the engine: prompts are strings, media
//! inputs are ids, media references, or lists of either.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use studio_core::types::DbId;
use studio_core::workflow::step::{
    Empty, GenerateAudioSettings, GenerateVideoSettings, ImageSettings,
};

#[derive(Debug, Deserialize)]
pub struct ExecutorRequest<I, C> {
    /// `${args.workspace_id}` may reach us as a number or a string.
    #[serde(default, deserialize_with = "lenient_id")]
    pub workspace_id: Option<DbId>,
    pub inputs: I,
    pub config: C,
}

#[derive(Debug, Deserialize)]
pub struct PromptInput {
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct EditImageInput {
    #[serde(default)]
    pub input_images: Value,
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateVideoInput {
    pub prompt: String,
    #[serde(default)]
    pub input_images: Value,
    #[serde(default)]
    pub start_frame: Value,
    #[serde(default)]
    pub end_frame: Value,
}

#[derive(Debug, Deserialize)]
pub struct VirtualTryOnInput {
    #[serde(default)]
    pub model_image: Value,
    #[serde(default)]
    pub top_image: Value,
    #[serde(default)]
    pub bottom_image: Value,
    #[serde(default)]
    pub dress_image: Value,
    #[serde(default)]
    pub shoes_image: Value,
}

pub type GenerateImageRequest = ExecutorRequest<PromptInput, ImageSettings>;
pub type EditImageRequest = ExecutorRequest<EditImageInput, ImageSettings>;
pub type GenerateVideoRequest = ExecutorRequest<GenerateVideoInput, GenerateVideoSettings>;
pub type VirtualTryOnRequest = ExecutorRequest<VirtualTryOnInput, Empty>;
pub type GenerateAudioRequest = ExecutorRequest<PromptInput, GenerateAudioSettings>;

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<DbId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("workspace_id must be an integer")),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom("workspace_id must be an integer")),
        Some(other) => Err(serde::de::Error::custom(format!(
            "workspace_id must be an integer, got {other}"
        ))),
    }
}
