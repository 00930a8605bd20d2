//! Per-kind execution: build the backend job, submit it, wait for it.
//!
//! Each call answers with the output names the compiler references as
//! `<step>_result.body.<output>`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use studio_core::types::DbId;
use studio_core::workflow::StepKind;

use super::backend::{
    BackendClient, GENERATE_AUDIO_PATH, GENERATE_IMAGES_PATH, GENERATE_VIDEOS_PATH,
    GENERATE_VTO_PATH,
};
use super::dto::{
    EditImageRequest, GenerateAudioRequest, GenerateImageRequest, GenerateVideoRequest,
    VirtualTryOnRequest,
};
use super::error::ExecutorError;
use super::media::{
    normalize_media, vto_link, MediaItemLink, ROLE_END_FRAME, ROLE_IMAGE_REFERENCE, ROLE_INPUT,
    ROLE_START_FRAME,
};

/// Every job asks for a single media.
const NUMBER_OF_MEDIA: u32 = 1;

// ---------------------------------------------------------------------------
// Backend job bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ImageJob<'a> {
    prompt: &'a str,
    workspace_id: DbId,
    generation_model: &'a str,
    aspect_ratio: &'a str,
    use_brand_guidelines: bool,
    number_of_media: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_media_items: Option<Vec<MediaItemLink>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_asset_ids: Option<Vec<DbId>>,
}

#[derive(Debug, Serialize)]
struct ReferenceImage {
    asset_id: DbId,
    reference_type: &'static str,
}

#[derive(Debug, Serialize)]
struct VideoJob<'a> {
    prompt: &'a str,
    workspace_id: DbId,
    generation_model: &'a str,
    use_brand_guidelines: bool,
    reference_images: Vec<ReferenceImage>,
    source_media_items: Vec<MediaItemLink>,
    start_image_asset_id: Option<DbId>,
    end_image_asset_id: Option<DbId>,
    number_of_media: u32,
}

#[derive(Debug, Serialize)]
struct TryOnJob {
    workspace_id: DbId,
    number_of_media: u32,
    person_image: Value,
    top_image: Option<Value>,
    bottom_image: Option<Value>,
    dress_image: Option<Value>,
    shoe_image: Option<Value>,
}

#[derive(Debug, Serialize)]
struct AudioJob<'a> {
    workspace_id: DbId,
    prompt: &'a str,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct ExecutorService {
    backend: BackendClient,
}

impl ExecutorService {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    /// Run one step of `kind` with the body the compiled workflow posted.
    pub async fn execute(
        &self,
        kind: StepKind,
        body: Value,
        authorization: Option<&str>,
    ) -> Result<Value, ExecutorError> {
        tracing::info!(%kind, "Executing workflow step");
        match kind {
            StepKind::GenerateImage => self.generate_image(parse(body)?, authorization).await,
            StepKind::EditImage => self.edit_image(parse(body)?, authorization).await,
            StepKind::GenerateVideo => self.generate_video(parse(body)?, authorization).await,
            StepKind::VirtualTryOn => self.virtual_try_on(parse(body)?, authorization).await,
            StepKind::GenerateAudio => self.generate_audio(parse(body)?, authorization).await,
            StepKind::GenerateText | StepKind::CropImage => {
                Err(ExecutorError::NotImplemented(kind))
            }
            StepKind::UserInput => Err(ExecutorError::BadInput(
                "user_input steps are not executed".into(),
            )),
        }
    }

    async fn generate_image(
        &self,
        request: GenerateImageRequest,
        authorization: Option<&str>,
    ) -> Result<Value, ExecutorError> {
        let job = ImageJob {
            prompt: &request.inputs.prompt,
            workspace_id: require_workspace(request.workspace_id)?,
            generation_model: &request.config.model,
            aspect_ratio: &request.config.aspect_ratio,
            use_brand_guidelines: request.config.brand_guidelines,
            number_of_media: NUMBER_OF_MEDIA,
            source_media_items: None,
            source_asset_ids: None,
        };
        let id = self
            .run_job(GENERATE_IMAGES_PATH, &job, authorization, "image")
            .await?;
        Ok(json!({ "generated_image": id }))
    }

    async fn edit_image(
        &self,
        request: EditImageRequest,
        authorization: Option<&str>,
    ) -> Result<Value, ExecutorError> {
        let media = normalize_media(&request.inputs.input_images, ROLE_INPUT);
        let job = ImageJob {
            prompt: &request.inputs.prompt,
            workspace_id: require_workspace(request.workspace_id)?,
            generation_model: &request.config.model,
            aspect_ratio: &request.config.aspect_ratio,
            use_brand_guidelines: request.config.brand_guidelines,
            number_of_media: NUMBER_OF_MEDIA,
            source_media_items: Some(media.media_items),
            source_asset_ids: Some(media.asset_ids),
        };
        let id = self
            .run_job(GENERATE_IMAGES_PATH, &job, authorization, "edited image")
            .await?;
        Ok(json!({ "edited_image": id }))
    }

    async fn generate_video(
        &self,
        request: GenerateVideoRequest,
        authorization: Option<&str>,
    ) -> Result<Value, ExecutorError> {
        let inputs = &request.inputs;
        let references = normalize_media(&inputs.input_images, ROLE_IMAGE_REFERENCE);
        let start = normalize_media(&inputs.start_frame, ROLE_START_FRAME);
        let end = normalize_media(&inputs.end_frame, ROLE_END_FRAME);

        let mut source_media_items = references.media_items;
        source_media_items.extend(start.media_items);
        source_media_items.extend(end.media_items);

        let job = VideoJob {
            prompt: &inputs.prompt,
            workspace_id: require_workspace(request.workspace_id)?,
            generation_model: &request.config.model,
            use_brand_guidelines: request.config.brand_guidelines,
            reference_images: references
                .asset_ids
                .into_iter()
                .map(|asset_id| ReferenceImage {
                    asset_id,
                    reference_type: "ASSET",
                })
                .collect(),
            source_media_items,
            start_image_asset_id: start.asset_ids.first().copied(),
            end_image_asset_id: end.asset_ids.first().copied(),
            number_of_media: NUMBER_OF_MEDIA,
        };
        let id = self
            .run_job(GENERATE_VIDEOS_PATH, &job, authorization, "video")
            .await?;
        Ok(json!({ "generated_video": id }))
    }

    async fn virtual_try_on(
        &self,
        request: VirtualTryOnRequest,
        authorization: Option<&str>,
    ) -> Result<Value, ExecutorError> {
        let inputs = &request.inputs;
        let person_image = vto_link(&inputs.model_image).ok_or_else(|| {
            ExecutorError::BadInput("Person image is required for Virtual Try-On".into())
        })?;

        let job = TryOnJob {
            workspace_id: require_workspace(request.workspace_id)?,
            number_of_media: NUMBER_OF_MEDIA,
            person_image,
            top_image: vto_link(&inputs.top_image),
            bottom_image: vto_link(&inputs.bottom_image),
            dress_image: vto_link(&inputs.dress_image),
            shoe_image: vto_link(&inputs.shoes_image),
        };
        let id = self
            .run_job(GENERATE_VTO_PATH, &job, authorization, "VTO image")
            .await?;
        Ok(json!({ "generated_image": id }))
    }

    async fn generate_audio(
        &self,
        request: GenerateAudioRequest,
        authorization: Option<&str>,
    ) -> Result<Value, ExecutorError> {
        let config = &request.config;
        let job = AudioJob {
            workspace_id: require_workspace(request.workspace_id)?,
            prompt: &request.inputs.prompt,
            model: &config.model,
            voice_name: config.voice_name.as_deref(),
            language_code: config.language_code.as_deref(),
            negative_prompt: config.negative_prompt.as_deref(),
            seed: config.seed,
        };
        let id = self
            .run_job(GENERATE_AUDIO_PATH, &job, authorization, "audio")
            .await?;
        Ok(json!({ "generated_audio": id }))
    }

    async fn run_job<B: Serialize>(
        &self,
        path: &str,
        job: &B,
        authorization: Option<&str>,
        what: &'static str,
    ) -> Result<DbId, ExecutorError> {
        let media_id = self.backend.submit(path, job, authorization, what).await?;
        self.backend
            .wait_for_completion(media_id, authorization)
            .await?;
        Ok(media_id)
    }
}

fn parse<T: DeserializeOwned>(body: Value) -> Result<T, ExecutorError> {
    serde_json::from_value(body).map_err(|e| ExecutorError::BadInput(format!("Invalid request: {e}")))
}

fn require_workspace(workspace_id: Option<DbId>) -> Result<DbId, ExecutorError> {
    workspace_id.ok_or_else(|| ExecutorError::BadInput("workspace_id is required".into()))
}
