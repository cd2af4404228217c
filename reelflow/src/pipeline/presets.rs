//! Ready-made pipelines.
//!
//! Each constructor checks its inputs and the clients it needs up front, so
//! a misconfigured pipeline fails before any vendor is called.

use chrono::Utc;
use std::sync::Arc;

use super::stages::{
    AddLooksStage, AvatarSource, AwaitAvatarLookStage, CleanupAvatarGroupStage,
    GenerateScriptStage, GenerateVideoStage, NarrationOptions, NarrationStage, PrepareAvatarStage,
    RenderCompositionStage, ResolveGroupStage, ResolveVoiceStage, TrainGroupStage, TrainingGroup,
    VideoOptions, VoiceSource,
};
use super::Orchestrator;
use crate::config::{Pacing, Settings};
use crate::errors::JobError;
use crate::events::LoggingEventSink;
use crate::http::HttpTransport;
use crate::vendors::media::image_content_type;
use crate::vendors::{
    default_merge_fields, GeminiClient, HeyGenClient, OpenAiSpeechClient, RenderTemplate,
    ScriptSizing, ShotstackClient, SupabaseStorage,
};

/// The vendor clients a pipeline may draw on. Unconfigured vendors are `None`.
#[derive(Debug, Clone, Default)]
pub struct VendorClients {
    /// Avatar video, training and voice cloning.
    pub heygen: Option<Arc<HeyGenClient>>,
    /// Template rendering.
    pub shotstack: Option<Arc<ShotstackClient>>,
    /// Script writing.
    pub gemini: Option<Arc<GeminiClient>>,
    /// Speech synthesis.
    pub speech: Option<Arc<OpenAiSpeechClient>>,
    /// Object storage.
    pub storage: Option<Arc<SupabaseStorage>>,
}

impl VendorClients {
    /// Builds a client for every vendor whose credentials are configured.
    pub fn from_settings(
        settings: &Settings,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, JobError> {
        let keys = &settings.keys;
        let mut clients = Self::default();

        if let Some(key) = &keys.heygen {
            clients.heygen = Some(Arc::new(
                HeyGenClient::new(Arc::clone(&transport), key.clone())?
                    .with_endpoints(settings.heygen.clone()),
            ));
        }
        if let Some(key) = &keys.shotstack {
            clients.shotstack = Some(Arc::new(
                ShotstackClient::new(Arc::clone(&transport), key.clone())?
                    .with_endpoints(settings.shotstack.clone()),
            ));
        }
        if let Some(key) = &keys.gemini {
            clients.gemini = Some(Arc::new(
                GeminiClient::new(Arc::clone(&transport), key.clone())?
                    .with_base_url(&settings.gemini_base_url)
                    .with_model(&settings.gemini_model),
            ));
        }
        if let Some(key) = &keys.openai {
            clients.speech = Some(Arc::new(
                OpenAiSpeechClient::new(Arc::clone(&transport), key.clone())?
                    .with_base_url(&settings.openai_base_url)
                    .with_voice(&settings.openai_tts_voice)?
                    .with_model(&settings.openai_tts_model)?,
            ));
        }
        if let (Some(url), Some(key)) = (&settings.supabase_url, &keys.supabase) {
            clients.storage = Some(Arc::new(
                SupabaseStorage::new(transport, url.clone(), key.clone())?
                    .with_bucket(&settings.supabase_bucket),
            ));
        }
        Ok(clients)
    }

    /// Sets the HeyGen client.
    #[must_use]
    pub fn with_heygen(mut self, client: HeyGenClient) -> Self {
        self.heygen = Some(Arc::new(client));
        self
    }

    /// Sets the Shotstack client.
    #[must_use]
    pub fn with_shotstack(mut self, client: ShotstackClient) -> Self {
        self.shotstack = Some(Arc::new(client));
        self
    }

    /// Sets the Gemini client.
    #[must_use]
    pub fn with_gemini(mut self, client: GeminiClient) -> Self {
        self.gemini = Some(Arc::new(client));
        self
    }

    /// Sets the speech client.
    #[must_use]
    pub fn with_speech(mut self, client: OpenAiSpeechClient) -> Self {
        self.speech = Some(Arc::new(client));
        self
    }

    /// Sets the storage client.
    #[must_use]
    pub fn with_storage(mut self, client: SupabaseStorage) -> Self {
        self.storage = Some(Arc::new(client));
        self
    }

    fn require<T>(client: Option<&Arc<T>>, vendor: &str, pipeline: &str) -> Result<Arc<T>, JobError> {
        client
            .cloned()
            .ok_or_else(|| JobError::validation(format!("{pipeline} pipeline needs a {vendor} client")))
    }
}

/// Everything the avatar-video pipeline needs from its caller.
#[derive(Debug, Clone)]
pub struct AvatarVideoRequest {
    /// Property description the script is written from.
    pub description: String,
    /// Ready-made script; skips script generation when set.
    pub script: Option<String>,
    /// Product name used for naming and the narration greeting.
    pub product_name: String,
    /// Voice to speak with.
    pub voice: VoiceSource,
    /// Face to animate.
    pub avatar: AvatarSource,
    /// Video presentation.
    pub video: VideoOptions,
    /// Background narration; only used together with `render`.
    pub narration: Option<NarrationOptions>,
    /// Composition template; without one the avatar video is the result.
    pub render: Option<RenderTemplate>,
    /// Script length targets.
    pub sizing: ScriptSizing,
}

impl AvatarVideoRequest {
    /// Creates a request with default presentation and no composition.
    #[must_use]
    pub fn new(description: impl Into<String>, voice: VoiceSource, avatar: AvatarSource) -> Self {
        Self {
            description: description.into(),
            script: None,
            product_name: String::new(),
            voice,
            avatar,
            video: VideoOptions::default(),
            narration: None,
            render: None,
            sizing: ScriptSizing::default(),
        }
    }

    /// Request using the configured default voice and talking photo, and the
    /// configured template when both template ids are set.
    pub fn from_settings(description: impl Into<String>, settings: &Settings) -> Result<Self, JobError> {
        let voice_id = settings
            .default_voice_id
            .clone()
            .ok_or_else(|| JobError::validation("DEFAULT_HEYGEN_VOICE_ID is not configured"))?;
        let photo_id = settings
            .default_talking_photo_id
            .clone()
            .ok_or_else(|| JobError::validation("DEFAULT_HEYGEN_TALKING_PHOTO_ID is not configured"))?;

        let mut request = Self::new(
            description,
            VoiceSource::Existing(voice_id),
            AvatarSource::TalkingPhoto(photo_id),
        )
        .with_sizing(settings.script);
        if let (Some(template_id), Some(owner_id)) =
            (&settings.shotstack_template_id, &settings.shotstack_owner_id)
        {
            request.render =
                Some(RenderTemplate::new(template_id, owner_id).with_merge(default_merge_fields()));
        }
        Ok(request)
    }

    /// Uses a ready-made script.
    #[must_use]
    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    /// Sets the product name.
    #[must_use]
    pub fn with_product_name(mut self, name: impl Into<String>) -> Self {
        self.product_name = name.into();
        self
    }

    /// Sets the video options.
    #[must_use]
    pub fn with_video(mut self, video: VideoOptions) -> Self {
        self.video = video;
        self
    }

    /// Adds background narration.
    #[must_use]
    pub fn with_narration(mut self, narration: NarrationOptions) -> Self {
        self.narration = Some(narration);
        self
    }

    /// Composes the avatar video into a template.
    #[must_use]
    pub fn with_render(mut self, template: RenderTemplate) -> Self {
        self.render = Some(template);
        self
    }

    /// Sets the script length targets.
    #[must_use]
    pub fn with_sizing(mut self, sizing: ScriptSizing) -> Self {
        self.sizing = sizing;
        self
    }

    fn has_script(&self) -> bool {
        self.script.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    fn validate(&self) -> Result<(), JobError> {
        if !self.has_script() && self.description.trim().is_empty() {
            return Err(JobError::validation("a description or a script is required"));
        }
        match &self.voice {
            VoiceSource::Existing(id) if id.trim().is_empty() => {
                return Err(JobError::validation("voice id is empty"));
            }
            VoiceSource::Clone(sample) if sample.data.is_empty() => {
                return Err(JobError::validation("voice sample is empty"));
            }
            _ => {}
        }
        match &self.avatar {
            AvatarSource::TalkingPhoto(id) if id.trim().is_empty() => {
                return Err(JobError::validation("talking photo id is empty"));
            }
            AvatarSource::Photo { filename, data } => {
                image_content_type(filename)?;
                if data.is_empty() {
                    return Err(JobError::validation(format!("'{filename}' is empty")));
                }
            }
            AvatarSource::TalkingPhoto(_) => {}
        }
        if self.narration.is_some() && self.render.is_none() {
            return Err(JobError::validation(
                "narration is only mixed into a rendered composition",
            ));
        }
        if let Some(template) = &self.render {
            template.validate()?;
        }
        Ok(())
    }

    fn group_name(&self) -> String {
        let product = match self.product_name.trim() {
            "" => "Video",
            name => name,
        };
        format!("TempGroup_{product}_{}", Utc::now().timestamp())
    }
}

/// Script, voice, avatar, video, cleanup and, when configured, narration and
/// composition.
pub fn avatar_video_pipeline(
    clients: &VendorClients,
    request: AvatarVideoRequest,
    pacing: &Pacing,
) -> Result<Orchestrator, JobError> {
    const NAME: &str = "avatar_video";
    request.validate()?;
    let heygen = VendorClients::require(clients.heygen.as_ref(), "HeyGen", NAME)?;
    let gemini = if request.has_script() {
        clients.gemini.clone()
    } else {
        Some(VendorClients::require(clients.gemini.as_ref(), "Gemini", NAME)?)
    };
    let shotstack = match &request.render {
        Some(_) => Some(VendorClients::require(clients.shotstack.as_ref(), "Shotstack", NAME)?),
        None => None,
    };

    let group_name = request.group_name();
    let AvatarVideoRequest {
        description,
        script,
        voice,
        avatar,
        video,
        narration,
        render,
        sizing,
        ..
    } = request;

    let mut orchestrator = Orchestrator::new(NAME)
        .with_stage(GenerateScriptStage::new(gemini, description, sizing).with_provided(script))
        .with_stage(ResolveVoiceStage::new(
            Arc::clone(&heygen),
            voice,
            pacing.voice_clone_settle,
        ))
        .with_stage(PrepareAvatarStage::new(Arc::clone(&heygen), avatar, group_name))
        .with_stage(AwaitAvatarLookStage::new(Arc::clone(&heygen), pacing.look_poll))
        .with_stage(GenerateVideoStage::new(Arc::clone(&heygen), video, pacing.video_poll))
        .with_stage(CleanupAvatarGroupStage::new(heygen));

    if let (Some(shotstack), Some(template)) = (shotstack, render) {
        if let Some(options) = narration {
            orchestrator = orchestrator.with_stage(NarrationStage::new(
                clients.speech.clone(),
                clients.storage.clone(),
                options,
            ));
        }
        orchestrator = orchestrator.with_stage(RenderCompositionStage::new(
            shotstack,
            template,
            pacing.render_poll,
        ));
    }

    Ok(orchestrator.with_event_sink(Arc::new(LoggingEventSink::default())))
}

/// Inputs of the group-training pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingRequest {
    /// Group to train.
    pub group: TrainingGroup,
    /// Extra looks added before training.
    pub image_keys: Vec<String>,
    /// Name given to the added looks.
    pub looks_name: String,
}

impl TrainingRequest {
    /// Trains `group` as it is.
    #[must_use]
    pub fn new(group: TrainingGroup) -> Self {
        Self {
            group,
            image_keys: Vec::new(),
            looks_name: "Additional looks".to_string(),
        }
    }

    /// Adds looks before training.
    #[must_use]
    pub fn with_looks(mut self, image_keys: Vec<String>, name: impl Into<String>) -> Self {
        self.image_keys = image_keys;
        self.looks_name = name.into();
        self
    }

    fn validate(&self) -> Result<(), JobError> {
        match &self.group {
            TrainingGroup::Existing(id) if id.trim().is_empty() => {
                Err(JobError::validation("group id is empty"))
            }
            TrainingGroup::New { name, image_key }
                if name.trim().is_empty() || image_key.trim().is_empty() =>
            {
                Err(JobError::validation("a new group needs a name and an image key"))
            }
            _ if self.image_keys.iter().any(|k| k.trim().is_empty()) => {
                Err(JobError::validation("image keys must not be empty"))
            }
            _ => Ok(()),
        }
    }
}

/// Optional add-looks, then training polled until the group is ready.
pub fn group_training_pipeline(
    clients: &VendorClients,
    request: TrainingRequest,
    pacing: &Pacing,
) -> Result<Orchestrator, JobError> {
    const NAME: &str = "group_training";
    request.validate()?;
    let heygen = VendorClients::require(clients.heygen.as_ref(), "HeyGen", NAME)?;

    let mut orchestrator = Orchestrator::new(NAME)
        .with_stage(ResolveGroupStage::new(Arc::clone(&heygen), request.group));
    if !request.image_keys.is_empty() {
        orchestrator = orchestrator.with_stage(AddLooksStage::new(
            Arc::clone(&heygen),
            request.image_keys,
            request.looks_name,
        ));
    }
    Ok(orchestrator
        .with_stage(TrainGroupStage::new(heygen, pacing.training_poll))
        .with_event_sink(Arc::new(LoggingEventSink::default())))
}

/// A standalone render of `template` with the caller's merge fields.
pub fn render_pipeline(
    clients: &VendorClients,
    template: RenderTemplate,
    pacing: &Pacing,
) -> Result<Orchestrator, JobError> {
    const NAME: &str = "render";
    template.validate()?;
    let shotstack = VendorClients::require(clients.shotstack.as_ref(), "Shotstack", NAME)?;

    Ok(Orchestrator::new(NAME)
        .with_stage(RenderCompositionStage::new(shotstack, template, pacing.render_poll).standalone())
        .with_event_sink(Arc::new(LoggingEventSink::default())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use secrecy::SecretString;

    fn heygen_only() -> VendorClients {
        let transport = Arc::new(ScriptedTransport::new());
        VendorClients::default().with_heygen(
            HeyGenClient::new(transport, SecretString::from("k".to_string())).unwrap(),
        )
    }

    fn stock_request() -> AvatarVideoRequest {
        AvatarVideoRequest::new(
            "Sunny loft",
            VoiceSource::Existing("voice-1".to_string()),
            AvatarSource::TalkingPhoto("tp-1".to_string()),
        )
        .with_script("Welcome home.")
    }

    #[test]
    fn test_avatar_pipeline_stage_order() {
        let pipeline = avatar_video_pipeline(&heygen_only(), stock_request(), &Pacing::immediate())
            .unwrap();
        assert_eq!(
            pipeline.stage_names(),
            vec![
                "generate_script",
                "resolve_voice",
                "prepare_avatar",
                "await_avatar_look",
                "generate_video",
                "cleanup_avatar_group"
            ]
        );
    }

    #[test]
    fn test_avatar_pipeline_needs_gemini_without_script() {
        let mut request = stock_request();
        request.script = None;
        let err = avatar_video_pipeline(&heygen_only(), request, &Pacing::immediate()).unwrap_err();
        assert_eq!(
            err,
            JobError::validation("avatar_video pipeline needs a Gemini client")
        );
    }

    #[test]
    fn test_avatar_pipeline_rejects_non_image_photo() {
        let request = AvatarVideoRequest::new(
            "Sunny loft",
            VoiceSource::Existing("voice-1".to_string()),
            AvatarSource::Photo {
                filename: "clip.mov".to_string(),
                data: vec![1],
            },
        );
        let err = avatar_video_pipeline(&heygen_only(), request, &Pacing::immediate()).unwrap_err();
        assert!(matches!(err, JobError::UnsupportedMediaType { .. }));
    }

    #[test]
    fn test_narration_requires_render() {
        let request = stock_request().with_narration(NarrationOptions::default());
        let err = avatar_video_pipeline(&heygen_only(), request, &Pacing::immediate()).unwrap_err();
        assert!(matches!(err, JobError::Validation { .. }));
    }

    #[test]
    fn test_request_from_settings() {
        let settings = Settings::from_lookup(|key| match key {
            "DEFAULT_HEYGEN_VOICE_ID" => Some("voice-9".to_string()),
            "DEFAULT_HEYGEN_TALKING_PHOTO_ID" => Some("tp-9".to_string()),
            "SHOTSTACK_TEMPLATE_ID" => Some("tpl".to_string()),
            "SHOTSTACK_OWNER_ID" => Some("owner".to_string()),
            _ => None,
        })
        .unwrap();

        let request = AvatarVideoRequest::from_settings("Sunny loft", &settings).unwrap();
        assert_eq!(request.voice, VoiceSource::Existing("voice-9".to_string()));
        assert_eq!(request.avatar, AvatarSource::TalkingPhoto("tp-9".to_string()));
        let template = request.render.unwrap();
        assert_eq!(template.template_id, "tpl");
        assert_eq!(template.field("PRODUCT_CTA"), Some("FREE DELIVERY"));
    }

    #[test]
    fn test_clients_from_settings_skip_unconfigured() {
        let settings = Settings::from_lookup(|key| match key {
            "HEYGEN_API_KEY" => Some("hg".to_string()),
            "SUPABASE_SERVICE_KEY" => Some("sb".to_string()),
            _ => None,
        })
        .unwrap();
        let clients =
            VendorClients::from_settings(&settings, Arc::new(ScriptedTransport::new())).unwrap();

        assert!(clients.heygen.is_some());
        assert!(clients.shotstack.is_none());
        assert!(clients.storage.is_none(), "storage also needs SUPABASE_URL");
    }

    #[test]
    fn test_training_pipeline_optional_looks() {
        let request = TrainingRequest::new(TrainingGroup::Existing("g-1".to_string()));
        let plain = group_training_pipeline(&heygen_only(), request.clone(), &Pacing::immediate())
            .unwrap();
        assert_eq!(plain.stage_names(), vec!["resolve_group", "train_group"]);

        let with_looks = group_training_pipeline(
            &heygen_only(),
            request.with_looks(vec!["k1".to_string()], "extra"),
            &Pacing::immediate(),
        )
        .unwrap();
        assert_eq!(
            with_looks.stage_names(),
            vec!["resolve_group", "add_looks", "train_group"]
        );
    }

    #[test]
    fn test_render_pipeline_requires_ids() {
        let transport = Arc::new(ScriptedTransport::new());
        let clients = VendorClients::default().with_shotstack(
            ShotstackClient::new(transport, SecretString::from("k".to_string())).unwrap(),
        );
        let err = render_pipeline(&clients, RenderTemplate::new("", "owner"), &Pacing::immediate())
            .unwrap_err();
        assert_eq!(err, JobError::validation("render needs a template id"));
    }
}
