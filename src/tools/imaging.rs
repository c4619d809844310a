//! Image generation through the protected prediction API.
//!
//! # Responsibilities
//! - Enhance the prompt for the requested style
//! - Map the aspect ratio to output dimensions
//! - Run the prediction through the [`ProtectedCaller`]
//! - Degrade to a placeholder when the breaker is open or no API token is set

use serde::{Deserialize, Serialize};

use crate::generation::PredictionRequest;
use crate::resilience::{JobError, JobOutcome, ProtectedCaller};

pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/512";

/// Prompt style presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStyle {
    #[default]
    Product,
    Lifestyle,
    Minimalist,
    Artistic,
}

impl ImageStyle {
    fn prefix(self) -> &'static str {
        match self {
            ImageStyle::Product => "Professional product photography of",
            ImageStyle::Lifestyle => "Lifestyle photography showing",
            ImageStyle::Minimalist => "Minimalist, clean composition of",
            ImageStyle::Artistic => "Artistic, creative rendering of",
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            ImageStyle::Product => {
                ", white background, studio lighting, high resolution, commercial quality"
            }
            ImageStyle::Lifestyle => ", natural lighting, real-world setting, authentic feel",
            ImageStyle::Minimalist => ", simple background, elegant, modern aesthetic",
            ImageStyle::Artistic => {
                ", creative lighting, unique perspective, artistic interpretation"
            }
        }
    }

    pub fn enhance(self, prompt: &str) -> String {
        format!("{} {}{}", self.prefix(), prompt, self.suffix())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Wide,
    #[serde(rename = "9:16")]
    Tall,
    #[serde(rename = "4:3")]
    Landscape,
    #[serde(rename = "3:4")]
    Portrait,
}

impl AspectRatio {
    /// Output size as `(width, height)`.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            AspectRatio::Square => (1024, 1024),
            AspectRatio::Wide => (1024, 576),
            AspectRatio::Tall => (576, 1024),
            AspectRatio::Landscape => (1024, 768),
            AspectRatio::Portrait => (768, 1024),
        }
    }
}

/// Arguments of `generate_image`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateArgs {
    pub prompt: String,
    #[serde(default)]
    pub style: ImageStyle,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    /// Acting user, injected from the call context.
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub image_url: String,
    pub prompt: String,
    pub style: ImageStyle,
    pub aspect_ratio: AspectRatio,
    pub model: String,
    /// User the image was generated for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Set on degraded results (placeholder image).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct ImageGenerator {
    caller: Option<ProtectedCaller<PredictionRequest, Vec<String>>>,
    model: String,
}

impl std::fmt::Debug for ImageGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageGenerator")
            .field("model", &self.model)
            .field("configured", &self.caller.is_some())
            .finish()
    }
}

impl ImageGenerator {
    pub fn new(caller: ProtectedCaller<PredictionRequest, Vec<String>>, model: impl Into<String>) -> Self {
        Self {
            caller: Some(caller),
            model: model.into(),
        }
    }

    /// Generator without a backend; every call returns a mock image.
    pub fn unconfigured(model: impl Into<String>) -> Self {
        Self {
            caller: None,
            model: model.into(),
        }
    }

    pub async fn generate(&self, args: &GenerateArgs) -> Result<GeneratedImage, JobError> {
        let preview: String = args.prompt.chars().take(50).collect();
        tracing::info!(
            prompt = %preview,
            style = ?args.style,
            user_id = args.user_id.as_deref().unwrap_or("anonymous"),
            "Generating image"
        );

        let placeholder = |model: &str, error: &str| GeneratedImage {
            image_url: PLACEHOLDER_IMAGE.to_string(),
            prompt: args.prompt.clone(),
            style: args.style,
            aspect_ratio: args.aspect_ratio,
            model: model.to_string(),
            requested_by: args.user_id.clone(),
            job_id: None,
            error: Some(error.to_string()),
        };

        let Some(caller) = &self.caller else {
            return Ok(placeholder("mock", "Client not initialized"));
        };

        let (width, height) = args.aspect_ratio.dimensions();
        let request = PredictionRequest {
            model: self.model.clone(),
            prompt: args.style.enhance(&args.prompt),
            width,
            height,
        };

        match caller.run(&request).await? {
            JobOutcome::Completed { job_id, output } => {
                let image_url = output.into_iter().next().ok_or_else(|| {
                    JobError::GenerationFailed("prediction returned no output".to_string())
                })?;
                Ok(GeneratedImage {
                    image_url,
                    prompt: args.prompt.clone(),
                    style: args.style,
                    aspect_ratio: args.aspect_ratio,
                    model: self.model.clone(),
                    requested_by: args.user_id.clone(),
                    job_id: Some(job_id),
                    error: None,
                })
            }
            JobOutcome::Unavailable { reason, .. } => Ok(placeholder(&self.model, &reason)),
        }
    }
}
