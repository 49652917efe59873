//! Gemini multimodal provider.
//!
//! Sends the analysis prompt plus inline base64 JPEG frames to the
//! `generateContent` endpoint. The primary credential falls back to the
//! backup credential on quota-shaped errors without resetting the caller's
//! attempt count.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use repflow_core::models::{Keyframe, RawCandidate, TranscriptSegment};
use repflow_core::{AppError, Config};

use super::prompt::build_analysis_prompt;
use super::{extract_candidates, Analyzer, AnalyzerContext};

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: Content,
}

pub struct GeminiAnalyzer {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    backup_api_key: Option<String>,
}

impl GeminiAnalyzer {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let api_key = config
            .gemini_api_key
            .clone()
            .ok_or_else(|| AppError::Internal("GEMINI_API_KEY not configured".into()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key,
            backup_api_key: config.gemini_api_backup_key.clone(),
        })
    }

    /// Override the endpoint base URL (tests point this at a local server).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    async fn generate(&self, parts: Vec<Part>) -> Result<String, AppError> {
        match self.generate_with_key(&parts, &self.api_key).await {
            Ok(text) => Ok(text),
            Err(err) if is_quota_error(&err) => {
                let Some(backup) = &self.backup_api_key else {
                    return Err(err);
                };
                tracing::warn!(error = %err, "Primary analyzer credential exhausted, using backup");
                self.generate_with_key(&parts, backup).await
            }
            Err(err) => Err(err),
        }
    }

    async fn generate_with_key(&self, parts: &[Part], api_key: &str) -> Result<String, AppError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: parts
                    .iter()
                    .map(|p| Part {
                        text: p.text.clone(),
                        inline_data: p.inline_data.as_ref().map(|d| InlineData {
                            mime_type: d.mime_type.clone(),
                            data: d.data.clone(),
                        }),
                    })
                    .collect(),
            }],
            generation_config: GenerationConfig {
                max_output_tokens: 8192,
                temperature: 0.2,
            },
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint, self.model, api_key
        );
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::AnalyzeFailed(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::AnalyzeFailed(format!(
                "API error {}: {}",
                status,
                body.chars().take(500).collect::<String>()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AppError::AnalyzeFailed(format!("unparseable response: {}", e)))?;

        let text: String = parsed
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        if text.is_empty() {
            return Err(AppError::AnalyzeFailed("empty model response".into()));
        }
        Ok(text)
    }
}

/// Quota-shaped errors trip the credential fallback; anything else does not.
fn is_quota_error(err: &AppError) -> bool {
    let text = err.to_string().to_lowercase();
    text.contains("429") || text.contains("quota") || text.contains("resource_exhausted")
}

#[async_trait]
impl Analyzer for GeminiAnalyzer {
    #[tracing::instrument(skip(self, frames, transcript, ctx), fields(frames = frames.len(), carousel_index = ctx.carousel_index))]
    async fn analyze(
        &self,
        frames: &[Keyframe],
        transcript: Option<&[TranscriptSegment]>,
        ctx: &AnalyzerContext,
    ) -> Result<Vec<RawCandidate>, AppError> {
        if frames.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = build_analysis_prompt(ctx, transcript, frames);
        let mut parts = vec![Part {
            text: Some(prompt),
            inline_data: None,
        }];
        for frame in frames {
            let bytes = tokio::fs::read(&frame.path).await?;
            parts.push(Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: "image/jpeg".into(),
                    data: base64::engine::general_purpose::STANDARD.encode(bytes),
                }),
            });
        }

        let text = self.generate(parts).await?;
        let candidates = extract_candidates(&text)?;
        tracing::info!(candidates = candidates.len(), "Analyzer returned segments");
        Ok(candidates)
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, AppError> {
        self.generate(vec![Part {
            text: Some(prompt.to_string()),
            inline_data: None,
        }])
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_errors_are_recognized() {
        assert!(is_quota_error(&AppError::AnalyzeFailed(
            "API error 429 Too Many Requests: quota exceeded".into()
        )));
        assert!(is_quota_error(&AppError::AnalyzeFailed(
            "RESOURCE_EXHAUSTED".into()
        )));
        assert!(!is_quota_error(&AppError::AnalyzeFailed(
            "API error 500: boom".into()
        )));
    }

    #[test]
    fn request_serializes_inline_data_in_camel_case() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: None,
                    inline_data: Some(InlineData {
                        mime_type: "image/jpeg".into(),
                        data: "QUJD".into(),
                    }),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: 100,
                temperature: 0.2,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value["contents"][0]["parts"][0]["inlineData"]["mimeType"],
            "image/jpeg"
        );
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 100);
    }
}
