//! Google Gemini client
//!
//! Wraps the `generateContent` endpoint and exposes the three factor
//! operations: single factor, factor batch, and backtest script.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, NetworkConfig, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use crate::generation::prompts;
use crate::normalizers::{error_body_text, strip_code_fences};
use crate::types::*;

const DEFAULT_CITATION_TITLE: &str = "Market Reference";
const DEFAULT_CITATION_URL: &str = "#";

/// Gemini API client
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, network: &NetworkConfig) -> Result<Self> {
        Self::with_base_url(DEFAULT_GEMINI_BASE_URL, api_key, DEFAULT_GEMINI_MODEL, network)
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::with_base_url(
            &config.gemini_base_url,
            config.gemini_api_key.as_deref().unwrap_or_default(),
            &config.gemini_model,
            &config.network(),
        )
    }

    /// Create client with a specific API root and model (for testing).
    ///
    /// A blank key is accepted here; generation calls then fail without
    /// reaching the API.
    pub fn with_base_url(
        base_url: &str,
        api_key: &str,
        model: &str,
        network: &NetworkConfig,
    ) -> Result<Self> {
        let client = network
            .proxied_builder()?
            .build()
            .map_err(|e| LabError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let api_key = Some(api_key.trim())
            .filter(|key| !key.is_empty())
            .map(str::to_string);
        if api_key.is_none() {
            warn!("GEMINI_API_KEY not set; factor generation is disabled");
        }

        info!("Gemini client initialized: model={}", model);

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// POST /v1beta/models/{model}:generateContent
    pub async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LabError::Config("GEMINI_API_KEY is not set".to_string()))?;
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);

        debug!("Sending request to Gemini: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| LabError::Gemini(format!("request failed: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let body = error_body_text(response.text().await);
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!("Gemini returned error: status={}, body={}", status, message);
            return Err(LabError::Gemini(format!("{} - {}", status, message)));
        }

        response
            .json()
            .await
            .map_err(|e| LabError::InvalidResponse(format!("Gemini response: {}", e)))
    }

    /// One alpha factor for a free-text idea
    pub async fn generate_alpha_factor(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<AlphaFactor> {
        info!("Generating alpha factor for prompt: {}", prompt);

        let request = GenerateContentRequest::json(
            prompts::single_factor_prompt(prompt, config),
            prompts::factor_schema(),
        );
        let response = self.generate_content(&request).await?;

        let text = response.text().ok_or(LabError::EmptyResponse)?;
        let spec: FactorSpec = serde_json::from_str(&text)
            .map_err(|e| LabError::InvalidResponse(format!("Gemini factor JSON: {}", e)))?;

        let factor = AlphaFactor::from_spec(spec, response.citations());
        info!("Generated factor {} ({})", factor.name, factor.id);
        Ok(factor)
    }

    /// `count` diverse alpha factors
    pub async fn generate_bulk_alpha_factors(
        &self,
        count: usize,
        config: &GenerationConfig,
    ) -> Result<Vec<AlphaFactor>> {
        if count == 0 {
            return Err(LabError::InvalidInput("count must be at least 1".to_string()));
        }

        info!("Generating {} alpha factors", count);

        let request = GenerateContentRequest::json(
            prompts::bulk_factor_prompt(count, config),
            prompts::factor_list_schema(),
        );
        let response = self.generate_content(&request).await?;

        let text = response.text().ok_or(LabError::EmptyResponse)?;
        let mut specs: Vec<FactorSpec> = serde_json::from_str(&text)
            .map_err(|e| LabError::InvalidResponse(format!("Gemini factor list JSON: {}", e)))?;

        if specs.len() < count {
            return Err(LabError::InvalidResponse(format!(
                "Gemini returned {} factors, expected {}",
                specs.len(),
                count
            )));
        }
        if specs.len() > count {
            warn!("Gemini returned {} factors, keeping first {}", specs.len(), count);
            specs.truncate(count);
        }

        let sources = response.citations();
        Ok(specs
            .into_iter()
            .map(|spec| AlphaFactor::from_spec(spec, sources.clone()))
            .collect())
    }

    /// Standalone Python backtest script for `formula`
    pub async fn generate_backtest_python_code(&self, formula: &str) -> Result<String> {
        info!("Generating backtest script for formula: {}", formula);

        let request = GenerateContentRequest::text(prompts::backtest_code_prompt(formula));
        let response = self.generate_content(&request).await?;

        let text = response.text().ok_or(LabError::EmptyResponse)?;
        let code = strip_code_fences(&text);
        if code.is_empty() {
            return Err(LabError::EmptyResponse);
        }

        debug!("Generated script: {} bytes", code.len());
        Ok(code)
    }
}

#[async_trait::async_trait]
impl BacktestCodeGenerator for GeminiClient {
    async fn generate_backtest_python_code(&self, formula: &str) -> Result<String> {
        GeminiClient::generate_backtest_python_code(self, formula).await
    }
}

// Request types for the generateContent API

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    pub generation_config: GenerationSettings,
}

impl GenerateContentRequest {
    /// Structured JSON reply constrained by `schema`, with code execution enabled
    pub fn json(prompt: String, schema: serde_json::Value) -> Self {
        Self {
            contents: vec![Content::user(prompt)],
            tools: vec![Tool::code_execution()],
            generation_config: GenerationSettings {
                response_mime_type: "application/json".to_string(),
                response_schema: Some(schema),
            },
        }
    }

    /// Free-text reply
    pub fn text(prompt: String) -> Self {
        Self {
            contents: vec![Content::user(prompt)],
            tools: Vec::new(),
            generation_config: GenerationSettings {
                response_mime_type: "text/plain".to_string(),
                response_schema: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: String) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: Some(text),
                thought: None,
            }],
        }
    }
}

/// Content part; non-text parts (executable code, code results) deserialize with `text: None`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub code_execution: CodeExecution,
}

impl Tool {
    pub fn code_execution() -> Self {
        Self {
            code_execution: CodeExecution {},
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CodeExecution {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    pub response_mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
}

// Response types

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroundingChunk {
    pub web: Option<WebSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSource {
    pub uri: Option<String>,
    pub title: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate; `None` when empty
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;

        let text: String = content
            .parts
            .iter()
            .filter(|part| part.thought != Some(true))
            .filter_map(|part| part.text.as_deref())
            .collect();

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Grounding citations of the first candidate, with placeholders for missing fields
    pub fn citations(&self) -> Vec<Citation> {
        let Some(metadata) = self
            .candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
        else {
            return Vec::new();
        };

        metadata
            .grounding_chunks
            .iter()
            .map(|chunk| {
                let web = chunk.web.as_ref();
                Citation {
                    title: web
                        .and_then(|w| w.title.clone())
                        .filter(|t| !t.is_empty())
                        .unwrap_or_else(|| DEFAULT_CITATION_TITLE.to_string()),
                    url: web
                        .and_then(|w| w.uri.clone())
                        .filter(|u| !u.is_empty())
                        .unwrap_or_else(|| DEFAULT_CITATION_URL.to_string()),
                }
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}
