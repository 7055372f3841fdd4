use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use nb_core::compose::{ComposeInput, Composer};
use nb_core::{Error, Result};

use crate::Config;

const DEFAULT_MODEL: &str = "gemini-2.5-pro";

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: String,
}

/// Composes the newsletter through the Gemini generateContent endpoint.
pub struct GeminiComposer {
    client: Arc<Client>,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiComposer {
    pub fn new(config: Config) -> Result<Self> {
        let api_key = config
            .api_key
            .ok_or_else(|| Error::Composition("Gemini requires an API key".to_string()))?;
        Ok(Self {
            client: Arc::new(Client::new()),
            api_key,
            model: config.model_name.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        })
    }
}

impl fmt::Debug for GeminiComposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiComposer")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn build_prompt(input: &ComposeInput) -> Result<String> {
    let mut prompt = String::new();

    prompt.push_str(&input.instructions);
    prompt.push_str("\n\nNewsletter date: ");
    prompt.push_str(&input.date);

    prompt.push_str("\n\nScraped product data (JSON, keyed by article URL):\n");
    prompt.push_str(&serde_json::to_string_pretty(&input.records)?);

    if let Some(urls) = &input.image_urls {
        prompt.push_str("\n\nPublic image URLs (JSON, keyed by file name):\n");
        prompt.push_str(&serde_json::to_string_pretty(urls)?);
    }

    if let Some(example) = &input.style_example {
        prompt.push_str("\n\nMatch the style of this previous issue:\n");
        prompt.push_str(example);
    }

    prompt.push_str("\n\nReturn one complete HTML document.");
    Ok(prompt)
}

fn extract_text(response: GenerateResponse) -> Result<String> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content.parts.into_iter().next())
        .map(|part| part.text)
        .ok_or_else(|| Error::Composition("Gemini returned no candidates".to_string()))
}

#[async_trait]
impl Composer for GeminiComposer {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn compose(&self, input: &ComposeInput) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: build_prompt(input)?,
                }],
            }],
        };

        debug!("Requesting newsletter from {}", self.model);
        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent?key={}",
                self.base_url, self.model, self.api_key
            ))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<GenerateResponse>()
            .await?;

        extract_text(response)
    }
}
