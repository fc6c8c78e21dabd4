use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String>;
}

const GOOGLE_TRANSLATE_URL: &str = "https://translation.googleapis.com";

/// Cloud Translation v2 client
#[derive(Clone)]
pub struct GoogleTranslateClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    target: &'a str,
    format: &'a str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Deserialize)]
struct TranslateData {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

impl GoogleTranslateClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            base_url: GOOGLE_TRANSLATE_URL.to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl Translator for GoogleTranslateClient {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        let api_key = self.api_key
            .as_deref()
            .context("No translation API key configured")?;

        let url = format!("{}/language/translate/v2", self.base_url);
        let request = TranslateRequest {
            q: text,
            target: target_language,
            format: "text",
        };

        let response = self.client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .context("Failed to send request to translation service")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Translation request failed: {} {}", status, body);
        }

        let parsed: TranslateResponse = response
            .json()
            .await
            .context("Failed to parse translation response")?;

        translated_text(parsed)
    }
}

fn translated_text(response: TranslateResponse) -> Result<String> {
    response
        .data
        .translations
        .into_iter()
        .next()
        .map(|t| t.translated_text)
        .context("Translation service returned no translations")
}
