use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};

use super::{Translator, TranslatorError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Translator backed by an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiTranslator {
    client: HttpClient,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiTranslator {
    pub fn new(api_key: &str, model: &str) -> Result<Self, TranslatorError> {
        let client = HttpClient::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| TranslatorError::Backend(format!("http client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different endpoint (self-hosted gateways).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[derive(Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, TranslatorError> {
        let system_prompt = format!(
            "You are an expert translation assistant specialized in casual chat \
             communications. Translate the given text from {source_lang} to {target_lang}, \
             preserving the original tone and cultural context. Provide only the translated \
             text, without any additional commentary."
        );
        let user_prompt =
            format!("Translate the following text from {source_lang} to {target_lang}:\n\n{text}");

        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt,
                },
            ],
            temperature: 0.3,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| TranslatorError::Backend(e.to_string()))?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(TranslatorError::RateLimited);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TranslatorError::Backend(format!("{status}: {body}")));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| TranslatorError::Backend(format!("invalid response: {e}")))?;

        let translated = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| TranslatorError::Backend("no translation received".to_string()))?;

        Ok(translated.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_client_or_reports_why() {
        let translator = OpenAiTranslator::new("sk-test", "gpt-4o-mini").unwrap();
        assert_eq!(translator.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let translator = OpenAiTranslator::new("sk-test", "gpt-4o-mini")
            .unwrap()
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(translator.base_url, "http://localhost:8080/v1");
    }
}
