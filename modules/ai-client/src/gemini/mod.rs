mod client;
pub(crate) mod types;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::traits::{GenerativeModel, InlineImage, Message};

use client::GeminiClient;
use types::*;

// =============================================================================
// Gemini
// =============================================================================

#[derive(Clone)]
pub struct Gemini {
    api_key: String,
    pub(crate) model: String,
    base_url: Option<String>,
}

impl Gemini {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub(crate) fn client(&self) -> GeminiClient {
        let client = GeminiClient::new(&self.api_key);
        if let Some(ref url) = self.base_url {
            client.with_base_url(url)
        } else {
            client
        }
    }

    async fn send(&self, request: &GenerateRequest) -> Result<String> {
        let response = self.client().generate(&self.model, request).await?;

        response.text().ok_or_else(|| match &response.prompt_feedback {
            Some(feedback) => anyhow!("Gemini returned no text (prompt feedback: {})", feedback),
            None => anyhow!(
                "Gemini returned no text (finish reason: {})",
                response.finish_reason().unwrap_or("unknown")
            ),
        })
    }
}

#[async_trait]
impl GenerativeModel for Gemini {
    async fn generate_json(
        &self,
        system: &str,
        prompt: &str,
        image: Option<&InlineImage>,
        schema: serde_json::Value,
    ) -> Result<String> {
        let content = match image {
            Some(image) => Content::user_with_image(prompt, image),
            None => Content::user(prompt),
        };
        let request = GenerateRequest::new()
            .system(system)
            .content(content)
            .temperature(0.0)
            .json_schema(schema);

        self.send(&request).await
    }

    async fn converse(&self, system: &str, history: &[Message], input: &str) -> Result<String> {
        let request = GenerateRequest::new()
            .system(system)
            .temperature(0.7)
            .max_output_tokens(1024);
        let request = history
            .iter()
            .map(Content::from)
            .fold(request, GenerateRequest::content)
            .content(Content::user(input));

        self.send(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_new() {
        let ai = Gemini::new("test-key", "gemini-2.0-flash");
        assert_eq!(ai.model(), "gemini-2.0-flash");
        assert_eq!(ai.api_key, "test-key");
    }

    #[test]
    fn test_gemini_with_base_url() {
        let ai = Gemini::new("test-key", "gemini-2.0-flash").with_base_url("http://localhost:8080");
        assert_eq!(ai.base_url, Some("http://localhost:8080".to_string()));
    }
}
