use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use thiserror::Error;

// =============================================================================
// Message Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

// =============================================================================
// Inline images
// =============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum ImageError {
    #[error("not a base64 data URL")]
    NotDataUrl,

    #[error("invalid base64 payload: {0}")]
    Decode(String),
}

/// A base64-encoded image sent inline with a prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Parse `data:<mime>;base64,<payload>`.
    pub fn from_data_url(url: &str) -> Result<Self, ImageError> {
        let rest = url.strip_prefix("data:").ok_or(ImageError::NotDataUrl)?;
        let (meta, payload) = rest.split_once(',').ok_or(ImageError::NotDataUrl)?;
        let mime_type = meta
            .strip_suffix(";base64")
            .ok_or(ImageError::NotDataUrl)?;
        if mime_type.is_empty() || payload.is_empty() {
            return Err(ImageError::NotDataUrl);
        }
        Ok(Self {
            mime_type: mime_type.to_string(),
            data: payload.to_string(),
        })
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn decode(&self) -> Result<Vec<u8>, ImageError> {
        base64::engine::general_purpose::STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| ImageError::Decode(e.to_string()))
    }

    /// File extension matching the mime type, `bin` when unknown.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/png" => "png",
            "image/webp" => "webp",
            "image/gif" => "gif",
            "image/heic" => "heic",
            _ => "bin",
        }
    }
}

// =============================================================================
// GenerativeModel Trait
// =============================================================================

/// The two calls the application makes against a hosted model.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Single-shot request constrained to JSON matching `schema`. Returns the raw text.
    async fn generate_json(
        &self,
        system: &str,
        prompt: &str,
        image: Option<&InlineImage>,
        schema: serde_json::Value,
    ) -> Result<String>;

    /// Free-form conversational turn.
    async fn converse(&self, system: &str, history: &[Message], input: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_round_trip() {
        let img = InlineImage::from_bytes(&[0xff, 0xd8, 0xff], "image/jpeg");
        let url = img.to_data_url();
        assert!(url.starts_with("data:image/jpeg;base64,"));
        let parsed = InlineImage::from_data_url(&url).unwrap();
        assert_eq!(parsed.decode().unwrap(), vec![0xff, 0xd8, 0xff]);
        assert_eq!(parsed.extension(), "jpg");
    }

    #[test]
    fn remote_urls_are_not_data_urls() {
        assert_eq!(
            InlineImage::from_data_url("https://cdn.example.com/a.jpg"),
            Err(ImageError::NotDataUrl)
        );
        assert_eq!(
            InlineImage::from_data_url("data:image/png,rawbytes"),
            Err(ImageError::NotDataUrl)
        );
    }

    #[test]
    fn bad_payload_fails_decode() {
        let img = InlineImage::from_data_url("data:image/png;base64,@@@").unwrap();
        assert!(matches!(img.decode(), Err(ImageError::Decode(_))));
    }
}
