//! Generation request/response models for the content routing layer.

use serde::{Deserialize, Serialize};

/// One part of a generation request. Requests are multi-part so that text
/// and image content can be mixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestPart {
    Text {
        text: String,
    },
    Image {
        /// MIME type, e.g. `image/png`.
        mime_type: String,
        /// Base64-encoded image bytes.
        data: String,
    },
}

/// A structured request handed to a generator. The routing layer never
/// mutates a request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub parts: Vec<RequestPart>,
    pub system: Option<String>,
    /// Model override; the generator's default is used when unset.
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Tool identifiers active for this request (used by tool-based routing).
    #[serde(default)]
    pub active_tools: Vec<String>,
}

impl GenerationRequest {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![RequestPart::Text { text: text.into() }],
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.active_tools = tools;
        self
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.parts.push(RequestPart::Text { text: text.into() });
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                RequestPart::Text { text } => Some(text.as_str()),
                RequestPart::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether any part carries image data (by MIME prefix).
    pub fn has_image_parts(&self) -> bool {
        self.parts.iter().any(|p| {
            matches!(p, RequestPart::Image { mime_type, .. } if mime_type.starts_with("image/"))
        })
    }
}

/// A complete (non-streaming) generation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub text: String,
    /// The model that actually served the request.
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub stop_reason: Option<String>,
}

impl GenerationResponse {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// One chunk of a streaming generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationChunk {
    pub delta: String,
    pub done: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_concatenation() {
        let mut request = GenerationRequest::from_text("first");
        request.push_text("second");
        assert_eq!(request.text(), "first\nsecond");
    }

    #[test]
    fn test_image_detection_by_mime_prefix() {
        let mut request = GenerationRequest::from_text("describe this");
        assert!(!request.has_image_parts());

        request.parts.push(RequestPart::Image {
            mime_type: "application/pdf".to_string(),
            data: String::new(),
        });
        assert!(!request.has_image_parts());

        request.parts.push(RequestPart::Image {
            mime_type: "image/png".to_string(),
            data: "aGk=".to_string(),
        });
        assert!(request.has_image_parts());
    }
}
