use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Core trait for LLM providers. Everything the aggregation core needs from a
/// model is plain text completion; structured decoding happens on top of it.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate completion for a given prompt
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse>;

    /// Tag used when accounting this provider's usage
    fn provider_tag(&self) -> &str;
}

/// Request structure for LLM generation
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub prompt: String,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
}

/// Response from LLM generation
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
}

/// Per-call usage counters. "Units" rather than "tokens": some providers
/// meter characters. Zero values are valid and must survive aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_units: usize,
    pub completion_units: usize,
}

impl UsageMetadata {
    pub fn add(&mut self, other: &UsageMetadata) {
        self.prompt_units += other.prompt_units;
        self.completion_units += other.completion_units;
    }
}

pub mod remote;
pub mod summarizer;

/// Helper to extract a JSON array from text that might contain markdown
/// backticks or surrounding prose.
pub fn extract_json_array_from_text(text: &str) -> Option<String> {
    // 1. Try to find content between ```json and ```
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        if let Some(end) = rest.find("```") {
            let candidate = rest[..end].trim();
            if candidate.starts_with('[') {
                return Some(candidate.to_string());
            }
        }
    }

    // 2. Try to find content between ``` and ```
    if let Some(start) = text.find("```") {
        let rest = &text[start + 3..];
        if let Some(end) = rest.find("```") {
            let candidate = rest[..end].trim();
            if candidate.starts_with('[') {
                return Some(candidate.to_string());
            }
        }
    }

    // 3. Try to find the first '[' and last ']'
    if let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) {
        if start < end {
            return Some(text[start..=end].to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_json_array() {
        let text = "Sure, here you go:\n```json\n[\"alpha\", \"beta\"]\n```\nAnything else?";
        let json = extract_json_array_from_text(text).unwrap();
        let topics: Vec<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(topics, vec!["alpha", "beta"]);
    }

    #[test]
    fn extracts_bare_array_with_preamble() {
        let text = "The key topics are: [\"rates\", \"zoning\"] as requested.";
        let json = extract_json_array_from_text(text).unwrap();
        assert_eq!(json, "[\"rates\", \"zoning\"]");
    }

    #[test]
    fn no_array_yields_none() {
        assert!(extract_json_array_from_text("no structure here").is_none());
        assert!(extract_json_array_from_text("]broken[").is_none());
    }

    #[test]
    fn usage_add_is_fieldwise() {
        let mut total = UsageMetadata::default();
        total.add(&UsageMetadata {
            prompt_units: 10,
            completion_units: 5,
        });
        total.add(&UsageMetadata::default());
        assert_eq!(total.prompt_units, 10);
        assert_eq!(total.completion_units, 5);
    }
}
