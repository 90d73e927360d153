// Summarization wrappers with the degrade-to-empty failure policy.
use tracing::{info, warn};

use super::{extract_json_array_from_text, LlmProvider, LlmRequest, UsageMetadata};

/// Outcome of a condensation call. `text` is empty when the provider failed;
/// usage is absent in that case so the ledger sees nothing to add.
#[derive(Debug, Clone, Default)]
pub struct Condensed {
    pub text: String,
    pub usage: Option<UsageMetadata>,
}

/// Condense a payload under an instruction. Never fails: any provider error
/// is logged and reduces to an empty result.
pub async fn condense<P: LlmProvider + ?Sized>(
    provider: &P,
    instruction: &str,
    payload: &str,
) -> Condensed {
    let request = LlmRequest {
        prompt: format!("{}\n\n{}", instruction, payload),
        max_tokens: None,
        temperature: Some(0.5),
        timeout_seconds: None,
    };

    match provider.generate(request).await {
        Ok(response) => {
            info!(
                "condensed {} chars of input into {} chars",
                payload.len(),
                response.content.len()
            );
            Condensed {
                text: response.content.trim().to_string(),
                usage: Some(response.usage),
            }
        }
        Err(e) => {
            warn!("condensation failed: {}, returning empty summary", e);
            Condensed::default()
        }
    }
}

/// Extract a list of short strings from the model's free-text answer.
/// Best-effort structured decode: tolerates code fences and surrounding
/// prose, falls back to an empty list on any parse failure.
pub async fn extract_list<P: LlmProvider + ?Sized>(
    provider: &P,
    instruction: &str,
    payload: &str,
) -> (Vec<String>, Option<UsageMetadata>) {
    let prompt = format!(
        "{}\n\nAnswer with a JSON array of short strings and nothing else.\n\n{}",
        instruction, payload
    );

    let request = LlmRequest {
        prompt,
        max_tokens: None,
        temperature: Some(0.3),
        timeout_seconds: None,
    };

    match provider.generate(request).await {
        Ok(response) => {
            let parsed = extract_json_array_from_text(&response.content)
                .and_then(|json| serde_json::from_str::<Vec<String>>(&json).ok());
            let entries = match parsed {
                Some(entries) => entries
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                None => {
                    warn!("no JSON array found in extraction response, returning empty list");
                    Vec::new()
                }
            };
            (entries, Some(response.usage))
        }
        Err(e) => {
            warn!("list extraction failed: {}, returning empty list", e);
            (Vec::new(), None)
        }
    }
}

/// Extractive fallback when the LLM is unavailable: stitch the first few
/// headlines into a plain recap.
pub fn fallback_recap(headlines: &[String]) -> String {
    let picked: Vec<String> = headlines
        .iter()
        .map(|h| h.trim())
        .filter(|h| !h.is_empty())
        .take(3)
        .map(|h| truncate(h, 120))
        .collect();

    if picked.is_empty() {
        return String::new();
    }
    format!("Covered: {}.", picked.join("; "))
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_recap_uses_first_headlines() {
        let headlines = vec![
            "City council approves budget".to_string(),
            "  ".to_string(),
            "Local team wins opener".to_string(),
            "Rates hold steady".to_string(),
            "A fourth headline".to_string(),
        ];
        let recap = fallback_recap(&headlines);
        assert!(recap.starts_with("Covered: City council approves budget;"));
        assert!(recap.contains("Rates hold steady"));
        assert!(!recap.contains("fourth headline"));
    }

    #[test]
    fn fallback_recap_empty_input() {
        assert_eq!(fallback_recap(&[]), "");
    }

    #[test]
    fn truncate_appends_ellipsis() {
        let long = "a".repeat(150);
        let out = truncate(&long, 120);
        assert_eq!(out.len(), 120);
        assert!(out.ends_with("..."));
    }
}
