//! Web search via the DuckDuckGo Instant Answer API.
//!
//! Requires no API key: the endpoint returns abstracts, instant answers,
//! definitions, and related topics rather than full result listings, which
//! is enough for the text snippet [`WebSearchPort`] promises.

use async_trait::async_trait;
use harbor_application::ports::llm_gateway::GatewayError;
use harbor_application::ports::web_search::WebSearchPort;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for the search provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchProviderConfig {
    /// Instant Answer endpoint.
    pub base_url: String,
    /// HTTP-level request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for SearchProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.duckduckgo.com/".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

/// DuckDuckGo adapter implementing [`WebSearchPort`].
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    config: SearchProviderConfig,
}

impl DuckDuckGoSearch {
    pub fn new(config: SearchProviderConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| GatewayError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl WebSearchPort for DuckDuckGoSearch {
    async fn search(&self, query: &str) -> Result<String, GatewayError> {
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .header("User-Agent", "Harbor/0.4 (Script Host)")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::ServerError(format!(
                "search API returned {}",
                status
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        let snippet = format_search_results(query, &body);
        debug!(query, bytes = snippet.len(), "Search results formatted");
        Ok(snippet)
    }
}

/// Format the Instant Answer response into a readable text snippet.
fn format_search_results(query: &str, data: &serde_json::Value) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(abstract_text) = data["AbstractText"].as_str()
        && !abstract_text.is_empty()
    {
        let source = data["AbstractSource"].as_str().unwrap_or("Unknown");
        sections.push(format!("{} (source: {})", abstract_text, source));
    }

    if let Some(answer) = data["Answer"].as_str()
        && !answer.is_empty()
    {
        sections.push(format!("Answer: {}", answer));
    }

    if let Some(definition) = data["Definition"].as_str()
        && !definition.is_empty()
    {
        sections.push(format!("Definition: {}", definition));
    }

    if let Some(topics) = data["RelatedTopics"].as_array() {
        let topic_lines: Vec<String> = topics
            .iter()
            .filter_map(|t| {
                let text = t["Text"].as_str()?;
                if text.is_empty() {
                    return None;
                }
                let url = t["FirstURL"].as_str().unwrap_or("");
                Some(format!("- {} ({})", text, url))
            })
            .take(5)
            .collect();

        if !topic_lines.is_empty() {
            sections.push(format!("Related:\n{}", topic_lines.join("\n")));
        }
    }

    if sections.is_empty() {
        return format!("No instant answer found for '{}'.", query);
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_with_abstract() {
        let data = serde_json::json!({
            "AbstractText": "Rust is a systems programming language.",
            "AbstractSource": "Wikipedia",
            "Answer": "",
            "Definition": "",
            "RelatedTopics": []
        });

        let output = format_search_results("Rust", &data);
        assert!(output.contains("systems programming language"));
        assert!(output.contains("Wikipedia"));
    }

    #[test]
    fn test_format_empty_response() {
        let data = serde_json::json!({
            "AbstractText": "",
            "Answer": "",
            "Definition": "",
            "RelatedTopics": []
        });

        let output = format_search_results("obscure query", &data);
        assert!(output.contains("No instant answer found for 'obscure query'"));
    }

    #[test]
    fn test_format_related_topics_capped() {
        let topics: Vec<serde_json::Value> = (0..10)
            .map(|i| {
                serde_json::json!({
                    "Text": format!("Topic {}", i),
                    "FirstURL": format!("https://example.com/{}", i)
                })
            })
            .collect();
        let data = serde_json::json!({
            "AbstractText": "",
            "Answer": "",
            "Definition": "",
            "RelatedTopics": topics
        });

        let output = format_search_results("test", &data);
        assert!(output.contains("Topic 0"));
        assert!(output.contains("Topic 4"));
        assert!(!output.contains("Topic 5"));
    }

    #[test]
    fn test_format_answer_and_definition() {
        let data = serde_json::json!({
            "AbstractText": "",
            "Answer": "42",
            "Definition": "the answer to everything",
            "RelatedTopics": []
        });

        let output = format_search_results("everything", &data);
        assert!(output.contains("Answer: 42"));
        assert!(output.contains("Definition: the answer to everything"));
    }
}
