//! Assistant facade
//!
//! Wraps the LLM client behind the three operations the orchestrator
//! needs: intent classification, conversational reply generation and
//! analysis-report rendering. Every operation has a deterministic
//! offline fallback, used when no API key is configured or whenever a
//! request fails, so callers never block on an unreachable collaborator.

pub mod fallback;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::llm::{ChatMessage, LlmClient};

/// Action category derived from a user message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Navigate,
    Analyze,
    FormFill,
    Research,
    General,
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IntentKind::Navigate => "navigate",
            IntentKind::Analyze => "analyze",
            IntentKind::FormFill => "form_fill",
            IntentKind::Research => "research",
            IntentKind::General => "general",
        };
        f.write_str(s)
    }
}

/// Classified user intent with any data extracted from the message
#[derive(Debug, Clone)]
pub struct Intent {
    pub kind: IntentKind,
    pub confidence: f32,
    pub extracted: Value,
}

impl Intent {
    pub fn general() -> Self {
        Self {
            kind: IntentKind::General,
            confidence: 0.3,
            extracted: Value::Null,
        }
    }

    /// Target URL carried by a navigate intent
    pub fn url(&self) -> Option<String> {
        self.extracted
            .get("url")
            .or_else(|| self.extracted.get("URL"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Field name/value pairs carried by a form-fill intent.
    ///
    /// Accepts either `{"fields": {...}}` or a flat object; non-string
    /// values and the url key are ignored.
    pub fn form_fields(&self) -> BTreeMap<String, String> {
        let source = self
            .extracted
            .get("fields")
            .filter(|v| v.is_object())
            .unwrap_or(&self.extracted);

        let mut fields = BTreeMap::new();
        if let Some(map) = source.as_object() {
            for (key, value) in map {
                if key.eq_ignore_ascii_case("url") {
                    continue;
                }
                if let Some(s) = value.as_str() {
                    fields.insert(key.clone(), s.to_string());
                }
            }
        }
        fields
    }
}

/// Shape of the classification JSON returned by the model
#[derive(Debug, Deserialize)]
struct RawIntent {
    intent: IntentKind,
    #[serde(default)]
    confidence: f32,
    #[serde(default, alias = "extractedData")]
    extracted_data: Value,
}

const SYSTEM_PROMPT: &str = "\
You are an SEO browser agent that helps business owners with SEO, web \
automation and digital marketing tasks. Communicate in plain English and \
avoid technical jargon. Be patient and thorough, explain the business \
value of each action, and describe what you are going to do before doing \
it. You can analyze pages for SEO, navigate to websites, fill out forms \
and research competitors.";

const CLASSIFY_PROMPT: &str = "\
Analyze the user's message and determine their intent. Respond with JSON \
only, no prose: {\"intent\": \"navigate\"|\"analyze\"|\"form_fill\"|\
\"research\"|\"general\", \"confidence\": 0-1, \"extractedData\": {...}}. \
Put a bare target URL under extractedData.url and form field name/value \
pairs under extractedData.fields. Examples: \"Go to google.com\" -> \
navigate; \"Check my website's SEO\" -> analyze; \"Fill out this form\" -> \
form_fill; \"Research my competitors\" -> research; \"How do I improve my \
rankings?\" -> general.";

const REPORT_PROMPT: &str = "\
Create a short, business-friendly SEO report from the analysis JSON the \
user provides. Use simple language, explain the business impact of each \
finding and end with clear next steps.";

/// LLM-backed assistant with deterministic offline fallbacks
pub struct Assistant {
    client: Option<LlmClient>,
}

impl Assistant {
    /// Create an assistant; without an API key it runs offline.
    pub fn new(config: &LlmConfig) -> Self {
        if config.api_key.is_empty() {
            warn!("no LLM API key configured; assistant runs with offline fallbacks");
            return Self { client: None };
        }

        match LlmClient::new(config) {
            Ok(client) => Self {
                client: Some(client),
            },
            Err(e) => {
                warn!("failed to create LLM client, falling back to offline mode: {}", e);
                Self { client: None }
            }
        }
    }

    /// Assistant that only ever uses the offline fallbacks
    pub fn offline() -> Self {
        Self { client: None }
    }

    pub fn is_offline(&self) -> bool {
        self.client.is_none()
    }

    /// Map a free-text message to an action category.
    ///
    /// Never fails: classification errors degrade to the keyword matcher.
    pub async fn classify_intent(&self, text: &str) -> Intent {
        let Some(client) = &self.client else {
            return fallback::classify(text);
        };

        let mut request = client.request();
        request.system = Some(CLASSIFY_PROMPT.to_string());
        request.messages = vec![ChatMessage::user(text)];
        request.max_tokens = 200;
        request.temperature = Some(0.1);

        match client.messages(request).await {
            Ok(response) => match parse_intent(&response.text()) {
                Some(intent) => intent,
                None => {
                    debug!("unparseable intent response, using keyword fallback");
                    fallback::classify(text)
                }
            },
            Err(e) => {
                warn!("intent classification failed, using keyword fallback: {}", e);
                fallback::classify(text)
            }
        }
    }

    /// Generate a conversational reply to a user message.
    pub async fn generate_reply(
        &self,
        text: &str,
        context: &[ChatMessage],
        current_url: Option<&str>,
    ) -> String {
        let Some(client) = &self.client else {
            return fallback::reply(text, current_url);
        };

        let mut system = SYSTEM_PROMPT.to_string();
        if let Some(url) = current_url {
            system.push_str(&format!("\n\nThe browser is currently showing: {}", url));
        }

        let mut messages: Vec<ChatMessage> = context.to_vec();
        messages.push(ChatMessage::user(text));

        let mut request = client.request();
        request.system = Some(system);
        request.messages = messages;
        request.max_tokens = 500;
        request.temperature = Some(0.7);

        match client.messages(request).await {
            Ok(response) => {
                let reply = response.text();
                if reply.trim().is_empty() {
                    fallback::reply(text, current_url)
                } else {
                    reply
                }
            }
            Err(e) => {
                warn!("reply generation failed, using canned fallback: {}", e);
                fallback::reply(text, current_url)
            }
        }
    }

    /// Render a page analysis as a plain-language report.
    pub async fn analysis_report(
        &self,
        analysis: &Value,
        issues: &[String],
        recommendations: &[String],
    ) -> String {
        let Some(client) = &self.client else {
            return fallback::report(issues, recommendations);
        };

        let mut request = client.request();
        request.system = Some(REPORT_PROMPT.to_string());
        request.messages = vec![ChatMessage::user(analysis.to_string())];
        request.max_tokens = 1000;
        request.temperature = Some(0.5);

        match client.messages(request).await {
            Ok(response) => {
                let report = response.text();
                if report.trim().is_empty() {
                    fallback::report(issues, recommendations)
                } else {
                    report
                }
            }
            Err(e) => {
                warn!("report generation failed, using deterministic fallback: {}", e);
                fallback::report(issues, recommendations)
            }
        }
    }
}

/// Parse the classification JSON, tolerating code fences around it.
fn parse_intent(text: &str) -> Option<Intent> {
    let trimmed = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let raw: RawIntent = serde_json::from_str(trimmed).ok()?;
    Some(Intent {
        kind: raw.intent,
        confidence: raw.confidence.clamp(0.0, 1.0),
        extracted: raw.extracted_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_intent_plain() {
        let intent = parse_intent(
            r#"{"intent": "navigate", "confidence": 0.95, "extractedData": {"url": "example.com"}}"#,
        )
        .unwrap();
        assert_eq!(intent.kind, IntentKind::Navigate);
        assert_eq!(intent.url().as_deref(), Some("example.com"));
    }

    #[test]
    fn test_parse_intent_fenced() {
        let text = "```json\n{\"intent\": \"analyze\", \"confidence\": 0.8}\n```";
        let intent = parse_intent(text).unwrap();
        assert_eq!(intent.kind, IntentKind::Analyze);
    }

    #[test]
    fn test_parse_intent_garbage() {
        assert!(parse_intent("I think they want to navigate").is_none());
    }

    #[test]
    fn test_form_fields_nested_and_flat() {
        let nested = Intent {
            kind: IntentKind::FormFill,
            confidence: 0.9,
            extracted: json!({"fields": {"Name": "Jane", "Email": "j@x.com"}}),
        };
        let fields = nested.form_fields();
        assert_eq!(fields.get("Name").map(String::as_str), Some("Jane"));

        let flat = Intent {
            kind: IntentKind::FormFill,
            confidence: 0.9,
            extracted: json!({"Name": "Jane", "url": "ignored.com", "count": 3}),
        };
        let fields = flat.form_fields();
        assert_eq!(fields.len(), 1);
        assert!(fields.contains_key("Name"));
    }

    #[tokio::test]
    async fn test_offline_assistant_classifies() {
        let assistant = Assistant::offline();
        let intent = assistant.classify_intent("go to example.com").await;
        assert_eq!(intent.kind, IntentKind::Navigate);
    }
}
