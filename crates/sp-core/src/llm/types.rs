//! LLM API data types
//!
//! Request/response structures for the Claude Messages API, with
//! conversion to and from the OpenAI chat-completions format.

use serde::{Deserialize, Serialize};

/// A single conversation message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Request to the Claude Messages API
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Response content block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
}

/// Token usage information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// Response from the Claude Messages API
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl MessagesResponse {
    /// Concatenated text of all content blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Request in OpenAI chat-completions format
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatCompletionRequest {
    /// Convert a Claude-style request; the system prompt becomes the
    /// leading system-role message.
    pub fn from_messages_request(request: &MessagesRequest) -> Self {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.extend(request.messages.iter().cloned());

        Self {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

/// Response in OpenAI chat-completions format
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<OpenAiUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

impl ChatCompletionResponse {
    /// Convert into the Claude response shape
    pub fn into_messages_response(self) -> MessagesResponse {
        let (content, stop_reason) = match self.choices.into_iter().next() {
            Some(choice) => (
                vec![ContentBlock::Text {
                    text: choice.message.content,
                }],
                choice.finish_reason,
            ),
            None => (Vec::new(), None),
        };

        MessagesResponse {
            content,
            stop_reason,
            usage: self.usage.map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let msg = ChatMessage::user("Hello");
        assert_eq!(msg.role, "user");
        assert_eq!(msg.content, "Hello");

        let msg = ChatMessage::assistant("Hi");
        assert_eq!(msg.role, "assistant");
    }

    #[test]
    fn test_response_text_joins_blocks() {
        let response = MessagesResponse {
            content: vec![
                ContentBlock::Text {
                    text: "one".to_string(),
                },
                ContentBlock::Text {
                    text: "two".to_string(),
                },
            ],
            stop_reason: None,
            usage: None,
        };
        assert_eq!(response.text(), "one\ntwo");
    }

    #[test]
    fn test_openai_request_prepends_system() {
        let request = MessagesRequest {
            model: "m".to_string(),
            max_tokens: 100,
            system: Some("be brief".to_string()),
            messages: vec![ChatMessage::user("hi")],
            temperature: Some(0.7),
        };
        let converted = ChatCompletionRequest::from_messages_request(&request);
        assert_eq!(converted.messages.len(), 2);
        assert_eq!(converted.messages[0].role, "system");
        assert_eq!(converted.messages[1].role, "user");
    }

    #[test]
    fn test_openai_response_conversion() {
        let json = r#"{
            "choices": [{"message": {"role": "assistant", "content": "Hi!"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 3}
        }"#;
        let response: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        let converted = response.into_messages_response();
        assert_eq!(converted.text(), "Hi!");
        assert_eq!(converted.usage.unwrap().output_tokens, 3);
    }

    #[test]
    fn test_claude_response_parsing() {
        let json = r#"{
            "content": [{"type": "text", "text": "Hello"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 5, "output_tokens": 2}
        }"#;
        let response: MessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text(), "Hello");
        assert_eq!(response.stop_reason.as_deref(), Some("end_turn"));
    }
}
