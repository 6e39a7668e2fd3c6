//! WebSocket message types
//!
//! JSON wire format between the dashboard client and the gateway. Both
//! directions use externally tagged unions with kebab-case type names.

use serde::{Deserialize, Serialize};
use sp_core::IntentKind;

/// Message from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Free-text chat message for the agent
    UserMessage {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },

    /// Direct navigation request from the browser panel
    BrowserNavigate { url: String },

    /// Direct browser control (toolbar buttons, viewport clicks)
    BrowserAction {
        action: BrowserActionKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        x: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        y: Option<f64>,
    },

    /// Stop signal; resets UI-facing state only
    StopTask {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
}

/// Browser toolbar/viewport actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserActionKind {
    Back,
    Forward,
    Refresh,
    Screenshot,
    Click,
}

/// Message from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Browser session created, connection is ready
    #[serde(rename_all = "camelCase")]
    SessionReady {
        session_id: String,
        timestamp: String,
    },

    /// Agent is composing a reply
    AgentTyping { typing: bool },

    /// Short status line for the chat header
    AgentStatus { text: String },

    /// Progress note for an in-flight browser action
    AgentAction { text: String },

    /// Conversational reply
    AgentMessage {
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        intent: Option<IntentKind>,
        timestamp: String,
    },

    /// Plain-language failure notice
    AgentError { text: String },

    /// Browser panel loading indicator
    BrowserLoading { loading: bool },

    /// Fresh screenshot of the session's page
    BrowserScreenshot {
        screenshot: String,
        url: String,
        timestamp: String,
    },

    /// Full SEO analysis result
    SeoAnalysisComplete {
        analysis: serde_json::Value,
        recommendations: Vec<String>,
        report: String,
        timestamp: String,
    },
}

/// RFC 3339 timestamp for outbound events
pub fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_wire_names() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"user-message","content":"hi","timestamp":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(matches!(msg, ClientMessage::UserMessage { .. }));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"browser-navigate","url":"example.com"}"#).unwrap();
        match msg {
            ClientMessage::BrowserNavigate { url } => assert_eq!(url, "example.com"),
            other => panic!("wrong variant: {:?}", other),
        }

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"browser-action","action":"click","x":42.5,"y":10}"#)
                .unwrap();
        match msg {
            ClientMessage::BrowserAction { action, x, y } => {
                assert_eq!(action, BrowserActionKind::Click);
                assert_eq!(x, Some(42.5));
                assert_eq!(y, Some(10.0));
            }
            other => panic!("wrong variant: {:?}", other),
        }

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"stop-task"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::StopTask { .. }));
    }

    #[test]
    fn test_action_kinds_are_lowercase() {
        for (kind, name) in [
            (BrowserActionKind::Back, "\"back\""),
            (BrowserActionKind::Forward, "\"forward\""),
            (BrowserActionKind::Refresh, "\"refresh\""),
            (BrowserActionKind::Screenshot, "\"screenshot\""),
            (BrowserActionKind::Click, "\"click\""),
        ] {
            assert_eq!(serde_json::to_string(&kind).unwrap(), name);
        }
    }

    #[test]
    fn test_session_ready_uses_camel_case_field() {
        let msg = ServerMessage::SessionReady {
            session_id: "abc".to_string(),
            timestamp: now(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"session-ready""#));
        assert!(json.contains(r#""sessionId":"abc""#));
    }

    #[test]
    fn test_agent_message_omits_empty_intent() {
        let msg = ServerMessage::AgentMessage {
            content: "hello".to_string(),
            intent: None,
            timestamp: now(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("intent"));

        let msg = ServerMessage::AgentMessage {
            content: "hello".to_string(),
            intent: Some(IntentKind::FormFill),
            timestamp: now(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""intent":"form_fill""#));
    }

    #[test]
    fn test_server_message_round_trip() {
        let msg = ServerMessage::BrowserScreenshot {
            screenshot: "data:image/jpeg;base64,AAAA".to_string(),
            url: "https://example.com".to_string(),
            timestamp: now(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"browser-screenshot""#));
        let parsed: ServerMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, ServerMessage::BrowserScreenshot { .. }));
    }
}
