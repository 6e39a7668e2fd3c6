//! WebSocket session state
//!
//! One `WsSession` per connection: the outbound event channel, the
//! conversation context and handles to the shared registry and
//! assistant.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;

use sp_browser::SessionRegistry;
use sp_core::{Assistant, ChatMessage};

use crate::message::ServerMessage;

/// Gateway entry for one connected client
pub struct WsSession {
    /// Session id; also keys the browser session in the registry
    pub session_id: String,
    /// Outbound events toward this client
    tx: mpsc::UnboundedSender<ServerMessage>,
    /// Shared browser-session registry
    pub registry: Arc<SessionRegistry>,
    /// Shared assistant
    pub assistant: Arc<Assistant>,
    /// Conversation context, oldest first
    context: Mutex<Vec<ChatMessage>>,
    /// Maximum context messages kept
    context_window: usize,
    /// JPEG quality for outbound screenshots
    pub screenshot_quality: u8,
}

impl WsSession {
    pub fn new(
        session_id: String,
        tx: mpsc::UnboundedSender<ServerMessage>,
        registry: Arc<SessionRegistry>,
        assistant: Arc<Assistant>,
        context_window: usize,
        screenshot_quality: u8,
    ) -> Self {
        Self {
            session_id,
            tx,
            registry,
            assistant,
            context: Mutex::new(Vec::new()),
            context_window,
            screenshot_quality,
        }
    }

    /// Emit an event to this client.
    ///
    /// Events arrive in send order; a failure only means the client is
    /// already gone.
    pub fn send(&self, message: ServerMessage) {
        if self.tx.send(message).is_err() {
            debug!(session = %self.session_id, "client channel closed, dropping event");
        }
    }

    /// Record a user/assistant exchange, trimming to the context window.
    pub fn remember(&self, user: &str, reply: &str) {
        let mut context = self.context.lock().expect("context lock poisoned");
        context.push(ChatMessage::user(user));
        context.push(ChatMessage::assistant(reply));

        let len = context.len();
        if self.context_window > 0 && len > self.context_window {
            context.drain(0..len - self.context_window);
        }
    }

    /// Snapshot of the conversation context
    pub fn context(&self) -> Vec<ChatMessage> {
        self.context.lock().expect("context lock poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sp_browser::{BrowserConfig, testing::MockLauncher};

    fn session_with_window(window: usize) -> (WsSession, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = Arc::new(SessionRegistry::new(
            Arc::new(MockLauncher::new()),
            BrowserConfig::default(),
        ));
        let session = WsSession::new(
            "test-session".to_string(),
            tx,
            registry,
            Arc::new(Assistant::offline()),
            window,
            80,
        );
        (session, rx)
    }

    #[tokio::test]
    async fn test_send_delivers_in_order() {
        let (session, mut rx) = session_with_window(8);

        session.send(ServerMessage::AgentTyping { typing: true });
        session.send(ServerMessage::AgentTyping { typing: false });

        assert!(matches!(
            rx.recv().await.unwrap(),
            ServerMessage::AgentTyping { typing: true }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            ServerMessage::AgentTyping { typing: false }
        ));
    }

    #[test]
    fn test_send_survives_closed_channel() {
        let (session, rx) = session_with_window(8);
        drop(rx);
        session.send(ServerMessage::AgentTyping { typing: true });
    }

    #[test]
    fn test_context_window_trims_oldest() {
        let (session, _rx) = session_with_window(4);

        session.remember("one", "reply one");
        session.remember("two", "reply two");
        session.remember("three", "reply three");

        let context = session.context();
        assert_eq!(context.len(), 4);
        assert_eq!(context[0].content, "two");
        assert_eq!(context[3].content, "reply three");
    }
}
