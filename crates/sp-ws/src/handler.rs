//! WebSocket connection handling and orchestration
//!
//! Owns the per-connection control flow: the connect sequence, message
//! dispatch, and the typing/loading event brackets around each piece of
//! work. Action failures degrade to `agent-error` events; they never
//! terminate the connection.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use sp_browser::{BrowserError, FillReport, analyzer, encode_jpeg_data_uri, fill_fields};
use sp_core::IntentKind;

use crate::message::{BrowserActionKind, ClientMessage, ServerMessage, now};
use crate::server::WsState;
use crate::session::WsSession;

/// Handle WebSocket upgrade request
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<WsState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<WsState>) {
    let session_id = uuid::Uuid::new_v4().to_string();
    info!(session = %session_id, "client connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // writer task: serialize events in send order
    let writer_id = session_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    error!(session = %writer_id, "failed to serialize event: {}", e);
                    continue;
                }
            };
            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
        debug!(session = %writer_id, "send task ended");
    });

    let session = Arc::new(WsSession::new(
        session_id.clone(),
        tx.clone(),
        Arc::clone(&state.registry),
        Arc::clone(&state.assistant),
        state.config.llm.context_window,
        state.config.browser.screenshot_quality,
    ));

    // Connecting: engine launch failure is session-fatal, the client
    // must reconnect
    if connect_session(&session).await {
        // reader loop: client messages are processed strictly in
        // arrival order, which serializes actions within the session
        while let Some(message) = ws_rx.next().await {
            match message {
                Ok(WsMessage::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(parsed) => handle_client_message(&session, parsed).await,
                    Err(e) => {
                        debug!(session = %session_id, "unparseable client message: {}", e);
                        session.send(ServerMessage::AgentError {
                            text: "I couldn't understand that request.".to_string(),
                        });
                    }
                },
                Ok(WsMessage::Close(_)) => {
                    info!(session = %session_id, "client closed connection");
                    break;
                }
                Err(e) => {
                    warn!(session = %session_id, "websocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    }

    // Closed: release the browser session
    state.registry.destroy(&session_id).await;

    // drop every sender so the writer drains queued events and exits
    drop(session);
    drop(tx);
    let _ = send_task.await;
    info!(session = %session_id, "client disconnected");
}

/// Create the browser session and announce readiness.
///
/// Returns false when the engine could not be launched; the caller
/// closes the connection.
pub async fn connect_session(session: &Arc<WsSession>) -> bool {
    match session.registry.create(&session.session_id).await {
        Ok(_) => {
            session.send(ServerMessage::SessionReady {
                session_id: session.session_id.clone(),
                timestamp: now(),
            });
            session.send(ServerMessage::AgentStatus {
                text: "Connected and ready to help!".to_string(),
            });
            true
        }
        Err(e) => {
            error!(session = %session.session_id, "failed to create browser session: {}", e);
            session.send(ServerMessage::AgentError {
                text: friendly_error(&e),
            });
            false
        }
    }
}

/// Dispatch one client message.
pub async fn handle_client_message(session: &Arc<WsSession>, message: ClientMessage) {
    match message {
        ClientMessage::UserMessage { content, .. } => handle_user_message(session, &content).await,
        ClientMessage::BrowserNavigate { url } => run_navigation(session, &url).await,
        ClientMessage::BrowserAction { action, x, y } => {
            handle_browser_action(session, action, x, y).await
        }
        ClientMessage::StopTask { .. } => handle_stop(session),
    }
}

/// Process one chat message: typing bracket, concurrent classification
/// and reply generation, then intent side effects.
pub async fn handle_user_message(session: &Arc<WsSession>, content: &str) {
    debug!(session = %session.session_id, "user message received");

    session.send(ServerMessage::AgentTyping { typing: true });

    let current_url = session
        .registry
        .get(&session.session_id)
        .ok()
        .map(|browser| browser.current_url());
    let context = session.context();

    // the two collaborator calls are independent
    let (intent, reply) = tokio::join!(
        session.assistant.classify_intent(content),
        session
            .assistant
            .generate_reply(content, &context, current_url.as_deref()),
    );

    debug!(
        session = %session.session_id,
        intent = %intent.kind,
        confidence = intent.confidence,
        "intent classified"
    );

    session.remember(content, &reply);
    session.send(ServerMessage::AgentMessage {
        content: reply,
        intent: Some(intent.kind),
        timestamp: now(),
    });

    // side effects run after the conversational reply; their failures
    // degrade to agent-error without discarding it
    match intent.kind {
        IntentKind::Navigate => {
            if let Some(url) = intent.url() {
                run_navigation(session, &url).await;
            }
        }
        IntentKind::Analyze => run_analysis(session).await,
        IntentKind::FormFill => {
            let fields = intent.form_fields();
            if !fields.is_empty() {
                run_form_fill(session, &fields).await;
            }
        }
        IntentKind::Research | IntentKind::General => {}
    }

    session.send(ServerMessage::AgentTyping { typing: false });
}

/// Navigate and publish the resulting screenshot, inside a loading
/// bracket.
pub async fn run_navigation(session: &Arc<WsSession>, url: &str) {
    session.send(ServerMessage::BrowserLoading { loading: true });
    session.send(ServerMessage::AgentAction {
        text: format!("Navigating to {}", url),
    });

    if let Err(e) = navigate_and_capture(session, url).await {
        warn!(session = %session.session_id, "navigation failed: {}", e);
        session.send(ServerMessage::AgentError {
            text: friendly_error(&e),
        });
    }

    session.send(ServerMessage::BrowserLoading { loading: false });
}

async fn navigate_and_capture(session: &Arc<WsSession>, url: &str) -> sp_browser::Result<()> {
    let browser = session.registry.get(&session.session_id)?;
    let final_url = browser.navigate(url).await?;

    let raw = browser.screenshot().await?;
    let screenshot = encode_jpeg_data_uri(&raw, session.screenshot_quality)?;
    session.send(ServerMessage::BrowserScreenshot {
        screenshot,
        url: final_url,
        timestamp: now(),
    });
    Ok(())
}

/// Run the SEO analysis and publish the result and report.
pub async fn run_analysis(session: &Arc<WsSession>) {
    session.send(ServerMessage::AgentStatus {
        text: "Analyzing the page for SEO...".to_string(),
    });
    session.send(ServerMessage::BrowserLoading { loading: true });

    if let Err(e) = perform_analysis(session).await {
        warn!(session = %session.session_id, "analysis failed: {}", e);
        session.send(ServerMessage::AgentError {
            text: friendly_error(&e),
        });
    }

    session.send(ServerMessage::BrowserLoading { loading: false });
}

async fn perform_analysis(session: &Arc<WsSession>) -> sp_browser::Result<()> {
    let browser = session.registry.get(&session.session_id)?;
    let analysis = analyzer::analyze(&browser).await?;

    let analysis_json = serde_json::to_value(&analysis).unwrap_or(Value::Null);
    let report = session
        .assistant
        .analysis_report(&analysis_json, &analysis.issues, &analysis.recommendations)
        .await;

    session.send(ServerMessage::SeoAnalysisComplete {
        analysis: analysis_json,
        recommendations: analysis.recommendations.clone(),
        report: report.clone(),
        timestamp: now(),
    });
    session.send(ServerMessage::AgentMessage {
        content: format!("SEO analysis complete.\n\n{}", report),
        intent: None,
        timestamp: now(),
    });
    Ok(())
}

/// Fill form fields and publish the outcome; partial success is a
/// normal result, not an error.
pub async fn run_form_fill(session: &Arc<WsSession>, fields: &BTreeMap<String, String>) {
    session.send(ServerMessage::AgentStatus {
        text: "Filling out the form...".to_string(),
    });
    session.send(ServerMessage::BrowserLoading { loading: true });

    match perform_form_fill(session, fields).await {
        Ok(report) => {
            session.send(ServerMessage::AgentMessage {
                content: report.summary(),
                intent: None,
                timestamp: now(),
            });
        }
        Err(e) => {
            warn!(session = %session.session_id, "form fill failed: {}", e);
            session.send(ServerMessage::AgentError {
                text: friendly_error(&e),
            });
        }
    }

    session.send(ServerMessage::BrowserLoading { loading: false });
}

async fn perform_form_fill(
    session: &Arc<WsSession>,
    fields: &BTreeMap<String, String>,
) -> sp_browser::Result<FillReport> {
    let browser = session.registry.get(&session.session_id)?;
    let report = fill_fields(&browser, fields).await;

    // show the filled form
    let raw = browser.screenshot().await?;
    let screenshot = encode_jpeg_data_uri(&raw, session.screenshot_quality)?;
    session.send(ServerMessage::BrowserScreenshot {
        screenshot,
        url: browser.current_url(),
        timestamp: now(),
    });

    Ok(report)
}

/// Direct browser control from the client's toolbar or viewport.
pub async fn handle_browser_action(
    session: &Arc<WsSession>,
    action: BrowserActionKind,
    x: Option<f64>,
    y: Option<f64>,
) {
    let outcome = match action {
        BrowserActionKind::Back | BrowserActionKind::Forward | BrowserActionKind::Refresh => {
            history_action(session, action).await
        }
        BrowserActionKind::Screenshot => {
            session.send(ServerMessage::BrowserLoading { loading: true });
            let result = capture_and_send(session).await;
            session.send(ServerMessage::BrowserLoading { loading: false });
            result
        }
        BrowserActionKind::Click => click_action(session, x, y).await,
    };

    if let Err(e) = outcome {
        warn!(session = %session.session_id, "browser action failed: {}", e);
        session.send(ServerMessage::AgentError {
            text: friendly_error(&e),
        });
    }
}

async fn history_action(
    session: &Arc<WsSession>,
    action: BrowserActionKind,
) -> sp_browser::Result<()> {
    let browser = session.registry.get(&session.session_id)?;

    let note = match action {
        BrowserActionKind::Back => {
            browser.back().await?;
            "Going back"
        }
        BrowserActionKind::Forward => {
            browser.forward().await?;
            "Going forward"
        }
        _ => {
            browser.refresh().await?;
            "Refreshing page"
        }
    };

    session.send(ServerMessage::AgentAction {
        text: note.to_string(),
    });
    Ok(())
}

async fn click_action(
    session: &Arc<WsSession>,
    x: Option<f64>,
    y: Option<f64>,
) -> sp_browser::Result<()> {
    let (Some(x), Some(y)) = (x, y) else {
        session.send(ServerMessage::AgentError {
            text: "A click needs coordinates.".to_string(),
        });
        return Ok(());
    };

    let browser = session.registry.get(&session.session_id)?;

    session.send(ServerMessage::AgentAction {
        text: format!("Clicking at ({}, {})", x.round() as i64, y.round() as i64),
    });
    browser.click_at(x, y).await?;

    // show the result of the click
    session.send(ServerMessage::BrowserLoading { loading: true });
    let result = capture_and_send(session).await;
    session.send(ServerMessage::BrowserLoading { loading: false });
    result
}

async fn capture_and_send(session: &Arc<WsSession>) -> sp_browser::Result<()> {
    let browser = session.registry.get(&session.session_id)?;
    let raw = browser.screenshot().await?;
    let screenshot = encode_jpeg_data_uri(&raw, session.screenshot_quality)?;
    session.send(ServerMessage::BrowserScreenshot {
        screenshot,
        url: browser.current_url(),
        timestamp: now(),
    });
    Ok(())
}

/// Stop only resets UI-facing state; an in-flight engine call runs to
/// completion or its own timeout.
pub fn handle_stop(session: &Arc<WsSession>) {
    info!(session = %session.session_id, "stop requested");
    session.send(ServerMessage::AgentTyping { typing: false });
    session.send(ServerMessage::AgentStatus {
        text: "Stopped. Ready for your next message.".to_string(),
    });
}

/// Translate an internal failure into a plain-language client message.
///
/// Raw causes stay in the logs; they are never forwarded verbatim.
fn friendly_error(error: &BrowserError) -> String {
    match error {
        BrowserError::EngineLaunch(_) => {
            "I couldn't start a browser for this session. Please try reconnecting.".to_string()
        }
        BrowserError::NavigationTimeout { url, .. } => {
            format!("The page at {} took too long to load. Please try again.", url)
        }
        BrowserError::Navigation { url, .. } => {
            format!(
                "I couldn't open {}. Please check the address and try again.",
                url
            )
        }
        BrowserError::ViewportUnavailable { .. } => {
            "The browser window isn't ready for clicks yet.".to_string()
        }
        BrowserError::SessionNotFound(_) | BrowserError::SessionClosed(_) => {
            "The browser session is no longer active. Please reconnect.".to_string()
        }
        BrowserError::Encode(_)
        | BrowserError::Interaction { .. }
        | BrowserError::Engine(_) => {
            "The browser ran into a problem completing that action. Please try again.".to_string()
        }
    }
}
