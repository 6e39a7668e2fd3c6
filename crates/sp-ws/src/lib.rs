//! sp-ws: WebSocket gateway for sp-gateway
//!
//! Per-connection duplex event channel between a dashboard client and
//! its browser session, plus the orchestrator that turns classified
//! user intents into browser actions and ordered progress events.

pub mod error;
pub mod handler;
pub mod message;
pub mod server;
pub mod session;

pub use error::{Result, WsError};
pub use handler::websocket_handler;
pub use message::{BrowserActionKind, ClientMessage, ServerMessage};
pub use server::{WsState, start_ws_server};
pub use session::WsSession;
