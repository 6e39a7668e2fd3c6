//! sp-browser: Browser automation for sp-gateway
//!
//! One headless-browser instance per connected client, managed through a
//! session registry with idle reclamation.
//!
//! ## Features
//!
//! - Abstract engine seam ([`engine::EngineLauncher`] /
//!   [`engine::EngineSession`]) with a headless Chrome implementation
//! - Per-session action API: navigate, screenshot, click-at-percentage,
//!   history navigation and form filling
//! - Session registry with concurrent create/get/destroy and a periodic
//!   idle sweep
//! - Screenshot pipeline producing transport-ready JPEG data URIs
//! - Best-effort form-field matching with a filled/unfilled report
//! - Structural SEO page analysis with deterministic findings

pub mod analyzer;
pub mod chrome;
pub mod engine;
pub mod error;
pub mod fill;
pub mod registry;
pub mod screenshot;
pub mod session;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use analyzer::{Analysis, analyze};
pub use chrome::ChromeLauncher;
pub use engine::{DomSnapshot, EngineLauncher, EngineSession, Heading, ImageRef, InputState, LinkRef};
pub use error::{BrowserError, Result};
pub use fill::{FillReport, fill_fields};
pub use registry::SessionRegistry;
pub use screenshot::encode_jpeg_data_uri;
pub use session::{BrowserConfig, BrowserConfigBuilder, BrowserSession};
