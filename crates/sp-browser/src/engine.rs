//! Abstract headless-browser engine seam
//!
//! The registry and session layers are written against these traits;
//! production uses the Chrome implementation in [`crate::chrome`], tests
//! use the scripted mock in `testing`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::BrowserConfig;

/// Visibility and fill state of one input element matched by a selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputState {
    pub visible: bool,
    pub empty: bool,
}

impl InputState {
    /// A field-fill candidate must be both visible and still empty.
    pub fn fillable(&self) -> bool {
        self.visible && self.empty
    }
}

/// A heading element with its level (1-6) and text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

/// An image element with its source and alt text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub src: String,
    #[serde(default)]
    pub alt: String,
}

/// A link element with its target and text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRef {
    pub href: String,
    #[serde(default)]
    pub text: String,
}

/// Structural snapshot of the current document, extracted in the page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomSnapshot {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub headings: Vec<Heading>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default)]
    pub links: Vec<LinkRef>,
}

/// One live engine instance bound to a single page
///
/// Implementations own the external browser process; `close` releases it
/// and every other method may assume the page is still attached.
#[async_trait]
pub trait EngineSession: Send + Sync {
    /// Navigate to `url` and wait until the document is minimally loaded
    /// (DOM-ready, not full resource completion).
    async fn goto(&self, url: &str) -> Result<()>;

    /// URL the page is currently showing
    async fn current_url(&self) -> Result<String>;

    /// Capture the visible viewport as PNG bytes
    async fn capture_png(&self) -> Result<Vec<u8>>;

    /// Dispatch a click at pixel coordinates
    async fn click_xy(&self, x: f64, y: f64) -> Result<()>;

    async fn history_back(&self) -> Result<()>;

    async fn history_forward(&self) -> Result<()>;

    async fn reload(&self) -> Result<()>;

    /// Configured viewport size in pixels, if known
    fn viewport(&self) -> Option<(u32, u32)>;

    /// Visibility/fill state of every element matching `selector`, in
    /// document order
    async fn input_states(&self, selector: &str) -> Result<Vec<InputState>>;

    /// Fill the `index`-th element matching `selector`
    async fn fill_input(&self, selector: &str, index: usize, value: &str) -> Result<()>;

    /// Extract the structural snapshot used by the page analyzer
    async fn extract_document(&self) -> Result<DomSnapshot>;

    /// Release the page and the engine process; called at most once.
    async fn close(&mut self) -> Result<()>;
}

/// Factory for engine instances, injected into the session registry
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(&self, config: &BrowserConfig) -> Result<Box<dyn EngineSession>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_state_fillable() {
        assert!(
            InputState {
                visible: true,
                empty: true
            }
            .fillable()
        );
        assert!(
            !InputState {
                visible: false,
                empty: true
            }
            .fillable()
        );
        assert!(
            !InputState {
                visible: true,
                empty: false
            }
            .fillable()
        );
    }

    #[test]
    fn test_snapshot_deserializes_from_page_json() {
        let json = r#"{
            "title": "Home",
            "metaDescription": "Welcome",
            "headings": [{"level": 1, "text": "Hello"}],
            "images": [{"src": "/a.png", "alt": ""}],
            "links": [{"href": "https://other.example", "text": "out"}]
        }"#;
        let snapshot: DomSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.title, "Home");
        assert_eq!(snapshot.meta_description, "Welcome");
        assert_eq!(snapshot.headings[0].level, 1);
    }

    #[test]
    fn test_snapshot_tolerates_missing_fields() {
        let snapshot: DomSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.title.is_empty());
        assert!(snapshot.links.is_empty());
    }
}
