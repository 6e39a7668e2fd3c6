//! Browser session management
//!
//! One exclusively owned engine instance per session id, with
//! last-activity tracking and an idempotent close.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::engine::{DomSnapshot, EngineLauncher, EngineSession, InputState};
use crate::error::{BrowserError, Result};

/// URL of a freshly created session
pub const BLANK_URL: &str = "about:blank";

/// Browser session configuration
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Whether to run in headless mode
    pub headless: bool,
    /// Viewport width in pixels
    pub width: u32,
    /// Viewport height in pixels
    pub height: u32,
    /// Navigation timeout
    pub navigation_timeout: Duration,
    /// Sessions idle longer than this are reclaimed by the sweep
    pub idle_timeout: Duration,
    /// Interval between idle sweeps
    pub sweep_interval: Duration,
    /// JPEG quality for transported screenshots (1-100)
    pub screenshot_quality: u8,
    /// Settle delay after form filling
    pub form_settle: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            width: 1280,
            height: 720,
            navigation_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
            screenshot_quality: 80,
            form_settle: Duration::from_secs(1),
        }
    }
}

impl BrowserConfig {
    /// Create a new configuration builder
    pub fn builder() -> BrowserConfigBuilder {
        BrowserConfigBuilder::default()
    }
}

impl From<&sp_core::BrowserSettings> for BrowserConfig {
    fn from(settings: &sp_core::BrowserSettings) -> Self {
        Self {
            headless: settings.headless,
            width: settings.width,
            height: settings.height,
            navigation_timeout: Duration::from_secs(settings.navigation_timeout_secs),
            idle_timeout: Duration::from_secs(settings.idle_timeout_secs),
            sweep_interval: Duration::from_secs(settings.sweep_interval_secs),
            screenshot_quality: settings.screenshot_quality,
            form_settle: Duration::from_millis(settings.form_settle_ms),
        }
    }
}

/// Builder for BrowserConfig
#[derive(Default)]
pub struct BrowserConfigBuilder {
    config: BrowserConfig,
}

impl BrowserConfigBuilder {
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.config.navigation_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    pub fn screenshot_quality(mut self, quality: u8) -> Self {
        self.config.screenshot_quality = quality;
        self
    }

    pub fn form_settle(mut self, settle: Duration) -> Self {
        self.config.form_settle = settle;
        self
    }

    pub fn build(self) -> BrowserConfig {
        self.config
    }
}

/// Managed browser session
///
/// The engine handle lives behind `Mutex<Option<...>>`: actions lock it
/// for their full duration (serializing actions within one session), and
/// `close` takes it out, so an action racing a destroy fails with
/// `SessionClosed` instead of touching a released engine.
pub struct BrowserSession {
    id: String,
    config: BrowserConfig,
    engine: AsyncMutex<Option<Box<dyn EngineSession>>>,
    current_url: Mutex<String>,
    last_activity: Mutex<Instant>,
}

impl std::fmt::Debug for BrowserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserSession")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("current_url", &self.current_url())
            .finish_non_exhaustive()
    }
}

impl BrowserSession {
    /// Launch a fresh engine instance bound to `id`.
    pub async fn launch(
        id: impl Into<String>,
        launcher: &dyn EngineLauncher,
        config: BrowserConfig,
    ) -> Result<Self> {
        let id = id.into();

        info!(session = %id, headless = config.headless, "launching browser session");

        let engine = launcher.launch(&config).await?;

        info!(session = %id, "browser session launched");

        Ok(Self {
            id,
            config,
            engine: AsyncMutex::new(Some(engine)),
            current_url: Mutex::new(BLANK_URL.to_string()),
            last_activity: Mutex::new(Instant::now()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// URL of the page the session is currently showing
    pub fn current_url(&self) -> String {
        self.current_url.lock().expect("url lock poisoned").clone()
    }

    /// Record activity on this session.
    pub fn touch(&self) {
        *self.last_activity.lock().expect("activity lock poisoned") = Instant::now();
    }

    /// How long the session has been idle
    pub fn idle_for(&self) -> Duration {
        self.last_activity
            .lock()
            .expect("activity lock poisoned")
            .elapsed()
    }

    fn set_url(&self, url: &str) {
        *self.current_url.lock().expect("url lock poisoned") = url.to_string();
    }

    /// Prepend https:// when the scheme is absent.
    pub fn normalize_url(url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("https://{}", url)
        }
    }

    /// Navigate to `url`, returning the normalized URL on success.
    ///
    /// Bounded by the configured navigation timeout; on timeout the
    /// engine call is left to finish on its own while the caller gets
    /// `NavigationTimeout`.
    pub async fn navigate(&self, url: &str) -> Result<String> {
        self.touch();
        let url = Self::normalize_url(url);

        let guard = self.engine.lock().await;
        let engine = guard
            .as_ref()
            .ok_or_else(|| BrowserError::SessionClosed(self.id.clone()))?;

        debug!(session = %self.id, url = %url, "navigating");

        match tokio::time::timeout(self.config.navigation_timeout, engine.goto(&url)).await {
            Ok(Ok(())) => {
                self.set_url(&url);
                Ok(url)
            }
            Ok(Err(e)) => Err(BrowserError::Navigation {
                session: self.id.clone(),
                url,
                cause: e.to_string(),
            }),
            Err(_) => Err(BrowserError::NavigationTimeout {
                session: self.id.clone(),
                url,
                timeout_secs: self.config.navigation_timeout.as_secs(),
            }),
        }
    }

    /// Capture the visible viewport as raw PNG bytes.
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        self.touch();

        let guard = self.engine.lock().await;
        let engine = guard
            .as_ref()
            .ok_or_else(|| BrowserError::SessionClosed(self.id.clone()))?;

        engine
            .capture_png()
            .await
            .map_err(|e| BrowserError::Interaction {
                session: self.id.clone(),
                action: "screenshot".to_string(),
                cause: e.to_string(),
            })
    }

    /// Click at viewport-percentage coordinates (0-100 on each axis).
    pub async fn click_at(&self, x_percent: f64, y_percent: f64) -> Result<()> {
        self.touch();

        let guard = self.engine.lock().await;
        let engine = guard
            .as_ref()
            .ok_or_else(|| BrowserError::SessionClosed(self.id.clone()))?;

        let (width, height) = engine
            .viewport()
            .ok_or_else(|| BrowserError::ViewportUnavailable {
                session: self.id.clone(),
            })?;

        let x = (x_percent.clamp(0.0, 100.0) / 100.0) * f64::from(width);
        let y = (y_percent.clamp(0.0, 100.0) / 100.0) * f64::from(height);

        debug!(session = %self.id, x, y, "clicking");

        engine
            .click_xy(x, y)
            .await
            .map_err(|e| BrowserError::Interaction {
                session: self.id.clone(),
                action: "click".to_string(),
                cause: e.to_string(),
            })
    }

    /// Go back one history entry.
    pub async fn back(&self) -> Result<()> {
        self.history_op("back").await
    }

    /// Go forward one history entry.
    pub async fn forward(&self) -> Result<()> {
        self.history_op("forward").await
    }

    /// Reload the current page.
    pub async fn refresh(&self) -> Result<()> {
        self.history_op("refresh").await
    }

    async fn history_op(&self, op: &str) -> Result<()> {
        self.touch();

        let guard = self.engine.lock().await;
        let engine = guard
            .as_ref()
            .ok_or_else(|| BrowserError::SessionClosed(self.id.clone()))?;

        let result = match op {
            "back" => engine.history_back().await,
            "forward" => engine.history_forward().await,
            _ => engine.reload().await,
        };

        result.map_err(|e| BrowserError::Navigation {
            session: self.id.clone(),
            url: self.current_url(),
            cause: e.to_string(),
        })?;

        // history moves change the URL out from under us
        if let Ok(url) = engine.current_url().await {
            self.set_url(&url);
        }

        Ok(())
    }

    /// Fill the first visible, empty element matching `selector`.
    ///
    /// Returns `Ok(true)` when an element was filled, `Ok(false)` when no
    /// element satisfied the visible-and-empty condition.
    pub async fn fill_field(&self, selector: &str, value: &str) -> Result<bool> {
        self.touch();

        let guard = self.engine.lock().await;
        let engine = guard
            .as_ref()
            .ok_or_else(|| BrowserError::SessionClosed(self.id.clone()))?;

        let states = engine
            .input_states(selector)
            .await
            .map_err(|e| BrowserError::Interaction {
                session: self.id.clone(),
                action: format!("probe {}", selector),
                cause: e.to_string(),
            })?;

        let Some(index) = states.iter().position(InputState::fillable) else {
            return Ok(false);
        };

        engine
            .fill_input(selector, index, value)
            .await
            .map_err(|e| BrowserError::Interaction {
                session: self.id.clone(),
                action: format!("fill {}", selector),
                cause: e.to_string(),
            })?;

        Ok(true)
    }

    /// Extract the structural document snapshot for analysis.
    pub async fn extract_document(&self) -> Result<DomSnapshot> {
        self.touch();

        let guard = self.engine.lock().await;
        let engine = guard
            .as_ref()
            .ok_or_else(|| BrowserError::SessionClosed(self.id.clone()))?;

        engine
            .extract_document()
            .await
            .map_err(|e| BrowserError::Interaction {
                session: self.id.clone(),
                action: "extract document".to_string(),
                cause: e.to_string(),
            })
    }

    /// Release the engine handle. Safe to call multiple times; failures
    /// are logged, never propagated.
    pub async fn close(&self) {
        let mut guard = self.engine.lock().await;
        match guard.take() {
            Some(mut engine) => {
                if let Err(e) = engine.close().await {
                    warn!(session = %self.id, "error closing browser engine: {}", e);
                }
                info!(session = %self.id, "browser session closed");
            }
            None => debug!(session = %self.id, "close on already-closed session"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLauncher;

    #[test]
    fn test_config_default() {
        let config = BrowserConfig::default();
        assert!(config.headless);
        assert_eq!(config.width, 1280);
        assert_eq!(config.height, 720);
        assert_eq!(config.navigation_timeout, Duration::from_secs(30));
        assert_eq!(config.idle_timeout, Duration::from_secs(30 * 60));
    }

    #[test]
    fn test_config_builder() {
        let config = BrowserConfig::builder()
            .headless(false)
            .viewport(1920, 1080)
            .navigation_timeout(Duration::from_secs(60))
            .idle_timeout(Duration::from_secs(120))
            .build();

        assert!(!config.headless);
        assert_eq!(config.width, 1920);
        assert_eq!(config.height, 1080);
        assert_eq!(config.navigation_timeout, Duration::from_secs(60));
        assert_eq!(config.idle_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            BrowserSession::normalize_url("example.com"),
            "https://example.com"
        );
        assert_eq!(
            BrowserSession::normalize_url("http://example.com"),
            "http://example.com"
        );
        assert_eq!(
            BrowserSession::normalize_url("https://example.com/x"),
            "https://example.com/x"
        );
    }

    #[tokio::test]
    async fn test_new_session_shows_blank_page() {
        let launcher = MockLauncher::new();
        let session = BrowserSession::launch("s1", &launcher, BrowserConfig::default())
            .await
            .unwrap();
        assert_eq!(session.current_url(), BLANK_URL);
    }

    #[tokio::test]
    async fn test_navigate_round_trip() {
        let launcher = MockLauncher::new();
        let session = BrowserSession::launch("s1", &launcher, BrowserConfig::default())
            .await
            .unwrap();

        let url = session.navigate("example.com").await.unwrap();
        assert_eq!(url, "https://example.com");
        assert_eq!(session.current_url(), "https://example.com");
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigate_timeout() {
        let launcher = MockLauncher::new().with_navigation_delay(Duration::from_secs(120));
        let session = BrowserSession::launch("s1", &launcher, BrowserConfig::default())
            .await
            .unwrap();

        let err = session.navigate("slow.example").await.unwrap_err();
        match err {
            BrowserError::NavigationTimeout { timeout_secs, .. } => {
                assert_eq!(timeout_secs, 30);
            }
            other => panic!("expected NavigationTimeout, got {:?}", other),
        }
        // current URL untouched by the failed navigation
        assert_eq!(session.current_url(), BLANK_URL);
    }

    #[tokio::test]
    async fn test_click_converts_percentages_to_pixels() {
        let launcher = MockLauncher::new();
        let session = BrowserSession::launch("s1", &launcher, BrowserConfig::default())
            .await
            .unwrap();

        session.click_at(50.0, 50.0).await.unwrap();

        let state = launcher.session_state(0);
        let clicks = state.lock().unwrap().clicks.clone();
        assert_eq!(clicks, vec![(640.0, 360.0)]);
    }

    #[tokio::test]
    async fn test_click_without_viewport_fails() {
        let launcher = MockLauncher::new().without_viewport();
        let session = BrowserSession::launch("s1", &launcher, BrowserConfig::default())
            .await
            .unwrap();

        let err = session.click_at(10.0, 10.0).await.unwrap_err();
        assert!(matches!(err, BrowserError::ViewportUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_back_restores_previous_url() {
        let launcher = MockLauncher::new();
        let session = BrowserSession::launch("s1", &launcher, BrowserConfig::default())
            .await
            .unwrap();

        session.navigate("one.example").await.unwrap();
        session.navigate("two.example").await.unwrap();
        session.back().await.unwrap();

        assert_eq!(session.current_url(), "https://one.example");

        session.forward().await.unwrap();
        assert_eq!(session.current_url(), "https://two.example");
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let launcher = MockLauncher::new();
        let session = BrowserSession::launch("s1", &launcher, BrowserConfig::default())
            .await
            .unwrap();

        session.close().await;
        session.close().await;

        assert_eq!(launcher.close_count(), 1);
    }

    #[tokio::test]
    async fn test_action_after_close_fails_cleanly() {
        let launcher = MockLauncher::new();
        let session = BrowserSession::launch("s1", &launcher, BrowserConfig::default())
            .await
            .unwrap();

        session.close().await;

        let err = session.navigate("example.com").await.unwrap_err();
        assert!(matches!(err, BrowserError::SessionClosed(_)));

        let err = session.screenshot().await.unwrap_err();
        assert!(matches!(err, BrowserError::SessionClosed(_)));
    }
}
