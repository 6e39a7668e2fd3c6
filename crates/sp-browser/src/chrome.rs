//! Headless Chrome engine
//!
//! Production [`EngineSession`] implementation on top of the
//! `headless_chrome` crate. The crate's CDP calls are synchronous, so
//! every call is bridged through `tokio::task::spawn_blocking` to keep
//! the per-session workers from stalling the runtime.

use std::ffi::OsStr;
use std::sync::Arc;

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab, protocol::cdp::Page};
use serde_json::Value;
use tracing::{debug, info};

use crate::engine::{DomSnapshot, EngineLauncher, EngineSession, InputState};
use crate::error::{BrowserError, Result};
use crate::session::BrowserConfig;

/// Launches headless Chrome instances
#[derive(Debug, Default, Clone)]
pub struct ChromeLauncher;

impl ChromeLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EngineLauncher for ChromeLauncher {
    async fn launch(&self, config: &BrowserConfig) -> Result<Box<dyn EngineSession>> {
        let config = config.clone();
        let session = run_blocking(move || ChromeSession::launch(&config)).await?;
        Ok(Box::new(session))
    }
}

/// One Chrome process bound to a single tab
pub struct ChromeSession {
    // taken on close so the process is released exactly once
    browser: Option<Browser>,
    tab: Arc<Tab>,
    viewport: (u32, u32),
}

impl ChromeSession {
    fn launch(config: &BrowserConfig) -> Result<Self> {
        info!(headless = config.headless, "launching Chrome");

        let args: Vec<String> = vec![
            format!("--window-size={},{}", config.width, config.height),
            "--no-sandbox".to_string(),
            "--disable-setuid-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            "--no-first-run".to_string(),
        ];
        let os_args: Vec<&OsStr> = args.iter().map(OsStr::new).collect();

        let launch_options = LaunchOptionsBuilder::default()
            .headless(config.headless)
            .window_size(Some((config.width, config.height)))
            .args(os_args)
            .build()
            .map_err(|e| {
                BrowserError::EngineLaunch(format!("failed to build launch options: {}", e))
            })?;

        let browser = Browser::new(launch_options)
            .map_err(|e| BrowserError::EngineLaunch(format!("failed to launch Chrome: {}", e)))?;

        let tab = {
            let tabs = browser.get_tabs();
            let guard = tabs
                .lock()
                .map_err(|e| BrowserError::EngineLaunch(format!("failed to lock tabs: {}", e)))?;
            guard
                .first()
                .cloned()
                .ok_or_else(|| BrowserError::EngineLaunch("no initial tab".to_string()))?
        };

        info!("Chrome launched");

        Ok(Self {
            browser: Some(browser),
            tab,
            viewport: (config.width, config.height),
        })
    }

    /// Run a script in the page and return its JSON result.
    ///
    /// Scripts stringify their own return value so the result comes back
    /// as one JSON string regardless of the object graph.
    fn eval_json(tab: &Tab, script: &str) -> Result<Value> {
        let result = tab
            .evaluate(script, false)
            .map_err(|e| BrowserError::Engine(format!("script evaluation failed: {}", e)))?;

        match result.value {
            Some(Value::String(json)) => serde_json::from_str(&json)
                .map_err(|e| BrowserError::Engine(format!("bad script result: {}", e))),
            Some(other) => Ok(other),
            None => Ok(Value::Null),
        }
    }
}

/// Bridge a blocking CDP call onto the blocking pool.
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BrowserError::Engine(format!("blocking task failed: {}", e)))?
}

#[async_trait]
impl EngineSession for ChromeSession {
    async fn goto(&self, url: &str) -> Result<()> {
        let tab = Arc::clone(&self.tab);
        let url = url.to_string();
        run_blocking(move || {
            tab.navigate_to(&url)
                .map_err(|e| BrowserError::Engine(e.to_string()))?;
            tab.wait_until_navigated()
                .map_err(|e| BrowserError::Engine(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn current_url(&self) -> Result<String> {
        let tab = Arc::clone(&self.tab);
        run_blocking(move || Ok(tab.get_url())).await
    }

    async fn capture_png(&self) -> Result<Vec<u8>> {
        let tab = Arc::clone(&self.tab);
        run_blocking(move || {
            let png = tab
                .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
                .map_err(|e| BrowserError::Engine(e.to_string()))?;
            debug!(bytes = png.len(), "captured screenshot");
            Ok(png)
        })
        .await
    }

    async fn click_xy(&self, x: f64, y: f64) -> Result<()> {
        let tab = Arc::clone(&self.tab);
        let script = format!(
            "(() => {{ const el = document.elementFromPoint({x}, {y}); \
             if (el) {{ el.click(); return JSON.stringify(true); }} \
             return JSON.stringify(false); }})()"
        );
        run_blocking(move || {
            let hit = ChromeSession::eval_json(&tab, &script)?;
            if hit != Value::Bool(true) {
                debug!(x, y, "no clickable element at point");
            }
            Ok(())
        })
        .await
    }

    async fn history_back(&self) -> Result<()> {
        self.history_step("history.back()").await
    }

    async fn history_forward(&self) -> Result<()> {
        self.history_step("history.forward()").await
    }

    async fn reload(&self) -> Result<()> {
        self.history_step("location.reload()").await
    }

    fn viewport(&self) -> Option<(u32, u32)> {
        Some(self.viewport)
    }

    async fn input_states(&self, selector: &str) -> Result<Vec<InputState>> {
        let tab = Arc::clone(&self.tab);
        let selector_json = serde_json::to_string(selector)
            .map_err(|e| BrowserError::Engine(format!("bad selector: {}", e)))?;
        let script = format!(
            "(() => {{ \
               const els = Array.from(document.querySelectorAll({selector_json})); \
               return JSON.stringify(els.map(el => ({{ \
                 visible: !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length), \
                 empty: !(el.value && el.value.length) \
               }}))); \
             }})()"
        );

        run_blocking(move || {
            let value = ChromeSession::eval_json(&tab, &script)?;
            let states: Vec<RawInputState> = serde_json::from_value(value)
                .map_err(|e| BrowserError::Engine(format!("bad input probe result: {}", e)))?;
            Ok(states
                .into_iter()
                .map(|s| InputState {
                    visible: s.visible,
                    empty: s.empty,
                })
                .collect())
        })
        .await
    }

    async fn fill_input(&self, selector: &str, index: usize, value: &str) -> Result<()> {
        let tab = Arc::clone(&self.tab);
        let selector_json = serde_json::to_string(selector)
            .map_err(|e| BrowserError::Engine(format!("bad selector: {}", e)))?;
        let value_json = serde_json::to_string(value)
            .map_err(|e| BrowserError::Engine(format!("bad value: {}", e)))?;
        // set through the prototype setter and fire input/change so
        // framework-bound forms observe the update
        let script = format!(
            "(() => {{ \
               const els = Array.from(document.querySelectorAll({selector_json})); \
               const el = els[{index}]; \
               if (!el) return JSON.stringify(false); \
               const proto = el.tagName === 'TEXTAREA' \
                 ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype; \
               const setter = Object.getOwnPropertyDescriptor(proto, 'value').set; \
               setter.call(el, {value_json}); \
               el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
               el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
               return JSON.stringify(true); \
             }})()"
        );

        run_blocking(move || {
            let filled = ChromeSession::eval_json(&tab, &script)?;
            if filled != Value::Bool(true) {
                return Err(BrowserError::Engine(
                    "input element disappeared before fill".to_string(),
                ));
            }
            Ok(())
        })
        .await
    }

    async fn extract_document(&self) -> Result<DomSnapshot> {
        let tab = Arc::clone(&self.tab);
        run_blocking(move || {
            let value = ChromeSession::eval_json(&tab, EXTRACT_SCRIPT)?;
            serde_json::from_value(value)
                .map_err(|e| BrowserError::Engine(format!("bad document snapshot: {}", e)))
        })
        .await
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(browser) = self.browser.take() {
            // the Chrome process is killed when the handle drops
            run_blocking(move || {
                drop(browser);
                Ok(())
            })
            .await?;
        }
        Ok(())
    }
}

impl ChromeSession {
    async fn history_step(&self, call: &str) -> Result<()> {
        let tab = Arc::clone(&self.tab);
        let script = call.to_string();
        run_blocking(move || {
            tab.evaluate(&script, false)
                .map_err(|e| BrowserError::Engine(e.to_string()))?;
            tab.wait_until_navigated()
                .map_err(|e| BrowserError::Engine(e.to_string()))?;
            Ok(())
        })
        .await
    }
}

#[derive(serde::Deserialize)]
struct RawInputState {
    #[serde(default)]
    visible: bool,
    #[serde(default)]
    empty: bool,
}

/// In-page extraction of the structural SEO signals.
///
/// Mirrors the shape of [`DomSnapshot`]; the external-link decision is
/// made later against the session's current URL, not in the page.
const EXTRACT_SCRIPT: &str = r#"(() => {
  const meta = document.querySelector('meta[name="description"]');
  const snapshot = {
    title: document.title || '',
    metaDescription: (meta && meta.getAttribute('content')) || '',
    headings: Array.from(document.querySelectorAll('h1, h2, h3, h4, h5, h6')).map(h => ({
      level: parseInt(h.tagName.charAt(1), 10),
      text: (h.textContent || '').trim()
    })),
    images: Array.from(document.querySelectorAll('img')).map(img => ({
      src: img.src || '',
      alt: img.alt || ''
    })),
    links: Array.from(document.querySelectorAll('a[href]')).map(a => ({
      href: a.getAttribute('href') || '',
      text: (a.textContent || '').trim()
    }))
  };
  return JSON.stringify(snapshot);
})()"#;
