//! Scripted in-memory engine for tests
//!
//! `MockLauncher` produces `MockSession` instances that track
//! navigation history, clicks and input fills without a real browser,
//! so registry and orchestrator behavior can be tested hermetically.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::engine::{DomSnapshot, EngineLauncher, EngineSession, InputState};
use crate::error::{BrowserError, Result};
use crate::session::{BLANK_URL, BrowserConfig};

/// A 1x1 PNG used as the mock's screenshot frame
static SAMPLE_PNG: LazyLock<Vec<u8>> = LazyLock::new(|| {
    let img = image::RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 0, 255]));
    let mut png = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut png),
        image::ImageFormat::Png,
    )
    .expect("1x1 png encodes");
    png
});

/// One fake input element on the mock page
#[derive(Debug, Clone)]
pub struct MockInput {
    /// Selectors this element answers to
    pub matches: Vec<String>,
    pub visible: bool,
    pub value: String,
}

impl MockInput {
    pub fn empty_visible(selectors: &[&str]) -> Self {
        Self {
            matches: selectors.iter().map(|s| s.to_string()).collect(),
            visible: true,
            value: String::new(),
        }
    }

    pub fn hidden(selectors: &[&str]) -> Self {
        Self {
            visible: false,
            ..Self::empty_visible(selectors)
        }
    }

    pub fn prefilled(selectors: &[&str], value: &str) -> Self {
        Self {
            value: value.to_string(),
            ..Self::empty_visible(selectors)
        }
    }
}

/// Observable state of one mock session
#[derive(Debug, Default)]
pub struct MockState {
    pub url: String,
    pub back_stack: Vec<String>,
    pub forward_stack: Vec<String>,
    pub inputs: Vec<MockInput>,
    pub clicks: Vec<(f64, f64)>,
}

#[derive(Clone)]
struct Template {
    inputs: Vec<MockInput>,
    document: DomSnapshot,
    viewport: Option<(u32, u32)>,
    navigation_delay: Option<Duration>,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            document: DomSnapshot::default(),
            viewport: Some((1280, 720)),
            navigation_delay: None,
        }
    }
}

struct Hub {
    fail_launch: bool,
    template: Template,
    states: Mutex<Vec<Arc<Mutex<MockState>>>>,
    close_count: AtomicUsize,
}

/// Shared view into the launcher's created sessions
#[derive(Clone)]
pub struct MockHandle {
    hub: Arc<Hub>,
}

impl MockHandle {
    /// Total engine closes across all sessions
    pub fn close_count(&self) -> usize {
        self.hub.close_count.load(Ordering::SeqCst)
    }

    /// State of the `index`-th launched session
    pub fn session_state(&self, index: usize) -> Arc<Mutex<MockState>> {
        Arc::clone(&self.hub.states.lock().unwrap()[index])
    }

    pub fn launch_count(&self) -> usize {
        self.hub.states.lock().unwrap().len()
    }
}

/// Launcher producing scripted mock sessions
pub struct MockLauncher {
    hub: Arc<Hub>,
}

impl Default for MockLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLauncher {
    pub fn new() -> Self {
        Self {
            hub: Arc::new(Hub {
                fail_launch: false,
                template: Template::default(),
                states: Mutex::new(Vec::new()),
                close_count: AtomicUsize::new(0),
            }),
        }
    }

    /// Launcher whose launches always fail
    pub fn failing() -> Self {
        Self {
            hub: Arc::new(Hub {
                fail_launch: true,
                template: Template::default(),
                states: Mutex::new(Vec::new()),
                close_count: AtomicUsize::new(0),
            }),
        }
    }

    fn map_template(self, f: impl FnOnce(&mut Template)) -> Self {
        let mut template = self.hub.template.clone();
        f(&mut template);
        Self {
            hub: Arc::new(Hub {
                fail_launch: self.hub.fail_launch,
                template,
                states: Mutex::new(Vec::new()),
                close_count: AtomicUsize::new(0),
            }),
        }
    }

    /// Sessions start with these input elements on the page.
    pub fn with_inputs(self, inputs: Vec<MockInput>) -> Self {
        self.map_template(|t| t.inputs = inputs)
    }

    /// Sessions return this document snapshot.
    pub fn with_document(self, document: DomSnapshot) -> Self {
        self.map_template(|t| t.document = document)
    }

    /// Navigations take this long.
    pub fn with_navigation_delay(self, delay: Duration) -> Self {
        self.map_template(|t| t.navigation_delay = Some(delay))
    }

    /// Sessions report no viewport.
    pub fn without_viewport(self) -> Self {
        self.map_template(|t| t.viewport = None)
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            hub: Arc::clone(&self.hub),
        }
    }

    /// Shorthand for `handle().close_count()`
    pub fn close_count(&self) -> usize {
        self.handle().close_count()
    }

    /// Shorthand for `handle().session_state(index)`
    pub fn session_state(&self, index: usize) -> Arc<Mutex<MockState>> {
        self.handle().session_state(index)
    }
}

#[async_trait]
impl EngineLauncher for MockLauncher {
    async fn launch(&self, _config: &BrowserConfig) -> Result<Box<dyn EngineSession>> {
        if self.hub.fail_launch {
            return Err(BrowserError::EngineLaunch(
                "mock launcher configured to fail".to_string(),
            ));
        }

        let state = Arc::new(Mutex::new(MockState {
            url: BLANK_URL.to_string(),
            inputs: self.hub.template.inputs.clone(),
            ..MockState::default()
        }));
        self.hub.states.lock().unwrap().push(Arc::clone(&state));

        Ok(Box::new(MockSession {
            state,
            document: self.hub.template.document.clone(),
            viewport: self.hub.template.viewport,
            navigation_delay: self.hub.template.navigation_delay,
            hub: Arc::clone(&self.hub),
            closed: false,
        }))
    }
}

struct MockSession {
    state: Arc<Mutex<MockState>>,
    document: DomSnapshot,
    viewport: Option<(u32, u32)>,
    navigation_delay: Option<Duration>,
    hub: Arc<Hub>,
    closed: bool,
}

impl MockSession {
    fn matching_indices(&self, selector: &str) -> Vec<usize> {
        self.state
            .lock()
            .unwrap()
            .inputs
            .iter()
            .enumerate()
            .filter(|(_, input)| input.matches.iter().any(|m| m == selector))
            .map(|(i, _)| i)
            .collect()
    }
}

#[async_trait]
impl EngineSession for MockSession {
    async fn goto(&self, url: &str) -> Result<()> {
        if let Some(delay) = self.navigation_delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        let previous = std::mem::replace(&mut state.url, url.to_string());
        state.back_stack.push(previous);
        state.forward_stack.clear();
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn capture_png(&self) -> Result<Vec<u8>> {
        Ok(SAMPLE_PNG.clone())
    }

    async fn click_xy(&self, x: f64, y: f64) -> Result<()> {
        self.state.lock().unwrap().clicks.push((x, y));
        Ok(())
    }

    async fn history_back(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let Some(previous) = state.back_stack.pop() else {
            return Err(BrowserError::Engine("no history to go back to".to_string()));
        };
        let current = std::mem::replace(&mut state.url, previous);
        state.forward_stack.push(current);
        Ok(())
    }

    async fn history_forward(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let Some(next) = state.forward_stack.pop() else {
            return Err(BrowserError::Engine(
                "no history to go forward to".to_string(),
            ));
        };
        let current = std::mem::replace(&mut state.url, next);
        state.back_stack.push(current);
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        Ok(())
    }

    fn viewport(&self) -> Option<(u32, u32)> {
        self.viewport
    }

    async fn input_states(&self, selector: &str) -> Result<Vec<InputState>> {
        let indices = self.matching_indices(selector);
        let state = self.state.lock().unwrap();
        Ok(indices
            .into_iter()
            .map(|i| {
                let input = &state.inputs[i];
                InputState {
                    visible: input.visible,
                    empty: input.value.is_empty(),
                }
            })
            .collect())
    }

    async fn fill_input(&self, selector: &str, index: usize, value: &str) -> Result<()> {
        let indices = self.matching_indices(selector);
        let Some(&actual) = indices.get(index) else {
            return Err(BrowserError::Engine(format!(
                "no element {} for selector {}",
                index, selector
            )));
        };
        self.state.lock().unwrap().inputs[actual].value = value.to_string();
        Ok(())
    }

    async fn extract_document(&self) -> Result<DomSnapshot> {
        Ok(self.document.clone())
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.hub.close_count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
