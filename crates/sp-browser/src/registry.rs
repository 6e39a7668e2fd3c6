//! Session registry
//!
//! Maps session ids to live browser sessions, guarantees single
//! ownership per id, and reclaims idle sessions on a fixed interval.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::EngineLauncher;
use crate::error::{BrowserError, Result};
use crate::session::{BrowserConfig, BrowserSession};

/// Registry of live browser sessions keyed by session id
///
/// The map is sharded (DashMap), so create/get/destroy on different ids
/// proceed independently and the sweep never blocks an active session.
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<BrowserSession>>,
    launcher: Arc<dyn EngineLauncher>,
    config: BrowserConfig,
}

impl SessionRegistry {
    pub fn new(launcher: Arc<dyn EngineLauncher>, config: BrowserConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            launcher,
            config,
        }
    }

    /// Create a session for `id`, destroying any existing one first so
    /// each id owns at most one engine instance.
    ///
    /// On launch failure the error propagates and no entry is left
    /// behind.
    pub async fn create(&self, id: &str) -> Result<Arc<BrowserSession>> {
        self.destroy(id).await;

        let session = Arc::new(
            BrowserSession::launch(id, self.launcher.as_ref(), self.config.clone()).await?,
        );
        self.sessions.insert(id.to_string(), Arc::clone(&session));

        info!(session = %id, "session registered");
        Ok(session)
    }

    /// Look up a session, touching its last-activity timestamp.
    pub fn get(&self, id: &str) -> Result<Arc<BrowserSession>> {
        let session = self
            .sessions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| BrowserError::SessionNotFound(id.to_string()))?;

        session.touch();
        Ok(session)
    }

    /// Destroy the session for `id`. Idempotent; close failures are
    /// logged inside the session, never propagated.
    pub async fn destroy(&self, id: &str) {
        if let Some((_, session)) = self.sessions.remove(id) {
            debug!(session = %id, "destroying session");
            session.close().await;
        }
    }

    /// Destroy every session idle strictly longer than the configured
    /// idle timeout.
    pub async fn sweep(&self) {
        let idle: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().idle_for() > self.config.idle_timeout)
            .map(|entry| entry.key().clone())
            .collect();

        for id in idle {
            info!(session = %id, "sweeping idle session");
            self.destroy(&id).await;
        }
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Close every live session; used at shutdown.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        if !ids.is_empty() {
            warn!("closing {} live sessions on shutdown", ids.len());
        }
        for id in ids {
            self.destroy(&id).await;
        }
    }

    /// Spawn the periodic idle sweep task.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        let interval = registry.config.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick completes immediately
            loop {
                ticker.tick().await;
                registry.sweep().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::BLANK_URL;
    use crate::testing::MockLauncher;
    use std::time::Duration;

    fn registry_with(launcher: MockLauncher, config: BrowserConfig) -> SessionRegistry {
        SessionRegistry::new(Arc::new(launcher), config)
    }

    #[tokio::test]
    async fn test_create_then_get_returns_blank_session() {
        let registry = registry_with(MockLauncher::new(), BrowserConfig::default());

        registry.create("s1").await.unwrap();
        let session = registry.get("s1").unwrap();

        assert_eq!(session.current_url(), BLANK_URL);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_get_unknown_session() {
        let registry = registry_with(MockLauncher::new(), BrowserConfig::default());
        let err = registry.get("missing").unwrap_err();
        assert!(matches!(err, BrowserError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_create_replaces_existing_session() {
        let launcher = MockLauncher::new();
        let handle = launcher.handle();
        let registry = registry_with(launcher, BrowserConfig::default());

        let first = registry.create("s1").await.unwrap();
        registry.create("s1").await.unwrap();

        // the first engine was closed, the map holds exactly one entry
        assert_eq!(handle.close_count(), 1);
        assert_eq!(registry.len(), 1);

        // actions on the stale handle fail cleanly
        let err = first.navigate("example.com").await.unwrap_err();
        assert!(matches!(err, BrowserError::SessionClosed(_)));
    }

    #[tokio::test]
    async fn test_create_failure_leaves_no_entry() {
        let registry = registry_with(MockLauncher::failing(), BrowserConfig::default());

        let err = registry.create("s1").await.unwrap_err();
        assert!(matches!(err, BrowserError::EngineLaunch(_)));
        assert!(registry.is_empty());
        assert!(registry.get("s1").is_err());
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let launcher = MockLauncher::new();
        let handle = launcher.handle();
        let registry = registry_with(launcher, BrowserConfig::default());

        registry.create("s1").await.unwrap();
        registry.destroy("s1").await;
        registry.destroy("s1").await;

        assert_eq!(handle.close_count(), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_destroys_only_idle_sessions() {
        let config = BrowserConfig::default(); // 30 minute idle timeout
        let registry = registry_with(MockLauncher::new(), config);

        registry.create("old").await.unwrap();
        tokio::time::advance(Duration::from_secs(20 * 60)).await;
        registry.create("young").await.unwrap();
        tokio::time::advance(Duration::from_secs(11 * 60)).await;

        // "old" is idle 31 min, "young" only 11 min
        registry.sweep().await;

        assert!(registry.get("old").is_err());
        assert!(registry.get("young").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_boundary_is_exclusive() {
        let config = BrowserConfig::builder()
            .idle_timeout(Duration::from_secs(60))
            .build();
        let registry = registry_with(MockLauncher::new(), config);

        registry.create("s1").await.unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;

        // exactly at the timeout: left untouched
        registry.sweep().await;
        assert!(registry.get("s1").is_ok());

        // get() touched the session, so start the clock again
        tokio::time::advance(Duration::from_secs(61)).await;
        registry.sweep().await;
        assert!(registry.get("s1").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_defers_sweep() {
        let config = BrowserConfig::builder()
            .idle_timeout(Duration::from_secs(60))
            .build();
        let registry = registry_with(MockLauncher::new(), config);

        registry.create("s1").await.unwrap();
        tokio::time::advance(Duration::from_secs(45)).await;

        // an action touches last-activity
        let session = registry.get("s1").unwrap();
        session.navigate("example.com").await.unwrap();

        tokio::time::advance(Duration::from_secs(45)).await;
        registry.sweep().await;

        // 45s since the navigate, not 90s since creation
        assert!(registry.get("s1").is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything() {
        let launcher = MockLauncher::new();
        let handle = launcher.handle();
        let registry = registry_with(launcher, BrowserConfig::default());

        registry.create("a").await.unwrap();
        registry.create("b").await.unwrap();
        registry.shutdown().await;

        assert!(registry.is_empty());
        assert_eq!(handle.close_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_sweeper_reclaims_idle_sessions() {
        let config = BrowserConfig::builder()
            .idle_timeout(Duration::from_secs(60))
            .sweep_interval(Duration::from_secs(30))
            .build();
        let registry = Arc::new(registry_with(MockLauncher::new(), config));
        let sweeper = registry.spawn_sweeper();

        registry.create("s1").await.unwrap();
        tokio::time::advance(Duration::from_secs(91)).await;
        tokio::task::yield_now().await;

        assert!(registry.get("s1").is_err());
        sweeper.abort();
    }
}
