//! Push webhook handling
//!
//! A signed push notification for the tracked branch pulls the content
//! checkout and reloads the post store. Deliveries are processed one at a
//! time; a second delivery waits for the first to finish.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::config::WebhookConfig;
use crate::content::{ContentError, ContentStore, LoadReport};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the GitHub-style body signature
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook not configured")]
    NotConfigured,

    #[error("missing signature")]
    MissingSignature,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("content update failed: {0:#}")]
    UpdateFailed(anyhow::Error),

    #[error("content update timed out after {0:?}")]
    Timeout(Duration),

    #[error("reload failed: {0}")]
    Reload(#[from] ContentError),
}

/// What a verified delivery resulted in
#[derive(Debug)]
pub enum RefreshOutcome {
    /// The tracked branch was pulled and the store reloaded
    Refreshed(LoadReport),
    /// A push to some other ref; nothing was done
    Ignored { git_ref: String },
}

#[derive(Debug, Deserialize)]
struct PushPayload {
    #[serde(rename = "ref")]
    git_ref: String,
}

/// Check `header` (`sha256=<hex>`) against HMAC-SHA256 of `body`
pub fn verify_signature(
    secret: &[u8],
    body: &[u8],
    header: Option<&str>,
) -> Result<(), WebhookError> {
    let header = header.ok_or(WebhookError::MissingSignature)?;
    let digest = header
        .trim()
        .strip_prefix(SIGNATURE_PREFIX)
        .and_then(|hex_digest| hex::decode(hex_digest).ok())
        .ok_or(WebhookError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| WebhookError::NotConfigured)?;
    mac.update(body);
    mac.verify_slice(&digest)
        .map_err(|_| WebhookError::InvalidSignature)
}

/// Brings the content checkout up to date
#[async_trait]
pub trait ContentUpdater: Send + Sync {
    async fn update(&self) -> Result<()>;
}

/// Runs `git pull` in the content repository
#[derive(Debug, Clone)]
pub struct GitPull {
    repo_dir: PathBuf,
}

impl GitPull {
    pub fn new<P: AsRef<Path>>(repo_dir: P) -> Self {
        Self {
            repo_dir: repo_dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ContentUpdater for GitPull {
    async fn update(&self) -> Result<()> {
        let output = Command::new("git")
            .arg("pull")
            .current_dir(&self.repo_dir)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to run git pull in {:?}", self.repo_dir))?;

        if !output.status.success() {
            bail!(
                "git pull exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        tracing::debug!(
            "git pull: {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }
}

/// Verifies deliveries and refreshes the store
pub struct Refresher {
    secret: Option<String>,
    branch: String,
    timeout: Duration,
    updater: Arc<dyn ContentUpdater>,
    store: Arc<ContentStore>,
    lock: Mutex<()>,
}

impl Refresher {
    pub fn new(
        config: &WebhookConfig,
        updater: Arc<dyn ContentUpdater>,
        store: Arc<ContentStore>,
    ) -> Self {
        if config.secret.is_none() {
            tracing::warn!("GITHUB_WEBHOOK_SECRET is not set; webhook deliveries will be rejected");
        }
        Self {
            secret: config.secret.clone(),
            branch: config.branch.clone(),
            timeout: Duration::from_secs(config.pull_timeout_secs),
            updater,
            store,
            lock: Mutex::new(()),
        }
    }

    /// Handle one raw delivery
    pub async fn handle(
        &self,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<RefreshOutcome, WebhookError> {
        let secret = self
            .secret
            .as_deref()
            .ok_or(WebhookError::NotConfigured)?;
        verify_signature(secret.as_bytes(), body, signature)?;

        let payload: PushPayload = serde_json::from_slice(body)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

        if payload.git_ref != self.branch {
            tracing::info!("Ignoring push to {}", payload.git_ref);
            return Ok(RefreshOutcome::Ignored {
                git_ref: payload.git_ref,
            });
        }

        self.refresh().await.map(RefreshOutcome::Refreshed)
    }

    /// Pull and reload; concurrent calls queue behind each other
    pub async fn refresh(&self) -> Result<LoadReport, WebhookError> {
        let _guard = self.lock.lock().await;

        tracing::info!("Updating content for {}", self.branch);
        tokio::time::timeout(self.timeout, self.updater.update())
            .await
            .map_err(|_| WebhookError::Timeout(self.timeout))?
            .map_err(WebhookError::UpdateFailed)?;

        let store = Arc::clone(&self.store);
        let report = tokio::task::spawn_blocking(move || store.reload())
            .await
            .map_err(|e| WebhookError::UpdateFailed(anyhow::anyhow!("reload task failed: {e}")))??;

        tracing::info!(
            "Content refreshed: {} posts ({} skipped)",
            report.loaded,
            report.errors.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::content::MarkdownRenderer;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Writes a file into the posts directory in place of a pull
    pub(crate) struct FakeUpdater {
        pub calls: AtomicUsize,
        pub in_flight: AtomicUsize,
        /// Highest number of updates seen running at once
        pub max_in_flight: AtomicUsize,
        pub write: Option<(PathBuf, String)>,
        pub fail: bool,
        pub delay: Duration,
    }

    impl FakeUpdater {
        pub(crate) fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                write: None,
                fail: false,
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl ContentUpdater for FakeUpdater {
        async fn update(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(running, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail {
                bail!("remote unreachable");
            }
            if let Some((path, content)) = &self.write {
                fs::write(path, content)?;
            }
            Ok(())
        }
    }

    pub(crate) fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    const SECRET: &str = "s3cret";
    const MAIN_PUSH: &[u8] = br#"{"ref":"refs/heads/main","after":"abc"}"#;

    fn setup<F>(make_updater: F, timeout_secs: u64) -> (TempDir, Arc<FakeUpdater>, Refresher)
    where
        F: FnOnce(&Path) -> FakeUpdater,
    {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.yaml"), "title: A\ncontent: Alpha\n").unwrap();
        let store = Arc::new(ContentStore::new(tmp.path(), MarkdownRenderer::new()));
        store.reload().unwrap();

        let updater = Arc::new(make_updater(tmp.path()));
        let config = WebhookConfig {
            secret: Some(SECRET.to_string()),
            branch: "refs/heads/main".to_string(),
            pull_timeout_secs: timeout_secs,
        };
        let refresher = Refresher::new(&config, updater.clone(), store);
        (tmp, updater, refresher)
    }

    #[test]
    fn test_verify_signature() {
        let body = b"payload";
        let good = sign(SECRET, body);
        assert!(verify_signature(SECRET.as_bytes(), body, Some(&good)).is_ok());
        assert!(matches!(
            verify_signature(SECRET.as_bytes(), body, None),
            Err(WebhookError::MissingSignature)
        ));
        assert!(matches!(
            verify_signature(SECRET.as_bytes(), b"tampered", Some(&good)),
            Err(WebhookError::InvalidSignature)
        ));
        assert!(matches!(
            verify_signature(SECRET.as_bytes(), body, Some("sha256=zz")),
            Err(WebhookError::InvalidSignature)
        ));
        assert!(matches!(
            verify_signature(SECRET.as_bytes(), body, Some(good.trim_start_matches("sha256="))),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn test_main_push_pulls_and_reloads() {
        let (_tmp, updater, refresher) = setup(
            |dir| FakeUpdater {
                write: Some((dir.join("b.yaml"), "title: B\ncontent: Beta\n".to_string())),
                ..FakeUpdater::new()
            },
            5,
        );

        let outcome = refresher
            .handle(Some(&sign(SECRET, MAIN_PUSH)), MAIN_PUSH)
            .await
            .unwrap();
        match outcome {
            RefreshOutcome::Refreshed(report) => assert_eq!(report.loaded, 2),
            other => panic!("expected refresh, got {other:?}"),
        }
        assert_eq!(updater.calls.load(Ordering::SeqCst), 1);
        assert!(refresher.store.get("b").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_other_ref_is_ignored() {
        let (_tmp, updater, refresher) = setup(|_| FakeUpdater::new(), 5);
        let body = br#"{"ref":"refs/heads/feature"}"#;
        let outcome = refresher
            .handle(Some(&sign(SECRET, body)), body)
            .await
            .unwrap();
        assert!(matches!(outcome, RefreshOutcome::Ignored { git_ref } if git_ref == "refs/heads/feature"));
        assert_eq!(updater.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bad_signature_does_not_pull() {
        let (_tmp, updater, refresher) = setup(|_| FakeUpdater::new(), 5);
        let err = refresher
            .handle(Some(&sign("wrong", MAIN_PUSH)), MAIN_PUSH)
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::InvalidSignature));
        assert_eq!(updater.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let (_tmp, _, refresher) = setup(|_| FakeUpdater::new(), 5);
        let body = br#"{"after":"abc"}"#;
        let err = refresher
            .handle(Some(&sign(SECRET, body)), body)
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn test_missing_secret() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(ContentStore::new(tmp.path(), MarkdownRenderer::new()));
        let refresher = Refresher::new(
            &WebhookConfig::default(),
            Arc::new(FakeUpdater::new()),
            store,
        );
        let err = refresher
            .handle(Some(&sign(SECRET, MAIN_PUSH)), MAIN_PUSH)
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::NotConfigured));
    }

    #[tokio::test]
    async fn test_failed_pull_keeps_store() {
        let (_tmp, _, refresher) = setup(
            |_| FakeUpdater {
                fail: true,
                ..FakeUpdater::new()
            },
            5,
        );
        let err = refresher.refresh().await.unwrap_err();
        assert!(matches!(err, WebhookError::UpdateFailed(_)));
        assert!(refresher.store.get("a").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_slow_pull_times_out() {
        let (_tmp, _, refresher) = setup(
            |_| FakeUpdater {
                delay: Duration::from_secs(30),
                ..FakeUpdater::new()
            },
            1,
        );
        let err = refresher.refresh().await.unwrap_err();
        assert!(matches!(err, WebhookError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_are_serialized() {
        let (_tmp, updater, refresher) = setup(
            |_| FakeUpdater {
                delay: Duration::from_millis(20),
                ..FakeUpdater::new()
            },
            5,
        );

        let (a, b, c) = tokio::join!(
            refresher.refresh(),
            refresher.refresh(),
            refresher.refresh()
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(updater.calls.load(Ordering::SeqCst), 3);
        assert_eq!(updater.max_in_flight.load(Ordering::SeqCst), 1);
    }
}
