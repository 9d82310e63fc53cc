//! External policy backend loading
//!
//! The gateway can consult an out-of-process policy service before running
//! its built-in checks. The backend is described by a small YAML descriptor
//! on disk; anything wrong with it (missing directory, missing file,
//! unreadable, malformed) is logged and the gateway runs on built-in checks
//! alone. Loading never fails gateway construction.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use coderail_kernel::{BackendMessage, BackendVerdict, PolicyBackend, SafetyError, SafetyResult};

/// Descriptor file name looked up inside the backend configuration directory.
pub const DESCRIPTOR_FILE: &str = "backend.yml";

const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// On-disk backend descriptor.
///
/// ```yaml
/// kind: http
/// url: http://localhost:8044/v1/validate
/// timeout_ms: 3000
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendDescriptor {
    Http {
        url: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
}

/// Load the backend described under `dir`, if any.
///
/// Returns `None` both when no descriptor is present (not an error, just
/// unconfigured) and when the descriptor is broken (logged, degraded).
pub fn load_backend(dir: &Path) -> Option<Arc<dyn PolicyBackend>> {
    let path = dir.join(DESCRIPTOR_FILE);
    if !path.is_file() {
        info!(path = %path.display(), "no policy backend descriptor; using built-in checks only");
        return None;
    }
    match read_descriptor(&path) {
        Ok(descriptor) => match build_backend(&descriptor) {
            Ok(backend) => {
                info!(backend = backend.name(), "policy backend configured");
                Some(backend)
            }
            Err(err) => {
                warn!(%err, "policy backend construction failed; using built-in checks only");
                None
            }
        },
        Err(err) => {
            warn!(path = %path.display(), %err, "bad policy backend descriptor; using built-in checks only");
            None
        }
    }
}

fn read_descriptor(path: &Path) -> SafetyResult<BackendDescriptor> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| SafetyError::Configuration(format!("read {}: {err}", path.display())))?;
    serde_yaml::from_str(&raw)
        .map_err(|err| SafetyError::Configuration(format!("parse {}: {err}", path.display())))
}

fn build_backend(descriptor: &BackendDescriptor) -> SafetyResult<Arc<dyn PolicyBackend>> {
    match descriptor {
        BackendDescriptor::Http { url, timeout_ms } => {
            let timeout = Duration::from_millis(timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS));
            Ok(Arc::new(HttpPolicyBackend::new(url.clone(), timeout)?))
        }
    }
}

// =============================================================================
// HTTP backend
// =============================================================================

/// Policy backend speaking a one-endpoint JSON protocol: POST the message,
/// get a verdict back.
pub struct HttpPolicyBackend {
    client: reqwest::Client,
    url: String,
}

impl HttpPolicyBackend {
    pub fn new(url: String, timeout: Duration) -> SafetyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SafetyError::Backend(format!("http client: {err}")))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl PolicyBackend for HttpPolicyBackend {
    async fn validate(&self, message: &BackendMessage) -> SafetyResult<BackendVerdict> {
        let response = self
            .client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|err| SafetyError::Backend(format!("request: {err}")))?
            .error_for_status()
            .map_err(|err| SafetyError::Backend(format!("status: {err}")))?;
        response
            .json::<BackendVerdict>()
            .await
            .map_err(|err| SafetyError::Backend(format!("decode: {err}")))
    }

    fn name(&self) -> &str {
        "http-backend"
    }
}

// =============================================================================
// Tests
// =============================================================================
