//! Activity probes: one per external service that can keep the host awake.
//!
//! A probe never fails. Every communication, parse or command error is turned
//! into [`ProbeResult::Unknown`] at the probe boundary, so a broken service can
//! only ever make a tick look less busy, never crash the loop.

mod downloads;
mod media;
pub mod mock;
mod sessions;

pub use downloads::DownloadQueueProbe;
pub use media::MediaServerProbe;
pub use sessions::{FileSharingProbe, LoginSessionProbe};

use crate::config::AutoshutdownConfig;
use crate::error::{AutoshutdownError, Result};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::time::timeout;
use tracing::info;

/// Outcome of a single probe check.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeResult {
    /// The service is in use.
    Active(Option<String>),
    /// The service is idle.
    Inactive,
    /// Activity could not be determined.
    Unknown(String),
}

impl ProbeResult {
    pub fn active<S: Into<String>>(details: S) -> Self {
        Self::Active(Some(details.into()))
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }
}

impl From<Result<ProbeResult>> for ProbeResult {
    fn from(result: Result<ProbeResult>) -> Self {
        result.unwrap_or_else(|e| ProbeResult::Unknown(e.to_string()))
    }
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active(Some(details)) => write!(f, "active ({})", details),
            Self::Active(None) => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
            Self::Unknown(reason) => write!(f, "unknown ({})", reason),
        }
    }
}

/// A source of activity polled once per tick.
///
/// Implementations hold only immutable connection parameters, so every call
/// is self-contained and safe to repeat.
#[async_trait]
pub trait ActivityProbe: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Check the service. Must not panic and must not block indefinitely on
    /// its own; [`Guarded`] adds the time bound.
    async fn check(&self) -> ProbeResult;
}

/// Bounds an inner probe with a timeout; an elapsed check is `Unknown`.
pub struct Guarded<P> {
    inner: P,
    timeout: Duration,
}

impl<P: ActivityProbe> Guarded<P> {
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<P: ActivityProbe> ActivityProbe for Guarded<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn check(&self) -> ProbeResult {
        match timeout(self.timeout, self.inner.check()).await {
            Ok(result) => result,
            Err(_) => ProbeResult::Unknown(format!("timed out after {:?}", self.timeout)),
        }
    }
}

/// Build the enabled probes in registration order: login sessions, file
/// sharing, media server, download client.
pub fn build_probes(config: &AutoshutdownConfig) -> Result<Vec<Box<dyn ActivityProbe>>> {
    let probe_timeout = config.poll.probe_timeout();
    let client = reqwest::Client::builder()
        .timeout(probe_timeout)
        .build()
        .map_err(|e| AutoshutdownError::system(format!("Failed to build HTTP client: {}", e)))?;

    let mut probes: Vec<Box<dyn ActivityProbe>> = Vec::new();

    if config.login_sessions.enabled {
        probes.push(Box::new(Guarded::new(
            LoginSessionProbe::new(config.login_sessions.clone()),
            probe_timeout,
        )));
    }

    if config.file_sharing.enabled {
        probes.push(Box::new(Guarded::new(
            FileSharingProbe::new(config.file_sharing.clone()),
            probe_timeout,
        )));
    }

    if config.media_server.enabled {
        // One budget per sub-check, so a stuck listing cannot hide the other
        probes.push(Box::new(Guarded::new(
            MediaServerProbe::new(&config.media_server, client.clone())
                .with_request_timeout(probe_timeout),
            probe_timeout * MediaServerProbe::SUB_CHECKS,
        )));
    }

    if config.download_client.enabled {
        probes.push(Box::new(Guarded::new(
            DownloadQueueProbe::new(&config.download_client, client),
            probe_timeout,
        )));
    }

    info!(
        "Registered {} activity probe(s): {}",
        probes.len(),
        probes
            .iter()
            .map(|p| p.name())
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(probes)
}
