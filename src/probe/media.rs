//! Media streaming server probe (Plex-compatible status API).

use super::{ActivityProbe, ProbeResult};
use crate::config::MediaServerConfig;
use crate::error::{AutoshutdownError, Result};
use async_trait::async_trait;
use quick_xml::de::from_str as from_xml;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

const PROBE_NAME: &str = "media_server";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Root element of the session listings; only the count is of interest.
#[derive(Debug, Deserialize)]
struct MediaContainer {
    #[serde(rename = "@size", default)]
    size: u32,
}

#[derive(Debug, Clone, Copy)]
enum SessionKind {
    Streaming,
    Transcoding,
}

impl SessionKind {
    const ALL: [SessionKind; 2] = [SessionKind::Streaming, SessionKind::Transcoding];

    fn path(self) -> &'static str {
        match self {
            Self::Streaming => "/status/sessions/",
            Self::Transcoding => "/transcode/sessions/",
        }
    }

    fn describe(self, count: u32) -> String {
        match self {
            Self::Streaming => format!("{} media stream(s)", count),
            Self::Transcoding => format!("{} media transcoding(s)", count),
        }
    }
}

/// Each sub-check runs under its own `request_timeout`, so a hung endpoint
/// cannot starve the other one. An outer guard needs at least
/// [`MediaServerProbe::SUB_CHECKS`] times that budget.
pub struct MediaServerProbe {
    client: reqwest::Client,
    base_url: String,
    token: String,
    request_timeout: Duration,
}

impl MediaServerProbe {
    pub fn new(config: &MediaServerConfig, client: reqwest::Client) -> Self {
        Self::with_base_url(
            format!("http://{}:{}", config.address, config.port),
            config.token.clone(),
            client,
        )
    }

    pub const SUB_CHECKS: u32 = SessionKind::ALL.len() as u32;

    pub fn with_base_url<S: Into<String>>(
        base_url: S,
        token: String,
        client: reqwest::Client,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Bound on each sub-check
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Number of sessions of one kind currently open on the server
    async fn session_count(&self, kind: SessionKind) -> Result<u32> {
        let url = format!("{}{}", self.base_url, kind.path());
        debug!("Checking {} ...", url);

        let body = self
            .client
            .get(&url)
            .query(&[("X-Plex-Token", self.token.as_str())])
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AutoshutdownError::communication(PROBE_NAME, e))?
            .text()
            .await
            .map_err(|e| AutoshutdownError::communication(PROBE_NAME, e))?;

        let container: MediaContainer = from_xml(&body).map_err(|e| {
            AutoshutdownError::parse(PROBE_NAME, format!("{}: {}", kind.path(), e))
        })?;

        Ok(container.size)
    }

    async fn bounded_session_count(&self, kind: SessionKind) -> Result<u32> {
        match timeout(self.request_timeout, self.session_count(kind)).await {
            Ok(result) => result,
            Err(_) => Err(AutoshutdownError::communication(
                PROBE_NAME,
                format!("{} timed out after {:?}", kind.path(), self.request_timeout),
            )),
        }
    }
}

#[async_trait]
impl ActivityProbe for MediaServerProbe {
    fn name(&self) -> &str {
        PROBE_NAME
    }

    async fn check(&self) -> ProbeResult {
        let mut failures = Vec::new();

        // A failing sub-check must not hide activity reported by the other
        for kind in SessionKind::ALL {
            match self.bounded_session_count(kind).await {
                Ok(0) => debug!("No sessions at {}", kind.path()),
                Ok(count) => return ProbeResult::active(kind.describe(count)),
                Err(e) => failures.push(e.to_string()),
            }
        }

        if failures.is_empty() {
            ProbeResult::Inactive
        } else {
            ProbeResult::Unknown(failures.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AutoshutdownConfig;
    use crate::probe::build_probes;
    use mockito::Matcher;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const IDLE: &str = r#"<MediaContainer size="0"/>"#;

    async fn mock_sessions(
        server: &mut mockito::ServerGuard,
        path: &str,
        status: usize,
        body: &str,
    ) -> mockito::Mock {
        server
            .mock("GET", path)
            .match_query(Matcher::UrlEncoded(
                "X-Plex-Token".into(),
                "secret".into(),
            ))
            .with_status(status)
            .with_body(body)
            .create_async()
            .await
    }

    fn probe_for(server: &mockito::ServerGuard) -> MediaServerProbe {
        MediaServerProbe::with_base_url(
            server.url(),
            "secret".to_string(),
            reqwest::Client::new(),
        )
    }

    /// Server that never answers the streaming listing and reports one
    /// transcoding session
    async fn spawn_server_with_stuck_status() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).to_string();

                    if request.starts_with("GET /status/") {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        return;
                    }

                    let body = r#"<MediaContainer size="1"/>"#;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: text/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        addr
    }

    #[tokio::test]
    async fn test_streaming_session_is_active() {
        let mut server = mockito::Server::new_async().await;
        let _streams = mock_sessions(
            &mut server,
            "/status/sessions/",
            200,
            r#"<MediaContainer size="2"><Video title="a"/><Video title="b"/></MediaContainer>"#,
        )
        .await;

        assert_eq!(
            probe_for(&server).check().await,
            ProbeResult::active("2 media stream(s)")
        );
    }

    #[tokio::test]
    async fn test_transcoding_checked_when_nothing_streams() {
        let mut server = mockito::Server::new_async().await;
        let _streams = mock_sessions(&mut server, "/status/sessions/", 200, IDLE).await;
        let _transcodes = mock_sessions(
            &mut server,
            "/transcode/sessions/",
            200,
            r#"<MediaContainer size="1"><TranscodeSession key="x"/></MediaContainer>"#,
        )
        .await;

        assert_eq!(
            probe_for(&server).check().await,
            ProbeResult::active("1 media transcoding(s)")
        );
    }

    #[tokio::test]
    async fn test_idle_server_is_inactive() {
        let mut server = mockito::Server::new_async().await;
        let _streams = mock_sessions(&mut server, "/status/sessions/", 200, IDLE).await;
        let _transcodes =
            mock_sessions(&mut server, "/transcode/sessions/", 200, "<MediaContainer/>").await;

        assert_eq!(probe_for(&server).check().await, ProbeResult::Inactive);
    }

    #[tokio::test]
    async fn test_failed_status_does_not_hide_transcoding() {
        let mut server = mockito::Server::new_async().await;
        let _streams = mock_sessions(&mut server, "/status/sessions/", 500, "oops").await;
        let _transcodes = mock_sessions(
            &mut server,
            "/transcode/sessions/",
            200,
            r#"<MediaContainer size="3"/>"#,
        )
        .await;

        assert_eq!(
            probe_for(&server).check().await,
            ProbeResult::active("3 media transcoding(s)")
        );
    }

    #[tokio::test]
    async fn test_stuck_status_does_not_hide_transcoding() {
        let addr = spawn_server_with_stuck_status().await;
        let probe = MediaServerProbe::with_base_url(
            format!("http://{}", addr),
            String::new(),
            reqwest::Client::new(),
        )
        .with_request_timeout(Duration::from_millis(300));

        assert_eq!(
            probe.check().await,
            ProbeResult::active("1 media transcoding(s)")
        );
    }

    #[tokio::test]
    async fn test_registered_probe_budget_covers_both_sub_checks() {
        let addr = spawn_server_with_stuck_status().await;
        let mut config = AutoshutdownConfig::default();
        config.poll.probe_timeout_seconds = 1;
        config.login_sessions.enabled = false;
        config.file_sharing.enabled = false;
        config.download_client.enabled = false;
        config.media_server.address = addr.ip().to_string();
        config.media_server.port = addr.port();

        let probes = build_probes(&config).unwrap();
        assert_eq!(probes.len(), 1);

        assert_eq!(
            probes[0].check().await,
            ProbeResult::active("1 media transcoding(s)")
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_unknown() {
        let mut server = mockito::Server::new_async().await;
        let _streams = mock_sessions(
            &mut server,
            "/status/sessions/",
            200,
            r#"<MediaContainer size="many"/>"#,
        )
        .await;
        let _transcodes = mock_sessions(&mut server, "/transcode/sessions/", 200, IDLE).await;

        let result = probe_for(&server).check().await;

        assert!(result.is_unknown());
        assert!(!result.is_active());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unknown() {
        let probe = MediaServerProbe::with_base_url(
            "http://127.0.0.1:1",
            String::new(),
            reqwest::Client::new(),
        );

        assert!(probe.check().await.is_unknown());
    }
}
