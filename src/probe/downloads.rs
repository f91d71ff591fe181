//! Download client probe (Transmission RPC).
//!
//! The RPC endpoint rejects any request without a current session id with a
//! 409 that carries the id in a header, so every check starts with a
//! handshake request whose only purpose is to collect that header.

use super::{ActivityProbe, ProbeResult};
use crate::config::DownloadClientConfig;
use crate::error::{AutoshutdownError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

const PROBE_NAME: &str = "download_client";
const SESSION_ID_HEADER: &str = "X-Transmission-Session-Id";

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: String,
    #[serde(default)]
    arguments: Option<TorrentList>,
}

#[derive(Debug, Deserialize)]
struct TorrentList {
    #[serde(default)]
    torrents: Vec<Torrent>,
}

#[derive(Debug, Deserialize)]
struct Torrent {
    #[serde(default)]
    name: String,
    #[serde(rename = "percentDone")]
    percent_done: f64,
}

pub struct DownloadQueueProbe {
    client: reqwest::Client,
    rpc_url: String,
    credentials: Option<(String, Option<String>)>,
}

impl DownloadQueueProbe {
    pub fn new(config: &DownloadClientConfig, client: reqwest::Client) -> Self {
        let rpc_url = format!(
            "http://{}:{}/{}",
            config.address,
            config.port,
            config.rpc_path.trim_start_matches('/')
        );
        let credentials = config
            .username
            .clone()
            .map(|user| (user, config.password.clone()));

        Self {
            client,
            rpc_url,
            credentials,
        }
    }

    pub fn with_rpc_url<S: Into<String>>(rpc_url: S, client: reqwest::Client) -> Self {
        Self {
            client,
            rpc_url: rpc_url.into(),
            credentials: None,
        }
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, &self.rpc_url);
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, password.as_ref()),
            None => builder,
        }
    }

    /// Obtain the session id the RPC endpoint expects on real requests
    async fn session_id(&self) -> Result<String> {
        debug!("Obtaining {} from {} ...", SESSION_ID_HEADER, self.rpc_url);

        let response = self
            .request(reqwest::Method::GET)
            .send()
            .await
            .map_err(|e| AutoshutdownError::communication(PROBE_NAME, e))?;

        response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                AutoshutdownError::communication(
                    PROBE_NAME,
                    format!(
                        "handshake returned {} without a {} header",
                        response.status(),
                        SESSION_ID_HEADER
                    ),
                )
            })
    }

    async fn torrents(&self, session_id: &str) -> Result<Vec<Torrent>> {
        let body = json!({
            "arguments": { "fields": ["name", "percentDone"] },
            "method": "torrent-get",
        });

        let response = self
            .request(reqwest::Method::POST)
            .header(SESSION_ID_HEADER, session_id)
            .json(&body)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AutoshutdownError::communication(PROBE_NAME, e))?;

        let rpc: RpcResponse = response
            .json()
            .await
            .map_err(|e| AutoshutdownError::parse(PROBE_NAME, e))?;

        if rpc.result != "success" {
            return Err(AutoshutdownError::communication(
                PROBE_NAME,
                format!("torrent-get returned result '{}'", rpc.result),
            ));
        }

        Ok(rpc.arguments.map(|args| args.torrents).unwrap_or_default())
    }

    async fn query(&self) -> Result<ProbeResult> {
        let session_id = self.session_id().await?;
        let torrents = self.torrents(&session_id).await?;

        if torrents.is_empty() {
            debug!("Download queue is empty");
            return Ok(ProbeResult::Inactive);
        }

        let unfinished = torrents.iter().find(|t| t.percent_done < 1.0);
        Ok(match unfinished {
            Some(torrent) => ProbeResult::active(format!(
                "'{}' at {:.1}% ({} item(s) queued)",
                torrent.name,
                torrent.percent_done * 100.0,
                torrents.len()
            )),
            None => {
                debug!("All {} queued download(s) are complete", torrents.len());
                ProbeResult::Inactive
            }
        })
    }
}

#[async_trait]
impl ActivityProbe for DownloadQueueProbe {
    fn name(&self) -> &str {
        PROBE_NAME
    }

    async fn check(&self) -> ProbeResult {
        self.query().await.into()
    }
}
