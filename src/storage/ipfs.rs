// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 CyberGuard Contributors

//! Thin client for the IPFS (Kubo) HTTP RPC API.
//!
//! Every RPC is a `POST /api/v0/<command>`. Failures come back as a non-2xx
//! status with a JSON body `{"Message": .., "Code": .., "Type": "error"}`.
//! Pubsub topics and payloads travel multibase-encoded (base64url, `u`
//! prefix).
//!
//! No request timeout is configured on the HTTP client itself because
//! `pubsub/sub` holds its response open indefinitely. Callers bound the
//! finite calls with `tokio::time::timeout`.
//!
//! [`IpfsGateway`] is the read-only path used when no node is connected:
//! `GET {gateway}/ipfs/{cid}`.

use std::time::Duration;

use base64ct::{Base64UrlUnpadded, Encoding};
use reqwest::{multipart, Client, Response};
use serde::{Deserialize, Serialize};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum IpfsError {
    #[error("IPFS request failed: {0}")]
    Request(String),

    #[error("IPFS API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("IPFS response was invalid: {0}")]
    InvalidResponse(String),
}

impl IpfsError {
    /// Whether the node reported that the requested content does not exist
    /// or the identifier could not be resolved.
    pub fn is_not_found(&self) -> bool {
        match self {
            IpfsError::Api { status, message } => {
                let message = message.to_ascii_lowercase();
                *status == 404
                    || message.contains("not found")
                    || message.contains("invalid path")
                    || message.contains("invalid cid")
                    || message.contains("failed to resolve")
            }
            _ => false,
        }
    }
}

/// HTTP basic credentials (e.g. a hosted gateway's project id and secret).
#[derive(Clone)]
pub struct ApiCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Response types
// =============================================================================

/// `id` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeIdentity {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "AgentVersion", default)]
    pub agent_version: Option<String>,
    #[serde(rename = "Addresses", default)]
    pub addresses: Option<Vec<String>>,
}

/// `add` response.
#[derive(Debug, Clone, Deserialize)]
pub struct AddedContent {
    #[serde(rename = "Hash")]
    pub hash: String,
    #[serde(rename = "Size", default)]
    pub size: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Commit", default)]
    pub commit: Option<String>,
}

/// One entry of `swarm/peers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmPeer {
    #[serde(rename = "Peer")]
    pub peer: String,
    #[serde(rename = "Addr")]
    pub addr: String,
    #[serde(rename = "Latency", default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SwarmPeersResponse {
    #[serde(rename = "Peers", default)]
    peers: Option<Vec<SwarmPeer>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "Message")]
    message: String,
}

/// One line of `ping` output. Kubo brackets the round trips with status
/// lines that carry only `Text`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PingReply {
    #[serde(rename = "Success")]
    pub success: bool,
    /// Round-trip time in nanoseconds; zero on status lines.
    #[serde(rename = "Time", default)]
    pub time_ns: u64,
    #[serde(rename = "Text", default)]
    pub text: String,
}

/// Decoded pubsub message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubsubMessage {
    pub from: String,
    pub topic: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct RawPubsubMessage {
    #[serde(default)]
    from: String,
    data: String,
    #[serde(rename = "topicIDs", default)]
    topic_ids: Vec<String>,
}

// =============================================================================
// Multibase
// =============================================================================

/// Encode bytes as multibase base64url (`u` prefix, no padding).
pub fn multibase_encode(bytes: &[u8]) -> String {
    format!("u{}", Base64UrlUnpadded::encode_string(bytes))
}

pub fn multibase_decode(encoded: &str) -> Result<Vec<u8>, IpfsError> {
    let body = encoded.strip_prefix('u').ok_or_else(|| {
        IpfsError::InvalidResponse(format!("unsupported multibase prefix in {encoded:?}"))
    })?;
    Base64UrlUnpadded::decode_vec(body)
        .map_err(|e| IpfsError::InvalidResponse(format!("invalid multibase payload: {e}")))
}

// =============================================================================
// KuboApi
// =============================================================================

#[derive(Debug, Clone)]
pub struct KuboApi {
    base_url: String,
    credentials: Option<ApiCredentials>,
    http: Client,
}

impl KuboApi {
    pub fn new(base_url: &str, credentials: Option<ApiCredentials>) -> Result<Self, IpfsError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            http: http_client()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn id(&self) -> Result<NodeIdentity, IpfsError> {
        self.call_json("id", &[]).await
    }

    pub async fn version(&self) -> Result<VersionInfo, IpfsError> {
        self.call_json("version", &[]).await
    }

    /// Add raw bytes and pin them. Returns the content identifier.
    pub async fn add(&self, bytes: Vec<u8>) -> Result<AddedContent, IpfsError> {
        let form = multipart::Form::new()
            .part("file", multipart::Part::bytes(bytes).file_name("blob"));
        let response = self
            .request("add", &[("pin", "true")])
            .multipart(form)
            .send()
            .await
            .map_err(|e| IpfsError::Request(format!("POST add failed: {e}")))?;
        decode_json(check_status(response).await?).await
    }

    /// Read the full content for `cid`.
    pub async fn cat(&self, cid: &str) -> Result<Vec<u8>, IpfsError> {
        let response = self.call("cat", &[("arg", cid)]).await?;
        read_chunks(response, "cat").await
    }

    pub async fn pin_add(&self, cid: &str) -> Result<(), IpfsError> {
        self.call("pin/add", &[("arg", cid)]).await.map(|_| ())
    }

    pub async fn pin_rm(&self, cid: &str) -> Result<(), IpfsError> {
        self.call("pin/rm", &[("arg", cid)]).await.map(|_| ())
    }

    pub async fn swarm_peers(&self) -> Result<Vec<SwarmPeer>, IpfsError> {
        let response: SwarmPeersResponse = self.call_json("swarm/peers", &[]).await?;
        Ok(response.peers.unwrap_or_default())
    }

    pub async fn swarm_connect(&self, multiaddr: &str) -> Result<(), IpfsError> {
        self.call("swarm/connect", &[("arg", multiaddr)])
            .await
            .map(|_| ())
    }

    pub async fn swarm_disconnect(&self, multiaddr: &str) -> Result<(), IpfsError> {
        self.call("swarm/disconnect", &[("arg", multiaddr)])
            .await
            .map(|_| ())
    }

    pub async fn pubsub_publish(&self, topic: &str, data: Vec<u8>) -> Result<(), IpfsError> {
        let topic = multibase_encode(topic.as_bytes());
        let form = multipart::Form::new()
            .part("file", multipart::Part::bytes(data).file_name("message"));
        let response = self
            .request("pubsub/pub", &[("arg", topic.as_str())])
            .multipart(form)
            .send()
            .await
            .map_err(|e| IpfsError::Request(format!("POST pubsub/pub failed: {e}")))?;
        check_status(response).await.map(|_| ())
    }

    /// Ping `peer_id` `count` times and collect every reply line.
    pub async fn ping(&self, peer_id: &str, count: u32) -> Result<Vec<PingReply>, IpfsError> {
        let count = count.to_string();
        let response = self
            .call("ping", &[("arg", peer_id), ("count", count.as_str())])
            .await?;

        let mut body = NdjsonBody::new(response);
        let mut replies = Vec::new();
        while let Some(line) = body.next_line().await? {
            let reply = serde_json::from_slice(&line)
                .map_err(|e| IpfsError::InvalidResponse(format!("invalid ping reply: {e}")))?;
            replies.push(reply);
        }
        Ok(replies)
    }

    /// Open a subscription. The returned stream yields messages until the
    /// node closes the response or the caller drops it.
    pub async fn pubsub_subscribe(&self, topic: &str) -> Result<PubsubStream, IpfsError> {
        let encoded = multibase_encode(topic.as_bytes());
        let response = self.call("pubsub/sub", &[("arg", encoded.as_str())]).await?;
        Ok(PubsubStream {
            body: NdjsonBody::new(response),
        })
    }

    fn request(&self, command: &str, query: &[(&str, &str)]) -> reqwest::RequestBuilder {
        let builder = self
            .http
            .post(format!("{}/api/v0/{command}", self.base_url))
            .query(query);
        match &self.credentials {
            Some(creds) => builder.basic_auth(&creds.username, Some(&creds.password)),
            None => builder,
        }
    }

    async fn call(&self, command: &str, query: &[(&str, &str)]) -> Result<Response, IpfsError> {
        let response = self
            .request(command, query)
            .send()
            .await
            .map_err(|e| IpfsError::Request(format!("POST {command} failed: {e}")))?;
        check_status(response).await
    }

    async fn call_json<T: serde::de::DeserializeOwned>(
        &self,
        command: &str,
        query: &[(&str, &str)],
    ) -> Result<T, IpfsError> {
        decode_json(self.call(command, query).await?).await
    }
}

// =============================================================================
// IpfsGateway
// =============================================================================

#[derive(Debug, Clone)]
pub struct IpfsGateway {
    base_url: String,
    http: Client,
}

impl IpfsGateway {
    pub fn new(base_url: &str) -> Result<Self, IpfsError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: http_client()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the raw bytes behind `cid`. A 404 surfaces as a not-found
    /// [`IpfsError::Api`].
    pub async fn fetch(&self, cid: &str) -> Result<Vec<u8>, IpfsError> {
        if cid.is_empty() || !cid.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(IpfsError::Api {
                status: 400,
                message: format!("invalid cid {cid:?}"),
            });
        }

        let response = self
            .http
            .get(format!("{}/ipfs/{cid}", self.base_url))
            .send()
            .await
            .map_err(|e| IpfsError::Request(format!("GET ipfs/{cid} failed: {e}")))?;
        read_chunks(check_status(response).await?, "gateway").await
    }
}

fn http_client() -> Result<Client, IpfsError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| IpfsError::Request(format!("failed to build HTTP client: {e}")))
}

/// Reassemble a chunked body.
async fn read_chunks(mut response: Response, what: &str) -> Result<Vec<u8>, IpfsError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| IpfsError::Request(format!("reading {what} body failed: {e}")))?
    {
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

async fn check_status(response: Response) -> Result<Response, IpfsError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|e| e.message)
        .unwrap_or(body);
    Err(IpfsError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn decode_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, IpfsError> {
    response
        .json()
        .await
        .map_err(|e| IpfsError::InvalidResponse(format!("invalid JSON: {e}")))
}

// =============================================================================
// PubsubStream
// =============================================================================

/// Newline-delimited JSON body, read line by line as chunks arrive.
struct NdjsonBody {
    response: Response,
    buffer: Vec<u8>,
}

impl NdjsonBody {
    fn new(response: Response) -> Self {
        Self {
            response,
            buffer: Vec::new(),
        }
    }

    /// Next non-blank line without its terminator, or `None` at end of body.
    async fn next_line(&mut self) -> Result<Option<Vec<u8>>, IpfsError> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
                line.pop();
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                return Ok(Some(line));
            }

            match self
                .response
                .chunk()
                .await
                .map_err(|e| IpfsError::Request(format!("reading stream failed: {e}")))?
            {
                Some(chunk) => self.buffer.extend_from_slice(&chunk),
                None => {
                    if self.buffer.iter().all(u8::is_ascii_whitespace) {
                        return Ok(None);
                    }
                    return Ok(Some(std::mem::take(&mut self.buffer)));
                }
            }
        }
    }
}

/// Message stream from `pubsub/sub`.
pub struct PubsubStream {
    body: NdjsonBody,
}

impl PubsubStream {
    /// Next decoded message, or `None` once the node closes the stream.
    pub async fn next_message(&mut self) -> Result<Option<PubsubMessage>, IpfsError> {
        match self.body.next_line().await? {
            Some(line) => parse_pubsub_line(&line).map(Some),
            None => Ok(None),
        }
    }
}

fn parse_pubsub_line(line: &[u8]) -> Result<PubsubMessage, IpfsError> {
    let raw: RawPubsubMessage = serde_json::from_slice(line)
        .map_err(|e| IpfsError::InvalidResponse(format!("invalid pubsub message: {e}")))?;
    let topic = match raw.topic_ids.first() {
        Some(encoded) => String::from_utf8_lossy(&multibase_decode(encoded)?).into_owned(),
        None => String::new(),
    };
    Ok(PubsubMessage {
        from: raw.from,
        topic,
        data: multibase_decode(&raw.data)?,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multibase_uses_url_alphabet_without_padding() {
        let encoded = multibase_encode(b"threat-alerts?");
        assert!(encoded.starts_with('u'));
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+') && !encoded.contains('/'));
        assert_eq!(multibase_decode(&encoded).unwrap(), b"threat-alerts?");
    }

    #[test]
    fn multibase_rejects_other_bases() {
        assert!(multibase_decode("mAAAA").is_err());
    }

    #[test]
    fn pubsub_line_is_decoded() {
        let line = format!(
            r#"{{"from":"12D3KooWPeer","data":"{}","seqno":"uAA","topicIDs":["{}"]}}"#,
            multibase_encode(b"hello"),
            multibase_encode(b"alerts"),
        );
        let msg = parse_pubsub_line(line.as_bytes()).unwrap();
        assert_eq!(msg.from, "12D3KooWPeer");
        assert_eq!(msg.topic, "alerts");
        assert_eq!(msg.data, b"hello");
    }

    #[test]
    fn not_found_detection() {
        let err = IpfsError::Api {
            status: 500,
            message: "block was not found locally (offline)".into(),
        };
        assert!(err.is_not_found());

        let err = IpfsError::Api {
            status: 500,
            message: "invalid path \"bogus\": invalid cid".into(),
        };
        assert!(err.is_not_found());

        let err = IpfsError::Api {
            status: 500,
            message: "context deadline exceeded".into(),
        };
        assert!(!err.is_not_found());
        assert!(!IpfsError::Request("refused".into()).is_not_found());
    }

    #[test]
    fn ping_reply_status_lines_default_time() {
        let status: PingReply =
            serde_json::from_str(r#"{"Success":true,"Text":"PING 12D3KooWPeer."}"#).unwrap();
        assert_eq!(status.time_ns, 0);

        let rtt: PingReply =
            serde_json::from_str(r#"{"Success":true,"Time":1500000,"Text":""}"#).unwrap();
        assert_eq!(rtt.time_ns, 1_500_000);
    }

    #[tokio::test]
    async fn gateway_rejects_path_like_ids() {
        let gateway = IpfsGateway::new("http://127.0.0.1:9/").unwrap();
        assert_eq!(gateway.base_url(), "http://127.0.0.1:9");

        let err = gateway.fetch("../api/v0/id").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let creds = ApiCredentials {
            username: "project".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("project"));
        assert!(!rendered.contains("hunter2"));
    }
}
