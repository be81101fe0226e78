// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 CyberGuard Contributors

//! In-process stand-in for the IPFS RPC API and its read gateway, served on
//! an ephemeral port.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use super::encryption::digest_hex;
use super::ipfs::{multibase_decode, multibase_encode};
use crate::config::StorageConfig;

pub const NODE_ID: &str = "12D3KooWMockNode";

#[derive(Default)]
pub struct MockKubo {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    pins: Mutex<HashSet<String>>,
    peers: Mutex<Vec<String>>,
    published: Mutex<Vec<(String, Vec<u8>)>>,
    queued: Mutex<Vec<String>>,
    pub fail_add: AtomicBool,
    pub add_delay_ms: AtomicU64,
    pub cat_delay_ms: AtomicU64,
    pub sub_delay_ms: AtomicU64,
}

impl MockKubo {
    /// Put bytes straight into the blockstore, as another node would have.
    pub fn seed_blob(&self, bytes: &[u8]) -> String {
        let hash = mock_cid(bytes);
        self.blobs.lock().unwrap().insert(hash.clone(), bytes.to_vec());
        hash
    }

    pub fn has_blob(&self, cid: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(cid)
    }

    pub fn is_pinned(&self, cid: &str) -> bool {
        self.pins.lock().unwrap().contains(cid)
    }

    pub fn peer_addrs(&self) -> Vec<String> {
        self.peers.lock().unwrap().clone()
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().unwrap().clone()
    }

    /// Queue a message delivered to the next subscriber.
    pub fn queue_message(&self, topic: &str, data: &[u8]) {
        let line = json!({
            "from": "12D3KooWRemotePeer",
            "data": multibase_encode(data),
            "seqno": multibase_encode(&[1]),
            "topicIDs": [multibase_encode(topic.as_bytes())],
        });
        self.queued.lock().unwrap().push(line.to_string());
    }
}

/// Serve the mock and return its base URL.
pub async fn spawn(state: Arc<MockKubo>) -> String {
    let app = Router::new()
        .route("/api/v0/id", post(id))
        .route("/api/v0/version", post(version))
        .route("/api/v0/add", post(add))
        .route("/api/v0/cat", post(cat))
        .route("/api/v0/pin/add", post(pin_add))
        .route("/api/v0/pin/rm", post(pin_rm))
        .route("/api/v0/swarm/peers", post(swarm_peers))
        .route("/api/v0/swarm/connect", post(swarm_connect))
        .route("/api/v0/swarm/disconnect", post(swarm_disconnect))
        .route("/api/v0/pubsub/pub", post(pubsub_pub))
        .route("/api/v0/pubsub/sub", post(pubsub_sub))
        .route("/api/v0/ping", post(ping))
        .route("/ipfs/{cid}", get(gateway))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Connected-mode configuration pointing at a running mock.
pub fn connected_config(base_url: &str, data_dir: &Path) -> StorageConfig {
    let mut config = StorageConfig::local_only(data_dir);
    config.ipfs_api_url = Some(url::Url::parse(base_url).unwrap());
    config.connect_attempts = 1;
    config.request_timeout = Duration::from_secs(5);
    config
}

/// Fallback-mode configuration reading through the mock's gateway route.
pub fn gateway_config(base_url: &str, data_dir: &Path) -> StorageConfig {
    let mut config = StorageConfig::local_only(data_dir);
    config.gateway_url = base_url.to_string();
    config.gateway_reads = true;
    config.request_timeout = Duration::from_secs(5);
    config
}

fn mock_cid(bytes: &[u8]) -> String {
    format!("Qm{}", &digest_hex(bytes)[..44])
}

async fn pause(knob: &AtomicU64) {
    let delay = knob.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}

type Args = Query<HashMap<String, String>>;
type Shared = State<Arc<MockKubo>>;

fn api_error(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"Message": message, "Code": 0, "Type": "error"})),
    )
        .into_response()
}

fn arg(args: &HashMap<String, String>) -> String {
    args.get("arg").cloned().unwrap_or_default()
}

async fn file_part(mut multipart: Multipart) -> Vec<u8> {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            return field.bytes().await.unwrap().to_vec();
        }
    }
    Vec::new()
}

async fn id() -> Response {
    Json(json!({
        "ID": NODE_ID,
        "AgentVersion": "kubo/0.29.0/mock",
        "Addresses": ["/ip4/127.0.0.1/tcp/4001"],
    }))
    .into_response()
}

async fn version() -> Response {
    Json(json!({"Version": "0.29.0", "Commit": "mock"})).into_response()
}

async fn add(State(state): Shared, multipart: Multipart) -> Response {
    pause(&state.add_delay_ms).await;
    if state.fail_add.load(Ordering::SeqCst) {
        return api_error("blockstore: write failed");
    }
    let bytes = file_part(multipart).await;
    let size = bytes.len();
    let hash = state.seed_blob(&bytes);
    Json(json!({"Name": "blob", "Hash": hash, "Size": size.to_string()})).into_response()
}

async fn cat(State(state): Shared, Query(args): Args) -> Response {
    pause(&state.cat_delay_ms).await;
    let found = state.blobs.lock().unwrap().get(&arg(&args)).cloned();
    match found {
        Some(bytes) => bytes.into_response(),
        None => api_error("block was not found locally (offline): ipld: could not find node"),
    }
}

async fn pin_add(State(state): Shared, Query(args): Args) -> Response {
    let cid = arg(&args);
    if !state.blobs.lock().unwrap().contains_key(&cid) {
        return api_error("pin: block was not found locally (offline)");
    }
    state.pins.lock().unwrap().insert(cid.clone());
    Json(json!({"Pins": [cid]})).into_response()
}

async fn pin_rm(State(state): Shared, Query(args): Args) -> Response {
    let cid = arg(&args);
    if !state.pins.lock().unwrap().remove(&cid) {
        return api_error("not pinned or pinned indirectly");
    }
    Json(json!({"Pins": [cid]})).into_response()
}

async fn swarm_peers(State(state): Shared) -> Response {
    let peers = state.peers.lock().unwrap().clone();
    if peers.is_empty() {
        return Json(json!({"Peers": null})).into_response();
    }
    let peers: Vec<_> = peers
        .iter()
        .map(|addr| {
            let (base, peer) = addr.rsplit_once("/p2p/").unwrap_or((addr.as_str(), ""));
            json!({"Addr": base, "Peer": peer, "Latency": "", "Muxer": "", "Streams": null})
        })
        .collect();
    Json(json!({"Peers": peers})).into_response()
}

async fn swarm_connect(State(state): Shared, Query(args): Args) -> Response {
    let addr = arg(&args);
    state.peers.lock().unwrap().push(addr.clone());
    Json(json!({"Strings": [format!("connect {addr} success")]})).into_response()
}

async fn swarm_disconnect(State(state): Shared, Query(args): Args) -> Response {
    let addr = arg(&args);
    state.peers.lock().unwrap().retain(|p| p != &addr);
    Json(json!({"Strings": [format!("disconnect {addr} success")]})).into_response()
}

async fn pubsub_pub(State(state): Shared, Query(args): Args, multipart: Multipart) -> Response {
    let topic = multibase_decode(&arg(&args)).unwrap();
    let data = file_part(multipart).await;
    state
        .published
        .lock()
        .unwrap()
        .push((String::from_utf8(topic).unwrap(), data));
    StatusCode::OK.into_response()
}

async fn pubsub_sub(State(state): Shared) -> Response {
    pause(&state.sub_delay_ms).await;
    let lines: Vec<String> = std::mem::take(&mut *state.queued.lock().unwrap());
    let mut body = lines.join("\n");
    body.push('\n');
    body.into_response()
}

/// Known peers answer every round trip in 1.5ms; unknown ones fail lookup.
async fn ping(State(state): Shared, Query(args): Args) -> Response {
    let peer = arg(&args);
    let count: usize = args.get("count").and_then(|c| c.parse().ok()).unwrap_or(10);
    let known = state
        .peers
        .lock()
        .unwrap()
        .iter()
        .any(|addr| addr.ends_with(&format!("/p2p/{peer}")));

    let mut lines = vec![json!({"Success": true, "Time": 0, "Text": format!("PING {peer}.")})];
    if known {
        lines.extend((0..count).map(|_| json!({"Success": true, "Time": 1_500_000, "Text": ""})));
        lines.push(json!({"Success": true, "Time": 0, "Text": "Average latency: 1.50ms"}));
    } else {
        lines.push(json!({"Success": false, "Time": 0, "Text": "peer lookup failed: routing: not found"}));
    }

    let mut body = lines
        .iter()
        .map(|line| line.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    body.push('\n');
    body.into_response()
}

async fn gateway(State(state): Shared, UrlPath(cid): UrlPath<String>) -> Response {
    let found = state.blobs.lock().unwrap().get(&cid).cloned();
    match found {
        Some(bytes) => bytes.into_response(),
        None => (StatusCode::NOT_FOUND, "ipfs resolve -r /ipfs/: no link named").into_response(),
    }
}
