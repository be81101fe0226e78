// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 CyberGuard Contributors

//! IPFS node passthroughs. All of these answer 501 in local-only mode.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::ApiError,
    models::{NetworkStatus, PeerRequest, PeerView, PingRequest, PingView, PublishRequest},
    state::AppState,
    storage::StoreMode,
};

#[utoipa::path(
    get,
    path = "/v1/network",
    tag = "Network",
    responses((status = 200, body = NetworkStatus))
)]
pub async fn network_status(State(state): State<AppState>) -> Result<Json<NetworkStatus>, ApiError> {
    let client = state.storage.client();
    let node = match client.mode() {
        StoreMode::Connected => Some(client.node_info().await?),
        StoreMode::Fallback => None,
    };
    Ok(Json(NetworkStatus {
        mode: client.mode(),
        node,
        gateway: client.gateway().map(str::to_string),
    }))
}

#[utoipa::path(
    get,
    path = "/v1/network/peers",
    tag = "Network",
    responses(
        (status = 200, body = [PeerView]),
        (status = 501, description = "Local-only mode")
    )
)]
pub async fn list_peers(State(state): State<AppState>) -> Result<Json<Vec<PeerView>>, ApiError> {
    let peers = state.storage.client().list_peers().await?;
    Ok(Json(
        peers
            .into_iter()
            .map(|p| PeerView {
                peer: p.peer,
                addr: p.addr,
                latency: p.latency.filter(|l| !l.is_empty()),
            })
            .collect(),
    ))
}

#[utoipa::path(
    post,
    path = "/v1/network/peers",
    request_body = PeerRequest,
    tag = "Network",
    responses((status = 204), (status = 501, description = "Local-only mode"))
)]
pub async fn connect_peer(
    State(state): State<AppState>,
    Json(request): Json<PeerRequest>,
) -> Result<StatusCode, ApiError> {
    let address = non_empty(&request.address, "address")?;
    state.storage.client().connect_peer(address).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/network/peers/disconnect",
    request_body = PeerRequest,
    tag = "Network",
    responses((status = 204), (status = 501, description = "Local-only mode"))
)]
pub async fn disconnect_peer(
    State(state): State<AppState>,
    Json(request): Json<PeerRequest>,
) -> Result<StatusCode, ApiError> {
    let address = non_empty(&request.address, "address")?;
    state.storage.client().disconnect_peer(address).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/network/ping",
    request_body = PingRequest,
    tag = "Network",
    responses(
        (status = 200, body = [PingView]),
        (status = 501, description = "Local-only mode")
    )
)]
pub async fn ping_peer(
    State(state): State<AppState>,
    Json(request): Json<PingRequest>,
) -> Result<Json<Vec<PingView>>, ApiError> {
    let peer = non_empty(&request.peer, "peer")?;
    let replies = state.storage.client().ping(peer, request.count).await?;
    Ok(Json(
        replies
            .into_iter()
            .map(|r| PingView {
                success: r.success,
                time_ms: (r.time_ns > 0).then(|| r.time_ns as f64 / 1_000_000.0),
                text: r.text,
            })
            .collect(),
    ))
}

#[utoipa::path(
    post,
    path = "/v1/network/pins/{content_id}",
    params(("content_id" = String, Path, description = "Content identifier to pin")),
    tag = "Network",
    responses((status = 204), (status = 501, description = "Local-only mode"))
)]
pub async fn pin_record(
    Path(content_id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.storage.client().pin(&content_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/v1/network/pins/{content_id}",
    params(("content_id" = String, Path, description = "Content identifier to unpin")),
    tag = "Network",
    responses((status = 204), (status = 501, description = "Local-only mode"))
)]
pub async fn unpin_record(
    Path(content_id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.storage.client().unpin(&content_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/network/publish",
    request_body = PublishRequest,
    tag = "Network",
    responses((status = 202), (status = 501, description = "Local-only mode"))
)]
pub async fn publish(
    State(state): State<AppState>,
    Json(request): Json<PublishRequest>,
) -> Result<StatusCode, ApiError> {
    let topic = non_empty(&request.topic, "topic")?;
    state
        .storage
        .client()
        .publish(topic, request.message.into_bytes())
        .await?;
    Ok(StatusCode::ACCEPTED)
}

fn non_empty<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request(format!("{field} must not be empty")));
    }
    Ok(trimmed)
}
