// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 CyberGuard Contributors

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        NetworkStatus, PeerRequest, PeerView, PingRequest, PingView, PublishRequest,
        RetrieveRecordResponse, StoreRecordRequest, StoreRecordResponse,
    },
    state::AppState,
    storage::{IndexEntry, IndexStats, NodeInfo, RecordMetadata, StorageMethod, StoreMode},
};

pub mod health;
pub mod network;
pub mod storage;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route(
            "/storage",
            get(storage::list_records)
                .post(storage::store_record)
                .delete(storage::clear_records),
        )
        .route("/storage/stats", get(storage::storage_stats))
        .route(
            "/storage/{content_id}",
            get(storage::get_record).delete(storage::delete_record),
        )
        .route("/network", get(network::network_status))
        .route(
            "/network/peers",
            get(network::list_peers).post(network::connect_peer),
        )
        .route("/network/peers/disconnect", post(network::disconnect_peer))
        .route("/network/ping", post(network::ping_peer))
        .route(
            "/network/pins/{content_id}",
            post(network::pin_record).delete(network::unpin_record),
        )
        .route("/network/publish", post(network::publish))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        storage::list_records,
        storage::store_record,
        storage::clear_records,
        storage::storage_stats,
        storage::get_record,
        storage::delete_record,
        network::network_status,
        network::list_peers,
        network::connect_peer,
        network::disconnect_peer,
        network::ping_peer,
        network::pin_record,
        network::unpin_record,
        network::publish
    ),
    components(
        schemas(
            IndexEntry,
            IndexStats,
            RecordMetadata,
            StorageMethod,
            StoreMode,
            NodeInfo,
            StoreRecordRequest,
            StoreRecordResponse,
            RetrieveRecordResponse,
            NetworkStatus,
            PeerView,
            PeerRequest,
            PingRequest,
            PingView,
            PublishRequest,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Storage", description = "Encrypted record storage and the local index"),
        (name = "Network", description = "IPFS node, peers, pins and pubsub")
    )
)]
struct ApiDoc;
