// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 CyberGuard Contributors

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::ApiError,
    models::{RetrieveRecordResponse, StoreRecordRequest, StoreRecordResponse},
    state::AppState,
    storage::{IndexEntry, IndexQuery, IndexStats, RetrieveOptions, SortOrder},
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListQuery {
    /// Only records of this type.
    #[serde(rename = "type")]
    pub record_type: Option<String>,
    /// Case-insensitive match on identifier or metadata.
    pub search: Option<String>,
    /// `newest_first` (default) or `oldest_first`.
    #[param(value_type = Option<String>)]
    pub order: Option<SortOrder>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RetrieveQuery {
    /// Decrypt even when the record is not in the local index.
    pub assume_encrypted: Option<bool>,
}

#[utoipa::path(
    get,
    path = "/v1/storage",
    params(ListQuery),
    tag = "Storage",
    responses((status = 200, body = [IndexEntry]))
)]
pub async fn list_records(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<IndexEntry>>, ApiError> {
    let query = IndexQuery {
        record_type: params.record_type,
        search: params.search,
        order: params.order.unwrap_or_default(),
    };
    Ok(Json(state.storage.query(&query)?))
}

#[utoipa::path(
    post,
    path = "/v1/storage",
    request_body = StoreRecordRequest,
    tag = "Storage",
    responses(
        (status = 201, body = StoreRecordResponse),
        (status = 503, description = "Neither the IPFS node nor the local store accepted the record")
    )
)]
pub async fn store_record(
    State(state): State<AppState>,
    Json(request): Json<StoreRecordRequest>,
) -> Result<(StatusCode, Json<StoreRecordResponse>), ApiError> {
    let stored = state
        .storage
        .store(&request.payload, request.metadata, request.encrypt)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(StoreRecordResponse {
            content_id: stored.content_id,
            metadata: stored.metadata,
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/v1/storage",
    tag = "Storage",
    responses((status = 204))
)]
pub async fn clear_records(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.storage.clear_all()?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/storage/stats",
    tag = "Storage",
    responses((status = 200, body = IndexStats))
)]
pub async fn storage_stats(State(state): State<AppState>) -> Result<Json<IndexStats>, ApiError> {
    Ok(Json(state.storage.stats()?))
}

#[utoipa::path(
    get,
    path = "/v1/storage/{content_id}",
    params(
        ("content_id" = String, Path, description = "Content identifier of the record"),
        RetrieveQuery
    ),
    tag = "Storage",
    responses(
        (status = 200, body = RetrieveRecordResponse),
        (status = 404, description = "Unknown content identifier"),
        (status = 422, description = "Record could not be decrypted")
    )
)]
pub async fn get_record(
    Path(content_id): Path<String>,
    State(state): State<AppState>,
    Query(params): Query<RetrieveQuery>,
) -> Result<Json<RetrieveRecordResponse>, ApiError> {
    let options = RetrieveOptions {
        assume_encrypted: params.assume_encrypted.unwrap_or(false),
    };
    let record = state.storage.retrieve_with(&content_id, options).await?;
    Ok(Json(RetrieveRecordResponse {
        value: record.value,
        metadata: record.metadata,
    }))
}

#[utoipa::path(
    delete,
    path = "/v1/storage/{content_id}",
    params(
        ("content_id" = String, Path, description = "Content identifier to stop tracking")
    ),
    tag = "Storage",
    responses((status = 204))
)]
pub async fn delete_record(
    Path(content_id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.storage.delete(&content_id)?;
    Ok(StatusCode::NO_CONTENT)
}
