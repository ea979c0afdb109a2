use axum::{
    body::Bytes,
    extract::State,
    response::IntoResponse,
    Extension, Json,
};
use fieldmon_core::{appended_visit, empty_document};
use serde::Serialize;
use serde_json::Value;

use super::{ApiError, AppState};
use crate::middleware::RequestId;
use crate::store::{collection_sizes, StoreError};

#[derive(Debug, Serialize)]
pub(super) struct WriteAck {
    success: bool,
}

const ACK: WriteAck = WriteAck { success: true };

/// Serves the stored document as-is. An unreadable file is served as the
/// empty document so clients can still start; writes stay refused.
pub(super) async fn get_data(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let document = state.store.read().await.unwrap_or_else(|e| {
        tracing::error!(request_id = %req_id.0, error = %e, "failed to read data file");
        empty_document()
    });
    Json(Value::Object(document))
}

/// Accepts any content type: some callers can only send `text/plain`.
pub(super) async fn post_data(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Json<WriteAck>, ApiError> {
    let patch = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(patch)) => patch,
        Ok(_) => {
            tracing::warn!(request_id = %req_id.0, "rejected ledger write that is not an object");
            return Err(ApiError::new(
                req_id.0,
                "bad_request",
                "body must be a JSON object",
            ));
        }
        Err(e) => {
            tracing::warn!(request_id = %req_id.0, error = %e, "rejected malformed ledger write");
            return Err(ApiError::new(req_id.0, "bad_request", e.to_string()));
        }
    };

    if let Some(visit) = appended_visit(&patch) {
        let Some(visit) = visit else {
            return Err(ApiError::new(
                req_id.0,
                "bad_request",
                "append_visit requires a visit",
            ));
        };
        state.store.append_visit(visit).await.map_err(|e| {
            tracing::error!(request_id = %req_id.0, error = %e, "failed to append visit log");
            ApiError::new(req_id.0.clone(), "internal_error", "failed to write data")
        })?;
        tracing::info!(
            request_id = %req_id.0,
            store_id = %visit.get("tk").unwrap_or(&serde_json::Value::Null),
            "visit appended to log"
        );
        return Ok(Json(ACK));
    }

    let merged = state.store.merge(&patch).await.map_err(|e| match &e {
        StoreError::Patch(patch_error) => {
            tracing::warn!(request_id = %req_id.0, error = %patch_error, "rejected ledger write");
            ApiError::new(req_id.0.clone(), "bad_request", patch_error.to_string())
        }
        StoreError::Corrupt { .. } => {
            tracing::error!(request_id = %req_id.0, error = %e, "refusing to overwrite unreadable data file");
            ApiError::new(
                req_id.0.clone(),
                "internal_error",
                "stored data is unreadable; write refused",
            )
        }
        StoreError::Io { .. } | StoreError::Encode(_) => {
            tracing::error!(request_id = %req_id.0, error = %e, "failed to write data file");
            ApiError::new(req_id.0.clone(), "internal_error", "failed to write data")
        }
    })?;

    let [visits, tasks, plans, store_positions] = collection_sizes(&merged).map(|(_, len)| len);
    tracing::info!(
        request_id = %req_id.0,
        visits,
        tasks,
        plans,
        store_positions,
        "ledger document written"
    );
    Ok(Json(ACK))
}
