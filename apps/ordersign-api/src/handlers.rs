//! HTTP handlers for the order approval API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::*;
use crate::orders;
use crate::signing;
use crate::state::AppState;
use crate::storage::{self, UploadOptions};

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

pub async fn create_profile(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProfileRequest>,
) -> Result<(StatusCode, Json<Profile>), ApiError> {
    let id = Uuid::new_v4().to_string();
    orders::create_profile(&state.db, &id, &req).await?;
    let profile = orders::find_profile(&state.db, &id).await?;
    tracing::info!(profile = %id, role = %profile.role, "created profile");
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn list_profiles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Profile>>, ApiError> {
    Ok(Json(orders::list_profiles(&state.db).await?))
}

/// Submit a new order: upload the document, then record the order pointing
/// at its public URL.
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let submitter = orders::find_profile(&state.db, &req.submitted_by).await?;
    if !submitter.role.may_submit() {
        return Err(ApiError::Forbidden);
    }

    let bytes = BASE64
        .decode(&req.document_base64)
        .map_err(|e| ApiError::InvalidRequest(format!("invalid document base64: {e}")))?;
    if !bytes.starts_with(b"%PDF-") {
        return Err(ApiError::InvalidRequest(
            "document is not a PDF".to_string(),
        ));
    }

    let key = format!(
        "orders/{}-{}",
        Utc::now().timestamp_millis(),
        sanitize_file_name(&req.document_name)
    );
    state.store.upload(&key, &bytes, &UploadOptions::pdf())?;
    let pdf_url = state.store.public_url(&key);

    let id = Uuid::new_v4().to_string();
    orders::create_order(&state.db, &id, &req, &key, Some(&pdf_url)).await?;
    tracing::info!(order = %id, department = %req.department, "created order");

    let order = orders::find_order(&state.db, &id).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(orders::load_orders(&state.db).await?))
}

pub async fn sign_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SignOrderRequest>,
) -> Result<Json<Order>, ApiError> {
    let order = signing::apply_signature(&state, &id, &req).await?;
    Ok(Json(order))
}

pub async fn reject_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    orders::set_rejected(&state.db, &id).await?;
    tracing::info!(order = %id, "order rejected");
    Ok(Json(orders::find_order(&state.db, &id).await?))
}

/// Delete an order together with its signature records and storage
/// artifacts.
pub async fn delete_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let order = orders::find_order(&state.db, &id).await?;

    state.store.remove(&order.document_path);
    if let Some(url) = &order.pdf_url {
        if let Some(key) = state.store.key_for_url(url) {
            state.store.remove(&key);
        }
    }
    orders::delete_order(&state.db, &id).await?;
    tracing::info!(order = %id, "order deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Serve artifact bytes for a public storage URL.
pub async fn get_artifact(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<(StatusCode, [(String, String); 1], Vec<u8>), ApiError> {
    let bytes = state.store.read(&key)?;
    Ok((
        StatusCode::OK,
        [(
            "Content-Type".to_string(),
            storage::content_type_for(&key).to_string(),
        )],
        bytes,
    ))
}

/// Keep uploaded file names path-safe inside a storage key.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.trim_matches('-').is_empty() {
        "document.pdf".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("budget q1.pdf"), "budget-q1.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "..-..-etc-passwd");
        assert_eq!(sanitize_file_name("///"), "document.pdf");
        assert_eq!(sanitize_file_name("report_v2.pdf"), "report_v2.pdf");
    }
}
