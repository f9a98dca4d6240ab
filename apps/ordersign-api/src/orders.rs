//! Order, signature, and profile persistence.
//!
//! Writes are individual statements, not transactions: recording a signature
//! and moving the order's PDF pointer are deliberately separate steps (see
//! `signing`), and reads always rebuild the full aggregate.

use crate::error::ApiError;
use crate::models::{
    CreateOrderRequest, CreateProfileRequest, Order, OrderRow, Profile, ProfileRow, Signature,
    SignatureRow,
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

pub async fn create_profile(
    db: &SqlitePool,
    id: &str,
    req: &CreateProfileRequest,
) -> Result<(), ApiError> {
    let result = sqlx::query(
        r#"
        INSERT INTO profiles (id, email, full_name, role, department)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(&req.email)
    .bind(&req.full_name)
    .bind(req.role.to_string())
    .bind(&req.department)
    .execute(db)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(ApiError::InvalidRequest(
            format!("email already registered: {}", req.email),
        )),
        Err(e) => Err(e.into()),
    }
}

pub async fn find_profile(db: &SqlitePool, id: &str) -> Result<Profile, ApiError> {
    let row: Option<ProfileRow> = sqlx::query_as(
        r#"
        SELECT id, email, full_name, role, department
        FROM profiles
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;

    row.map(Profile::from)
        .ok_or_else(|| ApiError::ProfileNotFound(id.to_string()))
}

pub async fn list_profiles(db: &SqlitePool) -> Result<Vec<Profile>, ApiError> {
    let rows: Vec<ProfileRow> = sqlx::query_as(
        r#"
        SELECT id, email, full_name, role, department
        FROM profiles
        ORDER BY full_name ASC
        "#,
    )
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().map(Profile::from).collect())
}

pub async fn create_order(
    db: &SqlitePool,
    id: &str,
    req: &CreateOrderRequest,
    document_path: &str,
    pdf_url: Option<&str>,
) -> Result<(), ApiError> {
    sqlx::query(
        r#"
        INSERT INTO orders (id, title, description, submitted_by, submitted_at, status,
                            document_path, pdf_url, department, notes)
        VALUES (?, ?, ?, ?, ?, 'pending', ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(&req.submitted_by)
    .bind(Utc::now().to_rfc3339())
    .bind(document_path)
    .bind(pdf_url)
    .bind(&req.department)
    .bind(&req.notes)
    .execute(db)
    .await?;
    Ok(())
}

/// Load every order, newest submission first, with its signatures attached
/// in application order. This is the sole read path; callers re-run it after
/// every mutation instead of patching cached state.
pub async fn load_orders(db: &SqlitePool) -> Result<Vec<Order>, ApiError> {
    let order_rows: Vec<OrderRow> = sqlx::query_as(
        r#"
        SELECT id, title, description, submitted_by, submitted_at, status,
               document_path, pdf_url, department, notes
        FROM orders
        ORDER BY submitted_at DESC, id DESC
        "#,
    )
    .fetch_all(db)
    .await?;

    let signature_rows: Vec<SignatureRow> = sqlx::query_as(
        r#"
        SELECT id, order_id, user_id, signature_data, created_at
        FROM signatures
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .fetch_all(db)
    .await?;

    let mut by_order: HashMap<String, Vec<Signature>> = HashMap::new();
    for row in signature_rows {
        by_order
            .entry(row.order_id.clone())
            .or_default()
            .push(Signature::from(row));
    }

    Ok(order_rows
        .into_iter()
        .map(|row| {
            let signatures = by_order.remove(&row.id).unwrap_or_default();
            Order::from_rows(row, signatures)
        })
        .collect())
}

pub async fn find_order(db: &SqlitePool, id: &str) -> Result<Order, ApiError> {
    load_orders(db)
        .await?
        .into_iter()
        .find(|order| order.id == id)
        .ok_or_else(|| ApiError::OrderNotFound(id.to_string()))
}

/// Record one signer's consent. Immutable; a correction means a new row.
pub async fn insert_signature(
    db: &SqlitePool,
    order_id: &str,
    user_id: &str,
    signature_data: &str,
) -> Result<SignatureRow, ApiError> {
    let order_exists: Option<(String,)> = sqlx::query_as("SELECT id FROM orders WHERE id = ?")
        .bind(order_id)
        .fetch_optional(db)
        .await?;
    if order_exists.is_none() {
        return Err(ApiError::OrderNotFound(order_id.to_string()));
    }

    let row = SignatureRow {
        id: Uuid::new_v4().to_string(),
        order_id: order_id.to_string(),
        user_id: user_id.to_string(),
        signature_data: signature_data.to_string(),
        created_at: Utc::now(),
    };

    let result = sqlx::query(
        r#"
        INSERT INTO signatures (id, order_id, user_id, signature_data, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&row.id)
    .bind(&row.order_id)
    .bind(&row.user_id)
    .bind(&row.signature_data)
    .bind(row.created_at.to_rfc3339())
    .execute(db)
    .await;

    match result {
        Ok(_) => Ok(row),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(ApiError::DuplicateSignature)
        }
        Err(e) => Err(e.into()),
    }
}

/// Move the order's pointer to its latest signed artifact. Independent of
/// `insert_signature` by design; last writer wins.
pub async fn update_pdf_url(
    db: &SqlitePool,
    order_id: &str,
    new_url: &str,
) -> Result<(), ApiError> {
    let result = sqlx::query("UPDATE orders SET pdf_url = ? WHERE id = ?")
        .bind(new_url)
        .bind(order_id)
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::OrderNotFound(order_id.to_string()));
    }
    Ok(())
}

/// Administrative terminal rejection.
pub async fn set_rejected(db: &SqlitePool, order_id: &str) -> Result<(), ApiError> {
    let result = sqlx::query("UPDATE orders SET status = 'rejected' WHERE id = ?")
        .bind(order_id)
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::OrderNotFound(order_id.to_string()));
    }
    Ok(())
}

/// Remove an order and its signature records. Storage artifacts are the
/// caller's responsibility.
pub async fn delete_order(db: &SqlitePool, order_id: &str) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM signatures WHERE order_id = ?")
        .bind(order_id)
        .execute(db)
        .await?;
    let result = sqlx::query("DELETE FROM orders WHERE id = ?")
        .bind(order_id)
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::OrderNotFound(order_id.to_string()));
    }
    Ok(())
}
