//! Data models for the order approval API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Signatures required before an order counts as approved.
pub const REQUIRED_SIGNATURES: usize = 2;

/// Roles a profile can hold. Staff submit orders; the other three sign them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Staff,
    Director,
    Secretary,
    Responsible,
}

impl UserRole {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "staff" => Some(UserRole::Staff),
            "director" => Some(UserRole::Director),
            "secretary" => Some(UserRole::Secretary),
            "responsible" => Some(UserRole::Responsible),
            _ => None,
        }
    }

    pub fn may_submit(self) -> bool {
        matches!(self, UserRole::Staff)
    }

    pub fn may_sign(self) -> bool {
        matches!(
            self,
            UserRole::Director | UserRole::Secretary | UserRole::Responsible
        )
    }

    /// Fixed stamp anchor for each role, from the page's bottom-left origin.
    /// Staff cannot sign, so its entry doubles as the fallback slot.
    pub fn placement(self) -> (f64, f64) {
        match self {
            UserRole::Director => (400.0, 100.0),
            UserRole::Secretary => (400.0, 200.0),
            UserRole::Responsible => (400.0, 300.0),
            UserRole::Staff => (400.0, 400.0),
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Staff => write!(f, "staff"),
            UserRole::Director => write!(f, "director"),
            UserRole::Secretary => write!(f, "secretary"),
            UserRole::Responsible => write!(f, "responsible"),
        }
    }
}

/// Order lifecycle status.
///
/// Apart from the administrative `rejected` marker, status is never written
/// by hand: it is derived from the signature count on every load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Approved,
    Rejected,
}

impl OrderStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "processing" => Some(OrderStatus::Processing),
            "approved" => Some(OrderStatus::Approved),
            "rejected" => Some(OrderStatus::Rejected),
            _ => None,
        }
    }

    /// Pure derivation from how many signatures have been collected.
    pub fn derive(signature_count: usize) -> Self {
        match signature_count {
            0 => OrderStatus::Pending,
            n if n < REQUIRED_SIGNATURES => OrderStatus::Processing,
            _ => OrderStatus::Approved,
        }
    }

    /// Finalized orders accept no further signatures.
    pub fn is_final(self) -> bool {
        matches!(self, OrderStatus::Approved | OrderStatus::Rejected)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Processing => write!(f, "processing"),
            OrderStatus::Approved => write!(f, "approved"),
            OrderStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// A user profile.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub department: String,
}

/// One approver's recorded consent, immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct Signature {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    pub signature_data: String,
    pub created_at: DateTime<Utc>,
}

/// An order with its signatures eagerly attached, as the dashboard sees it.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: String,
    pub title: String,
    pub description: String,
    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub document_path: String,
    pub pdf_url: Option<String>,
    pub department: String,
    pub notes: Option<String>,
    pub signatures: Vec<Signature>,
}

impl Order {
    /// Assemble the view model; status is recomputed here, never trusted
    /// from the row except for the terminal `rejected` marker.
    pub fn from_rows(row: OrderRow, signatures: Vec<Signature>) -> Self {
        let status = match OrderStatus::parse(&row.status) {
            Some(OrderStatus::Rejected) => OrderStatus::Rejected,
            _ => OrderStatus::derive(signatures.len()),
        };
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            submitted_by: row.submitted_by,
            submitted_at: row.submitted_at,
            status,
            document_path: row.document_path,
            pdf_url: row.pdf_url,
            department: row.department,
            notes: row.notes,
            signatures,
        }
    }
}

/// Order row as stored.
#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
    pub status: String,
    pub document_path: String,
    pub pdf_url: Option<String>,
    pub department: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SignatureRow {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    pub signature_data: String,
    pub created_at: DateTime<Utc>,
}

impl From<SignatureRow> for Signature {
    fn from(row: SignatureRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            user_id: row.user_id,
            signature_data: row.signature_data,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ProfileRow {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub department: String,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            // Unknown roles fall back to the least-privileged one.
            role: UserRole::parse(&row.role).unwrap_or(UserRole::Staff),
            department: row.department,
        }
    }
}

/// Request to create a profile
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProfileRequest {
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub department: String,
}

/// Request to submit a new order
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub title: String,
    pub description: String,
    pub department: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub submitted_by: String,
    pub document_name: String,
    pub document_base64: String,
}

/// Request to sign an order
#[derive(Debug, Clone, Deserialize)]
pub struct SignOrderRequest {
    pub signer_id: String,
    /// PNG raster, either bare base64 or a `data:image/png;base64,` URL.
    pub signature_data: String,
}
