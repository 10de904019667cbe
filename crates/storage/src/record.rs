use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A product as stored by the catalog: a free-form JSON object.
///
/// The alerting pipeline only reads `name` and `inventory`.
pub type ProductDocument = serde_json::Map<String, serde_json::Value>;

/// The kind of an alert record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    LowStock,
    /// Any alert type not produced by this pipeline.
    #[serde(other)]
    Other,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::LowStock => "low_stock",
            AlertKind::Other => "other",
        }
    }
}

/// An alert record as stored in the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    /// Store-assigned identifier.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub product_id: String,
    /// Product name captured at creation time. Not refreshed on rename.
    pub product_name: String,
    /// Inventory captured at creation time.
    pub inventory: i64,
    pub resolved: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub resolved_at: Option<OffsetDateTime>,
}

/// The fields of an alert before the store assigns it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub kind: AlertKind,
    pub product_id: String,
    pub product_name: String,
    pub inventory: i64,
    pub created_at: OffsetDateTime,
}

impl NewAlert {
    pub(crate) fn into_record(self, id: String) -> AlertRecord {
        AlertRecord {
            id,
            kind: self.kind,
            product_id: self.product_id,
            product_name: self.product_name,
            inventory: self.inventory,
            resolved: false,
            created_at: self.created_at,
            resolved_at: None,
        }
    }
}

/// Outcome of a guarded alert insert.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertInsert {
    /// No unresolved alert of the same kind existed; this one was written.
    Inserted(AlertRecord),
    /// An unresolved alert already exists for the product; nothing was written.
    AlreadyOpen(AlertRecord),
}

/// A notification recipient registry entry.
///
/// Entries toggled before ever being granted carry an empty `email` and are
/// skipped by recipient resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientRecord {
    /// External identity id.
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub notify: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub created_at: Option<OffsetDateTime>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub updated_at: Option<OffsetDateTime>,
}
