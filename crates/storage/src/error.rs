/// All errors that can be returned by a StockStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No product document with the given id.
    #[error("product not found: {product_id}")]
    ProductNotFound { product_id: String },

    /// No alert record with the given id.
    #[error("alert not found: {alert_id}")]
    AlertNotFound { alert_id: String },

    /// No recipient registry entry with the given id.
    #[error("recipient not found: {recipient_id}")]
    RecipientNotFound { recipient_id: String },

    /// A document could not be stored or decoded (bad shape, serialization).
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// A backend-specific storage error (connection, lock poisoning, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
