use crate::record::{AlertRecord, ProductDocument};

/// A change notification published by a store after a successful write.
///
/// Delivery is at-least-once: consumers must tolerate redelivery of the
/// same event.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// A product document was created, updated, or deleted.
    ///
    /// `before` is `None` when the document did not previously exist and
    /// `after` is `None` when the write was a deletion.
    ProductWritten {
        product_id: String,
        before: Option<ProductDocument>,
        after: Option<ProductDocument>,
    },

    /// A new alert record was inserted.
    AlertCreated(AlertRecord),
}

impl ChangeEvent {
    /// Short label used in log fields.
    pub fn label(&self) -> &'static str {
        match self {
            ChangeEvent::ProductWritten { .. } => "product_written",
            ChangeEvent::AlertCreated(_) => "alert_created",
        }
    }
}
