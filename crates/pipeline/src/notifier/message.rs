use stockwatch_storage::AlertRecord;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// The rendered subject and bodies of a low-stock notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowStockMessage {
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl LowStockMessage {
    /// Render the notification for `alert`, stamped with `sent_at`.
    pub fn render(alert: &AlertRecord, store_name: &str, sent_at: OffsetDateTime) -> Self {
        let name = alert.product_name.as_str();
        let when = sent_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| sent_at.unix_timestamp().to_string());

        let subject = format!("Low stock: {} ({} left)", name, alert.inventory);
        let text = format!(
            "Low stock alert\n\nProduct: {}\nInventory: {}\nTime: {}\n",
            name, alert.inventory, when
        );
        let html = format!(
            "<h2>Low stock alert</h2>\
             <p><strong>Product:</strong> {}<br/>\
             <strong>Inventory:</strong> {}<br/>\
             <strong>Time:</strong> {}</p>\
             <p><em>This was generated automatically by {}.</em></p>",
            escape_html(name),
            alert.inventory,
            escape_html(&when),
            escape_html(store_name)
        );

        Self {
            subject,
            text,
            html,
        }
    }
}

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
