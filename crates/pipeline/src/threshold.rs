//! Low-stock threshold crossing detection.
//!
//! A crossing is a write that takes a product from untracked, or from at or
//! above the threshold, to strictly below it. Repeated writes below the
//! threshold are not crossings. Suppressing duplicate alerts while one is
//! open is the alert book's job, not this module's.
//!
//! Inventory is a whole number of units. A fractional value such as `4.5`
//! is read as "not a number", so a write that sets one never crosses.

use stockwatch_storage::ProductDocument;

/// Threshold used when none is configured.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// Result of evaluating one product write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The write crossed below the threshold; `inventory` is the new value.
    Crossing { inventory: i64 },
    NoCrossing,
}

impl Verdict {
    pub fn is_crossing(&self) -> bool {
        matches!(self, Verdict::Crossing { .. })
    }
}

/// Decide whether a write from `before` to `after` crossed below `threshold`.
///
/// `before` is `None` when the product was not previously tracked; `after`
/// is `None` when the product was deleted or its inventory is not a number.
pub fn evaluate(before: Option<i64>, after: Option<i64>, threshold: i64) -> Verdict {
    let Some(after) = after else {
        return Verdict::NoCrossing;
    };
    if before == Some(after) {
        return Verdict::NoCrossing;
    }
    let was_at_or_above = before.map_or(true, |before| before >= threshold);
    if was_at_or_above && after < threshold {
        Verdict::Crossing { inventory: after }
    } else {
        Verdict::NoCrossing
    }
}

/// Read the `inventory` field of a product document.
///
/// Integers and integral floats count; strings, fractional values, and a
/// missing field do not.
pub fn inventory_of(document: &ProductDocument) -> Option<i64> {
    let value = document.get("inventory")?;
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Read the `name` field of a product document, if it is a non-empty string.
pub fn product_name(document: &ProductDocument) -> Option<&str> {
    document
        .get("name")
        .and_then(|v| v.as_str())
        .filter(|name| !name.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: i64 = DEFAULT_LOW_STOCK_THRESHOLD;

    fn doc(value: serde_json::Value) -> ProductDocument {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn falling_from_above_is_a_crossing() {
        assert_eq!(
            evaluate(Some(10), Some(3), T),
            Verdict::Crossing { inventory: 3 }
        );
    }

    #[test]
    fn falling_from_exactly_threshold_is_a_crossing() {
        assert!(evaluate(Some(5), Some(4), T).is_crossing());
    }

    #[test]
    fn untracked_product_created_low_is_a_crossing() {
        assert!(evaluate(None, Some(0), T).is_crossing());
    }

    #[test]
    fn staying_below_is_not_a_crossing() {
        assert_eq!(evaluate(Some(3), Some(2), T), Verdict::NoCrossing);
    }

    #[test]
    fn landing_on_threshold_is_not_a_crossing() {
        assert_eq!(evaluate(Some(9), Some(5), T), Verdict::NoCrossing);
    }

    #[test]
    fn deletion_is_not_a_crossing() {
        assert_eq!(evaluate(Some(10), None, T), Verdict::NoCrossing);
        assert_eq!(evaluate(None, None, T), Verdict::NoCrossing);
    }

    #[test]
    fn unchanged_inventory_is_not_a_crossing() {
        assert_eq!(evaluate(Some(2), Some(2), T), Verdict::NoCrossing);
        assert_eq!(evaluate(Some(7), Some(7), T), Verdict::NoCrossing);
    }

    #[test]
    fn oscillation_crosses_again() {
        assert!(evaluate(Some(10), Some(3), T).is_crossing());
        assert!(!evaluate(Some(3), Some(8), T).is_crossing());
        assert!(evaluate(Some(8), Some(1), T).is_crossing());
    }

    #[test]
    fn crossing_matches_definition_over_a_grid() {
        let values: Vec<Option<i64>> = std::iter::once(None)
            .chain((-2..=12).map(Some))
            .collect();
        for threshold in [1, 5, 10] {
            for &before in &values {
                for &after in &values {
                    let expected = match after {
                        Some(a) => a < threshold && before.map_or(true, |b| b >= threshold),
                        None => false,
                    };
                    assert_eq!(
                        evaluate(before, after, threshold).is_crossing(),
                        expected,
                        "before={before:?} after={after:?} threshold={threshold}"
                    );
                }
            }
        }
    }

    #[test]
    fn inventory_of_accepts_integral_numbers_only() {
        assert_eq!(inventory_of(&doc(serde_json::json!({"inventory": 4}))), Some(4));
        assert_eq!(inventory_of(&doc(serde_json::json!({"inventory": 4.0}))), Some(4));
        assert_eq!(inventory_of(&doc(serde_json::json!({"inventory": 4.5}))), None);
        assert_eq!(inventory_of(&doc(serde_json::json!({"inventory": "4"}))), None);
        assert_eq!(inventory_of(&doc(serde_json::json!({"inventory": null}))), None);
        assert_eq!(inventory_of(&doc(serde_json::json!({"name": "x"}))), None);
    }

    #[test]
    fn fractional_inventory_never_crosses() {
        let before = doc(serde_json::json!({"inventory": 10}));
        let after = doc(serde_json::json!({"inventory": 4.5}));
        let verdict = evaluate(inventory_of(&before), inventory_of(&after), T);
        assert_eq!(verdict, Verdict::NoCrossing);
    }

    #[test]
    fn product_name_skips_blank_values() {
        assert_eq!(
            product_name(&doc(serde_json::json!({"name": "Shea Butter"}))),
            Some("Shea Butter")
        );
        assert_eq!(product_name(&doc(serde_json::json!({"name": "  "}))), None);
        assert_eq!(product_name(&doc(serde_json::json!({"name": 12}))), None);
    }
}
