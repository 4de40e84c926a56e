//! Financial Reconciler — derives the totals both renderers display.
//!
//! Stored aggregates on an estimate are written by the CRUD layer and are
//! frequently stale or zero, so they are only trusted when positive. Every
//! branch has a numeric fallback; nothing here can fail.

use serde::Serialize;

use crate::models::EstimateRecord;

/// Authoritative totals for one render.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FinancialSummary {
    pub subtotal: f64,
    pub tax: f64,
    pub labor_cost: f64,
    pub profit_margin_amount: f64,
    pub total: f64,
    /// Whether the tax line is printed under the items table.
    pub tax_visible: bool,
}

/// Negative and non-finite inputs are treated as zero.
fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Reconciles the estimate's stored aggregates against its line items.
///
/// Algorithm:
/// 1. computed subtotal = Σ line-item subtotals
/// 2. subtotal = stored subtotal if > 0, else computed
/// 3. tax = stored tax; recomputed as `subtotal × rate / 100` when tax is
///    enabled, stored tax is 0 and subtotal > 0. The rate is the explicit tax
///    rate, else the profit-margin percent.
/// 4. labor = stored labor cost
/// 5. margin amount = (subtotal + tax + labor) × margin / 100 when margin > 0
/// 6. total = stored total if > 0, else subtotal + tax + labor + margin amount
pub fn reconcile(
    estimate: &EstimateRecord,
    tax_enabled: bool,
    tax_rate_percent: Option<f64>,
) -> FinancialSummary {
    let computed_subtotal: f64 = estimate
        .line_items
        .iter()
        .map(|item| non_negative(item.subtotal))
        .sum();

    let stored_subtotal = non_negative(estimate.subtotal);
    let subtotal = if stored_subtotal > 0.0 {
        stored_subtotal
    } else {
        computed_subtotal
    };

    let margin_percent = non_negative(estimate.profit_margin);
    let stored_tax = non_negative(estimate.tax);
    let tax = if tax_enabled && stored_tax == 0.0 && subtotal > 0.0 {
        // Falls back to the margin percent when no explicit rate is configured.
        let rate = tax_rate_percent.map(non_negative).unwrap_or(margin_percent);
        subtotal * rate / 100.0
    } else {
        stored_tax
    };

    let labor_cost = non_negative(estimate.labor_cost);

    let profit_margin_amount = if margin_percent > 0.0 {
        (subtotal + tax + labor_cost) * margin_percent / 100.0
    } else {
        0.0
    };

    let stored_total = non_negative(estimate.total);
    let total = if stored_total > 0.0 {
        stored_total
    } else {
        subtotal + tax + labor_cost + profit_margin_amount
    };

    FinancialSummary {
        subtotal,
        tax,
        labor_cost,
        profit_margin_amount,
        total,
        tax_visible: tax > 0.0 && (tax_enabled || stored_tax > 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LineItem;

    fn item(subtotal: f64) -> LineItem {
        LineItem {
            description: Some("Item".to_string()),
            quantity: 1.0,
            unit_cost: subtotal,
            subtotal,
            ..Default::default()
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_zero_items_total_is_labor_cost() {
        let estimate = EstimateRecord {
            labor_cost: 40.0,
            ..Default::default()
        };
        let summary = reconcile(&estimate, false, None);

        assert_eq!(summary.subtotal, 0.0);
        assert_eq!(summary.tax, 0.0);
        assert!(approx(summary.total, 40.0));
        assert!(!summary.tax_visible);
    }

    #[test]
    fn test_tax_falls_back_to_profit_margin_percent() {
        let estimate = EstimateRecord {
            line_items: vec![item(100.0), item(50.0), item(25.0)],
            profit_margin: 10.0,
            ..Default::default()
        };
        let summary = reconcile(&estimate, true, None);

        assert!(approx(summary.subtotal, 175.0));
        assert!(approx(summary.tax, 17.5));
        assert!(summary.tax_visible);
    }

    #[test]
    fn test_explicit_tax_rate_wins_over_margin() {
        let estimate = EstimateRecord {
            line_items: vec![item(200.0)],
            profit_margin: 10.0,
            ..Default::default()
        };
        let summary = reconcile(&estimate, true, Some(5.0));
        assert!(approx(summary.tax, 10.0));
    }

    #[test]
    fn test_stored_tax_is_kept_when_nonzero() {
        let estimate = EstimateRecord {
            line_items: vec![item(200.0)],
            tax: 12.0,
            ..Default::default()
        };
        let summary = reconcile(&estimate, true, Some(5.0));
        assert!(approx(summary.tax, 12.0));
        // Stored tax is shown even when tax is not enabled in the template.
        assert!(reconcile(&estimate, false, None).tax_visible);
    }

    #[test]
    fn test_tax_disabled_never_recomputes() {
        let estimate = EstimateRecord {
            line_items: vec![item(200.0)],
            ..Default::default()
        };
        let summary = reconcile(&estimate, false, Some(5.0));
        assert_eq!(summary.tax, 0.0);
        assert!(!summary.tax_visible);
    }

    #[test]
    fn test_stored_subtotal_preferred_when_positive() {
        let estimate = EstimateRecord {
            line_items: vec![item(100.0)],
            subtotal: 120.0,
            ..Default::default()
        };
        assert!(approx(reconcile(&estimate, false, None).subtotal, 120.0));
    }

    #[test]
    fn test_total_includes_margin_amount_when_recomputed() {
        let estimate = EstimateRecord {
            line_items: vec![item(100.0)],
            labor_cost: 100.0,
            profit_margin: 10.0,
            ..Default::default()
        };
        let summary = reconcile(&estimate, false, None);
        assert!(approx(summary.profit_margin_amount, 20.0));
        assert!(approx(summary.total, 220.0));
    }

    #[test]
    fn test_stored_total_preferred_when_positive() {
        let estimate = EstimateRecord {
            line_items: vec![item(100.0)],
            total: 999.0,
            ..Default::default()
        };
        assert!(approx(reconcile(&estimate, false, None).total, 999.0));
    }

    #[test]
    fn test_negative_inputs_clamped() {
        let estimate = EstimateRecord {
            line_items: vec![item(-50.0), item(30.0)],
            labor_cost: -10.0,
            profit_margin: -5.0,
            tax: -3.0,
            total: -1.0,
            ..Default::default()
        };
        let summary = reconcile(&estimate, false, None);
        assert!(approx(summary.subtotal, 30.0));
        assert_eq!(summary.labor_cost, 0.0);
        assert_eq!(summary.tax, 0.0);
        assert_eq!(summary.profit_margin_amount, 0.0);
        assert!(approx(summary.total, 30.0));
    }

    #[test]
    fn test_reconcile_is_a_fixed_point() {
        let cases = [
            (
                EstimateRecord {
                    line_items: vec![item(100.0), item(50.0), item(25.0)],
                    profit_margin: 10.0,
                    labor_cost: 60.0,
                    ..Default::default()
                },
                true,
                None,
            ),
            (
                EstimateRecord {
                    line_items: vec![item(80.0)],
                    tax: 4.0,
                    ..Default::default()
                },
                false,
                Some(7.0),
            ),
            (
                EstimateRecord {
                    labor_cost: 40.0,
                    ..Default::default()
                },
                true,
                Some(8.0),
            ),
        ];

        for (estimate, tax_enabled, rate) in cases {
            let first = reconcile(&estimate, tax_enabled, rate);
            let fed_back = EstimateRecord {
                subtotal: first.subtotal,
                tax: first.tax,
                total: first.total,
                labor_cost: first.labor_cost,
                ..estimate.clone()
            };
            let second = reconcile(&fed_back, tax_enabled, rate);
            assert_eq!(first, second);
        }
    }
}
