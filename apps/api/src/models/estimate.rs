use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::lenient;

/// A fully-resolved estimate as handed over by the CRUD layer.
///
/// Stored aggregates (`subtotal`, `tax`, `total`) may be stale or zero and are
/// only ever read through `compose::finance::reconcile`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateRecord {
    #[serde(default, deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::bag")]
    pub project: Project,
    #[serde(default, alias = "items", deserialize_with = "lenient::list")]
    pub line_items: Vec<LineItem>,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub subtotal: f64,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub tax: f64,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub total: f64,
    /// Profit margin in percent (10 means 10%).
    #[serde(default, alias = "profitMarginPercent", deserialize_with = "lenient::amount")]
    pub profit_margin: f64,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub labor_cost: f64,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub notes: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`; rendered as the document date.
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub name: Option<String>,
    /// Free-form bag; carries the template configuration.
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub quantity: f64,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub unit_cost: f64,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub subtotal: f64,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub tax: f64,
}
