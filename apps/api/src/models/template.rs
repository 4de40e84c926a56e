//! Template configuration: the user-authored layout preferences stored in a
//! project's metadata bag. Every field is optional.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::models::lenient;

// ────────────────────────────────────────────────────────────────────────────
// Section descriptors
// ────────────────────────────────────────────────────────────────────────────

/// The closed set of configurable section ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionId {
    JobSummary,
    ProjectInfo,
    ItemsTable,
    PaymentMethod,
    ContactInfo,
}

impl SectionId {
    pub const ALL: [SectionId; 5] = [
        SectionId::JobSummary,
        SectionId::ProjectInfo,
        SectionId::ItemsTable,
        SectionId::PaymentMethod,
        SectionId::ContactInfo,
    ];

    /// Unknown ids return `None` and are skipped by the planner.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "jobSummary" => Some(SectionId::JobSummary),
            "projectInfo" => Some(SectionId::ProjectInfo),
            "itemsTable" => Some(SectionId::ItemsTable),
            "paymentMethod" => Some(SectionId::PaymentMethod),
            "contactInfo" => Some(SectionId::ContactInfo),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionId::JobSummary => "jobSummary",
            SectionId::ProjectInfo => "projectInfo",
            SectionId::ItemsTable => "itemsTable",
            SectionId::PaymentMethod => "paymentMethod",
            SectionId::ContactInfo => "contactInfo",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDescriptor {
    /// Kept raw so that ids added by newer clients deserialize and are ignored.
    #[serde(default, deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(default = "enabled_by_default", deserialize_with = "lenient::flag_default_on")]
    pub enabled: bool,
    #[serde(default, deserialize_with = "lenient::order")]
    pub order: i64,
}

fn enabled_by_default() -> bool {
    true
}

impl SectionDescriptor {
    pub fn new(id: SectionId, enabled: bool, order: i64) -> Self {
        Self {
            id: id.as_str().to_string(),
            enabled,
            order,
        }
    }

    pub fn section_id(&self) -> Option<SectionId> {
        SectionId::parse(&self.id)
    }
}

/// Sections used when the configuration has no `sections` key at all.
pub fn default_sections() -> Vec<SectionDescriptor> {
    SectionId::ALL
        .iter()
        .zip(1..)
        .map(|(id, order)| SectionDescriptor::new(*id, true, order))
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Field bags
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderConfig {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub company_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub tagline: Option<String>,
    /// Data URI or remote URL.
    #[serde(default, alias = "logoUrl", deserialize_with = "lenient::opt_text")]
    pub logo: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub estimate_number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummaryConfig {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub scope: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfoConfig {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub project_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub client_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub client_phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub client_email: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodConfig {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub bank_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub account_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub account_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub routing_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub payment_terms: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub instructions: Option<String>,
}

impl PaymentMethodConfig {
    pub fn has_content(&self) -> bool {
        [
            &self.bank_name,
            &self.account_name,
            &self.account_number,
            &self.routing_number,
            &self.payment_terms,
            &self.instructions,
        ]
        .iter()
        .any(|field| is_populated(field))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfoConfig {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub website: Option<String>,
}

impl ContactInfoConfig {
    pub fn has_content(&self) -> bool {
        [
            &self.name,
            &self.phone,
            &self.email,
            &self.address,
            &self.website,
        ]
        .iter()
        .any(|field| is_populated(field))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureConfig {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub date: Option<String>,
    /// Data URI or remote URL of a signature image.
    #[serde(default, alias = "imageUrl", deserialize_with = "lenient::opt_text")]
    pub image: Option<String>,
}

/// True when the field is present and not blank.
pub fn is_populated(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.trim().is_empty())
}

// ────────────────────────────────────────────────────────────────────────────
// Template configuration
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateConfig {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub theme: Option<String>,
    #[serde(default, deserialize_with = "lenient::bag")]
    pub header: HeaderConfig,
    #[serde(default = "default_sections", deserialize_with = "sections")]
    pub sections: Vec<SectionDescriptor>,
    #[serde(default, deserialize_with = "lenient::bag")]
    pub job_summary: JobSummaryConfig,
    #[serde(default, deserialize_with = "lenient::bag")]
    pub project_info: ProjectInfoConfig,
    #[serde(default, deserialize_with = "lenient::bag")]
    pub payment_method: PaymentMethodConfig,
    #[serde(default, deserialize_with = "lenient::bag")]
    pub contact_info: ContactInfoConfig,
    #[serde(default, deserialize_with = "lenient::bag")]
    pub signature: SignatureConfig,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub tax_enabled: bool,
    #[serde(default, alias = "taxRate", deserialize_with = "lenient::opt_amount")]
    pub tax_rate_percent: Option<f64>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            theme: None,
            header: HeaderConfig::default(),
            sections: default_sections(),
            job_summary: JobSummaryConfig::default(),
            project_info: ProjectInfoConfig::default(),
            payment_method: PaymentMethodConfig::default(),
            contact_info: ContactInfoConfig::default(),
            signature: SignatureConfig::default(),
            tax_enabled: false,
            tax_rate_percent: None,
        }
    }
}

/// Keeps every array entry that is an object. `null` counts as an absent key;
/// other non-array shapes yield no sections rather than failing the whole
/// configuration.
fn sections<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<SectionDescriptor>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(default_sections());
    }
    Ok(lenient::value_to_list(value))
}

impl TemplateConfig {
    /// Extracts the configuration from a project's metadata bag.
    ///
    /// Looks at `templateConfig`, then `template`, then the bag itself when it
    /// looks like a configuration. Malformed input degrades to the defaults.
    pub fn from_metadata(metadata: &Value) -> Self {
        let candidate = metadata
            .get("templateConfig")
            .or_else(|| metadata.get("template"))
            .filter(|v| v.is_object())
            .or_else(|| {
                let looks_like_config = metadata.get("sections").is_some()
                    || metadata.get("theme").is_some();
                looks_like_config.then_some(metadata)
            });

        let Some(candidate) = candidate else {
            return Self::default();
        };

        match serde_json::from_value::<TemplateConfig>(candidate.clone()) {
            Ok(config) => config,
            Err(e) => {
                warn!("Template configuration could not be read, using defaults: {e}");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_metadata_reads_template_config_key() {
        let metadata = json!({
            "templateConfig": {
                "theme": "blue",
                "header": {"companyName": "Acme Builders"},
                "sections": [{"id": "itemsTable", "enabled": true, "order": 1}],
                "taxEnabled": "true",
                "taxRatePercent": "8.25"
            }
        });
        let config = TemplateConfig::from_metadata(&metadata);

        assert_eq!(config.theme.as_deref(), Some("blue"));
        assert_eq!(config.header.company_name.as_deref(), Some("Acme Builders"));
        assert_eq!(config.sections.len(), 1);
        assert!(config.tax_enabled);
        assert_eq!(config.tax_rate_percent, Some(8.25));
    }

    #[test]
    fn test_from_metadata_without_config_uses_defaults() {
        let config = TemplateConfig::from_metadata(&json!({"color": "red"}));
        assert!(config.theme.is_none());
        assert_eq!(config.sections.len(), 5);
        assert!(config.sections.iter().all(|s| s.enabled));
        assert!(!config.tax_enabled);
    }

    #[test]
    fn test_from_metadata_accepts_bare_configuration() {
        let config = TemplateConfig::from_metadata(&json!({"theme": "green"}));
        assert_eq!(config.theme.as_deref(), Some("green"));
    }

    #[test]
    fn test_malformed_sections_do_not_fail_configuration() {
        let metadata = json!({
            "template": {
                "theme": "red",
                "sections": [
                    "itemsTable",
                    {"id": "mysteryBlock", "enabled": true, "order": 2},
                    {"id": "jobSummary", "order": "3"}
                ]
            }
        });
        let config = TemplateConfig::from_metadata(&metadata);

        assert_eq!(config.theme.as_deref(), Some("red"));
        assert_eq!(config.sections.len(), 2);
        assert_eq!(config.sections[0].section_id(), None);
        assert_eq!(config.sections[1].section_id(), Some(SectionId::JobSummary));
        assert!(config.sections[1].enabled);
        assert_eq!(config.sections[1].order, 3);
    }

    #[test]
    fn test_null_bag_keeps_rest_of_configuration() {
        let metadata = json!({
            "templateConfig": {
                "theme": "blue",
                "paymentMethod": null,
                "header": "Acme",
                "signature": ["x"],
                "sections": [{"id": "itemsTable", "enabled": true, "order": 1}]
            }
        });
        let config = TemplateConfig::from_metadata(&metadata);

        assert_eq!(config.theme.as_deref(), Some("blue"));
        assert_eq!(config.sections.len(), 1);
        assert_eq!(config.sections[0].section_id(), Some(SectionId::ItemsTable));
        assert!(config.header.company_name.is_none());
        assert!(!config.payment_method.has_content());
    }

    #[test]
    fn test_null_sections_behave_like_absent_key() {
        let config = TemplateConfig::from_metadata(&json!({"theme": "red", "sections": null}));
        assert_eq!(config.theme.as_deref(), Some("red"));
        assert_eq!(config.sections.len(), 5);
    }

    #[test]
    fn test_sections_not_an_array_yields_none() {
        let config = TemplateConfig::from_metadata(&json!({"sections": "all"}));
        assert!(config.sections.is_empty());
    }

    #[test]
    fn test_has_content_ignores_blank_fields() {
        let payment = PaymentMethodConfig {
            bank_name: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(!payment.has_content());

        let contact = ContactInfoConfig {
            email: Some("office@acme.test".to_string()),
            ..Default::default()
        };
        assert!(contact.has_content());
    }
}
