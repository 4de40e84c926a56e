//! Document Model Builder — assembles the renderer-agnostic Composed Document.
//!
//! Everything a renderer prints is decided here: which blocks exist, their
//! order, the labels, and every number already formatted as text. Renderers
//! only turn blocks into layout; they never re-derive visibility or totals.

use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::assets::{AssetLoader, ImageAsset};
use crate::compose::finance::{reconcile, FinancialSummary};
use crate::compose::labels::{Labels, Lang};
use crate::compose::planner::{plan, PlannedSection};
use crate::compose::theme::{resolve, Theme};
use crate::models::template::{
    is_populated, ContactInfoConfig, JobSummaryConfig, PaymentMethodConfig, ProjectInfoConfig,
    SignatureConfig,
};
use crate::models::{EstimateRecord, TemplateConfig};

// ────────────────────────────────────────────────────────────────────────────
// Composed Document types
// ────────────────────────────────────────────────────────────────────────────

/// One labelled value, e.g. `Bank: First National`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub label: String,
    pub value: String,
}

/// A titled list of fields: a single-column section or one side of a
/// two-column section. `fields` may be empty only inside a two-column block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldColumn {
    pub title: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderBlock {
    pub company_name: Option<String>,
    pub tagline: Option<String>,
    #[serde(skip)]
    pub logo: Option<ImageAsset>,
    pub title: String,
    /// Already prefixed, e.g. `Estimate #: 2024-017`.
    pub estimate_number: Option<String>,
    /// Already prefixed, e.g. `Date: Mar 04, 2024`.
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemRow {
    pub description: String,
    pub quantity: String,
    pub unit_price: String,
    pub line_total: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TotalKind {
    Subtotal,
    Tax,
    LaborCost,
    Total,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalLine {
    pub kind: TotalKind,
    pub label: String,
    pub amount: String,
}

impl TotalLine {
    /// The grand total is drawn emphasized by both renderers.
    pub fn is_emphasized(&self) -> bool {
        self.kind == TotalKind::Total
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemsTableBlock {
    pub title: String,
    /// Column headers in fixed order: description, quantity, unit price, line total.
    pub columns: [String; 4],
    pub rows: Vec<ItemRow>,
    /// Printed as a single row when `rows` is empty.
    pub empty_label: String,
    /// In print order; the last line is always the grand total.
    pub totals: Vec<TotalLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotesBlock {
    pub title: String,
    pub paragraphs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignatureBlock {
    pub title: String,
    #[serde(skip)]
    pub image: Option<ImageAsset>,
    pub name: Option<String>,
    pub signer_title: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ContentBlock {
    Header(HeaderBlock),
    JobSummary(FieldColumn),
    ProjectInfo(FieldColumn),
    ItemsTable(ItemsTableBlock),
    TwoColumn { left: FieldColumn, right: FieldColumn },
    PaymentOnly(FieldColumn),
    ContactOnly(FieldColumn),
    Notes(NotesBlock),
    Signature(SignatureBlock),
}

/// Discriminant of a `ContentBlock`, used to compare renderer outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BlockKind {
    Header,
    JobSummary,
    ProjectInfo,
    ItemsTable,
    TwoColumn,
    PaymentOnly,
    ContactOnly,
    Notes,
    Signature,
}

impl ContentBlock {
    pub fn kind(&self) -> BlockKind {
        match self {
            ContentBlock::Header(_) => BlockKind::Header,
            ContentBlock::JobSummary(_) => BlockKind::JobSummary,
            ContentBlock::ProjectInfo(_) => BlockKind::ProjectInfo,
            ContentBlock::ItemsTable(_) => BlockKind::ItemsTable,
            ContentBlock::TwoColumn { .. } => BlockKind::TwoColumn,
            ContentBlock::PaymentOnly(_) => BlockKind::PaymentOnly,
            ContentBlock::ContactOnly(_) => BlockKind::ContactOnly,
            ContentBlock::Notes(_) => BlockKind::Notes,
            ContentBlock::Signature(_) => BlockKind::Signature,
        }
    }
}

/// Built fresh per render and consumed read-only by exactly one renderer.
#[derive(Debug, Clone, Serialize)]
pub struct ComposedDocument {
    pub estimate_id: String,
    pub lang: Lang,
    #[serde(skip)]
    pub labels: &'static Labels,
    pub theme: Theme,
    pub summary: FinancialSummary,
    pub blocks: Vec<ContentBlock>,
}

impl ComposedDocument {
    pub fn block_kinds(&self) -> Vec<BlockKind> {
        self.blocks.iter().map(ContentBlock::kind).collect()
    }
}

/// Images resolved by the Asset Loader before composition.
#[derive(Debug, Clone, Default)]
pub struct ResolvedAssets {
    pub logo: Option<ImageAsset>,
    pub signature: Option<ImageAsset>,
}

// ────────────────────────────────────────────────────────────────────────────
// Entry points
// ────────────────────────────────────────────────────────────────────────────

/// Reads the template configuration, fetches logo and signature concurrently,
/// then builds the document. Missing or failed assets are simply absent.
pub async fn compose_document(
    estimate: &EstimateRecord,
    lang: Lang,
    loader: &dyn AssetLoader,
) -> ComposedDocument {
    let config = TemplateConfig::from_metadata(&estimate.project.metadata);

    let load = |reference: Option<String>| async move {
        match reference {
            Some(r) => loader.load(&r).await,
            None => None,
        }
    };
    let (logo, signature) = tokio::join!(
        load(config.header.logo.clone()),
        load(config.signature.image.clone())
    );

    build(estimate, &config, ResolvedAssets { logo, signature }, lang)
}

/// Pure composition: theme, totals, section plan and blocks.
pub fn build(
    estimate: &EstimateRecord,
    config: &TemplateConfig,
    assets: ResolvedAssets,
    lang: Lang,
) -> ComposedDocument {
    let labels = lang.labels();
    let theme = resolve(config.theme.as_deref());
    let summary = reconcile(estimate, config.tax_enabled, config.tax_rate_percent);
    let planned = plan(&config.sections, &config.payment_method, &config.contact_info);

    let mut blocks = vec![ContentBlock::Header(header_block(
        estimate,
        config,
        assets.logo,
        labels,
    ))];

    for section in planned {
        let block = match section {
            PlannedSection::JobSummary => {
                non_empty(job_summary_column(&config.job_summary, labels))
                    .map(ContentBlock::JobSummary)
            }
            PlannedSection::ProjectInfo => {
                let fallback_name = estimate.project.name.as_deref();
                non_empty(project_info_column(&config.project_info, fallback_name, labels))
                    .map(ContentBlock::ProjectInfo)
            }
            PlannedSection::ItemsTable => Some(ContentBlock::ItemsTable(items_table_block(
                estimate, &summary, labels,
            ))),
            PlannedSection::TwoColumn => Some(ContentBlock::TwoColumn {
                left: payment_column(&config.payment_method, labels),
                right: contact_column(&config.contact_info, labels),
            }),
            PlannedSection::PaymentOnly => Some(ContentBlock::PaymentOnly(payment_column(
                &config.payment_method,
                labels,
            ))),
            PlannedSection::ContactOnly => Some(ContentBlock::ContactOnly(contact_column(
                &config.contact_info,
                labels,
            ))),
        };
        blocks.extend(block);
    }

    if let Some(notes) = notes_block(estimate.notes.as_deref(), labels) {
        blocks.push(ContentBlock::Notes(notes));
    }

    if let Some(signature) = signature_block(&config.signature, assets.signature, labels) {
        blocks.push(ContentBlock::Signature(signature));
    }

    let document = ComposedDocument {
        estimate_id: estimate.id.clone(),
        lang,
        labels,
        theme,
        summary,
        blocks,
    };
    debug!(
        estimate_id = %document.estimate_id,
        kinds = ?document.block_kinds(),
        "Composed document"
    );
    document
}

// ────────────────────────────────────────────────────────────────────────────
// Block builders
// ────────────────────────────────────────────────────────────────────────────

fn push_field(fields: &mut Vec<Field>, label: &str, value: &Option<String>) {
    if is_populated(value) {
        if let Some(v) = value {
            fields.push(Field {
                label: label.to_string(),
                value: v.trim().to_string(),
            });
        }
    }
}

fn non_empty(column: FieldColumn) -> Option<FieldColumn> {
    (!column.fields.is_empty()).then_some(column)
}

fn header_block(
    estimate: &EstimateRecord,
    config: &TemplateConfig,
    logo: Option<ImageAsset>,
    labels: &Labels,
) -> HeaderBlock {
    let header = &config.header;
    let populated = |field: &Option<String>| {
        is_populated(field)
            .then(|| field.as_deref().map(str::trim).map(str::to_string))
            .flatten()
    };

    HeaderBlock {
        company_name: populated(&header.company_name),
        tagline: populated(&header.tagline),
        logo,
        title: labels.document_title.to_string(),
        estimate_number: populated(&header.estimate_number)
            .map(|n| format!("{}: {n}", labels.estimate_number)),
        date: estimate
            .created_at
            .as_deref()
            .and_then(|raw| format_date(raw, labels))
            .map(|d| format!("{}: {d}", labels.date)),
    }
}

fn job_summary_column(job: &JobSummaryConfig, labels: &Labels) -> FieldColumn {
    let mut fields = Vec::new();
    push_field(&mut fields, labels.job_title, &job.title);
    push_field(&mut fields, labels.description, &job.description);
    push_field(&mut fields, labels.scope, &job.scope);
    push_field(&mut fields, labels.start_date, &job.start_date);
    push_field(&mut fields, labels.end_date, &job.end_date);
    FieldColumn {
        title: labels.job_summary.to_string(),
        fields,
    }
}

fn project_info_column(
    info: &ProjectInfoConfig,
    fallback_name: Option<&str>,
    labels: &Labels,
) -> FieldColumn {
    let project_name = if is_populated(&info.project_name) {
        info.project_name.clone()
    } else {
        fallback_name.map(str::to_string)
    };

    let mut fields = Vec::new();
    push_field(&mut fields, labels.project_name, &project_name);
    push_field(&mut fields, labels.client_name, &info.client_name);
    push_field(&mut fields, labels.phone, &info.client_phone);
    push_field(&mut fields, labels.email, &info.client_email);
    push_field(&mut fields, labels.address, &info.address);
    FieldColumn {
        title: labels.project_info.to_string(),
        fields,
    }
}

fn payment_column(payment: &PaymentMethodConfig, labels: &Labels) -> FieldColumn {
    let mut fields = Vec::new();
    push_field(&mut fields, labels.bank_name, &payment.bank_name);
    push_field(&mut fields, labels.account_name, &payment.account_name);
    push_field(&mut fields, labels.account_number, &payment.account_number);
    push_field(&mut fields, labels.routing_number, &payment.routing_number);
    push_field(&mut fields, labels.payment_terms, &payment.payment_terms);
    push_field(&mut fields, labels.instructions, &payment.instructions);
    FieldColumn {
        title: labels.payment_method.to_string(),
        fields,
    }
}

fn contact_column(contact: &ContactInfoConfig, labels: &Labels) -> FieldColumn {
    let mut fields = Vec::new();
    push_field(&mut fields, labels.contact_name, &contact.name);
    push_field(&mut fields, labels.phone, &contact.phone);
    push_field(&mut fields, labels.email, &contact.email);
    push_field(&mut fields, labels.address, &contact.address);
    push_field(&mut fields, labels.website, &contact.website);
    FieldColumn {
        title: labels.contact_info.to_string(),
        fields,
    }
}

fn items_table_block(
    estimate: &EstimateRecord,
    summary: &FinancialSummary,
    labels: &Labels,
) -> ItemsTableBlock {
    let rows = estimate
        .line_items
        .iter()
        .map(|item| {
            let quantity = format_quantity(item.quantity);
            let quantity = match item.unit.as_deref().map(str::trim) {
                Some(unit) if !unit.is_empty() => format!("{quantity} {unit}"),
                _ => quantity,
            };
            ItemRow {
                description: item.description.clone().unwrap_or_default(),
                quantity,
                unit_price: format_money(item.unit_cost),
                line_total: format_money(item.subtotal),
            }
        })
        .collect();

    let mut totals = vec![TotalLine {
        kind: TotalKind::Subtotal,
        label: labels.subtotal.to_string(),
        amount: format_money(summary.subtotal),
    }];
    if summary.tax_visible {
        totals.push(TotalLine {
            kind: TotalKind::Tax,
            label: labels.tax.to_string(),
            amount: format_money(summary.tax),
        });
    }
    if summary.labor_cost > 0.0 {
        totals.push(TotalLine {
            kind: TotalKind::LaborCost,
            label: labels.labor_cost.to_string(),
            amount: format_money(summary.labor_cost),
        });
    }
    totals.push(TotalLine {
        kind: TotalKind::Total,
        label: labels.total.to_string(),
        amount: format_money(summary.total),
    });

    ItemsTableBlock {
        title: labels.items.to_string(),
        columns: [
            labels.description.to_string(),
            labels.quantity.to_string(),
            labels.unit_price.to_string(),
            labels.line_total.to_string(),
        ],
        rows,
        empty_label: labels.no_items.to_string(),
        totals,
    }
}

fn notes_block(notes: Option<&str>, labels: &Labels) -> Option<NotesBlock> {
    let paragraphs: Vec<String> = notes?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    (!paragraphs.is_empty()).then(|| NotesBlock {
        title: labels.notes.to_string(),
        paragraphs,
    })
}

fn signature_block(
    signature: &SignatureConfig,
    image: Option<ImageAsset>,
    labels: &Labels,
) -> Option<SignatureBlock> {
    let text = |field: &Option<String>| {
        is_populated(field)
            .then(|| field.as_deref().map(str::trim).map(str::to_string))
            .flatten()
    };
    let name = text(&signature.name);
    let signer_title = text(&signature.title).map(|t| format!("{}: {t}", labels.signer_title));
    let date = text(&signature.date).map(|d| format!("{}: {d}", labels.date));

    if image.is_none() && name.is_none() && signer_title.is_none() && date.is_none() {
        return None;
    }
    Some(SignatureBlock {
        title: labels.signature.to_string(),
        image,
        name,
        signer_title,
        date,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Formatting
// ────────────────────────────────────────────────────────────────────────────

/// `$1,234.56`. Non-finite and negative values print as zero.
pub fn format_money(amount: f64) -> String {
    let amount = if amount.is_finite() && amount > 0.0 {
        amount
    } else {
        0.0
    };
    let cents = (amount * 100.0).round() as u64;
    let (whole, frac) = (cents / 100, cents % 100);

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("${grouped}.{frac:02}")
}

/// Quantities print without trailing zeros: `10`, `2.5`, `0.125`.
pub fn format_quantity(quantity: f64) -> String {
    if !quantity.is_finite() {
        return "0".to_string();
    }
    let fixed = format!("{quantity:.3}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn format_date(raw: &str, labels: &Labels) -> Option<String> {
    let raw = raw.trim();
    let date = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| {
            raw.get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        })?;
    Some(date.format(labels.date_format).to_string())
}
