//! Label sets for the two supported document languages.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    En,
    Es,
}

impl Lang {
    /// Unsupported or missing values select English.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("es") => Lang::Es,
            _ => Lang::En,
        }
    }

    pub fn labels(&self) -> &'static Labels {
        match self {
            Lang::En => &EN,
            Lang::Es => &ES,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Labels {
    pub document_title: &'static str,
    pub estimate_number: &'static str,
    pub date: &'static str,
    /// `chrono` pattern for the document date.
    pub date_format: &'static str,
    pub page: &'static str,
    pub of: &'static str,

    pub job_summary: &'static str,
    pub project_info: &'static str,
    pub items: &'static str,
    pub payment_method: &'static str,
    pub contact_info: &'static str,
    pub notes: &'static str,
    pub signature: &'static str,

    pub description: &'static str,
    pub quantity: &'static str,
    pub unit_price: &'static str,
    pub line_total: &'static str,
    pub no_items: &'static str,

    pub subtotal: &'static str,
    pub tax: &'static str,
    pub labor_cost: &'static str,
    pub total: &'static str,

    pub job_title: &'static str,
    pub scope: &'static str,
    pub start_date: &'static str,
    pub end_date: &'static str,

    pub project_name: &'static str,
    pub client_name: &'static str,
    pub phone: &'static str,
    pub email: &'static str,
    pub address: &'static str,

    pub bank_name: &'static str,
    pub account_name: &'static str,
    pub account_number: &'static str,
    pub routing_number: &'static str,
    pub payment_terms: &'static str,
    pub instructions: &'static str,

    pub contact_name: &'static str,
    pub website: &'static str,

    pub signer_title: &'static str,
}

static EN: Labels = Labels {
    document_title: "ESTIMATE",
    estimate_number: "Estimate #",
    date: "Date",
    date_format: "%b %d, %Y",
    page: "Page",
    of: "of",

    job_summary: "Job Summary",
    project_info: "Project Information",
    items: "Items",
    payment_method: "Payment Method",
    contact_info: "Contact Information",
    notes: "Notes",
    signature: "Authorized Signature",

    description: "Description",
    quantity: "Qty",
    unit_price: "Unit Price",
    line_total: "Total",
    no_items: "No line items",

    subtotal: "Subtotal",
    tax: "Tax",
    labor_cost: "Labor Cost",
    total: "Total",

    job_title: "Job",
    scope: "Scope",
    start_date: "Start Date",
    end_date: "End Date",

    project_name: "Project",
    client_name: "Client",
    phone: "Phone",
    email: "Email",
    address: "Address",

    bank_name: "Bank",
    account_name: "Account Name",
    account_number: "Account Number",
    routing_number: "Routing Number",
    payment_terms: "Terms",
    instructions: "Instructions",

    contact_name: "Name",
    website: "Website",

    signer_title: "Title",
};

static ES: Labels = Labels {
    document_title: "PRESUPUESTO",
    estimate_number: "Presupuesto N.º",
    date: "Fecha",
    date_format: "%d/%m/%Y",
    page: "Página",
    of: "de",

    job_summary: "Resumen del Trabajo",
    project_info: "Información del Proyecto",
    items: "Partidas",
    payment_method: "Método de Pago",
    contact_info: "Información de Contacto",
    notes: "Notas",
    signature: "Firma Autorizada",

    description: "Descripción",
    quantity: "Cant.",
    unit_price: "Precio Unitario",
    line_total: "Importe",
    no_items: "Sin partidas",

    subtotal: "Subtotal",
    tax: "Impuesto",
    labor_cost: "Mano de Obra",
    total: "Total",

    job_title: "Trabajo",
    scope: "Alcance",
    start_date: "Fecha de Inicio",
    end_date: "Fecha de Fin",

    project_name: "Proyecto",
    client_name: "Cliente",
    phone: "Teléfono",
    email: "Correo",
    address: "Dirección",

    bank_name: "Banco",
    account_name: "Titular",
    account_number: "Número de Cuenta",
    routing_number: "Código de Ruta",
    payment_terms: "Condiciones",
    instructions: "Instrucciones",

    contact_name: "Nombre",
    website: "Sitio Web",

    signer_title: "Cargo",
};
