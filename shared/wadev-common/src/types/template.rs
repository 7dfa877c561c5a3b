//! Template Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message template that businesses may send to any phone number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: u64,
    pub name: String,
    pub header: Option<String>,
    /// Body text, may contain `{{ n }}` placeholders.
    pub body: String,
    pub footer: Option<String>,
    pub template_custom_buttons: Vec<TemplateCustomButton>,
    pub created_at: DateTime<Utc>,
}

/// Quick-reply button declared on a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateCustomButton {
    pub id: u64,
    pub template_id: u64,
    pub text: String,
}

/// Writable template fields used for create and update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInput {
    #[serde(default)]
    pub name: String,
    pub header: Option<String>,
    #[serde(default)]
    pub body: String,
    pub footer: Option<String>,
    #[serde(default)]
    pub template_custom_buttons: Vec<TemplateButtonInput>,
}

/// Button text as supplied by the dev UI.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateButtonInput {
    pub text: String,
}
