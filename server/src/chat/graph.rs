//! Mock Cloud API
//!
//! `POST /{version}/{phone_number_id}/messages`, the endpoint a business
//! uses to send text and template messages. Errors mimic the platform's
//! `OAuthException` responses so client libraries see familiar failures.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{info, instrument, warn};
use wadev_common::{Direction, NewMessage, NewMessageButton};

use super::phone::{self, ParsedPhoneNumber};
use super::templates::{replace_variables, variables};
use crate::api::AppState;
use crate::util::unix_now;

/// Version reported in every response.
pub const API_VERSION_HEADER: (&str, &str) = ("facebook-api-version", "v18.0");

/// Lowest supported major Graph API version is this plus one.
const MIN_MAJOR_VERSION_EXCLUSIVE: u32 = 10;

const FBTRACE_ID: &str = "MDAwMDAwMDAwMDAwMDAwMDAw";

/// Authentication and recipient failures with fixed status and code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    TokenMalformed,
    InvalidAuthKind,
    MissingAuthHeader,
    InvalidContentType,
    RecipientNotAllowed,
}

impl AuthErrorKind {
    /// `(http status, error code, message)`
    pub const fn values(self) -> (StatusCode, u32, &'static str) {
        match self {
            Self::TokenMalformed => (StatusCode::BAD_REQUEST, 190, "Malformed access token"),
            Self::InvalidAuthKind => (
                StatusCode::UNAUTHORIZED,
                190,
                "Invalid auth type in access token",
            ),
            Self::MissingAuthHeader => {
                (StatusCode::BAD_REQUEST, 190, "Missing authentication header")
            }
            Self::InvalidContentType => (
                StatusCode::BAD_REQUEST,
                190,
                "Invalid content type (application/json)",
            ),
            Self::RecipientNotAllowed => (
                StatusCode::BAD_REQUEST,
                131030,
                "(#131030) Recipient phone number not in allowed list",
            ),
        }
    }
}

/// Cloud API errors.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("{}", .0.values().2)]
    Auth(AuthErrorKind),
    #[error("{message}")]
    Param {
        message: String,
        details: Option<String>,
    },
}

impl GraphError {
    fn param(message: impl Into<String>) -> Self {
        Self::Param {
            message: message.into(),
            details: None,
        }
    }

    fn param_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Param {
            message: message.into(),
            details: Some(details.into()),
        }
    }

    fn status_and_code(&self) -> (StatusCode, u32) {
        match self {
            Self::Auth(kind) => {
                let (status, code, _) = kind.values();
                (status, code)
            }
            Self::Param { .. } => (StatusCode::BAD_REQUEST, 100),
        }
    }
}

impl IntoResponse for GraphError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = self.to_string();

        let mut error = json!({
            "message": message,
            "type": "OAuthException",
            "code": code,
            "fbtrace_id": FBTRACE_ID,
        });
        if let Self::Param {
            details: Some(details),
            ..
        } = &self
        {
            error["error_data"] = json!({
                "messaging_product": "whatsapp",
                "details": details,
            });
        }

        let mut response = (status, Json(json!({ "error": error }))).into_response();
        let headers = response.headers_mut();
        headers.insert(
            API_VERSION_HEADER.0,
            HeaderValue::from_static(API_VERSION_HEADER.1),
        );
        if let Ok(value) = HeaderValue::from_str(&format!(
            "OAuth \"Facebook Platform\" \"invalid_request\" \"{message}\""
        )) {
            headers.insert(WWW_AUTHENTICATE, value);
        }
        response
    }
}

// ============================================================================
// Request / response bodies
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub messaging_product: String,
    #[serde(default)]
    pub to: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    pub text: Option<TextOptions>,
    pub template: Option<TemplateOptions>,
}

#[derive(Debug, Deserialize)]
pub struct TextOptions {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct TemplateOptions {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub language: LanguageOptions,
    #[serde(default)]
    pub components: Vec<TemplateComponent>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LanguageOptions {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub policy: String,
}

#[derive(Debug, Deserialize)]
pub struct TemplateComponent {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub sub_type: String,
    /// Sent as a string by most clients, occasionally as a number.
    #[serde(default, deserialize_with = "string_or_number")]
    pub index: String,
    #[serde(default)]
    pub parameters: Vec<ComponentParameter>,
}

#[derive(Debug, Deserialize)]
pub struct ComponentParameter {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub text: String,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub messaging_product: &'static str,
    pub contacts: Vec<ContactResult>,
    pub messages: Vec<MessageResult>,
}

#[derive(Debug, Serialize)]
pub struct ContactResult {
    pub input: String,
    pub wa_id: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResult {
    pub id: String,
    pub message_status: &'static str,
}

impl SendMessageResponse {
    fn accepted(to: &ParsedPhoneNumber, message_id: String) -> Self {
        Self {
            messaging_product: "whatsapp",
            contacts: vec![ContactResult {
                input: to.original.clone(),
                wa_id: to.parsed.clone(),
            }],
            messages: vec![MessageResult {
                id: message_id,
                message_status: "accepted",
            }],
        }
    }
}

// ============================================================================
// Request checks
// ============================================================================

/// Accept `v18.0`, `18.0` or `18`; the major version must be above 10.
fn check_version(version: &str) -> Result<(), GraphError> {
    let major = version
        .trim_start_matches('v')
        .split('.')
        .next()
        .and_then(|major| major.parse::<u32>().ok())
        .ok_or_else(|| GraphError::param(format!("Unknown graph api version {version}")))?;

    if major <= MIN_MAJOR_VERSION_EXCLUSIVE {
        return Err(GraphError::param(
            "incorrect facebook graph api version, only major version higher than 10 are supported",
        ));
    }
    Ok(())
}

fn check_headers(headers: &HeaderMap, graph_token: &str) -> Result<(), GraphError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or(GraphError::Auth(AuthErrorKind::InvalidContentType))?;
    let media_type = content_type.split(';').next().unwrap_or_default().trim();
    if !media_type.eq_ignore_ascii_case("application/json") {
        return Err(GraphError::Auth(AuthErrorKind::InvalidContentType));
    }

    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(GraphError::Auth(AuthErrorKind::MissingAuthHeader))?;
    let token = auth
        .strip_prefix("Bearer ")
        .ok_or(GraphError::Auth(AuthErrorKind::InvalidAuthKind))?;
    if token != graph_token {
        return Err(GraphError::Auth(AuthErrorKind::TokenMalformed));
    }
    Ok(())
}

// ============================================================================
// Handler
// ============================================================================

/// POST /{version}/{phone_number_id}/messages
#[instrument(skip(state, headers, body))]
pub async fn send_message(
    State(state): State<AppState>,
    Path((version, phone_number_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GraphError> {
    check_version(&version)?;
    check_headers(&headers, &state.settings.snapshot().graph_token)?;

    let req: SendMessageRequest = serde_json::from_slice(&body).map_err(|e| {
        GraphError::param_with_details(
            "(#100) The parameter messaging_product is required.",
            format!("Invalid JSON, err: {e}"),
        )
    })?;

    if req.to.is_empty() {
        return Err(GraphError::param("The parameter to is required."));
    }
    if !req.messaging_product.eq_ignore_ascii_case("whatsapp") {
        return Err(GraphError::param(format!(
            "(#100) Param messaging_product must be one of {{WHATSAPP}} - got {}.",
            serde_json::Value::String(req.messaging_product.clone())
        )));
    }

    let to = phone::parse(&req.to, false)
        .map_err(|_| GraphError::Auth(AuthErrorKind::RecipientNotAllowed))?;

    let result = match req.kind.to_ascii_lowercase().as_str() {
        "" | "text" => {
            let text = req.text.ok_or_else(|| {
                GraphError::param_with_details(
                    "(#100) Invalid parameter",
                    "Parameter 'text' is mandatory for type 'text'",
                )
            })?;
            send_text(&state, text, &to).await?
        }
        "template" => {
            let template = req.template.ok_or_else(|| {
                GraphError::param_with_details(
                    "(#100) Invalid parameter",
                    "Parameter 'template' is mandatory for type 'template'",
                )
            })?;
            send_template(&state, template, &to).await?
        }
        _ => {
            return Err(GraphError::param_with_details(
                "(#100) Invalid parameter",
                "Parameter 'type' must be one of {TEXT, TEMPLATE}",
            ))
        }
    };

    info!(to = %to.parsed, message_id = %to.whatsapp_message_id, "Business message accepted");

    let mut response = Json(result).into_response();
    response.headers_mut().insert(
        API_VERSION_HEADER.0,
        HeaderValue::from_static(API_VERSION_HEADER.1),
    );
    Ok(response)
}

/// Text messages are only allowed inside an existing conversation.
async fn send_text(
    state: &AppState,
    text: TextOptions,
    to: &ParsedPhoneNumber,
) -> Result<SendMessageResponse, GraphError> {
    if text.body.is_empty() {
        return Err(GraphError::param(
            "(#100) The parameter text['body'] is required.",
        ));
    }

    let existing = state
        .store
        .find_conversation_by_phone(&to.parsed)
        .await
        .ok_or(GraphError::Auth(AuthErrorKind::RecipientNotAllowed))?;

    let new = NewMessage::text(
        to.whatsapp_message_id.clone(),
        Direction::Incoming,
        text.body,
        unix_now(),
    );
    let (_, message) = state
        .store
        .insert_message(existing.id, new)
        .await
        .map_err(|e| {
            warn!(error = %e, "Conversation vanished while sending");
            GraphError::Auth(AuthErrorKind::RecipientNotAllowed)
        })?;

    state.events.business_message_sent(&message).await;
    Ok(SendMessageResponse::accepted(to, message.whatsapp_id))
}

/// Collect the `text` parameters of a body or header component.
fn text_parameters(
    component_index: usize,
    component: &TemplateComponent,
) -> Result<Vec<String>, GraphError> {
    component
        .parameters
        .iter()
        .enumerate()
        .map(|(j, parameter)| {
            if parameter.kind.eq_ignore_ascii_case("text") {
                Ok(parameter.text.clone())
            } else {
                Err(GraphError::param(format!(
                    "Param template['components'][{component_index}]['parameters'][{j}]['type'] must be one of {{TEXT}}"
                )))
            }
        })
        .collect()
}

fn check_parameter_count(
    section: &str,
    given: usize,
    expected: usize,
) -> Result<(), GraphError> {
    if given == expected {
        return Ok(());
    }
    Err(GraphError::param_with_details(
        "(#132000) Number of parameters does not match the expected number of params",
        format!(
            "{section}: number of localizable_params ({given}) does not match the expected number of params ({expected})"
        ),
    ))
}

/// Map quick-reply button components onto the template's buttons.
///
/// Returns one payload per template button, ordered by button index.
fn button_payloads(
    buttons: &[(usize, &TemplateComponent)],
    expected: usize,
) -> Result<Vec<String>, GraphError> {
    if buttons.len() != expected {
        return Err(GraphError::param_with_details(
            "(#132000) Number of parameters does not match the expected number of params",
            format!(
                "number of buttons ({}) does not match the expected number of params ({expected})",
                buttons.len()
            ),
        ));
    }

    let mut payloads: Vec<Option<String>> = vec![None; expected];
    for (idx, button) in buttons {
        let prefix = format!("template['components'][{idx}]");

        if button.index.is_empty() {
            return Err(GraphError::param(format!("Param {prefix}['index'] is required")));
        }
        if button.sub_type.is_empty() {
            return Err(GraphError::param(format!("Param {prefix}['sub_type'] is required")));
        }
        if button.sub_type != "quick_reply" {
            return Err(GraphError::param(format!(
                "Param {prefix}['sub_type'] must be one of {{QUICK_REPLY}}"
            )));
        }

        let parameter = match button.parameters.as_slice() {
            [] => {
                return Err(GraphError::param(format!(
                    "Param {prefix}['parameters'] is required"
                )))
            }
            [only] => only,
            _ => {
                return Err(GraphError::param(format!(
                    "Param {prefix}['parameters'] must have at max 1 element"
                )))
            }
        };
        if parameter.kind.is_empty() {
            return Err(GraphError::param(format!(
                "Param {prefix}['parameters'][0]['type'] is required"
            )));
        }
        if parameter.kind != "payload" {
            return Err(GraphError::param(format!(
                "Param {prefix}['parameters'][0]['type'] must be one of {{PAYLOAD}}"
            )));
        }
        if parameter.payload.is_empty() {
            return Err(GraphError::param(format!(
                "Param {prefix}['parameters'][0]['payload'] is required"
            )));
        }

        let index: usize = button.index.parse().map_err(|_| {
            GraphError::param(format!("Param {prefix}['index'] must be a number"))
        })?;
        let slot = payloads.get_mut(index).ok_or_else(|| {
            GraphError::param(format!(
                "Param {prefix}['index'] must be between 0 and {}",
                expected.saturating_sub(1)
            ))
        })?;
        *slot = Some(parameter.payload.clone());
    }

    payloads
        .into_iter()
        .enumerate()
        .map(|(idx, payload)| {
            payload.ok_or_else(|| GraphError::param(format!("Button with index {idx} missing")))
        })
        .collect()
}

/// Template messages may start a conversation with any number.
async fn send_template(
    state: &AppState,
    options: TemplateOptions,
    to: &ParsedPhoneNumber,
) -> Result<SendMessageResponse, GraphError> {
    if options.language.code.is_empty() {
        return Err(GraphError::param(
            "(#100) The parameter template['language']['code'] is required.",
        ));
    }
    match options.language.policy.to_ascii_lowercase().as_str() {
        "" | "deterministic" => {}
        _ => {
            return Err(GraphError::param(
                "(#100) The parameter template['language']['policy'] must be one of {DETERMINISTIC}.",
            ))
        }
    }

    let template = state
        .store
        .find_template_by_name(&options.name)
        .await
        .ok_or_else(|| {
            GraphError::param_with_details(
                "(#132001) Template name does not exist in the translation",
                format!(
                    "template name ({}) does not exist in {}",
                    options.name, options.language.code
                ),
            )
        })?;

    let mut body_values: Option<Vec<String>> = None;
    let mut header_values: Option<Vec<String>> = None;
    let mut buttons = Vec::new();
    for (idx, component) in options.components.iter().enumerate() {
        match component.kind.as_str() {
            "button" => buttons.push((idx, component)),
            "body" => {
                if body_values.is_some() {
                    return Err(GraphError::param("There can be at max 1 body component"));
                }
                body_values = Some(text_parameters(idx, component)?);
            }
            "header" => {
                if header_values.is_some() {
                    return Err(GraphError::param("There can be at max 1 header component"));
                }
                header_values = Some(text_parameters(idx, component)?);
            }
            _ => {}
        }
    }
    let body_values = body_values.unwrap_or_default();
    let header_values = header_values.unwrap_or_default();

    let mut body = template.body.clone();
    let body_variables = variables(&template.body).len();
    if body_variables > 0 {
        check_parameter_count("body", body_values.len(), body_variables)?;
        body = replace_variables(&body, &body_values);
    }

    let mut header = template.header.clone();
    if let Some(template_header) = &template.header {
        let header_variables = variables(template_header).len();
        if header_variables > 0 {
            check_parameter_count("header", header_values.len(), header_variables)?;
            header = Some(replace_variables(template_header, &header_values));
        }
    }

    let payloads = button_payloads(&buttons, template.template_custom_buttons.len())?;
    let message_buttons = template
        .template_custom_buttons
        .iter()
        .zip(payloads)
        .map(|(button, payload)| NewMessageButton {
            text: button.text.clone(),
            payload: Some(payload),
        })
        .collect();

    let new = NewMessage {
        whatsapp_id: to.whatsapp_message_id.clone(),
        direction: Direction::Incoming,
        header_message: header,
        message: body,
        footer_message: template.footer.clone(),
        timestamp: unix_now(),
        payload: None,
        buttons: message_buttons,
    };
    let (conversation, message) = state.store.create_or_append(&to.parsed, new).await;
    info!(template = %template.name, conversation_id = conversation.id, "Template message stored");

    state.events.business_message_sent(&message).await;
    Ok(SendMessageResponse::accepted(to, message.whatsapp_id))
}
