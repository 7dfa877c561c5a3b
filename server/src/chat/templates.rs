//! Message Templates
//!
//! CRUD handlers plus the `{{ n }}` placeholder rules shared with the Cloud
//! API mock.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use regex::{Captures, Regex};
use tracing::{info, instrument};
use wadev_common::{Template, TemplateInput};

use super::ChatError;
use crate::api::AppState;

static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*(\d+)\s*\}\}").expect("valid regex"));

fn variable_number(caps: &Captures<'_>) -> Option<usize> {
    caps.get(1)?.as_str().parse().ok()
}

/// Distinct placeholder numbers used in `input`.
pub fn variables(input: &str) -> BTreeSet<usize> {
    VARIABLE
        .captures_iter(input)
        .filter_map(|caps| variable_number(&caps))
        .collect()
}

/// Replace `{{ n }}` with `values[n - 1]`; out-of-range placeholders stay.
pub fn replace_variables(input: &str, values: &[String]) -> String {
    VARIABLE
        .replace_all(input, |caps: &Captures<'_>| {
            match variable_number(caps).and_then(|n| n.checked_sub(1)).and_then(|i| values.get(i)) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Placeholders must be numbered from 1 without gaps.
pub fn validate_variables(input: &str) -> Result<(), String> {
    let mut seen = BTreeSet::new();
    for caps in VARIABLE.captures_iter(input) {
        let Some(n) = variable_number(&caps) else {
            return Err(format!("variable {} is not a number", &caps[0]));
        };
        if n == 0 {
            return Err(format!("variable {}, this is not allowed to be zero", &caps[0]));
        }
        seen.insert(n);
    }

    for n in &seen {
        if *n > 1 && !seen.contains(&(n - 1)) {
            return Err(format!("variable {{{{ {} }}}} is missing", n - 1));
        }
    }
    Ok(())
}

/// Drop empty header/footer and check the placeholders.
fn normalize(input: &mut TemplateInput) -> Result<(), ChatError> {
    if input.name.trim().is_empty() {
        return Err(ChatError::Validation("name is required".into()));
    }
    if input.body.is_empty() {
        return Err(ChatError::Validation("body is required".into()));
    }
    input.header = input.header.take().filter(|h| !h.is_empty());
    input.footer = input.footer.take().filter(|f| !f.is_empty());

    validate_variables(&input.body).map_err(|e| ChatError::Validation(format!("body: {e}")))?;
    if let Some(header) = &input.header {
        validate_variables(header)
            .map_err(|e| ChatError::Validation(format!("header: {e}")))?;
    }
    Ok(())
}

fn check_id(id: u64) -> Result<u64, ChatError> {
    if id < 1 {
        return Err(ChatError::Validation("invalid id".into()));
    }
    Ok(id)
}

/// GET /api/templates
pub async fn index(State(state): State<AppState>) -> Json<Vec<Template>> {
    Json(state.store.list_templates().await)
}

/// POST /api/templates
#[instrument(skip(state, body))]
pub async fn create(
    State(state): State<AppState>,
    body: Result<Json<TemplateInput>, JsonRejection>,
) -> Result<Json<Template>, ChatError> {
    let Json(mut input) = body?;
    normalize(&mut input)?;

    let template = state.store.create_template(input).await;
    info!(template_id = template.id, name = %template.name, "Template created");
    Ok(Json(template))
}

/// PATCH /api/templates/{id}
#[instrument(skip(state, body))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    body: Result<Json<TemplateInput>, JsonRejection>,
) -> Result<Json<Template>, ChatError> {
    let id = check_id(id)?;
    let Json(mut input) = body?;
    normalize(&mut input)?;

    Ok(Json(state.store.update_template(id, input).await?))
}

/// DELETE /api/templates/{id}
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ChatError> {
    state.store.delete_template(check_id(id)?).await?;
    info!(template_id = id, "Template deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_distinct_variables() {
        let found = variables("Hi {{1}}, your order {{ 2 }} for {{1}} ships {{3 }}");
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(variables("no placeholders {{x}}").is_empty());
    }

    #[test]
    fn replaces_in_range_only() {
        let values = vec!["Ada".to_string(), "#42".to_string()];
        assert_eq!(
            replace_variables("Hi {{1}}, order {{ 2 }} / {{3}} / {{0}}", &values),
            "Hi Ada, order #42 / {{3}} / {{0}}"
        );
    }

    #[test]
    fn validation_rules() {
        assert!(validate_variables("{{1}} {{2}} {{ 1 }}").is_ok());
        assert!(validate_variables("plain").is_ok());
        assert_eq!(
            validate_variables("{{0}}").unwrap_err(),
            "variable {{0}}, this is not allowed to be zero"
        );
        assert_eq!(
            validate_variables("{{1}} {{3}}").unwrap_err(),
            "variable {{ 2 }} is missing"
        );
        assert_eq!(
            validate_variables("{{2}}").unwrap_err(),
            "variable {{ 1 }} is missing"
        );
    }

    #[test]
    fn normalize_drops_empty_optional_parts() {
        let mut input = TemplateInput {
            name: "t".into(),
            header: Some(String::new()),
            body: "Hello {{1}}".into(),
            footer: Some(String::new()),
            template_custom_buttons: vec![],
        };
        normalize(&mut input).unwrap();
        assert!(input.header.is_none());
        assert!(input.footer.is_none());

        input.header = Some("{{2}}".into());
        assert_eq!(
            normalize(&mut input).unwrap_err().to_string(),
            "header: variable {{ 1 }} is missing"
        );
    }
}
