//! Label endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::info;

use super::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::label::LabelOutcome;
use crate::record::{coerce, Label, Version};
use crate::AppState;

/// Body of `POST /api/label`
///
/// `label` is required: 0, 1 or an explicit null (clears the label).
/// `version` is the value returned by the read endpoints.
#[derive(Debug, Deserialize)]
pub struct LabelRequest {
    #[serde(alias = "messageId")]
    pub message_id: Option<Value>,
    /// `None` when the key is missing, `Some(Null)` for an explicit null
    #[serde(default, deserialize_with = "present")]
    pub label: Option<Value>,
    pub version: Option<String>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize)]
pub struct LabelResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub version: Version,
}

fn parse_label(raw: &Value) -> ApiResult<Option<Label>> {
    if raw.is_null() {
        return Ok(None);
    }
    Label::from_raw(raw)
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid label: {} (expected 0, 1 or null)", raw)))
}

/// POST /api/label
pub async fn label_message(
    State(state): State<AppState>,
    user: Option<Extension<AuthenticatedUser>>,
    body: Result<Json<LabelRequest>, JsonRejection>,
) -> ApiResult<Json<LabelResponse>> {
    let Json(request) =
        body.map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e.body_text())))?;

    let message_id = request
        .message_id
        .as_ref()
        .and_then(coerce::input_i64)
        .ok_or_else(|| ApiError::BadRequest("message_id must be an integer".to_string()))?;
    let raw_label = request
        .label
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("label is required (0, 1 or null)".to_string()))?;
    let label = parse_label(raw_label)?;
    let expected = request
        .version
        .filter(|v| !v.trim().is_empty())
        .map(Version::from)
        .ok_or_else(|| ApiError::BadRequest("version is required".to_string()))?;

    if let Some(Extension(AuthenticatedUser(username))) = &user {
        info!(username = %username, message_id, "Label requested");
    }

    let response = match state.engine.apply_label(message_id, label, &expected).await? {
        LabelOutcome::Applied { version } => LabelResponse {
            success: true,
            message: None,
            version,
        },
        LabelOutcome::Skipped { notice, version } => LabelResponse {
            success: true,
            message: Some(notice),
            version,
        },
    };
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_label_values() {
        assert_eq!(parse_label(&Value::Null).unwrap(), None);
        assert_eq!(parse_label(&json!(1)).unwrap(), Some(Label::Relevant));
        assert_eq!(parse_label(&json!("0")).unwrap(), Some(Label::NotRelevant));
        assert!(parse_label(&json!(2)).is_err());
        assert!(parse_label(&json!("yes")).is_err());
    }

    #[test]
    fn test_request_accepts_camel_case_id() {
        let request: LabelRequest =
            serde_json::from_value(json!({"messageId": "12", "label": 1, "version": "abc"})).unwrap();
        assert_eq!(request.message_id, Some(json!("12")));
    }

    #[test]
    fn test_missing_label_distinct_from_null() {
        let missing: LabelRequest =
            serde_json::from_value(json!({"message_id": 1, "version": "abc"})).unwrap();
        assert_eq!(missing.label, None);

        let cleared: LabelRequest =
            serde_json::from_value(json!({"message_id": 1, "label": null, "version": "abc"}))
                .unwrap();
        assert_eq!(cleared.label, Some(Value::Null));
    }
}
