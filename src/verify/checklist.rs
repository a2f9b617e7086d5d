//! Test checklist generation.
//!
//! Checklists normally come from an external text-generation service. Its
//! responses are validated here into plain test items; anything else is a
//! parse failure. When generation fails outright the checklist is derived
//! from the plan summary's accomplishments instead.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ChecklistError;

/// Input for checklist generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChecklistRequest {
    /// Accomplishments listed in the plan summary
    pub accomplishments: Vec<String>,

    /// Files the plan touched
    pub files: Vec<String>,

    /// Plan name, for context
    pub plan_name: String,
}

/// Produces manual test items for a plan.
#[async_trait]
pub trait ChecklistGenerator: Send + Sync {
    /// Generate test items. May fail or return an empty list.
    async fn generate_checklist(&self, request: &ChecklistRequest) -> anyhow::Result<Vec<String>>;

    /// Generator name, for logs.
    fn name(&self) -> &str;
}

/// Turns each accomplishment into one test item.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccomplishmentsChecklist;

#[async_trait]
impl ChecklistGenerator for AccomplishmentsChecklist {
    async fn generate_checklist(&self, request: &ChecklistRequest) -> anyhow::Result<Vec<String>> {
        Ok(checklist_from_accomplishments(&request.accomplishments))
    }

    fn name(&self) -> &str {
        "accomplishments"
    }
}

/// One test item per non-empty, distinct accomplishment.
pub fn checklist_from_accomplishments(accomplishments: &[String]) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for accomplishment in accomplishments {
        let item = accomplishment.trim().trim_end_matches('.').trim();
        if !item.is_empty() && !items.iter().any(|existing| existing == item) {
            items.push(item.to_string());
        }
    }
    items
}

/// Validate a raw generator response into test items.
///
/// Accepts a JSON array, or an object with a `tests` or `items` array.
/// Array entries are strings, or objects with a `test`/`name` string and an
/// optional `expected` string. Markdown code fences are stripped first.
pub fn parse_checklist_response(raw: &str) -> Result<Vec<String>, ChecklistError> {
    let body = strip_code_fence(raw);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ChecklistError::ParseFailure(format!("response is not JSON: {e}")))?;

    let entries = match &value {
        Value::Array(entries) => entries,
        Value::Object(map) => match map.get("tests").or_else(|| map.get("items")) {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(ChecklistError::ParseFailure(
                    "object has no 'tests' or 'items' array".to_string(),
                ))
            }
        },
        _ => return Err(ChecklistError::ParseFailure("expected an array or object".to_string())),
    };

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| parse_entry(entry).ok_or_else(|| {
            ChecklistError::ParseFailure(format!("entry {i} is not a test item"))
        }))
        .collect::<Result<Vec<_>, _>>()
        .map(|items| items.into_iter().filter(|item| !item.is_empty()).collect())
}

fn parse_entry(entry: &Value) -> Option<String> {
    match entry {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Object(map) => {
            let test = map.get("test").or_else(|| map.get("name"))?.as_str()?.trim();
            match map.get("expected").and_then(Value::as_str) {
                Some(expected) if !expected.trim().is_empty() => {
                    Some(format!("{test} (expected: {})", expected.trim()))
                }
                _ => Some(test.to_string()),
            }
        }
        _ => None,
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else { return trimmed };
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Run a generator, falling back to the accomplishments on failure.
///
/// An empty list from a working generator is returned as-is; only errors
/// trigger the fallback.
pub async fn generate_with_fallback(
    generator: &dyn ChecklistGenerator,
    request: &ChecklistRequest,
) -> Vec<String> {
    match generator.generate_checklist(request).await {
        Ok(items) => items.into_iter().map(|i| i.trim().to_string()).filter(|i| !i.is_empty()).collect(),
        Err(e) => {
            tracing::warn!(
                generator = generator.name(),
                error = %e,
                "Checklist generation failed, using accomplishments"
            );
            checklist_from_accomplishments(&request.accomplishments)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingGenerator;

    #[async_trait]
    impl ChecklistGenerator for FailingGenerator {
        async fn generate_checklist(&self, _: &ChecklistRequest) -> anyhow::Result<Vec<String>> {
            anyhow::bail!("service unavailable")
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn request() -> ChecklistRequest {
        ChecklistRequest {
            accomplishments: vec![
                "Login form.".to_string(),
                "  ".to_string(),
                "Login form".to_string(),
                "Logout button".to_string(),
            ],
            files: vec!["src/login.rs".to_string()],
            plan_name: "02-01".to_string(),
        }
    }

    #[test]
    fn test_checklist_from_accomplishments() {
        let items = checklist_from_accomplishments(&request().accomplishments);
        assert_eq!(items, vec!["Login form", "Logout button"]);
    }

    #[test]
    fn test_parse_array_response() {
        let items = parse_checklist_response(r#"["Open the app", "Log in"]"#).unwrap();
        assert_eq!(items, vec!["Open the app", "Log in"]);
    }

    #[test]
    fn test_parse_object_response_with_fence() {
        let raw = "```json\n{\"tests\": [{\"test\": \"Log in\", \"expected\": \"Dashboard shows\"}, \"Log out\"]}\n```";
        let items = parse_checklist_response(raw).unwrap();
        assert_eq!(items, vec!["Log in (expected: Dashboard shows)", "Log out"]);
    }

    #[test]
    fn test_parse_invalid_response() {
        assert!(matches!(
            parse_checklist_response("Sure! Here are some tests"),
            Err(ChecklistError::ParseFailure(_))
        ));
        assert!(parse_checklist_response(r#"{"steps": []}"#).is_err());
        assert!(parse_checklist_response(r#"["ok", 42]"#).is_err());
    }

    #[tokio::test]
    async fn test_fallback_on_failure() {
        let items = generate_with_fallback(&FailingGenerator, &request()).await;
        assert_eq!(items, vec!["Login form", "Logout button"]);
    }

    #[tokio::test]
    async fn test_accomplishments_generator() {
        let generator = AccomplishmentsChecklist;
        let items = generator.generate_checklist(&ChecklistRequest::default()).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(generator.name(), "accomplishments");
    }
}
