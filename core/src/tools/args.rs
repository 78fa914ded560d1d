//! Boundary validation for tool arguments.

use super::error::{ToolError, ToolResult};
use serde_json::Value;
use url::Url;

/// Non-empty string field
pub fn required_text(args: &Value, field: &str) -> ToolResult<String> {
    let value = args
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{}'", field)))?;

    if value.trim().is_empty() {
        return Err(ToolError::InvalidArguments(format!(
            "'{}' must not be empty",
            field
        )));
    }
    Ok(value.to_string())
}

/// Absolute http(s) URL field
pub fn required_url(args: &Value, field: &str) -> ToolResult<String> {
    let raw = required_text(args, field)?;
    validate_url(field, &raw)?;
    Ok(raw)
}

/// Optional array of http(s) URLs; an empty array counts as absent
pub fn optional_urls(args: &Value, field: &str) -> ToolResult<Option<Vec<String>>> {
    let items = match args.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ToolError::InvalidArguments(format!(
                "'{}' must be an array of URLs",
                field
            )))
        }
    };

    let urls = items
        .iter()
        .map(|item| {
            let raw = item.as_str().ok_or_else(|| {
                ToolError::InvalidArguments(format!("'{}' entries must be strings", field))
            })?;
            validate_url(field, raw)?;
            Ok(raw.to_string())
        })
        .collect::<ToolResult<Vec<_>>>()?;

    Ok(if urls.is_empty() { None } else { Some(urls) })
}

/// Optional strictly positive number
pub fn optional_positive_number(args: &Value, field: &str) -> ToolResult<Option<f64>> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let number = value
                .as_f64()
                .filter(|n| n.is_finite() && *n > 0.0)
                .ok_or_else(|| {
                    ToolError::InvalidArguments(format!(
                        "'{}' must be a positive number",
                        field
                    ))
                })?;
            Ok(Some(number))
        }
    }
}

fn validate_url(field: &str, raw: &str) -> ToolResult<()> {
    let url = Url::parse(raw.trim()).map_err(|e| {
        ToolError::InvalidArguments(format!("'{}' is not a valid URL: {}", field, e))
    })?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(()),
        _ => Err(ToolError::InvalidArguments(format!(
            "'{}' must be an http(s) URL",
            field
        ))),
    }
}
