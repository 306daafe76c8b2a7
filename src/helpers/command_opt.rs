use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{PollError, PollResult};

pub type OptFinder<T> = fn(&Value, &str) -> PollResult<Option<T>>;

fn present<'a>(args: &'a Value, name: &str) -> Option<&'a Value> {
    args.get(name).filter(|v| !v.is_null())
}

fn wrong_type(name: &str, expected: &str) -> PollError {
    PollError::validation(format!("`{}` must be {}", name, expected))
}

pub fn find_string_opt(args: &Value, name: &str) -> PollResult<Option<String>> {
    match present(args, name) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(wrong_type(name, "a string")),
    }
}

/// Integers may arrive as JSON numbers or as numeric strings (query-string style).
pub fn find_integer_opt(args: &Value, name: &str) -> PollResult<Option<i64>> {
    match present(args, name) {
        None => Ok(None),
        Some(Value::Number(n)) => n.as_i64().map(Some).ok_or_else(|| wrong_type(name, "an integer")),
        Some(Value::String(s)) => s.trim().parse::<i64>().map(Some).map_err(|_| wrong_type(name, "an integer")),
        Some(_) => Err(wrong_type(name, "an integer")),
    }
}

pub fn find_string_list_opt(args: &Value, name: &str) -> PollResult<Option<Vec<String>>> {
    match present(args, name) {
        None => Ok(None),
        Some(Value::Array(items)) => items.iter()
            .map(|v| v.as_str().map(str::to_owned).ok_or_else(|| wrong_type(name, "a list of strings")))
            .collect::<PollResult<Vec<_>>>()
            .map(Some),
        Some(_) => Err(wrong_type(name, "a list of strings")),
    }
}

/// RFC 3339 timestamps, e.g. `2026-10-19T18:00:00Z`.
pub fn find_time_opt(args: &Value, name: &str) -> PollResult<Option<DateTime<Utc>>> {
    match find_string_opt(args, name)? {
        None => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(&s)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|_| wrong_type(name, "an RFC 3339 timestamp")),
    }
}

pub fn find_required<T>(args: &Value, finder: OptFinder<T>, name: &str) -> PollResult<T> {
    finder(args, name)?.ok_or_else(|| PollError::validation(format!("`{}` is required", name)))
}
