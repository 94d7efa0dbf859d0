//!
//! Small helpers shared by the configuration layer and the routers.
//!
//! - [`replace_handlebars_with_env`] - Template substitution for environment variables
//! - [`join_paths`] - Prefix joining used by router groups
//!

use {
    percent_encoding::percent_decode_str,
    regex::{Captures, Regex},
    std::{env, sync::LazyLock},
};

/// Regular expression pattern for matching handlebars-style environment variable references.
/// Matches patterns like `{{ VAR_NAME }}` with optional whitespace around the variable name.
/// Variable names must be uppercase letters, digits, or underscores (standard env var naming).
static HANDLEBAR_REGEXP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Z0-9_]+)\s*\}\}").unwrap());

///
/// Replaces `{{ VAR_NAME }}` placeholders with the value of the matching
/// environment variable. Missing variables become empty strings and are
/// reported with a warning.
///
/// ```
/// use switchyard::replace_handlebars_with_env;
///
/// let result = replace_handlebars_with_env("Path: {{ HOME }}/config");
/// assert!(result.starts_with("Path: "));
/// ```
///
pub fn replace_handlebars_with_env(input: &str) -> String {
    HANDLEBAR_REGEXP
        .replace_all(input, |caps: &Captures| {
            let var_name = &caps[1];
            env::var(var_name).unwrap_or_else(|_| {
                tracing::warn!(
                    variable = %var_name,
                    "Environment variable not found, substituting with empty string"
                );
                String::new()
            })
        })
        .to_string()
}

///
/// Joins a group prefix and a route path into one absolute path.
///
/// Slashes at the seam are normalized, runs of `/` collapse to one and a
/// trailing slash on `path` is kept:
///
/// ```
/// use switchyard::join_paths;
///
/// assert_eq!(join_paths("/api/", "/health"), "/api/health");
/// assert_eq!(join_paths("", "users/"), "/users/");
/// assert_eq!(join_paths("/api", ""), "/api");
/// ```
///
pub fn join_paths(prefix: &str, path: &str) -> String {
    let joined = if path.is_empty() {
        format!("/{}", prefix.trim_matches('/'))
    } else {
        format!(
            "{}/{}",
            prefix.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    };

    let mut normalized = String::with_capacity(joined.len() + 1);
    if !joined.starts_with('/') {
        normalized.push('/');
    }
    for ch in joined.chars() {
        if ch == '/' && normalized.ends_with('/') {
            continue;
        }
        normalized.push(ch);
    }
    normalized
}

/// Percent-decodes a captured path value, replacing invalid UTF-8 sequences.
pub(crate) fn decode_segment(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}
