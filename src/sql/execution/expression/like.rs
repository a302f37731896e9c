//! LIKE pattern matching.
//!
//! Patterns are translated to anchored regular expressions once and kept in a
//! process-wide cache keyed by pattern text and escape character.

use crate::sql::error::{SqlError, SqlResult};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

/// Global cache of compiled LIKE patterns
static LIKE_CACHE: OnceLock<Mutex<HashMap<(String, char), Arc<Regex>>>> = OnceLock::new();

/// Maximum number of compiled patterns to cache
const MAX_LIKE_CACHE_SIZE: usize = 1000;

/// Translate a LIKE pattern into regex source.
///
/// `%` matches any run of characters, `_` exactly one, and `escape` makes the
/// following pattern character literal. A trailing escape is an error.
pub fn like_to_regex(pattern: &str, escape: char) -> SqlResult<String> {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("(?s)^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c == escape {
            match chars.next() {
                Some(literal) => out.push_str(&regex::escape(&literal.to_string())),
                None => {
                    return Err(SqlError::execution_error(format!(
                        "LIKE pattern '{}' ends with its escape character",
                        pattern
                    )))
                }
            }
        } else if c == '%' {
            out.push_str(".*");
        } else if c == '_' {
            out.push('.');
        } else {
            out.push_str(&regex::escape(&c.to_string()));
        }
    }
    out.push('$');
    Ok(out)
}

/// Get or compile the matcher for a LIKE pattern
pub fn get_cached_like(pattern: &str, escape: char) -> SqlResult<Arc<Regex>> {
    let cache = LIKE_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut cache_guard = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let key = (pattern.to_string(), escape);
    if let Some(cached) = cache_guard.get(&key) {
        return Ok(Arc::clone(cached));
    }

    let source = like_to_regex(pattern, escape)?;
    let regex = Regex::new(&source).map_err(|e| {
        SqlError::execution_error(format!("Invalid LIKE pattern '{}': {}", pattern, e))
    })?;
    let regex = Arc::new(regex);

    if cache_guard.len() >= MAX_LIKE_CACHE_SIZE {
        cache_guard.clear();
    }
    cache_guard.insert(key, Arc::clone(&regex));
    Ok(regex)
}

/// Whole-string LIKE match
pub fn like_matches(value: &str, pattern: &str, escape: char) -> SqlResult<bool> {
    Ok(get_cached_like(pattern, escape)?.is_match(value))
}
