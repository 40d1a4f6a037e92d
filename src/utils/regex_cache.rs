//! Compiled regex cache shared by the output parsers
//!
//! Adapters match the same handful of patterns against every output line of
//! every listing call; compiling each pattern once keeps parsing cheap.

use crate::error::{EngineError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, PoisonError};

static REGEX_CACHE: LazyLock<Mutex<HashMap<String, Regex>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Get or compile `pattern`. `Regex` clones share the compiled program.
pub fn get_cached_regex(pattern: &str) -> Result<Regex> {
    let mut cache = REGEX_CACHE.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(regex) = cache.get(pattern) {
        return Ok(regex.clone());
    }

    let regex =
        Regex::new(pattern).map_err(|e| EngineError::InvalidRegex(format!("{}: {}", pattern, e)))?;
    cache.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

pub fn is_cached(pattern: &str) -> bool {
    REGEX_CACHE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .contains_key(pattern)
}

#[cfg(test)]
mod tests;
