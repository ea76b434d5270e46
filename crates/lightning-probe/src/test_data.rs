//! Test data fixtures and the inquiry hand-off file.
//!
//! Credentials live in `test-data/*.json`. The web form scenario writes the
//! inquiry number it created to `runtime/IXT.json`; a later scenario reads it
//! back to find the record.

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::result::{ProbeError, ProbeResult};

/// Key holding the business user in `users.json`
pub const BUSINESS_USER_KEY: &str = "Business_user_name_1";

/// Keys tried, in order, when reading the inquiry file
pub const INQUIRY_KEYS: [&str; 4] = ["ixt", "inquiryNumber", "IXT", "inquiry"];

/// Loads JSON fixtures from a directory and keeps them parsed
#[derive(Debug)]
pub struct TestDataReader {
    dir: PathBuf,
    cache: Mutex<HashMap<String, Arc<Value>>>,
}

impl TestDataReader {
    /// Reader over `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Fixture directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Parsed contents of `{dir}/{file_name}`, read from disk once
    pub fn load(&self, file_name: &str) -> ProbeResult<Arc<Value>> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = cache.get(file_name) {
            return Ok(Arc::clone(value));
        }
        let path = self.dir.join(file_name);
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "test data file unreadable");
            ProbeError::test_data(format!("test data file not found: {}: {e}", path.display()))
        })?;
        let value: Value = serde_json::from_str(&raw)
            .map_err(|e| ProbeError::test_data(format!("{}: {e}", path.display())))?;
        let value = Arc::new(value);
        cache.insert(file_name.to_string(), Arc::clone(&value));
        tracing::debug!(file = file_name, "test data loaded");
        Ok(value)
    }

    /// Forget every parsed file
    pub fn clear_cache(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Business user name from `users.json`
    pub fn business_username(&self) -> ProbeResult<String> {
        let users = self.load("users.json")?;
        business_username(&users).map_err(|err| {
            ProbeError::test_data(format!("{} in {}", err, self.dir.join("users.json").display()))
        })
    }
}

fn sole_string(object: &Map<String, Value>) -> Option<&str> {
    let mut strings = object.values().filter_map(Value::as_str);
    match (strings.next(), strings.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

/// Pick the business user out of a credentials document.
///
/// Looks under a `users` object when there is one, then tries
/// `Business_user_name_1`, the first key containing "business" (any case),
/// and finally the only string value.
pub fn business_username(users: &Value) -> ProbeResult<String> {
    let node = users.get("users").unwrap_or(users);
    let object = node
        .as_object()
        .ok_or_else(|| ProbeError::test_data("users data is not an object"))?;

    if let Some(name) = object
        .get(BUSINESS_USER_KEY)
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
    {
        return Ok(name.to_string());
    }
    let business = Regex::new("(?i)business").map_err(|e| ProbeError::test_data(e.to_string()))?;
    if let Some(name) = object
        .iter()
        .find(|(key, _)| business.is_match(key))
        .and_then(|(_, value)| value.as_str())
    {
        return Ok(name.to_string());
    }
    sole_string(object).map(str::to_string).ok_or_else(|| {
        ProbeError::test_data(format!(
            "could not determine business username; add \"{BUSINESS_USER_KEY}\""
        ))
    })
}

/// Inquiry number out of a parsed hand-off document
pub fn inquiry_from(value: &Value) -> Option<String> {
    if let Some(s) = value.as_str() {
        return (!s.is_empty()).then(|| s.to_string());
    }
    let object = value.as_object()?;
    INQUIRY_KEYS
        .iter()
        .find_map(|key| {
            object
                .get(*key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        })
        .or_else(|| sole_string(object))
        .map(str::to_string)
}

/// Read the inquiry number saved by an earlier scenario
pub fn read_inquiry(path: &Path) -> ProbeResult<String> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ProbeError::test_data(format!("failed to read inquiry file {}: {e}", path.display()))
    })?;
    let value: Value = serde_json::from_str(&raw).map_err(|e| {
        ProbeError::test_data(format!("failed to parse inquiry file {}: {e}", path.display()))
    })?;
    inquiry_from(&value).ok_or_else(|| {
        ProbeError::test_data(format!("could not determine inquiry number from {}", path.display()))
    })
}

/// Save `{"inquiry": id}` for later scenarios
pub fn write_inquiry(path: &Path, inquiry: &str) -> ProbeResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_string_pretty(&serde_json::json!({ "inquiry": inquiry }))?;
    std::fs::write(path, body)?;
    tracing::info!(inquiry, path = %path.display(), "inquiry number saved");
    Ok(())
}
