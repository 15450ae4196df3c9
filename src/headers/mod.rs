//! Response header handling.
//!
//! Header names are case-insensitive and a repeated insert replaces the
//! previous value. A handful of service headers carry request metadata
//! (sub-status, activity id, charge, retry hint); everything else passes
//! through untouched.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Well-known service header names.
pub mod names {
    /// Finer-grained status code.
    pub const SUB_STATUS: &str = "x-ms-substatus";
    /// Service-issued correlation id.
    pub const ACTIVITY_ID: &str = "x-ms-activity-id";
    /// Request units consumed.
    pub const REQUEST_CHARGE: &str = "x-ms-request-charge";
    /// Retry hint in milliseconds.
    pub const RETRY_AFTER_MS: &str = "x-ms-retry-after-ms";
    /// Continuation token for paged reads.
    pub const CONTINUATION: &str = "x-ms-continuation";
}

/// Rejected header name or value.
#[derive(Debug, Clone, Error)]
#[error("Invalid header '{name}': {reason}")]
pub struct InvalidHeader {
    /// The offending header name.
    pub name: String,
    /// Why it was rejected.
    pub reason: String,
}

/// Case-insensitive response header set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    inner: HeaderMap,
}

impl Headers {
    /// Creates an empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a header set from the store layer's native header map.
    ///
    /// Multi-valued entries collapse to their last value.
    pub fn from_native(native: &HeaderMap) -> Self {
        let mut inner = HeaderMap::with_capacity(native.keys_len());
        for (name, value) in native.iter() {
            inner.insert(name.clone(), value.clone());
        }
        Self { inner }
    }

    /// Inserts a header, replacing any existing value for the same name.
    pub fn insert(&mut self, name: &str, value: &str) -> Result<(), InvalidHeader> {
        let header_name = HeaderName::from_str(name).map_err(|e| InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        self.inner.insert(header_name, header_value);
        Ok(())
    }

    /// Returns the value of a header, if present and printable.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns true if the header is present.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.inner.keys_len()
    }

    /// Returns true if no headers are set.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterates over printable headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str(), v)))
    }

    /// Borrows the underlying header map.
    pub fn as_native(&self) -> &HeaderMap {
        &self.inner
    }

    /// Sub-status code, zero when absent or malformed.
    pub fn sub_status(&self) -> u32 {
        self.get(names::SUB_STATUS)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Sets the sub-status code.
    pub fn set_sub_status(&mut self, sub_status: u32) {
        self.inner.insert(names::SUB_STATUS, HeaderValue::from(sub_status));
    }

    /// Activity id, if present.
    pub fn activity_id(&self) -> Option<&str> {
        self.get(names::ACTIVITY_ID).filter(|s| !s.is_empty())
    }

    /// Sets the activity id. Non-printable ids are ignored.
    pub fn set_activity_id(&mut self, activity_id: &str) {
        if let Ok(value) = HeaderValue::from_str(activity_id) {
            self.inner.insert(names::ACTIVITY_ID, value);
        }
    }

    /// Request charge, zero when absent or malformed.
    pub fn request_charge(&self) -> f64 {
        self.get(names::REQUEST_CHARGE)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0.0)
    }

    /// Sets the request charge.
    pub fn set_request_charge(&mut self, charge: f64) {
        if let Ok(value) = HeaderValue::from_str(&charge.to_string()) {
            self.inner.insert(names::REQUEST_CHARGE, value);
        }
    }

    /// Retry hint.
    ///
    /// Prefers the millisecond service header and falls back to the
    /// standard `Retry-After` seconds header.
    pub fn retry_after(&self) -> Option<Duration> {
        if let Some(ms) = self
            .get(names::RETRY_AFTER_MS)
            .and_then(|s| s.trim().parse::<u64>().ok())
        {
            return Some(Duration::from_millis(ms));
        }

        self.inner
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Sets the retry hint, in milliseconds.
    pub fn set_retry_after(&mut self, retry_after: Duration) {
        let ms = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX);
        self.inner.insert(names::RETRY_AFTER_MS, HeaderValue::from(ms));
    }

    /// Continuation token, if present.
    pub fn continuation(&self) -> Option<&str> {
        self.get(names::CONTINUATION).filter(|s| !s.is_empty())
    }
}

impl From<HeaderMap> for Headers {
    fn from(inner: HeaderMap) -> Self {
        Self::from_native(&inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_last_write_wins() {
        let mut headers = Headers::new();
        headers.insert("X-Custom", "one").unwrap();
        headers.insert("x-custom", "two").unwrap();

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("X-CUSTOM"), Some("two"));
    }

    #[test]
    fn test_well_known_accessors() {
        let mut headers = Headers::new();
        headers.set_sub_status(1002);
        headers.set_activity_id("b0e5c6e8-0000-0000-0000-000000000000");
        headers.set_request_charge(2.5);
        headers.set_retry_after(Duration::from_millis(150));

        assert_eq!(headers.sub_status(), 1002);
        assert_eq!(
            headers.activity_id(),
            Some("b0e5c6e8-0000-0000-0000-000000000000")
        );
        assert_eq!(headers.request_charge(), 2.5);
        assert_eq!(headers.retry_after(), Some(Duration::from_millis(150)));
    }

    #[test]
    fn test_retry_after_seconds_fallback() {
        let mut headers = Headers::new();
        headers.insert("Retry-After", "3").unwrap();
        assert_eq!(headers.retry_after(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_missing_values_default() {
        let headers = Headers::new();
        assert_eq!(headers.sub_status(), 0);
        assert_eq!(headers.request_charge(), 0.0);
        assert!(headers.activity_id().is_none());
        assert!(headers.retry_after().is_none());
        assert!(headers.continuation().is_none());
    }

    #[test]
    fn test_from_native_keeps_order() {
        let mut native = HeaderMap::new();
        native.insert("x-ms-activity-id", HeaderValue::from_static("abc"));
        native.insert("etag", HeaderValue::from_static("\"1\""));
        native.append("etag", HeaderValue::from_static("\"2\""));

        let headers = Headers::from_native(&native);
        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(pairs, vec![("x-ms-activity-id", "abc"), ("etag", "\"2\"")]);
        assert_eq!(headers.as_native().get_all("etag").iter().count(), 1);
        assert_eq!(native.get_all("etag").iter().count(), 2);
    }

    #[test]
    fn test_invalid_header_rejected() {
        let mut headers = Headers::new();
        assert!(headers.insert("bad header", "v").is_err());
        assert!(headers.insert("x-ok", "line\nbreak").is_err());
    }
}
