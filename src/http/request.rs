use std::collections::HashMap;

use serde::de::DeserializeOwned;

use super::Version;
use crate::error::SerializationError;

pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// The decomposed `Content-Type` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    pub media_type: String,
    pub boundary: Option<String>,
}

impl ContentType {
    pub fn is_multipart(&self) -> bool {
        self.media_type == MULTIPART_FORM_DATA
    }
}

/// A parsed request. Built once per connection by the parser; route params
/// are bound by the dispatcher before the request is shared with middleware
/// and handlers.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub(crate) method: String,
    pub(crate) path: String,
    pub(crate) target: String,
    pub(crate) version: Version,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) query: HashMap<String, String>,
    pub(crate) params: HashMap<String, String>,
    pub(crate) cookies: HashMap<String, String>,
    pub(crate) body: String,
    pub(crate) content_type: Option<ContentType>,
    pub(crate) files: Option<HashMap<String, String>>,
}

impl Request {
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The request path without its query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw request target as sent, query string included.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The protocol token from the request line. Unrecognized tokens are kept
    /// as [`Version::Unknown`].
    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Deserializes the body as JSON.
    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, SerializationError> {
        Ok(serde_json::from_str(&self.body)?)
    }

    pub fn content_type(&self) -> Option<&ContentType> {
        self.content_type.as_ref()
    }

    /// Uploaded parts, present only for `multipart/form-data` requests.
    pub fn files(&self) -> Option<&HashMap<String, String>> {
        self.files.as_ref()
    }

    pub fn file(&self, name: &str) -> Option<&str> {
        self.files.as_ref()?.get(name).map(String::as_str)
    }
}
