use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use super::{Cookie, StatusCode, Version};
use crate::error::{NotFoundError, SerializationError};

pub const POWERED_BY: &str = concat!("HttpPipeline/", env!("CARGO_PKG_VERSION"));
const DEFAULT_CONTENT_TYPE: &str = "text/plain";
const DEFAULT_STATIC_ROOT: &str = "./www";

// Headers the serializer always writes itself.
const RESERVED_HEADERS: [&str; 5] = ["Content-Type", "Content-Length", "Connection", "X-Powered-By", "Date"];

/// Maps a file extension to its MIME type.
pub fn mime_type(extension: &str) -> &'static str {
    match extension {
        "html" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub version: Version,
    status_code: StatusCode,
    content_type: Option<String>,
    headers: HashMap<String, String>,
    cookies: Vec<Cookie>,
    body: Vec<u8>,
    static_root: Arc<PathBuf>,
}

impl Default for Response {
    fn default() -> Self {
        Response::new(StatusCode::OK)
    }
}

impl Response {
    /// Creates a new `Response` with the given status code.
    ///
    /// # Arguments
    ///
    /// * `status_code` - The HTTP status code for the response.
    ///
    /// # Returns
    ///
    /// A new `Response` with HTTP/1.1 as its version, no content type, an empty
    /// body and `./www` as the static root.
    pub fn new(status_code: StatusCode) -> Response {
        Response {
            version: Version::HTTP1_1,
            status_code,
            content_type: None,
            headers: HashMap::new(),
            cookies: Vec::new(),
            body: Vec::new(),
            static_root: Arc::new(PathBuf::from(DEFAULT_STATIC_ROOT)),
        }
    }

    /// Creates a fresh 200 response that resolves files under `static_root`.
    pub fn with_static_root(static_root: Arc<PathBuf>) -> Response {
        Response {
            static_root,
            ..Response::default()
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status_code
    }

    /// Replaces the status code. Any code is accepted; unknown ones serialize
    /// with the reason phrase `Unknown Status`.
    ///
    /// # Arguments
    ///
    /// * `status` - A `StatusCode` or a raw `u16`.
    pub fn set_status(&mut self, status: impl Into<StatusCode>) {
        self.status_code = status.into();
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Sets the "Content-Type" header of the response.
    ///
    /// # Arguments
    ///
    /// * `content_type` - A string slice representing the MIME type of the response body.
    pub fn set_content_type(&mut self, content_type: &str) {
        self.content_type = Some(content_type.to_string());
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_string(), value.to_string());
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Sets the body of the response. "Content-Length" is computed from it
    /// when the response is serialized.
    ///
    /// # Arguments
    ///
    /// * `body` - Anything convertible into the body bytes, such as a `String` or `&str`.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn add_cookie(&mut self, cookie: Cookie) {
        self.cookies.push(cookie);
    }

    pub fn cookie(&self, name: &str) -> Option<&Cookie> {
        self.cookies.iter().find(|cookie| cookie.name() == name)
    }

    pub fn static_root(&self) -> &Path {
        &self.static_root
    }

    /// Serializes `value` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), SerializationError> {
        let body = serde_json::to_vec(value)?;
        self.set_content_type("application/json");
        self.body = body;
        Ok(())
    }

    /// Loads `route` from the static root into the body.
    ///
    /// Fails if the file does not exist or its canonical path lies outside
    /// the canonical static root.
    pub fn http_file_response(&mut self, route: &str) -> Result<(), NotFoundError> {
        let file = resolve_static(&self.static_root, route)?;
        let body = fs::read(&file).map_err(|_| NotFoundError::File { route: route.to_string() })?;

        let extension = file.extension().and_then(|e| e.to_str()).unwrap_or_default();
        self.set_content_type(mime_type(extension));
        self.body = body;
        Ok(())
    }

    /// Converts the response to a vector of bytes suitable for sending over a network.
    ///
    /// # Returns
    ///
    /// The status line, the fixed headers (`Content-Type`, `Content-Length`,
    /// `Connection`, `X-Powered-By`, `Date`), one `Set-Cookie` line per cookie,
    /// the extra headers, a blank line and the body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!(
            "{} {} {}\r\n",
            self.version,
            self.status_code.as_u16(),
            self.status_code.reason_phrase()
        );

        head.push_str(&format!(
            "Content-Type: {}\r\n",
            self.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE)
        ));
        head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        head.push_str("Connection: close\r\n");
        head.push_str(&format!("X-Powered-By: {POWERED_BY}\r\n"));
        head.push_str(&format!(
            "Date: {}\r\n",
            chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT")
        ));

        for cookie in &self.cookies {
            head.push_str(&format!("Set-Cookie: {cookie}\r\n"));
        }

        for (key, value) in &self.headers {
            if RESERVED_HEADERS.iter().any(|reserved| reserved.eq_ignore_ascii_case(key)) {
                continue;
            }
            head.push_str(&format!("{key}: {value}\r\n"));
        }

        // Empty line separating headers and body
        head.push_str("\r\n");

        let mut response = head.into_bytes();
        response.extend_from_slice(&self.body);
        response
    }
}

fn resolve_static(root: &Path, route: &str) -> Result<PathBuf, NotFoundError> {
    let not_found = || NotFoundError::File { route: route.to_string() };

    let root = root.canonicalize().map_err(|_| not_found())?;
    let file = root
        .join(route.trim_start_matches('/'))
        .canonicalize()
        .map_err(|_| not_found())?;

    if !file.starts_with(&root) {
        return Err(NotFoundError::OutsideRoot { route: route.to_string() });
    }
    if !file.is_file() {
        return Err(not_found());
    }
    Ok(file)
}
