//! Per-connection processing: read, fast path, parse, match, middleware,
//! handle, serialize, write.

use std::ffi::OsStr;
use std::io::{self, ErrorKind, Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{NotFoundPolicy, ParamBinding, ServerConfig};
use crate::error::{Error, Result};
use crate::executor::DataExecutor;
use crate::http::{Request, Response, StatusCode, parser};
use crate::router::{Handler, Route, Router, matcher};

/// Sent for empty, `OPTIONS` and favicon requests without touching the router.
pub const FAST_PATH_RESPONSE: &[u8] = b"HTTP/1.1 204 No Content\r\n\
Access-Control-Allow-Origin: *\r\n\
Access-Control-Allow-Methods: POST, GET, OPTIONS\r\n\
Access-Control-Allow-Headers: Content-Type\r\n\
\r\n";

const FAVICON_PATH: &str = "/favicon.ico";
const NOT_FOUND_DOCUMENT: &str = "/notfound.html";
const NOT_FOUND_HTML: &[u8] = b"<html><body><h1>404 - Not Found</h1></body></html>";

/// Reads one request: up to the end of the head, then `Content-Length` body
/// bytes if the header is present, or until EOF.
pub fn read_request<R: Read>(reader: &mut R, max_bytes: usize) -> io::Result<String> {
    let mut buffer = [0; 4096];
    let mut request_data = Vec::new();

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        if bytes_read == 0 {
            break;
        }

        request_data.extend_from_slice(&buffer[..bytes_read]);

        if request_data.len() > max_bytes {
            return Err(io::Error::new(ErrorKind::InvalidData, "request too large"));
        }

        if is_complete(&request_data) {
            break;
        }
    }

    Ok(String::from_utf8_lossy(&request_data).into_owned())
}

fn is_complete(data: &[u8]) -> bool {
    let Some(head_end) = data.windows(4).position(|window| window == b"\r\n\r\n") else {
        return false;
    };

    let head = String::from_utf8_lossy(&data[..head_end]);
    let content_length = head
        .split("\r\n")
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("Content-Length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    data.len() - (head_end + 4) >= content_length
}

/// Empty input, `OPTIONS` of any path, and the favicon.
pub fn is_fast_path(raw: &str) -> bool {
    if raw.trim().is_empty() {
        return true;
    }

    let request_line = raw.split("\r\n").next().unwrap_or_default();
    let mut tokens = request_line.split(' ').filter(|token| !token.is_empty());
    let method = tokens.next();
    let path = tokens.next().map(matcher::path_only);

    method == Some("OPTIONS") || path == Some(FAVICON_PATH)
}

/// Runs requests against an immutable route table.
pub struct Dispatcher {
    router: Arc<Router>,
    executor: Option<Arc<dyn DataExecutor>>,
    static_root: Arc<PathBuf>,
    not_found: NotFoundPolicy,
    param_binding: ParamBinding,
    max_request_bytes: usize,
}

impl Dispatcher {
    pub fn new(router: Arc<Router>, config: &ServerConfig, executor: Option<Arc<dyn DataExecutor>>) -> Self {
        Dispatcher {
            router,
            executor,
            static_root: Arc::new(config.static_root.clone()),
            not_found: config.not_found,
            param_binding: config.param_binding,
            max_request_bytes: config.max_request_bytes,
        }
    }

    /// Handles one connection start to finish. On error nothing is written;
    /// the caller drops the stream either way.
    pub fn handle_connection<S: Read + Write>(&self, mut stream: S) -> Result<()> {
        let raw = read_request(&mut stream, self.max_request_bytes)?;

        let bytes = match panic::catch_unwind(AssertUnwindSafe(|| self.respond(&raw))) {
            Ok(result) => result?,
            Err(_) => return Err(Error::handler("handler panicked")),
        };

        stream.write_all(&bytes)?;
        stream.flush()?;
        Ok(())
    }

    /// Turns raw request text into the bytes to send back.
    ///
    /// Parse failures produce a 400. Middleware and handler errors are
    /// returned as-is and no response is produced.
    pub fn respond(&self, raw: &str) -> Result<Vec<u8>> {
        if is_fast_path(raw) {
            debug!("fast path request, answering 204");
            return Ok(FAST_PATH_RESPONSE.to_vec());
        }

        let mut request = match parser::parse(raw) {
            Ok(request) => request,
            Err(e) => {
                warn!(cause = %e, "failed to parse request");
                return Ok(bad_request().to_bytes());
            }
        };

        let route = self.router.find(&request);
        request.params = match self.param_binding {
            ParamBinding::MatchedRoute => route
                .map(|route| matcher::bind_params(route.pattern(), request.path()))
                .unwrap_or_default(),
            ParamBinding::AllParameterizedRoutes => self.router.bind_all_params(request.path()),
        };
        let request = request;

        // The fallback route's pattern is the requested path itself.
        let pattern = route.map_or(request.path(), Route::pattern);
        if route.is_none() {
            debug!(method = %request.method(), path = %request.path(), "no route matched");
        }

        let mut response = Response::with_static_root(Arc::clone(&self.static_root));
        self.router.middleware_chain().run(pattern, &request, &mut response)?;

        let response = match route {
            Some(route) => self.invoke(route, &request, response)?,
            None => self.not_found(&request, response),
        };

        info!(
            method = %request.method(),
            path = %request.path(),
            status = response.status().as_u16(),
            "request handled"
        );
        Ok(response.to_bytes())
    }

    fn invoke(&self, route: &Route, request: &Request, response: Response) -> Result<Response> {
        match route.handler() {
            Handler::Plain(handler) => handler(request, response),
            Handler::Data(handler) => {
                let executor = self.executor.as_deref().ok_or_else(|| Error::ExecutorUnavailable {
                    pattern: route.pattern().to_string(),
                })?;
                handler(request, response, executor)
            }
        }
    }

    fn not_found(&self, request: &Request, mut response: Response) -> Response {
        let path = request.path();
        let extension = Path::new(path).extension().and_then(OsStr::to_str);

        if self.not_found == NotFoundPolicy::ServeStaticAssets && matches!(extension, Some("css" | "js")) {
            match response.http_file_response(path) {
                Ok(()) => return response,
                Err(e) => warn!(cause = %e, path = %path, "static asset unavailable"),
            }
        }

        response.set_status(StatusCode::NOT_FOUND);
        if response.http_file_response(NOT_FOUND_DOCUMENT).is_err() {
            response.set_content_type("text/html");
            response.set_body(NOT_FOUND_HTML);
        }
        response
    }
}

fn bad_request() -> Response {
    let mut response = Response::new(StatusCode::BAD_REQUEST);
    response.set_content_type("text/plain");
    response.set_body("Bad Request");
    response
}
