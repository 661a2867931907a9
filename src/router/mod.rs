use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, RouteConfigError};
use crate::executor::DataExecutor;
use crate::http::{Method, Request, Response};
use crate::middleware::MiddlewareChain;

pub mod matcher;

pub type PlainHandler = dyn Fn(&Request, Response) -> Result<Response> + Send + Sync;
pub type DataHandler = dyn Fn(&Request, Response, &dyn DataExecutor) -> Result<Response> + Send + Sync;

/// What a route runs once it is selected.
#[derive(Clone)]
pub enum Handler {
    Plain(Arc<PlainHandler>),
    /// Receives the server's shared data executor as well.
    Data(Arc<DataHandler>),
}

impl Handler {
    pub fn plain<F>(f: F) -> Self
    where
        F: Fn(&Request, Response) -> Result<Response> + Send + Sync + 'static,
    {
        Handler::Plain(Arc::new(f))
    }

    pub fn data<F>(f: F) -> Self
    where
        F: Fn(&Request, Response, &dyn DataExecutor) -> Result<Response> + Send + Sync + 'static,
    {
        Handler::Data(Arc::new(f))
    }

    pub fn needs_executor(&self) -> bool {
        matches!(self, Handler::Data(_))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Plain(_) => f.write_str("Handler::Plain"),
            Handler::Data(_) => f.write_str("Handler::Data"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Route {
    method: Method,
    pattern: String,
    handler: Handler,
}

impl Route {
    pub fn new(method: Method, pattern: impl Into<String>, handler: Handler) -> Self {
        Route {
            method,
            pattern: pattern.into(),
            handler,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// Method, path segments and query predicates must all agree.
    pub fn matches(&self, request: &Request) -> bool {
        matcher::matches(
            self.method.as_str(),
            &self.pattern,
            request.method(),
            request.path(),
            request.query(),
        )
    }

    pub fn has_params(&self) -> bool {
        matcher::segments(matcher::path_only(&self.pattern))
            .iter()
            .any(|segment| segment.starts_with(':'))
    }
}

/// The route table plus its middleware. Built once before the server starts,
/// read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
    middleware: MiddlewareChain,
}

impl Router {
    pub fn new() -> Self {
        Router::default()
    }

    /// Registers a route under a method given as text, rejecting methods
    /// outside the allowed set.
    pub fn add_route(&mut self, method: &str, pattern: &str, handler: Handler) -> Result<&mut Self, RouteConfigError> {
        let method = method.parse::<Method>()?;
        Ok(self.route(method, pattern, handler))
    }

    /// Like [`Router::add_route`] for a handler that needs the data executor.
    pub fn add_data_route<F>(&mut self, method: &str, pattern: &str, f: F) -> Result<&mut Self, RouteConfigError>
    where
        F: Fn(&Request, Response, &dyn DataExecutor) -> Result<Response> + Send + Sync + 'static,
    {
        self.add_route(method, pattern, Handler::data(f))
    }

    pub fn route(&mut self, method: Method, pattern: &str, handler: Handler) -> &mut Self {
        self.routes.push(Route::new(method, pattern, handler));
        self
    }

    pub fn get<F>(&mut self, pattern: &str, f: F) -> &mut Self
    where
        F: Fn(&Request, Response) -> Result<Response> + Send + Sync + 'static,
    {
        self.route(Method::Get, pattern, Handler::plain(f))
    }

    pub fn post<F>(&mut self, pattern: &str, f: F) -> &mut Self
    where
        F: Fn(&Request, Response) -> Result<Response> + Send + Sync + 'static,
    {
        self.route(Method::Post, pattern, Handler::plain(f))
    }

    pub fn put<F>(&mut self, pattern: &str, f: F) -> &mut Self
    where
        F: Fn(&Request, Response) -> Result<Response> + Send + Sync + 'static,
    {
        self.route(Method::Put, pattern, Handler::plain(f))
    }

    pub fn options<F>(&mut self, pattern: &str, f: F) -> &mut Self
    where
        F: Fn(&Request, Response) -> Result<Response> + Send + Sync + 'static,
    {
        self.route(Method::Options, pattern, Handler::plain(f))
    }

    pub fn get_with_db<F>(&mut self, pattern: &str, f: F) -> &mut Self
    where
        F: Fn(&Request, Response, &dyn DataExecutor) -> Result<Response> + Send + Sync + 'static,
    {
        self.route(Method::Get, pattern, Handler::data(f))
    }

    pub fn post_with_db<F>(&mut self, pattern: &str, f: F) -> &mut Self
    where
        F: Fn(&Request, Response, &dyn DataExecutor) -> Result<Response> + Send + Sync + 'static,
    {
        self.route(Method::Post, pattern, Handler::data(f))
    }

    /// Adds middleware that runs for every route whose pattern starts with `key`.
    pub fn middleware<F>(&mut self, key: &str, f: F) -> &mut Self
    where
        F: Fn(&Request, &mut Response) -> Result<()> + Send + Sync + 'static,
    {
        self.middleware.register(key, f);
        self
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn middleware_chain(&self) -> &MiddlewareChain {
        &self.middleware
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// The first registered route matching `request`.
    pub fn find(&self, request: &Request) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(request))
    }

    /// Binds params from every parameterized route in the table, later
    /// routes overwriting earlier ones.
    pub fn bind_all_params(&self, path: &str) -> HashMap<String, String> {
        self.routes
            .iter()
            .filter(|route| route.has_params())
            .flat_map(|route| matcher::bind_params(route.pattern(), path))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::parser::parse;

    fn request(method: &str, target: &str) -> Request {
        parse(&format!("{method} {target} HTTP/1.1\r\n\r\n")).unwrap()
    }

    fn ok(_: &Request, response: Response) -> Result<Response> {
        Ok(response)
    }

    #[test]
    fn test_add_route_rejects_unsupported_method() {
        let mut router = Router::new();
        let err = router.add_route("DELETE", "/users", Handler::plain(ok)).unwrap_err();
        assert_eq!(err, RouteConfigError::UnsupportedMethod { method: "DELETE".to_string() });
        assert!(router.is_empty());

        router.add_route("PUT", "/users", Handler::plain(ok)).unwrap();
        assert_eq!(router.routes()[0].method(), Method::Put);
    }

    #[test]
    fn test_first_registered_route_wins() {
        let mut router = Router::new();
        router.get("/users/:id", ok).get("/users/me", ok);

        let route = router.find(&request("GET", "/users/me")).unwrap();
        assert_eq!(route.pattern(), "/users/:id");
    }

    #[test]
    fn test_method_must_match_exactly() {
        let mut router = Router::new();
        router.post("/data", ok);

        assert!(router.find(&request("POST", "/data")).is_some());
        assert!(router.find(&request("GET", "/data")).is_none());
        assert!(router.find(&request("post", "/data")).is_none());
    }

    #[test]
    fn test_query_predicate_routes() {
        let mut router = Router::new();
        router.get("/json/?id=str", ok);

        assert!(router.find(&request("GET", "/json/?id=abc")).is_some());
        assert!(router.find(&request("GET", "/json/?id=123")).is_none());
        assert!(router.find(&request("GET", "/json/")).is_none());
    }

    #[test]
    fn test_bare_route_shadows_later_predicate_route() {
        let mut shadowed = Router::new();
        shadowed.get("/json", ok).get("/json/?id=str", ok);
        let route = shadowed.find(&request("GET", "/json/?id=abc")).unwrap();
        assert_eq!(route.pattern(), "/json");

        let mut ordered = Router::new();
        ordered.get("/json/?id=str", ok).get("/json", ok);
        let route = ordered.find(&request("GET", "/json/?id=abc")).unwrap();
        assert_eq!(route.pattern(), "/json/?id=str");
        let route = ordered.find(&request("GET", "/json/?id=123")).unwrap();
        assert_eq!(route.pattern(), "/json");
    }

    #[test]
    fn test_data_routes_are_flagged() {
        let mut router = Router::new();
        router.get_with_db("/users", |_, response, _| Ok(response));
        router.add_data_route("PUT", "/users/:id", |_, response, _| Ok(response)).unwrap();
        router.get("/", ok);

        let flags: Vec<bool> = router.routes().iter().map(|r| r.handler().needs_executor()).collect();
        assert_eq!(flags, vec![true, true, false]);
        assert!(router.add_data_route("PATCH", "/users", |_, response, _| Ok(response)).is_err());
    }

    #[test]
    fn test_bind_all_params_scans_every_parameterized_route() {
        let mut router = Router::new();
        router
            .post("/upload", ok)
            .post("/upload/:data", ok)
            .post("/upload/:data/:mango", ok)
            .get("/other/:slot", ok);

        let params = router.bind_all_params("/upload/a/b");
        assert_eq!(params.get("data").map(String::as_str), Some("a"));
        assert_eq!(params.get("mango").map(String::as_str), Some("b"));
        // bound from an unrelated pattern
        assert_eq!(params.get("slot").map(String::as_str), Some("a"));
    }
}
