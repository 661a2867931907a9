use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::http::{Request, Response};

pub type Middleware = dyn Fn(&Request, &mut Response) -> Result<()> + Send + Sync;

/// Path-scoped middleware, kept in registration order.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    entries: Vec<(String, Arc<Middleware>)>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        MiddlewareChain::default()
    }

    /// Appends `f` under `key`. Entries sharing a key keep their relative order.
    pub fn register<F>(&mut self, key: &str, f: F)
    where
        F: Fn(&Request, &mut Response) -> Result<()> + Send + Sync + 'static,
    {
        self.entries.push((key.to_string(), Arc::new(f)));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs, in registration order, every middleware whose key is a prefix of
    /// `pattern`. The first error stops the chain and is returned.
    pub fn run(&self, pattern: &str, request: &Request, response: &mut Response) -> Result<()> {
        for (key, middleware) in self.entries.iter().filter(|(key, _)| pattern.starts_with(key.as_str())) {
            debug!(key = %key, pattern = %pattern, "running middleware");
            middleware(request, response)?;
        }
        Ok(())
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|(key, _)| key)).finish()
    }
}

/// Middleware that adds permissive Cross-Origin Resource Sharing (CORS) headers.
pub fn cors(_request: &Request, response: &mut Response) -> Result<()> {
    response.set_header("Access-Control-Allow-Origin", "*");
    response.set_header("Access-Control-Allow-Methods", "POST, GET, OPTIONS");
    response.set_header("Access-Control-Allow-Headers", "Content-Type");
    Ok(())
}
