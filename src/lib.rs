//! A small blocking HTTP/1.1 server with pattern routing, prefix-scoped
//! middleware, static files and an optional shared data executor.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;

pub use config::{AdmissionPolicy, NotFoundPolicy, ParamBinding, ServerConfig};
pub use error::{Error, Result};
pub use executor::{DataExecutor, Row};
pub use http::{Cookie, Request, Response, SameSite, StatusCode};
pub use router::{Handler, Router};
pub use server::Server;
