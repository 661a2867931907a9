use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use futures::channel::oneshot;
use futures_executor::{ThreadPool, block_on};
use tracing::{debug, error, info, warn};

use crate::config::{AdmissionPolicy, ServerConfig};
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::executor::DataExecutor;
use crate::router::Router;

/// Accepts connections and hands each one to a worker in a fixed-size pool.
pub struct Server {
    config: ServerConfig,
    router: Router,
    executor: Option<Arc<dyn DataExecutor>>,
}

impl Server {
    pub fn new(config: ServerConfig, router: Router) -> Self {
        Server {
            config,
            router,
            executor: None,
        }
    }

    /// Shares `executor` with every data-aware route.
    pub fn with_executor(mut self, executor: Arc<dyn DataExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Fails on an invalid config, an empty route table, or a data route
    /// without an executor.
    pub fn check(&self) -> Result<()> {
        self.config.validate()?;
        if self.router.is_empty() {
            return Err(Error::NoRoutes);
        }
        if self.executor.is_none() {
            if let Some(route) = self.router.routes().iter().find(|route| route.handler().needs_executor()) {
                return Err(Error::ExecutorUnavailable {
                    pattern: route.pattern().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Binds the configured address and serves until the process exits.
    pub fn start(self) -> Result<()> {
        self.check()?;

        let address = self.config.address();
        let listener = match TcpListener::bind(&address) {
            Ok(listener) => listener,
            Err(e) => {
                error!(cause = %e, address = %address, "bind server error");
                return Err(e.into());
            }
        };

        self.serve(listener)
    }

    /// Runs the accept loop on an already bound listener.
    pub fn serve(self, listener: TcpListener) -> Result<()> {
        self.check()?;

        let Server { config, router, executor } = self;
        let pool = ThreadPool::builder()
            .pool_size(config.workers)
            .name_prefix(format!("{}-worker-", config.app_name))
            .create()?;
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(router), &config, executor));

        info!(
            app = %config.app_name,
            address = %listener.local_addr()?,
            workers = config.workers,
            admission = ?config.admission,
            "start listening"
        );

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => admit(&pool, &dispatcher, stream, config.read_timeout(), config.admission),
                Err(e) => warn!(cause = %e, "failed to accept"),
            }
        }

        Ok(())
    }
}

fn admit(
    pool: &ThreadPool,
    dispatcher: &Arc<Dispatcher>,
    stream: TcpStream,
    read_timeout: Duration,
    admission: AdmissionPolicy,
) {
    let peer = stream.peer_addr().ok();
    if let Err(e) = stream.set_read_timeout(Some(read_timeout)) {
        warn!(cause = %e, peer = ?peer, "failed to set read timeout");
        return;
    }

    let dispatcher = Arc::clone(dispatcher);
    let (done_tx, done_rx) = oneshot::channel();
    pool.spawn_ok(async move {
        debug!(peer = ?peer, "connection accepted");
        match dispatcher.handle_connection(stream) {
            Ok(()) => {}
            Err(Error::Io { source }) => warn!(cause = %source, peer = ?peer, "connection closed without response"),
            Err(e) => error!(cause = %e, peer = ?peer, "request failed, closing connection"),
        }
        let _ = done_tx.send(());
    });

    if admission == AdmissionPolicy::Serialized && block_on(done_rx).is_err() {
        warn!(peer = ?peer, "worker dropped the connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refuses_empty_route_table() {
        let server = Server::new(ServerConfig::default(), Router::new());
        assert!(matches!(server.check(), Err(Error::NoRoutes)));
    }

    fn single_route() -> Router {
        let mut router = Router::new();
        router.get("/", |_, response| Ok(response));
        router
    }

    #[test]
    fn test_refuses_invalid_config() {
        for config in [
            ServerConfig { workers: 0, ..ServerConfig::default() },
            ServerConfig { max_request_bytes: 0, ..ServerConfig::default() },
        ] {
            let server = Server::new(config, single_route());
            assert!(matches!(server.check(), Err(Error::Config { .. })));
        }
    }

    #[test]
    fn test_serve_with_zero_workers_returns_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let config = ServerConfig { workers: 0, ..ServerConfig::default() };
        let result = Server::new(config, single_route()).serve(listener);
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_refuses_data_route_without_executor() {
        let mut router = Router::new();
        router
            .get("/", |_, response| Ok(response))
            .post_with_db("/users", |_, response, _| Ok(response));

        let server = Server::new(ServerConfig::default(), router);
        assert!(matches!(
            server.check(),
            Err(Error::ExecutorUnavailable { pattern }) if pattern == "/users"
        ));
    }

    #[test]
    fn test_executor_satisfies_data_routes() {
        let mut router = Router::new();
        router.get_with_db("/users", |_, response, _| Ok(response));

        let executor = Arc::new(crate::executor::tests::MemoryExecutor::default());
        let server = Server::new(ServerConfig::default(), router).with_executor(executor);
        assert!(server.check().is_ok());
    }
}
