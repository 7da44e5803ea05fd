//! The application and its HTTP server.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or Ctrl-C the server:
//! 1. Stops `listener.accept()` immediately, so no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Closes the database pool, if one was created.
//! 4. Returns from [`Server::serve`], which lets `main` exit cleanly.

use std::net::SocketAddr;
use std::sync::Arc;

use http::StatusCode;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::OnceCell;
use tracing::{Instrument, error, info, info_span, warn};

use crate::config::DbConfig;
use crate::db::Database;
use crate::error::Error;
use crate::method::Method;
use crate::reply::normalize;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use crate::template::{NoTemplates, Templates};

/// Routes, templates and the database pool of one web application.
pub struct App {
    router: Router,
    templates: Arc<dyn Templates>,
    database: OnceCell<Database>,
}

impl App {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            templates: Arc::new(NoTemplates),
            database: OnceCell::new(),
        }
    }

    /// Sets the engine rendering `__template__` replies.
    pub fn templates(mut self, templates: impl Templates) -> Self {
        self.templates = Arc::new(templates);
        self
    }

    /// Opens the application's pool. Only the first successful call creates
    /// it; later calls return the same pool and ignore `config`.
    pub async fn create_pool(&self, config: &DbConfig) -> Result<Database, Error> {
        self.database
            .get_or_try_init(|| Database::create_pool(config))
            .await
            .cloned()
    }

    /// Uses an already opened pool. Returns `false` if the app has one.
    pub fn set_database(&self, db: Database) -> bool {
        self.database.set(db).is_ok()
    }

    pub fn database(&self) -> Option<&Database> {
        self.database.get()
    }

    /// Routes `req`, runs its handler and normalizes the reply.
    pub async fn handle(&self, mut req: Request) -> Response {
        let Some((handler, params)) = self.router.lookup(req.method(), req.path()) else {
            return Response::status(StatusCode::NOT_FOUND);
        };
        req.params = params;

        match handler.call(req, self.database.get().cloned()).await {
            Ok(reply) => normalize(reply, self.templates.as_ref()),
            Err(e) => {
                warn!(handler = handler.name(), error = %e, "request rejected");
                e.into_response()
            }
        }
    }
}

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust,no_run
    /// use quill::Server;
    /// let server = Server::bind(([127, 0, 0, 1], 9000).into());
    /// ```
    pub fn bind(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Starts accepting connections and dispatching them through `app`.
    ///
    /// Returns only after a full graceful shutdown.
    pub async fn serve(self, app: App) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let app = Arc::new(app);

        info!(addr = %self.addr, "server started");

        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown wins over queued connections.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            async move { serve_one(&app, req).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        if let Some(db) = app.database() {
            db.close();
        }
        info!("server stopped");
        Ok(())
    }
}

/// One hyper request in, one response out. Every failure becomes a status
/// code, so hyper never sees an error.
async fn serve_one(
    app: &App,
    req: hyper::Request<hyper::body::Incoming>,
) -> Result<http::Response<http_body_util::Full<bytes::Bytes>>, std::convert::Infallible> {
    let span = info_span!("request", method = %req.method(), path = req.uri().path());

    let response = async {
        let Ok(method) = req.method().as_str().parse::<Method>() else {
            return Response::status(StatusCode::METHOD_NOT_ALLOWED);
        };
        match Request::from_hyper(method, req).await {
            Ok(req) => app.handle(req).await,
            Err(e) => {
                warn!("failed to read request body: {e}");
                Response::status(StatusCode::BAD_REQUEST)
            }
        }
    }
    .instrument(span)
    .await;

    Ok(response.into_inner())
}

/// Resolves on the first shutdown signal the process receives: SIGTERM or
/// SIGINT on Unix, Ctrl-C elsewhere. A signal handler that cannot be
/// installed disables its arm instead of stopping the server.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
