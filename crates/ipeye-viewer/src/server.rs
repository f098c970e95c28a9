use std::{convert::Infallible, io, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use http_body_util::{BodyExt, Full, combinators::UnsyncBoxBody};
use hyper::{
    Method, Request, Response, StatusCode,
    body::{Bytes, Incoming},
    header::{self, HeaderValue},
    server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, task::JoinHandle, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::{debug, error, info, warn};

use crate::{Result, catalog::CatalogManager};

/// Pause after an accept error that is not tied to a single connection.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

type BoxError = Box<dyn std::error::Error + Send + Sync>;
pub type Body = UnsyncBoxBody<Bytes, BoxError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "kebab-case"), default)]
pub struct Config {
    pub address: String,
    pub port: u16,
    pub static_dir: PathBuf,
    pub open_browser: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8080,
            static_dir: PathBuf::from("./static"),
            open_browser: true,
        }
    }
}

/// Serves `/cameras` from the catalog and everything else from the static directory.
#[derive(Clone)]
pub struct Router {
    catalog: Arc<CatalogManager>,
    static_files: ServeDir,
}

impl Router {
    pub fn new(catalog: Arc<CatalogManager>, static_dir: impl Into<PathBuf>) -> Self {
        Self {
            catalog,
            static_files: ServeDir::new(static_dir.into()),
        }
    }

    pub async fn handle<B>(&self, req: Request<B>) -> Response<Body>
    where
        B: Send + 'static,
    {
        if req.uri().path() != "/cameras" {
            return self.static_file(req).await;
        }

        if req.method() != Method::GET && req.method() != Method::HEAD {
            return respond(
                StatusCode::METHOD_NOT_ALLOWED,
                "text/plain; charset=utf-8",
                "Method Not Allowed",
            );
        }
        self.cameras().await
    }

    async fn cameras(&self) -> Response<Body> {
        let body = match self.catalog.devices().await {
            Ok(devices) => serde_json::to_vec(&devices).map_err(crate::Error::from),
            Err(err) => Err(err),
        };

        match body {
            Ok(body) => respond(StatusCode::OK, "application/json", body),
            Err(err) => {
                warn!(err = ?err, "Failed to serve camera catalog");
                respond(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "text/plain; charset=utf-8",
                    err.to_string(),
                )
            }
        }
    }

    async fn static_file<B>(&self, req: Request<B>) -> Response<Body>
    where
        B: Send + 'static,
    {
        match self.static_files.clone().oneshot(req).await {
            Ok(response) => response.map(|body| body.map_err(BoxError::from).boxed_unsync()),
            Err(never) => match never {},
        }
    }
}

fn respond(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Body> {
    let body = Full::new(body.into())
        .map_err(|never: Infallible| match never {})
        .boxed_unsync();
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

pub struct WebServer {
    router: Router,
    config: Config,
}

impl WebServer {
    pub fn new(router: Router, config: Config) -> Self {
        Self { router, config }
    }

    /// Binds the listener and spawns the serve loop. The returned handle owns
    /// the task; dropping it leaves the server running until the process exits.
    pub async fn start(self) -> Result<RunningServer> {
        let listener = TcpListener::bind((self.config.address.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let cancel = CancellationToken::new();

        let task = tokio::spawn(serve(listener, self.router, cancel.clone()));

        info!("Web server listening on http://{addr}");
        Ok(RunningServer { addr, cancel, task })
    }
}

pub struct RunningServer {
    addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        if self.addr.ip().is_unspecified() {
            format!("http://localhost:{}", self.addr.port())
        } else {
            format!("http://{}", self.addr)
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops accepting, drains open connections and reports how the serve loop ended.
    pub async fn stop(self) -> Result<()> {
        self.cancel.cancel();
        self.task.await?
    }

    /// Waits for the serve loop to end without requesting it.
    pub async fn wait(self) -> Result<()> {
        self.task.await?
    }
}

async fn serve(listener: TcpListener, router: Router, cancel: CancellationToken) -> Result<()> {
    let mut connections = JoinSet::new();

    loop {
        let (stream, peer) = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(err) if is_connection_error(&err) => {
                    debug!(err = ?err, "Connection dropped before it was accepted");
                    continue;
                }
                Err(err) => {
                    error!(err = ?err, "Web server failed to accept connection");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    continue;
                }
            },
        };

        let router = router.clone();
        let cancel = cancel.clone();

        connections.spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let router = router.clone();
                async move { Ok::<_, Infallible>(router.handle(req).await) }
            });

            let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
            tokio::pin!(conn);

            let mut shutting_down = false;
            let result = loop {
                tokio::select! {
                    result = conn.as_mut() => break result,
                    _ = cancel.cancelled(), if !shutting_down => {
                        conn.as_mut().graceful_shutdown();
                        shutting_down = true;
                    }
                }
            };

            if let Err(err) = result {
                debug!(peer = %peer, err = ?err, "Error serving connection");
            }
        });

        while connections.try_join_next().is_some() {}
    }

    while connections.join_next().await.is_some() {}

    info!("Web server stopped");
    Ok(())
}

/// Errors that only concern the peer being accepted, not the listener.
fn is_connection_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

pub fn open_browser(url: &str) {
    if let Err(e) = webbrowser::open(url) {
        warn!("Failed to open browser: {}. Please visit: {}", e, url);
    }
}
