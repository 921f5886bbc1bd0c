//! HTTP server implementation
//!
//! hyper http1 with TokioIo, one spawned task per connection.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::AuthService;
use crate::config::Args;
use crate::logging::AuditLogger;
use crate::routes;
use crate::types::GatehouseError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub auth: AuthService,
    pub audit: AuditLogger,
}

impl AppState {
    pub fn new(args: Args, auth: AuthService, audit: AuditLogger) -> Self {
        Self { args, auth, audit }
    }
}

/// Run the HTTP server until the process exits
pub async fn run(state: Arc<AppState>) -> Result<(), GatehouseError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Gatehouse listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - using in-memory store");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    // Credential exchange (/auth/*) consumes the request
    if path.starts_with("/auth") {
        if let Some(response) = routes::handle_auth_request(req, Arc::clone(&state)).await {
            return Ok(response);
        }
        return Ok(to_boxed(not_found_response(&path)));
    }

    // Guarded entity routes
    if path.starts_with("/api/users") {
        if let Some(response) = routes::handle_user_request(req, Arc::clone(&state)).await {
            return Ok(response);
        }
        return Ok(to_boxed(not_found_response(&path)));
    }
    if path.starts_with("/api/roles") {
        if let Some(response) = routes::handle_role_request(req, Arc::clone(&state)).await {
            return Ok(response);
        }
        return Ok(to_boxed(not_found_response(&path)));
    }

    let response = match (method, path.as_str()) {
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            to_boxed(routes::health_check(Arc::clone(&state)))
        }

        (Method::GET, "/version") => to_boxed(routes::version_info()),

        _ => to_boxed(not_found_response(&path)),
    };

    Ok(response)
}

fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}
