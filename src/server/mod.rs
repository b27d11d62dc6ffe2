//! Dashboard datasource HTTP server.
//!
//! Serves the JSON datasource protocol over HTTP/1 on hyper:
//!
//! - `POST /search` lists the queryable targets
//! - `POST /query` answers time series and table targets for a range
//! - `POST /dir` ingests a directory into the store
//! - `GET /scores/<metric>` documents the scoring formulas
//!
//! Routes are matched after stripping the configured base path, so
//! `/grafana/query` and `/query` are the same route. Protocol failures are
//! reported in the body as `{"ok": 0, "err": ...}` with status 200.

mod handlers;
mod protocol;
mod scores;

use std::convert::Infallible;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use ftdcwatch_analytics::{HostFacts, IngestionOrchestrator, ScoringConfig};
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;

pub use handlers::{host_info_table, query, search, storage_size};
pub use protocol::{DirRequest, ProtocolError, QueryRequest, QueryResponse, TargetKind};
pub use scores::scores_page;

/// Shared state behind every connection.
pub struct AppState {
    pub orchestrator: IngestionOrchestrator,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(orchestrator: IngestionOrchestrator, config: ServerConfig) -> Self {
        Self {
            orchestrator,
            config,
        }
    }
}

/// Accept connections until the listener fails.
pub async fn run_server(state: Arc<AppState>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = state.config.listen_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let state = state.clone();
                async move { handle_request(req, state).await }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                warn!("Connection error from {}: {}", peer, e);
            }
        });
    }
}

/// Route one request.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Display,
{
    if req.method() == Method::OPTIONS {
        return Ok(response(StatusCode::OK, "text/plain", Bytes::new()));
    }

    let path = strip_base(req.uri().path(), &state.config.base_path).to_string();
    debug!("{} {}", req.method(), path);

    let resp = match path.as_str() {
        "/search" => {
            let names = search(&state.orchestrator.store().read());
            json_response(&names)
        }
        "/query" => match read_json::<QueryRequest, _>(req).await {
            Ok(query_req) => {
                let data = state.orchestrator.store().read();
                let config = &state.config;
                json_response(&query(&data, &query_req, config.verbose, config.blocks))
            }
            Err(e) => json_response(&e.to_json()),
        },
        "/dir" => {
            let body = if req.method() == Method::POST {
                read_directory(req, state).await
            } else {
                ProtocolError::Method.to_json()
            };
            json_response(&body)
        }
        p if p.starts_with("/scores/") => {
            let metric = &p["/scores/".len()..];
            let facts = HostFacts::from_store(&state.orchestrator.store().read());
            let html = scores_page(&ScoringConfig::new(facts), metric);
            response(StatusCode::OK, "text/html; charset=utf-8", Bytes::from(html))
        }
        _ => json_response(&json!({"ok": 1, "message": "hello ftdcwatch"})),
    };

    Ok(resp)
}

async fn read_directory<B>(req: Request<B>, state: Arc<AppState>) -> serde_json::Value
where
    B: Body,
    B::Error: Display,
{
    let dir_req: DirRequest = match read_json(req).await {
        Ok(r) => r,
        Err(e) => return e.to_json(),
    };

    let ingest_state = state.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut options = ingest_state.orchestrator.options().clone();
        if dir_req.span > 0 {
            options.latest = Some(dir_req.span);
        }
        ingest_state
            .orchestrator
            .ingest_with(&[PathBuf::from(&dir_req.dir)], &options)
    })
    .await;

    match result {
        Ok(Ok(report)) => {
            let endpoints = report.endpoints(&state.config.dashboards());
            for endpoint in &endpoints {
                info!("http://{}{}", state.config.listen_addr, endpoint);
            }
            json!({"ok": 1, "endpoints": endpoints.join(",")})
        }
        Ok(Err(e)) => ProtocolError::Ingest(e.to_string()).to_json(),
        Err(e) => ProtocolError::Ingest(e.to_string()).to_json(),
    }
}

async fn read_json<T, B>(req: Request<B>) -> Result<T, ProtocolError>
where
    T: serde::de::DeserializeOwned,
    B: Body,
    B::Error: Display,
{
    let bytes = req
        .into_body()
        .collect()
        .await
        .map_err(|e| ProtocolError::Read(e.to_string()))?
        .to_bytes();
    Ok(serde_json::from_slice(&bytes)?)
}

fn strip_base<'a>(path: &'a str, base: &str) -> &'a str {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        return path;
    }
    match path.strip_prefix(base) {
        Some(rest) if rest.is_empty() => "/",
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    }
}

fn json_response<T: Serialize>(value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => response(StatusCode::OK, "application/json", Bytes::from(body)),
        Err(e) => response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "text/plain",
            Bytes::from(e.to_string()),
        ),
    }
}

fn response(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(body));
    *resp.status_mut() = status;
    let headers = resp.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    resp
}
