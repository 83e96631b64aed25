use crate::server::ServerResources;
use anyhow::{Context, Result};
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Liveness and metrics endpoint
pub struct HealthcheckServer {
    resources: ServerResources,
}

impl HealthcheckServer {
    pub fn new(resources: ServerResources) -> Self {
        Self { resources }
    }

    pub async fn start(&self) -> Result<()> {
        let server_config = &self.resources.config.servers.healthcheck;
        if !server_config.enabled {
            info!("Healthcheck server is disabled");
            return Ok(());
        }

        let bind_addr = server_config.bind_addr();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("Failed to bind healthcheck server to {}", bind_addr))?;

        self.serve(listener).await
    }

    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let healthcheck_path = self.resources.config.servers.healthcheck.path.clone();
        info!(
            "Healthcheck server listening on {} at path {}",
            listener.local_addr()?,
            healthcheck_path
        );

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let path = healthcheck_path.clone();
                    let resources = self.resources.clone();
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let service = service_fn(move |req: Request<Incoming>| {
                            let response = handle_healthcheck(&req, &path, &resources);
                            async move { Ok::<_, Infallible>(response) }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            error!("Healthcheck connection error from {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Healthcheck accept error: {}", e);
                }
            }
        }
    }
}

/// Answer one healthcheck request
pub fn handle_healthcheck<B>(
    req: &Request<B>,
    healthcheck_path: &str,
    resources: &ServerResources,
) -> Response<Full<Bytes>> {
    if req.method() != Method::GET {
        return respond(StatusCode::METHOD_NOT_ALLOWED, None, "Method not allowed");
    }

    let path = req.uri().path();

    if path == "/metrics" || path == "/stats" {
        return match serde_json::to_string(&resources.metrics.snapshot()) {
            Ok(body) => respond(StatusCode::OK, Some("application/json"), body),
            Err(e) => respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                None,
                format!("Failed to encode metrics: {}", e),
            ),
        };
    }

    if path != healthcheck_path {
        return respond(StatusCode::NOT_FOUND, None, "Not found");
    }

    let body = serde_json::json!({
        "status": "healthy",
        "service": "vhost-proxy",
        "hosts": resources.hosts.len(),
        "active_sessions": resources.registry.len(),
    });
    respond(StatusCode::OK, Some("application/json"), body.to_string())
}

fn respond(
    status: StatusCode,
    content_type: Option<&'static str>,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    if let Some(content_type) = content_type {
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    response
}
