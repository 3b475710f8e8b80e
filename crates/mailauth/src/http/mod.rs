//! HTTP front end for nginx's mail `auth_http` module.
//!
//! Routes:
//! - `/auth`: decides one authentication attempt. Always answers `200`;
//!   the verdict travels in `Auth-*` headers.
//! - `/health`: liveness probe, answers `OK`.
//!
//! Anything else is `404`.

mod adapter;
mod resolve;

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use mailauth_core::{AuthDecisionEngine, AuthResponse};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// How long in-flight connections may take to finish after shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Serves requests on `listener` until `shutdown` completes, then waits
/// for in-flight connections to finish.
///
/// # Errors
///
/// Currently never fails; accept errors are logged and retried.
pub async fn serve<F>(
    listener: TcpListener,
    engine: Arc<AuthDecisionEngine>,
    shutdown: F,
) -> io::Result<()>
where
    F: Future<Output = ()>,
{
    let graceful = GracefulShutdown::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        // Usually fd exhaustion; back off instead of spinning.
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        continue;
                    }
                };

                let engine = Arc::clone(&engine);
                let service = service_fn(move |request| {
                    let engine = Arc::clone(&engine);
                    async move { Ok::<_, Infallible>(route(request, &engine).await) }
                });
                let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
                let connection = graceful.watch(connection);

                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        debug!(%peer, error = %e, "connection error");
                    }
                });
            }
            () = &mut shutdown => {
                info!("shutting down");
                break;
            }
        }
    }

    drop(listener);
    tokio::select! {
        () = graceful.shutdown() => debug!("all connections closed"),
        () = tokio::time::sleep(SHUTDOWN_GRACE) => {
            warn!("connections still open after {SHUTDOWN_GRACE:?}, exiting anyway");
        }
    }
    Ok(())
}

/// Dispatches on path. The method and body are ignored.
async fn route<B>(request: Request<B>, engine: &AuthDecisionEngine) -> Response<Full<Bytes>> {
    let (parts, _) = request.into_parts();
    match parts.uri.path() {
        "/auth" => authenticate(&parts.headers, engine).await,
        "/health" => text(StatusCode::OK, "OK"),
        _ => text(StatusCode::NOT_FOUND, "not found"),
    }
}

async fn authenticate(headers: &HeaderMap, engine: &AuthDecisionEngine) -> Response<Full<Bytes>> {
    let admitted = match adapter::admit(headers) {
        Ok(admitted) => admitted,
        Err(rejection) => {
            warn!(reason = rejection.reason, "malformed auth request");
            return with_headers(adapter::reject_headers(&rejection));
        }
    };

    let request = &admitted.request;
    let response = engine.decide(request).await;
    let headers = match &response {
        AuthResponse::Accepted(upstream) => {
            let server = resolve::upstream_address(&upstream.host, upstream.port).await;
            info!(
                client_ip = %admitted.client_ip,
                user = %request.username,
                protocol = %request.protocol,
                upstream = %server,
                "authenticated"
            );
            adapter::accept_headers(upstream, &server)
        }
        AuthResponse::Rejected(rejection) => {
            info!(
                client_ip = %admitted.client_ip,
                user = %request.username,
                protocol = %request.protocol,
                attempt = request.attempt,
                "authentication failed"
            );
            adapter::reject_headers(rejection)
        }
    };
    with_headers(headers)
}

fn with_headers(headers: HeaderMap) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.headers_mut() = headers;
    response
}

fn text(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}
