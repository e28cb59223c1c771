//! Route assembly and the HTTP server loop

use super::rejection::handle_rejection;
use super::state::AppState;
use crate::error::{AppError, AppResult};
use crate::observability::health::{self, HealthChecker};
use crate::observability::metrics::metrics;
use crate::{analytics, face, feedback, menu, orders, users};
use std::future::Future;
use std::net::SocketAddr;
use tracing::info;
use warp::filters::BoxedFilter;
use warp::http::Method;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Every API route plus the probes, with CORS, access logging and
/// rejection recovery applied
pub fn build_routes(
    state: AppState,
    checker: HealthChecker,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let api: BoxedFilter<(Response,)> = users::routes::routes(state.clone())
        .or(menu::routes::routes(state.clone()))
        .unify()
        .or(orders::routes::routes(state.clone()))
        .unify()
        .or(feedback::routes::routes(state.clone()))
        .unify()
        .or(analytics::routes::routes(state.clone()))
        .unify()
        .or(face::routes::routes(state))
        .unify()
        .boxed();

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["authorization", "content-type"])
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    let access_log = warp::log::custom(|info| {
        metrics().http_response(info.status().as_u16(), info.elapsed());
        info!(
            method = %info.method(),
            path = info.path(),
            status = info.status().as_u16(),
            elapsed_ms = info.elapsed().as_millis() as u64,
            "request"
        );
    });

    health::routes(checker)
        .or(api)
        .unify()
        .recover(handle_rejection)
        .unify()
        .with(cors)
        .with(access_log)
        .with(warp::trace(|info| {
            crate::request_span!(method = %info.method(), path = info.path())
        }))
}

/// Bind and serve until `shutdown` resolves
pub async fn serve<S>(state: AppState, checker: HealthChecker, shutdown: S) -> AppResult<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = state
        .config
        .bind_address()
        .parse()
        .map_err(|e| AppError::internal(format!("invalid bind address: {e}")))?;

    let routes = build_routes(state, checker);
    let (bound, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(addr, shutdown)
        .map_err(|e| AppError::internal(format!("failed to bind {addr}: {e}")))?;

    info!("Listening on http://{}", bound);
    server.await;
    info!("HTTP server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_state;

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let state = test_state();
        let checker = HealthChecker::new(state.db.clone(), "/nonexistent".into());
        let routes = build_routes(state, checker);

        let res = warp::test::request()
            .method("GET")
            .path("/api/nothing-here/")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), 404);
        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["detail"], "Not found.");
    }

    #[tokio::test]
    async fn test_probes_and_public_menu_are_mounted() {
        let state = test_state();
        let checker = HealthChecker::new(state.db.clone(), "/nonexistent".into());
        let routes = build_routes(state, checker);

        let res = warp::test::request()
            .method("GET")
            .path("/live")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), 200);

        let res = warp::test::request()
            .method("GET")
            .path("/api/menu/categories/")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), 200);
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let state = test_state();
        let checker = HealthChecker::new(state.db.clone(), "/nonexistent".into());
        let routes = build_routes(state, checker);

        let res = warp::test::request()
            .method("GET")
            .path("/api/users/profile/")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), 401);
    }
}
