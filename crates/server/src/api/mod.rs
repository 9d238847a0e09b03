//! HTTP surface.
//!
//! - `/users/*` - signup, login and logout (see [`crate::accounts`])
//! - `/oauth2/*` - client rotation, token grant and bearer check (see [`crate::oauth2`])
//! - `health` - liveness check (`/ping`)
//! - `metrics` - Prometheus metrics endpoint (`/metrics`)
//! - `openapi` - OpenAPI/Utoipa configuration, served by Redoc at `/api-docs`

pub mod health;
pub mod metrics;
pub mod openapi;

pub use health::MISC_TAG;

use axum::{
    Extension, Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

use crate::AppResources;
use crate::accounts::{self, AccountsState};
use crate::metrics::{HTTP_ERRORS, MetricsSink};
use crate::oauth2::{self, OAuth2State};

/// Count every 5xx response in `http_errors`.
async fn count_server_errors(
    State(resources): State<AppResources>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if response.status().is_server_error() {
        resources.metrics.increment(HTTP_ERRORS, &[]);
    }
    response
}

/// Assemble the full application router.
pub fn build_router(resources: AppResources, accounts: AccountsState, oauth2: OAuth2State) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .nest("/users", accounts::router(accounts))
        .nest("/oauth2", oauth2::router(oauth2))
        .routes(routes!(health::ping))
        .routes(routes!(metrics::metrics))
        .layer(middleware::from_fn_with_state(
            resources.clone(),
            count_server_errors,
        ))
        .layer(Extension(resources))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Serve `router` on `listener` until `shutdown` resolves.
#[tracing::instrument(skip_all)]
pub async fn start_webserver<F>(
    listener: TcpListener,
    router: Router,
    shutdown: F,
) -> color_eyre::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "Server running");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| color_eyre::Report::msg(format!("Failed to run server: {e}")))?;
    Ok(())
}
