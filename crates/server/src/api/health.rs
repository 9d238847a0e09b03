//! Liveness check.

/// Tag for OpenAPI documentation.
pub const MISC_TAG: &str = "Miscellaneous";

/// Liveness check.
#[tracing::instrument]
#[utoipa::path(
    get,
    path = "/ping",
    tag = MISC_TAG,
    operation_id = "Ping",
    summary = "Service liveness check",
    description = "Returns `PONG` while the process is accepting requests. \
                   Suitable for load balancer and orchestrator liveness checks.",
    responses(
        (status = 200, description = "Service is up", body = str, content_type = "text/plain", example = "PONG")
    )
)]
pub async fn ping() -> &'static str {
    "PONG"
}
