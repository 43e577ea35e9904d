//! Demo routes

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    middleware,
    routing::get,
    Router,
};
use beacon_http::{request_logging, RequestLogging};
use beacon_log::{Logger, RequestContext};

/// Build the demo router with request logging applied to every route
pub fn router(logging: RequestLogging) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/hello/{name}", get(hello))
        .route("/fail", get(fail))
        .with_state(logging.logger().clone())
        .layer(middleware::from_fn_with_state(logging, request_logging))
}

async fn health() -> &'static str {
    "ok"
}

async fn hello(
    State(logger): State<Logger>,
    Extension(ctx): Extension<RequestContext>,
    Path(name): Path<String>,
) -> String {
    logger
        .with_context(&ctx)
        .with_field("name", name.as_str())
        .debug("Greeting visitor");

    format!("Hello, {}!", name)
}

async fn fail(
    State(logger): State<Logger>,
    Extension(ctx): Extension<RequestContext>,
) -> (StatusCode, &'static str) {
    logger.error_with_context(&ctx, "simulated failure", "Request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}
