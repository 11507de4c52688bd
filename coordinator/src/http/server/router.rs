use axum::{
    Json, Router,
    body::Body,
    http::{
        Request, StatusCode,
        header::{AUTHORIZATION, COOKIE},
    },
    middleware as ax_middleware,
    response::IntoResponse,
    routing::{self, IntoMakeService, any},
};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{
    ServiceBuilderExt as _, request_id::MakeRequestUuid, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::{
    app::AppState,
    http::{
        admin, api,
        server::middleware::{LevelAdjustingOnFailure, secure_headers_middleware},
    },
    websocket,
};

/// Creates the application router.
///
/// Every route requires a proxy-asserted identity; admin routes additionally require the admin
/// flag. Both are enforced by the handlers' extractors.
pub(crate) fn create_app_router() -> Router<AppState> {
    Router::new()
        .nest("/api/admin", admin::routes())
        .nest("/api", api::routes())
        .route("/ws", any(websocket::ws_handler))
}

pub(crate) fn create_app(app_state: AppState) -> IntoMakeService<Router<()>> {
    let request_timeout = app_state.config.server.request_timeout();
    let middleware_stack = ServiceBuilder::new()
        .sensitive_headers([AUTHORIZATION, COOKIE])
        .set_x_request_id(MakeRequestUuid)
        .propagate_x_request_id()
        .layer(TraceLayer::new_for_http().on_failure(LevelAdjustingOnFailure))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(ax_middleware::from_fn(secure_headers_middleware));

    let app = create_app_router()
        .with_state(app_state)
        .fallback(routing::any(|req: Request<Body>| async move {
            tracing::warn!(method = %req.method(), uri = %req.uri(), "Unhandled request");
            (StatusCode::NOT_FOUND, Json(json!({ "error": "no such route" }))).into_response()
        }))
        .layer(middleware_stack);

    app.into_make_service()
}
