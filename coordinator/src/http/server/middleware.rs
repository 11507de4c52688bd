use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
};

/// Custom failure handling for the trace layer. 502 responses are logged
/// at `WARN` instead of `ERROR`; the failing backing system was already logged by the handler.
#[derive(Clone, Copy)]
pub(crate) struct LevelAdjustingOnFailure;

impl tower_http::trace::OnFailure<tower_http::classify::ServerErrorsFailureClass>
    for LevelAdjustingOnFailure
{
    fn on_failure(
        &mut self,
        failure_classification: tower_http::classify::ServerErrorsFailureClass,
        latency: core::time::Duration,
        span: &tracing::Span,
    ) {
        use tower_http::classify::ServerErrorsFailureClass as S;

        match failure_classification {
            S::StatusCode(StatusCode::BAD_GATEWAY) => {
                tracing::warn!(classification = %S::StatusCode(StatusCode::BAD_GATEWAY), latency = %format!("{} ms", latency.as_millis()), "response failed (downgraded)");
            }
            value => {
                tower_http::trace::DefaultOnFailure::default().on_failure(value, latency, span);
            }
        }
    }
}

/// Middleware to set security headers on all responses.
///
/// The API only serves JSON, so nothing may be sniffed, framed or embedded.
pub(crate) async fn secure_headers_middleware(
    req: Request<Body>,
    next: Next,
) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    response
}
