//! Subscription endpoint.
//!
//! Runs ahead of routing: the path is whatever `SUBSCRIPTION_URL` is at the
//! time of the request, so it can move without rebuilding the router.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::server::AppState;

pub async fn subscription_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let settings = state.manager.settings().current();
    if request.uri().path() != settings.subscription_url {
        return next.run(request).await;
    }

    let list_file = &state.manager.store().paths().list_file;
    match tokio::fs::read_to_string(list_file).await {
        Ok(body) => ([(header::CONTENT_TYPE, "text/plain")], body).into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!(path = %list_file.display(), error = %e, "Failed to read subscription list");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
