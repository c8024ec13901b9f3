use axum::{
    extract::DefaultBodyLimit,
    response::Redirect,
    routing::get,
    Router,
};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::handlers;
use crate::state::AppState;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_ENVELOPE: u64 = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.policy.max_size().saturating_add(MULTIPART_ENVELOPE))
        .unwrap_or(usize::MAX);

    let mut app: Router<AppState> = Router::new()
        .route("/", get(handlers::upload_form).post(handlers::upload_submit))
        .route("/gallery/", get(handlers::gallery))
        .route("/gallery", get(|| async { Redirect::permanent("/gallery/") }));

    if let Some(media_dir) = &state.media_dir {
        app = app.nest_service("/media", ServeDir::new(media_dir));
    }

    app.layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
