//! Web placeholder service.

pub mod page;

use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use page::render_index;

/// State for the web router.
#[derive(Debug, Clone)]
pub struct WebState {
    /// Rendered once at startup; the base URL never changes.
    pub index: Arc<str>,
}

impl WebState {
    /// Pre-render the landing page for `api_base`.
    pub fn new(api_base: &str) -> Self {
        Self {
            index: render_index(api_base).into(),
        }
    }
}

/// Create the web router.
pub fn create_web_router(api_base: &str) -> Router {
    Router::new()
        .route("/", get(index))
        .layer(TraceLayer::new_for_http())
        .with_state(WebState::new(api_base))
}

async fn index(State(state): State<WebState>) -> Html<String> {
    Html(state.index.to_string())
}
