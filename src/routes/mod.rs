use axum::{routing::get, Router};

use crate::state::AppState;

pub mod fluxo;
pub mod health;
pub mod inadimplencia;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(fluxo::router())
        .merge(inadimplencia::router())
}
