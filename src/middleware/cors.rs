use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;

pub fn build_cors_layer(config: &AppConfig) -> CorsLayer {
    let mut layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(vec![ACCEPT, AUTHORIZATION, CONTENT_TYPE]);

    if config
        .cors_origins
        .iter()
        .any(|origin| origin.trim() == "*")
    {
        layer = layer.allow_origin(Any).allow_credentials(false);
    } else {
        let origins = config
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect::<Vec<_>>();
        layer = layer.allow_origin(origins).allow_credentials(true);
    }

    layer
}
