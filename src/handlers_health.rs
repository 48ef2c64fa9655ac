use std::convert::Infallible;
use std::sync::Arc;

use serde_json::json;
use warp::{Filter, Rejection, Reply};

use crate::collage_generator::CollageGenerator;
use crate::config::Config;
use crate::warp_helpers::{with_collage_generator, with_config};

pub async fn health_check() -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Reports whether the two external prerequisites are in place: the model
/// API key and the collage font. The server keeps running without either;
/// clients can use this to explain degraded behavior.
pub async fn ready_check(
    config: Arc<Config>,
    generator: Arc<CollageGenerator>,
) -> Result<impl Reply, Infallible> {
    let model_configured = config.api_key.is_some();
    let collage_available = generator.is_available();
    let status = if model_configured && collage_available {
        "ready"
    } else {
        "degraded"
    };

    Ok(warp::reply::json(&json!({
        "status": status,
        "modelConfigured": model_configured,
        "collageAvailable": collage_available,
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

pub fn build_health_routes(
    config: Arc<Config>,
    generator: Arc<CollageGenerator>,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    let health = warp::path("health").and(warp::get()).and_then(health_check);

    let ready = warp::path("ready")
        .and(warp::get())
        .and(with_config(config))
        .and(with_collage_generator(generator))
        .and_then(ready_check);

    health.or(ready)
}
