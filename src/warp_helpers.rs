use std::convert::Infallible;
use std::sync::Arc;

use serde::Serialize;
use warp::{reject, Filter, Rejection, Reply};

use crate::collage_generator::CollageGenerator;
use crate::config::Config;
use crate::error::AppError;
use crate::orchestrator::Orchestrator;
use crate::session::SharedSession;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    pub timestamp: String,
}

#[derive(Debug)]
pub struct ValidationRejection {
    pub message: String,
}

impl reject::Reject for ValidationRejection {}

#[derive(Debug)]
pub struct ServiceError {
    pub message: String,
}

impl reject::Reject for ServiceError {}

/// The collage drawing surface could not be created (font unavailable).
#[derive(Debug)]
pub struct CollageUnavailable;

impl reject::Reject for CollageUnavailable {}

/// Maps a workflow error onto the matching rejection class.
pub fn reject_app_error(error: AppError) -> Rejection {
    if error.is_validation() {
        reject::custom(ValidationRejection {
            message: error.to_string(),
        })
    } else {
        reject::custom(ServiceError {
            message: error.to_string(),
        })
    }
}

pub fn with_session(
    session: SharedSession,
) -> impl Filter<Extract = (SharedSession,), Error = Infallible> + Clone {
    warp::any().map(move || session.clone())
}

pub fn with_orchestrator(
    orchestrator: Arc<Orchestrator>,
) -> impl Filter<Extract = (Arc<Orchestrator>,), Error = Infallible> + Clone {
    warp::any().map(move || orchestrator.clone())
}

pub fn with_collage_generator(
    generator: Arc<CollageGenerator>,
) -> impl Filter<Extract = (Arc<CollageGenerator>,), Error = Infallible> + Clone {
    warp::any().map(move || generator.clone())
}

pub fn with_config(
    config: Arc<Config>,
) -> impl Filter<Extract = (Arc<Config>,), Error = Infallible> + Clone {
    warp::any().map(move || config.clone())
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;
    let timestamp = chrono::Utc::now().to_rfc3339();

    if err.is_not_found() {
        code = warp::http::StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(validation) = err.find::<ValidationRejection>() {
        code = warp::http::StatusCode::BAD_REQUEST;
        message = validation.message.clone();
    } else if err.find::<CollageUnavailable>().is_some() {
        code = warp::http::StatusCode::SERVICE_UNAVAILABLE;
        message = "Could not create collage image.".to_string();
    } else if let Some(service_error) = err.find::<ServiceError>() {
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = service_error.message.clone();
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        code = warp::http::StatusCode::PAYLOAD_TOO_LARGE;
        message = "Payload too large".to_string();
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        code = warp::http::StatusCode::UNSUPPORTED_MEDIA_TYPE;
        message = "Unsupported media type".to_string();
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = warp::http::StatusCode::METHOD_NOT_ALLOWED;
        message = "Method not allowed".to_string();
    } else if let Some(body_error) = err.find::<warp::body::BodyDeserializeError>() {
        code = warp::http::StatusCode::BAD_REQUEST;
        message = body_error.to_string();
    } else {
        log::error!("Unhandled rejection: {:?}", err);
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal server error".to_string();
    }

    let error_response = ErrorResponse {
        error: message,
        code: code.as_u16(),
        timestamp,
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&error_response),
        code,
    ))
}

pub fn cors() -> warp::cors::Builder {
    warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization"])
        .allow_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
}
