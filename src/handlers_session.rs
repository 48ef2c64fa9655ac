use std::convert::Infallible;
use std::sync::Arc;

use base64::Engine;
use serde::Deserialize;
use warp::{reject, Filter, Rejection, Reply};

use crate::config::Config;
use crate::orchestrator::Orchestrator;
use crate::session::SharedSession;
use crate::share;
use crate::types::{Gender, KBeautyStyle};
use crate::warp_helpers::{
    reject_app_error, with_config, with_orchestrator, with_session, ValidationRejection,
};

/// Photos arrive as base64 JPEG, optionally wrapped in a data URL.
const MAX_PHOTO_BODY_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct GenderRequest {
    pub gender: Gender,
}

#[derive(Debug, Deserialize)]
pub struct PhotoRequest {
    #[serde(rename = "imageBase64")]
    pub image_base64: String,
}

#[derive(Debug, Deserialize)]
pub struct StyleRequest {
    pub style: KBeautyStyle,
}

fn snapshot_reply(session: &SharedSession, config: &Config) -> impl Reply {
    let mut state = session.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    warp::reply::json(&state.snapshot(&config.image_proxy_base))
}

pub async fn get_session(
    session: SharedSession,
    config: Arc<Config>,
) -> Result<impl Reply, Infallible> {
    Ok(snapshot_reply(&session, &config))
}

pub async fn start_session(
    session: SharedSession,
    config: Arc<Config>,
) -> Result<impl Reply, Rejection> {
    {
        let mut state = session.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.start().map_err(reject_app_error)?;
    }
    Ok(snapshot_reply(&session, &config))
}

pub async fn select_gender(
    request: GenderRequest,
    session: SharedSession,
    config: Arc<Config>,
) -> Result<impl Reply, Rejection> {
    {
        let mut state = session.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.select_gender(request.gender).map_err(reject_app_error)?;
    }
    Ok(snapshot_reply(&session, &config))
}

pub async fn capture_photo(
    request: PhotoRequest,
    session: SharedSession,
    config: Arc<Config>,
) -> Result<impl Reply, Rejection> {
    // Data URLs carry their payload after the comma.
    let payload = match request.image_base64.split_once(',') {
        Some((_, data)) => data.to_string(),
        None => request.image_base64,
    };

    if base64::engine::general_purpose::STANDARD
        .decode(payload.as_bytes())
        .is_err()
    {
        return Err(reject::custom(ValidationRejection {
            message: "Photo payload is not valid base64 image data.".to_string(),
        }));
    }

    {
        let mut state = session.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.capture_photo(payload).map_err(reject_app_error)?;
    }
    Ok(snapshot_reply(&session, &config))
}

pub async fn analyze(
    orchestrator: Arc<Orchestrator>,
    config: Arc<Config>,
) -> Result<impl Reply, Rejection> {
    orchestrator.analyze().await.map_err(reject_app_error)?;
    Ok(snapshot_reply(orchestrator.session(), &config))
}

pub async fn open_style_prompt(
    session: SharedSession,
    config: Arc<Config>,
) -> Result<impl Reply, Rejection> {
    {
        let mut state = session.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.open_style_prompt().map_err(reject_app_error)?;
    }
    Ok(snapshot_reply(&session, &config))
}

pub async fn close_style_prompt(
    session: SharedSession,
    config: Arc<Config>,
) -> Result<impl Reply, Infallible> {
    {
        let mut state = session.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.close_style_prompt();
    }
    Ok(snapshot_reply(&session, &config))
}

pub async fn generate_transformation(
    request: StyleRequest,
    orchestrator: Arc<Orchestrator>,
    config: Arc<Config>,
) -> Result<impl Reply, Rejection> {
    orchestrator
        .generate_transformation(request.style)
        .await
        .map_err(reject_app_error)?;
    Ok(snapshot_reply(orchestrator.session(), &config))
}

pub async fn generate_more(
    orchestrator: Arc<Orchestrator>,
    config: Arc<Config>,
) -> Result<impl Reply, Rejection> {
    orchestrator.generate_more().await.map_err(reject_app_error)?;
    Ok(snapshot_reply(orchestrator.session(), &config))
}

pub async fn restart(
    orchestrator: Arc<Orchestrator>,
    config: Arc<Config>,
) -> Result<impl Reply, Infallible> {
    orchestrator.restart();
    Ok(snapshot_reply(orchestrator.session(), &config))
}

pub async fn share_links(
    session: SharedSession,
    config: Arc<Config>,
) -> Result<impl Reply, Rejection> {
    let state = session.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    match state.analysis() {
        Some(analysis) => Ok(warp::reply::json(&share::share_links(
            analysis,
            &config.app_url,
        ))),
        None => Err(reject::custom(ValidationRejection {
            message: "No analysis result to share yet.".to_string(),
        })),
    }
}

pub fn build_session_routes(
    session: SharedSession,
    orchestrator: Arc<Orchestrator>,
    config: Arc<Config>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let get = warp::path!("api" / "session")
        .and(warp::get())
        .and(with_session(session.clone()))
        .and(with_config(config.clone()))
        .and_then(get_session);

    let start = warp::path!("api" / "session" / "start")
        .and(warp::post())
        .and(with_session(session.clone()))
        .and(with_config(config.clone()))
        .and_then(start_session);

    let gender = warp::path!("api" / "session" / "gender")
        .and(warp::post())
        .and(warp::body::json::<GenderRequest>())
        .and(with_session(session.clone()))
        .and(with_config(config.clone()))
        .and_then(select_gender);

    let photo = warp::path!("api" / "session" / "photo")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_PHOTO_BODY_BYTES))
        .and(warp::body::json::<PhotoRequest>())
        .and(with_session(session.clone()))
        .and(with_config(config.clone()))
        .and_then(capture_photo);

    let analyze_route = warp::path!("api" / "session" / "analyze")
        .and(warp::post())
        .and(with_orchestrator(orchestrator.clone()))
        .and(with_config(config.clone()))
        .and_then(analyze);

    let style_open = warp::path!("api" / "session" / "style-prompt" / "open")
        .and(warp::post())
        .and(with_session(session.clone()))
        .and(with_config(config.clone()))
        .and_then(open_style_prompt);

    let style_close = warp::path!("api" / "session" / "style-prompt" / "close")
        .and(warp::post())
        .and(with_session(session.clone()))
        .and(with_config(config.clone()))
        .and_then(close_style_prompt);

    let transform = warp::path!("api" / "session" / "transform")
        .and(warp::post())
        .and(warp::body::json::<StyleRequest>())
        .and(with_orchestrator(orchestrator.clone()))
        .and(with_config(config.clone()))
        .and_then(generate_transformation);

    let more = warp::path!("api" / "session" / "transform" / "more")
        .and(warp::post())
        .and(with_orchestrator(orchestrator.clone()))
        .and(with_config(config.clone()))
        .and_then(generate_more);

    let restart_route = warp::path!("api" / "session" / "restart")
        .and(warp::post())
        .and(with_orchestrator(orchestrator))
        .and(with_config(config.clone()))
        .and_then(restart);

    let share = warp::path!("api" / "share" / "links")
        .and(warp::get())
        .and(with_session(session))
        .and(with_config(config))
        .and_then(share_links);

    get.or(start)
        .or(gender)
        .or(photo)
        .or(analyze_route)
        .or(style_open)
        .or(style_close)
        .or(transform)
        .or(more)
        .or(restart_route)
        .or(share)
}
