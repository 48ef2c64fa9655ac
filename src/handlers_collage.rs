use std::sync::Arc;

use base64::Engine;
use warp::{reject, Filter, Rejection, Reply};

use crate::celebrity;
use crate::collage_generator::{CollageGenerator, CollageOptions};
use crate::image_loader::ImageSource;
use crate::session::SharedSession;
use crate::warp_helpers::{
    with_collage_generator, with_session, CollageUnavailable, ServiceError, ValidationRejection,
};

/// Assembles the collage inputs from the current session. A session with no
/// generated looks yields a single-image collage; the celebrity image is the
/// stored URL after one round of percent-decoding, the same form the front
/// end renders.
fn collage_options(session: &SharedSession) -> Result<CollageOptions, Rejection> {
    let state = session.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let (photo_base64, analysis) = match (state.photo_base64(), state.analysis()) {
        (Some(photo), Some(analysis)) => (photo, analysis),
        _ => {
            return Err(reject::custom(ValidationRejection {
                message: "No analysis result to share yet.".to_string(),
            }))
        }
    };

    let decode = |data: &str| {
        base64::engine::general_purpose::STANDARD
            .decode(data.as_bytes())
            .map_err(|_| {
                reject::custom(ValidationRejection {
                    message: "Stored image data is not valid base64.".to_string(),
                })
            })
    };

    let user_image = ImageSource::Inline(decode(photo_base64)?);
    let transformed_image = match state.transformed_results().first() {
        Some(result) => Some(ImageSource::Inline(decode(&result.image)?)),
        None => None,
    };
    let celebrity_image = ImageSource::Remote(celebrity::decoded_url(
        &analysis.korean_celebrity.celebrity_image_url,
    ));

    Ok(CollageOptions {
        user_image,
        celebrity_image,
        transformed_image,
        season: analysis.season.clone(),
        celebrity_name: analysis.korean_celebrity.name.clone(),
        celebrity_description: analysis.korean_celebrity.description.clone(),
    })
}

/// Composites the collage for the current session and replies with the PNG.
pub async fn create_collage(
    session: SharedSession,
    generator: Arc<CollageGenerator>,
) -> Result<impl Reply, Rejection> {
    let options = collage_options(&session)?;

    match generator.generate(&options).await {
        Ok(Some(png_bytes)) => {
            let reply = warp::reply::with_header(png_bytes, "content-type", "image/png");
            Ok(warp::reply::with_header(reply, "cache-control", "no-store"))
        }
        Ok(None) => Err(reject::custom(CollageUnavailable)),
        Err(e) => {
            log::error!("Failed to generate collage: {}", e);
            Err(reject::custom(ServiceError {
                message: e.to_string(),
            }))
        }
    }
}

pub fn build_collage_routes(
    session: SharedSession,
    generator: Arc<CollageGenerator>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "collage")
        .and(warp::post())
        .and(with_session(session))
        .and(with_collage_generator(generator))
        .and_then(create_collage)
}
