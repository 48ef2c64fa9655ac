use image::DynamicImage;

use crate::error::AppError;

/// Where a collage image comes from: bytes already in hand, or a URL that
/// still has to be fetched.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Inline(Vec<u8>),
    Remote(String),
}

impl ImageSource {
    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            ImageSource::Inline(bytes) => format!("inline image ({} bytes)", bytes.len()),
            ImageSource::Remote(url) => url.clone(),
        }
    }
}

/// Loads one image. Remote sources are fetched fully as bytes and decoded
/// from memory; the intermediate buffer is dropped as soon as decoding
/// finishes.
pub async fn load_image(
    http: &reqwest::Client,
    source: &ImageSource,
) -> Result<DynamicImage, AppError> {
    match source {
        ImageSource::Inline(bytes) => image::load_from_memory(bytes).map_err(|e| {
            AppError::ImageLoad {
                src: source.describe(),
                reason: e.to_string(),
            }
        }),
        ImageSource::Remote(url) => {
            let response = http.get(url).send().await.map_err(|e| AppError::ImageLoad {
                src: url.clone(),
                reason: e.to_string(),
            })?;
            let status = response.status();
            if !status.is_success() {
                return Err(AppError::ImageLoad {
                    src: url.clone(),
                    reason: format!("HTTP {}", status.as_u16()),
                });
            }
            let bytes = response.bytes().await.map_err(|e| AppError::ImageLoad {
                src: url.clone(),
                reason: e.to_string(),
            })?;
            image::load_from_memory(&bytes).map_err(|e| AppError::ImageLoad {
                src: url.clone(),
                reason: e.to_string(),
            })
        }
    }
}

/// Loads the collage inputs concurrently with a fail-fast join: the first
/// failing load aborts the whole composite. An absent transformed source is
/// fine; a present one that fails to load is fatal.
pub async fn load_collage_images(
    http: &reqwest::Client,
    user: &ImageSource,
    transformed: Option<&ImageSource>,
    celebrity: &ImageSource,
) -> Result<(DynamicImage, Option<DynamicImage>, DynamicImage), AppError> {
    let transformed_load = async {
        match transformed {
            Some(source) => load_image(http, source).await.map(Some),
            None => Ok(None),
        }
    };

    tokio::try_join!(
        load_image(http, user),
        transformed_load,
        load_image(http, celebrity)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            image::Rgba([10, 20, 30, 255]),
        ));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, image::ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[tokio::test]
    async fn inline_sources_decode_directly() {
        let http = reqwest::Client::new();
        let source = ImageSource::Inline(png_bytes(4, 6));
        let img = load_image(&http, &source).await.unwrap();
        assert_eq!(img.width(), 4);
        assert_eq!(img.height(), 6);
    }

    #[tokio::test]
    async fn undecodable_inline_source_fails_with_the_source_named() {
        let http = reqwest::Client::new();
        let source = ImageSource::Inline(vec![0, 1, 2, 3]);
        let err = load_image(&http, &source).await.unwrap_err();
        assert!(matches!(err, AppError::ImageLoad { .. }));
        assert!(err.to_string().contains("inline image (4 bytes)"));
    }

    #[tokio::test]
    async fn absent_transformed_source_does_not_fail_the_join() {
        let http = reqwest::Client::new();
        let user = ImageSource::Inline(png_bytes(2, 2));
        let celebrity = ImageSource::Inline(png_bytes(3, 3));
        let (user_img, transformed, celebrity_img) =
            load_collage_images(&http, &user, None, &celebrity)
                .await
                .unwrap();
        assert_eq!(user_img.width(), 2);
        assert!(transformed.is_none());
        assert_eq!(celebrity_img.width(), 3);
    }

    #[tokio::test]
    async fn failed_present_source_is_fatal_to_the_join() {
        let http = reqwest::Client::new();
        let user = ImageSource::Inline(png_bytes(2, 2));
        let broken = ImageSource::Inline(vec![9, 9, 9]);
        let celebrity = ImageSource::Inline(png_bytes(3, 3));
        let err = load_collage_images(&http, &user, Some(&broken), &celebrity)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ImageLoad { .. }));
    }
}
