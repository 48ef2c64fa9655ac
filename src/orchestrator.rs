use std::sync::Arc;

use crate::error::AppError;
use crate::gemini::ModelBackend;
use crate::session::{SessionState, SharedSession, TransformJob};
use crate::types::{KBeautyStyle, TransformRequest};

/// Substituted for Remote Operation 3 errors that look like rate limiting.
pub const BUSY_MESSAGE: &str =
    "The style generator is currently very busy. Please wait a moment and try again.";

/// Sequences the remote model operations against the session state machine.
///
/// The session lock is only held to read inputs and to apply settlements;
/// every remote call runs outside it. Settlement methods on the session
/// compare the epoch captured at the start of a workflow, which makes a
/// restart during a call discard the late result instead of racing it.
pub struct Orchestrator {
    session: SharedSession,
    backend: Arc<dyn ModelBackend>,
}

impl Orchestrator {
    pub fn new(session: SharedSession, backend: Arc<dyn ModelBackend>) -> Self {
        Orchestrator { session, backend }
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs the full analysis workflow: Operation 1 (partial analysis),
    /// then Operation 2 (celebrity image URL, total with fallback), then
    /// the merge. Validation failures return an error without transition;
    /// remote failures settle the session back to Capture with the message
    /// recorded verbatim.
    pub async fn analyze(&self) -> Result<(), AppError> {
        let (photo, gender, epoch) = self.lock().begin_analysis()?;

        match self.backend.analyze_personal_color(&photo, gender).await {
            Ok(partial) => {
                let celebrity_name = partial.korean_celebrity.name.clone();
                let image = self.backend.find_celebrity_image(&celebrity_name).await;
                if image.used_fallback {
                    log::warn!(
                        "Celebrity image lookup fell back to a search URL for '{}'",
                        celebrity_name
                    );
                }
                self.lock().complete_analysis(epoch, partial.into_full(image.url));
            }
            Err(e) => {
                log::error!("Personal color analysis failed: {}", e);
                self.lock().fail_analysis(epoch, e.to_string());
            }
        }
        Ok(())
    }

    /// Generates the first styled look (shot type Bust) for a freshly
    /// chosen style, clearing any prior sequence. Rate-limit failures are
    /// softened to [`BUSY_MESSAGE`]; the in-progress flag is cleared no
    /// matter how the call settles.
    pub async fn generate_transformation(&self, style: KBeautyStyle) -> Result<(), AppError> {
        let job = self.lock().begin_transformation(style)?;
        let epoch = job.epoch;

        let outcome = self
            .backend
            .transform_image(&request_for(job))
            .await
            .map_err(soften_rate_limit);

        if let Err(message) = &outcome {
            log::error!("Style transformation failed: {}", message);
        }
        self.lock().finish_transformation(epoch, outcome);
        Ok(())
    }

    /// Generates the next shot type in the fixed sequence, passing the full
    /// palette on the final one. A no-op once the sequence is exhausted.
    pub async fn generate_more(&self) -> Result<(), AppError> {
        let Some(job) = self.lock().begin_generate_more()? else {
            return Ok(());
        };
        let epoch = job.epoch;

        let outcome = self
            .backend
            .transform_image(&request_for(job))
            .await
            .map_err(|e| e.to_string());

        if let Err(message) = &outcome {
            log::error!("Generating an additional look failed: {}", message);
        }
        self.lock().finish_generate_more(epoch, outcome);
        Ok(())
    }

    pub fn restart(&self) {
        self.lock().restart();
    }
}

fn request_for(job: TransformJob) -> TransformRequest {
    let palette = job.include_palette.then(|| job.analysis.palette.clone());
    TransformRequest {
        photo_base64: job.photo_base64,
        season: job.analysis.season,
        celebrity_name: job.analysis.korean_celebrity.name,
        fashion_tips: job.analysis.fashion_tips,
        gender: job.gender,
        style: job.style,
        shot_type: job.shot_type,
        palette,
    }
}

fn soften_rate_limit(error: AppError) -> String {
    let message = error.to_string();
    if message.contains("RESOURCE_EXHAUSTED") || message.contains("429") {
        BUSY_MESSAGE.to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_signatures_get_the_friendly_message() {
        assert_eq!(
            soften_rate_limit(AppError::remote("429 rate limited")),
            BUSY_MESSAGE
        );
        assert_eq!(
            soften_rate_limit(AppError::remote("RESOURCE_EXHAUSTED: quota")),
            BUSY_MESSAGE
        );
        assert_eq!(
            soften_rate_limit(AppError::remote("connection reset")),
            "connection reset"
        );
    }
}
