use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::celebrity;
use crate::error::AppError;
use crate::types::{
    AppStep, Gender, KBeautyStyle, PersonalColorAnalysis, ShotType, TransformOutput,
    TransformedResult, SHOT_SEQUENCE,
};

pub type SharedSession = Arc<Mutex<SessionState>>;

pub fn new_shared_session() -> SharedSession {
    Arc::new(Mutex::new(SessionState::new()))
}

/// Work order for one Remote Operation 3 call, snapshotted under the
/// session lock so the call itself runs without holding it.
#[derive(Debug, Clone)]
pub struct TransformJob {
    pub photo_base64: String,
    pub analysis: PersonalColorAnalysis,
    pub gender: Gender,
    pub style: KBeautyStyle,
    pub shot_type: ShotType,
    pub include_palette: bool,
    pub epoch: u64,
}

/// The one session this process owns. All fields are private; mutation goes
/// through transition methods whose preconditions are documented below.
///
/// The epoch counter increments on every restart. Workflows capture it
/// before suspending on a remote call and settlement methods compare it
/// again, so a result that arrives after a restart is discarded instead of
/// resurrecting stale state.
#[derive(Debug)]
pub struct SessionState {
    step: AppStep,
    photo_base64: Option<String>,
    gender: Option<Gender>,
    analysis: Option<PersonalColorAnalysis>,
    last_error: Option<String>,
    selected_style: Option<KBeautyStyle>,
    transformed: Vec<TransformedResult>,
    style_prompt_open: bool,
    is_transforming: bool,
    is_generating_more: bool,
    next_result_id: u64,
    epoch: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        SessionState {
            step: AppStep::Welcome,
            photo_base64: None,
            gender: None,
            analysis: None,
            last_error: None,
            selected_style: None,
            transformed: Vec::new(),
            style_prompt_open: false,
            is_transforming: false,
            is_generating_more: false,
            next_result_id: 0,
            epoch: 0,
        }
    }

    pub fn step(&self) -> AppStep {
        self.step
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn analysis(&self) -> Option<&PersonalColorAnalysis> {
        self.analysis.as_ref()
    }

    pub fn photo_base64(&self) -> Option<&str> {
        self.photo_base64.as_deref()
    }

    pub fn transformed_results(&self) -> &[TransformedResult] {
        &self.transformed
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_transforming(&self) -> bool {
        self.is_transforming
    }

    pub fn is_generating_more(&self) -> bool {
        self.is_generating_more
    }

    /// Welcome → GenderSelection.
    pub fn start(&mut self) -> Result<(), AppError> {
        if self.step != AppStep::Welcome {
            return Err(AppError::validation(
                "The session has already started. Restart to begin again.",
            ));
        }
        self.step = AppStep::GenderSelection;
        Ok(())
    }

    /// GenderSelection → Capture, recording the gender.
    pub fn select_gender(&mut self, gender: Gender) -> Result<(), AppError> {
        if self.step != AppStep::GenderSelection {
            return Err(AppError::validation("Gender can only be chosen once, before capture."));
        }
        self.gender = Some(gender);
        self.step = AppStep::Capture;
        Ok(())
    }

    /// Stores the captured photo. No transition; the user may retake.
    pub fn capture_photo(&mut self, photo_base64: String) -> Result<(), AppError> {
        if self.step != AppStep::Capture {
            return Err(AppError::validation("Not at the capture step."));
        }
        self.photo_base64 = Some(photo_base64);
        Ok(())
    }

    /// Preconditions for `analyze()`: photo and gender set, not already
    /// analyzing. On success transitions to Analyzing and hands back the
    /// inputs plus the current epoch.
    pub fn begin_analysis(&mut self) -> Result<(String, Gender, u64), AppError> {
        let photo = match &self.photo_base64 {
            Some(photo) => photo.clone(),
            None => return Err(self.record_validation("Please take a photo first.")),
        };
        let gender = match self.gender {
            Some(gender) => gender,
            None => return Err(self.record_validation("Please select a gender.")),
        };
        if self.step == AppStep::Analyzing {
            return Err(AppError::validation("Analysis is already in progress."));
        }
        self.step = AppStep::Analyzing;
        self.last_error = None;
        Ok((photo, gender, self.epoch))
    }

    /// Settles a successful analysis. Stale epochs are discarded.
    pub fn complete_analysis(&mut self, epoch: u64, analysis: PersonalColorAnalysis) {
        if epoch != self.epoch {
            log::info!("Discarding analysis result from a restarted session");
            return;
        }
        self.analysis = Some(analysis);
        self.step = AppStep::Result;
    }

    /// Settles a failed analysis: back to Capture with the message recorded
    /// verbatim. Stale epochs are discarded.
    pub fn fail_analysis(&mut self, epoch: u64, message: String) {
        if epoch != self.epoch {
            log::info!("Discarding analysis failure from a restarted session");
            return;
        }
        self.last_error = Some(message);
        self.step = AppStep::Capture;
    }

    /// Opens the style selection prompt. Requires a completed analysis.
    pub fn open_style_prompt(&mut self) -> Result<(), AppError> {
        if self.step != AppStep::Result || self.analysis.is_none() {
            return Err(AppError::validation("Complete an analysis before choosing a style."));
        }
        self.style_prompt_open = true;
        Ok(())
    }

    pub fn close_style_prompt(&mut self) {
        self.style_prompt_open = false;
    }

    /// Preconditions for `generate_transformation(style)`: photo, analysis
    /// and gender present, no generation in flight. Clears prior results,
    /// records the style, closes the style prompt and raises the
    /// in-progress flag.
    pub fn begin_transformation(&mut self, style: KBeautyStyle) -> Result<TransformJob, AppError> {
        let job = match (&self.photo_base64, &self.analysis, self.gender) {
            (Some(photo), Some(analysis), Some(gender)) => TransformJob {
                photo_base64: photo.clone(),
                analysis: analysis.clone(),
                gender,
                style,
                shot_type: SHOT_SEQUENCE[0],
                include_palette: false,
                epoch: self.epoch,
            },
            _ => return Err(self.record_validation("Missing data for style transfer.")),
        };
        if self.is_transforming || self.is_generating_more {
            return Err(AppError::validation(
                "A style transformation is already in progress.",
            ));
        }
        self.style_prompt_open = false;
        self.is_transforming = true;
        self.selected_style = Some(style);
        self.last_error = None;
        self.transformed.clear();
        Ok(job)
    }

    /// Settles the first transformation. The in-progress flag is cleared on
    /// every path; stale epochs are discarded (restart already reset the
    /// flag).
    pub fn finish_transformation(&mut self, epoch: u64, outcome: Result<TransformOutput, String>) {
        if epoch != self.epoch {
            log::info!("Discarding transformation result from a restarted session");
            return;
        }
        self.is_transforming = false;
        match outcome {
            Ok(output) => {
                self.push_transformed(output);
            }
            Err(message) => self.last_error = Some(message),
        }
    }

    /// Preconditions for `generate_more()`: everything the first
    /// transformation needs plus a previously selected style. Returns
    /// `Ok(None)` without error when the shot sequence is exhausted.
    pub fn begin_generate_more(&mut self) -> Result<Option<TransformJob>, AppError> {
        let (photo, analysis, gender, style) = match (
            &self.photo_base64,
            &self.analysis,
            self.gender,
            self.selected_style,
        ) {
            (Some(photo), Some(analysis), Some(gender), Some(style)) => {
                (photo.clone(), analysis.clone(), gender, style)
            }
            _ => return Err(self.record_validation("Missing data for generating more styles.")),
        };
        if self.is_transforming || self.is_generating_more {
            return Err(AppError::validation(
                "A style transformation is already in progress.",
            ));
        }

        let next_index = self.transformed.len();
        if next_index >= SHOT_SEQUENCE.len() {
            log::info!("All shot types have been generated.");
            return Ok(None);
        }

        self.is_generating_more = true;
        self.last_error = None;
        Ok(Some(TransformJob {
            photo_base64: photo,
            analysis,
            gender,
            style,
            shot_type: SHOT_SEQUENCE[next_index],
            include_palette: next_index == SHOT_SEQUENCE.len() - 1,
            epoch: self.epoch,
        }))
    }

    /// Settles a generate-more call; same guarantees as
    /// [`finish_transformation`](Self::finish_transformation).
    pub fn finish_generate_more(&mut self, epoch: u64, outcome: Result<TransformOutput, String>) {
        if epoch != self.epoch {
            log::info!("Discarding generate-more result from a restarted session");
            return;
        }
        self.is_generating_more = false;
        match outcome {
            Ok(output) => {
                self.push_transformed(output);
            }
            Err(message) => self.last_error = Some(message),
        }
    }

    fn push_transformed(&mut self, output: TransformOutput) {
        let id = self.next_result_id;
        self.next_result_id += 1;
        self.transformed.push(TransformedResult {
            id,
            image: output.image_base64,
            description: output.description,
        });
    }

    /// Resets everything back to the initial values in one step and bumps
    /// the epoch. The result-id counter survives so ids stay monotonic for
    /// the process lifetime.
    pub fn restart(&mut self) {
        let epoch = self.epoch + 1;
        let next_result_id = self.next_result_id;
        *self = SessionState::new();
        self.epoch = epoch;
        self.next_result_id = next_result_id;
    }

    fn record_validation(&mut self, message: &str) -> AppError {
        self.last_error = Some(message.to_string());
        AppError::validation(message)
    }

    /// Client-facing view of the session. Enforces the `Result` invariant:
    /// a Result step with no analysis falls back to Welcome.
    pub fn snapshot(&mut self, image_proxy_base: &str) -> SessionSnapshot {
        if self.step == AppStep::Result && self.analysis.is_none() {
            log::warn!("Result step reached without an analysis; restarting session");
            self.restart();
        }
        SessionSnapshot {
            step: self.step,
            gender: self.gender,
            has_photo: self.photo_base64.is_some(),
            error: self.last_error.clone(),
            analysis_result: self.analysis.clone(),
            celebrity_image_proxied_url: self.analysis.as_ref().map(|a| {
                celebrity::proxied_image_url(image_proxy_base, &a.korean_celebrity.celebrity_image_url)
            }),
            selected_style: self.selected_style,
            transformed_results: self.transformed.clone(),
            style_prompt_open: self.style_prompt_open,
            is_transforming: self.is_transforming,
            is_generating_more: self.is_generating_more,
        }
    }

    #[cfg(test)]
    pub(crate) fn force_step_for_test(&mut self, step: AppStep) {
        self.step = step;
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub step: AppStep,
    pub gender: Option<Gender>,
    pub has_photo: bool,
    pub error: Option<String>,
    pub analysis_result: Option<PersonalColorAnalysis>,
    #[serde(rename = "celebrityImageProxiedURL")]
    pub celebrity_image_proxied_url: Option<String>,
    pub selected_style: Option<KBeautyStyle>,
    pub transformed_results: Vec<TransformedResult>,
    pub style_prompt_open: bool,
    pub is_transforming: bool,
    pub is_generating_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CelebrityMatch, ColorInfo, FashionTips, MakeupTips, PartialAnalysis};

    const PROXY: &str = "https://images.weserv.nl/";

    fn sample_analysis() -> PersonalColorAnalysis {
        PartialAnalysis {
            season: "Cool Winter".to_string(),
            description: "High contrast.".to_string(),
            palette: vec![ColorInfo {
                name: "Icy Blue".to_string(),
                hex: "#A6D5E3".to_string(),
            }],
            colors_to_avoid: vec![],
            korean_celebrity: CelebrityMatch {
                name: "Jennie".to_string(),
                description: "You have a tone similar to Jennie (제니 톤)".to_string(),
            },
            makeup_tips: MakeupTips {
                face: vec![],
                eyes: vec![],
                lips: vec![],
                general_tip: "Cool base.".to_string(),
            },
            fashion_tips: FashionTips {
                clothing_items: vec![],
                fabrics_and_textures: vec![],
                accessories: vec![],
                style_inspiration: "Sleek.".to_string(),
            },
            hair_color_recommendations: vec![],
            hair_styling_tips: vec![],
        }
        .into_full("https://example.com/jennie.jpg".to_string())
    }

    fn session_at_capture() -> SessionState {
        let mut session = SessionState::new();
        session.start().unwrap();
        session.select_gender(Gender::Female).unwrap();
        session
    }

    fn output(n: u32) -> TransformOutput {
        TransformOutput {
            image_base64: format!("aW1n{}", n),
            description: format!("look {}", n),
        }
    }

    #[test]
    fn walks_the_steps_in_order() {
        let mut session = SessionState::new();
        assert_eq!(session.step(), AppStep::Welcome);
        session.start().unwrap();
        assert_eq!(session.step(), AppStep::GenderSelection);
        session.select_gender(Gender::Male).unwrap();
        assert_eq!(session.step(), AppStep::Capture);
        session.capture_photo("cGhvdG8=".to_string()).unwrap();
        assert_eq!(session.step(), AppStep::Capture);
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut session = SessionState::new();
        session.start().unwrap();
        assert!(session.start().is_err());
    }

    #[test]
    fn begin_analysis_requires_photo_then_gender() {
        let mut session = session_at_capture();
        let err = session.begin_analysis().unwrap_err();
        assert_eq!(err.to_string(), "Please take a photo first.");
        assert_eq!(session.last_error(), Some("Please take a photo first."));
        assert_eq!(session.step(), AppStep::Capture);

        let mut no_gender = SessionState::new();
        no_gender.start().unwrap();
        no_gender.select_gender(Gender::Female).unwrap();
        no_gender.capture_photo("cGhvdG8=".to_string()).unwrap();
        no_gender.gender = None;
        let err = no_gender.begin_analysis().unwrap_err();
        assert_eq!(err.to_string(), "Please select a gender.");
    }

    #[test]
    fn analysis_success_and_failure_settle_out_of_analyzing() {
        let mut session = session_at_capture();
        session.capture_photo("cGhvdG8=".to_string()).unwrap();

        let (_, _, epoch) = session.begin_analysis().unwrap();
        assert_eq!(session.step(), AppStep::Analyzing);
        assert!(session.begin_analysis().is_err());

        session.fail_analysis(epoch, "network error".to_string());
        assert_eq!(session.step(), AppStep::Capture);
        assert_eq!(session.last_error(), Some("network error"));

        let (_, _, epoch) = session.begin_analysis().unwrap();
        session.complete_analysis(epoch, sample_analysis());
        assert_eq!(session.step(), AppStep::Result);
        assert!(session.analysis().is_some());
    }

    #[test]
    fn stale_analysis_settlement_is_discarded_after_restart() {
        let mut session = session_at_capture();
        session.capture_photo("cGhvdG8=".to_string()).unwrap();
        let (_, _, epoch) = session.begin_analysis().unwrap();

        session.restart();
        session.complete_analysis(epoch, sample_analysis());
        assert_eq!(session.step(), AppStep::Welcome);
        assert!(session.analysis().is_none());

        session.fail_analysis(epoch, "late failure".to_string());
        assert!(session.last_error().is_none());
    }

    #[test]
    fn transformation_clears_previous_results_and_serializes_callers() {
        let mut session = session_at_capture();
        session.capture_photo("cGhvdG8=".to_string()).unwrap();
        let (_, _, epoch) = session.begin_analysis().unwrap();
        session.complete_analysis(epoch, sample_analysis());

        let job = session.begin_transformation(KBeautyStyle::NaturalGlow).unwrap();
        assert_eq!(job.shot_type, ShotType::Bust);
        assert!(!job.include_palette);
        assert!(session
            .begin_transformation(KBeautyStyle::BoldChic)
            .is_err());

        session.finish_transformation(job.epoch, Ok(output(1)));
        assert_eq!(session.transformed_results().len(), 1);
        let first_id = session.transformed_results()[0].id;

        // A new style selection starts the sequence over but keeps ids
        // monotonic.
        let job = session.begin_transformation(KBeautyStyle::BoldChic).unwrap();
        assert!(session.transformed_results().is_empty());
        session.finish_transformation(job.epoch, Ok(output(2)));
        assert!(session.transformed_results()[0].id > first_id);
    }

    #[test]
    fn generate_more_walks_the_shot_sequence_then_noops() {
        let mut session = session_at_capture();
        session.capture_photo("cGhvdG8=".to_string()).unwrap();
        let (_, _, epoch) = session.begin_analysis().unwrap();
        session.complete_analysis(epoch, sample_analysis());

        let job = session.begin_transformation(KBeautyStyle::NaturalGlow).unwrap();
        session.finish_transformation(job.epoch, Ok(output(1)));

        let job = session.begin_generate_more().unwrap().unwrap();
        assert_eq!(job.shot_type, ShotType::Waist);
        assert!(!job.include_palette);
        session.finish_generate_more(job.epoch, Ok(output(2)));

        let job = session.begin_generate_more().unwrap().unwrap();
        assert_eq!(job.shot_type, ShotType::Full);
        assert!(job.include_palette);
        session.finish_generate_more(job.epoch, Ok(output(3)));

        assert_eq!(session.transformed_results().len(), 3);
        // Sequence exhausted: silent no-op, nothing appended, no error.
        assert!(session.begin_generate_more().unwrap().is_none());
        assert_eq!(session.transformed_results().len(), 3);
        assert!(session.last_error().is_none());
    }

    #[test]
    fn generate_more_requires_a_selected_style() {
        let mut session = session_at_capture();
        session.capture_photo("cGhvdG8=".to_string()).unwrap();
        let (_, _, epoch) = session.begin_analysis().unwrap();
        session.complete_analysis(epoch, sample_analysis());

        let err = session.begin_generate_more().unwrap_err();
        assert_eq!(err.to_string(), "Missing data for generating more styles.");
    }

    #[test]
    fn restart_resets_everything_atomically() {
        let mut session = session_at_capture();
        session.capture_photo("cGhvdG8=".to_string()).unwrap();
        let (_, _, epoch) = session.begin_analysis().unwrap();
        session.complete_analysis(epoch, sample_analysis());
        let job = session.begin_transformation(KBeautyStyle::NaturalGlow).unwrap();
        session.finish_transformation(job.epoch, Ok(output(1)));

        let old_epoch = session.epoch();
        session.restart();
        assert_eq!(session.step(), AppStep::Welcome);
        assert!(session.analysis().is_none());
        assert!(session.photo_base64().is_none());
        assert!(session.transformed_results().is_empty());
        assert!(session.last_error().is_none());
        assert_eq!(session.epoch(), old_epoch + 1);
    }

    #[test]
    fn snapshot_normalizes_result_without_analysis() {
        let mut session = SessionState::new();
        session.force_step_for_test(AppStep::Result);
        let snapshot = session.snapshot(PROXY);
        assert_eq!(snapshot.step, AppStep::Welcome);
        assert!(snapshot.analysis_result.is_none());
    }

    #[test]
    fn snapshot_carries_proxied_celebrity_url() {
        let mut session = session_at_capture();
        session.capture_photo("cGhvdG8=".to_string()).unwrap();
        let (_, _, epoch) = session.begin_analysis().unwrap();
        session.complete_analysis(epoch, sample_analysis());

        let snapshot = session.snapshot(PROXY);
        let proxied = snapshot.celebrity_image_proxied_url.unwrap();
        assert!(proxied.starts_with("https://images.weserv.nl/?url="));
        assert!(proxied.contains("example.com"));
    }
}
