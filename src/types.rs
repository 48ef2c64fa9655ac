use std::fmt;

use serde::{Deserialize, Serialize};

/// Steps of an analysis session, in walk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppStep {
    Welcome,
    GenderSelection,
    Capture,
    Analyzing,
    Result,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "Male"),
            Gender::Female => write!(f, "Female"),
        }
    }
}

/// Selectable makeover aesthetics. Wire names match the style labels the
/// front end displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KBeautyStyle {
    #[serde(rename = "Natural Glow")]
    NaturalGlow,
    #[serde(rename = "Bold & Chic")]
    BoldChic,
    #[serde(rename = "Vintage K-drama")]
    VintageKDrama,
    #[serde(rename = "Celebrity Inspired")]
    CelebrityInspired,
}

impl fmt::Display for KBeautyStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KBeautyStyle::NaturalGlow => write!(f, "Natural Glow"),
            KBeautyStyle::BoldChic => write!(f, "Bold & Chic"),
            KBeautyStyle::VintageKDrama => write!(f, "Vintage K-drama"),
            KBeautyStyle::CelebrityInspired => write!(f, "Celebrity Inspired"),
        }
    }
}

/// Camera framings for generated looks, in generation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShotType {
    Bust,
    Waist,
    Full,
}

/// Fixed order in which shot types are generated for one style selection.
pub const SHOT_SEQUENCE: [ShotType; 3] = [ShotType::Bust, ShotType::Waist, ShotType::Full];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorInfo {
    pub name: String,
    pub hex: String,
}

/// Celebrity match as returned by the analysis operation: no image URL yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CelebrityMatch {
    pub name: String,
    pub description: String,
}

/// Celebrity match with the separately-resolved image URL merged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KoreanCelebrity {
    pub name: String,
    pub description: String,
    #[serde(rename = "celebrityImageURL")]
    pub celebrity_image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakeupRecommendation {
    pub product: String,
    pub technique: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakeupTips {
    pub face: Vec<MakeupRecommendation>,
    pub eyes: Vec<MakeupRecommendation>,
    pub lips: Vec<MakeupRecommendation>,
    pub general_tip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FashionItem {
    pub item: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FashionTips {
    pub clothing_items: Vec<FashionItem>,
    pub fabrics_and_textures: Vec<FashionItem>,
    pub accessories: Vec<FashionItem>,
    pub style_inspiration: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HairStylingTip {
    pub style: String,
    pub description: String,
    pub products: Vec<String>,
}

/// Analysis as returned by Remote Operation 1. The celebrity image URL is
/// resolved by a separate lookup; this partial form never reaches clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialAnalysis {
    pub season: String,
    pub description: String,
    pub palette: Vec<ColorInfo>,
    pub colors_to_avoid: Vec<ColorInfo>,
    pub korean_celebrity: CelebrityMatch,
    pub makeup_tips: MakeupTips,
    pub fashion_tips: FashionTips,
    pub hair_color_recommendations: Vec<String>,
    pub hair_styling_tips: Vec<HairStylingTip>,
}

impl PartialAnalysis {
    /// Completes the two-phase construction by merging in the resolved
    /// celebrity image URL.
    pub fn into_full(self, celebrity_image_url: String) -> PersonalColorAnalysis {
        PersonalColorAnalysis {
            season: self.season,
            description: self.description,
            palette: self.palette,
            colors_to_avoid: self.colors_to_avoid,
            korean_celebrity: KoreanCelebrity {
                name: self.korean_celebrity.name,
                description: self.korean_celebrity.description,
                celebrity_image_url,
            },
            makeup_tips: self.makeup_tips,
            fashion_tips: self.fashion_tips,
            hair_color_recommendations: self.hair_color_recommendations,
            hair_styling_tips: self.hair_styling_tips,
        }
    }
}

/// Fully-resolved personal color analysis, the only form stored on the
/// session and exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalColorAnalysis {
    pub season: String,
    pub description: String,
    pub palette: Vec<ColorInfo>,
    pub colors_to_avoid: Vec<ColorInfo>,
    pub korean_celebrity: KoreanCelebrity,
    pub makeup_tips: MakeupTips,
    pub fashion_tips: FashionTips,
    pub hair_color_recommendations: Vec<String>,
    pub hair_styling_tips: Vec<HairStylingTip>,
}

/// One generated look. Ids are monotonic per process, never reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformedResult {
    pub id: u64,
    /// Base64 JPEG returned by the image model.
    pub image: String,
    pub description: String,
}

/// Output of Remote Operation 3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub image_base64: String,
    pub description: String,
}

/// Input bundle for Remote Operation 3.
#[derive(Debug, Clone)]
pub struct TransformRequest {
    pub photo_base64: String,
    pub season: String,
    pub celebrity_name: String,
    pub fashion_tips: FashionTips,
    pub gender: Gender,
    pub style: KBeautyStyle,
    pub shot_type: ShotType,
    /// Full palette, passed on the final shot only for extra visual variety.
    pub palette: Option<Vec<ColorInfo>>,
}
