use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::celebrity::{self, CelebrityImage};
use crate::config::Config;
use crate::error::AppError;
use crate::types::{
    ColorInfo, FashionTips, Gender, KBeautyStyle, PartialAnalysis, ShotType, TransformOutput,
    TransformRequest,
};

const ANALYSIS_FAILED_MESSAGE: &str =
    "Failed to analyze the image. Please try again with a clear, well-lit photo.";
const INVALID_RESPONSE_MESSAGE: &str =
    "API returned an invalid response. This may be due to safety filters blocking the request.";
const MISSING_IMAGE_MESSAGE: &str = "API did not return an edited image. This could be due to the \
     input image quality or a safety policy. Please try again with a different photo or style.";
const DEFAULT_TRANSFORM_DESCRIPTION: &str = "Here is your style transformation!";

/// Seam between the orchestrator and the hosted model, so workflows are
/// testable against a scripted backend.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Remote Operation 1: personal color analysis. The returned analysis
    /// carries no celebrity image URL.
    async fn analyze_personal_color(
        &self,
        photo_base64: &str,
        gender: Gender,
    ) -> Result<PartialAnalysis, AppError>;

    /// Remote Operation 2: celebrity image lookup. Total; degrades to the
    /// deterministic search fallback internally.
    async fn find_celebrity_image(&self, celebrity_name: &str) -> CelebrityImage;

    /// Remote Operation 3: styled-look generation.
    async fn transform_image(&self, request: &TransformRequest)
        -> Result<TransformOutput, AppError>;
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    parts: Option<Vec<Part>>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
    #[serde(rename = "inlineData", alias = "inline_data")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: Option<String>,
}

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    analysis_model: String,
    image_model: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        GeminiClient {
            http: reqwest::Client::new(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            analysis_model: config.analysis_model.clone(),
            image_model: config.image_model.clone(),
        }
    }

    async fn generate_content(
        &self,
        model: &str,
        body: Value,
    ) -> Result<GenerateContentResponse, AppError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::remote("Gemini API key is not configured."))?;

        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let response = self
            .http
            .post(&url)
            .header("X-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::remote(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::remote(format!(
                "Gemini request failed: HTTP {}",
                status.as_u16()
            )));
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| AppError::remote(format!("Gemini response could not be decoded: {}", e)))
    }
}

#[async_trait]
impl ModelBackend for GeminiClient {
    async fn analyze_personal_color(
        &self,
        photo_base64: &str,
        gender: Gender,
    ) -> Result<PartialAnalysis, AppError> {
        let body = json!({
            "contents": [{
                "parts": [
                    {"inlineData": {"mimeType": "image/jpeg", "data": photo_base64}},
                    {"text": analysis_prompt(gender)}
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": analysis_response_schema()
            }
        });

        let response = self
            .generate_content(&self.analysis_model, body)
            .await
            .map_err(|e| {
                log::error!("Error analyzing personal color: {}", e);
                AppError::remote(ANALYSIS_FAILED_MESSAGE)
            })?;

        let text = first_text(&response).ok_or_else(|| {
            log::error!("Analysis response carried no text part");
            AppError::remote(ANALYSIS_FAILED_MESSAGE)
        })?;

        parse_analysis_response(&text)
    }

    async fn find_celebrity_image(&self, celebrity_name: &str) -> CelebrityImage {
        let body = json!({
            "contents": [{"parts": [{"text": image_search_prompt(celebrity_name)}]}],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": image_search_schema()
            }
        });

        let candidate = match self.generate_content(&self.analysis_model, body).await {
            Ok(response) => first_text(&response).and_then(|text| {
                serde_json::from_str::<Value>(text.trim())
                    .ok()
                    .and_then(|v| v.get("imageUrl").and_then(Value::as_str).map(String::from))
            }),
            Err(e) => {
                log::error!("Error finding image for {}: {}", celebrity_name, e);
                None
            }
        };

        celebrity::resolve_image_url(celebrity_name, candidate.as_deref())
    }

    async fn transform_image(
        &self,
        request: &TransformRequest,
    ) -> Result<TransformOutput, AppError> {
        let body = json!({
            "contents": [{
                "parts": [
                    {"inlineData": {"mimeType": "image/jpeg", "data": request.photo_base64}},
                    {"text": build_transform_prompt(request)}
                ]
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE", "TEXT"]
            }
        });

        let response = self.generate_content(&self.image_model, body).await?;
        extract_transform_output(&response)
    }
}

fn first_text(response: &GenerateContentResponse) -> Option<String> {
    response
        .candidates
        .as_ref()?
        .iter()
        .filter_map(|c| c.content.as_ref())
        .filter_map(|c| c.parts.as_ref())
        .flatten()
        .filter_map(|p| p.text.clone())
        .find(|t| !t.is_empty())
}

/// Validates and decodes an Operation 1 response body. A payload missing
/// `season` or a non-empty `palette` is rejected with the generic analysis
/// failure message.
fn parse_analysis_response(text: &str) -> Result<PartialAnalysis, AppError> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|_| AppError::remote(ANALYSIS_FAILED_MESSAGE))?;

    let has_season = value
        .get("season")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty());
    let has_palette = value
        .get("palette")
        .and_then(Value::as_array)
        .is_some_and(|p| !p.is_empty());
    if !has_season || !has_palette {
        log::error!("Invalid response structure from analysis API");
        return Err(AppError::remote(ANALYSIS_FAILED_MESSAGE));
    }

    serde_json::from_value(value).map_err(|e| {
        log::error!("Analysis response did not match the expected schema: {}", e);
        AppError::remote(ANALYSIS_FAILED_MESSAGE)
    })
}

/// Pulls the generated image and description out of an Operation 3
/// response, distinguishing a content-safety refusal from a generic
/// missing-image condition.
fn extract_transform_output(
    response: &GenerateContentResponse,
) -> Result<TransformOutput, AppError> {
    let parts = response
        .candidates
        .as_ref()
        .and_then(|c| c.first())
        .and_then(|c| c.content.as_ref())
        .and_then(|c| c.parts.as_ref())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::remote(INVALID_RESPONSE_MESSAGE))?;

    let mut image_base64: Option<String> = None;
    let mut description: Option<String> = None;
    for part in parts {
        if let Some(inline) = &part.inline_data {
            if let Some(data) = &inline.data {
                image_base64 = Some(data.clone());
            }
        } else if let Some(text) = &part.text {
            description = Some(text.clone());
        }
    }

    let Some(image_base64) = image_base64 else {
        let response_text = description
            .unwrap_or_else(|| "No text explanation was provided by the model.".to_string());
        if is_refusal(&response_text) {
            return Err(AppError::ContentRefusal(format!(
                "The AI was unable to transform the image. Reason: \"{}\"",
                response_text
            )));
        }
        return Err(AppError::remote(MISSING_IMAGE_MESSAGE));
    };

    Ok(TransformOutput {
        image_base64,
        description: description.unwrap_or_else(|| DEFAULT_TRANSFORM_DESCRIPTION.to_string()),
    })
}

fn is_refusal(text: &str) -> bool {
    let lowered = text.to_lowercase();
    ["sorry", "cannot", "unable"]
        .iter()
        .any(|needle| lowered.contains(needle))
}

fn analysis_prompt(gender: Gender) -> String {
    format!(
        "Analyze the user's selfie to determine their personal color season from a K-beauty \
         perspective. The user has identified their gender as '{gender}'.\n\
         Focus on their skin undertone (cool, warm, neutral), eye color, and hair color.\n\
         Provide a detailed analysis based on these features.\n\
         The analysis should include Korean-specific recommendations. For the celebrity match, \
         choose a globally well-known Korean celebrity that matches the user's gender ({gender}) \
         and personal color season. Use a friendly tone like \"You have a tone similar to V (뷔 톤)\".\n\n\
         IMPORTANT: Do NOT provide an image URL for the celebrity. Only provide their name and a \
         descriptive sentence.\n\n\
         For makeup, recommend specific K-beauty products, popular brands, and application \
         techniques suitable for their gender.\n\
         For fashion, recommend specific clothing items, fabrics, and accessories relevant to \
         Korean style; for each, provide a brief reason why it suits the user's personal color.\n\
         Also suggest trendy Korean hair colors. For hair styling, recommend 2-3 K-beauty styles \
         suitable for their gender. For each style, provide a brief description and a list of 2-3 \
         specific product types or tools (e.g., 'Sea salt spray', '32mm curling iron', 'Hair \
         essence') needed to achieve it.\n\
         In addition to the recommended palette, please also provide a list of 3-4 colors the \
         user should avoid.\n\
         Ensure the user has natural lighting and minimal makeup for best results.\n\
         Provide the result in the specified JSON format."
    )
}

fn image_search_prompt(celebrity_name: &str) -> String {
    format!(
        "Perform an image search for the globally well-known Korean celebrity '{celebrity_name}'. \
         From the search results, find one single, high-quality, publicly accessible image. \
         Provide a direct, hotlinkable URL for this image. The URL must end in a common image \
         format like .jpg, .png, or .webp. Do not provide a URL to a search results page."
    )
}

fn color_pair_schema(name_hint: &str) -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "name": {"type": "STRING", "description": name_hint},
            "hex": {"type": "STRING", "description": "The hex code for the color, e.g., '#A6D5E3'."}
        },
        "required": ["name", "hex"]
    })
}

fn item_reason_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "item": {"type": "STRING"},
            "reason": {"type": "STRING", "description": "A brief reason why this suits the user's color season."}
        },
        "required": ["item", "reason"]
    })
}

fn product_technique_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "product": {"type": "STRING", "description": "The product type and brand."},
            "technique": {"type": "STRING", "description": "A relevant K-beauty technique."}
        },
        "required": ["product", "technique"]
    })
}

fn analysis_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "season": {
                "type": "STRING",
                "description": "The user's personal color season, e.g., 'Cool Winter', 'Warm Autumn'."
            },
            "description": {
                "type": "STRING",
                "description": "A detailed paragraph explaining why the user fits into this season."
            },
            "palette": {
                "type": "ARRAY",
                "description": "An array of 10-12 recommended colors for the user's palette.",
                "items": color_pair_schema("The name of the color, e.g., 'Icy Blue', 'Terracotta'.")
            },
            "colorsToAvoid": {
                "type": "ARRAY",
                "description": "An array of 3-4 unflattering colors to avoid.",
                "items": color_pair_schema("The name of the color to avoid, e.g., 'Neon Orange'.")
            },
            "koreanCelebrity": {
                "type": "OBJECT",
                "description": "A matching, globally well-known Korean celebrity.",
                "properties": {
                    "name": {"type": "STRING"},
                    "description": {
                        "type": "STRING",
                        "description": "A friendly sentence describing the match."
                    }
                },
                "required": ["name", "description"]
            },
            "makeupTips": {
                "type": "OBJECT",
                "properties": {
                    "face": {"type": "ARRAY", "items": product_technique_schema()},
                    "eyes": {"type": "ARRAY", "items": product_technique_schema()},
                    "lips": {"type": "ARRAY", "items": product_technique_schema()},
                    "generalTip": {"type": "STRING"}
                },
                "required": ["face", "eyes", "lips", "generalTip"]
            },
            "fashionTips": {
                "type": "OBJECT",
                "properties": {
                    "clothingItems": {"type": "ARRAY", "items": item_reason_schema()},
                    "fabricsAndTextures": {"type": "ARRAY", "items": item_reason_schema()},
                    "accessories": {"type": "ARRAY", "items": item_reason_schema()},
                    "styleInspiration": {"type": "STRING"}
                },
                "required": ["clothingItems", "fabricsAndTextures", "accessories", "styleInspiration"]
            },
            "hairColorRecommendations": {
                "type": "ARRAY",
                "description": "2-3 trendy Korean hair colors, e.g., Ash Brown, Milk Tea Beige.",
                "items": {"type": "STRING"}
            },
            "hairStylingTips": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "style": {"type": "STRING"},
                        "description": {"type": "STRING"},
                        "products": {"type": "ARRAY", "items": {"type": "STRING"}}
                    },
                    "required": ["style", "description", "products"]
                }
            }
        },
        "required": [
            "season", "description", "palette", "colorsToAvoid", "koreanCelebrity",
            "makeupTips", "fashionTips", "hairColorRecommendations", "hairStylingTips"
        ]
    })
}

fn image_search_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "imageUrl": {
                "type": "STRING",
                "description": "A direct, hotlinkable, high-quality image URL for the celebrity. \
                     The URL must end in a common image format like .jpg, .png, or .webp. \
                     Prioritize stable sources like Wikimedia Commons."
            }
        },
        "required": ["imageUrl"]
    })
}

fn makeup_instruction(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => {
            "Apply subtle K-beauty makeup suitable for men. Focus on creating a clean, even \
             complexion, grooming the eyebrows, and perhaps adding a touch of natural lip color."
        }
        Gender::Female => {
            "Apply stylish K-beauty makeup that matches their season and the selected aesthetic."
        }
    }
}

fn style_instruction(style: KBeautyStyle) -> &'static str {
    match style {
        KBeautyStyle::NaturalGlow => {
            "Focus on dewy skin, soft and neutral makeup tones, and comfortable yet stylish \
             everyday fashion. Hair should look healthy and natural."
        }
        KBeautyStyle::BoldChic => {
            "This involves more prominent makeup, like sharp eyeliner or a defined lip color \
             (subtle for men), combined with modern, sophisticated fashion. Hair can be more \
             styled and trendy."
        }
        KBeautyStyle::VintageKDrama => {
            "Use a soft-focus, romantic filter. Makeup should feature muted, soft tones. Fashion \
             should be nostalgic and elegant, inspired by classic Korean dramas. Hair should be \
             soft and perhaps wavy."
        }
        KBeautyStyle::CelebrityInspired => {
            "Create a polished, high-fashion portrait of the user, as if they were being \
             photographed for the cover of a top Korean fashion magazine. The aesthetic is \
             artistic, sophisticated, and trendy. This is a creative, stylized illustration, not \
             a simple photo edit."
        }
    }
}

fn shot_instruction(shot_type: ShotType) -> (&'static str, &'static str) {
    match shot_type {
        ShotType::Bust => (
            "Generate a bust shot (from the chest up). Focus on detailed makeup and hair.",
            "a bust shot",
        ),
        ShotType::Waist => (
            "Generate a waist shot (from the waist up). Show the upper body fashion and hairstyle.",
            "a waist shot",
        ),
        ShotType::Full => (
            "Generate a full-body shot. Showcase the complete fashion outfit from head to toe.",
            "a full shot",
        ),
    }
}

fn format_fashion_tips(tips: &FashionTips) -> String {
    let clothing = tips
        .clothing_items
        .iter()
        .map(|i| i.item.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let fabrics = tips
        .fabrics_and_textures
        .iter()
        .map(|i| i.item.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Key items to wear include {}. Focus on fabrics like {}. Overall, the style is about {}.",
        clothing, fabrics, tips.style_inspiration
    )
}

fn palette_names(palette: Option<&[ColorInfo]>) -> String {
    match palette {
        Some(colors) if !colors.is_empty() => colors
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        _ => "the provided seasonal colors".to_string(),
    }
}

fn build_transform_prompt(request: &TransformRequest) -> String {
    let (shot_line, shot_description) = shot_instruction(request.shot_type);
    let accessories = request
        .fashion_tips
        .accessories
        .iter()
        .map(|t| t.item.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let fashion_instruction = format!(
        "**Core Task:** Redesign the user's outfit completely to create a diverse set of \
         fashionable looks based on a comprehensive style guide.\n\
         **Creative Brief:**\n\
         1. **Seasonal Theme:** Randomly select one of the four seasons (Spring, Summer, Autumn, \
         or Winter) and design a complete outfit that is seasonally appropriate and fashionable.\n\
         2. **Personal Color Palette:** The new outfit's color scheme **must** be based on the \
         user's personal color palette: **{palette}**. Actively use different combinations of \
         these colors to show variety.\n\
         3. **Recommended Fashion Items:** Intelligently and creatively incorporate elements from \
         the user's personalized fashion recommendations: **\"{tips}\"**. Prioritize variety in \
         the items chosen for each look.\n\
         4. **Accessories (Optional):** To enhance the style, you may optionally add accessories. \
         If you do, select from this list: **{accessories}**.\n\
         5. **Style Inspiration:** The overall vibe should be inspired by modern K-beauty and \
         celebrity fashion trends.\n\
         6. **Chosen Aesthetic:** All fashion choices must align perfectly with the selected \
         theme: **'{style}'**.\n\
         7. **Cohesion:** The final look must be cohesive, fashionable, and suitable for the \
         user's gender and personal color season ('{season}').",
        palette = palette_names(request.palette.as_deref()),
        tips = format_fashion_tips(&request.fashion_tips),
        accessories = accessories,
        style = request.style,
        season = request.season,
    );

    let face_preservation = "**CRITICAL REQUIREMENT: Preserve the original face.** The user's \
         face from the provided photo **must be used exactly as is**. Do not alter their core \
         facial structure, features (eyes, nose, mouth), or identity. The goal is a realistic \
         visualization of a makeover on the *actual person* in the photo, not the creation of a \
         new, different person. The final image must be instantly recognizable as the original \
         individual.";

    let artistic_direction = "**Artistic Direction & Quality:**\n\
         *   **Realism:** Aim for hyper-realism and photorealism. The result should look like a \
         real photograph.\n\
         *   **Details:** Generate an image with extremely high detail, as if taken with a \
         professional DSLR camera. Include realistic skin texture, hair strands, and fabric \
         details.\n\
         *   **Lighting:** Apply cinematic, professional studio lighting that enhances the \
         user's features and the overall mood.\n\
         *   **Focus:** The user's face must be in sharp focus.\n\
         *   **Resolution:** The output should be of the highest possible quality, equivalent to \
         8K UHD.";

    let primary_task = if request.style == KBeautyStyle::CelebrityInspired {
        "**Primary Task: Create a hyper-realistic, photorealistic fashion portrait of the user, \
         using their photo as a base. Your response MUST include the edited image.**"
    } else {
        "**Primary Task: Edit the user's photo to give them a complete K-beauty makeover, \
         resulting in a hyper-realistic, photorealistic image. Your response MUST include the \
         edited image.**"
    };

    format!(
        "{primary_task}\n\n\
         {face_preservation}\n\n\
         **Framing:** {shot_line}\n\n\
         **Theme:** The aesthetic for this makeover is **'{style}'**.\n\
         *Theme Description:* {theme}\n\n\
         {artistic_direction}\n\n\
         **User Profile for Styling:**\n\
         *   **Gender:** {gender}\n\
         *   **Personal Color Season:** {season}\n\n\
         **Transformation Guidelines:**\n\
         1.  **Face Synthesis:** Keep the user's face, but seamlessly blend it into the new scene.\n\
         2.  **Makeup:** {makeup}\n\
         3.  **Hair:** Change the hair to a trendy Korean style and color that suits their season \
         and the theme.\n\
         4.  **Fashion Details:**\n{fashion_instruction}\n\n\
         **Output Requirement:**\n\
         After generating the edited image, provide a short, single-paragraph text description of \
         the changes made (makeup, hair, fashion) and how they align with the '{style}' theme and \
         the requested framing ({shot_description}). Do not respond with only text.",
        style = request.style,
        theme = style_instruction(request.style),
        gender = request.gender,
        season = request.season,
        makeup = makeup_instruction(request.gender),
    )
}
