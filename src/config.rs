use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    /// API key for the hosted model. The server starts without one; model
    /// calls fail with a configuration error until it is set.
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub analysis_model: String,
    pub image_model: String,
    /// TrueType font used for collage text. When missing, collage export is
    /// reported unavailable instead of failing the whole server.
    pub font_path: String,
    pub image_proxy_base: String,
    /// Public URL of the front end, embedded in share links.
    pub app_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            port: env::var("GLOWUP_PORT")
                .unwrap_or_else(|_| "18520".to_string())
                .parse()?,
            host: env::var("GLOWUP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_key: env::var("GEMINI_API_KEY").ok(),
            api_base_url: env::var("GLOWUP_API_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            analysis_model: env::var("GLOWUP_ANALYSIS_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            image_model: env::var("GLOWUP_IMAGE_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash-image-preview".to_string()),
            font_path: env::var("GLOWUP_FONT_PATH")
                .unwrap_or_else(|_| "./assets/NotoSans-Regular.ttf".to_string()),
            image_proxy_base: env::var("GLOWUP_IMAGE_PROXY_BASE")
                .unwrap_or_else(|_| "https://images.weserv.nl/".to_string()),
            app_url: env::var("GLOWUP_APP_URL")
                .unwrap_or_else(|_| "https://korean-glow-up.example.com".to_string()),
        })
    }
}
