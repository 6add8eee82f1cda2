use anyhow::{Context, Result};
use reqwest::Url;

pub const DEMO_KEY: &str = "DEMO_KEY";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub api_base: String,
    pub image_model: String,
    pub text_model: String,
    pub port: u16,
    pub shopping_search_url: Url,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: DEMO_KEY.to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            image_model: "gemini-2.5-flash-image-preview".to_string(),
            text_model: "gemini-2.5-flash".to_string(),
            port: 8080,
            shopping_search_url: Url::parse("https://www.amazon.com/s").expect("static url"),
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Reads the process environment (after `.env` has been loaded) on top of the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(key) = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty()) {
            config.api_key = key;
        }
        if let Some(base) = lookup("GEMINI_API_BASE") {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("GEMINI_IMAGE_MODEL") {
            config.image_model = model;
        }
        if let Some(model) = lookup("GEMINI_TEXT_MODEL") {
            config.text_model = model;
        }
        if let Some(port) = lookup("PORT") {
            config.port = port.parse().with_context(|| format!("PORT must be a port number, got {port:?}"))?;
        }
        if let Some(url) = lookup("SHOPPING_SEARCH_URL") {
            config.shopping_search_url = Url::parse(&url)
                .with_context(|| format!("SHOPPING_SEARCH_URL is not a valid URL: {url:?}"))?;
        }
        if let Some(limit) = lookup("MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = limit
                .parse()
                .with_context(|| format!("MAX_UPLOAD_BYTES must be a byte count, got {limit:?}"))?;
        }
        Ok(config)
    }

    pub fn is_demo(&self) -> bool {
        self.api_key == DEMO_KEY
    }

    /// API key with everything past the first few characters hidden, for logs.
    pub fn masked_key(&self) -> String {
        format!("{}...", self.api_key.chars().take(6).collect::<String>())
    }
}
