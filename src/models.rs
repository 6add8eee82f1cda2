use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Base64 payload plus its media type, as exchanged with the image API.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub data: String,
    pub mime_type: String,
}

impl ImageData {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self { data: data.into(), mime_type: mime_type.into() }
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

pub type InspirationPhoto = ImageData;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HistoryItem {
    pub image: ImageData,
    pub created_at: DateTime<Utc>,
}

/// The two image surfaces a marker can be pinned to.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Original,
    Staged,
}

impl std::fmt::Display for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Surface::Original => f.write_str("original"),
            Surface::Staged => f.write_str("staged"),
        }
    }
}

/// Position relative to the rendered image, both axes in 0..=100.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct PercentPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Marker {
    pub x: f64,
    pub y: f64,
    pub annotation: String,
}

/// A click on an image wrapper, in pixels relative to the wrapper's top-left corner.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct ClickRequest {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub on_marker: bool, // the click landed on an existing marker glyph
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ColorScheme {
    pub primary: String,
    pub secondary: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StagingOptions {
    #[serde(default = "default_room_type")]
    pub room_type: String,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default)]
    pub remove_furniture: bool,
    #[serde(default)]
    pub colors: Option<ColorScheme>, // None = let the model pick a palette
    #[serde(default)]
    pub custom_instructions: String,
}

fn default_room_type() -> String { "Living Room".to_string() }
fn default_style() -> String { "Modern".to_string() }

impl Default for StagingOptions {
    fn default() -> Self {
        Self {
            room_type: default_room_type(),
            style: default_style(),
            remove_furniture: false,
            colors: None,
            custom_instructions: String::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnnotationRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProductLink {
    pub query: String,
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClickOutcome {
    /// The annotation modal should open for this position.
    Pending { position: PercentPoint },
    /// The click was rejected without any state change.
    Ignored,
    /// Open `url` in a new browsing context.
    Product { link: ProductLink },
}

#[derive(Debug, Serialize, Clone)]
pub struct SessionCreated {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}
