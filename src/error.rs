use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::Surface;

pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred. Please try again later.";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StudioError {
    #[error("{0}")]
    ReadFailure(String),
    #[error("Please add at least one annotation to tweak the image.")]
    NoAnnotations,
    #[error("The model did not return an image. Please try again with a different image or prompt.")]
    NoImageReturned,
    #[error("Could not identify the selected item. Please try another spot.")]
    NoItemIdentified,
    #[error("{}", transport_message(.0))]
    Transport(String),
    #[error("Another request is still in progress.")]
    Busy,
    #[error("No {0} image has been loaded yet.")]
    MissingImage(Surface),
    #[error("Annotation mode is not active.")]
    AnnotationModeInactive,
    #[error("No {what} at index {index}.")]
    IndexOutOfRange { what: &'static str, index: usize },
    #[error("Session {0} not found.")]
    SessionNotFound(Uuid),
}

fn transport_message(message: &str) -> &str {
    if message.trim().is_empty() { UNEXPECTED_ERROR } else { message }
}

impl StudioError {
    pub fn unreadable_photo() -> Self {
        Self::ReadFailure("Could not read the selected image. Please try another one.".into())
    }

    pub fn unreadable_inspiration() -> Self {
        Self::ReadFailure("Could not read one or more inspiration images.".into())
    }

    /// Whether the failure belongs on the session's error banner. Guard
    /// refusals are not shown; the controls that trigger them are disabled.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::ReadFailure(_)
                | Self::NoAnnotations
                | Self::NoImageReturned
                | Self::NoItemIdentified
                | Self::Transport(_)
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::ReadFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NoAnnotations => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NoImageReturned | Self::NoItemIdentified | Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Busy | Self::AnnotationModeInactive => StatusCode::CONFLICT,
            Self::MissingImage(_) => StatusCode::CONFLICT,
            Self::IndexOutOfRange { .. } | Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for StudioError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn transport_message_passes_through_verbatim() {
        let err = StudioError::Transport("quota exceeded".into());
        assert_eq!(err.to_string(), "quota exceeded");
        assert_eq!(StudioError::Transport(String::new()).to_string(), UNEXPECTED_ERROR);
    }

    #[test]
    fn guard_refusals_stay_off_the_banner() {
        assert!(!StudioError::Busy.is_user_visible());
        assert!(!StudioError::MissingImage(Surface::Staged).is_user_visible());
        assert!(StudioError::NoAnnotations.is_user_visible());
        assert!(StudioError::unreadable_photo().is_user_visible());
    }

    #[test]
    fn statuses() {
        assert_eq!(StudioError::Busy.status(), StatusCode::CONFLICT);
        assert_eq!(StudioError::NoImageReturned.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(StudioError::SessionNotFound(Uuid::nil()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            StudioError::IndexOutOfRange { what: "history entry", index: 3 }.to_string(),
            "No history entry at index 3."
        );
    }
}
