use serde::Serialize;

use crate::annotation::{MarkerGlyph, PendingMarker};
use crate::models::{ImageData, Surface};
use crate::studio::{Activity, Studio};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ButtonView {
    pub label: &'static str,
    pub enabled: bool,
    pub visible: bool,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfaceView {
    /// Data URL for the image element, when the image is shown.
    pub image: Option<String>,
    pub placeholder_visible: bool,
    pub annotation_mode: bool,
    pub markers: Vec<MarkerGlyph>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thumbnail {
    pub index: usize,
    pub label: String,
    pub src: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewState {
    pub activity: Activity,
    pub generate_button: ButtonView,
    pub tweak_mode_button: ButtonView,
    pub apply_tweaks_button: ButtonView,
    pub tweak_controls_visible: bool,
    pub upload_preview: Option<String>,
    pub upload_placeholder_visible: bool,
    pub original: SurfaceView,
    pub staged: SurfaceView,
    pub staged_hint_visible: bool,
    pub loader_visible: bool,
    pub identifier_loader_visible: bool,
    pub annotation_modal: Option<PendingMarker>,
    pub inspiration: Vec<Thumbnail>,
    pub history_visible: bool,
    pub history: Vec<Thumbnail>,
    pub error_banner: Option<String>,
}

fn thumbnails<'a>(images: impl Iterator<Item = &'a ImageData>, label: &str) -> Vec<Thumbnail> {
    images
        .enumerate()
        .map(|(index, image)| Thumbnail { index, label: format!("{} {}", label, index + 1), src: image.data_url() })
        .collect()
}

pub fn project(studio: &Studio) -> ViewState {
    let busy = studio.is_busy();
    let generating = studio.activity == Activity::Generating;
    let looking_up = studio.activity == Activity::LookingUp;
    let has_original = studio.original.is_some();
    let show_staged = studio.staged.is_some() && !generating;

    ViewState {
        activity: studio.activity,
        generate_button: ButtonView {
            label: if generating { "Staging..." } else { "Stage My Room" },
            enabled: has_original && !busy,
            visible: true,
            active: generating,
        },
        tweak_mode_button: ButtonView {
            label: if studio.annotation_mode { "Cancel Tweak" } else { "Tweak Image" },
            enabled: !busy,
            visible: show_staged,
            active: studio.annotation_mode,
        },
        apply_tweaks_button: ButtonView {
            label: "Apply Tweaks",
            enabled: !busy,
            visible: studio.annotation_mode,
            active: false,
        },
        tweak_controls_visible: show_staged,
        upload_preview: studio.original.as_ref().map(ImageData::data_url),
        upload_placeholder_visible: !has_original,
        original: SurfaceView {
            image: studio.original.as_ref().map(ImageData::data_url),
            placeholder_visible: !has_original,
            annotation_mode: false,
            markers: studio.markers.render(Surface::Original),
        },
        staged: SurfaceView {
            image: studio.staged.as_ref().filter(|_| show_staged).map(ImageData::data_url),
            placeholder_visible: !(show_staged || generating),
            annotation_mode: studio.annotation_mode,
            markers: studio.markers.render(Surface::Staged),
        },
        staged_hint_visible: show_staged,
        loader_visible: generating,
        identifier_loader_visible: looking_up,
        annotation_modal: studio.markers.pending(),
        inspiration: thumbnails(studio.inspiration.iter(), "Inspiration image"),
        history_visible: !studio.history.is_empty(),
        history: thumbnails(studio.history.iter().map(|item| &item.image), "Design Iteration"),
        error_banner: studio.error.clone(),
    }
}
