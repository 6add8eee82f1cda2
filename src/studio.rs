use chrono::{DateTime, Utc};
use std::future::Future;
use parking_lot::Mutex;
use reqwest::Url;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::annotation::{self, MarkerBoard};
use crate::error::StudioError;
use crate::gemini::{GeminiError, ImageModel, RequestPart};
use crate::lookup;
use crate::models::{
    ClickOutcome, ClickRequest, HistoryItem, ImageData, InspirationPhoto, Marker, PercentPoint, ProductLink,
    StagingOptions, Surface,
};
use crate::prompt;
use crate::view::{self, ViewState};

/// Which network call, if any, currently owns the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    #[default]
    Idle,
    Generating,
    LookingUp,
}

#[derive(Debug, Default)]
pub struct Studio {
    pub original: Option<ImageData>,
    pub staged: Option<ImageData>,
    pub markers: MarkerBoard,
    pub inspiration: Vec<InspirationPhoto>,
    pub history: Vec<HistoryItem>,
    pub annotation_mode: bool,
    pub activity: Activity,
    pub error: Option<String>,
}

impl Studio {
    pub fn is_busy(&self) -> bool {
        self.activity != Activity::Idle
    }

    fn has_image(&self, surface: Surface) -> bool {
        match surface {
            Surface::Original => self.original.is_some(),
            Surface::Staged => self.staged.is_some(),
        }
    }

    fn report(&mut self, err: &StudioError) {
        if err.is_user_visible() {
            warn!("⚠️ {}", err);
            self.error = Some(err.to_string());
        }
    }

    /// Swaps in a newly uploaded photo. Markers on the old photo are dropped
    /// whether or not the new one could be read.
    pub fn replace_original(&mut self, upload: Result<ImageData, StudioError>) -> Result<(), StudioError> {
        self.markers.clear(Surface::Original);
        match upload {
            Ok(image) => {
                info!("🏠 Original photo replaced ({})", image.mime_type);
                self.original = Some(image);
                Ok(())
            }
            Err(err) => {
                self.original = None;
                self.report(&err);
                Err(err)
            }
        }
    }

    pub fn add_inspiration(&mut self, upload: Result<Vec<InspirationPhoto>, StudioError>) -> Result<usize, StudioError> {
        match upload {
            Ok(photos) => {
                let added = photos.len();
                self.inspiration.extend(photos);
                info!("🖼️ Added {} inspiration photos ({} total)", added, self.inspiration.len());
                Ok(added)
            }
            Err(err) => {
                self.report(&err);
                Err(err)
            }
        }
    }

    pub fn remove_inspiration(&mut self, index: usize) -> Result<InspirationPhoto, StudioError> {
        if index >= self.inspiration.len() {
            return Err(StudioError::IndexOutOfRange { what: "inspiration photo", index });
        }
        Ok(self.inspiration.remove(index))
    }

    /// Enters or leaves annotation mode on the staged image. Leaving throws
    /// away the staged markers collected so far.
    pub fn toggle_annotation_mode(&mut self) -> Result<bool, StudioError> {
        if self.is_busy() {
            return Err(StudioError::Busy);
        }
        if !self.annotation_mode && self.staged.is_none() {
            return Err(StudioError::MissingImage(Surface::Staged));
        }
        self.annotation_mode = !self.annotation_mode;
        if !self.annotation_mode {
            self.markers.clear(Surface::Staged);
        }
        Ok(self.annotation_mode)
    }

    /// Opens the annotation modal at the clicked spot. `Ok(None)` means the
    /// click was ignored (no image there yet, or it hit an existing marker).
    pub fn place_marker(&mut self, surface: Surface, click: &ClickRequest) -> Result<Option<PercentPoint>, StudioError> {
        if surface == Surface::Staged && !self.annotation_mode {
            return Err(StudioError::AnnotationModeInactive);
        }
        let has_image = self.has_image(surface);
        Ok(self.markers.place(surface, click, has_image))
    }

    pub fn commit_annotation(&mut self, text: &str) -> Option<Marker> {
        let surface = self.markers.pending()?.surface;
        self.markers.commit(surface, text).cloned()
    }

    pub fn cancel_annotation(&mut self) {
        self.markers.discard_pending();
    }

    pub fn select_history(&mut self, index: usize) -> Result<(), StudioError> {
        if self.is_busy() {
            return Err(StudioError::Busy);
        }
        let item = self
            .history
            .get(index)
            .ok_or(StudioError::IndexOutOfRange { what: "history entry", index })?;
        self.staged = Some(item.image.clone());
        self.annotation_mode = false;
        self.markers.clear(Surface::Staged);
        Ok(())
    }

    fn accept_generated(&mut self, image: ImageData, first_generation: bool) {
        self.staged = Some(image.clone());
        self.history.push(HistoryItem { image, created_at: Utc::now() });
        if first_generation {
            self.markers.clear(Surface::Original);
        }
        self.annotation_mode = false;
        self.markers.clear(Surface::Staged);
    }

    fn reject_generated(&mut self, err: &StudioError, first_generation: bool) {
        self.report(err);
        if first_generation {
            self.staged = None;
            self.annotation_mode = false;
            self.markers.clear(Surface::Staged);
        }
    }
}

/// Releases the session's activity when dropped, on every exit path.
struct BusyToken<'a> {
    session: &'a Session,
}

impl Drop for BusyToken<'_> {
    fn drop(&mut self) {
        self.session.studio.lock().activity = Activity::Idle;
    }
}

enum ClickRoute {
    Placed(Option<PercentPoint>),
    Lookup(PercentPoint),
    Ignored,
}

pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    studio: Mutex<Studio>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4(), created_at: Utc::now(), studio: Mutex::new(Studio::default()) }
    }

    pub fn with_studio<R>(&self, f: impl FnOnce(&mut Studio) -> R) -> R {
        f(&mut *self.studio.lock())
    }

    pub fn view(&self) -> ViewState {
        view::project(&self.studio.lock())
    }

    /// Takes the busy token for `activity` after `prepare` accepted the
    /// current state. Banner-worthy preparation failures are reported.
    fn begin<T>(
        &self,
        activity: Activity,
        prepare: impl FnOnce(&Studio) -> Result<T, StudioError>,
    ) -> Result<(BusyToken<'_>, T), StudioError> {
        let mut studio = self.studio.lock();
        if studio.is_busy() {
            return Err(StudioError::Busy);
        }
        let prepared = match prepare(&*studio) {
            Ok(prepared) => prepared,
            Err(err) => {
                studio.report(&err);
                return Err(err);
            }
        };
        studio.activity = activity;
        studio.error = None;
        Ok((BusyToken { session: self }, prepared))
    }

    /// Holds the generation slot while inspiration files are read, so staging
    /// cannot start without the photos being attached.
    pub async fn add_inspiration<F>(&self, read: F) -> Result<usize, StudioError>
    where
        F: Future<Output = Result<Vec<InspirationPhoto>, StudioError>>,
    {
        let token = {
            let mut studio = self.studio.lock();
            if studio.is_busy() {
                return Err(StudioError::Busy);
            }
            studio.activity = Activity::Generating;
            BusyToken { session: self }
        };
        let photos = read.await;
        let result = self.with_studio(|studio| studio.add_inspiration(photos));
        drop(token);
        result
    }

    pub async fn stage(&self, model: &dyn ImageModel, options: &StagingOptions) -> Result<ImageData, StudioError> {
        let (token, parts) = self.begin(Activity::Generating, |studio| {
            let original = studio.original.as_ref().ok_or(StudioError::MissingImage(Surface::Original))?;
            let prompt = prompt::compose_stage_prompt(
                options,
                studio.inspiration.len(),
                studio.markers.markers(Surface::Original),
            );
            let mut parts = vec![RequestPart::image(original)];
            parts.extend(studio.inspiration.iter().map(RequestPart::image));
            parts.push(RequestPart::text(prompt));
            Ok(parts)
        })?;

        info!("🎯 Staging {} {} ({} request parts)", options.style, options.room_type, parts.len());
        let outcome = model.edit_image(parts).await;
        self.finish_generation(token, outcome, true)
    }

    pub async fn apply_tweaks(&self, model: &dyn ImageModel, options: &StagingOptions) -> Result<ImageData, StudioError> {
        let (token, parts) = self.begin(Activity::Generating, |studio| {
            let staged = studio.staged.as_ref().ok_or(StudioError::MissingImage(Surface::Staged))?;
            let prompt = prompt::compose_tweak_prompt(options, studio.markers.markers(Surface::Staged))?;
            Ok(vec![RequestPart::image(staged), RequestPart::text(prompt)])
        })?;

        info!("🎯 Applying tweaks to staged image");
        let outcome = model.edit_image(parts).await;
        self.finish_generation(token, outcome, false)
    }

    fn finish_generation(
        &self,
        token: BusyToken<'_>,
        outcome: Result<Option<ImageData>, GeminiError>,
        first_generation: bool,
    ) -> Result<ImageData, StudioError> {
        let result = match outcome {
            Ok(Some(image)) => Ok(image),
            Ok(None) => Err(StudioError::NoImageReturned),
            Err(e) => Err(StudioError::Transport(e.user_message())),
        };
        self.with_studio(|studio| match &result {
            Ok(image) => {
                studio.accept_generated(image.clone(), first_generation);
                info!("✅ Staged image updated ({} iterations)", studio.history.len());
            }
            Err(err) => studio.reject_generated(err, first_generation),
        });
        drop(token);
        result
    }

    /// Names the item at `position` on the staged image and links to a search for it.
    pub async fn lookup_product(
        &self,
        model: &dyn ImageModel,
        position: PercentPoint,
        search_base: &Url,
    ) -> Result<ProductLink, StudioError> {
        let (token, staged) = self.begin(Activity::LookingUp, |studio| {
            studio.staged.clone().ok_or(StudioError::MissingImage(Surface::Staged))
        })?;

        let prompt = prompt::compose_lookup_prompt(position);
        let answer = model.describe(&staged, &prompt).await;
        let result = answer
            .map_err(|e| StudioError::Transport(e.user_message()))
            .and_then(|text| lookup::product_link(search_base, &text));

        self.with_studio(|studio| match &result {
            Ok(link) => info!("🛒 Identified {:?}", link.query),
            Err(err) => studio.report(err),
        });
        drop(token);
        result
    }

    /// A click on one of the two image surfaces. The original image always
    /// collects markers; the staged image collects them in annotation mode
    /// and otherwise looks up the clicked product.
    pub async fn click(
        &self,
        model: &dyn ImageModel,
        surface: Surface,
        click: &ClickRequest,
        search_base: &Url,
    ) -> Result<ClickOutcome, StudioError> {
        let route = self.with_studio(|studio| -> Result<ClickRoute, StudioError> {
            if surface == Surface::Original || studio.annotation_mode {
                return Ok(ClickRoute::Placed(studio.place_marker(surface, click)?));
            }
            if studio.staged.is_none() {
                return Ok(ClickRoute::Ignored);
            }
            Ok(annotation::to_percent(click).map_or(ClickRoute::Ignored, ClickRoute::Lookup))
        })?;

        match route {
            ClickRoute::Placed(Some(position)) => Ok(ClickOutcome::Pending { position }),
            ClickRoute::Placed(None) | ClickRoute::Ignored => Ok(ClickOutcome::Ignored),
            ClickRoute::Lookup(position) => {
                let link = self.lookup_product(model, position, search_base).await?;
                Ok(ClickOutcome::Product { link })
            }
        }
    }
}
