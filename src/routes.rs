use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{get, post},
};
use std::{collections::HashMap, future::Future, sync::Arc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    codec::{self, Upload},
    config::Config,
    error::StudioError,
    gemini::ImageModel,
    models::{AnnotationRequest, ClickOutcome, ClickRequest, SessionCreated, StagingOptions, Surface},
    studio::Session,
    view::ViewState,
};

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<Uuid, Arc<Session>>>>,
    pub model: Arc<dyn ImageModel>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(model: Arc<dyn ImageModel>, config: Config) -> Self {
        Self { sessions: Arc::default(), model, config: Arc::new(config) }
    }

    fn session(&self, id: Uuid) -> Result<Arc<Session>, StudioError> {
        self.sessions.read().get(&id).cloned().ok_or(StudioError::SessionNotFound(id))
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/original", post(upload_original))
        .route("/api/sessions/:id/inspiration", post(upload_inspiration))
        .route("/api/sessions/:id/inspiration/:index", axum::routing::delete(remove_inspiration))
        .route("/api/sessions/:id/stage", post(stage_room))
        .route("/api/sessions/:id/annotation-mode", post(toggle_annotation_mode))
        .route("/api/sessions/:id/surfaces/:surface/click", post(click_surface))
        .route("/api/sessions/:id/annotation", post(save_annotation).delete(cancel_annotation))
        .route("/api/sessions/:id/tweaks", post(apply_tweaks))
        .route("/api/sessions/:id/history/:index", post(select_history))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Runs a model-bound operation as its own task so a disconnecting client
/// cannot abandon a call that has already been issued.
async fn run_to_completion<T, F>(operation: F) -> Result<T, StudioError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, StudioError>> + Send + 'static,
{
    tokio::spawn(operation)
        .await
        .map_err(|e| StudioError::Transport(format!("request task failed: {}", e)))?
}

async fn read_uploads(
    mut multipart: Multipart,
    on_error: fn() -> StudioError,
) -> Result<Vec<Upload>, StudioError> {
    let mut uploads = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("❌ Multipart error: {}", e.body_text());
                return Err(on_error());
            }
        };
        // Plain form fields carry neither a file name nor a content type.
        if field.file_name().is_none() && field.content_type().is_none() {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| {
            warn!("❌ Failed to read upload {:?}: {}", file_name, e.body_text());
            on_error()
        })?;
        uploads.push(Upload { file_name, content_type, bytes });
    }
    Ok(uploads)
}

#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    #[serde(flatten)]
    pub session: SessionCreated,
    pub view: ViewState,
}

pub async fn create_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    let session = Arc::new(Session::new());
    let snapshot = SessionSnapshot {
        session: SessionCreated { id: session.id, created_at: session.created_at },
        view: session.view(),
    };
    state.sessions.write().insert(session.id, session);
    info!("🆕 Created session {}", snapshot.session.id);
    Json(snapshot)
}

pub async fn get_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<ViewState>, StudioError> {
    Ok(Json(state.session(id)?.view()))
}

pub async fn upload_original(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ViewState>, StudioError> {
    let session = state.session(id)?;
    let image = match read_uploads(multipart, StudioError::unreadable_photo).await {
        Ok(uploads) => match uploads.into_iter().next() {
            Some(upload) => codec::encode_one(upload).await,
            None => Err(StudioError::unreadable_photo()),
        },
        Err(e) => Err(e),
    };
    session.with_studio(|studio| studio.replace_original(image))?;
    Ok(Json(session.view()))
}

pub async fn upload_inspiration(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ViewState>, StudioError> {
    let session = state.session(id)?;
    session
        .add_inspiration(async move {
            let uploads = read_uploads(multipart, StudioError::unreadable_inspiration).await?;
            codec::encode_all(uploads).await.map_err(|_| StudioError::unreadable_inspiration())
        })
        .await?;
    Ok(Json(session.view()))
}

pub async fn remove_inspiration(
    Path((id, index)): Path<(Uuid, usize)>,
    State(state): State<AppState>,
) -> Result<Json<ViewState>, StudioError> {
    let session = state.session(id)?;
    session.with_studio(|studio| studio.remove_inspiration(index))?;
    Ok(Json(session.view()))
}

pub async fn stage_room(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(options): Json<StagingOptions>,
) -> Result<Json<ViewState>, StudioError> {
    let session = state.session(id)?;
    let task_session = session.clone();
    let model = state.model.clone();
    run_to_completion(async move { task_session.stage(model.as_ref(), &options).await }).await?;
    Ok(Json(session.view()))
}

pub async fn apply_tweaks(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(options): Json<StagingOptions>,
) -> Result<Json<ViewState>, StudioError> {
    let session = state.session(id)?;
    let task_session = session.clone();
    let model = state.model.clone();
    run_to_completion(async move { task_session.apply_tweaks(model.as_ref(), &options).await }).await?;
    Ok(Json(session.view()))
}

pub async fn toggle_annotation_mode(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ViewState>, StudioError> {
    let session = state.session(id)?;
    session.with_studio(|studio| studio.toggle_annotation_mode())?;
    Ok(Json(session.view()))
}

pub async fn click_surface(
    Path((id, surface)): Path<(Uuid, Surface)>,
    State(state): State<AppState>,
    Json(click): Json<ClickRequest>,
) -> Result<Json<ClickOutcome>, StudioError> {
    let session = state.session(id)?;
    let model = state.model.clone();
    let search_base = state.config.shopping_search_url.clone();
    let outcome = run_to_completion(async move {
        session.click(model.as_ref(), surface, &click, &search_base).await
    })
    .await?;
    Ok(Json(outcome))
}

pub async fn save_annotation(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<AnnotationRequest>,
) -> Result<Json<ViewState>, StudioError> {
    let session = state.session(id)?;
    session.with_studio(|studio| studio.commit_annotation(&body.text));
    Ok(Json(session.view()))
}

pub async fn cancel_annotation(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<ViewState>, StudioError> {
    let session = state.session(id)?;
    session.with_studio(|studio| studio.cancel_annotation());
    Ok(Json(session.view()))
}

pub async fn select_history(
    Path((id, index)): Path<(Uuid, usize)>,
    State(state): State<AppState>,
) -> Result<Json<ViewState>, StudioError> {
    let session = state.session(id)?;
    session.with_studio(|studio| studio.select_history(index))?;
    Ok(Json(session.view()))
}
