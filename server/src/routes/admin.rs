//! Admin surface. Every handler sits behind the bearer gate; every
//! mutation feeds the fire-and-forget activity trail.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use content::model::{
    AboutContent, FooterContent, HeroContent, Project, ResourceCategory, HERO_IMAGE_SLOTS,
};
use content::{activity, blog, editor, keys, projects, resources, subscribers};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::debug;

use super::with_ids;
use crate::error::ApiError;
use crate::state::AppState;

fn log(state: &AppState, action: &str, details: String) {
    activity::log_activity(
        state.store.clone(),
        state.config.admin_email.clone(),
        action,
        details,
    );
}

/// Drains a save's aggregate upload progress into the logs.
fn progress_channel(action: &'static str) -> watch::Sender<u8> {
    let (tx, mut rx) = watch::channel(0u8);
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            debug!(action, percent = *rx.borrow(), "upload progress");
        }
    });
    tx
}

// ---- Singleton editors ---------------------------------------------------

async fn load_singleton<T: serde::Serialize + Default>(
    state: &AppState,
    id: &str,
) -> Result<Json<Value>, ApiError> {
    let doc = editor::load_or_init(
        state.store.as_ref(),
        keys::CONTENT,
        id,
        serde_json::to_value(T::default()).map_err(content::ContentError::from)?,
    )
    .await?;
    Ok(Json(doc))
}

pub async fn get_hero(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    load_singleton::<HeroContent>(&state, keys::HERO_ID).await
}

pub async fn get_about(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    load_singleton::<AboutContent>(&state, keys::ABOUT_ID).await
}

pub async fn get_footer(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    load_singleton::<FooterContent>(&state, keys::FOOTER_ID).await
}

pub async fn put_hero(
    State(state): State<Arc<AppState>>,
    Json(mut hero): Json<HeroContent>,
) -> Result<Json<Value>, ApiError> {
    // Fixed slot count: extra slots are dropped, missing ones stay empty.
    hero.images.resize(HERO_IMAGE_SLOTS, String::new());

    let saved = state
        .pipeline()
        .save_singleton(
            keys::HERO_ID,
            serde_json::to_value(&hero).map_err(content::ContentError::from)?,
            &[keys::HERO_CACHE],
            Some(progress_channel("save hero")),
        )
        .await?;
    log(&state, "save", "hero updated".to_string());
    Ok(Json(saved))
}

pub async fn put_about(
    State(state): State<Arc<AppState>>,
    Json(about): Json<AboutContent>,
) -> Result<Json<Value>, ApiError> {
    let saved = state
        .pipeline()
        .save_singleton(
            keys::ABOUT_ID,
            serde_json::to_value(&about).map_err(content::ContentError::from)?,
            &[keys::ABOUT_CACHE],
            Some(progress_channel("save about")),
        )
        .await?;
    log(&state, "save", "about updated".to_string());
    Ok(Json(saved))
}

pub async fn put_footer(
    State(state): State<Arc<AppState>>,
    Json(footer): Json<FooterContent>,
) -> Result<Json<Value>, ApiError> {
    let saved = state
        .pipeline()
        .save_singleton(
            keys::FOOTER_ID,
            serde_json::to_value(&footer).map_err(content::ContentError::from)?,
            &[keys::FOOTER_CACHE],
            Some(progress_channel("save footer")),
        )
        .await?;
    log(&state, "save", "footer updated".to_string());
    Ok(Json(saved))
}

// ---- Projects ------------------------------------------------------------

pub async fn list_projects(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let docs = projects::list_projects(state.store.as_ref()).await?;
    Ok(Json(with_ids(docs).map_err(content::ContentError::from)?))
}

pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Json(project): Json<Project>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (id, saved) = projects::save_project(
        &state.pipeline(),
        None,
        project,
        Some(progress_channel("create project")),
    )
    .await?;
    log(&state, "create", format!("project {id} ({})", saved.title));
    Ok((StatusCode::CREATED, Json(json!({ "id": id, "project": saved }))))
}

pub async fn update_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(project): Json<Project>,
) -> Result<Json<Value>, ApiError> {
    let (id, saved) = projects::save_project(
        &state.pipeline(),
        Some(id),
        project,
        Some(progress_channel("update project")),
    )
    .await?;
    log(&state, "update", format!("project {id}"));
    Ok(Json(json!({ "id": id, "project": saved })))
}

pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    projects::delete_project(&state.pipeline(), &id).await?;
    log(&state, "delete", format!("project {id}"));
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct FeaturedPayload {
    pub featured: bool,
}

pub async fn toggle_featured(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<FeaturedPayload>,
) -> Result<Json<Value>, ApiError> {
    let featured = projects::toggle_featured(&state.pipeline(), &id, payload.featured).await?;
    log(
        &state,
        "update",
        format!("project {id} featured={}", payload.featured),
    );
    Ok(Json(json!({ "featuredProjects": featured })))
}

// ---- Blog ----------------------------------------------------------------

pub async fn list_posts(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let docs = blog::list_all(state.store.as_ref()).await?;
    Ok(Json(with_ids(docs).map_err(content::ContentError::from)?))
}

pub async fn create_post(
    State(state): State<Arc<AppState>>,
    Json(post): Json<content::model::BlogPost>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (id, saved) = blog::save_post(
        &state.pipeline(),
        None,
        post,
        Some(progress_channel("create post")),
    )
    .await?;
    log(&state, "create", format!("post {id} ({})", saved.title));
    Ok((StatusCode::CREATED, Json(json!({ "id": id, "post": saved }))))
}

pub async fn update_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(post): Json<content::model::BlogPost>,
) -> Result<Json<Value>, ApiError> {
    let (id, saved) = blog::save_post(
        &state.pipeline(),
        Some(id),
        post,
        Some(progress_channel("update post")),
    )
    .await?;
    log(&state, "update", format!("post {id}"));
    Ok(Json(json!({ "id": id, "post": saved })))
}

pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    blog::delete_post(&state.pipeline(), &id).await?;
    log(&state, "delete", format!("post {id}"));
    Ok(StatusCode::NO_CONTENT)
}

// ---- Resources -----------------------------------------------------------

pub async fn list_resources(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let docs = resources::list_categories(state.store.as_ref()).await?;
    Ok(Json(with_ids(docs).map_err(content::ContentError::from)?))
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Json(category): Json<ResourceCategory>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (id, saved) = resources::save_category(
        &state.pipeline(),
        None,
        category,
        Some(progress_channel("create category")),
    )
    .await?;
    log(&state, "create", format!("resource category {id}"));
    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": id, "category": saved })),
    ))
}

pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(category): Json<ResourceCategory>,
) -> Result<Json<Value>, ApiError> {
    let (id, saved) = resources::save_category(
        &state.pipeline(),
        Some(id),
        category,
        Some(progress_channel("update category")),
    )
    .await?;
    log(&state, "update", format!("resource category {id}"));
    Ok(Json(json!({ "id": id, "category": saved })))
}

pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    resources::delete_category(&state.pipeline(), &id).await?;
    log(&state, "delete", format!("resource category {id}"));
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ReorderPayload {
    pub order: Vec<String>,
}

pub async fn reorder_categories(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ReorderPayload>,
) -> Result<Json<Value>, ApiError> {
    let outcome = resources::reorder_categories(&state.pipeline(), &payload.order).await?;
    log(
        &state,
        "update",
        format!("resource order persisted={}", outcome.persisted),
    );
    Ok(Json(json!({
        "persisted": outcome.persisted,
        "categories": with_ids(outcome.categories).map_err(content::ContentError::from)?,
    })))
}

// ---- Uploads -------------------------------------------------------------

/// Direct multipart upload for editors that attach images outside a
/// document save. Optional `entity` and `parent` text fields namespace the
/// blob path; the first file field is stored.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut entity = "uploads".to_string();
    let mut parent = Utc::now().timestamp_millis().to_string();
    let mut stored: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::MalformedPayload(e.to_string()))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("entity") => {
                entity = field
                    .text()
                    .await
                    .map_err(|e| ApiError::MalformedPayload(e.to_string()))?;
            }
            Some("parent") => {
                parent = field
                    .text()
                    .await
                    .map_err(|e| ApiError::MalformedPayload(e.to_string()))?;
            }
            _ => {
                let filename = field
                    .file_name()
                    .unwrap_or("file")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::MalformedPayload(e.to_string()))?;
                stored = Some((filename, bytes.to_vec()));
            }
        }
    }

    let (filename, bytes) =
        stored.ok_or_else(|| ApiError::MalformedPayload("no file field".to_string()))?;
    let path = store::object_path(&entity, &parent, &filename);
    let url = state
        .blobs
        .put(&path, &bytes, Some(progress_channel("upload")))
        .await?;

    log(&state, "upload", path.clone());
    Ok((StatusCode::CREATED, Json(json!({ "url": url, "path": path }))))
}

// ---- Subscribers and activity -------------------------------------------

pub async fn list_subscribers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let docs = subscribers::list_subscribers(state.store.as_ref()).await?;
    Ok(Json(with_ids(docs).map_err(content::ContentError::from)?))
}

pub async fn delete_subscriber(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    subscribers::unsubscribe(state.store.as_ref(), &id).await?;
    log(&state, "delete", format!("subscriber {id}"));
    Ok(StatusCode::NO_CONTENT)
}

pub async fn recent_activity(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let records = activity::recent_activity(state.store.as_ref(), 50).await?;
    Ok(Json(
        serde_json::to_value(records).map_err(content::ContentError::from)?,
    ))
}
