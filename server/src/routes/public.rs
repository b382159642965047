//! Public read surface.
//!
//! Every read goes through the content cache. `GET /api/about` and
//! `GET /api/footer` return the raw stored document (404 when absent) and
//! their `POST` counterparts trigger revalidation, mirroring the original
//! revalidation endpoints; hero materializes its default on first read.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use content::model::{BlogStatus, HeroContent};
use content::{blog, editor, keys, projects, resources, subscribers};
use serde::Deserialize;
use serde_json::{json, Value};

use super::with_ids;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn hero(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let store = state.store.clone();
    let doc = state
        .cache
        .get_or_fetch(keys::HERO_CACHE, keys::LONG_TTL, || async move {
            editor::load_or_init(
                store.as_ref(),
                keys::CONTENT,
                keys::HERO_ID,
                serde_json::to_value(HeroContent::default())?,
            )
            .await
        })
        .await?;
    Ok(Json(doc))
}

async fn singleton(
    state: &AppState,
    cache_key: &str,
    doc_id: &'static str,
) -> Result<Json<Value>, ApiError> {
    let store = state.store.clone();
    let doc = state
        .cache
        .get_or_fetch(cache_key, keys::MEDIUM_TTL, || async move {
            // Absence is cached as null so a missing document stays a 404
            // instead of an error that trips the stale fallback.
            Ok(store
                .get(keys::CONTENT, doc_id)
                .await?
                .unwrap_or(Value::Null))
        })
        .await?;
    if doc.is_null() {
        return Err(ApiError::NotFound(doc_id));
    }
    Ok(Json(doc))
}

pub async fn about(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    singleton(&state, keys::ABOUT_CACHE, keys::ABOUT_ID).await
}

pub async fn footer(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    singleton(&state, keys::FOOTER_CACHE, keys::FOOTER_ID).await
}

fn revalidated(key: &str) -> Json<Value> {
    Json(json!({ "success": true, "message": format!("{key} revalidated") }))
}

pub async fn revalidate_about(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.cache.invalidate(keys::ABOUT_CACHE).await;
    revalidated(keys::ABOUT_CACHE)
}

pub async fn revalidate_footer(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.cache.invalidate(keys::FOOTER_CACHE).await;
    revalidated(keys::FOOTER_CACHE)
}

pub async fn list_projects(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let store = state.store.clone();
    let docs = state
        .cache
        .get_or_fetch(keys::PROJECTS_CACHE, keys::SHORT_TTL, || async move {
            Ok(with_ids(projects::list_projects(store.as_ref()).await?)?)
        })
        .await?;
    Ok(Json(docs))
}

pub async fn featured_projects(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let store = state.store.clone();
    let docs = state
        .cache
        .get_or_fetch(keys::FEATURED_CACHE, keys::MEDIUM_TTL, || async move {
            Ok(with_ids(projects::featured_projects(store.as_ref()).await?)?)
        })
        .await?;
    Ok(Json(docs))
}

pub async fn list_blog(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let store = state.store.clone();
    let docs = state
        .cache
        .get_or_fetch(keys::BLOG_CACHE, keys::SHORT_TTL, || async move {
            Ok(with_ids(blog::list_published(store.as_ref()).await?)?)
        })
        .await?;
    Ok(Json(docs))
}

pub async fn blog_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let post = blog::get_post(state.store.as_ref(), &id)
        .await?
        .filter(|post| post.status == BlogStatus::Published)
        .ok_or(ApiError::NotFound("post"))?;
    let mut value = serde_json::to_value(post).map_err(content::ContentError::from)?;
    if let Value::Object(map) = &mut value {
        map.insert("id".to_string(), Value::String(id));
    }
    Ok(Json(value))
}

pub async fn list_resources(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let store = state.store.clone();
    let docs = state
        .cache
        .get_or_fetch(keys::RESOURCES_CACHE, keys::SHORT_TTL, || async move {
            Ok(with_ids(resources::list_categories(store.as_ref()).await?)?)
        })
        .await?;
    Ok(Json(docs))
}

#[derive(Deserialize)]
pub struct SubscribePayload {
    pub email: String,
}

pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SubscribePayload>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let subscriber = subscribers::subscribe(state.store.as_ref(), &payload.email).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(subscriber).map_err(content::ContentError::from)?),
    ))
}

#[derive(Deserialize)]
pub struct ContactPayload {
    pub name: String,
    pub email: String,
    pub message: String,
}

pub async fn contact(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ContactPayload>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let record = subscribers::store_message(
        state.store.as_ref(),
        &payload.name,
        &payload.email,
        &payload.message,
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(record).map_err(content::ContentError::from)?),
    ))
}
