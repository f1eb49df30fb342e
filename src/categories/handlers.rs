use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{CategoryPayload, CategorySaved, ListQuery};
use super::repo::{self, Category};
use crate::error::ApiError;
use crate::images::validate_image_url;
use crate::session::CurrentUser;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/category/", get(list).post(create))
        .route(
            "/api/category/:id",
            get(get_one).post(create).put(update).delete(remove),
        )
}

#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Category>>, ApiError> {
    let categories = match query.user_id {
        Some(user_id) => repo::list_by_user(&state.db, user_id).await?,
        None => repo::list_all(&state.db).await?,
    };
    Ok(Json(categories))
}

#[instrument(skip(state))]
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>, ApiError> {
    let category = repo::find(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Category"))?;
    Ok(Json(category))
}

#[instrument(skip(state, payload))]
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CategoryPayload>,
) -> Result<(StatusCode, Json<CategorySaved>), ApiError> {
    let name = payload
        .name
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or(ApiError::NameRequired)?;
    let img_url =
        validate_image_url(state.images.as_ref(), payload.img_url.as_deref().unwrap_or("")).await?;

    let mut tx = state.db.begin().await.context("begin tx")?;
    let category = repo::create_tx(&mut tx, name, &img_url, user.id).await?;
    tx.commit().await.context("commit tx")?;

    info!(category_id = %category.id, user_id = %user.id, "category created");
    Ok((
        StatusCode::CREATED,
        Json(CategorySaved {
            message: "Category created.".into(),
            id: category.id,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryPayload>,
) -> Result<(StatusCode, Json<CategorySaved>), ApiError> {
    let category = repo::find(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Category"))?;
    if category.user_id != user.id {
        return Err(ApiError::NotOwner);
    }

    let name = payload
        .name
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or(ApiError::NameRequired)?;
    let img_url =
        validate_image_url(state.images.as_ref(), payload.img_url.as_deref().unwrap_or("")).await?;

    let mut tx = state.db.begin().await.context("begin tx")?;
    repo::update_tx(&mut tx, id, name, &img_url).await?;
    tx.commit().await.context("commit tx")?;

    info!(category_id = %id, user_id = %user.id, "category updated");
    Ok((
        StatusCode::ACCEPTED,
        Json(CategorySaved {
            message: "Category updated.".into(),
            id,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let category = repo::find(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Category"))?;
    if category.user_id != user.id {
        return Err(ApiError::NotOwner);
    }

    let mut tx = state.db.begin().await.context("begin tx")?;
    repo::delete_tx(&mut tx, id).await?;
    tx.commit().await.context("commit tx")?;

    info!(category_id = %id, user_id = %user.id, "category deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_response_serializes_message_and_id() {
        let saved = CategorySaved {
            message: "Category created.".into(),
            id: Uuid::new_v4(),
        };
        let json = serde_json::to_string(&saved).unwrap();
        assert!(json.contains("Category created."));
        assert!(json.contains("id"));
    }

    #[test]
    fn payload_tolerates_missing_fields() {
        let payload: CategoryPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.name.is_none());
        assert!(payload.img_url.is_none());
    }
}
