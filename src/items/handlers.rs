use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{ItemPayload, ItemSaved, ListQuery};
use super::repo::{self, Item};
use crate::categories;
use crate::error::ApiError;
use crate::images::validate_image_url;
use crate::session::{CurrentUser, SessionUser};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/item/", get(list).post(create))
        .route(
            "/api/item/:id",
            get(get_one).post(create).put(update).delete(remove),
        )
}

#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Item>>, ApiError> {
    let items = if let Some(category_id) = query.category_id {
        repo::list_by_category(&state.db, category_id).await?
    } else if let Some(user_id) = query.user_id {
        repo::list_by_user(&state.db, user_id).await?
    } else {
        repo::list_all(&state.db).await?
    };
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Item>, ApiError> {
    let item = repo::find(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Item"))?;
    Ok(Json(item))
}

/// The session user must own the category an item is written into.
async fn owned_category(
    state: &AppState,
    user: &SessionUser,
    category_id: Option<Uuid>,
) -> Result<Uuid, ApiError> {
    let category_id = category_id.ok_or(ApiError::CategoryRequired)?;
    let category = categories::repo::find(&state.db, category_id)
        .await?
        .ok_or(ApiError::NotFound("Category"))?;
    if category.user_id != user.id {
        return Err(ApiError::CategoryNotOwned);
    }
    Ok(category_id)
}

#[instrument(skip(state, payload))]
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<ItemPayload>,
) -> Result<(StatusCode, Json<ItemSaved>), ApiError> {
    let category_id = owned_category(&state, &user, payload.category_id).await?;
    let name = payload
        .name
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or(ApiError::NameRequired)?;
    let description = payload.description.as_deref().unwrap_or("");
    let img_url =
        validate_image_url(state.images.as_ref(), payload.img_url.as_deref().unwrap_or("")).await?;

    let mut tx = state.db.begin().await.context("begin tx")?;
    let item = repo::create_tx(&mut tx, name, description, &img_url, category_id, user.id).await?;
    tx.commit().await.context("commit tx")?;

    info!(item_id = %item.id, category_id = %category_id, user_id = %user.id, "item created");
    Ok((
        StatusCode::CREATED,
        Json(ItemSaved {
            message: "Item created.".into(),
            category_id: item.category_id,
            id: item.id,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ItemPayload>,
) -> Result<(StatusCode, Json<ItemSaved>), ApiError> {
    let category_id = owned_category(&state, &user, payload.category_id).await?;

    let item = repo::find(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Item"))?;
    if item.user_id != user.id {
        return Err(ApiError::NotOwner);
    }

    let name = payload
        .name
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or(ApiError::NameRequired)?;
    let description = payload
        .description
        .as_deref()
        .unwrap_or(item.description.as_str());
    let img_url =
        validate_image_url(state.images.as_ref(), payload.img_url.as_deref().unwrap_or("")).await?;

    let mut tx = state.db.begin().await.context("begin tx")?;
    repo::update_tx(&mut tx, id, name, description, &img_url, category_id).await?;
    tx.commit().await.context("commit tx")?;

    info!(item_id = %id, user_id = %user.id, "item updated");
    Ok((
        StatusCode::ACCEPTED,
        Json(ItemSaved {
            message: "Item updated.".into(),
            category_id,
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
    let item = repo::find(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Item"))?;
    if item.user_id != user.id {
        return Err(ApiError::NotOwner);
    }

    let mut tx = state.db.begin().await.context("begin tx")?;
    repo::delete_tx(&mut tx, id).await?;
    tx.commit().await.context("commit tx")?;

    info!(item_id = %id, user_id = %user.id, "item deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_response_carries_category_and_id() {
        let saved = ItemSaved {
            message: "Item created.".into(),
            category_id: Uuid::new_v4(),
            id: Uuid::new_v4(),
        };
        let json = serde_json::to_string(&saved).unwrap();
        assert!(json.contains("Item created."));
        assert!(json.contains("category_id"));
    }

    #[test]
    fn payload_tolerates_missing_fields() {
        let payload: ItemPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.name.is_none());
        assert!(payload.category_id.is_none());
    }
}
