use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body for item create and update; presence is checked by the handler.
#[derive(Debug, Deserialize)]
pub struct ItemPayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub img_url: Option<String>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub category_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ItemSaved {
    pub message: String,
    pub category_id: Uuid,
    pub id: Uuid,
}
