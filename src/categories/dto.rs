use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body for category create and update. All fields optional so presence is
/// checked by the handler, not the deserializer.
#[derive(Debug, Deserialize)]
pub struct CategoryPayload {
    pub name: Option<String>,
    pub img_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CategorySaved {
    pub message: String,
    pub id: Uuid,
}
