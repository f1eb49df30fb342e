use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub img_url: String,
    pub category_id: Uuid,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<Item>> {
    let rows = sqlx::query_as::<_, Item>(
        r#"
        SELECT id, name, description, img_url, category_id, user_id, created_at
        FROM items
        ORDER BY created_at ASC
        "#,
    )
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn list_by_category(db: &PgPool, category_id: Uuid) -> anyhow::Result<Vec<Item>> {
    let rows = sqlx::query_as::<_, Item>(
        r#"
        SELECT id, name, description, img_url, category_id, user_id, created_at
        FROM items
        WHERE category_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(category_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Item>> {
    let rows = sqlx::query_as::<_, Item>(
        r#"
        SELECT id, name, description, img_url, category_id, user_id, created_at
        FROM items
        WHERE user_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Item>> {
    let row = sqlx::query_as::<_, Item>(
        r#"
        SELECT id, name, description, img_url, category_id, user_id, created_at
        FROM items
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn create_tx(
    tx: &mut Transaction<'_, Postgres>,
    name: &str,
    description: &str,
    img_url: &str,
    category_id: Uuid,
    user_id: Uuid,
) -> anyhow::Result<Item> {
    let row = sqlx::query_as::<_, Item>(
        r#"
        INSERT INTO items (name, description, img_url, category_id, user_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, name, description, img_url, category_id, user_id, created_at
        "#,
    )
    .bind(name)
    .bind(description)
    .bind(img_url)
    .bind(category_id)
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row)
}

pub async fn update_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    name: &str,
    description: &str,
    img_url: &str,
    category_id: Uuid,
) -> anyhow::Result<()> {
    tx.execute(
        sqlx::query(
            r#"
            UPDATE items
            SET name = $2, description = $3, img_url = $4, category_id = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(img_url)
        .bind(category_id),
    )
    .await?;
    Ok(())
}

pub async fn delete_tx(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> anyhow::Result<()> {
    tx.execute(sqlx::query(r#"DELETE FROM items WHERE id = $1"#).bind(id))
        .await?;
    Ok(())
}
