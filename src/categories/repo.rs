use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub img_url: String,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<Category>> {
    let rows = sqlx::query_as::<_, Category>(
        r#"
        SELECT id, name, img_url, user_id, created_at
        FROM categories
        ORDER BY created_at ASC
        "#,
    )
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Category>> {
    let rows = sqlx::query_as::<_, Category>(
        r#"
        SELECT id, name, img_url, user_id, created_at
        FROM categories
        WHERE user_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Category>> {
    let row = sqlx::query_as::<_, Category>(
        r#"
        SELECT id, name, img_url, user_id, created_at
        FROM categories
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
    img_url: &str,
    user_id: Uuid,
) -> anyhow::Result<Category> {
    let row = sqlx::query_as::<_, Category>(
        r#"
        INSERT INTO categories (name, img_url, user_id)
        VALUES ($1, $2, $3)
        RETURNING id, name, img_url, user_id, created_at
        "#,
    )
    .bind(name)
    .bind(img_url)
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row)
}

pub async fn update_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    name: &str,
    img_url: &str,
) -> anyhow::Result<()> {
    tx.execute(
        sqlx::query(
            r#"
            UPDATE categories
            SET name = $2, img_url = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(img_url),
    )
    .await?;
    Ok(())
}

pub async fn delete_tx(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> anyhow::Result<()> {
    tx.execute(sqlx::query(r#"DELETE FROM categories WHERE id = $1"#).bind(id))
        .await?;
    Ok(())
}
