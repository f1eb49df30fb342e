use anyhow::Context;
use axum::{
    extract::{Host, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};
use sqlx::{FromRow, PgPool};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

const FEED_TITLE: &str = "Recent Articles";
const FEED_LIMIT: i64 = 15;

#[derive(Debug, Clone, FromRow)]
struct FeedItem {
    id: Uuid,
    name: String,
    description: String,
    category_id: Uuid,
    created_at: OffsetDateTime,
    author: String,
}

async fn recent_items(db: &PgPool) -> anyhow::Result<Vec<FeedItem>> {
    let rows = sqlx::query_as::<_, FeedItem>(
        r#"
        SELECT i.id, i.name, i.description, i.category_id, i.created_at,
               u.username AS author
        FROM items i
        JOIN users u ON u.id = i.user_id
        ORDER BY i.created_at DESC
        LIMIT $1
        "#,
    )
    .bind(FEED_LIMIT)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

#[instrument(skip(state))]
pub async fn recent_feed(
    State(state): State<AppState>,
    Host(host): Host,
) -> Result<Response, ApiError> {
    let items = recent_items(&state.db).await?;
    let root = format!("http://{host}/");
    let body = render_atom(&root, &items).context("render atom feed")?;
    Ok(([(CONTENT_TYPE, "application/atom+xml")], body).into_response())
}

fn render_atom(root: &str, items: &[FeedItem]) -> anyhow::Result<String> {
    let updated = items
        .first()
        .map(|item| item.created_at)
        .unwrap_or_else(OffsetDateTime::now_utc);

    let mut feed = String::new();
    feed.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    feed.push_str("<feed xmlns=\"http://www.w3.org/2005/Atom\">\n");
    feed.push_str(&format!("  <title>{}</title>\n", xml_escape(FEED_TITLE)));
    feed.push_str(&format!("  <id>{}</id>\n", xml_escape(root)));
    feed.push_str(&format!(
        "  <link href=\"{}api/recent.atom\" rel=\"self\"/>\n",
        xml_escape(root)
    ));
    feed.push_str(&format!(
        "  <updated>{}</updated>\n",
        updated.format(&Rfc3339)?
    ));

    for item in items {
        let link = format!("{root}category/{}/item/{}/", item.category_id, item.id);
        feed.push_str("  <entry>\n");
        feed.push_str(&format!("    <title>{}</title>\n", xml_escape(&item.name)));
        feed.push_str(&format!("    <id>{}</id>\n", xml_escape(&link)));
        feed.push_str(&format!("    <link href=\"{}\"/>\n", xml_escape(&link)));
        feed.push_str(&format!(
            "    <updated>{}</updated>\n",
            item.created_at.format(&Rfc3339)?
        ));
        feed.push_str(&format!(
            "    <author><name>{}</name></author>\n",
            xml_escape(&item.author)
        ));
        feed.push_str(&format!(
            "    <content type=\"html\">{}</content>\n",
            xml_escape(&item.description)
        ));
        feed.push_str("  </entry>\n");
    }

    feed.push_str("</feed>\n");
    Ok(feed)
}

fn xml_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn feed_item(name: &str, description: &str) -> FeedItem {
        FeedItem {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            category_id: Uuid::new_v4(),
            created_at: datetime!(2024-03-01 12:00 UTC),
            author: "ada".into(),
        }
    }

    #[test]
    fn xml_escape_handles_markup_characters() {
        assert_eq!(xml_escape("a & b <c>"), "a &amp; b &lt;c&gt;");
        assert_eq!(xml_escape("\"quoted\""), "&quot;quoted&quot;");
        assert_eq!(xml_escape("plain"), "plain");
    }

    #[test]
    fn empty_feed_is_valid_and_has_no_entries() {
        let feed = render_atom("http://localhost:8000/", &[]).unwrap();
        assert!(feed.contains("<feed xmlns=\"http://www.w3.org/2005/Atom\">"));
        assert!(feed.contains("<title>Recent Articles</title>"));
        assert!(!feed.contains("<entry>"));
    }

    #[test]
    fn entries_link_into_their_category() {
        let item = feed_item("Bat", "a wooden bat");
        let feed = render_atom("http://localhost:8000/", &[item.clone()]).unwrap();
        let link = format!(
            "http://localhost:8000/category/{}/item/{}/",
            item.category_id, item.id
        );
        assert!(feed.contains(&link));
        assert!(feed.contains("<author><name>ada</name></author>"));
        assert!(feed.contains("2024-03-01T12:00:00Z"));
    }

    #[test]
    fn descriptions_are_escaped() {
        let item = feed_item("Bat", "swing & <miss>");
        let feed = render_atom("http://localhost:8000/", &[item]).unwrap();
        assert!(feed.contains("swing &amp; &lt;miss&gt;"));
        assert!(!feed.contains("<miss>"));
    }
}
