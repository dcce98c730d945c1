use axum::{
    debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{roles::ORGANIZERS, AuthUser},
    db::{self, Page},
    error::required,
    AppError, AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", delete(remove))
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    #[sqlx(skip)]
    pub body_html: String,
    pub author_id: Uuid,
    pub author_username: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Announcement {
    fn rendered(mut self) -> Self {
        self.body_html = render_markdown(&self.body);
        self
    }
}

const LINK_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

/// Relative links and the schemes in `LINK_SCHEMES` are allowed.
fn is_safe_url(url: &str) -> bool {
    // browsers ignore whitespace and control characters inside a scheme
    let url: String = url.chars().filter(|c| !c.is_whitespace() && !c.is_control()).collect();
    match url.find([':', '/', '?', '#']) {
        Some(end) if url[end..].starts_with(':') => {
            LINK_SCHEMES.contains(&url[..end].to_ascii_lowercase().as_str())
        }
        _ => true,
    }
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    if is_safe_url(&url) { url } else { CowStr::Borrowed("#") }
}

/// Markdown to HTML. Raw HTML in the source is escaped, not passed through,
/// and links or images with a scheme outside `LINK_SCHEMES` point at `#`.
pub fn render_markdown(source: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let parser = Parser::new_ext(source, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link { link_type, dest_url, title, id }) => {
            Event::Start(Tag::Link { link_type, dest_url: safe_url(dest_url), title, id })
        }
        Event::Start(Tag::Image { link_type, dest_url, title, id }) => {
            Event::Start(Tag::Image { link_type, dest_url: safe_url(dest_url), title, id })
        }
        _ => event,
    });

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}

const SELECT_ANNOUNCEMENTS: &str = "SELECT a.*, u.username AS author_username
    FROM announcements a JOIN users u ON u.id = a.author_id";

#[debug_handler(state = AppState)]
async fn list(
    State(db_pool): State<SqlitePool>,
    _user: AuthUser,
    Query(page): Query<Page>,
) -> AppResult<Json<Vec<Announcement>>> {
    let announcements: Vec<Announcement> =
        sqlx::query_as(&format!("{SELECT_ANNOUNCEMENTS} WHERE a.id < ? ORDER BY a.id DESC LIMIT ?"))
            .bind(page.cursor())
            .bind(page.limit())
            .fetch_all(&db_pool)
            .await?;

    Ok(Json(announcements.into_iter().map(Announcement::rendered).collect()))
}

#[derive(Debug, Deserialize)]
struct NewAnnouncement {
    title: String,
    body: String,
}

#[debug_handler(state = AppState)]
async fn create(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Json(new): Json<NewAnnouncement>,
) -> AppResult<(StatusCode, Json<Announcement>)> {
    user.require(ORGANIZERS)?;
    let title = required("title", &new.title)?;
    let body = required("body", &new.body)?;

    let announcement = Announcement {
        id: Uuid::now_v7(),
        title,
        body,
        body_html: String::new(),
        author_id: user.id,
        author_username: user.username.clone(),
        created_at: db::now(),
    };

    sqlx::query("INSERT INTO announcements (id,title,body,author_id,created_at) VALUES (?,?,?,?,?)")
        .bind(announcement.id)
        .bind(&announcement.title)
        .bind(&announcement.body)
        .bind(announcement.author_id)
        .bind(announcement.created_at)
        .execute(&db_pool)
        .await?;

    info!(announcement = %announcement.id, by = %user.username, "announcement posted");
    Ok((StatusCode::CREATED, Json(announcement.rendered())))
}

#[debug_handler(state = AppState)]
async fn remove(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let (author_id,): (Uuid,) = sqlx::query_as("SELECT author_id FROM announcements WHERE id = ?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("announcement"))?;
    user.require_owner(author_id, "announcement")?;

    sqlx::query("DELETE FROM announcements WHERE id = ?")
        .bind(id)
        .execute(&db_pool)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_renders() {
        let html = render_markdown("# Meeting\n\nBring **snacks**.");
        assert!(html.contains("<h1>Meeting</h1>"));
        assert!(html.contains("<strong>snacks</strong>"));
    }

    #[test]
    fn raw_html_is_escaped() {
        let html = render_markdown("hello <script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn script_links_are_neutralized() {
        let html = render_markdown("[click](javascript:alert(document.cookie))");
        assert!(!html.contains("javascript:"));
        assert!(html.contains(r##"<a href="#">click</a>"##));

        let html = render_markdown("![x](JaVaScRiPt:alert(1)) [y](data:text/html,boom)");
        assert!(!html.to_ascii_lowercase().contains("script:"));
        assert!(!html.contains("data:"));
    }

    #[test]
    fn ordinary_links_survive() {
        let html = render_markdown("[site](https://club.org/a?b=1) [mail](mailto:chair@club.org) [rel](/events/1)");
        assert!(html.contains(r#"href="https://club.org/a?b=1""#));
        assert!(html.contains(r#"href="mailto:chair@club.org""#));
        assert!(html.contains(r#"href="/events/1""#));
    }

    #[test]
    fn urls_are_classified_by_scheme() {
        assert!(is_safe_url("HTTPS://club.org"));
        assert!(is_safe_url("notes/page:2"));
        assert!(is_safe_url("#agenda"));
        assert!(!is_safe_url(" javascript:alert(1)"));
        assert!(!is_safe_url("vbscript:msgbox"));
    }
}
