use serde::Serialize;
use sqlx::postgres::PgPool;
use time::OffsetDateTime;

#[derive(Serialize, Clone, Debug, sqlx::FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

#[derive(Serialize, Clone, Debug, sqlx::FromRow)]
pub struct Blog {
    pub id: i32,
    pub title: String,
    pub contents: String,
    pub user_id: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// One entry on the home listing: a blog joined with its author's name and
/// the number of comments underneath it.
#[derive(Serialize, Debug, sqlx::FromRow)]
pub struct BlogCard {
    pub id: i32,
    pub title: String,
    pub contents: String,
    pub user_id: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub username: String,
    pub comment_count: i64,
}

#[derive(Serialize, Debug, sqlx::FromRow)]
pub struct BlogDetail {
    pub id: i32,
    pub title: String,
    pub contents: String,
    pub user_id: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub username: String,
}

#[derive(Serialize, Debug, sqlx::FromRow)]
pub struct CommentView {
    pub id: i32,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date_created: OffsetDateTime,
    pub user_id: i32,
    pub username: String,
}

/// The dashboard view of a user: identity without the password hash, plus
/// every blog they own.
#[derive(Serialize, Debug)]
pub struct DashboardUser {
    pub id: i32,
    pub username: String,
    pub blogs: Vec<Blog>,
}

pub async fn fetch_blog_cards(pool: &PgPool) -> Result<Vec<BlogCard>, sqlx::Error> {
    sqlx::query_as::<_, BlogCard>(
        "SELECT b.id, b.title, b.contents, b.user_id, b.created_at, u.username, \
         COUNT(c.id) AS comment_count \
         FROM blogs b \
         JOIN users u ON u.id = b.user_id \
         LEFT JOIN comments c ON c.blog_id = b.id \
         GROUP BY b.id, u.username \
         ORDER BY b.created_at DESC",
    )
    .fetch_all(pool)
    .await
}

pub async fn fetch_blog_detail(
    pool: &PgPool,
    blog_id: i32,
) -> Result<Option<BlogDetail>, sqlx::Error> {
    sqlx::query_as::<_, BlogDetail>(
        "SELECT b.id, b.title, b.contents, b.user_id, b.created_at, u.username \
         FROM blogs b \
         JOIN users u ON u.id = b.user_id \
         WHERE b.id = $1",
    )
    .bind(blog_id)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_comments(
    pool: &PgPool,
    blog_id: i32,
) -> Result<Vec<CommentView>, sqlx::Error> {
    sqlx::query_as::<_, CommentView>(
        "SELECT c.id, c.text, c.date_created, c.user_id, u.username \
         FROM comments c \
         JOIN users u ON u.id = c.user_id \
         WHERE c.blog_id = $1 \
         ORDER BY c.date_created DESC",
    )
    .bind(blog_id)
    .fetch_all(pool)
    .await
}

pub async fn fetch_dashboard_user(
    pool: &PgPool,
    user_id: i32,
) -> Result<Option<DashboardUser>, sqlx::Error> {
    let user = match sqlx::query_as::<_, (i32, String)>(
        "SELECT id, username FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    {
        Some(user) => user,
        None => return Ok(None),
    };

    let blogs = sqlx::query_as::<_, Blog>(
        "SELECT id, title, contents, user_id, created_at \
         FROM blogs \
         WHERE user_id = $1 \
         ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(Some(DashboardUser {
        id: user.0,
        username: user.1,
        blogs,
    }))
}
