use handlebars::{DirectorySourceOptions, Handlebars};
use serde_json::json;

fn templates() -> Handlebars<'static> {
    let mut templates = Handlebars::new();
    templates
        .register_templates_directory("templates/", DirectorySourceOptions::default())
        .unwrap();
    templates
}

#[test]
fn homepage_lists_blogs_with_their_authors() {
    let body = templates()
        .render(
            "homepage",
            &json!({
                "blogs": [
                    {"id": 1, "title": "First post", "contents": "hello", "user_id": 5,
                     "created_at": "2026-08-01T12:00:00Z", "username": "alice", "comment_count": 2},
                    {"id": 2, "title": "Second post", "contents": "world", "user_id": 6,
                     "created_at": "2026-08-02T12:00:00Z", "username": "bob", "comment_count": 0},
                ],
                "logged_in": false,
            }),
        )
        .unwrap();

    assert!(body.contains("First post"));
    assert!(body.contains("Second post"));
    assert!(body.contains("alice"));
    assert!(body.contains("bob"));
    assert!(body.contains("/blog/1"));
    assert!(body.contains("Log in"));
}

#[test]
fn homepage_has_a_placeholder_when_there_are_no_blogs() {
    let body = templates()
        .render("homepage", &json!({"blogs": [], "logged_in": false}))
        .unwrap();

    assert!(body.contains("No posts yet."));
}

#[test]
fn blog_page_shows_title_author_and_comments() {
    let body = templates()
        .render(
            "blog",
            &json!({
                "blog": {"id": 1, "title": "First post", "contents": "hello", "user_id": 5,
                         "created_at": "2026-08-01T12:00:00Z", "username": "alice"},
                "comments": [
                    {"id": 7, "text": "nice one", "date_created": "2026-08-02T09:00:00Z",
                     "user_id": 6, "username": "bob"},
                ],
                "logged_in": true,
                "is_author": false,
                "user": {"id": 6, "username": "bob"},
            }),
        )
        .unwrap();

    assert!(body.contains("First post"));
    assert!(body.contains("alice"));
    assert!(body.contains("nice one"));
    assert!(body.contains("new-comment-form"));
}

#[test]
fn blog_page_offers_editing_only_to_the_author() {
    let data = |is_author: bool| {
        json!({
            "blog": {"id": 1, "title": "First post", "contents": "hello", "user_id": 5,
                     "created_at": "2026-08-01T12:00:00Z", "username": "alice"},
            "comments": [],
            "logged_in": true,
            "is_author": is_author,
            "user": {"id": 5, "username": "alice"},
        })
    };

    let as_author = templates().render("blog", &data(true)).unwrap();
    assert!(as_author.contains("Edit this post"));
    assert!(as_author.contains("/dashboard/blog/1"));

    let as_visitor = templates().render("blog", &data(false)).unwrap();
    assert!(!as_visitor.contains("Edit this post"));
}

#[test]
fn dashboard_renders_post_list_only_when_posts_exist() {
    let with_posts = templates()
        .render(
            "dashboard",
            &json!({
                "id": 5,
                "username": "alice",
                "blogs": [
                    {"id": 1, "title": "First post", "contents": "hello", "user_id": 5,
                     "created_at": "2026-08-01T12:00:00Z"},
                ],
                "logged_in": true,
                "user": {"id": 5, "username": "alice"},
            }),
        )
        .unwrap();
    assert!(with_posts.contains("post-list"));
    assert!(with_posts.contains("data-id=\"1\""));

    let without_posts = templates()
        .render(
            "dashboard",
            &json!({
                "id": 5,
                "username": "alice",
                "blogs": [],
                "logged_in": true,
                "user": {"id": 5, "username": "alice"},
            }),
        )
        .unwrap();
    assert!(!without_posts.contains("post-list"));
    assert!(without_posts.contains("You have no posts yet."));
}

#[test]
fn edit_form_is_populated_when_a_blog_is_given() {
    let body = templates()
        .render(
            "editblog",
            &json!({
                "blog": {"id": 3, "title": "Draft", "contents": "wip", "user_id": 5,
                         "created_at": "2026-08-01T12:00:00Z", "username": "alice"},
                "comments": [
                    {"id": 9, "text": "looking forward to this", "date_created": "2026-08-02T09:00:00Z",
                     "user_id": 6, "username": "bob"},
                ],
                "logged_in": true,
                "is_author": true,
                "user": {"id": 5, "username": "alice"},
            }),
        )
        .unwrap();

    assert!(body.contains("edit-post-form"));
    assert!(body.contains("data-id=\"3\""));
    assert!(body.contains("value=\"Draft\""));
    assert!(body.contains("wip"));
    assert!(body.contains("looking forward to this"));
    assert!(body.contains("bob"));
}

#[test]
fn edit_form_is_empty_without_a_blog() {
    let body = templates()
        .render(
            "editblog",
            &json!({"logged_in": true, "user": {"id": 5, "username": "alice"}}),
        )
        .unwrap();

    assert!(body.contains("new-post-form"));
    assert!(!body.contains("edit-post-form"));
}
