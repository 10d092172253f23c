use std::{
    f64::consts::{PI, TAU},
    panic::{self, AssertUnwindSafe},
    time::Instant,
};

use axum::{
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use codecollab_core::models::Project;
use codecollab_github::{AnalyticsSnapshot, Contributor};
use maud::{DOCTYPE, Markup, html};
use serde::Deserialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    AppState,
    handlers::common::{footer, header, nav, size, timeago},
};

/// Commits listed under "Recent Commits".
const RECENT_COMMITS: usize = 5;

#[derive(Deserialize)]
pub struct DashboardQuery {
    project: Option<String>,
}

pub async fn dashboard(
    State(state): State<AppState>,
    query: Result<Query<DashboardQuery>, QueryRejection>,
) -> Response {
    let start = Instant::now();
    let requested = query.ok().and_then(|Query(q)| q.project);
    let projects = match state.db.get_projects().await {
        Ok(projects) => projects,
        Err(e) => {
            tracing::error!("Failed to fetch projects: {:?}", e);
            vec![]
        }
    };
    let selected = selected_index(requested.as_deref(), projects.len());
    let snapshot = match selected.and_then(|i| projects.get(i)) {
        Some(project) => state.github.fetch_analytics(&project.repo_link).await,
        None => AnalyticsSnapshot::default(),
    };
    match error_boundary(|| Ok(render_dashboard(&projects, selected, &snapshot, start))) {
        Ok(markup) => markup.into_response(),
        Err(message) => {
            (StatusCode::INTERNAL_SERVER_ERROR, render_error(&message, start)).into_response()
        }
    }
}

/// Index of the project to show. Anything unparseable or out of range
/// falls back to the first project.
fn selected_index(requested: Option<&str>, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let index = requested.and_then(|s| s.trim().parse::<usize>().ok()).unwrap_or(0);
    Some(if index < len { index } else { 0 })
}

/// Run a page renderer, turning both errors and panics into a message for the
/// error page.
pub fn error_boundary(render: impl FnOnce() -> anyhow::Result<Markup>) -> Result<Markup, String> {
    match panic::catch_unwind(AssertUnwindSafe(render)) {
        Ok(Ok(markup)) => Ok(markup),
        Ok(Err(e)) => {
            tracing::error!("Failed to render dashboard: {:?}", e);
            Err(e.to_string())
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "Unknown error".to_string());
            tracing::error!("Dashboard rendering panicked: {}", message);
            Err(message)
        }
    }
}

fn render_error(message: &str, start: Instant) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { "Error • CodeCollab" }
                (header())
            }
            body {
                (nav())
                main {
                    .empty {
                        h3 { "Something went wrong" }
                        p { (message) }
                    }
                }
                (footer(start))
            }
        }
    }
}

fn render_dashboard(
    projects: &[Project],
    selected: Option<usize>,
    snapshot: &AnalyticsSnapshot,
    start: Instant,
) -> Markup {
    let project = selected.and_then(|i| projects.get(i));
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { "Project Analytics • CodeCollab" }
                (header())
            }
            body {
                (nav())
                main {
                    h3 { "Project Analytics" }
                    @if let Some(project) = project {
                        (project_selector(projects, selected.unwrap_or(0)))
                        (project_info(project, snapshot))
                        .cards {
                            (contributors_card(&snapshot.contributors))
                            (commits_card(snapshot))
                        }
                        .grid {
                            (distribution_card(&snapshot.contributors))
                            (languages_card(snapshot))
                            (collaborators_card(snapshot))
                        }
                    } @else {
                        p.empty { "No projects found." }
                    }
                }
                (footer(start))
            }
        }
    }
}

fn project_selector(projects: &[Project], selected: usize) -> Markup {
    html! {
        form method="get" action="/dashboard" {
            select name="project" onchange="this.form.submit()" {
                @for (idx, project) in projects.iter().enumerate() {
                    option value=(idx) selected[idx == selected] { (project.repo_link) }
                }
            }
            noscript { button type="submit" { "Show" } }
        }
    }
}

fn project_info(project: &Project, snapshot: &AnalyticsSnapshot) -> Markup {
    html! {
        p {
            @if let Some(repo) = &snapshot.repo {
                a href=(repo.url()) { (repo) }
            } @else {
                (project.repo_link)
            }
            " "
            span.status.(project.status.as_str()) { (project.status) }
            " · added by " (project.user_email) " " (timeago(project.created_at))
        }
        @if !snapshot.degraded.is_empty() {
            p {
                small {
                    "Could not load: "
                    @for (i, endpoint) in snapshot.degraded.iter().enumerate() {
                        @if i > 0 { ", " }
                        (endpoint)
                    }
                }
            }
        }
    }
}

fn contributors_card(contributors: &[Contributor]) -> Markup {
    html! {
        article {
            h5 { "Contributors" }
            @if contributors.is_empty() {
                p { "No contributors found." }
            } @else {
                ul {
                    @for c in contributors {
                        li { (c.login) " (" (c.contributions) " commits)" }
                    }
                }
            }
        }
    }
}

fn commits_card(snapshot: &AnalyticsSnapshot) -> Markup {
    html! {
        article {
            h5 { "Recent Commits" }
            @if snapshot.commits.is_empty() {
                p { "No recent commits found." }
            } @else {
                ul {
                    @for commit in snapshot.commits.iter().take(RECENT_COMMITS) {
                        li {
                            strong { (commit.author.as_deref().unwrap_or("Unknown")) }
                            ": " (commit.title().unwrap_or("No message"))
                            @if let Some(date) = commit
                                .date
                                .as_deref()
                                .and_then(|d| OffsetDateTime::parse(d, &Rfc3339).ok())
                            {
                                " " small { (timeago(date)) }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Slice colour for the contributor at `idx`.
fn slice_color(idx: usize) -> String { format!("hsl({}, 70%, 50%)", (idx * 60) % 360) }

struct Slice {
    color: String,
    path: Option<String>,
}

/// SVG path for each contributor's share of the total on a unit circle,
/// starting at 12 o'clock. A slice covering the whole circle has no path
/// and is drawn as a circle instead.
fn pie_slices(contributors: &[Contributor]) -> Vec<Slice> {
    let total = contributors.iter().map(|c| c.contributions).sum::<u64>();
    let mut angle = -PI / 2.0;
    let mut out = Vec::with_capacity(contributors.len());
    for (idx, c) in contributors.iter().enumerate() {
        if c.contributions == 0 {
            continue;
        }
        let color = slice_color(idx);
        if c.contributions == total {
            out.push(Slice { color, path: None });
            break;
        }
        let sweep = TAU * c.contributions as f64 / total as f64;
        let (x0, y0) = (angle.cos(), angle.sin());
        angle += sweep;
        let (x1, y1) = (angle.cos(), angle.sin());
        let large_arc = u8::from(sweep > PI);
        out.push(Slice {
            color,
            path: Some(format!(
                "M 0 0 L {x0:.4} {y0:.4} A 1 1 0 {large_arc} 1 {x1:.4} {y1:.4} Z"
            )),
        });
    }
    out
}

fn distribution_card(contributors: &[Contributor]) -> Markup {
    let slices = pie_slices(contributors);
    html! {
        article {
            h5 { "Commits Distribution" }
            @if slices.is_empty() {
                p { "No commits found." }
            } @else {
                svg viewBox="-1.05 -1.05 2.1 2.1" width="200" height="200" role="img" {
                    @for slice in &slices {
                        @if let Some(path) = &slice.path {
                            path d=(path) fill=(slice.color) stroke="#fff" stroke-width="0.01" {}
                        } @else {
                            circle cx="0" cy="0" r="1" fill=(slice.color) {}
                        }
                    }
                }
                ul.legend {
                    @for (idx, c) in contributors.iter().enumerate() {
                        li {
                            span.swatch style={ "background:" (slice_color(idx)) } {}
                            (c.login) ": " (c.contributions)
                        }
                    }
                }
            }
        }
    }
}

fn language_color(name: &str) -> String {
    match name {
        "JavaScript" => "#f1e05a".to_string(),
        "Python" => "#3572A5".to_string(),
        "Java" => "#b07219".to_string(),
        "HTML" => "#e34c26".to_string(),
        "CSS" => "#563d7c".to_string(),
        "C" => "#555555".to_string(),
        "C++" => "#f34b7d".to_string(),
        "TypeScript" => "#2b7489".to_string(),
        // Stable across renders for the same language
        _ => {
            let hue = name.bytes().fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(b as u32));
            format!("hsl({}, 70%, 50%)", hue % 360)
        }
    }
}

fn languages_card(snapshot: &AnalyticsSnapshot) -> Markup {
    html! {
        article {
            h5 { "Languages" }
            @if snapshot.languages.is_empty() {
                p { "No languages found." }
            } @else {
                div {
                    @for language in &snapshot.languages {
                        span.badge style={ "background-color:" (language_color(&language.name)) } {
                            (language.name) ": " (size(language.bytes))
                        }
                    }
                }
            }
        }
    }
}

fn collaborators_card(snapshot: &AnalyticsSnapshot) -> Markup {
    html! {
        article {
            h5 { "Collaborators" }
            @if snapshot.collaborators.is_empty() {
                p { "No collaborators found." }
            } @else {
                ul {
                    @for c in &snapshot.collaborators {
                        li {
                            @if let Some(url) = &c.html_url {
                                a href=(url) { (c.login) }
                            } @else {
                                (c.login)
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use axum::{
        body::Body,
        http::{Method, Request, header},
    };
    use serde_json::json;
    use tower::ServiceExt;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;
    use crate::{
        App,
        handlers::tests::{body_text, test_app, test_app_with_db},
    };

    fn contributor(login: &str, contributions: u64) -> Contributor {
        Contributor { id: None, login: login.to_string(), contributions, html_url: None }
    }

    async fn get_page(app: &App, uri: &str) -> (StatusCode, String) {
        let response = app
            .clone()
            .oneshot(Request::builder().method(Method::GET).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        (status, body_text(response).await)
    }

    async fn add_project(app: &App, repo_link: &str) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/projects")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"userEmail": "a@b.com", "repoLink": repo_link}).to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    async fn mock_repo(server: &MockServer, repo: &str, fail_commits: bool) {
        let commits = (0..7)
            .map(|i| {
                json!({
                    "sha": format!("c{i}"),
                    "commit": {"author": {"name": "Ada"}, "message": format!("Change {i}")}
                })
            })
            .collect::<Vec<_>>();
        let routes = [
            (
                "contributors",
                json!([
                    {"id": 1, "login": "ada", "contributions": 40},
                    {"id": 2, "login": "grace", "contributions": 2}
                ]),
            ),
            ("languages", json!({"Rust": 1200, "JavaScript": 30})),
            ("collaborators", json!([{"id": 1, "login": "ada"}])),
            ("commits", serde_json::Value::Array(commits)),
        ];
        for (endpoint, body) in routes {
            let response = if fail_commits && endpoint == "commits" {
                ResponseTemplate::new(500).set_body_json(json!({"message": "Server Error"}))
            } else {
                ResponseTemplate::new(200).set_body_json(body)
            };
            Mock::given(method("GET"))
                .and(path(format!("/repos/foo/{repo}/{endpoint}")))
                .respond_with(response)
                .mount(server)
                .await;
        }
    }

    #[test]
    fn test_selected_index() {
        assert_eq!(selected_index(None, 0), None);
        assert_eq!(selected_index(Some("1"), 0), None);
        assert_eq!(selected_index(None, 3), Some(0));
        assert_eq!(selected_index(Some("2"), 3), Some(2));
        assert_eq!(selected_index(Some("3"), 3), Some(0));
        assert_eq!(selected_index(Some("-1"), 3), Some(0));
        assert_eq!(selected_index(Some("abc"), 3), Some(0));
    }

    #[test]
    fn test_pie_slices() {
        assert!(pie_slices(&[]).is_empty());
        assert!(pie_slices(&[contributor("a", 0)]).is_empty());

        let whole = pie_slices(&[contributor("a", 0), contributor("b", 5)]);
        assert_eq!(whole.len(), 1);
        assert_eq!(whole[0].color, "hsl(60, 70%, 50%)");
        assert!(whole[0].path.is_none());

        let halves = pie_slices(&[contributor("a", 3), contributor("b", 1)]);
        assert_eq!(halves.len(), 2);
        // 3/4 of the circle needs the large arc flag
        assert_eq!(
            halves[0].path.as_deref(),
            Some("M 0 0 L 0.0000 -1.0000 A 1 1 0 1 1 -1.0000 0.0000 Z")
        );
        assert!(halves[1].path.as_deref().unwrap().contains(" A 1 1 0 0 1 "));
        assert_eq!(slice_color(7), "hsl(60, 70%, 50%)");
    }

    #[test]
    fn test_language_color() {
        assert_eq!(language_color("C++"), "#f34b7d");
        assert_eq!(language_color("Rust"), language_color("Rust"));
        assert!(language_color("Rust").starts_with("hsl("));
    }

    #[test]
    fn test_error_boundary() {
        let page = error_boundary(|| Ok(html! { p { "ok" } })).unwrap();
        assert_eq!(page.into_string(), "<p>ok</p>");

        assert_eq!(error_boundary(|| Err(anyhow!("bad data"))).unwrap_err(), "bad data");
        assert_eq!(error_boundary(|| panic!("boom")).unwrap_err(), "boom");
        let index = 4;
        assert_eq!(
            error_boundary(|| panic!("index {index} out of range")).unwrap_err(),
            "index 4 out of range"
        );
    }

    #[test]
    fn test_error_page() {
        let page = render_error("bad <data>", Instant::now()).into_string();
        assert!(page.contains("Something went wrong"));
        assert!(page.contains("bad &lt;data&gt;"));
    }

    #[tokio::test]
    async fn test_empty_dashboard() {
        let app = test_app(None).await;
        for uri in ["/", "/dashboard", "/dashboard?project=3"] {
            let (status, page) = get_page(&app, uri).await;
            assert_eq!(status, StatusCode::OK);
            assert!(page.contains("No projects found."), "{uri}");
            assert!(!page.contains("<select"));
        }
    }

    #[tokio::test]
    async fn test_dashboard_without_database() {
        let (app, db) = test_app_with_db(None).await;
        add_project(&app, "https://github.com/foo/bar").await;
        db.close().await;
        let (status, page) = get_page(&app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(page.contains("No projects found."));
    }

    #[tokio::test]
    async fn test_dashboard() {
        let server = MockServer::start().await;
        mock_repo(&server, "bar", false).await;
        let app = test_app(Some(&server.uri())).await;
        add_project(&app, "https://github.com/foo/bar").await;

        let (status, page) = get_page(&app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(page.contains("ada (40 commits)"));
        assert!(page.contains("grace (2 commits)"));
        assert!(page.contains("<strong>Ada</strong>: Change 4"));
        assert!(!page.contains("Change 5"));
        assert!(page.contains("Rust: 1.20 kB"));
        assert!(page.contains("background-color:#f1e05a"));
        assert!(page.contains("hsl(0, 70%, 50%)"));
        assert!(page.contains("<path"));
        assert!(!page.contains("No collaborators found."));
        assert!(!page.contains("Could not load"));
    }

    #[tokio::test]
    async fn test_dashboard_partial_failure() {
        let server = MockServer::start().await;
        mock_repo(&server, "bar", true).await;
        let app = test_app(Some(&server.uri())).await;
        add_project(&app, "https://github.com/foo/bar").await;

        let (status, page) = get_page(&app, "/dashboard").await;
        assert_eq!(status, StatusCode::OK);
        assert!(page.contains("No recent commits found."));
        assert!(page.contains("Could not load: commits"));
        assert!(page.contains("ada (40 commits)"));
        assert!(page.contains("Rust: 1.20 kB"));
    }

    #[tokio::test]
    async fn test_dashboard_selection() {
        let server = MockServer::start().await;
        mock_repo(&server, "second", false).await;
        let app = test_app(Some(&server.uri())).await;
        add_project(&app, "https://github.com/foo/first").await;
        add_project(&app, "https://github.com/foo/second").await;

        // Newest first, so index 0 is "second"
        for uri in ["/", "/dashboard?project=0", "/dashboard?project=9", "/dashboard?project=x"] {
            let (status, page) = get_page(&app, uri).await;
            assert_eq!(status, StatusCode::OK);
            assert!(
                page.contains(r#"<option value="0" selected>https://github.com/foo/second</option>"#),
                "{uri}"
            );
            assert!(page.contains("ada (40 commits)"), "{uri}");
        }

        // Unmocked repository: every section is empty
        let (status, page) = get_page(&app, "/dashboard?project=1").await;
        assert_eq!(status, StatusCode::OK);
        assert!(page.contains(r#"<option value="1" selected>https://github.com/foo/first</option>"#));
        for empty in [
            "No contributors found.",
            "No recent commits found.",
            "No commits found.",
            "No languages found.",
            "No collaborators found.",
        ] {
            assert!(page.contains(empty), "{empty}");
        }
    }
}
